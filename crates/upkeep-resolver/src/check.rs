use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use tracing::{info, warn};
use upkeep_core::{compare_versions, parse_app_version, AppVersion, UpdateManifest, VersionStatus};
use upkeep_security::verify_detached_signature_hex;

use crate::error::ResolveError;
use crate::http::{fetch_text, with_retries, RetryPolicy};

const MANIFEST_CACHE_FILE: &str = "manifest.json";
const UPDATE_LOG_CACHE_FILE: &str = "update-log.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSource {
    Remote,
    Cached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub manifest: UpdateManifest,
    pub source: ManifestSource,
    pub local: AppVersion,
    pub remote: AppVersion,
    pub status: VersionStatus,
}

impl UpdateCheck {
    pub fn update_available(&self) -> bool {
        self.status == VersionStatus::UpdateAvailable
    }
}

#[derive(Debug, Clone)]
pub struct VersionResolver {
    pub(crate) client: Client,
    pub(crate) retry: RetryPolicy,
    pub(crate) cache_dir: PathBuf,
    public_key: Option<String>,
}

impl VersionResolver {
    pub fn new(client: Client, retry: RetryPolicy, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            retry,
            cache_dir: cache_dir.into(),
            public_key: None,
        }
    }

    pub fn with_public_key(mut self, public_key_hex: Option<String>) -> Self {
        self.public_key = public_key_hex.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn manifest_cache_path(&self) -> PathBuf {
        self.cache_dir.join(MANIFEST_CACHE_FILE)
    }

    pub fn update_log_cache_path(&self) -> PathBuf {
        self.cache_dir.join(UPDATE_LOG_CACHE_FILE)
    }

    pub fn check_for_update(
        &self,
        manifest_url: &str,
        current_version: &str,
    ) -> Result<UpdateCheck, ResolveError> {
        let local =
            parse_app_version(current_version).map_err(|err| ResolveError::LocalVersion {
                version: current_version.to_string(),
                reason: format!("{err:#}"),
            })?;
        let (manifest, source) = self.fetch_manifest(manifest_url)?;
        let remote = manifest.latest().map_err(|err| ResolveError::Parse {
            what: "manifest",
            origin: manifest_url.to_string(),
            reason: format!("{err:#}"),
        })?;
        let status = compare_versions(&local, &remote);
        info!(
            local = %local,
            remote = %remote,
            status = status.as_str(),
            source = ?source,
            "update check finished"
        );
        Ok(UpdateCheck {
            manifest,
            source,
            local,
            remote,
            status,
        })
    }

    /// Remote manifest first; on network or parse failure the last cached
    /// copy is used. A signature rejection never falls back.
    pub fn fetch_manifest(
        &self,
        manifest_url: &str,
    ) -> Result<(UpdateManifest, ManifestSource), ResolveError> {
        let remote = with_retries(self.retry, "manifest", |_| {
            fetch_text(&self.client, manifest_url)
        })
        .and_then(|raw| {
            let manifest = self.parse_manifest(&raw, manifest_url)?;
            Ok((raw, manifest))
        });

        match remote {
            Ok((raw, manifest)) => {
                write_cache(&self.manifest_cache_path(), &raw);
                Ok((manifest, ManifestSource::Remote))
            }
            Err(err @ ResolveError::Signature(_)) => Err(err),
            Err(err) => {
                warn!(url = manifest_url, error = %err, "manifest fetch failed; trying cache");
                let cache_path = self.manifest_cache_path();
                let Some(raw) = read_cache(&cache_path) else {
                    return Err(ResolveError::Unavailable {
                        what: "update manifest",
                        url: manifest_url.to_string(),
                        cause: Box::new(err),
                    });
                };
                let manifest = self.parse_manifest(&raw, &cache_path.display().to_string())?;
                Ok((manifest, ManifestSource::Cached))
            }
        }
    }

    fn parse_manifest(&self, raw: &str, origin: &str) -> Result<UpdateManifest, ResolveError> {
        let manifest = UpdateManifest::from_json_str(raw).map_err(|err| ResolveError::Parse {
            what: "manifest",
            origin: origin.to_string(),
            reason: format!("{err:#}"),
        })?;

        if let Some(public_key) = &self.public_key {
            let Some(signature) = manifest.signature.as_deref() else {
                return Err(ResolveError::Signature(format!(
                    "manifest from {origin} is unsigned but a public key is configured"
                )));
            };
            let verified =
                verify_detached_signature_hex(&manifest.signing_payload(), public_key, signature)
                    .map_err(|err| ResolveError::Signature(format!("{err:#}")))?;
            if !verified {
                return Err(ResolveError::Signature(format!(
                    "signature on manifest from {origin} does not verify"
                )));
            }
        }
        Ok(manifest)
    }
}

pub(crate) fn read_cache(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read cached copy");
            None
        }
    }
}

/// Best-effort; a cache that cannot be written only costs the offline
/// fallback.
pub(crate) fn write_cache(path: &Path, raw: &str) {
    let result = (|| -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)
    })();
    if let Err(err) = result {
        warn!(path = %path.display(), error = %err, "failed to refresh cached copy");
    }
}
