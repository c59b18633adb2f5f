use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::artifact::DeliveryArtifact;
use crate::mode::InstallMode;
use crate::version::{parse_app_version, AppVersion};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateManifest {
    pub latest_version: String,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub release_notes: Option<String>,
    #[serde(default)]
    pub download_size: Option<u64>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub modes: Vec<DeliveryArtifact>,
}

impl UpdateManifest {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            serde_json::from_str(input).context("failed to parse update manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize update manifest")
    }

    pub fn latest(&self) -> anyhow::Result<AppVersion> {
        parse_app_version(&self.latest_version)
    }

    pub fn is_mandatory(&self) -> bool {
        self.modes.iter().any(|artifact| artifact.mandatory)
    }

    pub fn select_artifact(&self, preferred: Option<&InstallMode>) -> Option<&DeliveryArtifact> {
        if let Some(preferred) = preferred {
            if let Some(found) = self.modes.iter().find(|artifact| &artifact.mode == preferred) {
                return Some(found);
            }
        }
        self.modes
            .iter()
            .find(|artifact| artifact.mode.is_known())
            .or_else(|| self.modes.first())
    }

    /// Bytes covered by the optional manifest signature: one line per mode,
    /// `mode\turl\tchecksum,checksum`, prefixed by the latest version.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = format!("{}\n", self.latest_version.trim());
        for artifact in &self.modes {
            payload.push_str(&format!(
                "{}\t{}\t{}\n",
                artifact.mode.as_str(),
                artifact.url,
                artifact
                    .checksums
                    .iter()
                    .map(|value| value.trim().to_ascii_lowercase())
                    .collect::<Vec<_>>()
                    .join(",")
            ));
        }
        payload.into_bytes()
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.latest().with_context(|| {
            format!(
                "manifest latest_version is not a valid version: {}",
                self.latest_version
            )
        })?;
        if self.modes.is_empty() {
            return Err(anyhow!("manifest must list at least one delivery mode"));
        }
        for artifact in &self.modes {
            if artifact.url.trim().is_empty() {
                return Err(anyhow!(
                    "delivery mode '{}' has an empty download url",
                    artifact.mode.as_str()
                ));
            }
            if artifact.mode.is_known() && artifact.checksums.is_empty() {
                return Err(anyhow!(
                    "delivery mode '{}' must publish at least one checksum",
                    artifact.mode.as_str()
                ));
            }
        }
        Ok(())
    }
}
