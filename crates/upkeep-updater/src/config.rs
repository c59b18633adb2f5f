use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use upkeep_core::InstallMode;
use upkeep_installer::{default_data_dir, UpdateLayout};
use upkeep_resolver::HttpSettings;
use upkeep_store::LegacySources;

pub const DEFAULT_APP_NAME: &str = "upkeep";
pub const DEFAULT_CONFIG_FILE: &str = "upkeep.toml";

/// Static, deployment-level configuration. Values the user can change at
/// runtime (update URLs, retry policy) live in the settings store instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterConfig {
    pub app_name: String,
    pub current_version: String,
    pub data_dir: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub updater_path: Option<PathBuf>,
    pub preferred_mode: Option<String>,
    pub manifest_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub exit_after_installer: bool,
    pub legacy_config_path: Option<PathBuf>,
    pub legacy_visibility_path: Option<PathBuf>,
    pub manifest_public_key: Option<String>,
    pub bundled_update_log: Option<PathBuf>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: None,
            install_dir: None,
            updater_path: None,
            preferred_mode: None,
            manifest_timeout_secs: 10,
            download_timeout_secs: 600,
            exit_after_installer: true,
            legacy_config_path: None,
            legacy_visibility_path: None,
            manifest_public_key: None,
            bundled_update_log: None,
        }
    }
}

impl UpdaterConfig {
    /// A missing file yields the defaults; an unreadable or invalid one is an
    /// error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw)
                .with_context(|| format!("invalid config file {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; using defaults");
                Ok(Self::default())
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to read config file {}", path.display()))
            }
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("failed to parse updater config")?;
        if config.app_name.trim().is_empty() {
            anyhow::bail!("app_name must not be empty");
        }
        if config.manifest_timeout_secs == 0 || config.download_timeout_secs == 0 {
            anyhow::bail!("network timeouts must be at least one second");
        }
        Ok(config)
    }

    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(&self.app_name),
        }
    }

    pub fn layout(&self) -> Result<UpdateLayout> {
        Ok(UpdateLayout::new(self.resolve_data_dir()?))
    }

    /// Defaults to the directory holding the running executable.
    pub fn resolve_install_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.install_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe().context("failed to locate running executable")?;
        exe.parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("executable {} has no parent directory", exe.display()))
    }

    pub fn resolve_updater_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.updater_path {
            return Ok(path.clone());
        }
        Ok(self
            .resolve_install_dir()?
            .join(format!("updater{}", std::env::consts::EXE_SUFFIX)))
    }

    pub fn preferred_mode(&self) -> Option<InstallMode> {
        self.preferred_mode.as_deref().map(InstallMode::parse)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            manifest_timeout: Duration::from_secs(self.manifest_timeout_secs),
            download_timeout: Duration::from_secs(self.download_timeout_secs),
            ..HttpSettings::default()
        }
    }

    pub fn legacy_sources(&self) -> LegacySources {
        LegacySources::discover(
            self.legacy_config_path.clone(),
            self.legacy_visibility_path.clone(),
        )
    }
}
