use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use upkeep_installer::UpdateLayout;
use upkeep_resolver::{build_client, RetryPolicy, VersionResolver};
use upkeep_store::{keys, SettingsStore};
use upkeep_updater::{reconcile_startup, StartupState, UpdaterConfig, DEFAULT_CONFIG_FILE};

pub(crate) struct AppContext {
    pub(crate) config: UpdaterConfig,
    pub(crate) layout: UpdateLayout,
    pub(crate) store: Arc<SettingsStore>,
    pub(crate) startup: StartupState,
}

impl AppContext {
    /// Every command counts as a launch; `launch_args` are what the process
    /// was started with, minus anything clap consumed.
    pub(crate) fn load(config_path: Option<&Path>, launch_args: &[String]) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        let config = UpdaterConfig::load(&config_path)?;
        let layout = config.layout()?;
        if let Err(err) = layout.ensure_base_dirs() {
            warn!(error = %format!("{err:#}"), "failed to create data directories");
        }

        let store = SettingsStore::initialize_or_default(layout.settings_db_path())
            .context("failed to prepare settings store")?;
        if store.is_fallback() {
            warn!("settings will not persist for this run");
        }
        match store.import_legacy(&config.legacy_sources()) {
            Ok(Some(report)) if !report.failures.is_empty() => warn!(
                failures = report.failures.len(),
                "some legacy settings could not be imported"
            ),
            Ok(Some(report)) => info!(
                imported = report.imported.len(),
                visibility_imported = report.visibility_imported.len(),
                "legacy settings imported"
            ),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "legacy settings import failed"),
        }

        let startup = reconcile_startup(launch_args, &store)
            .context("failed to reconcile startup state")?;

        Ok(Self {
            config,
            layout,
            store: Arc::new(store),
            startup,
        })
    }

    pub(crate) fn resolver(&self) -> Result<VersionResolver> {
        let settings = self.config.http_settings();
        let client = build_client(&settings, settings.manifest_timeout)?;
        let retry = RetryPolicy::from_store(&self.store)?;
        Ok(VersionResolver::new(client, retry, self.layout.cache_dir())
            .with_public_key(self.config.manifest_public_key.clone()))
    }

    pub(crate) fn required_setting(&self, key: &str) -> Result<String> {
        self.store
            .get(key)?
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("setting '{key}' is not configured"))
    }

    pub(crate) fn update_url(&self) -> Result<String> {
        self.required_setting(keys::UPDATE_URL)
    }

    pub(crate) fn update_log_url(&self) -> Result<String> {
        self.required_setting(keys::UPDATE_LOG_URL)
    }
}

fn default_config_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate running executable")?;
    Ok(exe
        .parent()
        .map(|dir| dir.join(DEFAULT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)))
}
