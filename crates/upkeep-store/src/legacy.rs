use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::StoreError;
use crate::keys::{LEGACY_IMPORT_COMPLETED, LEGACY_KEY_RENAMES};
use crate::store::SettingsStore;

pub const LEGACY_VISIBILITY_FILE_NAME: &str = "ui-visibility.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacySources {
    pub config_path: Option<PathBuf>,
    pub visibility_path: Option<PathBuf>,
}

impl LegacySources {
    /// The visibility file lives next to the legacy per-user config unless
    /// an explicit location is given.
    pub fn discover(config_path: Option<PathBuf>, visibility_path: Option<PathBuf>) -> Self {
        let visibility_path = visibility_path.or_else(|| {
            config_path
                .as_deref()
                .and_then(Path::parent)
                .map(|dir| dir.join(LEGACY_VISIBILITY_FILE_NAME))
        });
        Self {
            config_path,
            visibility_path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub visibility_imported: Vec<String>,
    pub failures: Vec<String>,
}

impl SettingsStore {
    pub fn legacy_import_completed(&self) -> Result<bool, StoreError> {
        Ok(self
            .get(LEGACY_IMPORT_COMPLETED)?
            .is_some_and(|value| value.trim() == "1"))
    }

    /// One-time import of settings that predate this store. Returns `None`
    /// once the completion marker exists. Bad entries land in
    /// `ImportReport::failures` and never stop the remaining import; the
    /// marker is written even when some entries failed.
    pub fn import_legacy(&self, sources: &LegacySources) -> Result<Option<ImportReport>, StoreError> {
        if self.legacy_import_completed()? {
            return Ok(None);
        }

        let mut report = ImportReport::default();
        if let Some(path) = sources.config_path.as_deref().filter(|path| path.exists()) {
            self.import_legacy_config(path, &mut report)?;
        }
        if let Some(path) = sources
            .visibility_path
            .as_deref()
            .filter(|path| path.exists())
        {
            self.import_legacy_visibility(path, &mut report)?;
        }

        for failure in &report.failures {
            warn!(reason = %failure, "legacy settings entry not imported");
        }
        self.set(LEGACY_IMPORT_COMPLETED, "1")?;
        info!(
            imported = report.imported.len(),
            visibility_imported = report.visibility_imported.len(),
            failures = report.failures.len(),
            "legacy settings import finished"
        );
        Ok(Some(report))
    }

    fn import_legacy_config(&self, path: &Path, report: &mut ImportReport) -> Result<(), StoreError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                report
                    .failures
                    .push(format!("{}: failed to read: {err}", path.display()));
                return Ok(());
            }
        };
        let table = match toml::from_str::<toml::Table>(&raw) {
            Ok(table) => table,
            Err(err) => {
                report.failures.push(format!(
                    "{}: failed to parse legacy config: {err}",
                    path.display()
                ));
                return Ok(());
            }
        };

        for (key, value) in table {
            let value = match value {
                toml::Value::String(text) => text,
                toml::Value::Integer(number) => number.to_string(),
                toml::Value::Float(number) => number.to_string(),
                toml::Value::Boolean(flag) => flag.to_string(),
                toml::Value::Datetime(datetime) => datetime.to_string(),
                other => {
                    report.failures.push(format!(
                        "{key}: unsupported legacy value type '{}'",
                        other.type_str()
                    ));
                    continue;
                }
            };
            let key = current_key_name(&key);
            match self.set(&key, &value) {
                Ok(()) => report.imported.push(key),
                Err(StoreError::InvalidKey(bad)) => report
                    .failures
                    .push(format!("{bad}: reserved or empty key")),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn import_legacy_visibility(
        &self,
        path: &Path,
        report: &mut ImportReport,
    ) -> Result<(), StoreError> {
        let parsed = fs::read_to_string(path)
            .map_err(|err| err.to_string())
            .and_then(|raw| {
                serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&raw)
                    .map_err(|err| err.to_string())
            });
        let entries = match parsed {
            Ok(entries) => entries,
            Err(err) => {
                report.failures.push(format!(
                    "{}: failed to load legacy visibility settings: {err}",
                    path.display()
                ));
                return Ok(());
            }
        };

        for (name, value) in entries {
            let visible = match &value {
                serde_json::Value::Bool(flag) => Some(*flag),
                serde_json::Value::Number(number) => match number.as_i64() {
                    Some(0) => Some(false),
                    Some(1) => Some(true),
                    _ => None,
                },
                _ => None,
            };
            let Some(visible) = visible else {
                report
                    .failures
                    .push(format!("{name}: visibility must be a boolean, got {value}"));
                continue;
            };
            match self.set_visibility(&name, visible) {
                Ok(()) => report.visibility_imported.push(name),
                Err(StoreError::InvalidKey(bad)) => report
                    .failures
                    .push(format!("'{bad}': visibility name must not be empty")),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

fn current_key_name(key: &str) -> String {
    LEGACY_KEY_RENAMES
        .iter()
        .find(|(legacy, _)| *legacy == key)
        .map(|(_, current)| (*current).to_string())
        .unwrap_or_else(|| key.to_string())
}
