use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::keys::{
    DEFAULT_SETTINGS, DEFAULT_VISIBILITY, PENDING_ARTIFACT_CLEANUP, PENDING_UPDATE_PATH,
};
use crate::migrations::{
    read_schema_version, run_migrations, table_exists, CREATE_SETTINGS_TABLE,
    CREATE_VISIBILITY_TABLE, MIGRATIONS, SCHEMA_VERSION_KEY,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOrigin {
    File(PathBuf),
    InMemory,
    /// The on-disk store could not be used; defaults live in memory only.
    Fallback(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: bool,
    pub applied_migrations: Vec<u32>,
    pub seeded_keys: Vec<String>,
    pub seeded_flags: Vec<String>,
}

/// Schema-versioned key/value settings backed by SQLite.
///
/// Every read and write goes through one mutex-guarded connection, and each
/// write is a single statement, so readers never see a half-written value.
#[derive(Debug)]
pub struct SettingsStore {
    conn: Mutex<Connection>,
    origin: StoreOrigin,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn: Mutex::new(conn),
            origin: StoreOrigin::File(path),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            origin: StoreOrigin::InMemory,
        })
    }

    pub fn open_initialized(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::open(path)?;
        store.initialize()?;
        Ok(store)
    }

    /// Opens and initializes the on-disk store, degrading to an in-memory
    /// store seeded with defaults when that fails. Only an in-memory failure
    /// is returned to the caller.
    pub fn initialize_or_default(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        match Self::open_initialized(&path) {
            Ok(store) => Ok(store),
            Err(err) => {
                error!(
                    path = %path.display(),
                    error = %err,
                    "settings store initialization failed; continuing with in-memory defaults"
                );
                let mut store = Self::open_in_memory()?;
                store.initialize()?;
                store.origin = StoreOrigin::Fallback(path);
                Ok(store)
            }
        }
    }

    pub fn origin(&self) -> &StoreOrigin {
        &self.origin
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, StoreOrigin::Fallback(_))
    }

    pub fn initialize(&self) -> Result<InitReport, StoreError> {
        let mut conn = self.lock()?;
        let created = !table_exists(&conn, "settings")?;
        let applied_migrations = run_migrations(&mut conn, MIGRATIONS)?;
        conn.execute_batch(&format!(
            "{CREATE_SETTINGS_TABLE};\n{CREATE_VISIBILITY_TABLE};"
        ))?;

        let mut seeded_keys = Vec::new();
        for default in DEFAULT_SETTINGS {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
                params![default.key, default.value],
            )?;
            if inserted > 0 {
                seeded_keys.push(default.key.to_string());
            }
        }

        let mut seeded_flags = Vec::new();
        for (name, visible) in DEFAULT_VISIBILITY {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO button_visibility (name, visible) VALUES (?1, ?2)",
                params![name, i64::from(*visible)],
            )?;
            if inserted > 0 {
                seeded_flags.push((*name).to_string());
            }
        }

        info!(
            created,
            migrations = applied_migrations.len(),
            seeded_keys = seeded_keys.len(),
            seeded_flags = seeded_flags.len(),
            "settings store initialized"
        );
        Ok(InitReport {
            created,
            applied_migrations,
            seeded_keys,
            seeded_flags,
        })
    }

    pub fn migrate(&self) -> Result<Vec<u32>, StoreError> {
        let mut conn = self.lock()?;
        run_migrations(&mut conn, MIGRATIONS)
    }

    pub fn schema_version(&self) -> Result<u32, StoreError> {
        let conn = self.lock()?;
        read_schema_version(&conn)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn get_or(&self, key: &str, default: &str) -> Result<String, StoreError> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, StoreError> {
        self.get(key)?
            .map(|value| {
                value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| StoreError::InvalidValue {
                        key: key.to_string(),
                        value,
                    })
            })
            .transpose()
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, StoreError> {
        self.get(key)?
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| StoreError::InvalidValue {
                        key: key.to_string(),
                        value,
                    })
            })
            .transpose()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(removed > 0)
    }

    /// Adds one to a counter setting, treating a missing key as zero.
    pub fn increment(&self, key: &str) -> Result<u64, StoreError> {
        validate_key(key)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        let current = match current {
            None => 0,
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| StoreError::InvalidValue {
                    key: key.to_string(),
                    value,
                })?,
        };
        let next = current.saturating_add(1);
        tx.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, next.to_string()],
        )?;
        tx.commit()?;
        Ok(next)
    }

    pub fn all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM settings WHERE key != ?1")?;
        let entries = stmt
            .query_map([SCHEMA_VERSION_KEY], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(entries)
    }

    pub fn visibility(&self, name: &str) -> Result<Option<bool>, StoreError> {
        let conn = self.lock()?;
        let visible = conn
            .query_row(
                "SELECT visible FROM button_visibility WHERE name = ?1",
                [name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(visible.map(|value| value != 0))
    }

    pub fn set_visibility(&self, name: &str, visible: bool) -> Result<(), StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidKey(name.to_string()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO button_visibility (name, visible) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET visible = excluded.visible",
            params![name, i64::from(visible)],
        )?;
        Ok(())
    }

    pub fn visibility_all(&self) -> Result<BTreeMap<String, bool>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name, visible FROM button_visibility")?;
        let entries = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(entries)
    }

    pub fn pending_update(&self) -> Result<Option<PathBuf>, StoreError> {
        self.path_setting(PENDING_UPDATE_PATH)
    }

    pub fn set_pending_update(&self, staging: &Path) -> Result<(), StoreError> {
        self.set(PENDING_UPDATE_PATH, &staging.to_string_lossy())
    }

    pub fn clear_pending_update(&self) -> Result<(), StoreError> {
        self.set(PENDING_UPDATE_PATH, "")
    }

    pub fn pending_artifact_cleanup(&self) -> Result<Option<PathBuf>, StoreError> {
        self.path_setting(PENDING_ARTIFACT_CLEANUP)
    }

    pub fn set_pending_artifact_cleanup(&self, artifact: &Path) -> Result<(), StoreError> {
        self.set(PENDING_ARTIFACT_CLEANUP, &artifact.to_string_lossy())
    }

    pub fn clear_pending_artifact_cleanup(&self) -> Result<(), StoreError> {
        self.set(PENDING_ARTIFACT_CLEANUP, "")
    }

    #[cfg(test)]
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut conn = self.lock()?;
        Ok(f(&mut conn)?)
    }

    fn path_setting(&self, key: &str) -> Result<Option<PathBuf>, StoreError> {
        Ok(self
            .get(key)?
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| {
            warn!("settings connection mutex poisoned");
            StoreError::Poisoned
        })
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.trim().is_empty() || key == SCHEMA_VERSION_KEY {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
