use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::keys::{LEGACY_IMPORT_COMPLETED, LEGACY_KEY_RENAMES};

pub const SCHEMA_VERSION_KEY: &str = "__schema_version";

#[derive(Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish()
    }
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create-tables",
        apply: create_tables,
    },
    Migration {
        version: 2,
        name: "drop-migration-completed-column",
        apply: drop_migration_completed_column,
    },
    Migration {
        version: 3,
        name: "rename-legacy-keys",
        apply: rename_legacy_keys,
    },
];

pub const CURRENT_SCHEMA_VERSION: u32 = 3;

pub(crate) const CREATE_SETTINGS_TABLE: &str = "CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

pub(crate) const CREATE_VISIBILITY_TABLE: &str = "CREATE TABLE IF NOT EXISTS button_visibility (
    name TEXT PRIMARY KEY NOT NULL,
    visible INTEGER NOT NULL DEFAULT 1
)";

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|name| name.eq_ignore_ascii_case(column)))
}

pub(crate) fn read_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    if !table_exists(conn, "settings")? {
        return Ok(0);
    }
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [SCHEMA_VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        None => Ok(0),
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|_| StoreError::InvalidValue {
                key: SCHEMA_VERSION_KEY.to_string(),
                value,
            }),
    }
}

fn write_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION_KEY, version.to_string()],
    )?;
    Ok(())
}

/// Applies every step newer than the recorded version, ascending. Each step
/// and its version bump commit together, so a failure leaves the previous
/// version recorded and none of the step's writes visible.
pub(crate) fn run_migrations(
    conn: &mut Connection,
    migrations: &[Migration],
) -> Result<Vec<u32>, StoreError> {
    let current = read_schema_version(conn)?;
    let mut pending = migrations
        .iter()
        .filter(|migration| migration.version > current)
        .collect::<Vec<_>>();
    pending.sort_by_key(|migration| migration.version);

    let mut applied = Vec::with_capacity(pending.len());
    for migration in pending {
        debug!(
            version = migration.version,
            name = migration.name,
            "applying settings migration"
        );
        let tx = conn.transaction()?;
        (migration.apply)(&tx)
            .and_then(|()| write_schema_version(&tx, migration.version))
            .map_err(|source| StoreError::Migration {
                version: migration.version,
                source,
            })?;
        tx.commit().map_err(|source| StoreError::Migration {
            version: migration.version,
            source,
        })?;
        info!(
            version = migration.version,
            name = migration.name,
            "settings migration applied"
        );
        applied.push(migration.version);
    }
    Ok(applied)
}

fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "{CREATE_SETTINGS_TABLE};\n{CREATE_VISIBILITY_TABLE};"
    ))
}

fn drop_migration_completed_column(conn: &Connection) -> rusqlite::Result<()> {
    if !column_exists(conn, "settings", "migration_completed")? {
        return Ok(());
    }

    let completed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM settings WHERE COALESCE(migration_completed, 0) != 0",
        [],
        |row| row.get(0),
    )?;

    conn.execute_batch(
        "DROP TABLE IF EXISTS settings_rebuild;
         CREATE TABLE settings_rebuild (
             key TEXT PRIMARY KEY NOT NULL,
             value TEXT NOT NULL
         );
         INSERT OR IGNORE INTO settings_rebuild (key, value)
             SELECT key, COALESCE(value, '') FROM settings WHERE key IS NOT NULL;
         DROP TABLE settings;
         ALTER TABLE settings_rebuild RENAME TO settings;",
    )?;

    if completed > 0 {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, '1')",
            [LEGACY_IMPORT_COMPLETED],
        )?;
    }
    Ok(())
}

fn rename_legacy_keys(conn: &Connection) -> rusqlite::Result<()> {
    for (legacy, current) in LEGACY_KEY_RENAMES {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value)
             SELECT ?2, value FROM settings WHERE key = ?1",
            params![legacy, current],
        )?;
        conn.execute("DELETE FROM settings WHERE key = ?1", [legacy])?;
    }
    Ok(())
}
