use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("settings connection lock was poisoned by a panicking writer")]
    Poisoned,

    #[error("setting key '{0}' is reserved or empty")]
    InvalidKey(String),

    #[error("setting '{key}' has malformed value '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("failed to prepare settings location: {0}")]
    Io(#[from] std::io::Error),

    #[error("migration to schema version {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },
}
