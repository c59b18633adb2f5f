use std::io;

use thiserror::Error;
use upkeep_installer::InstallError;
use upkeep_store::StoreError;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download from {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download from {url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("download from {url} was interrupted: {source}")]
    Stream {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("download from {url} ended after {received} of {expected} bytes")]
    Incomplete {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("download cancelled")]
    Cancelled,

    #[error("{0:#}")]
    Integrity(anyhow::Error),
}

impl FetchError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Failures a fresh download attempt can plausibly fix. A checksum
    /// mismatch always earns a forced re-download.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Stream { .. } | Self::Incomplete { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Integrity(_) => true,
            Self::Io { .. } | Self::Cancelled => false,
        }
    }
}

/// Terminal failure of an update session, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateFailure {
    #[error("network failure: {0}")]
    Network(String),

    #[error("checksum verification failed: {0}")]
    Integrity(String),

    #[error("settings store failure: {0}")]
    Storage(String),

    #[error("installation failed: {0}")]
    Install(String),

    #[error("unknown install mode '{0}'")]
    UnknownMode(String),

    #[error("malformed update data: {0}")]
    Parse(String),

    #[error("update cancelled")]
    Cancelled,

    #[error("an update is already in progress")]
    Busy,
}

impl UpdateFailure {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Network(_) => "network-failure",
            Self::Integrity(_) => "checksum-failure",
            Self::Storage(_) => "storage-failure",
            Self::Install(_) => "install-failure",
            Self::UnknownMode(_) => "unknown-mode",
            Self::Parse(_) => "parse-failure",
            Self::Cancelled => "cancelled",
            Self::Busy => "busy",
        }
    }
}

impl From<FetchError> for UpdateFailure {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled => Self::Cancelled,
            FetchError::Integrity(err) => Self::Integrity(format!("{err:#}")),
            FetchError::Io { .. } => Self::Storage(err.to_string()),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<InstallError> for UpdateFailure {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::UnknownMode(mode) => Self::UnknownMode(mode),
            InstallError::Storage(err) => Self::Storage(err.to_string()),
            other => Self::Install(other.to_string()),
        }
    }
}

impl From<StoreError> for UpdateFailure {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}
