use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("malformed {what} from {origin}: {reason}")]
    Parse {
        what: &'static str,
        origin: String,
        reason: String,
    },

    #[error("manifest signature rejected: {0}")]
    Signature(String),

    #[error("{what} unavailable from {url} and no cached copy exists: {cause}")]
    Unavailable {
        what: &'static str,
        url: String,
        cause: Box<ResolveError>,
    },

    #[error("invalid local version '{version}': {reason}")]
    LocalVersion { version: String, reason: String },
}

impl ResolveError {
    /// Connection failures, timeouts and server-side errors are worth
    /// another attempt; client errors and bad payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}
