use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};
use upkeep_store::{keys, SettingsStore, StoreError};

use crate::error::ResolveError;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

const USER_AGENT: &str = concat!("upkeep/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub manifest_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            manifest_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(600),
        }
    }
}

/// `attempts` is the total number of tries, never less than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_COUNT,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Reads `RetryCount` and `RetryDelay` (milliseconds). Absent keys use the
    /// defaults; malformed values surface as typed store errors.
    pub fn from_store(store: &SettingsStore) -> Result<Self, StoreError> {
        let attempts = store
            .get_u32(keys::RETRY_COUNT)?
            .unwrap_or(DEFAULT_RETRY_COUNT);
        let delay = store
            .get_u64(keys::RETRY_DELAY)?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY);
        Ok(Self::new(attempts, delay))
    }
}

pub fn build_client(settings: &HttpSettings, timeout: Duration) -> Result<Client, ResolveError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(settings.connect_timeout)
        .timeout(timeout)
        .build()
        .map_err(ResolveError::Client)
}

pub fn fetch_text(client: &Client, url: &str) -> Result<String, ResolveError> {
    let response = client.get(url).send().map_err(|source| ResolveError::Network {
        url: url.to_string(),
        source,
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(ResolveError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().map_err(|source| ResolveError::Network {
        url: url.to_string(),
        source,
    })
}

/// Runs `operation` until it succeeds, returns a non-transient error, or the
/// policy's attempts are used up.
pub fn with_retries<T, F>(policy: RetryPolicy, label: &str, mut operation: F) -> Result<T, ResolveError>
where
    F: FnMut(u32) -> Result<T, ResolveError>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!(
                    label,
                    attempt,
                    attempts,
                    error = %err,
                    "transient failure; retrying"
                );
                thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(err) => {
                debug!(label, attempt, error = %err, "giving up");
                return Err(err);
            }
        }
    }
}
