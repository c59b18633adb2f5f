mod check;
mod error;
mod http;
mod log;

pub use check::{ManifestSource, UpdateCheck, VersionResolver};
pub use error::ResolveError;
pub use http::{
    build_client, fetch_text, with_retries, HttpSettings, RetryPolicy, DEFAULT_RETRY_COUNT,
    DEFAULT_RETRY_DELAY,
};
pub use log::{LogSource, UpdateLogResult};
