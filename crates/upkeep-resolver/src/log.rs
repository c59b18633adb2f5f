use std::fs;
use std::path::Path;

use tracing::warn;
use upkeep_core::UpdateLog;

use crate::check::{read_cache, write_cache, VersionResolver};
use crate::error::ResolveError;
use crate::http::{fetch_text, with_retries};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Remote,
    Cached,
    Bundled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLogResult {
    pub log: UpdateLog,
    pub source: LogSource,
}

impl VersionResolver {
    /// Release notes for display only: remote, then the cached copy, then
    /// the log shipped with the application.
    pub fn fetch_update_log(
        &self,
        log_url: &str,
        bundled: Option<&Path>,
    ) -> Result<UpdateLogResult, ResolveError> {
        let remote = with_retries(self.retry, "update-log", |_| {
            fetch_text(&self.client, log_url)
        })
        .and_then(|raw| parse_log(&raw, log_url).map(|log| (raw, log)));

        let remote_err = match remote {
            Ok((raw, log)) => {
                write_cache(&self.update_log_cache_path(), &raw);
                return Ok(UpdateLogResult {
                    log,
                    source: LogSource::Remote,
                });
            }
            Err(err) => err,
        };
        warn!(url = log_url, error = %remote_err, "update log fetch failed; trying local copies");

        let cache_path = self.update_log_cache_path();
        if let Some(raw) = read_cache(&cache_path) {
            match parse_log(&raw, &cache_path.display().to_string()) {
                Ok(log) => {
                    return Ok(UpdateLogResult {
                        log,
                        source: LogSource::Cached,
                    })
                }
                Err(err) => warn!(error = %err, "cached update log is unusable"),
            }
        }

        if let Some(path) = bundled {
            match fs::read_to_string(path) {
                Ok(raw) => {
                    let log = parse_log(&raw, &path.display().to_string())?;
                    return Ok(UpdateLogResult {
                        log,
                        source: LogSource::Bundled,
                    });
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "bundled update log unreadable")
                }
            }
        }

        Err(ResolveError::Unavailable {
            what: "update log",
            url: log_url.to_string(),
            cause: Box::new(remote_err),
        })
    }
}

fn parse_log(raw: &str, origin: &str) -> Result<UpdateLog, ResolveError> {
    UpdateLog::from_json_str(raw).map_err(|err| ResolveError::Parse {
        what: "update log",
        origin: origin.to_string(),
        reason: format!("{err:#}"),
    })
}
