use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use reqwest::blocking::Client;
use tracing::{debug, info, warn};
use upkeep_installer::remove_file_if_exists;
use upkeep_security::{verify_artifact, VerifiedArtifact};

use crate::error::FetchError;
use crate::events::{CancelToken, DownloadProgress, UpdateEvent};

const CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    Reused,
    Downloaded,
}

#[derive(Debug, Clone)]
pub struct PackageFetcher {
    client: Client,
}

impl PackageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns a verified artifact at `destination`. An existing file there
    /// is reused only when it passes verification; anything else is removed
    /// and fetched again. A freshly downloaded file that fails verification
    /// is deleted before the error is returned.
    pub fn fetch_verified(
        &self,
        url: &str,
        destination: &Path,
        checksums: &[String],
        cancel: &CancelToken,
        on_event: &mut dyn FnMut(UpdateEvent),
    ) -> Result<(VerifiedArtifact, FetchOrigin), FetchError> {
        if destination.is_file() {
            on_event(UpdateEvent::Verifying {
                path: destination.to_path_buf(),
            });
            match verify_artifact(destination, checksums) {
                Ok(verified) => {
                    info!(path = %destination.display(), "reusing previously downloaded artifact");
                    on_event(UpdateEvent::Reusing {
                        path: destination.to_path_buf(),
                    });
                    return Ok((verified, FetchOrigin::Reused));
                }
                Err(err) => {
                    warn!(
                        path = %destination.display(),
                        error = %format!("{err:#}"),
                        "existing artifact failed verification; downloading again"
                    );
                    remove_file_if_exists(destination).map_err(|source| {
                        FetchError::io(
                            format!("failed to remove stale artifact {}", destination.display()),
                            source,
                        )
                    })?;
                }
            }
        }

        self.download(url, destination, cancel, &mut |progress| {
            on_event(UpdateEvent::Progress(progress))
        })?;

        on_event(UpdateEvent::Verifying {
            path: destination.to_path_buf(),
        });
        match verify_artifact(destination, checksums) {
            Ok(verified) => Ok((verified, FetchOrigin::Downloaded)),
            Err(err) => {
                if let Err(remove_err) = remove_file_if_exists(destination) {
                    warn!(
                        path = %destination.display(),
                        error = %remove_err,
                        "failed to remove artifact that failed verification"
                    );
                }
                Err(FetchError::Integrity(err))
            }
        }
    }

    /// Streams `url` into `<destination>.part` and renames it into place once
    /// the body is complete. The working file never survives a failure or a
    /// cancellation.
    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> Result<PathBuf, FetchError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                FetchError::io(
                    format!("failed to create download dir {}", parent.display()),
                    source,
                )
            })?;
        }

        let part = part_path(destination);
        let result = self.stream_to(url, &part, cancel, on_progress);
        if let Err(err) = result {
            if let Err(remove_err) = remove_file_if_exists(&part) {
                warn!(path = %part.display(), error = %remove_err, "failed to remove partial download");
            }
            return Err(err);
        }

        remove_file_if_exists(destination).map_err(|source| {
            FetchError::io(
                format!("failed to replace {}", destination.display()),
                source,
            )
        })?;
        fs::rename(&part, destination).map_err(|source| {
            FetchError::io(
                format!(
                    "failed to move download into place at {}",
                    destination.display()
                ),
                source,
            )
        })?;
        Ok(destination.to_path_buf())
    }

    fn stream_to(
        &self,
        url: &str,
        part: &Path,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let started = Instant::now();
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let total = response.content_length();
        debug!(url, total = ?total, "download started");

        let mut file = File::create(part).map_err(|source| {
            FetchError::io(format!("failed to create {}", part.display()), source)
        })?;
        let mut buffer = vec![0_u8; CHUNK_BYTES];
        let mut downloaded = 0_u64;
        on_progress(DownloadProgress {
            downloaded,
            total,
            elapsed: started.elapsed(),
        });

        loop {
            if cancel.is_cancelled() {
                info!(url, downloaded, "download cancelled");
                return Err(FetchError::Cancelled);
            }
            let read = response
                .read(&mut buffer)
                .map_err(|source| FetchError::Stream {
                    url: url.to_string(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).map_err(|source| {
                FetchError::io(format!("failed to write {}", part.display()), source)
            })?;
            downloaded += read as u64;
            on_progress(DownloadProgress {
                downloaded,
                total,
                elapsed: started.elapsed(),
            });
        }

        if let Some(expected) = total {
            if downloaded != expected {
                return Err(FetchError::Incomplete {
                    url: url.to_string(),
                    expected,
                    received: downloaded,
                });
            }
        }
        file.sync_all().map_err(|source| {
            FetchError::io(format!("failed to flush {}", part.display()), source)
        })?;
        info!(
            url,
            bytes = downloaded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "download finished"
        );
        Ok(())
    }
}

pub fn part_path(destination: &Path) -> PathBuf {
    destination.with_file_name(format!(
        "{}.part",
        destination
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("artifact")
    ))
}
