use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use upkeep_core::{InstallMode, UpdateManifest};
use upkeep_installer::{
    dispatch_install, InstallRequest, InstallTarget, ProcessLauncher, SystemLauncher, UpdateLayout,
};
use upkeep_resolver::{build_client, RetryPolicy};
use upkeep_store::SettingsStore;

use crate::config::UpdaterConfig;
use crate::error::{FetchError, UpdateFailure};
use crate::events::{CancelToken, UpdateEvent, UpdateStatus};
use crate::fetcher::PackageFetcher;

const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Runs update sessions against a shared settings store. At most one
/// session is in flight per `Updater`; a second `begin` while one runs is
/// refused with [`UpdateFailure::Busy`].
#[derive(Debug)]
pub struct Updater {
    store: Arc<SettingsStore>,
    layout: UpdateLayout,
    fetcher: PackageFetcher,
    target: InstallTarget,
    preferred_mode: Option<InstallMode>,
    in_flight: Arc<AtomicBool>,
}

pub struct UpdateHandle {
    pub events: Receiver<UpdateEvent>,
    cancel: CancelToken,
    join: JoinHandle<Result<UpdateStatus, UpdateFailure>>,
}

impl UpdateHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn wait(self) -> Result<UpdateStatus, UpdateFailure> {
        self.join
            .join()
            .unwrap_or_else(|_| Err(UpdateFailure::Install("update thread panicked".to_string())))
    }
}

struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Updater {
    pub fn new(
        store: Arc<SettingsStore>,
        layout: UpdateLayout,
        fetcher: PackageFetcher,
        target: InstallTarget,
    ) -> Self {
        Self {
            store,
            layout,
            fetcher,
            target,
            preferred_mode: None,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &UpdaterConfig, store: Arc<SettingsStore>) -> Result<Self> {
        let settings = config.http_settings();
        let client = build_client(&settings, settings.download_timeout)
            .context("failed to build download client")?;
        let target = InstallTarget {
            install_dir: config.resolve_install_dir()?,
            updater_path: config.resolve_updater_path()?,
            exit_after_installer: config.exit_after_installer,
        };
        Ok(Self::new(store, config.layout()?, PackageFetcher::new(client), target)
            .with_preferred_mode(config.preferred_mode()))
    }

    pub fn with_preferred_mode(mut self, preferred_mode: Option<InstallMode>) -> Self {
        self.preferred_mode = preferred_mode;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn begin(&self, manifest: UpdateManifest) -> Result<UpdateHandle, UpdateFailure> {
        self.begin_with_launcher(manifest, SystemLauncher)
    }

    /// Starts the session on a background thread. Progress and the terminal
    /// status arrive on `UpdateHandle::events`.
    pub fn begin_with_launcher<L>(
        &self,
        manifest: UpdateManifest,
        launcher: L,
    ) -> Result<UpdateHandle, UpdateFailure>
    where
        L: ProcessLauncher + Send + 'static,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("update requested while another session is running");
            return Err(UpdateFailure::Busy);
        }
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let (sender, events) = mpsc::channel();
        let cancel = CancelToken::new();
        let session = Session {
            store: Arc::clone(&self.store),
            layout: self.layout.clone(),
            fetcher: self.fetcher.clone(),
            target: self.target.clone(),
            preferred_mode: self.preferred_mode.clone(),
            cancel: cancel.clone(),
            sender,
        };

        let join = thread::Builder::new()
            .name("upkeep-update".to_string())
            .spawn(move || {
                let _guard = guard;
                session.run(manifest, launcher)
            })
            .map_err(|err| UpdateFailure::Install(format!("failed to start update thread: {err}")))?;

        Ok(UpdateHandle {
            events,
            cancel,
            join,
        })
    }
}

struct Session {
    store: Arc<SettingsStore>,
    layout: UpdateLayout,
    fetcher: PackageFetcher,
    target: InstallTarget,
    preferred_mode: Option<InstallMode>,
    cancel: CancelToken,
    sender: Sender<UpdateEvent>,
}

impl Session {
    fn emit(&self, event: UpdateEvent) {
        // The receiver going away only means nobody is watching.
        let _ = self.sender.send(event);
    }

    fn run<L: ProcessLauncher>(self, manifest: UpdateManifest, mut launcher: L) -> Result<UpdateStatus, UpdateFailure> {
        let result = self.execute(&manifest, &mut launcher);
        match &result {
            Ok(status) => {
                info!(version = %status.version, mode = status.mode.as_str(), "update handed off");
                self.emit(UpdateEvent::Finished(status.clone()));
            }
            Err(failure) => {
                error!(status = failure.status(), error = %failure, "update failed");
                self.emit(UpdateEvent::Failed(failure.clone()));
            }
        }
        result
    }

    fn execute(
        &self,
        manifest: &UpdateManifest,
        launcher: &mut dyn ProcessLauncher,
    ) -> Result<UpdateStatus, UpdateFailure> {
        let artifact = manifest
            .select_artifact(self.preferred_mode.as_ref())
            .ok_or_else(|| UpdateFailure::Parse("manifest lists no delivery modes".to_string()))?;
        if let InstallMode::Unknown(raw) = &artifact.mode {
            return Err(UpdateFailure::UnknownMode(raw.clone()));
        }
        let archive_type = artifact
            .archive_type()
            .map_err(|err| UpdateFailure::Parse(format!("{err:#}")))?;
        let version = manifest.latest_version.trim().to_string();

        self.emit(UpdateEvent::Started {
            version: version.clone(),
            mode: artifact.mode.clone(),
            url: artifact.url.clone(),
        });
        self.layout
            .ensure_base_dirs()
            .map_err(|err| UpdateFailure::Storage(format!("{err:#}")))?;

        let retry = RetryPolicy::from_store(&self.store)?;
        let destination = self.layout.artifact_path(&version, archive_type);
        let mut attempt = 1;
        let verified = loop {
            let fetched = self.fetcher.fetch_verified(
                &artifact.url,
                &destination,
                &artifact.checksums,
                &self.cancel,
                &mut |event| self.emit(event),
            );
            match fetched {
                Ok((verified, _)) => break verified,
                Err(err) if err.is_retryable() && attempt < retry.attempts => {
                    warn!(attempt, attempts = retry.attempts, error = %err, "artifact fetch failed; retrying");
                    self.emit(UpdateEvent::Retrying {
                        attempt,
                        attempts: retry.attempts,
                        reason: err.to_string(),
                    });
                    if !self.pause(retry.delay) {
                        return Err(FetchError::Cancelled.into());
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        if self.cancel.is_cancelled() {
            return Err(UpdateFailure::Cancelled);
        }
        self.emit(UpdateEvent::Installing {
            mode: artifact.mode.clone(),
        });
        let outcome = dispatch_install(
            &self.layout,
            &self.store,
            &self.target,
            InstallRequest {
                mode: &artifact.mode,
                artifact: &verified,
                archive_type,
                version: &version,
            },
            launcher,
        )?;

        Ok(UpdateStatus {
            version,
            mode: artifact.mode.clone(),
            outcome,
        })
    }

    /// Sleeps for `delay` unless cancelled first; returns false on cancel.
    fn pause(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(CANCEL_POLL.min(deadline - now));
        }
    }
}
