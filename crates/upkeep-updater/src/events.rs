use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use upkeep_core::InstallMode;
use upkeep_installer::InstallOutcome;

use crate::error::UpdateFailure;

/// Shared flag checked between download chunks and retry sleeps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    pub total: Option<u64>,
    pub elapsed: Duration,
}

impl DownloadProgress {
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) | None => None,
            Some(total) => Some((self.downloaded.min(total) as f64) / (total as f64)),
        }
    }

    pub fn bytes_per_second(&self) -> u64 {
        let millis = self.elapsed.as_millis();
        if millis == 0 {
            return 0;
        }
        ((u128::from(self.downloaded) * 1000) / millis) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub version: String,
    pub mode: InstallMode,
    pub outcome: InstallOutcome,
}

impl UpdateStatus {
    pub fn exit_host(&self) -> bool {
        self.outcome.exit_host()
    }

    pub fn message(&self) -> String {
        format!(
            "update to {} handed off ({}): {}",
            self.version,
            self.mode.as_str(),
            self.outcome.status_line()
        )
    }
}

/// Everything a session reports, in order, over its single channel.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    Started {
        version: String,
        mode: InstallMode,
        url: String,
    },
    Reusing {
        path: PathBuf,
    },
    Progress(DownloadProgress),
    Verifying {
        path: PathBuf,
    },
    Retrying {
        attempt: u32,
        attempts: u32,
        reason: String,
    },
    Installing {
        mode: InstallMode,
    },
    Finished(UpdateStatus),
    Failed(UpdateFailure),
}

impl UpdateEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Failed(_))
    }
}
