use std::path::PathBuf;

use thiserror::Error;
use upkeep_store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The archive is staged and the external updater is running; the host
    /// must exit so its files can be replaced.
    UpdaterLaunched {
        staging_dir: PathBuf,
        pid: u32,
    },
    InstallerLaunched {
        installer: PathBuf,
        pid: u32,
        exit_host: bool,
    },
}

impl InstallOutcome {
    pub fn exit_host(&self) -> bool {
        match self {
            Self::UpdaterLaunched { .. } => true,
            Self::InstallerLaunched { exit_host, .. } => *exit_host,
        }
    }

    pub fn status_line(&self) -> String {
        match self {
            Self::UpdaterLaunched { staging_dir, pid } => format!(
                "update staged at {}; updater running (pid {pid})",
                staging_dir.display()
            ),
            Self::InstallerLaunched { installer, pid, .. } => format!(
                "installer {} running (pid {pid})",
                installer.display()
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("unknown install mode '{0}'; refusing to guess an install strategy")]
    UnknownMode(String),

    #[error("archive mode requires a zip or tar.gz artifact, got '{0}'")]
    NotAnArchive(&'static str),

    #[error("updater executable not found at {}", .0.display())]
    MissingUpdater(PathBuf),

    #[error("extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    #[error("failed to launch {}: {cause:#}", program.display())]
    Launch {
        program: PathBuf,
        cause: anyhow::Error,
    },

    #[error("failed to record install state: {0}")]
    Storage(#[from] StoreError),
}
