use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};
use upkeep_core::{ArchiveType, InstallMode};
use upkeep_security::VerifiedArtifact;
use upkeep_store::SettingsStore;

use crate::extract::extract_archive;
use crate::launcher::ProcessLauncher;
use crate::layout::UpdateLayout;
use crate::types::{InstallError, InstallOutcome};

#[derive(Debug, Clone)]
pub struct InstallTarget {
    pub install_dir: PathBuf,
    pub updater_path: PathBuf,
    pub exit_after_installer: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    pub mode: &'a InstallMode,
    pub artifact: &'a VerifiedArtifact,
    pub archive_type: ArchiveType,
    pub version: &'a str,
}

/// Picks the install strategy for a verified artifact and runs it. Any
/// failure leaves the artifact where it is so a retry can reuse it.
pub fn dispatch_install(
    layout: &UpdateLayout,
    store: &SettingsStore,
    target: &InstallTarget,
    request: InstallRequest<'_>,
    launcher: &mut dyn ProcessLauncher,
) -> Result<InstallOutcome, InstallError> {
    dispatch_install_with_extractor(layout, store, target, request, launcher, extract_archive)
}

pub(crate) fn dispatch_install_with_extractor<Extract>(
    layout: &UpdateLayout,
    store: &SettingsStore,
    target: &InstallTarget,
    request: InstallRequest<'_>,
    launcher: &mut dyn ProcessLauncher,
    extract: Extract,
) -> Result<InstallOutcome, InstallError>
where
    Extract: FnOnce(&Path, ArchiveType, &Path, &Path) -> Result<usize>,
{
    info!(
        mode = request.mode.as_str(),
        version = request.version,
        artifact = %request.artifact.path().display(),
        "dispatching install"
    );
    match request.mode {
        InstallMode::Archive => install_archive(layout, store, target, request, launcher, extract),
        InstallMode::Installer => install_with_installer(store, target, request, launcher),
        InstallMode::Unknown(raw) => Err(InstallError::UnknownMode(raw.clone())),
    }
}

fn install_archive<Extract>(
    layout: &UpdateLayout,
    store: &SettingsStore,
    target: &InstallTarget,
    request: InstallRequest<'_>,
    launcher: &mut dyn ProcessLauncher,
    extract: Extract,
) -> Result<InstallOutcome, InstallError>
where
    Extract: FnOnce(&Path, ArchiveType, &Path, &Path) -> Result<usize>,
{
    if !request.archive_type.is_extractable() {
        return Err(InstallError::NotAnArchive(request.archive_type.as_str()));
    }
    if !target.updater_path.is_file() {
        return Err(InstallError::MissingUpdater(target.updater_path.clone()));
    }

    let staging_dir = match store.pending_update()? {
        Some(previous) => {
            info!(staging = %previous.display(), "reusing staging directory from an interrupted update");
            previous
        }
        None => layout.staging_dir(request.version),
    };

    extract(
        request.artifact.path(),
        request.archive_type,
        &staging_dir,
        &layout.tmp_dir(),
    )
    .map_err(InstallError::Extraction)?;
    store.set_pending_update(&staging_dir)?;

    let args = [
        OsString::from(staging_dir.as_os_str()),
        OsString::from(target.install_dir.as_os_str()),
    ];
    let pid = launcher
        .launch(&target.updater_path, &args)
        .map_err(|cause| InstallError::Launch {
            program: target.updater_path.clone(),
            cause,
        })?;

    Ok(InstallOutcome::UpdaterLaunched { staging_dir, pid })
}

fn install_with_installer(
    store: &SettingsStore,
    target: &InstallTarget,
    request: InstallRequest<'_>,
    launcher: &mut dyn ProcessLauncher,
) -> Result<InstallOutcome, InstallError> {
    let installer = request.artifact.path().to_path_buf();
    ensure_executable(&installer).map_err(|cause| InstallError::Launch {
        program: installer.clone(),
        cause,
    })?;

    let (program, args) = installer_command(&installer, request.archive_type);
    let pid = launcher
        .launch(&program, &args)
        .map_err(|cause| InstallError::Launch {
            program: program.clone(),
            cause,
        })?;

    // Marked only after a confirmed launch; the next startup deletes it.
    if let Err(err) = store.set_pending_artifact_cleanup(&installer) {
        warn!(
            installer = %installer.display(),
            error = %err,
            "installer launched but cleanup marker could not be recorded"
        );
    }

    Ok(InstallOutcome::InstallerLaunched {
        installer,
        pid,
        exit_host: target.exit_after_installer,
    })
}

pub(crate) fn installer_command(installer: &Path, archive_type: ArchiveType) -> (PathBuf, Vec<OsString>) {
    match archive_type {
        ArchiveType::Msi => (
            PathBuf::from("msiexec"),
            vec![OsString::from("/i"), OsString::from(installer.as_os_str())],
        ),
        ArchiveType::Pkg => (
            PathBuf::from("open"),
            vec![OsString::from(installer.as_os_str())],
        ),
        _ => (installer.to_path_buf(), Vec::new()),
    }
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> Result<()> {
    use anyhow::Context;
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();
    if permissions.mode() & 0o111 == 0 {
        permissions.set_mode(permissions.mode() | 0o755);
        std::fs::set_permissions(path, permissions)
            .with_context(|| format!("failed to set executable mode on {}", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(path: &Path) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("installer not found at {}", path.display());
    }
    Ok(())
}
