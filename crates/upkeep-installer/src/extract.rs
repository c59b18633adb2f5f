use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use upkeep_core::ArchiveType;

use crate::fs_utils::{overlay_dir, remove_dir_if_exists};

/// Unpacks `archive_path` into `staging_dir`. The archive is first expanded
/// into a scratch directory under `tmp_root`, then overlaid onto the staging
/// directory so files left there by an interrupted run are replaced.
pub fn extract_archive(
    archive_path: &Path,
    archive_type: ArchiveType,
    staging_dir: &Path,
    tmp_root: &Path,
) -> Result<usize> {
    extract_archive_with_runner(archive_path, archive_type, staging_dir, tmp_root, run_command)
}

pub(crate) fn extract_archive_with_runner<RunCommand>(
    archive_path: &Path,
    archive_type: ArchiveType,
    staging_dir: &Path,
    tmp_root: &Path,
    mut run: RunCommand,
) -> Result<usize>
where
    RunCommand: FnMut(&mut Command, &str) -> Result<()>,
{
    let raw_dir = make_tmp_dir(tmp_root, "extract")?;
    let result = (|| -> Result<usize> {
        match archive_type {
            ArchiveType::Zip => extract_zip(archive_path, &raw_dir, &mut run)?,
            ArchiveType::TarGz => extract_tar_gz(archive_path, &raw_dir, &mut run)?,
            other => {
                return Err(anyhow!(
                    "archive type '{}' cannot be extracted",
                    other.as_str()
                ))
            }
        }
        let copied = overlay_dir(&raw_dir, staging_dir)?;
        if copied == 0 {
            return Err(anyhow!(
                "archive {} produced no files",
                archive_path.display()
            ));
        }
        Ok(copied)
    })();

    let _ = remove_dir_if_exists(&raw_dir);
    if let Ok(copied) = &result {
        info!(
            archive = %archive_path.display(),
            staging = %staging_dir.display(),
            files = copied,
            "update archive extracted"
        );
    }
    result
}

fn make_tmp_dir(tmp_root: &Path, prefix: &str) -> Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before unix epoch")?
        .as_nanos();
    let dir = tmp_root.join(format!("{prefix}-{}-{nanos}", std::process::id()));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed creating tmp dir: {}", dir.display()))?;
    Ok(dir)
}

fn extract_tar_gz<RunCommand>(archive_path: &Path, dst: &Path, run: &mut RunCommand) -> Result<()>
where
    RunCommand: FnMut(&mut Command, &str) -> Result<()>,
{
    run(
        Command::new("tar")
            .arg("-xzf")
            .arg(archive_path)
            .arg("-C")
            .arg(dst),
        "failed to extract tar.gz archive",
    )
}

fn extract_zip<RunCommand>(archive_path: &Path, dst: &Path, run: &mut RunCommand) -> Result<()>
where
    RunCommand: FnMut(&mut Command, &str) -> Result<()>,
{
    if cfg!(windows) {
        let mut command = Command::new("powershell");
        command.arg("-NoProfile").arg("-Command").arg(format!(
            "Expand-Archive -LiteralPath '{}' -DestinationPath '{}' -Force",
            escape_ps_single_quote(archive_path),
            escape_ps_single_quote(dst)
        ));
        if run(
            &mut command,
            "failed to extract zip archive with powershell",
        )
        .is_ok()
        {
            return Ok(());
        }
    }

    let mut unzip_command = Command::new("unzip");
    unzip_command
        .arg("-o")
        .arg("-q")
        .arg(archive_path)
        .arg("-d")
        .arg(dst);
    match run(
        &mut unzip_command,
        "failed to extract zip archive with unzip",
    ) {
        Ok(()) => return Ok(()),
        Err(err) => debug!(error = %err, "unzip unavailable or failed; trying tar"),
    }

    run(
        Command::new("tar")
            .arg("-xf")
            .arg(archive_path)
            .arg("-C")
            .arg(dst),
        "failed to extract zip archive with tar fallback",
    )
}

fn escape_ps_single_quote(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}

pub(crate) fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}
