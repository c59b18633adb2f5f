use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Copies `src` into `dst`, creating directories as needed and replacing
/// any file already present at a destination path.
pub(crate) fn overlay_dir(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    let mut copied = 0;
    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&src_path)
            .with_context(|| format!("failed to stat {}", src_path.display()))?;
        if metadata.is_dir() {
            if dst_path.is_file() {
                fs::remove_file(&dst_path)
                    .with_context(|| format!("failed to replace {}", dst_path.display()))?;
            }
            copied += overlay_dir(&src_path, &dst_path)?;
            continue;
        }

        if fs::symlink_metadata(&dst_path).is_ok_and(|existing| existing.is_dir()) {
            fs::remove_dir_all(&dst_path)
                .with_context(|| format!("failed to replace {}", dst_path.display()))?;
        }

        #[cfg(unix)]
        if metadata.file_type().is_symlink() {
            let target = fs::read_link(&src_path)
                .with_context(|| format!("failed to read symlink {}", src_path.display()))?;
            remove_file_if_exists(&dst_path)
                .with_context(|| format!("failed to replace {}", dst_path.display()))?;
            std::os::unix::fs::symlink(&target, &dst_path).with_context(|| {
                format!(
                    "failed to create symlink {} -> {}",
                    dst_path.display(),
                    target.display()
                )
            })?;
            copied += 1;
            continue;
        }

        fs::copy(&src_path, &dst_path).with_context(|| {
            format!(
                "failed to copy {} to {}",
                src_path.display(),
                dst_path.display()
            )
        })?;
        copied += 1;
    }
    Ok(copied)
}
