use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use upkeep_core::ArchiveType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLayout {
    data_dir: PathBuf,
}

impl UpdateLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn settings_db_path(&self) -> PathBuf {
        self.data_dir.join("settings.db")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn staging_root(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    pub fn download_dir(&self, version: &str) -> PathBuf {
        self.downloads_dir().join(sanitize_component(version))
    }

    pub fn artifact_path(&self, version: &str, archive_type: ArchiveType) -> PathBuf {
        self.download_dir(version)
            .join(format!("update.{}", archive_type.cache_extension()))
    }

    pub fn staging_dir(&self, version: &str) -> PathBuf {
        self.staging_root().join(sanitize_component(version))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.cache_dir(),
            self.downloads_dir(),
            self.staging_root(),
            self.tmp_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

fn sanitize_component(value: &str) -> String {
    let cleaned = value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | '+') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    match cleaned.trim_matches('.') {
        "" => "unversioned".to_string(),
        _ => cleaned,
    }
}

pub fn default_data_dir(app_name: &str) -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows data directory")?;
        return Ok(PathBuf::from(app_data).join(app_name));
    }

    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.trim().is_empty() {
            return Ok(PathBuf::from(xdg).join(app_name));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set; cannot resolve data directory")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join(app_name))
}
