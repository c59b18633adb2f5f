use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveType;
use crate::mode::InstallMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryArtifact {
    pub mode: InstallMode,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub checksums: Vec<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub archive: Option<String>,
}

impl DeliveryArtifact {
    pub fn archive_type(&self) -> anyhow::Result<ArchiveType> {
        if let Some(archive) = &self.archive {
            return ArchiveType::parse(archive).ok_or_else(|| {
                anyhow!(
                    "unsupported archive type '{archive}' for mode '{}'; supported: zip, tar.gz, bin, msi, exe, pkg, appimage",
                    self.mode.as_str()
                )
            });
        }

        ArchiveType::infer_from_url(&self.url).ok_or_else(|| {
            anyhow!(
                "could not infer archive type from URL '{}' for mode '{}'; set archive explicitly",
                self.url,
                self.mode.as_str()
            )
        })
    }

    pub fn file_name(&self) -> anyhow::Result<String> {
        Ok(format!("update.{}", self.archive_type()?.cache_extension()))
    }
}
