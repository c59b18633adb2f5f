use std::cmp::Ordering;
use std::fmt;

use anyhow::{anyhow, Context};
use semver::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    UpdateAvailable,
    AheadOfRemote,
    UpToDate,
}

impl VersionStatus {
    pub fn message(self) -> &'static str {
        match self {
            Self::UpdateAvailable => "A new version is available.",
            Self::AheadOfRemote => "This build is newer than the published release (pre-release).",
            Self::UpToDate => "You are running the latest version.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateAvailable => "update-available",
            Self::AheadOfRemote => "ahead-of-remote",
            Self::UpToDate => "up-to-date",
        }
    }
}

/// An application version: a semver core plus the optional fourth numeric
/// component some release pipelines append (`1.2.3.4`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppVersion {
    pub version: Version,
    pub revision: u64,
}

impl AppVersion {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            revision: 0,
        }
    }

    /// Release precedence: build metadata is ignored, the revision breaks
    /// ties between otherwise equal versions.
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.version
            .cmp_precedence(&other.version)
            .then(self.revision.cmp(&other.revision))
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = &self.version;
        write!(f, "{}.{}.{}", version.major, version.minor, version.patch)?;
        if self.revision != 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !version.pre.is_empty() {
            write!(f, "-{}", version.pre)?;
        }
        if !version.build.is_empty() {
            write!(f, "+{}", version.build)?;
        }
        Ok(())
    }
}

pub fn compare_versions(local: &AppVersion, remote: &AppVersion) -> VersionStatus {
    match local.cmp_precedence(remote) {
        Ordering::Less => VersionStatus::UpdateAvailable,
        Ordering::Greater => VersionStatus::AheadOfRemote,
        Ordering::Equal => VersionStatus::UpToDate,
    }
}

/// Parses `1`, `1.2`, `1.2.3`, `v1.2.3-beta` and four-part `1.2.3.4` versions.
pub fn parse_app_version(input: &str) -> anyhow::Result<AppVersion> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(anyhow!("version must not be empty"));
    }

    if let Ok(version) = Version::parse(trimmed) {
        return Ok(AppVersion::new(version));
    }

    let core_end = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(core_end);
    let parts = core.split('.').collect::<Vec<_>>();
    if parts.is_empty() || parts.len() > 4 {
        return Err(anyhow!("unsupported version shape: {input}"));
    }
    let mut numbers = Vec::with_capacity(parts.len());
    for part in &parts {
        let number = part
            .parse::<u64>()
            .with_context(|| format!("invalid version component '{part}' in {input}"))?;
        numbers.push(number);
    }
    numbers.resize(4, 0);

    let version = Version::parse(&format!(
        "{}.{}.{}{}",
        numbers[0], numbers[1], numbers[2], suffix
    ))
    .with_context(|| format!("invalid version: {input}"))?;
    Ok(AppVersion {
        version,
        revision: numbers[3],
    })
}
