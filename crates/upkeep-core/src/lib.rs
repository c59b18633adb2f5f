mod archive;
mod artifact;
mod manifest;
mod mode;
mod update_log;
mod version;

pub use archive::ArchiveType;
pub use artifact::DeliveryArtifact;
pub use manifest::UpdateManifest;
pub use mode::InstallMode;
pub use update_log::{UpdateLog, UpdateLogEntry, UPDATE_LOG_SCHEMA_VERSION};
pub use version::{compare_versions, parse_app_version, AppVersion, VersionStatus};

#[cfg(test)]
mod tests;
