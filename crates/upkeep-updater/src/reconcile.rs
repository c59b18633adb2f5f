use chrono::NaiveDateTime;
use tracing::{info, warn};
use upkeep_installer::{remove_dir_if_exists, remove_file_if_exists};
use upkeep_store::{keys, SettingsStore, StoreError};

/// First of the two arguments the external updater passes when it relaunches
/// the application.
pub const UPDATED_MARKER: &str = "updated";
pub const UPDATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTime {
    At(String),
    Unknown,
}

impl UpdateTime {
    pub fn display(&self) -> &str {
        match self {
            Self::At(value) => value,
            Self::Unknown => keys::UNKNOWN_UPDATE_TIME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchKind {
    Normal,
    AfterUpdate(UpdateTime),
}

/// Result of startup reconciliation, handed to whatever renders the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupState {
    pub just_updated: bool,
    pub update_time: UpdateTime,
    pub launch_count: u64,
}

/// Exactly `[UPDATED_MARKER, timestamp]` is a post-update launch; any other
/// shape is a normal one. A timestamp that does not parse still counts as a
/// post-update launch, with an unknown time. A valid timestamp is kept as
/// passed, only trimmed.
pub fn classify_launch<S: AsRef<str>>(args: &[S]) -> LaunchKind {
    let [marker, timestamp] = args else {
        return LaunchKind::Normal;
    };
    if marker.as_ref() != UPDATED_MARKER {
        return LaunchKind::Normal;
    }
    let timestamp = timestamp.as_ref().trim();
    match NaiveDateTime::parse_from_str(timestamp, UPDATE_TIME_FORMAT) {
        Ok(_) => LaunchKind::AfterUpdate(UpdateTime::At(timestamp.to_string())),
        Err(err) => {
            warn!(timestamp, error = %err, "post-update timestamp is malformed");
            LaunchKind::AfterUpdate(UpdateTime::Unknown)
        }
    }
}

pub fn reconcile_startup<S: AsRef<str>>(
    args: &[S],
    store: &SettingsStore,
) -> Result<StartupState, StoreError> {
    let launch_count = bump_counter(store, keys::LAUNCH_COUNT)?;
    clean_installer_artifact(store)?;

    let LaunchKind::AfterUpdate(update_time) = classify_launch(args) else {
        return Ok(StartupState {
            just_updated: false,
            update_time: last_update_time(store)?,
            launch_count,
        });
    };

    store.set(keys::LAST_UPDATE_TIME, update_time.display())?;
    let update_count = bump_counter(store, keys::UPDATE_COUNT)?;

    if let Some(staging) = store.pending_update()? {
        if let Err(err) = remove_dir_if_exists(&staging) {
            warn!(staging = %staging.display(), error = %err, "failed to remove staging directory");
        }
        store.clear_pending_update()?;
    }

    info!(
        update_time = update_time.display(),
        update_count,
        launch_count,
        "first launch after update"
    );
    Ok(StartupState {
        just_updated: true,
        update_time,
        launch_count,
    })
}

/// A counter holding a hand-edited, non-numeric value restarts at 1 instead
/// of failing startup.
fn bump_counter(store: &SettingsStore, key: &str) -> Result<u64, StoreError> {
    match store.increment(key) {
        Err(StoreError::InvalidValue { key, value }) => {
            warn!(key = %key, value = %value, "counter is malformed; restarting it");
            store.set(&key, "1")?;
            Ok(1)
        }
        other => other,
    }
}

fn last_update_time(store: &SettingsStore) -> Result<UpdateTime, StoreError> {
    Ok(match store.get(keys::LAST_UPDATE_TIME)? {
        Some(value) if !value.trim().is_empty() && value != keys::UNKNOWN_UPDATE_TIME => {
            UpdateTime::At(value)
        }
        _ => UpdateTime::Unknown,
    })
}

/// Installer-mode artifacts are deleted on the launch after the installer
/// was started, never before.
fn clean_installer_artifact(store: &SettingsStore) -> Result<(), StoreError> {
    let Some(artifact) = store.pending_artifact_cleanup()? else {
        return Ok(());
    };
    match remove_file_if_exists(&artifact) {
        Ok(()) => {
            info!(artifact = %artifact.display(), "removed installer artifact");
            store.clear_pending_artifact_cleanup()
        }
        Err(err) => {
            warn!(artifact = %artifact.display(), error = %err, "failed to remove installer artifact");
            Ok(())
        }
    }
}
