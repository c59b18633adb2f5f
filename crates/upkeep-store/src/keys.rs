pub const UPDATE_URL: &str = "UpdateUrl";
pub const UPDATE_LOG_URL: &str = "UpdateLogUrl";
pub const LAST_UPDATE_TIME: &str = "LastUpdateTime";
pub const PENDING_UPDATE_PATH: &str = "PendingUpdatePath";
pub const PENDING_ARTIFACT_CLEANUP: &str = "PendingArtifactCleanup";
pub const RETRY_COUNT: &str = "RetryCount";
pub const RETRY_DELAY: &str = "RetryDelay";
pub const LOCALE: &str = "Locale";
pub const LAUNCH_COUNT: &str = "LaunchCount";
pub const UPDATE_COUNT: &str = "UpdateCount";
pub const LEGACY_IMPORT_COMPLETED: &str = "LegacyImportCompleted";

pub const UNKNOWN_UPDATE_TIME: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingDefault {
    pub key: &'static str,
    pub value: &'static str,
}

const fn default(key: &'static str, value: &'static str) -> SettingDefault {
    SettingDefault { key, value }
}

pub const DEFAULT_SETTINGS: &[SettingDefault] = &[
    default(UPDATE_URL, "https://updates.example.invalid/manifest.json"),
    default(
        UPDATE_LOG_URL,
        "https://updates.example.invalid/update-log.json",
    ),
    default(LAST_UPDATE_TIME, UNKNOWN_UPDATE_TIME),
    default(PENDING_UPDATE_PATH, ""),
    default(PENDING_ARTIFACT_CLEANUP, ""),
    default(RETRY_COUNT, "3"),
    default(RETRY_DELAY, "2000"),
    default(LOCALE, "en-US"),
    default(LAUNCH_COUNT, "0"),
    default(UPDATE_COUNT, "0"),
];

pub const DEFAULT_VISIBILITY: &[(&str, bool)] = &[
    ("Weather", true),
    ("Music", true),
    ("Map", true),
    ("UpdateButton", true),
    ("Settings", true),
];

/// Spellings used by earlier releases, mapped to the current key names.
pub const LEGACY_KEY_RENAMES: &[(&str, &str)] = &[
    ("UpdateURL", UPDATE_URL),
    ("UpdateLogURL", UPDATE_LOG_URL),
    ("LastUpdate", LAST_UPDATE_TIME),
];
