mod error;
pub mod keys;
mod legacy;
mod migrations;
mod store;

pub use error::StoreError;
pub use keys::{SettingDefault, DEFAULT_SETTINGS, DEFAULT_VISIBILITY, UNKNOWN_UPDATE_TIME};
pub use legacy::{ImportReport, LegacySources, LEGACY_VISIBILITY_FILE_NAME};
pub use migrations::{Migration, CURRENT_SCHEMA_VERSION, MIGRATIONS, SCHEMA_VERSION_KEY};
pub use store::{InitReport, SettingsStore, StoreOrigin};
