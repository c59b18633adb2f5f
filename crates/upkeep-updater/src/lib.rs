mod config;
mod error;
mod events;
mod fetcher;
mod reconcile;
mod session;

pub use config::{UpdaterConfig, DEFAULT_APP_NAME, DEFAULT_CONFIG_FILE};
pub use error::{FetchError, UpdateFailure};
pub use events::{CancelToken, DownloadProgress, UpdateEvent, UpdateStatus};
pub use fetcher::{part_path, FetchOrigin, PackageFetcher};
pub use reconcile::{
    classify_launch, reconcile_startup, LaunchKind, StartupState, UpdateTime, UPDATED_MARKER,
    UPDATE_TIME_FORMAT,
};
pub use session::{UpdateHandle, Updater};
