mod dispatch;
mod extract;
mod fs_utils;
mod launcher;
mod layout;
mod types;

pub use dispatch::{dispatch_install, InstallRequest, InstallTarget};
pub use extract::extract_archive;
pub use fs_utils::{remove_dir_if_exists, remove_file_if_exists};
pub use launcher::{ProcessLauncher, SystemLauncher};
pub use layout::{default_data_dir, UpdateLayout};
pub use types::{InstallError, InstallOutcome};

#[cfg(test)]
mod tests;
