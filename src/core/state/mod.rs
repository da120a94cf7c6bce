mod lockfile;
mod settings;

pub use lockfile::{LockedArtifact, Lockfile, LOCKFILE_NAME};
pub use settings::{default_settings_path, Settings};
