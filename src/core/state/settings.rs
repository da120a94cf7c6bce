use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{ResolveError, ResolveResult};
use crate::core::http::APP_USER_AGENT;
use crate::core::registry::MODRINTH_PROD_BASE_URL;
use crate::core::resolver::{DedupPolicy, Denylist, LockIndex, ResolvePolicy, DEFAULT_MAX_DEPTH};

const APP_DIR_NAME: &str = "modpull";
const SETTINGS_FILE: &str = "settings.json";

/// Persistent defaults, read from `settings.json`. Command-line flags win.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub user_agent: String,
    pub loader: String,
    pub denylist: Denylist,
    pub dedup: DedupPolicy,
    pub max_depth: usize,
    pub server_only: bool,
    pub strict: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: MODRINTH_PROD_BASE_URL.into(),
            user_agent: APP_USER_AGENT.into(),
            loader: "fabric".into(),
            denylist: Denylist::default(),
            dedup: DedupPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            server_only: false,
            strict: false,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, or from the default location if a file
    /// exists there. A missing default file yields `Settings::default()`; a
    /// missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> ResolveResult<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match default_settings_path() {
                Some(path) if path.is_file() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> ResolveResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|e| {
            ResolveError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn policy(&self) -> ResolvePolicy {
        ResolvePolicy {
            dedup: self.dedup,
            max_depth: self.max_depth,
            server_only: self.server_only,
            denylist: self.denylist.clone(),
            locked: LockIndex::default(),
        }
    }
}

/// `<config dir>/modpull/settings.json`, when the platform has a config dir.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_DIR_NAME).join(SETTINGS_FILE))
}
