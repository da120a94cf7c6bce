use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::downloader::Artifact;
use crate::core::error::{ResolveError, ResolveResult};
use crate::core::resolver::{LockIndex, RootSpec, Target};

pub const LOCKFILE_NAME: &str = "modpull.lock";
const LOCKFILE_FORMAT: u32 = 1;

/// The outcome of a run, recorded so the next run picks the same versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub format: u32,
    pub loader: String,
    pub game_version: String,
    /// Requested projects as written on the command line, sorted.
    pub roots: Vec<String>,
    pub artifacts: Vec<LockedArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedArtifact {
    pub project_id: String,
    pub version_id: String,
    pub version_number: String,
    pub filename: String,
    pub sha512: String,
}

impl From<&Artifact> for LockedArtifact {
    fn from(artifact: &Artifact) -> Self {
        Self {
            project_id: artifact.project_id.clone(),
            version_id: artifact.version_id.clone(),
            version_number: artifact.version_number.clone(),
            filename: artifact.filename.clone(),
            sha512: artifact.sha512.clone(),
        }
    }
}

impl Lockfile {
    pub fn new(target: &Target, roots: &[RootSpec], artifacts: &[Artifact]) -> Self {
        Self {
            format: LOCKFILE_FORMAT,
            loader: target.loader.clone(),
            game_version: target.game_version.clone(),
            roots: root_keys(roots),
            artifacts: artifacts.iter().map(LockedArtifact::from).collect(),
        }
    }

    /// A lockfile is reused only for the exact same target and requested
    /// projects (pins included). Anything else resolves afresh.
    pub fn is_up_to_date(&self, target: &Target, roots: &[RootSpec]) -> bool {
        self.format == LOCKFILE_FORMAT
            && self.loader == target.loader
            && self.game_version == target.game_version
            && self.roots == root_keys(roots)
    }

    pub fn index(&self) -> LockIndex {
        let mut index = LockIndex::default();
        for artifact in &self.artifacts {
            index.insert(&artifact.project_id, &artifact.version_id);
        }
        index
    }

    /// Read a lockfile. A missing file is `None`; so is one that cannot be
    /// parsed, which is reported and then ignored.
    pub async fn load(path: &Path) -> ResolveResult<Option<Self>> {
        if !path.is_file() {
            debug!("No lockfile at {:?}", path);
            return Ok(None);
        }

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ResolveError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        match serde_json::from_str(&raw) {
            Ok(lockfile) => Ok(Some(lockfile)),
            Err(e) => {
                warn!("Ignoring unreadable lockfile {:?}: {e}", path);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, path: &Path) -> ResolveResult<()> {
        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');

        tokio::fs::write(path, data)
            .await
            .map_err(|source| ResolveError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Saved lockfile with {} artifacts to {:?}", self.artifacts.len(), path);
        Ok(())
    }
}

fn root_keys(roots: &[RootSpec]) -> Vec<String> {
    roots
        .iter()
        .map(ToString::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
