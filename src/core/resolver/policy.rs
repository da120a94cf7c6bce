use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{ResolveError, ResolveResult};
use crate::core::registry::{PlatformRequirement, Project, Version};

/// Default bound on dependency nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// What the resolver targets: one loader on one game version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub loader: String,
    pub game_version: String,
}

/// A requested project, optionally pinned to one version.
///
/// Written `project` or `project@version`, where the pin matches either a
/// version id or a version number and `*` means any version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootSpec {
    pub project: String,
    pub version: Option<String>,
}

impl RootSpec {
    pub fn any(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            version: None,
        }
    }

    /// Whether `version` satisfies the pin; always true without one.
    pub fn admits(&self, version: &Version) -> bool {
        pin_matches(self.version.as_deref(), version)
    }
}

pub(crate) fn pin_matches(pin: Option<&str>, version: &Version) -> bool {
    match pin {
        Some(pin) => pin == version.id || pin == version.version_number,
        None => true,
    }
}

impl FromStr for RootSpec {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (project, version) = match s.trim().split_once('@') {
            Some((project, version)) => (project.trim(), Some(version.trim())),
            None => (s.trim(), None),
        };
        if project.is_empty() {
            return Err(ResolveError::InvalidConfig(format!(
                "{s:?} does not name a project"
            )));
        }
        let version = match version {
            None | Some("*") => None,
            Some("") => {
                return Err(ResolveError::InvalidConfig(format!(
                    "{s:?} has an empty version pin (use {project}@* for any version)"
                )))
            }
            Some(v) => Some(v.to_string()),
        };
        Ok(Self {
            project: project.to_string(),
            version,
        })
    }
}

impl fmt::Display for RootSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.project, v),
            None => f.write_str(&self.project),
        }
    }
}

/// Versions a previous run settled on, keyed by project id.
///
/// A project present here may only resolve to one of its recorded
/// versions. Projects absent from the index are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockIndex(HashMap<String, HashSet<String>>);

impl LockIndex {
    pub fn insert(&mut self, project_id: &str, version_id: &str) {
        self.0
            .entry(project_id.to_string())
            .or_default()
            .insert(version_id.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn permits(&self, version: &Version) -> bool {
        match self.0.get(&version.project_id) {
            Some(locked) => locked.contains(&version.id),
            None => true,
        }
    }
}

/// How converging dependency paths are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// Every path is walked and fetched again; placement is last-writer-wins.
    #[default]
    KeepDuplicates,
    /// A `(project id, version id)` pair is resolved at most once per run.
    ByVersion,
}

impl FromStr for DedupPolicy {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-duplicates" | "keep" => Ok(DedupPolicy::KeepDuplicates),
            "by-version" => Ok(DedupPolicy::ByVersion),
            other => Err(ResolveError::InvalidConfig(format!(
                "unknown dedup policy {other:?} (expected keep-duplicates or by-version)"
            ))),
        }
    }
}

/// Projects that are never installed, matched by id or slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Denylist(Vec<String>);

impl Denylist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Denylist(entries.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, project: &str) -> bool {
        self.0.iter().any(|p| p == project)
    }
}

impl Default for Denylist {
    fn default() -> Self {
        // The quilted fabric API conflicts with fabric API.
        Denylist::new(["qsl", "qvIfYCYJ"])
    }
}

/// Knobs that shape a resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvePolicy {
    pub dedup: DedupPolicy,
    pub max_depth: usize,
    pub server_only: bool,
    pub denylist: Denylist,
    /// Version choices carried over from a lockfile.
    #[serde(skip)]
    pub locked: LockIndex,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            dedup: DedupPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            server_only: false,
            denylist: Denylist::default(),
            locked: LockIndex::default(),
        }
    }
}

/// Fail on projects that cannot run on a dedicated server; warn on doubtful ones.
pub fn validate_server_side(project: &Project) -> ResolveResult<()> {
    use PlatformRequirement::*;
    match (project.server_side, project.client_side) {
        (Unsupported, _) => {
            return Err(ResolveError::ServerUnsupported {
                project: format!("{}/{}", project.id, project.slug),
            });
        }
        (_, Required) => {
            warn!(
                "project {}/{} requires a client-side install",
                project.id, project.slug
            );
        }
        (Unknown, _) | (_, Unknown) => {
            warn!(
                "project {}/{} lists its server- or client-side requirement as unknown",
                project.id, project.slug
            );
        }
        _ => {}
    }
    Ok(())
}
