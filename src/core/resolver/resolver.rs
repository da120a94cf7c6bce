use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::policy::{pin_matches, validate_server_side, DedupPolicy, ResolvePolicy, RootSpec, Target};
use super::selector::select_compatible;
use crate::core::downloader::{Artifact, Downloader};
use crate::core::error::{ResolveError, ResolveResult};
use crate::core::registry::{Dependency, RegistryApi, Version};

type ResolveFuture<'s> = Pin<Box<dyn Future<Output = ResolveResult<Vec<Artifact>>> + Send + 's>>;

/// A project left out because nothing it publishes fits the target.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedProject {
    pub project: String,
    /// `None` for a root project.
    pub required_by: Option<RequiredBy>,
    pub loader: String,
    pub game_version: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RequiredBy {
    pub version_id: String,
    pub version_name: String,
}

/// Walks the project → version → dependency graph depth-first, fetching
/// the primary files of every version it selects.
///
/// Artifacts come back in pre-order: a version's own files, then those of
/// its required dependencies in declared order.
pub struct DependencyResolver<'a> {
    registry: &'a dyn RegistryApi,
    downloader: Downloader<'a>,
    target: &'a Target,
    policy: &'a ResolvePolicy,
    /// `(project id, version id)` pairs already walked, for `DedupPolicy::ByVersion`.
    visited: HashSet<(String, String)>,
    skipped: Vec<SkippedProject>,
    /// `false` records what would be fetched without downloading anything.
    download: bool,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        registry: &'a dyn RegistryApi,
        downloader: Downloader<'a>,
        target: &'a Target,
        policy: &'a ResolvePolicy,
    ) -> Self {
        Self {
            registry,
            downloader,
            target,
            policy,
            visited: HashSet::new(),
            skipped: Vec::new(),
            download: true,
        }
    }

    /// Resolve the graph from registry metadata alone. Artifacts carry the
    /// declared digest and a bare filename as their path.
    pub fn plan_only(mut self) -> Self {
        self.download = false;
        self
    }

    pub fn skipped(&self) -> &[SkippedProject] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedProject> {
        self.skipped
    }

    /// Record a root project that was dropped instead of failing the run.
    pub fn skip_root(&mut self, project: &str) {
        self.skipped.push(SkippedProject {
            project: project.to_string(),
            required_by: None,
            loader: self.target.loader.clone(),
            game_version: self.target.game_version.clone(),
        });
    }

    /// Select the most recent compatible version of `project` and resolve it.
    ///
    /// Fails with `NoCompatibleVersion` when the listing has nothing for the
    /// target loader.
    pub fn resolve_project<'s>(
        &'s mut self,
        project: &'s str,
        staging_dir: &'s Path,
        depth: usize,
    ) -> ResolveFuture<'s> {
        self.resolve_matching(project, None, staging_dir, depth)
    }

    /// Resolve a requested project, restricted to its pinned version if any.
    pub fn resolve_root<'s>(&'s mut self, root: &'s RootSpec, staging_dir: &'s Path) -> ResolveFuture<'s> {
        self.resolve_matching(&root.project, root.version.as_deref(), staging_dir, 0)
    }

    fn resolve_matching<'s>(
        &'s mut self,
        project: &'s str,
        pin: Option<&'s str>,
        staging_dir: &'s Path,
        depth: usize,
    ) -> ResolveFuture<'s> {
        Box::pin(async move {
            if !self.admit(project).await? {
                return Ok(vec![]);
            }

            let versions = self
                .registry
                .list_versions(project, &self.target.loader, &self.target.game_version)
                .await?;

            let policy = self.policy;
            let candidates = versions
                .iter()
                .filter(|v| pin_matches(pin, v) && policy.locked.permits(v));
            let version = select_compatible(candidates, &self.target.loader).ok_or_else(|| {
                ResolveError::NoCompatibleVersion {
                    project: project.to_string(),
                    loader: self.target.loader.clone(),
                    game_version: self.target.game_version.clone(),
                }
            })?;

            debug!(
                "Selected {} ({}) out of {} listed for {}",
                version.name,
                version.id,
                versions.len(),
                project
            );
            self.resolve_version(version, staging_dir, depth).await
        })
    }

    /// Fetch `version` and recurse into its required dependencies.
    pub fn resolve_version<'s>(
        &'s mut self,
        version: &'s Version,
        staging_dir: &'s Path,
        depth: usize,
    ) -> ResolveFuture<'s> {
        Box::pin(async move {
            if self.policy.dedup == DedupPolicy::ByVersion
                && !self
                    .visited
                    .insert((version.project_id.clone(), version.id.clone()))
            {
                debug!("{} ({}) already resolved, skipping", version.name, version.id);
                return Ok(vec![]);
            }

            let mut artifacts = if self.download {
                let fetched = self.downloader.fetch(version, staging_dir).await?;
                info!("Fetched {} ({} files)", version.name, fetched.len());
                fetched
            } else {
                let planned = self.downloader.describe(version)?;
                debug!("Planned {} ({} files)", version.name, planned.len());
                planned
            };

            for dependency in version.required_dependencies() {
                match self.resolve_dependency(dependency, staging_dir, depth + 1).await {
                    Ok(mut found) => artifacts.append(&mut found),
                    Err(ResolveError::NoCompatibleVersion {
                        project,
                        loader,
                        game_version,
                    }) => {
                        warn!(
                            "Skipping dependency {} of {} ({}): no version for {} on {}",
                            project, version.name, version.id, loader, game_version
                        );
                        self.skipped.push(SkippedProject {
                            project,
                            required_by: Some(RequiredBy {
                                version_id: version.id.clone(),
                                version_name: version.name.clone(),
                            }),
                            loader,
                            game_version,
                        });
                    }
                    Err(e) => return Err(e.in_dependencies_of(&version.id, &version.name)),
                }
            }

            Ok(artifacts)
        })
    }

    async fn resolve_dependency(
        &mut self,
        dependency: &Dependency,
        staging_dir: &Path,
        depth: usize,
    ) -> ResolveResult<Vec<Artifact>> {
        let project = dependency.project_id.as_deref();
        let version_id = dependency.version_id.as_deref();

        if depth > self.policy.max_depth {
            return Err(ResolveError::DepthExceeded {
                project: project.or(version_id).unwrap_or_default().to_string(),
                max_depth: self.policy.max_depth,
            });
        }

        match (project, version_id) {
            (Some(project), Some(version_id)) => {
                if !self.admit(project).await? {
                    return Ok(vec![]);
                }
                let pinned = self.registry.get_version(project, version_id).await?;
                self.resolve_version(&pinned, staging_dir, depth).await
            }
            (Some(project), None) => self.resolve_project(project, staging_dir, depth).await,
            (None, Some(version_id)) => {
                debug!("Ignoring dependency on version {version_id} without a project id");
                Ok(vec![])
            }
            (None, None) => Ok(vec![]),
        }
    }

    /// Denylist and server-side screening. `false` means leave the project out.
    async fn admit(&self, project: &str) -> ResolveResult<bool> {
        if self.policy.denylist.contains(project) {
            warn!("Project {project} is denylisted, leaving it out");
            return Ok(false);
        }

        if self.policy.server_only {
            let record = self.registry.get_project(project).await?;
            if self.policy.denylist.contains(&record.id) || self.policy.denylist.contains(&record.slug)
            {
                warn!("Project {}/{} is denylisted, leaving it out", record.id, record.slug);
                return Ok(false);
            }
            validate_server_side(&record)?;
        }

        Ok(true)
    }
}
