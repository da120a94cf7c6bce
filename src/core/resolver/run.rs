use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use super::policy::{ResolvePolicy, RootSpec, Target};
use super::resolver::{DependencyResolver, SkippedProject};
use crate::core::downloader::{Artifact, Downloader, FileSource};
use crate::core::error::{ResolveError, ResolveResult};
use crate::core::placement::place;
use crate::core::registry::RegistryApi;

/// Everything one run needs once the CLI/config layer has done its work.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub target: Target,
    pub output_dir: PathBuf,
    pub roots: Vec<RootSpec>,
    pub policy: ResolvePolicy,
    /// Fail the run when a root project has no compatible version.
    pub strict: bool,
    /// Resolve from metadata only; nothing is downloaded or placed.
    pub no_download: bool,
}

/// Outcome of a run: placed artifacts in resolution order, plus what was left out.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub artifacts: Vec<Artifact>,
    pub skipped: Vec<SkippedProject>,
}

/// Resolve every root project, fetch and verify the artifacts into a
/// private staging directory, then place them into the output directory.
///
/// The staging directory is removed when this returns, on success or failure.
/// With `no_download` the graph is resolved from metadata and each artifact
/// path is where the file would have been placed.
pub async fn resolve_and_place(
    registry: &dyn RegistryApi,
    files: &dyn FileSource,
    request: &RunRequest,
) -> ResolveResult<RunSummary> {
    let staging = tempfile::Builder::new()
        .prefix("modpull-")
        .tempdir()
        .map_err(|source| ResolveError::Io {
            path: std::env::temp_dir(),
            source,
        })?;

    info!(
        "Resolving {} projects for {} on {}",
        request.roots.len(),
        request.target.loader,
        request.target.game_version
    );

    let mut resolver = DependencyResolver::new(
        registry,
        Downloader::new(files),
        &request.target,
        &request.policy,
    );
    if request.no_download {
        resolver = resolver.plan_only();
    }

    let mut artifacts = Vec::new();
    for root in &request.roots {
        match resolver.resolve_root(root, staging.path()).await {
            Ok(mut found) => artifacts.append(&mut found),
            Err(e) if e.is_no_compatible_version() && !request.strict => {
                warn!("Skipping {root}: {e}");
                resolver.skip_root(&root.project);
            }
            Err(e) => return Err(e),
        }
    }

    if request.no_download {
        for artifact in &mut artifacts {
            artifact.path = request.output_dir.join(&artifact.filename);
        }
        info!(
            "Resolved {} artifacts without downloading ({} projects skipped)",
            artifacts.len(),
            resolver.skipped().len()
        );
        return Ok(RunSummary {
            artifacts,
            skipped: resolver.into_skipped(),
        });
    }

    let placed = place(&artifacts, &request.output_dir).await?;
    for (artifact, path) in artifacts.iter_mut().zip(placed) {
        artifact.path = path;
    }

    info!(
        "Placed {} artifacts in {:?} ({} projects skipped)",
        artifacts.len(),
        request.output_dir,
        resolver.skipped().len()
    );

    Ok(RunSummary {
        artifacts,
        skipped: resolver.into_skipped(),
    })
}
