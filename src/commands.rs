use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info, warn};

use crate::core::downloader::HttpFileSource;
use crate::core::error::{ResolveError, ResolveResult};
use crate::core::http::build_http_client;
use crate::core::registry::{ModrinthClient, MODRINTH_STAGING_BASE_URL};
use crate::core::resolver::{
    self, DedupPolicy, LockIndex, ResolvePolicy, RootSpec, RunRequest, RunSummary, Target,
};
use crate::core::state::{Lockfile, Settings, LOCKFILE_NAME};

/// Read-only access to Minecraft mods, datapacks and plugins hosted on Modrinth.
#[derive(Debug, Clone, Parser)]
#[command(name = "modpull")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    pub debug: bool,

    /// Required loader, e.g. fabric, quilt, datapack, paper
    #[arg(short, long)]
    pub loader: Option<String>,

    /// Modrinth personal access token
    #[arg(short = 't', long, env = "MODRINTH_PAT", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Target game version, e.g. 1.21.1
    #[arg(short = 'V', long, env = "MINECRAFT_VERSION")]
    pub minecraft_version: Option<String>,

    /// Directory the verified files are placed in (default: current directory)
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,

    /// File with one project id or slug per line
    #[arg(short = 'f', long)]
    pub projects_file: Option<PathBuf>,

    /// Lockfile recording the resolved versions (default: ./modpull.lock)
    #[arg(long)]
    pub lockfile: Option<PathBuf>,

    /// Only resolve and update the lockfile; download nothing
    #[arg(long)]
    pub no_download: bool,

    /// Settings file (default: <config dir>/modpull/settings.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Registry base URL
    #[arg(long, conflicts_with = "staging")]
    pub api_url: Option<String>,

    /// Use the Modrinth staging registry
    #[arg(long)]
    pub staging: bool,

    /// Reject projects that cannot run on a dedicated server
    #[arg(long)]
    pub server_only: bool,

    /// Fail when a requested project has no compatible version
    #[arg(long)]
    pub strict: bool,

    /// Duplicate handling: keep-duplicates or by-version
    #[arg(long)]
    pub dedup: Option<DedupPolicy>,

    /// Maximum dependency depth below a requested project
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Print the run summary as JSON instead of placed paths
    #[arg(long)]
    pub json: bool,

    /// Project ids or slugs, optionally pinned as project@version
    pub projects: Vec<String>,
}

/// A fully validated run: every flag merged over the settings file.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub game_version: String,
    pub loader: String,
    pub output_dir: PathBuf,
    pub roots: Vec<RootSpec>,
    pub credential: String,
    pub settings: Settings,
    pub lockfile: PathBuf,
    pub no_download: bool,
}

/// Per-run switches that do not belong in the settings file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub no_download: bool,
    pub locked: LockIndex,
}

impl Invocation {
    pub fn from_cli(cli: &Cli, mut settings: Settings) -> ResolveResult<Self> {
        let credential = non_empty(cli.api_token.as_deref()).ok_or_else(|| {
            ResolveError::InvalidConfig(
                "missing Modrinth personal access token (--api-token or MODRINTH_PAT)".into(),
            )
        })?;
        let game_version = non_empty(cli.minecraft_version.as_deref()).ok_or_else(|| {
            ResolveError::InvalidConfig(
                "missing game version (--minecraft-version or MINECRAFT_VERSION)".into(),
            )
        })?;

        let mut project_ids: Vec<String> = cli
            .projects
            .iter()
            .filter_map(|p| non_empty(Some(p)))
            .collect();
        if let Some(path) = &cli.projects_file {
            project_ids.extend(read_projects_file(path)?);
        }
        if project_ids.is_empty() {
            return Err(ResolveError::InvalidConfig(
                "at least one project id or slug is required".into(),
            ));
        }
        let roots = project_ids
            .iter()
            .map(|p| p.parse())
            .collect::<ResolveResult<Vec<RootSpec>>>()?;

        if let Some(loader) = non_empty(cli.loader.as_deref()) {
            settings.loader = loader;
        }
        if cli.staging {
            settings.api_base_url = MODRINTH_STAGING_BASE_URL.into();
        } else if let Some(url) = non_empty(cli.api_url.as_deref()) {
            settings.api_base_url = url;
        }
        if let Some(dedup) = cli.dedup {
            settings.dedup = dedup;
        }
        if let Some(max_depth) = cli.max_depth {
            settings.max_depth = max_depth;
        }
        settings.server_only |= cli.server_only;
        settings.strict |= cli.strict;

        let current_dir = || {
            std::env::current_dir().map_err(|source| ResolveError::Io {
                path: PathBuf::from("."),
                source,
            })
        };
        let output_dir = match &cli.output {
            Some(dir) => prepare_output_dir(dir)?,
            None => current_dir()?,
        };
        let lockfile = match &cli.lockfile {
            Some(path) => path.clone(),
            None => current_dir()?.join(LOCKFILE_NAME),
        };

        Ok(Self {
            game_version,
            loader: settings.loader.clone(),
            output_dir,
            roots,
            credential,
            settings,
            lockfile,
            no_download: cli.no_download,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn prepare_output_dir(dir: &Path) -> ResolveResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|source| ResolveError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    std::fs::canonicalize(dir).map_err(|source| ResolveError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// One project per line; blank lines and `#` comments are ignored.
pub fn parse_projects(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_projects_file(path: &Path) -> ResolveResult<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let projects = parse_projects(&contents);
    debug!("Read {} projects from {:?}", projects.len(), path);
    Ok(projects)
}

/// Resolve, verify and place every requested project and its required
/// dependencies against the live registry.
pub async fn download_project_artifacts(
    game_version: &str,
    loader: &str,
    output_dir: &Path,
    project_ids: &[RootSpec],
    credential: &str,
    settings: &Settings,
    options: RunOptions,
) -> ResolveResult<RunSummary> {
    let client = build_http_client(&settings.user_agent)?;
    let registry = ModrinthClient::new(client.clone(), &settings.api_base_url, credential)?;
    let files = HttpFileSource::new(client);

    info!("Using registry {}", registry.base_url());

    let request = RunRequest {
        target: Target {
            loader: loader.to_string(),
            game_version: game_version.to_string(),
        },
        output_dir: output_dir.to_path_buf(),
        roots: project_ids.to_vec(),
        policy: ResolvePolicy {
            locked: options.locked,
            ..settings.policy()
        },
        strict: settings.strict,
        no_download: options.no_download,
    };

    resolver::resolve_and_place(&registry, &files, &request).await
}

/// Version choices from `path`, if it records this exact request.
pub async fn load_lock(path: &Path, target: &Target, roots: &[RootSpec]) -> ResolveResult<LockIndex> {
    match Lockfile::load(path).await? {
        Some(lock) if lock.is_up_to_date(target, roots) => {
            info!("Using {} locked artifacts from {:?}", lock.artifacts.len(), path);
            Ok(lock.index())
        }
        Some(_) => {
            info!("Lockfile {:?} does not match this request, resolving afresh", path);
            Ok(LockIndex::default())
        }
        None => Ok(LockIndex::default()),
    }
}

/// Entry point behind `main`: settings, validation, run, lockfile, report on stdout.
pub async fn execute(cli: Cli) -> ResolveResult<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let invocation = Invocation::from_cli(&cli, settings)?;
    let target = Target {
        loader: invocation.loader.clone(),
        game_version: invocation.game_version.clone(),
    };

    let locked = load_lock(&invocation.lockfile, &target, &invocation.roots).await?;
    let summary = download_project_artifacts(
        &invocation.game_version,
        &invocation.loader,
        &invocation.output_dir,
        &invocation.roots,
        &invocation.credential,
        &invocation.settings,
        RunOptions {
            no_download: invocation.no_download,
            locked,
        },
    )
    .await?;

    let lock = Lockfile::new(&target, &invocation.roots, &summary.artifacts);
    if let Err(e) = lock.save(&invocation.lockfile).await {
        warn!("Cannot write lockfile: {e}");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for artifact in &summary.artifacts {
            println!("{}", artifact.path.display());
        }
    }

    Ok(())
}
