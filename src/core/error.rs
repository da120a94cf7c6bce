use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the resolution engine.
/// Every module returns `Result<T, ResolveError>`.
#[derive(Debug, Error)]
pub enum ResolveError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Registry ────────────────────────────────────────
    #[error("registry request for {target} failed: {source}")]
    RegistryTransport {
        target: String,
        source: reqwest::Error,
    },

    #[error("registry returned HTTP {status} for {target} ({url})")]
    RegistryStatus {
        target: String,
        url: String,
        status: u16,
    },

    #[error("registry returned content type {content_type:?} for {target}, expected JSON")]
    RegistryContentType {
        target: String,
        content_type: String,
    },

    #[error("cannot decode registry response for {target}: {source}")]
    RegistryDecode {
        target: String,
        source: serde_json::Error,
    },

    // ── Selection ───────────────────────────────────────
    #[error("no version of {project} is compatible with {loader} on {game_version}")]
    NoCompatibleVersion {
        project: String,
        loader: String,
        game_version: String,
    },

    #[error("project {project} does not support server-side installs")]
    ServerUnsupported { project: String },

    // ── Download ────────────────────────────────────────
    #[error("HTTP request for {url} failed: {source}")]
    DownloadTransport { url: String, source: reqwest::Error },

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("refusing to stage {filename:?}: not a plain file name")]
    UnsafeFilename { filename: String },

    #[error("{filename}: content type {content_type:?} is neither a JAR archive nor a ZIP file")]
    InvalidArtifactType {
        filename: String,
        content_type: String,
    },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-512 mismatch for {filename}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    #[error("{filename}: registry declares no SHA-512 digest")]
    MissingDigest { filename: String },

    // ── Graph walk ──────────────────────────────────────
    #[error("while resolving dependencies of {version_name} ({version_id}): {source}")]
    Dependency {
        version_id: String,
        version_name: String,
        source: Box<ResolveError>,
    },

    #[error("dependency depth exceeds {max_depth} at {project}, possible cycle")]
    DepthExceeded { project: String, max_depth: usize },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Configuration ───────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the crate.
pub type ResolveResult<T> = Result<T, ResolveError>;

impl ResolveError {
    /// The only failure a dependency edge is allowed to absorb.
    pub fn is_no_compatible_version(&self) -> bool {
        matches!(self, ResolveError::NoCompatibleVersion { .. })
    }

    /// Wrap a failure raised while processing the dependencies of a version.
    pub fn in_dependencies_of(self, version_id: &str, version_name: &str) -> Self {
        ResolveError::Dependency {
            version_id: version_id.to_string(),
            version_name: version_name.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(source: std::io::Error) -> Self {
        ResolveError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
