use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::integrity::verify_sha512;
use crate::core::error::{ResolveError, ResolveResult};
use crate::core::registry::{File, Version};

/// Content types accepted for artifact downloads (JAR/ZIP family).
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/java-archive",
    "application/x-java-archive",
    "application/zip",
    "application/x-zip-compressed",
];

/// Response body of a file download, fully buffered.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub bytes: Vec<u8>,
}

/// Transport used to retrieve artifact bytes.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn get(&self, url: &str) -> ResolveResult<FetchedBody>;
}

/// [`FileSource`] backed by the shared HTTP client.
pub struct HttpFileSource {
    client: Client,
}

impl HttpFileSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FileSource for HttpFileSource {
    async fn get(&self, url: &str) -> ResolveResult<FetchedBody> {
        let transport = |source| ResolveError::DownloadTransport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let bytes = response.bytes().await.map_err(transport)?.to_vec();

        Ok(FetchedBody {
            content_type,
            content_length,
            bytes,
        })
    }
}

/// A verified file sitting in the staging directory.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Artifact {
    pub project_id: String,
    pub version_id: String,
    pub version_name: String,
    pub version_number: String,
    pub filename: String,
    pub path: PathBuf,
    pub sha512: String,
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.project_id, self.version_id, self.filename)
    }
}

/// Downloads the primary files of a version and verifies them.
pub struct Downloader<'a> {
    source: &'a dyn FileSource,
}

impl<'a> Downloader<'a> {
    pub fn new(source: &'a dyn FileSource) -> Self {
        Self { source }
    }

    /// Fetch every primary file of `version` into `staging_dir`.
    ///
    /// All-or-nothing: the first failing file aborts the whole version and
    /// no artifact list is returned.
    pub async fn fetch(&self, version: &Version, staging_dir: &Path) -> ResolveResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        for file in version.primary_files() {
            let artifact = self.download_file(version, file, staging_dir).await?;
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }

    async fn download_file(
        &self,
        version: &Version,
        file: &File,
        staging_dir: &Path,
    ) -> ResolveResult<Artifact> {
        validate_filename(&file.filename)?;
        let expected = expected_digest(file)?;

        let body = self.source.get(&file.url).await?;

        validate_content_type(&file.filename, body.content_type.as_deref())?;
        if let Some(declared) = body.content_length {
            if declared != body.bytes.len() as u64 {
                warn!(
                    "{}: body is {} bytes long, but Content-Length declares {}",
                    file.filename,
                    body.bytes.len(),
                    declared
                );
            }
        }

        let dest = staging_dir.join(&file.filename);
        write_staged(&dest, &body.bytes).await?;

        let sha512 = match verify_sha512(&dest, &file.filename, expected).await {
            Ok(actual) => actual,
            Err(e) => {
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(e);
            }
        };

        debug!("Staged: {} -> {:?}", file.url, dest);
        Ok(Artifact {
            project_id: version.project_id.clone(),
            version_id: version.id.clone(),
            version_name: version.name.clone(),
            version_number: version.version_number.clone(),
            filename: file.filename.clone(),
            path: dest,
            sha512,
        })
    }

    /// What `fetch` would produce, built from registry metadata only.
    pub fn describe(&self, version: &Version) -> ResolveResult<Vec<Artifact>> {
        version
            .primary_files()
            .map(|file| {
                validate_filename(&file.filename)?;
                let sha512 = expected_digest(file)?;
                Ok(Artifact {
                    project_id: version.project_id.clone(),
                    version_id: version.id.clone(),
                    version_name: version.name.clone(),
                    version_number: version.version_number.clone(),
                    filename: file.filename.clone(),
                    path: PathBuf::from(&file.filename),
                    sha512: sha512.to_ascii_lowercase(),
                })
            })
            .collect()
    }
}

fn expected_digest(file: &File) -> ResolveResult<&str> {
    file.hashes
        .sha512
        .as_deref()
        .ok_or_else(|| ResolveError::MissingDigest {
            filename: file.filename.clone(),
        })
}

async fn write_staged(dest: &Path, bytes: &[u8]) -> ResolveResult<()> {
    let io_err = |source| ResolveError::Io {
        path: dest.to_path_buf(),
        source,
    };

    // Scoped so the handle is closed before hashing re-opens the file.
    {
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        file.write_all(bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
    }
    Ok(())
}

fn validate_filename(filename: &str) -> ResolveResult<()> {
    let plain = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\']);
    if !plain {
        return Err(ResolveError::UnsafeFilename {
            filename: filename.to_string(),
        });
    }
    Ok(())
}

fn validate_content_type(filename: &str, content_type: Option<&str>) -> ResolveResult<()> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    if !ALLOWED_CONTENT_TYPES
        .iter()
        .any(|allowed| essence.eq_ignore_ascii_case(allowed))
    {
        return Err(ResolveError::InvalidArtifactType {
            filename: filename.to_string(),
            content_type: content_type.unwrap_or("<missing>").to_string(),
        });
    }
    Ok(())
}
