//! In-memory registry and file source shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::core::downloader::{FetchedBody, FileSource};
use crate::core::error::{ResolveError, ResolveResult};
use crate::core::http::APP_USER_AGENT;
use crate::core::registry::{
    Dependency, DependencyType, File, FileHashes, PlatformRequirement, Project, RegistryApi,
    Version,
};

pub const GAME_VERSION: &str = "1.21.1";

pub fn version(project: &str, id: &str, published: &str, loaders: &[&str]) -> Version {
    Version {
        id: id.to_string(),
        project_id: project.to_string(),
        name: format!("{project} {id}"),
        version_number: id.to_string(),
        date_published: published.parse().expect("RFC 3339 timestamp"),
        loaders: loaders.iter().map(|l| l.to_string()).collect(),
        game_versions: vec![GAME_VERSION.to_string()],
        files: Vec::new(),
        dependencies: Vec::new(),
    }
}

pub fn file(url: &str, filename: &str, content: &[u8]) -> File {
    File {
        url: url.to_string(),
        filename: filename.to_string(),
        primary: true,
        hashes: FileHashes {
            sha512: Some(crate::core::downloader::integrity::sha512_hex(content)),
        },
        size: Some(content.len() as u64),
    }
}

pub fn secondary_file(url: &str, filename: &str, content: &[u8]) -> File {
    File {
        primary: false,
        ..file(url, filename, content)
    }
}

pub fn requires(project: Option<&str>, version: Option<&str>) -> Dependency {
    Dependency {
        project_id: project.map(str::to_string),
        version_id: version.map(str::to_string),
        file_name: None,
        dependency_type: DependencyType::Required,
    }
}

pub fn optional(project: &str) -> Dependency {
    Dependency {
        dependency_type: DependencyType::Optional,
        ..requires(Some(project), None)
    }
}

/// A version shipping a single primary jar named `<filename>` whose content
/// is the filename itself, registered in both fakes.
#[allow(clippy::too_many_arguments)]
pub fn published(
    registry: &mut FakeRegistry,
    files: &mut FakeFiles,
    project: &str,
    id: &str,
    date: &str,
    loaders: &[&str],
    filename: &str,
    dependencies: Vec<Dependency>,
) {
    let url = format!("https://cdn.test/{project}/{id}/{filename}");
    let mut v = version(project, id, date, loaders);
    v.files = vec![file(&url, filename, filename.as_bytes())];
    v.dependencies = dependencies;
    registry.add(v);
    files.insert(&url, "application/java-archive", filename.as_bytes());
}

#[derive(Default)]
pub struct FakeRegistry {
    versions: HashMap<String, Vec<Version>>,
    projects: HashMap<String, Project>,
    failing: HashMap<String, u16>,
    calls: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn add(&mut self, version: Version) {
        self.versions
            .entry(version.project_id.clone())
            .or_default()
            .push(version);
    }

    pub fn add_project(
        &mut self,
        id: &str,
        slug: &str,
        client: PlatformRequirement,
        server: PlatformRequirement,
    ) {
        self.projects.insert(
            id.to_string(),
            Project {
                id: id.to_string(),
                slug: slug.to_string(),
                client_side: client,
                server_side: server,
            },
        );
    }

    /// Every request touching `project` answers with HTTP `status`.
    pub fn fail(&mut self, project: &str, status: u16) {
        self.failing.insert(project.to_string(), status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, project: &str) -> ResolveResult<()> {
        match self.failing.get(project) {
            Some(status) => Err(ResolveError::RegistryStatus {
                target: project.to_string(),
                url: format!("https://api.test/v2/project/{project}"),
                status: *status,
            }),
            None => Ok(()),
        }
    }

    fn not_found(target: String) -> ResolveError {
        ResolveError::RegistryStatus {
            url: format!("https://api.test/v2/project/{target}"),
            target,
            status: 404,
        }
    }
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    async fn list_versions(
        &self,
        project: &str,
        _loader: &str,
        game_version: &str,
    ) -> ResolveResult<Vec<Version>> {
        self.record(format!("list {project}"));
        self.check(project)?;
        let versions = self
            .versions
            .get(project)
            .ok_or_else(|| Self::not_found(project.to_string()))?;
        // The loader filter is left to the selector so tests exercise it.
        Ok(versions
            .iter()
            .filter(|v| v.game_versions.iter().any(|g| g == game_version))
            .cloned()
            .collect())
    }

    async fn get_version(&self, project: &str, version_id: &str) -> ResolveResult<Version> {
        self.record(format!("get {project}/{version_id}"));
        self.check(project)?;
        self.versions
            .get(project)
            .and_then(|vs| vs.iter().find(|v| v.id == version_id))
            .cloned()
            .ok_or_else(|| Self::not_found(format!("{project}/{version_id}")))
    }

    async fn get_project(&self, project: &str) -> ResolveResult<Project> {
        self.record(format!("project {project}"));
        self.check(project)?;
        self.projects
            .get(project)
            .cloned()
            .ok_or_else(|| Self::not_found(project.to_string()))
    }
}

#[derive(Default)]
pub struct FakeFiles {
    bodies: HashMap<String, FetchedBody>,
}

impl FakeFiles {
    pub fn insert(&mut self, url: &str, content_type: &str, bytes: &[u8]) {
        self.bodies.insert(
            url.to_string(),
            FetchedBody {
                content_type: Some(content_type.to_string()),
                content_length: Some(bytes.len() as u64),
                bytes: bytes.to_vec(),
            },
        );
    }

    pub fn serve(mut self, url: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.insert(url, content_type, bytes);
        self
    }

    pub fn jar(self, url: &str, bytes: &[u8]) -> Self {
        self.serve(url, "application/java-archive", bytes)
    }
}

#[async_trait]
impl FileSource for FakeFiles {
    async fn get(&self, url: &str) -> ResolveResult<FetchedBody> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| ResolveError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Client for loopback tests; ignores any proxy set in the environment.
pub fn loopback_client() -> Client {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .no_proxy()
        .build()
        .unwrap()
}

/// A complete HTTP/1.1 response that closes the connection after the body.
pub fn http_response(status: &str, content_type: Option<&str>, body: &[u8]) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    if let Some(content_type) = content_type {
        head.push_str(&format!("Content-Type: {content_type}\r\n"));
    }
    head.push_str("\r\n");

    let mut response = head.into_bytes();
    response.extend_from_slice(body);
    response
}

/// Loopback server answering each accepted connection with the next canned
/// response. Keeps the raw request heads it received.
pub struct CannedServer {
    pub base_url: String,
    requests: JoinHandle<Vec<String>>,
}

impl CannedServer {
    pub async fn start(responses: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let requests = tokio::spawn(async move {
            let mut seen = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&chunk[..n]);
                }
                seen.push(String::from_utf8_lossy(&head).into_owned());
                socket.write_all(&response).await.unwrap();
                let _ = socket.shutdown().await;
            }
            seen
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    /// Request heads, once every canned response has been served.
    pub async fn requests(self) -> Vec<String> {
        self.requests.await.unwrap()
    }
}
