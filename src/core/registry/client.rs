use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::model::{Project, Version};
use crate::core::error::{ResolveError, ResolveResult};
use crate::core::http::authorization_header;

pub const MODRINTH_PROD_BASE_URL: &str = "https://api.modrinth.com";
pub const MODRINTH_STAGING_BASE_URL: &str = "https://staging-api.modrinth.com";

/// Read-only view of the registry.
///
/// Every call is a single request; failures are returned immediately and
/// never retried.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// List the versions of `project` published for `loader` and `game_version`.
    async fn list_versions(
        &self,
        project: &str,
        loader: &str,
        game_version: &str,
    ) -> ResolveResult<Vec<Version>>;

    /// Fetch one exact version of `project`.
    async fn get_version(&self, project: &str, version_id: &str) -> ResolveResult<Version>;

    /// Fetch the project record (slug and side requirements).
    async fn get_project(&self, project: &str) -> ResolveResult<Project>;
}

/// Modrinth v2 implementation of [`RegistryApi`].
///
/// The user agent comes from the shared client; the credential is attached
/// to each registry request only.
pub struct ModrinthClient {
    client: Client,
    base_url: Url,
    authorization: HeaderValue,
}

impl ModrinthClient {
    pub fn new(client: Client, base_url: &str, credential: &str) -> ResolveResult<Self> {
        let invalid = |reason: String| {
            ResolveError::InvalidConfig(format!("invalid registry URL {base_url:?}: {reason}"))
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".into()));
        }

        Ok(Self {
            client,
            base_url: parsed,
            authorization: authorization_header(credential)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `segments` to the base URL path. Each segment is
    /// percent-encoded, so ids cannot inject `/`, `?` or `#`.
    fn endpoint(&self, segments: &[&str], target: &str) -> ResolveResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ResolveError::InvalidConfig(format!("cannot build registry URL for {target}"))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue one GET and decode the JSON body, attaching `target` to any failure.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
        target: &str,
    ) -> ResolveResult<T> {
        let transport = |source| ResolveError::RegistryTransport {
            target: target.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.authorization.clone())
            .query(query)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ResolveError::RegistryStatus {
                target: target.to_string(),
                url: resp.url().to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_json(&content_type) {
            return Err(ResolveError::RegistryContentType {
                target: target.to_string(),
                content_type,
            });
        }

        debug!("GET {} -> {}", resp.url(), status);
        let body = resp.text().await.map_err(transport)?;

        serde_json::from_str(&body).map_err(|source| ResolveError::RegistryDecode {
            target: target.to_string(),
            source,
        })
    }
}

#[async_trait]
impl RegistryApi for ModrinthClient {
    async fn list_versions(
        &self,
        project: &str,
        loader: &str,
        game_version: &str,
    ) -> ResolveResult<Vec<Version>> {
        let url = self.endpoint(&["v2", "project", project, "version"], project)?;
        let query = [
            ("loaders", single_element_array(loader)),
            ("game_versions", single_element_array(game_version)),
        ];
        self.get_json(url, &query, project).await
    }

    async fn get_version(&self, project: &str, version_id: &str) -> ResolveResult<Version> {
        let target = format!("{project}/{version_id}");
        let url = self.endpoint(&["v2", "project", project, "version", version_id], &target)?;
        self.get_json(url, &[], &target).await
    }

    async fn get_project(&self, project: &str) -> ResolveResult<Project> {
        let url = self.endpoint(&["v2", "project", project], project)?;
        self.get_json(url, &[], project).await
    }
}

/// `fabric` -> `["fabric"]`; URL-encoding happens when the query is attached.
fn single_element_array(value: &str) -> String {
    serde_json::Value::Array(vec![serde_json::Value::String(value.to_string())]).to_string()
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json")
}
