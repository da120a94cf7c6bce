use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::error::{ResolveError, ResolveResult};

pub const APP_USER_AGENT: &str = concat!("modpull/", env!("CARGO_PKG_VERSION"));

/// Build the shared client for registry and file downloads alike.
///
/// It carries no credential. Registry requests attach one per request
/// (see [`authorization_header`]) so file hosts never receive it.
pub fn build_http_client(user_agent: &str) -> ResolveResult<Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(default_headers)
        .build()
        .map_err(|source| ResolveError::RegistryTransport {
            target: "HTTP client".into(),
            source,
        })
}

/// The credential as an `Authorization` value, forwarded verbatim and
/// marked sensitive so it stays out of debug output.
pub fn authorization_header(credential: &str) -> ResolveResult<HeaderValue> {
    let mut value = HeaderValue::from_str(credential).map_err(|_| {
        ResolveError::InvalidConfig("API token is not a valid header value".into())
    })?;
    value.set_sensitive(true);
    Ok(value)
}
