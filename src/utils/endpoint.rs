// SPDX-License-Identifier: GPL-3.0-only
use anyhow::{Context, Result};
use url::Url;

/// Maximum allowed endpoint length
const MAX_ENDPOINT_LENGTH: usize = 255;

/// Turn a bare object storage endpoint (`host` or `host:port`) into a base URL.
///
/// Checks:
/// - Endpoint is not empty and within length limits
/// - No scheme (use `secure` to pick http/https)
/// - No path, query or credentials
pub fn endpoint_url(endpoint: &str, secure: bool) -> Result<Url> {
    let endpoint = endpoint.trim();

    if endpoint.is_empty() {
        return Err(anyhow::anyhow!("Endpoint cannot be empty"));
    }

    if endpoint.len() > MAX_ENDPOINT_LENGTH {
        return Err(anyhow::anyhow!(
            "Endpoint exceeds maximum length of {} characters",
            MAX_ENDPOINT_LENGTH
        ));
    }

    if endpoint.contains("://") {
        return Err(anyhow::anyhow!(
            "Endpoint must not include a scheme: {} (use the secure option instead)",
            endpoint
        ));
    }

    let scheme = if secure { "https" } else { "http" };
    let url = Url::parse(&format!("{}://{}", scheme, endpoint))
        .with_context(|| format!("Invalid endpoint: {}", endpoint))?;

    if url.host_str().is_none() {
        return Err(anyhow::anyhow!("Endpoint must have a host"));
    }

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(anyhow::anyhow!(
            "Endpoint must not include a path or query: {}",
            endpoint
        ));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(anyhow::anyhow!("Endpoint must not include credentials"));
    }

    Ok(url)
}

/// Value of the `Host` header for a URL, including a non-default port
pub fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
