//! Container provisioning.
//!
//! A provisioning server (tmpnb) hands out single-user notebook servers.
//! The viewer keeps the last one it got and reuses it while it still
//! answers `GET {url}/api/kernels` with JSON; otherwise it asks for a new
//! one. That reuse-then-spawn fallback is the only retry.

use std::time::Duration;

use nbdash_protocol::{SpawnRequest, SpawnResponse};

use crate::cache::ContainerCache;
use crate::urls::{normalize_base, resolve_spawn_url, ws_url};

/// Error type for provisioning.
#[derive(Debug)]
pub enum ProvisionError {
    /// Provisioning server unreachable
    Network(String),
    /// Provisioning server has no free containers
    Full,
    /// HTTP error with status code
    Http(u16, String),
    /// Unusable response body or URL
    Parse(String),
}

impl std::fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionError::Network(msg) => write!(f, "Network error: {}", msg),
            ProvisionError::Full => write!(f, "tmpnb server is full"),
            ProvisionError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            ProvisionError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ProvisionError {}

/// Outcome of the reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Alive,
    /// Not a usable notebook server (unreachable, error status, or a page
    /// that is not JSON, such as a login or "expired" HTML page).
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerSource {
    Reused,
    Spawned,
}

/// A notebook server to run code on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub base_url: String,
    pub ws_url: String,
    pub source: ContainerSource,
}

impl Container {
    pub fn new(url: &str, source: ContainerSource) -> Self {
        let base_url = normalize_base(url);
        Self {
            ws_url: ws_url(&base_url),
            base_url,
            source,
        }
    }
}

/// Provisioning server client (blocking).
#[derive(Clone)]
pub struct ProvisionClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl ProvisionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("nbdash/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: normalize_base(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask for a new container running `image_name`, posted as a form
    /// field. Returns its absolute base URL.
    pub fn spawn(&self, image_name: &str) -> Result<String, ProvisionError> {
        let url = format!("{}api/spawn/", self.base_url);
        let body = SpawnRequest { image_name: image_name.to_string() };
        let response = self.http.post(&url)
            .form(&body)
            .send()
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ProvisionError::Http(status, body));
        }

        let spawned: SpawnResponse = response.json()
            .map_err(|e| ProvisionError::Parse(e.to_string()))?;
        if spawned.is_full() {
            return Err(ProvisionError::Full);
        }
        let relative = spawned.url
            .ok_or_else(|| ProvisionError::Parse("Missing url in spawn response".into()))?;
        let container = resolve_spawn_url(&self.base_url, &relative)
            .map_err(|e| ProvisionError::Parse(format!("Bad container url {:?}: {}", relative, e)))?;
        log::info!("spawned container {}", container);
        Ok(container)
    }

    /// Check whether `container_url` is still a live notebook server.
    pub fn probe(&self, container_url: &str) -> Probe {
        let url = format!("{}api/kernels", normalize_base(container_url));
        let response = match self.http.get(&url).send() {
            Ok(r) => r,
            Err(e) => return Probe::Invalid(e.to_string()),
        };
        if !response.status().is_success() {
            return Probe::Invalid(format!("HTTP {}", response.status().as_u16()));
        }
        let text = match response.text() {
            Ok(t) => t,
            Err(e) => return Probe::Invalid(e.to_string()),
        };
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(_) => Probe::Alive,
            Err(_) => Probe::Invalid("response is not JSON".into()),
        }
    }
}

/// Reuse the cached container if it still answers, otherwise spawn one
/// and remember it.
pub fn acquire_container(
    client: &ProvisionClient,
    cache: &mut dyn ContainerCache,
    image_name: &str,
) -> Result<Container, ProvisionError> {
    if let Some(cached) = cache.load() {
        match client.probe(&cached.url) {
            Probe::Alive => {
                log::info!("reusing container {}", cached.url);
                return Ok(Container::new(&cached.url, ContainerSource::Reused));
            }
            Probe::Invalid(reason) => {
                log::warn!("discarding cached container {}: {}", cached.url, reason);
                cache.clear();
            }
        }
    }

    let url = client.spawn(image_name)?;
    cache.store(&url);
    Ok(Container::new(&url, ContainerSource::Spawned))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_urls() {
        let c = Container::new("https://c1.example.org/user/x", ContainerSource::Spawned);
        assert_eq!(c.base_url, "https://c1.example.org/user/x/");
        assert_eq!(c.ws_url, "wss://c1.example.org/user/x/");
    }

    #[test]
    fn test_full_message() {
        assert_eq!(ProvisionError::Full.to_string(), "tmpnb server is full");
    }
}
