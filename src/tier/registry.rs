//! Shared registry tier
//!
//! An authenticated HTTPS key/value service shared across a team. The
//! remote identifier is the key's SHA-256 cache id; any non-2xx response is
//! treated as a miss or a fetch failure, never a hard stop for the
//! hierarchy. Requests are blocking and run on the blocking pool.

use crate::config::schema::RegistryConfig;
use crate::error::{GitPackError, GitPackResult};
use crate::key::ArtifactKey;
use crate::tier::CacheTier;
use async_trait::async_trait;
use tracing::debug;

/// The shared registry tier
pub struct RegistryTier {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl RegistryTier {
    /// Create a registry tier from config. Returns None unless the registry
    /// is enabled and has a URL.
    pub fn from_config(config: &RegistryConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let base_url = config.url.clone()?;
        Some(Self {
            agent: ureq::Agent::new_with_defaults(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn artifact_url(&self, key: &ArtifactKey) -> String {
        format!("{}/artifacts/{}", self.base_url, key.cache_id())
    }

    fn bearer(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }
}

fn blocking_has(agent: &ureq::Agent, url: &str, auth: Option<&str>) -> bool {
    let mut req = agent.head(url);
    if let Some(auth) = auth {
        req = req.header("authorization", auth);
    }
    match req.call() {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

fn blocking_fetch(agent: &ureq::Agent, url: &str, auth: Option<&str>) -> GitPackResult<Vec<u8>> {
    let mut req = agent.get(url);
    if let Some(auth) = auth {
        req = req.header("authorization", auth);
    }
    let mut resp = req.call().map_err(|e| GitPackError::Registry {
        reason: format!("GET {}: {}", url, e),
    })?;
    resp.body_mut()
        .read_to_vec()
        .map_err(|e| GitPackError::Registry {
            reason: format!("reading body from {}: {}", url, e),
        })
}

fn blocking_store(
    agent: &ureq::Agent,
    url: &str,
    auth: Option<&str>,
    bytes: &[u8],
) -> GitPackResult<()> {
    let mut req = agent.put(url).content_type("application/octet-stream");
    if let Some(auth) = auth {
        req = req.header("authorization", auth);
    }
    req.send(bytes).map_err(|e| GitPackError::Registry {
        reason: format!("PUT {}: {}", url, e),
    })?;
    Ok(())
}

#[async_trait]
impl CacheTier for RegistryTier {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn authenticated(&self) -> Option<bool> {
        Some(self.token.is_some())
    }

    async fn has(&self, key: &ArtifactKey) -> GitPackResult<bool> {
        let url = self.artifact_url(key);
        let agent = self.agent.clone();
        let auth = self.bearer();
        let present =
            tokio::task::spawn_blocking(move || blocking_has(&agent, &url, auth.as_deref()))
                .await
                .unwrap_or(false);
        debug!("registry has {} -> {}", key, present);
        Ok(present)
    }

    async fn fetch(&self, key: &ArtifactKey) -> GitPackResult<Vec<u8>> {
        let url = self.artifact_url(key);
        let agent = self.agent.clone();
        let auth = self.bearer();
        tokio::task::spawn_blocking(move || blocking_fetch(&agent, &url, auth.as_deref()))
            .await
            .map_err(|e| GitPackError::Internal(format!("registry task aborted: {}", e)))?
    }

    async fn store(&self, key: &ArtifactKey, bytes: &[u8]) -> GitPackResult<()> {
        let url = self.artifact_url(key);
        let agent = self.agent.clone();
        let auth = self.bearer();
        let payload = bytes.to_vec();
        tokio::task::spawn_blocking(move || {
            blocking_store(&agent, &url, auth.as_deref(), &payload)
        })
        .await
        .map_err(|e| GitPackError::Internal(format!("registry task aborted: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>, enabled: bool, token: Option<&str>) -> RegistryConfig {
        RegistryConfig {
            url: url.map(str::to_string),
            token: token.map(str::to_string),
            enabled,
        }
    }

    fn key() -> ArtifactKey {
        let sha: String = std::iter::repeat('a').take(40).collect();
        ArtifactKey::new("https://github.com/a/b", &sha, "linux-x86_64")
    }

    #[test]
    fn disabled_or_urlless_config_builds_no_tier() {
        assert!(RegistryTier::from_config(&config(None, true, None)).is_none());
        assert!(RegistryTier::from_config(&config(Some("https://r.example"), false, None)).is_none());
    }

    #[test]
    fn artifact_url_uses_cache_id() {
        let tier =
            RegistryTier::from_config(&config(Some("https://r.example/"), true, None)).unwrap();
        let url = tier.artifact_url(&key());
        assert_eq!(url, format!("https://r.example/artifacts/{}", key().cache_id()));
        // No '#' or raw URL fragments leak into the path
        assert!(!url.contains('#'));
    }

    #[test]
    fn authenticated_reflects_token() {
        let anon = RegistryTier::from_config(&config(Some("https://r.example"), true, None)).unwrap();
        assert_eq!(anon.authenticated(), Some(false));
        let auth =
            RegistryTier::from_config(&config(Some("https://r.example"), true, Some("tok"))).unwrap();
        assert_eq!(auth.authenticated(), Some(true));
        let empty =
            RegistryTier::from_config(&config(Some("https://r.example"), true, Some(""))).unwrap();
        assert_eq!(empty.authenticated(), Some(false));
    }
}
