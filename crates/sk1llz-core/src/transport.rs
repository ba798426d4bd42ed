//! Content transport: the "fetch bytes at path" capability.
//!
//! Everything the package manager downloads (the manifest and each skill
//! file) is addressed by a path relative to the content root. Timeouts and
//! retries belong to the transport; callers only see success or a
//! `SkillError::Transport`.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::config::SourceConfig;
use crate::error::{Result, SkillError};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the bytes stored at `path`, relative to the content root.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Human-readable location of the content root, for diagnostics.
    fn describe(&self) -> String;
}

/// Fetch content over HTTP(S) from a raw-file host.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut raw = config.base_url.trim().to_string();
        // Url::join replaces the last segment unless the base ends in '/'.
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|e| SkillError::Config(format!("Invalid base_url '{}': {}", raw, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SkillError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| SkillError::transport(path, format!("invalid path: {}", e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url_for(path)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SkillError::transport(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SkillError::transport(path, format!("HTTP {} from {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SkillError::transport(path, e))?;
        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}

/// Read content from a local checkout of the skill tree.
pub struct DirTransport {
    base_dir: PathBuf,
}

impl DirTransport {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SkillError::transport(path, "path escapes the content root"));
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl Transport for DirTransport {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        debug!("Reading {}", full.display());
        tokio::fs::read(&full)
            .await
            .map_err(|e| SkillError::transport(path, format!("{}: {}", full.display(), e)))
    }

    fn describe(&self) -> String {
        self.base_dir.display().to_string()
    }
}

/// Pick a transport for `source.base_url`: HTTP(S) URLs go over the network,
/// `file://` URLs and plain paths read from disk.
pub fn transport_from_config(config: &SourceConfig) -> Result<Arc<dyn Transport>> {
    let base = config.base_url.trim();

    if base.starts_with("http://") || base.starts_with("https://") {
        return Ok(Arc::new(HttpTransport::new(config)?));
    }

    if base.starts_with("file://") {
        let url = Url::parse(base)
            .map_err(|e| SkillError::Config(format!("Invalid base_url '{}': {}", base, e)))?;
        let dir = url
            .to_file_path()
            .map_err(|_| SkillError::Config(format!("Not a local path: {}", base)))?;
        return Ok(Arc::new(DirTransport::new(dir)));
    }

    if base.contains("://") {
        return Err(SkillError::Config(format!(
            "Unsupported base_url scheme: {}",
            base
        )));
    }

    Ok(Arc::new(DirTransport::new(base)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dir_transport_reads_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let skill_dir = temp_dir.path().join("languages/rust/matsakis");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "# Ownership").unwrap();

        let transport = DirTransport::new(temp_dir.path());
        let bytes = transport
            .fetch("languages/rust/matsakis/SKILL.md")
            .await
            .unwrap();
        assert_eq!(bytes, b"# Ownership");
    }

    #[tokio::test]
    async fn test_dir_transport_missing_file_is_transport_error() {
        let temp_dir = TempDir::new().unwrap();
        let transport = DirTransport::new(temp_dir.path());
        let err = transport.fetch("nope/SKILL.md").await.unwrap_err();
        assert!(matches!(err, SkillError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_dir_transport_rejects_parent_components() {
        let temp_dir = TempDir::new().unwrap();
        let transport = DirTransport::new(temp_dir.path().join("root"));
        let err = transport.fetch("../secret").await.unwrap_err();
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn test_http_url_join_keeps_base_path() {
        let config = SourceConfig {
            base_url: "https://example.com/org/repo/master".into(),
            ..SourceConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let url = transport.url_for("domains/distributed/lamport/SKILL.md").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/org/repo/master/domains/distributed/lamport/SKILL.md"
        );
    }

    #[test]
    fn test_transport_selection() {
        let http = SourceConfig::default();
        assert!(transport_from_config(&http)
            .unwrap()
            .describe()
            .starts_with("https://"));

        let local = SourceConfig {
            base_url: "/srv/sk1llz".into(),
            ..SourceConfig::default()
        };
        assert_eq!(transport_from_config(&local).unwrap().describe(), "/srv/sk1llz");

        let file_url = SourceConfig {
            base_url: "file:///srv/sk1llz".into(),
            ..SourceConfig::default()
        };
        assert_eq!(
            transport_from_config(&file_url).unwrap().describe(),
            "/srv/sk1llz"
        );

        let bad = SourceConfig {
            base_url: "ftp://example.com".into(),
            ..SourceConfig::default()
        };
        assert!(matches!(
            transport_from_config(&bad),
            Err(SkillError::Config(_))
        ));
    }
}
