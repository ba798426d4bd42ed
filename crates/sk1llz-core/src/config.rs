use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SkillError};

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub install: InstallConfig,
}

impl AppConfig {
    /// Load configuration from default path (~/.config/sk1llz/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| SkillError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write current configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| SkillError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sk1llz")
            .join("config.toml")
    }

    /// Directory holding the cached skill index.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sk1llz")
        })
    }

    /// Global skills directory (`~/.claude/skills` unless overridden).
    pub fn global_skills_dir(&self) -> PathBuf {
        self.install.global_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".claude")
                .join("skills")
        })
    }
}

/// Where skill content and the manifest are fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the content tree. A `file://` URL or a plain directory
    /// path reads from a local checkout instead of HTTP.
    pub base_url: String,
    /// Manifest location relative to `base_url`.
    pub manifest_path: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://raw.githubusercontent.com/copyleftdev/sk1llz/master".into(),
            manifest_path: "skills.json".into(),
            timeout_secs: 30,
            user_agent: concat!("sk1llz/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Override for the cache directory (default: platform cache dir + `sk1llz`).
    pub dir: Option<PathBuf>,
}

/// Install location configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Override for the global skills directory.
    pub global_dir: Option<PathBuf>,
    /// Directory name whose presence in the working directory marks a project.
    pub project_marker: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            global_dir: None,
            project_marker: ".claude".into(),
        }
    }
}
