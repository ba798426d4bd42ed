//! On-disk cache of the last successfully fetched manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use sk1llz_core::{Result, SkillError};

use crate::models::Manifest;

/// File name of the cache inside the cache directory.
pub const CACHE_FILE: &str = "index.json";

/// A cached manifest and when it was fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheRecord {
    pub manifest: Manifest,
    pub fetched_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            fetched_at: Utc::now(),
        }
    }
}

/// Owner of the cache file. Readers get copies; nothing else writes it.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under `dir/index.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cache. A missing, unreadable, or invalid file is `None`.
    pub fn load(&self) -> Option<CacheRecord> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No index cache at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Ignoring unreadable index cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_slice(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring corrupt index cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        if let Err(e) = record.manifest.validate() {
            warn!("Ignoring invalid index cache {}: {}", self.path.display(), e);
            return None;
        }

        Some(record)
    }

    /// Record `manifest` as fetched now.
    pub fn save(&self, manifest: &Manifest) -> Result<CacheRecord> {
        let record = CacheRecord::new(manifest.clone());
        self.write(&record)?;
        Ok(record)
    }

    /// Replace the cache file atomically: the new content is written to a
    /// temporary file next to the cache and renamed over it, so an
    /// interrupted write leaves the previous cache intact.
    pub fn write(&self, record: &CacheRecord) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            SkillError::Config(format!("Invalid cache path: {}", self.path.display()))
        })?;
        std::fs::create_dir_all(parent)?;

        let encoded = serde_json::to_vec_pretty(record)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SkillError::from(e.error))?;

        debug!(
            "Cached {} skills at {}",
            record.manifest.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Wall-clock time since `record` was fetched. Clock skew into the
    /// future counts as zero.
    pub fn age(record: &CacheRecord) -> Duration {
        Utc::now()
            .signed_duration_since(record.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
