//! Cache-first access to the skill manifest.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use sk1llz_core::{Result, SkillError, Transport};

use crate::cache::CacheStore;
use crate::models::Manifest;

/// Maximum age of a cached manifest before a refresh is attempted.
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Where the manifest handed to the caller came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Fresh cache; no network access.
    Cache { age: Duration },
    /// Fetched just now and written to the cache.
    Remote,
    /// The fetch failed; an older cached copy is served instead.
    Fallback { age: Duration, reason: String },
}

#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub manifest: Manifest,
    pub origin: IndexOrigin,
}

impl LoadedIndex {
    pub fn is_degraded(&self) -> bool {
        matches!(self.origin, IndexOrigin::Fallback { .. })
    }

    /// Message to surface to the user when serving a fallback copy.
    pub fn warning(&self) -> Option<String> {
        match &self.origin {
            IndexOrigin::Fallback { age, reason } => Some(format!(
                "could not refresh the skill index ({}); using cached copy from {} ago",
                reason,
                format_age(*age)
            )),
            _ => None,
        }
    }
}

/// Obtains a fresh-enough manifest, preferring the cache.
pub struct IndexService {
    cache: CacheStore,
    transport: Arc<dyn Transport>,
    manifest_path: String,
}

impl IndexService {
    pub fn new(
        cache: CacheStore,
        transport: Arc<dyn Transport>,
        manifest_path: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            transport,
            manifest_path: manifest_path.into(),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Return the manifest, fetching it when the cache is missing, stale,
    /// or `force_refresh` is set.
    ///
    /// A failed fetch falls back to any cached copy, however old; with no
    /// cache at all it fails with `NetworkUnavailable`. A fetched manifest
    /// that fails validation is an error and is never cached.
    pub async fn get_manifest(&self, force_refresh: bool) -> Result<LoadedIndex> {
        let cached = self.cache.load();

        if !force_refresh {
            if let Some(record) = &cached {
                let age = CacheStore::age(record);
                if age <= STALE_AFTER {
                    debug!("Using cached skill index ({} old)", format_age(age));
                    return Ok(LoadedIndex {
                        manifest: record.manifest.clone(),
                        origin: IndexOrigin::Cache { age },
                    });
                }
                debug!("Cached skill index is stale ({} old)", format_age(age));
            }
        }

        match self.fetch_remote().await {
            Ok(manifest) => {
                self.cache.save(&manifest)?;
                info!(
                    "Refreshed skill index: {} skills from {}",
                    manifest.len(),
                    self.transport.describe()
                );
                Ok(LoadedIndex {
                    manifest,
                    origin: IndexOrigin::Remote,
                })
            }
            Err(err @ SkillError::ManifestInvalid(_)) => Err(err),
            Err(err) => match cached {
                Some(record) => {
                    let age = CacheStore::age(&record);
                    warn!("Index refresh failed, serving cached copy: {}", err);
                    Ok(LoadedIndex {
                        manifest: record.manifest,
                        origin: IndexOrigin::Fallback {
                            age,
                            reason: err.to_string(),
                        },
                    })
                }
                None => Err(SkillError::NetworkUnavailable(err.to_string())),
            },
        }
    }

    /// Fetch and validate the manifest without touching the cache.
    pub async fn fetch_remote(&self) -> Result<Manifest> {
        let bytes = self.transport.fetch(&self.manifest_path).await?;
        Manifest::from_slice(&bytes)
    }
}

/// Coarse human-readable duration: "42s", "5m", "3h", "2d".
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
