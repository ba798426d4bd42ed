//! Skill index for sk1llz.
//!
//! Provides the manifest model, the on-disk index cache, the
//! cache-first index service, and fuzzy search over manifest entries.

pub mod cache;
pub mod index;
pub mod models;
pub mod search;

pub use cache::{CacheRecord, CacheStore};
pub use index::{format_age, IndexOrigin, IndexService, LoadedIndex, STALE_AFTER};
pub use models::{Category, Manifest, ParseCategoryError, SkillEntry};
pub use search::{fuzzy_score, search, suggestions, SearchHit};
