//! Core data models for the skill index.
//!
//! The manifest is produced upstream from the content tree and is
//! read-only here: it is parsed, validated once, and then only queried.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;
use std::sync::OnceLock;

use sk1llz_core::{Result, SkillError};

use crate::search;

/// File fetched for entries whose manifest record lists no files.
pub const DEFAULT_SKILL_FILE: &str = "SKILL.md";

// ── Category ────────────────────────────────────────────────────────────

/// Top-level section of the content tree a skill lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Languages,
    Paradigms,
    Domains,
    Organizations,
    Specialists,
    Meta,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Languages,
        Category::Paradigms,
        Category::Domains,
        Category::Organizations,
        Category::Specialists,
        Category::Meta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Languages => "languages",
            Category::Paradigms => "paradigms",
            Category::Domains => "domains",
            Category::Organizations => "organizations",
            Category::Specialists => "specialists",
            Category::Meta => "meta",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}' (expected one of: languages, paradigms, domains, organizations, specialists, meta)")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

// ── Skill Entry ─────────────────────────────────────────────────────────

/// One installable skill as described by the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillEntry {
    /// Stable slug; also the name of the install directory.
    pub id: String,

    /// Display name (usually the author directory name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub category: Category,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Location of the skill directory within the content tree.
    pub path: String,

    /// File names inside `path` that make up the skill.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl SkillEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Files to download on install.
    pub fn files_to_fetch(&self) -> Vec<&str> {
        if self.files.is_empty() {
            vec![DEFAULT_SKILL_FILE]
        } else {
            self.files.iter().map(|f| f.as_str()).collect()
        }
    }

    /// Transport path of one of this skill's files.
    pub fn file_path(&self, file: &str) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), file)
    }

    /// Lowercased `id + description + tags` text that search runs against.
    pub fn search_text(&self) -> String {
        let mut text = String::with_capacity(
            self.id.len() + self.description.len() + self.tags.len() * 12 + 2,
        );
        text.push_str(&self.id);
        text.push(' ');
        text.push_str(&self.description);
        text.push(' ');
        text.push_str(&self.tags.join(" "));
        text.to_lowercase()
    }

    fn validate(&self) -> Result<()> {
        if !id_pattern().is_match(&self.id) {
            return Err(SkillError::ManifestInvalid(format!(
                "skill id '{}' is not a valid slug",
                self.id
            )));
        }
        if self.path.trim().is_empty() {
            return Err(SkillError::ManifestInvalid(format!(
                "skill '{}' has an empty path",
                self.id
            )));
        }
        for file in &self.files {
            if !is_safe_relative(file) {
                return Err(SkillError::ManifestInvalid(format!(
                    "skill '{}' lists unsafe file '{}'",
                    self.id, file
                )));
            }
        }
        Ok(())
    }
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("id pattern is a valid regex")
    })
}

fn is_safe_relative(file: &str) -> bool {
    !file.is_empty()
        && Path::new(file)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

// ── Manifest ────────────────────────────────────────────────────────────

/// The published skill index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_base_url: Option<String>,

    pub skill_count: usize,

    pub skills: Vec<SkillEntry>,
}

impl Manifest {
    /// Build a validated manifest from entries.
    pub fn new(skills: Vec<SkillEntry>) -> Result<Self> {
        let manifest = Self {
            version: None,
            generated_at: Some(Utc::now()),
            repository: None,
            raw_base_url: None,
            skill_count: skills.len(),
            skills,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate manifest JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let manifest: Manifest = serde_json::from_slice(bytes)
            .map_err(|e| SkillError::ManifestInvalid(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        if self.skill_count != self.skills.len() {
            return Err(SkillError::ManifestInvalid(format!(
                "skill_count is {} but {} skills are listed",
                self.skill_count,
                self.skills.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.skills.len());
        for skill in &self.skills {
            skill.validate()?;
            if !seen.insert(skill.id.as_str()) {
                return Err(SkillError::ManifestInvalid(format!(
                    "duplicate skill id '{}'",
                    skill.id
                )));
            }
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Option<&SkillEntry> {
        self.skills.iter().find(|s| s.id == id)
    }

    /// Entries in `category`, in manifest order.
    pub fn filter_by_category(&self, category: Category) -> Vec<&SkillEntry> {
        self.skills
            .iter()
            .filter(|s| s.category == category)
            .collect()
    }

    /// Look up a skill by exact id, then case-insensitively by id or name.
    ///
    /// Fails with `UnknownSkill` carrying the closest ids as suggestions.
    pub fn resolve(&self, name_or_id: &str) -> Result<&SkillEntry> {
        if let Some(skill) = self.find_by_id(name_or_id) {
            return Ok(skill);
        }

        let wanted = name_or_id.trim().to_lowercase();
        let loose = self.skills.iter().find(|s| {
            s.id.to_lowercase() == wanted
                || s.name.as_deref().map(str::to_lowercase).as_deref() == Some(wanted.as_str())
        });

        loose.ok_or_else(|| SkillError::UnknownSkill {
            id: name_or_id.to_string(),
            suggestions: search::suggestions(self, name_or_id, 3),
        })
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
