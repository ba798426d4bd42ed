use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkillError {
    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("Skill index unavailable: {0} (no cached index to fall back to)")]
    NetworkUnavailable(String),

    #[error("Unknown skill: {id}{}", did_you_mean(.suggestions))]
    UnknownSkill { id: String, suggestions: Vec<String> },

    #[error("Skill '{id}' is already installed at {} (use --force to replace it)", .path.display())]
    AlreadyInstalled { id: String, path: PathBuf },

    #[error("Skill '{0}' is not installed")]
    NotInstalled(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    #[error("Failed to fetch {path}: {message}")]
    Transport { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SkillError {
    /// Shorthand for an unknown skill with no suggestions.
    pub fn unknown(id: impl Into<String>) -> Self {
        SkillError::UnknownSkill {
            id: id.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn transport(path: impl Into<String>, message: impl ToString) -> Self {
        SkillError::Transport {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this failure class.
    ///
    /// Lookup failures are usage errors (2); everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            SkillError::UnknownSkill { .. } | SkillError::NotInstalled(_) => 2,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for SkillError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => SkillError::PermissionDenied(err),
            _ => SkillError::Io(err),
        }
    }
}

fn did_you_mean(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, SkillError>;
