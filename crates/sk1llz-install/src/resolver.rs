//! Install location resolution.
//!
//! Resolution is a pure function of the request flags and a snapshot of the
//! environment; the only filesystem probe happens in `Environment::probe`.
//! Rules, first match wins:
//!
//! 1. `--target <dir>`: that directory.
//! 2. `--global`: the global skills directory.
//! 3. a project marker directory (`.claude`) in the working directory:
//!    `./.claude/skills`.
//! 4. otherwise the global skills directory.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use sk1llz_core::Result;

/// Why a target directory was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationSource {
    ProjectLocal,
    Global,
    ExplicitOverride,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LocationSource::ProjectLocal => "project-local",
            LocationSource::Global => "global",
            LocationSource::ExplicitOverride => "explicit-override",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallResolution {
    pub target_dir: PathBuf,
    pub source: LocationSource,
}

impl InstallResolution {
    /// Directory a given skill is installed into.
    pub fn skill_dir(&self, id: &str) -> PathBuf {
        self.target_dir.join(id)
    }

    /// Create `target_dir` and its parents.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.target_dir)?;
        Ok(())
    }
}

/// Location flags from the command line.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub target: Option<PathBuf>,
    pub global: bool,
}

/// Snapshot of the inputs resolution depends on.
#[derive(Debug, Clone)]
pub struct Environment {
    pub cwd: PathBuf,
    pub global_dir: PathBuf,
    pub project_marker: String,
    /// Whether `cwd/project_marker` is an existing directory.
    pub has_project_dir: bool,
}

impl Environment {
    /// Probe the current working directory.
    pub fn detect(global_dir: PathBuf, project_marker: &str) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::probe(cwd, global_dir, project_marker))
    }

    pub fn probe(cwd: PathBuf, global_dir: PathBuf, project_marker: &str) -> Self {
        let has_project_dir = cwd.join(project_marker).is_dir();
        Self {
            cwd,
            global_dir,
            project_marker: project_marker.to_string(),
            has_project_dir,
        }
    }

    /// `./.claude/skills`, whether or not it exists yet.
    pub fn project_skills_dir(&self) -> PathBuf {
        self.cwd.join(&self.project_marker).join("skills")
    }

    /// Directories that may hold installed skills: project-local first
    /// (when a project is detected), then global.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(2);
        if self.has_project_dir {
            dirs.push(self.project_skills_dir());
        }
        dirs.push(self.global_dir.clone());
        dirs
    }
}

/// Decide where skills get installed.
pub fn resolve(request: &ResolveRequest, env: &Environment) -> InstallResolution {
    if let Some(target) = &request.target {
        return InstallResolution {
            target_dir: absolutize(target, &env.cwd),
            source: LocationSource::ExplicitOverride,
        };
    }

    if !request.global && env.has_project_dir {
        return InstallResolution {
            target_dir: env.project_skills_dir(),
            source: LocationSource::ProjectLocal,
        };
    }

    InstallResolution {
        target_dir: env.global_dir.clone(),
        source: LocationSource::Global,
    }
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
