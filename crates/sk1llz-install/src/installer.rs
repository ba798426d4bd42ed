//! Skill installation.
//!
//! An install downloads every file of a skill into a hidden staging
//! directory inside the target directory and renames it into place only
//! once all files are on disk. Staging and target share a filesystem, so
//! the rename is atomic: a skill is either fully installed or absent.
//!
//! Hidden entries in the target directory belong to the installer:
//!
//! - `.sk1llz-staging-*`: a download in progress.
//! - `.sk1llz-parked-*/<id>`: a previous install moved aside during a
//!   forced replace, on platforms without an atomic exchange.
//! - `.sk1llz-trash-*`: a removed skill awaiting deletion.
//!
//! A killed process can leave any of these behind; `recover_leftovers`
//! puts parked installs back and deletes the rest once they are old enough
//! to be certain no live process owns them.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use sk1llz_core::{Result, SkillError, Transport};
use sk1llz_skills::{search, Manifest, SkillEntry};

use crate::resolver::{InstallResolution, LocationSource};
use crate::swap;

const STAGING_PREFIX: &str = ".sk1llz-staging-";
const PARKED_PREFIX: &str = ".sk1llz-parked-";
const TRASH_PREFIX: &str = ".sk1llz-trash-";

/// Staging and trash directories untouched this long are abandoned.
const STAGING_GRACE: Duration = Duration::from_secs(60 * 60);
/// A parked install lives only between two renames.
const PARKED_GRACE: Duration = Duration::from_secs(60);

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub id: String,
    pub path: PathBuf,
    pub source: LocationSource,
    pub files: Vec<String>,
    pub bytes: u64,
    /// Whether an existing installation was replaced.
    pub replaced: bool,
}

pub struct Installer {
    transport: Arc<dyn Transport>,
}

impl Installer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Install `entry` into `resolution.target_dir/<id>`.
    ///
    /// Fails with `UnknownSkill` if `entry` is not in `manifest`, and with
    /// `AlreadyInstalled` if the skill directory exists and `overwrite` is
    /// false, including when another process finishes the same install
    /// while this one is downloading. On any fetch or write failure nothing
    /// under the target directory changes.
    pub async fn install(
        &self,
        manifest: &Manifest,
        entry: &SkillEntry,
        resolution: &InstallResolution,
        overwrite: bool,
    ) -> Result<InstallReport> {
        let entry = manifest
            .find_by_id(&entry.id)
            .ok_or_else(|| SkillError::UnknownSkill {
                id: entry.id.clone(),
                suggestions: search::suggestions(manifest, &entry.id, 3),
            })?;

        recover_leftovers(&resolution.target_dir, STAGING_GRACE, PARKED_GRACE);

        let final_path = resolution.skill_dir(&entry.id);
        if final_path.exists() && !overwrite {
            return Err(already_installed(&entry.id, final_path));
        }

        resolution.ensure_dir()?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&resolution.target_dir)?;
        debug!("Staging {} in {}", entry.id, staging.path().display());

        // Dropping `staging` on any early return removes the partial download.
        let mut files = Vec::new();
        let mut bytes = 0u64;
        for file in entry.files_to_fetch() {
            let remote_path = entry.file_path(file);
            let content = self.transport.fetch(&remote_path).await?;

            let dest = staging.path().join(file);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&dest, &content).await?;

            debug!("Fetched {} ({} bytes)", remote_path, content.len());
            bytes += content.len() as u64;
            files.push(file.to_string());
        }

        let replaced = swap_into_place(
            &staging,
            &final_path,
            &resolution.target_dir,
            &entry.id,
            overwrite,
        )?;

        info!(
            "Installed {} to {} ({})",
            entry.id,
            final_path.display(),
            resolution.source
        );

        Ok(InstallReport {
            id: entry.id.clone(),
            path: final_path,
            source: resolution.source,
            files,
            bytes,
            replaced,
        })
    }
}

fn already_installed(id: &str, path: PathBuf) -> SkillError {
    SkillError::AlreadyInstalled {
        id: id.to_string(),
        path,
    }
}

/// Move the staged directory to `final_path`. Returns whether an existing
/// install was replaced.
///
/// Without `overwrite` an existing target is never touched. With it, the
/// previous install is swapped out atomically where the platform allows
/// and is otherwise parked and renamed back if the second rename fails.
/// Whatever ends up in `staging` afterwards is deleted when it drops.
fn swap_into_place(
    staging: &TempDir,
    final_path: &Path,
    target_dir: &Path,
    id: &str,
    overwrite: bool,
) -> Result<bool> {
    match swap::rename_noreplace(staging.path(), final_path) {
        Ok(()) => return Ok(false),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            if !overwrite {
                return Err(already_installed(id, final_path.to_path_buf()));
            }
        }
        Err(err) => return Err(err.into()),
    }

    if swap::exchange(staging.path(), final_path)? {
        debug!("Swapped previous {} into {}", id, staging.path().display());
        return Ok(true);
    }

    park_and_replace(staging.path(), final_path, target_dir, id)?;
    Ok(true)
}

/// Two-rename replace for platforms without an atomic exchange. The old
/// install sits in `.sk1llz-parked-*/<id>` between the renames, where
/// `recover_leftovers` finds it if the process dies.
fn park_and_replace(staged: &Path, final_path: &Path, target_dir: &Path, id: &str) -> Result<()> {
    let parked_dir = tempfile::Builder::new()
        .prefix(PARKED_PREFIX)
        .tempdir_in(target_dir)?;
    let parked = parked_dir.path().join(id);
    std::fs::rename(final_path, &parked)?;

    if let Err(err) = std::fs::rename(staged, final_path) {
        if let Err(restore) = std::fs::rename(&parked, final_path) {
            // Keep the parked copy on disk for the next recovery pass.
            let _kept = parked_dir.keep();
            warn!(
                "Could not restore previous install at {}: {}",
                final_path.display(),
                restore
            );
        }
        return Err(err.into());
    }

    Ok(())
}

/// Clean up after installer processes that died mid-operation.
///
/// Parked installs older than `parked_grace` are renamed back when their
/// skill directory is missing and deleted otherwise. Staging and trash
/// directories older than `staging_grace` are deleted. Returns the number
/// of leftovers handled; failures are logged and skipped.
pub fn recover_leftovers(
    target_dir: &Path,
    staging_grace: Duration,
    parked_grace: Duration,
) -> usize {
    let Ok(entries) = std::fs::read_dir(target_dir) else {
        return 0;
    };

    let mut handled = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        let grace = if name.starts_with(PARKED_PREFIX) {
            parked_grace
        } else if name.starts_with(STAGING_PREFIX) || name.starts_with(TRASH_PREFIX) {
            staging_grace
        } else {
            continue;
        };
        if !path.is_dir() || idle_for(&path) < grace {
            continue;
        }

        if name.starts_with(PARKED_PREFIX) {
            restore_parked(&path, target_dir);
        }
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!("Removed leftover {}", path.display());
                handled += 1;
            }
            Err(e) => warn!("Could not remove leftover {}: {}", path.display(), e),
        }
    }
    handled
}

fn restore_parked(parked_dir: &Path, target_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(parked_dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let id = entry.file_name().to_string_lossy().into_owned();
        let final_path = target_dir.join(&id);
        if !is_skill_name(&id) || final_path.exists() {
            continue;
        }
        match std::fs::rename(entry.path(), &final_path) {
            Ok(()) => warn!("Restored interrupted replace of {}", final_path.display()),
            Err(e) => warn!("Could not restore {}: {}", final_path.display(), e),
        }
    }
}

/// Time since `path` was last modified. Unknown or future times count as zero.
fn idle_for(path: &Path) -> Duration {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or(Duration::ZERO)
}

/// Whether `id` names a single visible directory entry. Anything else
/// (`..`, nested paths, hidden staging names) is never treated as a skill.
fn is_skill_name(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !id.starts_with('.')
}

/// First directory in `dirs` that contains an installed `id`.
pub fn find_installed(dirs: &[PathBuf], id: &str) -> Option<PathBuf> {
    if !is_skill_name(id) {
        return None;
    }
    dirs.iter().map(|dir| dir.join(id)).find(|path| path.is_dir())
}

/// Remove `dir/<id>`. The skill is renamed into a trash directory first,
/// so it disappears from `dir` in one step.
pub fn uninstall(dir: &Path, id: &str) -> Result<PathBuf> {
    let path = dir.join(id);
    if !is_skill_name(id) || !path.is_dir() {
        return Err(SkillError::NotInstalled(id.to_string()));
    }

    let trash = tempfile::Builder::new().prefix(TRASH_PREFIX).tempdir_in(dir)?;
    std::fs::rename(&path, trash.path().join("removed"))?;
    trash.close()?;

    info!("Removed {}", path.display());
    Ok(path)
}

/// Number of installed skills in `dir`, ignoring hidden entries such as
/// staging directories. A missing directory holds zero skills.
pub fn count_installed(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
                .count()
        })
        .unwrap_or(0)
}
