//! One function per subcommand. Text goes to stdout for humans, `--format
//! json` prints a single JSON document instead; warnings always go to stderr.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sk1llz_core::{transport_from_config, AppConfig, SkillError, Transport};
use sk1llz_install::{
    count_installed, find_installed, resolve, Environment, Installer, ResolveRequest,
};
use sk1llz_skills::{
    format_age, search, CacheStore, Category, IndexOrigin, IndexService, LoadedIndex, SkillEntry,
};

use crate::{ConfigAction, OutputFormat};

/// A cached index older than this is reported by `doctor`.
const DOCTOR_STALE_AFTER: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub struct App {
    config: AppConfig,
    config_path: PathBuf,
    format: OutputFormat,
}

impl App {
    pub fn new(config: AppConfig, config_path: PathBuf, format: OutputFormat) -> Self {
        Self {
            config,
            config_path,
            format,
        }
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        Ok(transport_from_config(&self.config.source)?)
    }

    fn index_service(&self, transport: Arc<dyn Transport>) -> IndexService {
        IndexService::new(
            CacheStore::in_dir(&self.config.cache_dir()),
            transport,
            self.config.source.manifest_path.clone(),
        )
    }

    fn environment(&self) -> Result<Environment> {
        Ok(Environment::detect(
            self.config.global_skills_dir(),
            &self.config.install.project_marker,
        )?)
    }

    /// Load the manifest, printing a warning when a stale copy is served.
    async fn load_index(&self, service: &IndexService, force_refresh: bool) -> Result<LoadedIndex> {
        let loaded = service.get_manifest(force_refresh).await?;
        if let Some(warning) = loaded.warning() {
            eprintln!("{} {}", paint(YELLOW, "warning:"), warning);
        }
        Ok(loaded)
    }

    pub async fn list(&self, category: Option<Category>) -> Result<()> {
        let service = self.index_service(self.transport()?);
        let index = self.load_index(&service, false).await?;
        let hits = search(&index.manifest, None, category);

        if self.json() {
            let skills: Vec<&SkillEntry> = hits.iter().map(|h| h.entry).collect();
            return print_json(&json!({ "count": skills.len(), "skills": skills }));
        }

        if hits.is_empty() {
            println!("No skills found.");
            return Ok(());
        }

        for cat in Category::ALL {
            let in_cat: Vec<_> = hits.iter().filter(|h| h.entry.category == cat).collect();
            if in_cat.is_empty() {
                continue;
            }
            println!("\n{}", paint(CYAN, &cat.as_str().to_uppercase()));
            println!("{}", "─".repeat(40));
            for hit in in_cat {
                println!(
                    "  {:<36} {}",
                    paint(GREEN, &hit.entry.id),
                    truncate(&hit.entry.description, 60)
                );
            }
        }
        println!("\n{} skills available.", hits.len());
        Ok(())
    }

    pub async fn search(&self, query: &str, category: Option<Category>, limit: usize) -> Result<()> {
        let service = self.index_service(self.transport()?);
        let index = self.load_index(&service, false).await?;
        let hits = search(&index.manifest, Some(query), category);

        if self.json() {
            let results: Vec<_> = hits
                .iter()
                .map(|h| json!({ "score": h.score, "skill": h.entry }))
                .collect();
            return print_json(&json!({
                "query": query,
                "count": results.len(),
                "results": results,
            }));
        }

        if hits.is_empty() {
            println!("No skills matching '{}'.", query);
            return Ok(());
        }

        println!("Found {} skills matching '{}':\n", hits.len(), query);
        for hit in hits.iter().take(limit) {
            println!(
                "  {}  [{}]  score {}",
                paint(GREEN, &hit.entry.id),
                hit.entry.category,
                hit.score
            );
            println!("    {}", truncate(&hit.entry.description, 70));
        }
        if hits.len() > limit {
            println!(
                "\n  ... and {} more (use --limit to show more)",
                hits.len() - limit
            );
        }
        Ok(())
    }

    pub async fn info(&self, name: &str) -> Result<()> {
        let service = self.index_service(self.transport()?);
        let index = self.load_index(&service, false).await?;
        let entry = index.manifest.resolve(name)?;
        let installed = find_installed(&self.environment()?.search_dirs(), &entry.id);

        if self.json() {
            return print_json(&json!({ "skill": entry, "installed_at": installed }));
        }

        println!("\n{}", paint(CYAN, entry.display_name()));
        println!("ID: {}", entry.id);
        println!("Category: {}", entry.category);
        if let Some(sub) = &entry.subcategory {
            println!("Subcategory: {}", sub);
        }
        println!("\nDescription\n  {}", entry.description);
        println!("\nFiles");
        for file in entry.files_to_fetch() {
            println!("  • {}", file);
        }
        if !entry.tags.is_empty() {
            println!("\nTags\n  {}", entry.tags.join(", "));
        }
        match installed {
            Some(path) => println!("\nInstalled at {}", path.display()),
            None => println!("\nInstall\n  sk1llz install {}", entry.id),
        }
        Ok(())
    }

    pub fn where_installed(&self) -> Result<()> {
        let env = self.environment()?;
        let active = resolve(&ResolveRequest::default(), &env);
        let project_dir = env.project_skills_dir();

        if self.json() {
            return print_json(&json!({
                "project": {
                    "path": project_dir,
                    "detected": env.has_project_dir,
                    "installed": count_installed(&project_dir),
                },
                "global": {
                    "path": env.global_dir,
                    "installed": count_installed(&env.global_dir),
                },
                "active": active,
            }));
        }

        println!("\n{}", paint(CYAN, "Skill installation locations"));
        println!("{}", "─".repeat(40));
        if env.has_project_dir {
            println!(
                "  Project: {} ({} installed)",
                project_dir.display(),
                count_installed(&project_dir)
            );
        } else {
            println!(
                "  Project: not detected (no {} directory here)",
                env.project_marker
            );
        }
        let global_count = if env.global_dir.is_dir() {
            format!("{} installed", count_installed(&env.global_dir))
        } else {
            "not created yet".to_string()
        };
        println!("  Global:  {} ({})", env.global_dir.display(), global_count);
        println!(
            "\n  Active:  {} [{}]",
            active.target_dir.display(),
            active.source
        );
        Ok(())
    }

    pub async fn install(
        &self,
        name: &str,
        target: Option<PathBuf>,
        global: bool,
        force: bool,
    ) -> Result<()> {
        let transport = self.transport()?;
        let service = self.index_service(transport.clone());
        let index = self.load_index(&service, false).await?;
        let entry = index.manifest.resolve(name)?;

        let resolution = resolve(&ResolveRequest { target, global }, &self.environment()?);
        let report = Installer::new(transport)
            .install(&index.manifest, entry, &resolution, force)
            .await?;

        if self.json() {
            return print_json(&report);
        }

        println!(
            "{} {} {} ({}, {} files, {} bytes)",
            paint(GREEN, "✓"),
            if report.replaced { "Reinstalled" } else { "Installed" },
            report.id,
            report.source,
            report.files.len(),
            report.bytes
        );
        println!("  {}", report.path.display());
        Ok(())
    }

    /// Refetch the index. A failed fetch with a cached copy present is a
    /// warning, unless `strict` is set, in which case it is an error.
    pub async fn update(&self, strict: bool) -> Result<()> {
        let service = self.index_service(self.transport()?);
        let index = service.get_manifest(true).await?;
        if let IndexOrigin::Fallback { reason, .. } = &index.origin {
            if strict {
                anyhow::bail!("could not refresh the skill index: {}", reason);
            }
        }
        if let Some(warning) = index.warning() {
            eprintln!("{} {}", paint(YELLOW, "warning:"), warning);
        }

        if self.json() {
            return print_json(&json!({
                "skill_count": index.manifest.len(),
                "refreshed": index.origin == IndexOrigin::Remote,
                "generated_at": index.manifest.generated_at,
            }));
        }

        match index.origin {
            IndexOrigin::Remote => println!(
                "{} Skill index updated: {} skills.",
                paint(GREEN, "✓"),
                index.manifest.len()
            ),
            _ => println!(
                "Skill index not refreshed; {} cached skills remain available.",
                index.manifest.len()
            ),
        }
        Ok(())
    }

    /// Create `./.claude/skills/.gitkeep`.
    pub fn init(&self) -> Result<()> {
        let env = self.environment()?;
        let skills_dir = env.project_skills_dir();
        let created = init_project_dir(&skills_dir)?;

        if self.json() {
            return print_json(&json!({ "path": skills_dir, "created": created }));
        }

        if created {
            println!(
                "{} Created {}",
                paint(GREEN, "✓"),
                skills_dir.display()
            );
            println!("Skills installed from this directory now go here by default.");
        } else {
            println!("Already initialized: {}", skills_dir.display());
        }
        Ok(())
    }

    pub fn uninstall(&self, name: &str, yes: bool) -> Result<()> {
        let env = self.environment()?;
        let dir = env
            .search_dirs()
            .into_iter()
            .find(|dir| find_installed(std::slice::from_ref(dir), name).is_some())
            .ok_or_else(|| SkillError::NotInstalled(name.to_string()))?;

        if !yes && !confirm(&format!("Remove {}?", dir.join(name).display()))? {
            println!("Cancelled.");
            return Ok(());
        }

        let removed = sk1llz_install::uninstall(&dir, name)?;

        if self.json() {
            return print_json(&json!({ "id": name, "removed": removed }));
        }
        println!("{} Removed {}", paint(GREEN, "✓"), removed.display());
        Ok(())
    }

    pub async fn doctor(&self) -> Result<()> {
        let mut checks = Vec::new();

        let cache_dir = self.config.cache_dir();
        checks.push(if cache_dir.is_dir() {
            Check::ok("cache directory", cache_dir.display().to_string())
        } else {
            Check::issue(
                "cache directory",
                format!("{} does not exist yet; run `sk1llz update`", cache_dir.display()),
            )
        });

        let cache = CacheStore::in_dir(&cache_dir);
        checks.push(match cache.load() {
            Some(record) => {
                let age = CacheStore::age(&record);
                let detail = format!(
                    "{} skills, fetched {} ago",
                    record.manifest.len(),
                    format_age(age)
                );
                if age > DOCTOR_STALE_AFTER {
                    Check::issue("skill index", format!("{}; run `sk1llz update`", detail))
                } else {
                    Check::ok("skill index", detail)
                }
            }
            None => Check::issue("skill index", "no usable cached index".to_string()),
        });

        let env = self.environment()?;
        let existing: Vec<_> = env.search_dirs().into_iter().filter(|d| d.is_dir()).collect();
        checks.push(if existing.is_empty() {
            Check::issue(
                "install directory",
                "none yet; run `sk1llz init` or install a skill".to_string(),
            )
        } else {
            let shown: Vec<_> = existing.iter().map(|d| d.display().to_string()).collect();
            Check::ok("install directory", shown.join(", "))
        });

        let transport = self.transport()?;
        let source = transport.describe();
        checks.push(match self.index_service(transport).fetch_remote().await {
            Ok(manifest) => Check::ok(
                "network",
                format!("{} reachable ({} skills)", source, manifest.len()),
            ),
            Err(err) => Check::issue("network", err.to_string()),
        });

        if self.json() {
            return print_json(&json!({ "checks": checks }));
        }

        println!("\n{}\n", paint(CYAN, "sk1llz doctor"));
        for check in &checks {
            let status = if check.ok {
                paint(GREEN, "OK")
            } else {
                paint(YELLOW, "WARN")
            };
            println!("  {:<18} {:<5} {}", check.name, status, check.detail);
        }

        let issues = checks.iter().filter(|c| !c.ok).count();
        if issues == 0 {
            println!("\n{} All checks passed.", paint(GREEN, "✓"));
        } else {
            println!("\n{} issue(s) found.", issues);
        }
        Ok(())
    }

    pub fn config(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&self.config)?);
            }
            ConfigAction::Init => {
                if self.config_path.exists() {
                    println!("Config already exists at: {}", self.config_path.display());
                } else {
                    self.config.save_to(&self.config_path)?;
                    println!("Created default config at: {}", self.config_path.display());
                }
            }
            ConfigAction::Path => {
                println!("{}", self.config_path.display());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

impl Check {
    fn ok(name: &'static str, detail: String) -> Self {
        Self {
            name,
            ok: true,
            detail,
        }
    }

    fn issue(name: &'static str, detail: String) -> Self {
        Self {
            name,
            ok: false,
            detail,
        }
    }
}

/// Create `skills_dir` with a `.gitkeep`. Returns false if it already existed.
fn init_project_dir(skills_dir: &Path) -> Result<bool> {
    if skills_dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(skills_dir)?;
    std::fs::write(skills_dir.join(".gitkeep"), "")?;
    tracing::info!("Initialized {}", skills_dir.display());
    Ok(true)
}

/// Ask on stderr so stdout carries only command output.
fn confirm(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    Ok(ask(question, &mut stdin.lock(), &mut std::io::stderr())?)
}

fn ask(question: &str, input: &mut impl BufRead, prompt: &mut impl Write) -> std::io::Result<bool> {
    write!(prompt, "{} [y/N] ", question)?;
    prompt.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

const CYAN: &str = "1;36";
const GREEN: &str = "1;32";
const YELLOW: &str = "1;33";

/// Wrap `text` in an ANSI color when stdout is a terminal.
fn paint(code: &str, text: &str) -> String {
    if std::io::stdout().is_terminal() {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk1llz_install::InstallReport;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "version": "1.0",
        "generated_at": "2026-01-01T00:00:00Z",
        "skill_count": 2,
        "skills": [
            {
                "id": "lamport-distributed-systems",
                "name": "lamport",
                "category": "languages",
                "description": "Design distributed systems...",
                "tags": ["distributed", "consensus"],
                "path": "paradigms/distributed/lamport",
                "files": ["SKILL.md"]
            },
            {
                "id": "knuth-literate",
                "category": "specialists",
                "description": "Literate programming",
                "tags": [],
                "path": "specialists/knuth"
            }
        ]
    }"#;

    /// A content tree on disk plus a config pointing every directory into it.
    fn fixture() -> (TempDir, App) {
        let temp_dir = TempDir::new().unwrap();
        let content = temp_dir.path().join("content");
        std::fs::create_dir_all(content.join("paradigms/distributed/lamport")).unwrap();
        std::fs::create_dir_all(content.join("specialists/knuth")).unwrap();
        std::fs::write(content.join("skills.json"), MANIFEST).unwrap();
        std::fs::write(
            content.join("paradigms/distributed/lamport/SKILL.md"),
            "# Lamport\n",
        )
        .unwrap();
        std::fs::write(content.join("specialists/knuth/SKILL.md"), "# Knuth\n").unwrap();

        let mut config = AppConfig::default();
        config.source.base_url = content.display().to_string();
        config.cache.dir = Some(temp_dir.path().join("cache"));
        config.install.global_dir = Some(temp_dir.path().join("global"));

        let app = App::new(config, temp_dir.path().join("config.toml"), OutputFormat::Json);
        (temp_dir, app)
    }

    #[tokio::test]
    async fn test_install_by_name_then_already_installed() {
        let (temp_dir, app) = fixture();
        let target = temp_dir.path().join("target");

        app.install("lamport", Some(target.clone()), false, false)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(target.join("lamport-distributed-systems/SKILL.md")).unwrap(),
            "# Lamport\n"
        );

        let err = app
            .install("lamport-distributed-systems", Some(target), false, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SkillError>(),
            Some(SkillError::AlreadyInstalled { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_defaults_skill_md_and_caches_index() {
        let (temp_dir, app) = fixture();
        let target = temp_dir.path().join("target");

        app.install("knuth-literate", Some(target.clone()), false, false)
            .await
            .unwrap();
        assert!(target.join("knuth-literate/SKILL.md").is_file());
        assert!(temp_dir.path().join("cache/index.json").is_file());
    }

    #[tokio::test]
    async fn test_unknown_skill_carries_suggestions() {
        let (_temp_dir, app) = fixture();
        let err = app.info("lamprt").await.unwrap_err();
        match err.downcast_ref::<SkillError>() {
            Some(SkillError::UnknownSkill { suggestions, .. }) => {
                assert_eq!(suggestions[0], "lamport-distributed-systems");
            }
            other => panic!("expected UnknownSkill, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_source_without_cache_is_network_unavailable() {
        let (temp_dir, mut app) = fixture();
        app.config.source.base_url = temp_dir.path().join("nowhere").display().to_string();

        let err = app.list(None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SkillError>(),
            Some(SkillError::NetworkUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_update_then_offline_search_uses_cache() {
        let (temp_dir, mut app) = fixture();
        app.update(false).await.unwrap();

        app.config.source.base_url = temp_dir.path().join("nowhere").display().to_string();
        app.search("consensus", None, 15).await.unwrap();
        app.update(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_strict_update_fails_when_only_cache_is_available() {
        let (temp_dir, mut app) = fixture();
        app.update(true).await.unwrap();

        app.config.source.base_url = temp_dir.path().join("nowhere").display().to_string();
        let err = app.update(true).await.unwrap_err();
        assert!(err.to_string().contains("could not refresh"));
        assert!(err.downcast_ref::<SkillError>().is_none());
        assert!(temp_dir.path().join("cache/index.json").is_file());
    }

    #[test]
    fn test_uninstall_missing_is_not_installed() {
        let (_temp_dir, app) = fixture();
        let err = app.uninstall("lamport-distributed-systems", true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SkillError>(),
            Some(SkillError::NotInstalled(_))
        ));
    }

    #[test]
    fn test_init_project_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let skills = temp_dir.path().join(".claude").join("skills");
        assert!(init_project_dir(&skills).unwrap());
        assert!(skills.join(".gitkeep").is_file());
        assert!(!init_project_dir(&skills).unwrap());
    }

    #[test]
    fn test_config_init_writes_file_once() {
        let (temp_dir, app) = fixture();
        app.config(ConfigAction::Init).unwrap();
        let written = std::fs::read_to_string(temp_dir.path().join("config.toml")).unwrap();
        assert!(written.contains("[source]"));

        app.config(ConfigAction::Init).unwrap();
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("config.toml")).unwrap(),
            written
        );
    }

    #[test]
    fn test_install_report_serializes_source_tag() {
        let report = InstallReport {
            id: "knuth".into(),
            path: PathBuf::from("/tmp/knuth"),
            source: sk1llz_install::LocationSource::ProjectLocal,
            files: vec!["SKILL.md".into()],
            bytes: 8,
            replaced: false,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["source"], "project-local");
    }

    #[test]
    fn test_ask_writes_prompt_to_given_sink() {
        let mut prompt = Vec::new();
        let yes = ask("Remove knuth?", &mut "yes\n".as_bytes(), &mut prompt).unwrap();
        assert!(yes);
        assert_eq!(String::from_utf8(prompt).unwrap(), "Remove knuth? [y/N] ");

        let mut prompt = Vec::new();
        assert!(!ask("Remove knuth?", &mut "\n".as_bytes(), &mut prompt).unwrap());
        assert!(!ask("Remove knuth?", &mut "".as_bytes(), &mut prompt).unwrap());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a fairly long description", 10), "a fairl...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }
}
