mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sk1llz_core::{AppConfig, SkillError};
use sk1llz_skills::Category;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::commands::App;

#[derive(Parser)]
#[command(
    name = "sk1llz",
    about = "Find, inspect, and install AI coding skills",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/sk1llz/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the skill source (URL, file:// URL, or local directory)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List available skills
    List {
        /// Only show skills in this category
        #[arg(long)]
        category: Option<Category>,
    },

    /// Fuzzy-search skills by id, description, and tags
    Search {
        query: String,
        /// Only search skills in this category
        #[arg(long)]
        category: Option<Category>,
        /// Maximum number of results to print in text mode
        #[arg(short, long, default_value_t = 15)]
        limit: usize,
    },

    /// Show details for a skill
    Info {
        /// Skill id or name
        name: String,
    },

    /// Show where skills are installed
    Where,

    /// Install a skill
    Install {
        /// Skill id or name
        name: String,
        /// Install into this directory
        #[arg(short, long)]
        target: Option<PathBuf>,
        /// Install into the global skills directory even inside a project
        #[arg(short, long)]
        global: bool,
        /// Replace an existing installation
        #[arg(long)]
        force: bool,
    },

    /// Refresh the skill index
    Update {
        /// Fail instead of keeping the cached index when the refetch fails
        #[arg(long)]
        force: bool,
    },

    /// Create a project-local skills directory (./.claude/skills)
    Init,

    /// Remove an installed skill
    Uninstall {
        /// Skill id
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check cache, install directories, and connectivity
    Doctor,

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays machine-readable.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "sk1llz=warn,warn".into()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    if let Some(base_url) = &cli.base_url {
        config.source.base_url = base_url.clone();
    }

    tracing::debug!(
        "Source: {}, cache: {}",
        config.source.base_url,
        config.cache_dir().display()
    );

    let app = App::new(config, config_path, cli.format);

    match cli.command {
        Commands::List { category } => app.list(category).await?,
        Commands::Search {
            query,
            category,
            limit,
        } => app.search(&query, category, limit).await?,
        Commands::Info { name } => app.info(&name).await?,
        Commands::Where => app.where_installed()?,
        Commands::Install {
            name,
            target,
            global,
            force,
        } => app.install(&name, target, global, force).await?,
        Commands::Update { force } => app.update(force).await?,
        Commands::Init => app.init()?,
        Commands::Uninstall { name, yes } => app.uninstall(&name, yes)?,
        Commands::Doctor => app.doctor().await?,
        Commands::Config { action } => app.config(action.unwrap_or(ConfigAction::Show))?,
    }

    Ok(())
}

/// Exit status for a failed command: the `SkillError` class if there is one,
/// otherwise a generic failure.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<SkillError>()
        .map(|e| e.exit_code() as u8)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_install_flags() {
        let cli = Cli::try_parse_from([
            "sk1llz",
            "--format",
            "json",
            "install",
            "lamport",
            "--target",
            "/tmp/skills",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Install {
                name,
                target,
                global,
                force,
            } => {
                assert_eq!(name, "lamport");
                assert_eq!(target, Some(PathBuf::from("/tmp/skills")));
                assert!(!global);
                assert!(force);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_cli_parses_category_case_insensitively() {
        let cli = Cli::try_parse_from(["sk1llz", "list", "--category", "Paradigms"]).unwrap();
        match cli.command {
            Commands::List { category } => assert_eq!(category, Some(Category::Paradigms)),
            _ => panic!("expected list"),
        }

        assert!(Cli::try_parse_from(["sk1llz", "list", "--category", "poetry"]).is_err());
    }

    #[test]
    fn test_cli_parses_update_force() {
        let cli = Cli::try_parse_from(["sk1llz", "update", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { force: true }));

        let cli = Cli::try_parse_from(["sk1llz", "update"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { force: false }));
    }

    #[test]
    fn test_exit_code_classes() {
        let unknown = anyhow::Error::new(SkillError::unknown("nope"));
        assert_eq!(exit_code(&unknown), 2);

        let offline = anyhow::Error::new(SkillError::NetworkUnavailable("down".into()));
        assert_eq!(exit_code(&offline), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
    }
}
