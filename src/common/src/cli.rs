use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared by every command
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Commands that inspect the configuration without touching any workspace
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use crate::db::redact_dsn;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Pick the log filter: explicit flags win over `RUST_LOG`.
    pub fn log_filter(args: &CommonArgs) -> EnvFilter {
        if args.quiet {
            EnvFilter::new("warn")
        } else if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter(args))
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("wsclean configuration:");
            println!("======================");
            println!("Database DSN: {}", redact_dsn(&config.database.dsn));
            println!("Transactor DSN: {}", redact_dsn(&config.transactor.dsn));
            println!(
                "Transactor connect timeout: {:?}",
                config.transactor.connect_timeout
            );
            println!("Storage DSN: {}", redact_dsn(&config.storage.dsn));
            println!("Search URL: {}", config.search.url);
            println!(
                "Cleanup: recruit={} tracker={} remove_tx={}",
                config.cleanup.recruit, config.cleanup.tracker, config.cleanup.remove_tx
            );
            println!(
                "Batch sizes: candidates={} issues={}",
                config.cleanup.candidate_batch_size, config.cleanup.issue_batch_size
            );
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.database.dsn.is_empty() {
            anyhow::bail!("Database DSN cannot be empty");
        }

        if config.transactor.dsn.is_empty() {
            anyhow::bail!("Transactor DSN cannot be empty");
        }

        if config.storage.dsn.is_empty() {
            anyhow::bail!("Storage DSN cannot be empty");
        }
        url::Url::parse(&config.storage.dsn)
            .with_context(|| format!("Invalid storage DSN '{}'", config.storage.dsn))?;

        if config.cleanup.candidate_batch_size == 0 {
            anyhow::bail!("cleanup.candidate_batch_size must be positive");
        }

        if config.cleanup.issue_batch_size == 0 {
            anyhow::bail!("cleanup.issue_batch_size must be positive");
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle commands that only inspect the configuration
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(())
            }
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
