use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cleaner::{CleanupOptions, clean_workspace};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use common::db::redact_dsn;
use common::storage::{WorkspaceBlobs, create_object_store};
use common::workspace::WorkspaceId;

#[derive(Parser)]
#[command(name = "wsclean")]
#[command(about = "Remove orphaned blobs and selected records from a workspace")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: WsCleanCommands,
}

#[derive(Subcommand)]
enum WsCleanCommands {
    /// Clean one workspace
    Clean(CleanArgs),
    #[command(flatten)]
    Common(CommonCommands),
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Workspace to clean
    #[arg(short, long)]
    workspace: WorkspaceId,

    /// Remove candidates that are not employees
    #[arg(long)]
    recruit: bool,

    /// Remove every tracker issue
    #[arg(long)]
    tracker: bool,

    /// Erase the transaction-log history of removed documents
    #[arg(long)]
    remove_tx: bool,

    /// Document store (transactor) DSN
    #[arg(long, env = "WSCLEAN_TRANSACTOR")]
    transactor: Option<String>,

    /// Database holding the transaction log
    #[arg(long, env = "WSCLEAN_DATABASE")]
    database: Option<String>,

    /// Object store DSN
    #[arg(long, env = "WSCLEAN_STORAGE")]
    storage: Option<String>,
}

impl CleanArgs {
    /// Flags switch phases on; they never switch off what the configuration enables.
    fn apply_to(&self, config: &mut Configuration) {
        if let Some(dsn) = &self.transactor {
            config.transactor.dsn = dsn.clone();
        }
        if let Some(dsn) = &self.database {
            config.database.dsn = dsn.clone();
        }
        if let Some(dsn) = &self.storage {
            config.storage.dsn = dsn.clone();
        }
        config.cleanup.recruit |= self.recruit;
        config.cleanup.tracker |= self.tracker;
        config.cleanup.remove_tx |= self.remove_tx;
    }
}

async fn run_clean(args: CleanArgs, mut config: Configuration) -> Result<()> {
    args.apply_to(&mut config);
    utils::validate_config(&config)?;

    log::info!("Cleaning workspace {}", args.workspace);
    log::info!("  Transactor DSN: {}", redact_dsn(&config.transactor.dsn));
    log::info!("  Database DSN: {}", redact_dsn(&config.database.dsn));
    log::info!("  Storage DSN: {}", redact_dsn(&config.storage.dsn));

    let store = create_object_store(&config.storage).context("Failed to create object store")?;
    let blobs = WorkspaceBlobs::new(store);
    let options = CleanupOptions::from(&config);

    clean_workspace(
        &config.database.dsn,
        &args.workspace,
        &blobs,
        &config.search.url,
        &config.transactor.dsn,
        &options,
    )
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;

    match cli.command {
        WsCleanCommands::Common(command) => utils::handle_common_command(&command, &config),
        WsCleanCommands::Clean(args) => run_clean(args, config).await,
    }
}
