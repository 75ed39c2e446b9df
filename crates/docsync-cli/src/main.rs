//! docsync CLI - Inspect and maintain the offline document store
//!
//! Reads the same libSQL store the editor writes while offline, so operators
//! can see what is waiting to sync and settle conflicts by hand.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{
    CacheCommands, Cli, Commands, ConflictCommands, QueueCommands, SessionCommands,
};
use crate::commands::cache::{run_cache_clear, run_cache_list, run_cache_show};
use crate::commands::common::{load_config, resolve_db_path, CliContext};
use crate::commands::conflicts::{run_conflicts_list, run_conflicts_resolve};
use crate::commands::queue::{run_queue_clear, run_queue_list};
use crate::commands::sessions::{run_sessions_list, run_sessions_prune};
use crate::commands::status::run_status;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docsync=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;
    let config = load_config(cli.config.as_deref())?;
    let ctx = CliContext::new(db_path, config);

    match cli.command {
        Commands::Status { json } => run_status(&ctx, json).await?,
        Commands::Cache { command } => match command {
            CacheCommands::Show { document_id, json } => {
                run_cache_show(&ctx, &document_id, json).await?;
            }
            CacheCommands::List {
                since,
                unsynced,
                json,
            } => run_cache_list(&ctx, since, unsynced, json).await?,
            CacheCommands::Clear { document_id } => run_cache_clear(&ctx, &document_id).await?,
        },
        Commands::Queue { command } => match command {
            QueueCommands::List { document_id, json } => {
                run_queue_list(&ctx, &document_id, json).await?;
            }
            QueueCommands::Clear { document_id } => run_queue_clear(&ctx, &document_id).await?,
        },
        Commands::Conflicts { command } => match command {
            ConflictCommands::List {
                document_id,
                unresolved,
                json,
            } => run_conflicts_list(&ctx, &document_id, unresolved, json).await?,
            ConflictCommands::Resolve {
                conflict_id,
                content_file,
                take,
            } => {
                run_conflicts_resolve(&ctx, &conflict_id, content_file.as_deref(), take).await?;
            }
        },
        Commands::Sessions { command } => match command {
            SessionCommands::List { document_id, json } => {
                run_sessions_list(&ctx, &document_id, json).await?;
            }
            SessionCommands::Prune { document_id } => {
                run_sessions_prune(&ctx, &document_id).await?;
            }
        },
    }

    Ok(())
}
