//! `migrate` subcommands.

use clap::{Args, Subcommand};

use crate::output;
use dataquery_core::config::{AppConfig, StoreBackend};
use dataquery_core::error::AppError;
use dataquery_database::DatabasePool;
use dataquery_database::migration::{reset_database, run_migrations};

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Apply pending migrations to `database.url`
    Run,
    /// Drop the member, team and item tables and migrate again
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// Migrations always target PostgreSQL, whatever backend the other
/// commands use.
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    if config.database.backend == StoreBackend::Memory {
        output::print_warning("database.backend is memory; migrating database.url anyway");
    }

    if let MigrateCommand::Reset { force: false } = args.command {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Drop member, team and item and migrate from scratch?")
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let pool = DatabasePool::connect(&config.database).await?;
    let result = match args.command {
        MigrateCommand::Run => run_migrations(pool.pool()).await,
        MigrateCommand::Reset { .. } => reset_database(pool.pool()).await,
    };
    pool.close().await;
    result?;

    output::print_success(match args.command {
        MigrateCommand::Run => "Migrations applied.",
        MigrateCommand::Reset { .. } => "Schema recreated.",
    });
    Ok(())
}
