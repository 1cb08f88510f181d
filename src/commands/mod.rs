//! CLI command definitions and dispatch.

pub mod members;
pub mod migrate;
pub mod queries;
pub mod seed;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::output::OutputFormat;
use dataquery_core::config::{AppConfig, StoreBackend};
use dataquery_core::error::AppError;
use dataquery_core::traits::Store;
use dataquery_database::repositories::Repositories;
use dataquery_database::{DatabasePool, MemoryStore};
use dataquery_entity::item::ITEM_SCHEMA;
use dataquery_entity::member::MEMBER_SCHEMA;
use dataquery_entity::team::TEAM_SCHEMA;

/// Members shown by the in-memory demo, as seeded at startup.
const DEMO_MEMBERS: u32 = 100;

/// DataQuery: declarative repository queries over a relational store
#[derive(Debug, Parser)]
#[command(name = "dataquery", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Insert sample members
    Seed(seed::SeedArgs),
    /// Read members
    Members(members::MembersArgs),
    /// Inspect registered queries
    Queries(queries::QueriesArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Seed(args) => seed::execute(args, &config).await,
            Commands::Members(args) => members::execute(args, &config, self.format).await,
            Commands::Queries(args) => queries::execute(args, &config, self.format).await,
        }
    }
}

/// The configured store with the repositories built for it.
pub struct Backend {
    pub store: Arc<dyn Store>,
    pub repositories: Repositories,
}

/// Open the configured store and build every repository.
///
/// The in-memory store starts empty on every run; with `seed_demo` it is
/// filled with the demo members first.
pub async fn open_backend(config: &AppConfig, seed_demo: bool) -> Result<Backend, AppError> {
    let repositories = Repositories::build(&config.query)?;
    let store: Arc<dyn Store> = match config.database.backend {
        StoreBackend::Postgres => Arc::new(DatabasePool::connect(&config.database).await?.store()),
        StoreBackend::Memory => {
            let store = MemoryStore::new(&[&TEAM_SCHEMA, &MEMBER_SCHEMA, &ITEM_SCHEMA]);
            if seed_demo {
                seed::seed_members(&store, &repositories, DEMO_MEMBERS).await?;
                info!(members = DEMO_MEMBERS, "Seeded in-memory demo data");
            }
            Arc::new(store)
        }
    };
    Ok(Backend {
        store,
        repositories,
    })
}
