//! Sample data seeding.

use clap::Args;
use tracing::info;

use crate::output;
use dataquery_core::config::{AppConfig, StoreBackend};
use dataquery_core::error::AppError;
use dataquery_core::traits::Store;
use dataquery_database::repositories::Repositories;
use dataquery_entity::Member;
use dataquery_query::Session;

/// Arguments for the seed command
#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Number of members to insert
    #[arg(long, default_value_t = 100)]
    pub count: u32,
}

/// Insert `user0..user{count-1}` with age equal to the index, in one
/// transaction.
pub async fn seed_members<S: Store + ?Sized>(
    store: &S,
    repositories: &Repositories,
    count: u32,
) -> Result<(), AppError> {
    let members = repositories.members.repository();
    let mut session = Session::begin(store).await?;
    for i in 0..count {
        let age = i32::try_from(i)
            .map_err(|_| AppError::validation(format!("member index {i} is out of range")))?;
        members
            .save(&mut session, Member::with_age(format!("user{i}"), age))
            .await?;
    }
    session.commit().await?;
    info!(count, "Seeded members");
    Ok(())
}

/// Execute the seed command
pub async fn execute(args: &SeedArgs, config: &AppConfig) -> Result<(), AppError> {
    let backend = super::open_backend(config, false).await?;
    seed_members(backend.store.as_ref(), &backend.repositories, args.count).await?;

    output::print_success(&format!("Inserted {} members.", args.count));
    if config.database.backend == StoreBackend::Memory {
        output::print_warning("The in-memory store is discarded when the process exits.");
    }
    Ok(())
}
