//! Schema migrations for the sample domain.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::{debug, info, warn};

use dataquery_core::error::{AppError, ErrorKind};
use dataquery_core::result::AppResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Tables owned by the migrations, children before parents.
const OWNED_TABLES: &[&str] = &["member", "item", "team", "_sqlx_migrations"];

/// Apply every pending migration.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!(available = MIGRATOR.iter().count(), "Applying migrations");
    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, format!("migration failed: {e}"), e)
    })?;
    info!("Schema is up to date");
    Ok(())
}

/// Drop the member, team and item tables and migrate from scratch.
pub async fn reset_database(pool: &PgPool) -> AppResult<()> {
    warn!(tables = ?OWNED_TABLES, "Dropping schema");
    for table in OWNED_TABLES {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table} CASCADE"))
            .execute(pool)
            .await?;
        debug!(table, "Dropped");
    }
    run_migrations(pool).await
}
