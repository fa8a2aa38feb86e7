//! Embedded SQL migrations for the cart transaction core.
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/postgres/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. Write idempotent SQL (`IF NOT EXISTS` where possible)
//! 4. **NEVER** modify existing migrations - always add new ones

use sqlx::PgPool;
use tracing::info;

use crate::error::StoreResult;

/// Embedded migrations from `migrations/postgres`, compiled into the binary.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/postgres");

/// Runs all pending database migrations. Idempotent and transactional per
/// migration; safe to call on every startup.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    info!("checking for pending migrations");
    MIGRATOR.run(pool).await?;
    info!("all migrations applied");
    Ok(())
}

/// Returns (total_migrations, applied_migrations), for health diagnostics.
pub async fn migration_status(pool: &PgPool) -> StoreResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);
    Ok((total, applied as usize))
}
