//! Counter Service (C1): atomic per-terminal sequence allocation.

use sqlx::PgPool;
use tracing::debug;

use crate::error::StoreResult;

#[derive(Clone)]
pub struct CounterRepository {
    pool: PgPool,
}

impl CounterRepository {
    pub fn new(pool: PgPool) -> Self {
        CounterRepository { pool }
    }

    /// Atomically allocates the next value for `(terminal_id, counter_name)`.
    /// Returns a positive integer strictly greater than any previously
    /// returned value for the same key. If the store is unreachable the
    /// call fails and no counter is consumed — callers must not retry
    /// silently; the finalizer aborts on this error.
    pub async fn allocate(&self, terminal_id: &str, counter_name: &str) -> StoreResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO info_terminal_counter (terminal_id, counter_name, value)
            VALUES ($1, $2, 1)
            ON CONFLICT (terminal_id, counter_name)
            DO UPDATE SET value = info_terminal_counter.value + 1
            RETURNING value
            "#,
        )
        .bind(terminal_id)
        .bind(counter_name)
        .fetch_one(&self.pool)
        .await?;

        debug!(terminal_id, counter_name, value, "allocated counter");
        Ok(value)
    }

    pub async fn current(&self, terminal_id: &str, counter_name: &str) -> StoreResult<i64> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM info_terminal_counter WHERE terminal_id = $1 AND counter_name = $2")
            .bind(terminal_id)
            .bind(counter_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    // Bound directly to PgPool; the atomic upsert expression above can
    // only be exercised against a live Postgres, which this repo has no
    // integration-test harness for.
}
