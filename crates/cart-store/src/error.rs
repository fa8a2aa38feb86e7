//! Error types for cart-store operations.

use cart_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("optimistic-concurrency conflict on {entity} {id}: expected etag {expected}, found {actual}")]
    Conflict { entity: &'static str, id: String, expected: String, actual: String },

    #[error("concurrency retry exhausted for {entity} {id} after {attempts} attempts")]
    ConcurrencyRetryExhausted { entity: &'static str, id: String, attempts: u32 },

    #[error("unique constraint violated on {field}={value}")]
    UniqueViolation { field: String, value: String },

    #[error("circuit open for dependency {dependency}")]
    CircuitOpen { dependency: String },

    #[error("connection to {dependency} failed: {message}")]
    ConnectionFailed { dependency: String, message: String },

    #[error("migration failed: {0}")]
    MigrationFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound { entity, id: id.into() }
    }

    /// Whether the client should retry this error (per the error-handling
    /// design: ConcurrencyRetryExhausted and CircuitOpen-backed
    /// StoreUnavailable are the only retryable store-originated kinds).
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ConcurrencyRetryExhausted { .. } | StoreError::CircuitOpen { .. } | StoreError::PoolExhausted)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound { entity: "row", id: String::new() },
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                if message.contains("unique") || message.contains("duplicate key") {
                    StoreError::UniqueViolation { field: "unknown".into(), value: message }
                } else {
                    StoreError::QueryFailed(message)
                }
            }
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::PoolClosed => StoreError::ConnectionFailed { dependency: "postgres".into(), message: "pool closed".into() },
            other => StoreError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::ConnectionFailed { dependency: "redis".into(), message: err.to_string() }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(StoreError::CircuitOpen { dependency: "redis".into() }.is_retryable());
        assert!(StoreError::ConcurrencyRetryExhausted { entity: "cart", id: "1".into(), attempts: 3 }.is_retryable());
        assert!(!StoreError::not_found("cart", "1").is_retryable());
    }
}
