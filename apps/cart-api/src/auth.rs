//! Terminal/staff preflight (C6 steps 1-2): resolves the calling terminal
//! from its API key, checks it is Opened, and checks a staff member is
//! signed in. Terminal/staff *account management* itself lives outside
//! this crate's scope; `info_terminal` only mirrors the fields the
//! façade gates on.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sqlx::PgPool;

use crate::error::ApiError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct TerminalRow {
    api_key_hash: String,
    status: String,
    signed_in_staff: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TerminalContext {
    pub tenant_id: String,
    pub store_code: String,
    pub terminal_no: String,
    pub staff: String,
}

#[derive(Clone)]
pub struct TerminalGateway {
    pool: PgPool,
}

impl TerminalGateway {
    pub fn new(pool: PgPool) -> Self {
        TerminalGateway { pool }
    }

    /// Resolves and authenticates a terminal, enforcing C6 steps 1-2.
    pub async fn preflight(&self, tenant_id: &str, store_code: &str, terminal_no: &str, api_key: &str) -> Result<TerminalContext, ApiError> {
        let row = sqlx::query_as::<_, TerminalRow>(
            "SELECT api_key_hash, status, signed_in_staff FROM info_terminal WHERE tenant_id = $1 AND store_code = $2 AND terminal_no = $3",
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(terminal_no)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::Store(e.into()))?
        .ok_or(ApiError::InvalidApiKey)?;

        if !verify_api_key(api_key, &row.api_key_hash) {
            return Err(ApiError::InvalidApiKey);
        }

        if row.status != "opened" {
            return Err(ApiError::TerminalNotOpened);
        }

        let staff = row.signed_in_staff.ok_or(ApiError::StaffNotSignedIn)?;

        Ok(TerminalContext { tenant_id: tenant_id.to_string(), store_code: store_code.to_string(), terminal_no: terminal_no.to_string(), staff })
    }
}

fn verify_api_key(api_key: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default().verify_password(api_key.as_bytes(), &parsed_hash).is_ok()
}

/// Hashes an API key for storage in `info_terminal.api_key_hash`.
pub fn hash_api_key(api_key: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(api_key.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::BadRequest(format!("failed to hash api key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_hash_roundtrip() {
        let hash = hash_api_key("super-secret-key").unwrap();
        assert!(verify_api_key("super-secret-key", &hash));
        assert!(!verify_api_key("wrong-key", &hash));
    }
}
