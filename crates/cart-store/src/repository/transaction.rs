//! Transaction log (C2 persisted-layout tables `log_tran` / `status_tran`):
//! append-only transaction records plus their mutable void/return status.

use std::collections::BTreeMap;

use cart_core::{Transaction, TransactionStatus};
use sqlx::PgPool;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

#[derive(Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        TransactionRepository { pool }
    }

    /// Appends an immutable transaction record and its initial status row.
    /// Unique on the five-part key; a retried BILL with the same
    /// `(terminal, business_date, transaction_no)` is rejected as a
    /// conflict rather than silently duplicated, since `transaction_no` is
    /// allocated once per BILL via the counter service.
    pub async fn insert(&self, tran: &Transaction) -> StoreResult<()> {
        let doc = serde_json::to_value(tran).map_err(|e| StoreError::Internal(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO log_tran (
                tenant_id, store_code, terminal_no, business_date, transaction_no,
                receipt_no, transaction_type, reference_transaction_no, document, generate_date_time
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&tran.tenant_id)
        .bind(&tran.store_code)
        .bind(&tran.terminal_no)
        .bind(tran.business_date as i32)
        .bind(tran.transaction_no)
        .bind(tran.receipt_no)
        .bind(tran.transaction_type.code())
        .bind(tran.reference_transaction_no)
        .bind(&doc)
        .bind(tran.generate_date_time)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO status_tran (
                tenant_id, store_code, terminal_no, business_date, transaction_no,
                is_voided, is_refunded, returned_quantity_milli
            ) VALUES ($1, $2, $3, $4, $5, false, false, '{}')
            "#,
        )
        .bind(&tran.tenant_id)
        .bind(&tran.store_code)
        .bind(&tran.terminal_no)
        .bind(tran.business_date as i32)
        .bind(tran.transaction_no)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(transaction_no = tran.transaction_no, "transaction logged");
        Ok(())
    }

    pub async fn find(
        &self,
        tenant_id: &str,
        store_code: &str,
        terminal_no: &str,
        business_date: u32,
        transaction_no: i64,
    ) -> StoreResult<Transaction> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            SELECT document FROM log_tran
            WHERE tenant_id = $1 AND store_code = $2 AND terminal_no = $3
              AND business_date = $4 AND transaction_no = $5
            "#,
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(terminal_no)
        .bind(business_date as i32)
        .bind(transaction_no)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((doc,)) => serde_json::from_value(doc).map_err(|e| StoreError::Internal(e.to_string())),
            None => Err(StoreError::not_found("Transaction", transaction_no.to_string())),
        }
    }

    /// Looks up a transaction by its store-scoped key without constraining
    /// on the terminal that rang it up, so a caller can compare the
    /// original's `terminal_no` against its own before acting on it.
    pub async fn find_by_store(&self, tenant_id: &str, store_code: &str, business_date: u32, transaction_no: i64) -> StoreResult<Transaction> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            SELECT document FROM log_tran
            WHERE tenant_id = $1 AND store_code = $2 AND business_date = $3 AND transaction_no = $4
            "#,
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(business_date as i32)
        .bind(transaction_no)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((doc,)) => serde_json::from_value(doc).map_err(|e| StoreError::Internal(e.to_string())),
            None => Err(StoreError::not_found("Transaction", transaction_no.to_string())),
        }
    }

    /// Lists transactions for a terminal, most recent first, bounded by
    /// `limit` and optionally narrowed to a single business date.
    pub async fn list_for_terminal(
        &self,
        tenant_id: &str,
        store_code: &str,
        terminal_no: &str,
        business_date: Option<u32>,
        limit: i64,
    ) -> StoreResult<Vec<Transaction>> {
        let rows: Vec<(serde_json::Value,)> = match business_date {
            Some(date) => {
                sqlx::query_as(
                    r#"
                    SELECT document FROM log_tran
                    WHERE tenant_id = $1 AND store_code = $2 AND terminal_no = $3 AND business_date = $4
                    ORDER BY generate_date_time DESC LIMIT $5
                    "#,
                )
                .bind(tenant_id)
                .bind(store_code)
                .bind(terminal_no)
                .bind(date as i32)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT document FROM log_tran
                    WHERE tenant_id = $1 AND store_code = $2 AND terminal_no = $3
                    ORDER BY generate_date_time DESC LIMIT $4
                    "#,
                )
                .bind(tenant_id)
                .bind(store_code)
                .bind(terminal_no)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|(doc,)| serde_json::from_value(doc).map_err(|e| StoreError::Internal(e.to_string()))).collect()
    }

    pub async fn find_status(
        &self,
        tenant_id: &str,
        store_code: &str,
        terminal_no: &str,
        business_date: u32,
        transaction_no: i64,
    ) -> StoreResult<TransactionStatus> {
        let row = sqlx::query_as::<_, StatusRow>(
            r#"
            SELECT is_voided, void_transaction_no, void_date_time, void_staff_id,
                   is_refunded, returned_quantity_milli
            FROM status_tran
            WHERE tenant_id = $1 AND store_code = $2 AND terminal_no = $3
              AND business_date = $4 AND transaction_no = $5
            "#,
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(terminal_no)
        .bind(business_date as i32)
        .bind(transaction_no)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("TransactionStatus", transaction_no.to_string()))?;

        Ok(TransactionStatus {
            tenant_id: tenant_id.to_string(),
            store_code: store_code.to_string(),
            terminal_no: terminal_no.to_string(),
            business_date,
            transaction_no,
            is_voided: row.is_voided,
            void_transaction_no: row.void_transaction_no,
            void_date_time: row.void_date_time,
            void_staff_id: row.void_staff_id,
            is_refunded: row.is_refunded,
            returned_quantity_milli: serde_json::from_value(row.returned_quantity_milli).unwrap_or_default(),
        })
    }

    /// Marks `transaction_no` as voided by `void_transaction_no`.
    pub async fn mark_voided(
        &self,
        tenant_id: &str,
        store_code: &str,
        terminal_no: &str,
        business_date: u32,
        transaction_no: i64,
        void_transaction_no: i64,
        void_staff_id: &str,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE status_tran SET
                is_voided = true,
                void_transaction_no = $6,
                void_date_time = now(),
                void_staff_id = $7
            WHERE tenant_id = $1 AND store_code = $2 AND terminal_no = $3
              AND business_date = $4 AND transaction_no = $5 AND is_voided = false
            "#,
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(terminal_no)
        .bind(business_date as i32)
        .bind(transaction_no)
        .bind(void_transaction_no)
        .bind(void_staff_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                entity: "transaction_status",
                id: transaction_no.to_string(),
                expected: "not voided".to_string(),
                actual: "already voided or missing".to_string(),
            });
        }
        Ok(())
    }

    /// Accumulates a per-line returned quantity and flips `is_refunded`
    /// once every original line is fully returned. `fully_refunded` is
    /// computed by the caller (cart-core knows the original line
    /// quantities; this repository only persists the running map).
    pub async fn record_return(
        &self,
        tenant_id: &str,
        store_code: &str,
        terminal_no: &str,
        business_date: u32,
        transaction_no: i64,
        returned_quantity_milli: &BTreeMap<u32, i64>,
        fully_refunded: bool,
    ) -> StoreResult<()> {
        let map = serde_json::to_value(returned_quantity_milli).map_err(|e| StoreError::Internal(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE status_tran SET
                returned_quantity_milli = $6,
                is_refunded = $7
            WHERE tenant_id = $1 AND store_code = $2 AND terminal_no = $3
              AND business_date = $4 AND transaction_no = $5
            "#,
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(terminal_no)
        .bind(business_date as i32)
        .bind(transaction_no)
        .bind(&map)
        .bind(fully_refunded)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("TransactionStatus", transaction_no.to_string()));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    is_voided: bool,
    void_transaction_no: Option<i64>,
    void_date_time: Option<chrono::DateTime<chrono::Utc>>,
    void_staff_id: Option<String>,
    is_refunded: bool,
    returned_quantity_milli: serde_json::Value,
}

#[cfg(test)]
mod tests {
    // Bound directly to PgPool; needs a live Postgres to exercise the
    // conflict/not-found branches above, which this repo has no
    // integration-test harness for.
}
