//! Event delivery ledger (`status_tran_delivery`): tracks fan-out of
//! published transaction events to subscribers, and serves the
//! republisher's sweep for stale pending/partial/failed deliveries.

use chrono::{DateTime, Utc};
use cart_core::EventDelivery;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

#[derive(Clone)]
pub struct DeliveryRepository {
    pool: PgPool,
}

impl DeliveryRepository {
    pub fn new(pool: PgPool) -> Self {
        DeliveryRepository { pool }
    }

    pub async fn insert(&self, delivery: &EventDelivery) -> StoreResult<()> {
        let overall = serde_json::to_value(delivery.overall_status).map_err(|e| StoreError::Internal(e.to_string()))?;
        let overall_status: String = overall.as_str().unwrap_or("pending").to_string();
        let services = serde_json::to_value(&delivery.services).map_err(|e| StoreError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO status_tran_delivery (event_id, tenant_id, overall_status, payload, services, published_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(delivery.event_id)
        .bind(&delivery.tenant_id)
        .bind(&overall_status)
        .bind(&delivery.payload)
        .bind(&services)
        .bind(delivery.published_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(&self, event_id: &Uuid) -> StoreResult<EventDelivery> {
        let row = sqlx::query_as::<_, DeliveryRow>(
            "SELECT event_id, tenant_id, overall_status, payload, services, published_at FROM status_tran_delivery WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("EventDelivery", event_id.to_string()))?;

        row.into_delivery()
    }

    /// Persists an updated set of per-service statuses and the recomputed
    /// overall status (recomputation itself happens in `cart-core`; this
    /// call just writes the result).
    pub async fn update_status(&self, delivery: &EventDelivery) -> StoreResult<()> {
        let overall = serde_json::to_value(delivery.overall_status).map_err(|e| StoreError::Internal(e.to_string()))?;
        let overall_status: String = overall.as_str().unwrap_or("pending").to_string();
        let services = serde_json::to_value(&delivery.services).map_err(|e| StoreError::Internal(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE status_tran_delivery SET overall_status = $2, services = $3 WHERE event_id = $1",
        )
        .bind(delivery.event_id)
        .bind(&overall_status)
        .bind(&services)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("EventDelivery", delivery.event_id.to_string()));
        }
        Ok(())
    }

    /// Returns deliveries not yet fully delivered, published strictly
    /// before `older_than` and strictly after `not_before` — the
    /// republisher's retry window (spec'd grace period on one side,
    /// give-up window on the other).
    pub async fn find_stale(&self, older_than: DateTime<Utc>, not_before: DateTime<Utc>, limit: i64) -> StoreResult<Vec<EventDelivery>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(
            r#"
            SELECT event_id, tenant_id, overall_status, payload, services, published_at
            FROM status_tran_delivery
            WHERE overall_status IN ('pending', 'partially_delivered', 'failed')
              AND published_at < $1
              AND published_at > $2
            ORDER BY published_at ASC
            LIMIT $3
            "#,
        )
        .bind(older_than)
        .bind(not_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeliveryRow::into_delivery).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    event_id: Uuid,
    tenant_id: String,
    #[allow(dead_code)]
    overall_status: String,
    payload: serde_json::Value,
    services: serde_json::Value,
    published_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_delivery(self) -> StoreResult<EventDelivery> {
        let services = serde_json::from_value(self.services).map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut delivery = EventDelivery {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            published_at: self.published_at,
            overall_status: cart_core::OverallDeliveryStatus::Pending,
            payload: self.payload,
            services,
        };
        delivery.recompute_overall_status();
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    // Bound directly to PgPool; the sweep predicate above is plain SQL
    // that can only be exercised against a live Postgres, which this repo
    // has no integration-test harness for.
}
