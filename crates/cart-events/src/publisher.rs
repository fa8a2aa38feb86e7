//! Event Publisher + Delivery Tracker (C8): writes the delivery ledger row
//! and publishes the transaction to the `tranlog_report` fan-out channel.
//! Publication always returns success to the caller regardless of
//! subscriber fate — delivery is tracked asynchronously via acks.

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use cart_core::{DeliveryStatus, EventDelivery, OverallDeliveryStatus, ServiceDeliveryEntry, Transaction};
use cart_store::DeliveryRepository;
use tracing::{info, warn};

use crate::config::TRANLOG_REPORT_CHANNEL;
use crate::error::EventResult;

#[derive(Clone)]
pub struct EventPublisher {
    deliveries: DeliveryRepository,
    redis: ConnectionManager,
    subscribers: Vec<String>,
}

impl EventPublisher {
    pub fn new(deliveries: DeliveryRepository, redis: ConnectionManager, subscribers: Vec<String>) -> Self {
        EventPublisher { deliveries, redis, subscribers }
    }

    /// Publishes `transaction` as a new event: writes the EventDelivery
    /// row with one pending entry per configured subscriber, then
    /// publishes the payload to the fan-out channel.
    pub async fn publish(&self, transaction: &Transaction) -> EventResult<Uuid> {
        let event_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "event_id": event_id,
            "transaction": transaction,
        });

        let services = self
            .subscribers
            .iter()
            .map(|name| ServiceDeliveryEntry { service_name: name.clone(), status: DeliveryStatus::Pending, delivered_at: None, error_message: None })
            .collect();

        let mut delivery = EventDelivery {
            event_id,
            tenant_id: transaction.tenant_id.clone(),
            published_at: Utc::now(),
            overall_status: OverallDeliveryStatus::Pending,
            payload: payload.clone(),
            services,
        };
        delivery.recompute_overall_status();

        self.deliveries.insert(&delivery).await?;

        self.publish_to_channel(&payload).await;

        info!(event_id = %event_id, transaction_no = transaction.transaction_no, "event published");
        Ok(event_id)
    }

    /// Re-publishes an already-tracked event (C9) without mutating its
    /// delivery row beyond what the ack callback will later apply.
    pub async fn republish(&self, delivery: &EventDelivery) {
        self.publish_to_channel(&delivery.payload).await;
    }

    /// Returns deliveries eligible for republication: not fully delivered,
    /// published before `older_than` (the grace cutoff) and after
    /// `not_before` (the lookback-window cutoff).
    pub async fn deliveries_for_sweep(
        &self,
        older_than: chrono::DateTime<Utc>,
        not_before: chrono::DateTime<Utc>,
        limit: i64,
    ) -> EventResult<Vec<EventDelivery>> {
        Ok(self.deliveries.find_stale(older_than, not_before, limit).await?)
    }

    async fn publish_to_channel(&self, payload: &serde_json::Value) {
        let mut conn = self.redis.clone();
        let body = match serde_json::to_string(payload) {
            Ok(b) => b,
            Err(err) => {
                warn!(error = %err, "failed to serialize event payload, publish skipped");
                return;
            }
        };

        if let Err(err) = conn.publish::<_, _, ()>(TRANLOG_REPORT_CHANNEL, body).await {
            warn!(error = %err, channel = TRANLOG_REPORT_CHANNEL, "publish to fan-out channel failed");
        }
    }

    /// Applies a subscriber acknowledgement and persists the recomputed
    /// overall status.
    pub async fn acknowledge(&self, event_id: &Uuid, service: &str, status: DeliveryStatus, message: Option<String>) -> EventResult<()> {
        let mut delivery = self.deliveries.find(event_id).await?;

        if let Some(entry) = delivery.services.iter_mut().find(|s| s.service_name == service) {
            entry.status = status;
            entry.error_message = message;
            if status == DeliveryStatus::Delivered {
                entry.delivered_at = Some(Utc::now());
            }
        }

        delivery.recompute_overall_status();
        self.deliveries.update_status(&delivery).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // EventPublisher requires a live Postgres + Redis, which this repo has
    // no test harness for. The overall-status rollup it relies on is unit
    // tested directly on `cart_core::EventDelivery::recompute_overall_status`.
}
