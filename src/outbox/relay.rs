// Outbox delivery relay
//
// Background loop that drains committed outbox rows to the message channel.
// Delivery is at-least-once: a row is only marked delivered after a
// successful publish, and consumers de-duplicate on event id.

use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info};

use crate::outbox::models::OutboxEvent;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("relay publish error: {0}")]
    Publish(String),
}

/// Polls pending outbox rows in commit order and publishes them
pub struct OutboxRelay {
    pool: PgPool,
    conn: ConnectionManager,
    channel: String,
    poll_interval: Duration,
    batch_size: i64,
}

impl OutboxRelay {
    pub fn new(pool: PgPool, conn: ConnectionManager, channel: impl Into<String>) -> Self {
        Self {
            pool,
            conn,
            channel: channel.into(),
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
        }
    }

    /// Run the relay loop forever. Intended to be spawned as a task.
    pub async fn run(self) {
        info!(channel = %self.channel, "Outbox relay started");
        let mut interval = time::interval(self.poll_interval);

        loop {
            interval.tick().await;

            match self.process_pending().await {
                Ok(0) => {}
                Ok(published) => debug!("Published {} outbox events", published),
                Err(e) => error!("Error processing outbox events: {}", e),
            }
        }
    }

    /// One sweep: load pending rows oldest-first, publish, mark delivered
    ///
    /// A failed publish records the error and leaves the row pending for the
    /// next sweep; rows behind it in the batch are still attempted, since
    /// ordering is only promised per aggregate and re-delivery is allowed.
    pub async fn process_pending(&self) -> Result<u32, RelayError> {
        let pending = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT event_id, aggregate_id, aggregate_type, event_type, payload, headers,
                   partition_key, delivery_status, attempts, last_error, delivered_at, created_at
            FROM outbox_events
            WHERE delivery_status = 'pending'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(self.batch_size)
        .fetch_all(&self.pool)
        .await?;

        let mut published = 0u32;
        for event in pending {
            match self.publish(&event).await {
                Ok(()) => {
                    sqlx::query(
                        r#"
                        UPDATE outbox_events
                        SET delivery_status = 'delivered',
                            delivered_at = NOW(),
                            attempts = attempts + 1
                        WHERE event_id = $1
                        "#,
                    )
                    .bind(event.event_id)
                    .execute(&self.pool)
                    .await?;

                    published += 1;
                }
                Err(e) => {
                    error!("Failed to publish event {}: {}", event.event_id, e);

                    sqlx::query(
                        r#"
                        UPDATE outbox_events
                        SET attempts = attempts + 1,
                            last_error = $2
                        WHERE event_id = $1
                        "#,
                    )
                    .bind(event.event_id)
                    .bind(e.to_string())
                    .execute(&self.pool)
                    .await?;
                }
            }
        }

        Ok(published)
    }

    async fn publish(&self, event: &OutboxEvent) -> Result<(), RelayError> {
        let envelope = envelope_json(event).map_err(|e| RelayError::Publish(e.to_string()))?;

        let mut conn = self.conn.clone();
        let _: i32 = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(envelope)
            .query_async(&mut conn)
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?;

        Ok(())
    }
}

/// Serialize the wire envelope for one outbox row
fn envelope_json(event: &OutboxEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(&serde_json::json!({
        "event_id": event.event_id,
        "aggregate_id": event.aggregate_id,
        "aggregate_type": event.aggregate_type,
        "event_type": event.event_type,
        "partition_key": event.partition_key,
        "payload": event.payload,
        "headers": event.headers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::models::DeliveryStatus;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event() -> OutboxEvent {
        OutboxEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: Uuid::new_v4(),
            aggregate_type: "reservation".to_string(),
            event_type: "reservation.checked_in".to_string(),
            payload: json!({"room_number": "311"}),
            headers: json!({"correlation_id": Uuid::new_v4()}),
            partition_key: "abc".to_string(),
            delivery_status: DeliveryStatus::Pending,
            attempts: 0,
            last_error: None,
            delivered_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_envelope_carries_identity_and_payload() {
        let event = event();
        let envelope = envelope_json(&event).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&envelope).unwrap();

        assert_eq!(parsed["event_id"], json!(event.event_id.to_string()));
        assert_eq!(parsed["event_type"], json!("reservation.checked_in"));
        assert_eq!(parsed["payload"]["room_number"], json!("311"));
    }

    #[test]
    fn test_envelope_omits_delivery_bookkeeping() {
        let envelope = envelope_json(&event()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&envelope).unwrap();

        // Consumers get the event, not our retry accounting
        assert!(parsed.get("attempts").is_none());
        assert!(parsed.get("delivery_status").is_none());
    }
}
