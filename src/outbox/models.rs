use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Delivery status of an outbox row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Append-only audit row, one per orchestrator invocation
///
/// Used for idempotency and replay diagnostics, never for coordination.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LifecycleEvent {
    pub event_id: Uuid,
    pub reservation_id: Uuid,
    pub command: String,
    pub correlation_id: Uuid,
    pub partition_key: String,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Durable handoff row for the message-publishing collaborator
///
/// Shares its event id with the lifecycle row written in the same
/// transaction. Consumers de-duplicate on event id; per-aggregate ordering
/// is the commit order of the writing transactions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutboxEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub headers: JsonValue,
    pub partition_key: String,
    pub delivery_status: DeliveryStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Everything one lifecycle transition writes to the audit trail and outbox
///
/// Built by the orchestrator before the primary transaction and handed to
/// the writer as a single unit.
#[derive(Debug, Clone)]
pub struct LifecycleRecord {
    pub event_id: Uuid,
    pub reservation_id: Uuid,
    pub command: String,
    pub correlation_id: Uuid,
    pub partition_key: String,
    pub details: JsonValue,
    pub event_type: String,
    pub payload: JsonValue,
    pub headers: JsonValue,
}

impl LifecycleRecord {
    /// Create a record for one command invocation
    ///
    /// The event id is minted here and shared between the lifecycle row and
    /// the outbox row. The partition key is the reservation id, which is
    /// what gives downstream consumers per-aggregate ordering.
    pub fn new(
        reservation_id: Uuid,
        command: &str,
        event_type: &str,
        correlation_id: Uuid,
        initiated_by: Uuid,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            reservation_id,
            command: command.to_string(),
            correlation_id,
            partition_key: reservation_id.to_string(),
            details: payload.clone(),
            event_type: event_type.to_string(),
            payload,
            headers: serde_json::json!({
                "correlation_id": correlation_id,
                "initiated_by": initiated_by,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_record_shares_event_id_between_rows() {
        let reservation_id = Uuid::new_v4();
        let record = LifecycleRecord::new(
            reservation_id,
            "check_in",
            "reservation.checked_in",
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!({"room_number": "204"}),
        );

        // One event id keys both the audit row and the outbox row
        assert_eq!(record.partition_key, reservation_id.to_string());
        assert_eq!(record.details, record.payload);
        assert_eq!(record.command, "check_in");
    }

    #[test]
    fn test_headers_carry_correlation_and_actor() {
        let correlation_id = Uuid::new_v4();
        let initiated_by = Uuid::new_v4();
        let record = LifecycleRecord::new(
            Uuid::new_v4(),
            "check_out",
            "reservation.checked_out",
            correlation_id,
            initiated_by,
            json!({}),
        );

        assert_eq!(
            record.headers["correlation_id"],
            json!(correlation_id.to_string())
        );
        assert_eq!(
            record.headers["initiated_by"],
            json!(initiated_by.to_string())
        );
    }

    #[test]
    fn test_delivery_status_strings() {
        assert_eq!(DeliveryStatus::Pending.as_str(), "pending");
        assert_eq!(DeliveryStatus::Delivered.as_str(), "delivered");
        assert_eq!(DeliveryStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_two_records_never_share_an_event_id() {
        let reservation_id = Uuid::new_v4();
        let a = LifecycleRecord::new(
            reservation_id,
            "check_in",
            "reservation.checked_in",
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!({}),
        );
        let b = LifecycleRecord::new(
            reservation_id,
            "check_out",
            "reservation.checked_out",
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!({}),
        );
        assert_ne!(a.event_id, b.event_id);
    }
}
