// Lifecycle & outbox writer
//
// Writes the lifecycle audit row and the outbox row inside the caller's
// open transaction. This is the load-bearing invariant of the command
// processor: an event row exists if and only if the business mutation it
// describes committed.

use sqlx::{Postgres, Transaction};

use crate::outbox::models::LifecycleRecord;

/// Writer for the lifecycle audit trail and the transactional outbox
///
/// The writer never opens a transaction of its own. Orchestrators hand it
/// the handle of the primary transaction so the audit row, the outbox row
/// and the business mutation commit or roll back as one unit.
#[derive(Debug, Clone, Default)]
pub struct LifecycleOutboxWriter;

impl LifecycleOutboxWriter {
    pub fn new() -> Self {
        Self
    }

    /// Append one lifecycle row and its outbox twin to the open transaction
    ///
    /// Both rows share the record's event id. Failure of either insert
    /// propagates to the caller, rolling the whole unit of work back with
    /// the business mutation.
    pub async fn append_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &LifecycleRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO lifecycle_events
                (event_id, reservation_id, command, correlation_id, partition_key, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.event_id)
        .bind(record.reservation_id)
        .bind(&record.command)
        .bind(record.correlation_id)
        .bind(&record.partition_key)
        .bind(&record.details)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO outbox_events
                (event_id, aggregate_id, aggregate_type, event_type, payload, headers,
                 partition_key, delivery_status)
            VALUES ($1, $2, 'reservation', $3, $4, $5, $6, 'pending')
            "#,
        )
        .bind(record.event_id)
        .bind(record.reservation_id)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(&record.headers)
        .bind(&record.partition_key)
        .execute(&mut **tx)
        .await?;

        tracing::debug!(
            event_id = %record.event_id,
            reservation_id = %record.reservation_id,
            event_type = %record.event_type,
            "Appended lifecycle and outbox rows to open transaction"
        );
        Ok(())
    }
}
