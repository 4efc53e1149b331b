// Availability Guard client
//
// Thin client for the distributed hold service that protects room inventory
// against double-booking. Holds are time-boxed: an orphaned hold expires on
// its own, so a failed release is never fatal to the system.

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Outcome status of a hold acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldStatus {
    Locked,
    Denied,
}

/// What the hold covers: a specific room, or room-type capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldScope {
    Room(Uuid),
    RoomType(Uuid),
}

/// Request to place a hold on inventory for a stay range
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub tenant_id: Uuid,
    pub reservation_id: Uuid,
    pub scope: HoldScope,
    pub stay_start: NaiveDate,
    pub stay_end: NaiveDate,
    pub reason: String,
    pub correlation_id: Uuid,
}

/// Result of a hold acquisition attempt
#[derive(Debug, Clone)]
pub struct HoldOutcome {
    pub status: HoldStatus,
    pub lock_id: Option<Uuid>,
}

impl HoldOutcome {
    pub fn locked(lock_id: Uuid) -> Self {
        Self {
            status: HoldStatus::Locked,
            lock_id: Some(lock_id),
        }
    }

    pub fn denied() -> Self {
        Self {
            status: HoldStatus::Denied,
            lock_id: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == HoldStatus::Locked
    }
}

/// Why a hold is being released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// Compensation after the owning transaction failed to commit
    TransactionFailureRollback,
    /// Success path: the owning reservation committed
    CheckInCompleted,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::TransactionFailureRollback => "TRANSACTION_FAILURE_ROLLBACK",
            ReleaseReason::CheckInCompleted => "CHECK_IN_COMPLETED",
        }
    }
}

impl std::fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors surfaced by the guard client
#[derive(Debug, Error)]
pub enum GuardError {
    /// The guard did not answer within the configured RPC timeout
    #[error("availability guard timed out")]
    Timeout,

    /// Transport-level failure talking to the guard
    #[error("availability guard transport error: {0}")]
    Transport(String),
}

impl From<redis::RedisError> for GuardError {
    fn from(err: redis::RedisError) -> Self {
        GuardError::Transport(err.to_string())
    }
}

/// Client seam for the external Availability Guard service
///
/// `release` must be idempotent against an already-released or expired hold:
/// the hold self-heals via TTL, so "not found" is success, not failure.
#[async_trait]
pub trait AvailabilityGuard: Send + Sync {
    /// Acquire a time-boxed hold. Resolves to LOCKED or DENIED before any
    /// transactional work may begin.
    async fn acquire(&self, request: &HoldRequest) -> Result<HoldOutcome, GuardError>;

    /// Release a previously acquired hold.
    async fn release(
        &self,
        tenant_id: Uuid,
        lock_id: Uuid,
        reservation_id: Uuid,
        reason: ReleaseReason,
        correlation_id: Uuid,
    ) -> Result<(), GuardError>;
}

/// Derives the keyspace entry a hold occupies
///
/// One key per scope and stay range: two walk-ins contending for the same
/// room and dates collide on the same key, which is exactly the race the
/// guard exists to arbitrate.
pub fn hold_key(tenant_id: Uuid, scope: HoldScope, stay_start: NaiveDate, stay_end: NaiveDate) -> String {
    match scope {
        HoldScope::Room(room_id) => format!(
            "hold:{}:room:{}:{}:{}",
            tenant_id, room_id, stay_start, stay_end
        ),
        HoldScope::RoomType(room_type_id) => format!(
            "hold:{}:room_type:{}:{}:{}",
            tenant_id, room_type_id, stay_start, stay_end
        ),
    }
}

fn lock_ref_key(lock_id: Uuid) -> String {
    format!("holdref:{}", lock_id)
}

/// Redis-backed Availability Guard client
///
/// Acquisition is `SET NX PX`: the hold exists exactly while the key does,
/// and the TTL is the self-heal bound. Release is a compare-and-delete
/// script keyed by lock id so a hold can only be released by its owner.
#[derive(Clone)]
pub struct RedisAvailabilityGuard {
    conn: ConnectionManager,
    hold_ttl: Duration,
    rpc_timeout: Duration,
}

// Delete the hold only if it still carries our lock id
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

impl RedisAvailabilityGuard {
    pub fn new(conn: ConnectionManager, hold_ttl: Duration, rpc_timeout: Duration) -> Self {
        Self {
            conn,
            hold_ttl,
            rpc_timeout,
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, GuardError>
    where
        F: std::future::Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.rpc_timeout, fut).await {
            Ok(result) => result.map_err(GuardError::from),
            Err(_) => Err(GuardError::Timeout),
        }
    }
}

#[async_trait]
impl AvailabilityGuard for RedisAvailabilityGuard {
    async fn acquire(&self, request: &HoldRequest) -> Result<HoldOutcome, GuardError> {
        let key = hold_key(
            request.tenant_id,
            request.scope,
            request.stay_start,
            request.stay_end,
        );
        let lock_id = Uuid::new_v4();
        let ttl_ms = self.hold_ttl.as_millis() as u64;

        let mut conn = self.conn.clone();
        let acquired: Option<String> = self
            .bounded(
                redis::cmd("SET")
                    .arg(&key)
                    .arg(lock_id.to_string())
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_ms)
                    .query_async(&mut conn),
            )
            .await?;

        if acquired.is_none() {
            tracing::debug!(
                reservation_id = %request.reservation_id,
                correlation_id = %request.correlation_id,
                "Hold denied, key already held: {}",
                key
            );
            return Ok(HoldOutcome::denied());
        }

        // Reference entry lets release find the hold key from the lock id.
        // Same TTL as the hold itself; if this write fails the hold simply
        // lives out its TTL.
        let _: () = self
            .bounded(
                redis::cmd("SET")
                    .arg(lock_ref_key(lock_id))
                    .arg(&key)
                    .arg("PX")
                    .arg(ttl_ms)
                    .query_async(&mut conn),
            )
            .await?;

        tracing::debug!(
            reservation_id = %request.reservation_id,
            lock_id = %lock_id,
            "Acquired availability hold on {}",
            key
        );
        Ok(HoldOutcome::locked(lock_id))
    }

    async fn release(
        &self,
        _tenant_id: Uuid,
        lock_id: Uuid,
        reservation_id: Uuid,
        reason: ReleaseReason,
        correlation_id: Uuid,
    ) -> Result<(), GuardError> {
        let mut conn = self.conn.clone();

        let key: Option<String> = self
            .bounded(
                redis::cmd("GET")
                    .arg(lock_ref_key(lock_id))
                    .query_async(&mut conn),
            )
            .await?;

        let Some(key) = key else {
            // Hold already expired or released; idempotent success
            tracing::debug!(
                lock_id = %lock_id,
                reservation_id = %reservation_id,
                "Release found no hold reference (already expired)"
            );
            return Ok(());
        };

        let script = redis::Script::new(RELEASE_SCRIPT);
        let deleted: i32 = self
            .bounded(
                script
                    .key(&key)
                    .arg(lock_id.to_string())
                    .invoke_async(&mut conn),
            )
            .await?;

        let _: () = self
            .bounded(
                redis::cmd("DEL")
                    .arg(lock_ref_key(lock_id))
                    .query_async(&mut conn),
            )
            .await?;

        tracing::info!(
            lock_id = %lock_id,
            reservation_id = %reservation_id,
            correlation_id = %correlation_id,
            deleted,
            "Released availability hold ({})",
            reason
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_hold_key_is_deterministic_per_scope_and_range() {
        let tenant = Uuid::new_v4();
        let room = Uuid::new_v4();
        let start = date(2025, 6, 1);
        let end = date(2025, 6, 4);

        let a = hold_key(tenant, HoldScope::Room(room), start, end);
        let b = hold_key(tenant, HoldScope::Room(room), start, end);
        assert_eq!(a, b);
        assert!(a.contains(":room:"));
        assert!(a.contains("2025-06-01"));
    }

    #[test]
    fn test_room_and_room_type_scopes_never_collide() {
        let tenant = Uuid::new_v4();
        let id = Uuid::new_v4();
        let start = date(2025, 6, 1);
        let end = date(2025, 6, 4);

        let room_key = hold_key(tenant, HoldScope::Room(id), start, end);
        let type_key = hold_key(tenant, HoldScope::RoomType(id), start, end);
        assert_ne!(room_key, type_key);
    }

    #[test]
    fn test_different_stay_ranges_get_different_keys() {
        let tenant = Uuid::new_v4();
        let room = Uuid::new_v4();

        let a = hold_key(tenant, HoldScope::Room(room), date(2025, 6, 1), date(2025, 6, 4));
        let b = hold_key(tenant, HoldScope::Room(room), date(2025, 6, 2), date(2025, 6, 4));
        assert_ne!(a, b);
    }

    #[test]
    fn test_release_reason_wire_strings() {
        assert_eq!(
            ReleaseReason::TransactionFailureRollback.as_str(),
            "TRANSACTION_FAILURE_ROLLBACK"
        );
        assert_eq!(ReleaseReason::CheckInCompleted.as_str(), "CHECK_IN_COMPLETED");
    }

    #[test]
    fn test_hold_outcome_constructors() {
        let id = Uuid::new_v4();
        let locked = HoldOutcome::locked(id);
        assert!(locked.is_locked());
        assert_eq!(locked.lock_id, Some(id));

        let denied = HoldOutcome::denied();
        assert!(!denied.is_locked());
        assert!(denied.lock_id.is_none());
    }
}
