// Deposit Gate
//
// Read-only check for deposit schedules that block check-in. The caller
// decides what a lookup failure means; per the command contract it is
// swallowed so that deposit bookkeeping can never take check-in down.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Aggregate of the deposit schedules still blocking a check-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingDeposits {
    pub count: i64,
    pub outstanding: Decimal,
}

/// Deposit-blocking gate for check-in
#[derive(Clone)]
pub struct DepositGate {
    pool: PgPool,
}

impl DepositGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Blocking deposits still outstanding for a reservation
    ///
    /// Returns None when nothing blocks check-in. Terminal schedule states
    /// (paid, waived, cancelled) and fully-paid rows never block.
    pub async fn blocking_deposits(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<BlockingDeposits>, sqlx::Error> {
        let row: (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(amount_due - amount_paid), 0)
            FROM deposit_schedules
            WHERE reservation_id = $1
              AND blocks_check_in
              AND status NOT IN ('paid', 'waived', 'cancelled')
              AND amount_due > amount_paid
            "#,
        )
        .bind(reservation_id)
        .fetch_one(&self.pool)
        .await?;

        let (count, outstanding) = row;
        if count > 0 {
            Ok(Some(BlockingDeposits { count, outstanding }))
        } else {
            Ok(None)
        }
    }
}
