// Billing Rules Module
//
// Fee, deposit and commission computation for the reservation lifecycle:
// - Fee engine: early check-in / late check-out fee posting to the folio
// - Deposit gate: deposit schedules that block check-in
// - Commission engine: agent/channel commission records at checkout
//
// All three are embedded business-rule computation; none of them owns the
// lifecycle transaction.

pub mod commissions;
pub mod deposits;
pub mod error;
pub mod fees;

pub use commissions::{
    compute_gross, CommissionBasis, CommissionEngine, CommissionRecord, CommissionRule,
    CommissionRuleType,
};
pub use deposits::{BlockingDeposits, DepositGate};
pub use error::{BillingError, BillingResult};
pub use fees::{
    early_checkin_fee_due, late_checkout_fee_due, FeeEngine, EARLY_CHECKIN_CHARGE_CODE,
    LATE_CHECKOUT_CHARGE_CODE,
};

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::rates::RateResolution;
use crate::reservations::models::ChargePosting;

/// Billing Engine
///
/// Bundles the fee, deposit and commission engines behind one handle so the
/// command orchestrators take a single collaborator.
#[derive(Clone)]
pub struct BillingEngine {
    fee_engine: FeeEngine,
    deposit_gate: DepositGate,
    commission_engine: CommissionEngine,
}

impl BillingEngine {
    /// Create a new BillingEngine
    ///
    /// `system_actor_id` is stamped on engine-generated charge postings.
    pub fn new(pool: PgPool, system_actor_id: Uuid) -> Self {
        Self {
            fee_engine: FeeEngine::new(pool.clone(), system_actor_id),
            deposit_gate: DepositGate::new(pool.clone()),
            commission_engine: CommissionEngine::new(pool),
        }
    }

    /// Post the early check-in fee if due (own transaction)
    pub async fn post_early_checkin_fee(
        &self,
        reservation_id: Uuid,
        rate: &RateResolution,
        scheduled_check_in: NaiveDate,
        cutoff_hour: u32,
        actual_check_in: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> BillingResult<Option<ChargePosting>> {
        self.fee_engine
            .post_early_checkin_fee(
                reservation_id,
                rate,
                scheduled_check_in,
                cutoff_hour,
                actual_check_in,
                utc_offset_minutes,
            )
            .await
    }

    /// Post the late check-out fee if due (own transaction)
    pub async fn post_late_checkout_fee(
        &self,
        reservation_id: Uuid,
        rate: &RateResolution,
        scheduled_check_out: NaiveDate,
        cutoff_hour: u32,
        actual_check_out: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> BillingResult<Option<ChargePosting>> {
        self.fee_engine
            .post_late_checkout_fee(
                reservation_id,
                rate,
                scheduled_check_out,
                cutoff_hour,
                actual_check_out,
                utc_offset_minutes,
            )
            .await
    }

    /// Deposit schedules still blocking check-in, if any
    pub async fn blocking_deposits(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<BlockingDeposits>, sqlx::Error> {
        self.deposit_gate.blocking_deposits(reservation_id).await
    }

    /// Record the commission pair for a qualifying checkout (own transaction)
    pub async fn record_commission(
        &self,
        basis: &CommissionBasis,
        as_of: NaiveDate,
    ) -> BillingResult<Option<CommissionRecord>> {
        self.commission_engine.record_commission(basis, as_of).await
    }
}
