// Fee Engine
//
// Posts early check-in and late check-out fees against the guest folio.
// Each posting runs in its own transaction, separate from the lifecycle
// transaction: a fee that cannot post must never block the stay itself.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::billing::error::{BillingError, BillingResult};
use crate::rates::RateResolution;
use crate::reservations::models::ChargePosting;
use crate::reservations::repository::FoliosRepository;

/// Charge code posted for an arrival before the check-in cutoff
pub const EARLY_CHECKIN_CHARGE_CODE: &str = "EARLY_CHECKIN_FEE";
/// Charge code posted for a departure after the check-out cutoff
pub const LATE_CHECKOUT_CHARGE_CODE: &str = "LATE_CHECKOUT_FEE";

/// Translate an instant into the property-local wall clock
fn property_local(at: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDateTime {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    at.with_timezone(&offset).naive_local()
}

/// Fee due when the actual check-in precedes the scheduled date's cutoff hour
///
/// Returns the fee amount, or None when no fee applies (zero fee configured,
/// or arrival at/after the cutoff).
pub fn early_checkin_fee_due(
    fee: Decimal,
    scheduled_check_in: NaiveDate,
    cutoff_hour: u32,
    actual_check_in: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> Option<Decimal> {
    if fee <= Decimal::ZERO {
        return None;
    }

    let cutoff = scheduled_check_in.and_hms_opt(cutoff_hour, 0, 0)?;
    let local_actual = property_local(actual_check_in, utc_offset_minutes);

    if local_actual < cutoff {
        Some(fee)
    } else {
        None
    }
}

/// Symmetric rule: fee due when the actual check-out is after the scheduled
/// date's cutoff hour
pub fn late_checkout_fee_due(
    fee: Decimal,
    scheduled_check_out: NaiveDate,
    cutoff_hour: u32,
    actual_check_out: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> Option<Decimal> {
    if fee <= Decimal::ZERO {
        return None;
    }

    let cutoff = scheduled_check_out.and_hms_opt(cutoff_hour, 0, 0)?;
    let local_actual = property_local(actual_check_out, utc_offset_minutes);

    if local_actual > cutoff {
        Some(fee)
    } else {
        None
    }
}

/// Fee Engine
///
/// Fee postings are an atomic unit of their own, decoupled from the
/// lifecycle transaction.
#[derive(Clone)]
pub struct FeeEngine {
    pool: PgPool,
    folios: FoliosRepository,
    system_actor_id: Uuid,
}

impl FeeEngine {
    pub fn new(pool: PgPool, system_actor_id: Uuid) -> Self {
        let folios = FoliosRepository::new(pool.clone());
        Self {
            pool,
            folios,
            system_actor_id,
        }
    }

    /// Post the early check-in fee if the rule fires
    ///
    /// Returns the created posting, or None when no fee applied.
    pub async fn post_early_checkin_fee(
        &self,
        reservation_id: Uuid,
        rate: &RateResolution,
        scheduled_check_in: NaiveDate,
        cutoff_hour: u32,
        actual_check_in: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> BillingResult<Option<ChargePosting>> {
        let Some(amount) = early_checkin_fee_due(
            rate.early_checkin_fee,
            scheduled_check_in,
            cutoff_hour,
            actual_check_in,
            utc_offset_minutes,
        ) else {
            return Ok(None);
        };

        self.post_fee(
            reservation_id,
            EARLY_CHECKIN_CHARGE_CODE,
            "Early check-in fee",
            amount,
        )
        .await
        .map(Some)
    }

    /// Post the late check-out fee if the rule fires
    pub async fn post_late_checkout_fee(
        &self,
        reservation_id: Uuid,
        rate: &RateResolution,
        scheduled_check_out: NaiveDate,
        cutoff_hour: u32,
        actual_check_out: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> BillingResult<Option<ChargePosting>> {
        let Some(amount) = late_checkout_fee_due(
            rate.late_checkout_fee,
            scheduled_check_out,
            cutoff_hour,
            actual_check_out,
            utc_offset_minutes,
        ) else {
            return Ok(None);
        };

        self.post_fee(
            reservation_id,
            LATE_CHECKOUT_CHARGE_CODE,
            "Late check-out fee",
            amount,
        )
        .await
        .map(Some)
    }

    /// Write the posting and the folio totals bump as one atomic unit
    async fn post_fee(
        &self,
        reservation_id: Uuid,
        charge_code: &str,
        description: &str,
        amount: Decimal,
    ) -> BillingResult<ChargePosting> {
        let mut tx = self.pool.begin().await?;

        let folio = self
            .folios
            .lock_open_by_reservation(&mut tx, reservation_id)
            .await?
            .ok_or(BillingError::NoOpenFolio(reservation_id))?;

        let posting = self
            .folios
            .post_charge(
                &mut tx,
                folio.id,
                reservation_id,
                charge_code,
                description,
                amount,
                self.system_actor_id,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            reservation_id = %reservation_id,
            charge_code,
            %amount,
            "Posted fee to folio {}",
            folio.id
        );
        Ok(posting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn utc(y: i32, m: u32, day: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, h, min, 0).unwrap()
    }

    #[test]
    fn test_early_arrival_before_cutoff_owes_fee() {
        // Cutoff 14:00, arrival at 12:00 local on the scheduled date
        let due = early_checkin_fee_due(dec!(25), d(2025, 6, 1), 14, utc(2025, 6, 1, 12, 0), 0);
        assert_eq!(due, Some(dec!(25)));
    }

    #[test]
    fn test_arrival_after_cutoff_owes_nothing() {
        let due = early_checkin_fee_due(dec!(25), d(2025, 6, 1), 14, utc(2025, 6, 1, 15, 0), 0);
        assert_eq!(due, None);
    }

    #[test]
    fn test_arrival_exactly_at_cutoff_owes_nothing() {
        let due = early_checkin_fee_due(dec!(25), d(2025, 6, 1), 14, utc(2025, 6, 1, 14, 0), 0);
        assert_eq!(due, None);
    }

    #[test]
    fn test_zero_fee_configuration_never_fires() {
        let due = early_checkin_fee_due(dec!(0), d(2025, 6, 1), 14, utc(2025, 6, 1, 8, 0), 0);
        assert_eq!(due, None);
    }

    #[test]
    fn test_cutoff_is_evaluated_property_local() {
        // 13:30 UTC is 15:30 at UTC+2: past the 14:00 cutoff, no fee
        let due = early_checkin_fee_due(dec!(25), d(2025, 6, 1), 14, utc(2025, 6, 1, 13, 30), 120);
        assert_eq!(due, None);

        // Same instant at UTC-3 is 10:30 local: fee applies
        let due = early_checkin_fee_due(dec!(25), d(2025, 6, 1), 14, utc(2025, 6, 1, 13, 30), -180);
        assert_eq!(due, Some(dec!(25)));
    }

    #[test]
    fn test_late_departure_after_cutoff_owes_fee() {
        let due = late_checkout_fee_due(dec!(40), d(2025, 6, 4), 12, utc(2025, 6, 4, 13, 0), 0);
        assert_eq!(due, Some(dec!(40)));
    }

    #[test]
    fn test_departure_at_or_before_cutoff_owes_nothing() {
        assert_eq!(
            late_checkout_fee_due(dec!(40), d(2025, 6, 4), 12, utc(2025, 6, 4, 12, 0), 0),
            None
        );
        assert_eq!(
            late_checkout_fee_due(dec!(40), d(2025, 6, 4), 12, utc(2025, 6, 4, 9, 0), 0),
            None
        );
    }
}
