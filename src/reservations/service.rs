use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::availability::{AvailabilityGuard, HoldRequest, HoldScope, ReleaseReason};
use crate::billing::{BillingEngine, CommissionBasis};
use crate::models::{Room, RoomStatus};
use crate::outbox::{LifecycleOutboxWriter, LifecycleRecord};
use crate::rates::{RateQuery, RateResolution, RateResolver};
use crate::reservations::error::ReservationError;
use crate::reservations::models::{
    CheckInRequest, CheckOutRequest, CommandAccepted, Reservation, WalkInCheckInRequest,
};
use crate::reservations::repository::{
    FoliosRepository, NewWalkInReservation, ReservationsRepository, RoomsRepository,
};
use crate::reservations::side_effects::{run_post_commit, SideEffect};
use crate::reservations::status_machine::StatusMachine;

/// Explicit configuration for the command orchestrators
///
/// Passed in rather than read from globals so the service is testable
/// without process-wide state.
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Actor stamped on engine-generated postings
    pub system_actor_id: Uuid,
    /// Property-local offset from UTC, in minutes
    pub property_utc_offset_minutes: i32,
    /// Arrivals before this hour on the scheduled date owe the early fee
    pub checkin_cutoff_hour: u32,
    /// Departures after this hour on the scheduled date owe the late fee
    pub checkout_cutoff_hour: u32,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            system_actor_id: Uuid::nil(),
            property_utc_offset_minutes: 0,
            checkin_cutoff_hour: 14,
            checkout_cutoff_hour: 12,
        }
    }
}

/// Why a folio was settled at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementReason {
    Checkout,
    ExpressCheckout,
}

impl SettlementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementReason::Checkout => "CHECKOUT",
            SettlementReason::ExpressCheckout => "EXPRESS_CHECKOUT",
        }
    }
}

/// What checkout does with the open folio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementAction {
    Settle(SettlementReason),
    /// Forced checkout: proceed and leave the folio open
    LeaveOpen,
}

/// Folio settlement enforcement for checkout
///
/// A positive balance blocks checkout unless `express` (settle anyway,
/// deferred billing) or `force` (proceed unsettled) is set. Express wins
/// over force. A zero or credit balance settles normally.
pub fn decide_settlement(
    balance: Decimal,
    force: bool,
    express: bool,
) -> Result<SettlementAction, ReservationError> {
    if express {
        return Ok(SettlementAction::Settle(SettlementReason::ExpressCheckout));
    }

    if balance > Decimal::ZERO {
        if force {
            return Ok(SettlementAction::LeaveOpen);
        }
        return Err(ReservationError::FolioUnsettled { balance });
    }

    Ok(SettlementAction::Settle(SettlementReason::Checkout))
}

/// Compensation for a hold whose owning transaction failed
///
/// Invoked exactly once per failed walk-in transaction. A failed release is
/// logged at error level for operational attention; the hold self-heals via
/// its TTL, so the command outcome is unchanged.
pub async fn release_hold_after_failure(
    guard: &dyn AvailabilityGuard,
    tenant_id: Uuid,
    lock_id: Uuid,
    reservation_id: Uuid,
    correlation_id: Uuid,
) {
    if let Err(e) = guard
        .release(
            tenant_id,
            lock_id,
            reservation_id,
            ReleaseReason::TransactionFailureRollback,
            correlation_id,
        )
        .await
    {
        tracing::error!(
            lock_id = %lock_id,
            reservation_id = %reservation_id,
            correlation_id = %correlation_id,
            "Failed to release availability hold after transaction failure; \
             hold will expire via TTL: {}",
            e
        );
    }
}

/// Orchestrators for the reservation lifecycle commands
///
/// Each command runs as an independent, stateless unit of work: validate
/// preconditions, run the rule engines, then write the mutation, the
/// lifecycle audit row and the outbox row in one primary transaction.
/// Best-effort steps run after commit and never change the outcome.
#[derive(Clone)]
pub struct ReservationCommandService {
    pool: PgPool,
    reservations: ReservationsRepository,
    rooms: RoomsRepository,
    folios: FoliosRepository,
    billing: BillingEngine,
    guard: Arc<dyn AvailabilityGuard>,
    rates: Arc<dyn RateResolver>,
    writer: LifecycleOutboxWriter,
    config: CommandConfig,
}

impl ReservationCommandService {
    /// Create a new ReservationCommandService
    pub fn new(
        pool: PgPool,
        guard: Arc<dyn AvailabilityGuard>,
        rates: Arc<dyn RateResolver>,
        config: CommandConfig,
    ) -> Self {
        Self {
            reservations: ReservationsRepository::new(pool.clone()),
            rooms: RoomsRepository::new(pool.clone()),
            folios: FoliosRepository::new(pool.clone()),
            billing: BillingEngine::new(pool.clone(), config.system_actor_id),
            guard,
            rates,
            writer: LifecycleOutboxWriter::new(),
            pool,
            config,
        }
    }

    /// Check in an existing reservation
    ///
    /// Flow: state check, deposit gate, early-fee posting (own transaction,
    /// best-effort), then the primary transaction that locks the reservation
    /// row, resolves the room under lock, marks the reservation CheckedIn
    /// and appends lifecycle + outbox. The room status flip to Occupied is a
    /// post-commit best-effort step.
    pub async fn check_in(
        &self,
        reservation_id: Uuid,
        request: CheckInRequest,
    ) -> Result<CommandAccepted, ReservationError> {
        let reservation = self
            .reservations
            .find_by_id(reservation_id)
            .await?
            .ok_or(ReservationError::NotFound)?;

        if !StatusMachine::can_check_in(reservation.status) {
            return Err(ReservationError::InvalidStatusForCheckIn(reservation.status));
        }

        // Deposit gate. A lookup failure must never take check-in down, so
        // it degrades to "no blocking deposits".
        if !request.override_deposit {
            match self.billing.blocking_deposits(reservation_id).await {
                Ok(Some(blocking)) => {
                    return Err(ReservationError::DepositRequired {
                        outstanding: blocking.outstanding,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        reservation_id = %reservation_id,
                        "Deposit lookup failed, treating as no blocking deposits: {}",
                        e
                    );
                }
            }
        }

        let actual_check_in = Utc::now();

        // Early check-in fee, its own atomic unit, never blocks the command
        match self.resolve_rate_for(&reservation).await {
            Ok(rate) => {
                if let Err(e) = self
                    .billing
                    .post_early_checkin_fee(
                        reservation_id,
                        &rate,
                        reservation.check_in_date,
                        self.config.checkin_cutoff_hour,
                        actual_check_in,
                        self.config.property_utc_offset_minutes,
                    )
                    .await
                {
                    tracing::warn!(
                        reservation_id = %reservation_id,
                        "Early check-in fee posting failed: {}",
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    reservation_id = %reservation_id,
                    "Rate resolution for early fee failed, skipping fee: {}",
                    e
                );
            }
        }

        // Primary transaction
        let mut tx = self.pool.begin().await?;

        let locked = self
            .reservations
            .lock_by_id(&mut tx, reservation_id)
            .await?
            .ok_or(ReservationError::NotFound)?;

        // Re-check under the row lock; a concurrent command may have won
        if !StatusMachine::can_check_in(locked.status) {
            return Err(ReservationError::InvalidStatusForCheckIn(locked.status));
        }

        let room = self
            .resolve_room_in_tx(&mut tx, &locked, request.room_id)
            .await?;

        let updated = self
            .reservations
            .mark_checked_in(&mut tx, reservation_id, room.id, &room.room_number, actual_check_in)
            .await?;

        let record = LifecycleRecord::new(
            reservation_id,
            "check_in",
            "reservation.checked_in",
            request.correlation_id,
            request.initiated_by,
            json!({
                "room_id": room.id,
                "room_number": room.room_number,
                "actual_check_in": actual_check_in,
                "status": updated.status,
            }),
        );
        self.writer.append_in_tx(&mut tx, &record).await?;

        tx.commit().await?;

        tracing::info!(
            reservation_id = %reservation_id,
            room_number = %room.room_number,
            "Reservation checked in"
        );

        let rooms = self.rooms.clone();
        let room_id = room.id;
        run_post_commit(
            "check_in",
            reservation_id,
            vec![SideEffect::new("flip_room_occupied", async move {
                rooms
                    .set_status(room_id, RoomStatus::Occupied)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })],
        )
        .await;

        Ok(CommandAccepted::new(record.event_id, request.correlation_id))
    }

    /// Check out a checked-in reservation
    ///
    /// Flow: state check, folio settlement enforcement, late-fee posting
    /// (own transaction, best-effort), then the primary transaction that
    /// marks the reservation CheckedOut, applies the settlement decision and
    /// appends lifecycle + outbox. Room flip to Dirty, stay statistics and
    /// commission recording run post-commit, each best-effort.
    pub async fn check_out(
        &self,
        reservation_id: Uuid,
        request: CheckOutRequest,
    ) -> Result<CommandAccepted, ReservationError> {
        let reservation = self
            .reservations
            .find_by_id(reservation_id)
            .await?
            .ok_or(ReservationError::NotFound)?;

        if !StatusMachine::can_check_out(reservation.status) {
            return Err(ReservationError::InvalidStatusForCheckOut(reservation.status));
        }

        // Settlement enforcement against the open folio, if there is one
        let settlement = match self.folios.find_open_by_reservation(reservation_id).await? {
            Some(folio) => Some(decide_settlement(folio.balance, request.force, request.express)?),
            None => None,
        };

        if settlement == Some(SettlementAction::LeaveOpen) {
            tracing::warn!(
                reservation_id = %reservation_id,
                "Forced checkout with unsettled folio balance"
            );
        }

        let actual_check_out = Utc::now();

        // Late check-out fee, its own atomic unit, never blocks the command
        match self.resolve_rate_for(&reservation).await {
            Ok(rate) => {
                if let Err(e) = self
                    .billing
                    .post_late_checkout_fee(
                        reservation_id,
                        &rate,
                        reservation.check_out_date,
                        self.config.checkout_cutoff_hour,
                        actual_check_out,
                        self.config.property_utc_offset_minutes,
                    )
                    .await
                {
                    tracing::warn!(
                        reservation_id = %reservation_id,
                        "Late check-out fee posting failed: {}",
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    reservation_id = %reservation_id,
                    "Rate resolution for late fee failed, skipping fee: {}",
                    e
                );
            }
        }

        // Primary transaction
        let mut tx = self.pool.begin().await?;

        let locked = self
            .reservations
            .lock_by_id(&mut tx, reservation_id)
            .await?
            .ok_or(ReservationError::NotFound)?;

        if !StatusMachine::can_check_out(locked.status) {
            return Err(ReservationError::InvalidStatusForCheckOut(locked.status));
        }

        let updated = self
            .reservations
            .mark_checked_out(&mut tx, reservation_id, actual_check_out)
            .await?;

        let mut folio_settled_as = None;
        if let Some(SettlementAction::Settle(reason)) = settlement {
            if let Some(folio) = self
                .folios
                .lock_open_by_reservation(&mut tx, reservation_id)
                .await?
            {
                self.folios
                    .settle_in_tx(&mut tx, folio.id, reason.as_str())
                    .await?;
                folio_settled_as = Some(reason.as_str());
            }
        }

        let record = LifecycleRecord::new(
            reservation_id,
            "check_out",
            "reservation.checked_out",
            request.correlation_id,
            request.initiated_by,
            json!({
                "actual_check_out": actual_check_out,
                "status": updated.status,
                "folio_settled_as": folio_settled_as,
                "forced": request.force,
                "express": request.express,
            }),
        );
        self.writer.append_in_tx(&mut tx, &record).await?;

        tx.commit().await?;

        tracing::info!(reservation_id = %reservation_id, "Reservation checked out");

        let mut effects = Vec::new();

        if let Some(room_id) = updated.room_id {
            let rooms = self.rooms.clone();
            effects.push(SideEffect::new("flip_room_dirty", async move {
                rooms
                    .set_status(room_id, RoomStatus::Dirty)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }));
        }

        {
            let reservations = self.reservations.clone();
            let guest_id = updated.guest_id;
            let nights = updated.nights();
            let last_stay_on = updated.check_out_date;
            effects.push(SideEffect::new("update_guest_stay_stats", async move {
                reservations
                    .record_stay_stats(guest_id, nights, last_stay_on)
                    .await
                    .map_err(|e| e.to_string())
            }));
        }

        {
            let billing = self.billing.clone();
            let basis = CommissionBasis {
                tenant_id: updated.tenant_id,
                reservation_id,
                agent_company_id: updated.travel_agent_id,
                source_channel: updated.source_channel.clone(),
                revenue: updated.total_amount,
                currency: updated.currency.clone(),
            };
            let as_of = updated.check_out_date;
            effects.push(SideEffect::new("record_commission", async move {
                billing
                    .record_commission(&basis, as_of)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }));
        }

        run_post_commit("check_out", reservation_id, effects).await;

        Ok(CommandAccepted::new(record.event_id, request.correlation_id))
    }

    /// Register and check in a walk-in guest
    ///
    /// The guest is physically present, so the reservation is created
    /// directly in CheckedIn, skipping the asynchronous creation pipeline.
    /// The availability hold is acquired before the primary transaction
    /// begins and compensated (released) if that transaction fails for any
    /// reason; a committed walk-in releases the hold best-effort.
    pub async fn walk_in_check_in(
        &self,
        request: WalkInCheckInRequest,
    ) -> Result<CommandAccepted, ReservationError> {
        if crate::validation::validate_stay_range(request.check_in_date, request.check_out_date)
            .is_err()
        {
            return Err(ReservationError::ValidationError(
                "check_out_date must be after check_in_date".to_string(),
            ));
        }

        // Rate resolution happens first; a timeout here fails the command
        // before any hold or transaction exists
        let rate = self
            .rates
            .resolve(&RateQuery {
                tenant_id: request.tenant_id,
                property_id: request.property_id,
                room_type_id: request.room_type_id,
                stay_start: request.check_in_date,
                stay_end: request.check_out_date,
                requested_rate_code: request.requested_rate_code.clone(),
            })
            .await?;

        if rate.fallback_applied && !request.accept_rate_fallback {
            return Err(ReservationError::RateFallbackNotAllowed {
                requested: rate.requested_rate_code.clone().unwrap_or_default(),
                applied: rate.applied_rate_code.clone(),
            });
        }

        // Candidate room; re-validated under row lock inside the transaction
        let room = match request.room_id {
            Some(room_id) => {
                let room = self.rooms.find_by_id(room_id).await?.ok_or_else(|| {
                    ReservationError::RoomUnavailable("room not found".to_string())
                })?;
                if !room.status.is_assignable() {
                    return Err(ReservationError::RoomUnavailable(format!(
                        "room {} is {}",
                        room.room_number, room.status
                    )));
                }
                room
            }
            None => self
                .rooms
                .find_best_available(
                    request.property_id,
                    request.room_type_id,
                    request.check_in_date,
                    request.check_out_date,
                )
                .await?
                .ok_or_else(|| {
                    ReservationError::RoomUnavailable(
                        "no available room of the requested type".to_string(),
                    )
                })?,
        };

        // Hold is acquired before the transaction that inserts the
        // reservation begins
        let reservation_id = Uuid::new_v4();
        let hold = self
            .guard
            .acquire(&HoldRequest {
                tenant_id: request.tenant_id,
                reservation_id,
                scope: HoldScope::Room(room.id),
                stay_start: request.check_in_date,
                stay_end: request.check_out_date,
                reason: "walk_in_check_in".to_string(),
                correlation_id: request.correlation_id,
            })
            .await?;

        let Some(lock_id) = hold.lock_id else {
            return Err(ReservationError::LockDenied);
        };

        let actual_check_in = Utc::now();
        let nights = Decimal::from((request.check_out_date - request.check_in_date).num_days());
        let total_amount = (rate.nightly_amount * nights).round_dp(2);

        let result = self
            .walk_in_transaction(&request, &room, &rate, reservation_id, total_amount, actual_check_in)
            .await;

        match result {
            Ok(record) => {
                // Success path: the hold has done its job, release it.
                // Failure here only means the hold lives until its TTL.
                let guard = self.guard.clone();
                let tenant_id = request.tenant_id;
                let correlation_id = request.correlation_id;
                run_post_commit(
                    "walk_in_check_in",
                    reservation_id,
                    vec![SideEffect::new("release_availability_hold", async move {
                        guard
                            .release(
                                tenant_id,
                                lock_id,
                                reservation_id,
                                ReleaseReason::CheckInCompleted,
                                correlation_id,
                            )
                            .await
                            .map_err(|e| e.to_string())
                    })],
                )
                .await;

                tracing::info!(
                    reservation_id = %reservation_id,
                    room_number = %room.room_number,
                    "Walk-in guest checked in"
                );
                Ok(CommandAccepted::new(record.event_id, request.correlation_id))
            }
            Err(e) => {
                release_hold_after_failure(
                    self.guard.as_ref(),
                    request.tenant_id,
                    lock_id,
                    reservation_id,
                    request.correlation_id,
                )
                .await;
                Err(e)
            }
        }
    }

    /// The walk-in primary transaction
    ///
    /// Locks the room, inserts the reservation directly as CheckedIn, opens
    /// its folio, flips the room to Occupied and appends lifecycle + outbox.
    /// Any error rolls the whole unit back; the caller compensates the hold.
    async fn walk_in_transaction(
        &self,
        request: &WalkInCheckInRequest,
        room: &Room,
        rate: &RateResolution,
        reservation_id: Uuid,
        total_amount: Decimal,
        actual_check_in: chrono::DateTime<Utc>,
    ) -> Result<LifecycleRecord, ReservationError> {
        let mut tx = self.pool.begin().await?;

        let locked_room = self.rooms.lock_room(&mut tx, room.id).await?.ok_or_else(|| {
            ReservationError::RoomUnavailable("room is held by another command".to_string())
        })?;
        if !locked_room.status.is_assignable() {
            return Err(ReservationError::RoomUnavailable(format!(
                "room {} is {}",
                locked_room.room_number, locked_room.status
            )));
        }

        let new = NewWalkInReservation {
            id: reservation_id,
            tenant_id: request.tenant_id,
            property_id: request.property_id,
            guest_id: request.guest_id,
            room_type_id: request.room_type_id,
            room_id: locked_room.id,
            room_number: locked_room.room_number.clone(),
            check_in_date: request.check_in_date,
            check_out_date: request.check_out_date,
            actual_check_in,
            total_amount,
            currency: rate.currency.clone(),
            rate_code: rate.applied_rate_code.clone(),
            source_channel: request.source_channel.clone(),
            travel_agent_id: request.travel_agent_id,
        };
        let reservation = self.reservations.insert_checked_in(&mut tx, &new).await?;

        self.folios
            .create_open(&mut tx, reservation_id, &rate.currency)
            .await?;

        self.rooms
            .set_status_in_tx(&mut tx, locked_room.id, RoomStatus::Occupied)
            .await?;

        let record = LifecycleRecord::new(
            reservation_id,
            "walk_in_check_in",
            "reservation.walked_in",
            request.correlation_id,
            request.initiated_by,
            json!({
                "room_id": locked_room.id,
                "room_number": locked_room.room_number,
                "actual_check_in": actual_check_in,
                "status": reservation.status,
                "rate_code": rate.applied_rate_code,
                "total_amount": total_amount,
            }),
        );
        self.writer.append_in_tx(&mut tx, &record).await?;

        tx.commit().await?;
        Ok(record)
    }

    /// Resolve the rate plan backing a reservation's fee configuration
    async fn resolve_rate_for(
        &self,
        reservation: &Reservation,
    ) -> Result<RateResolution, ReservationError> {
        Ok(self
            .rates
            .resolve(&RateQuery {
                tenant_id: reservation.tenant_id,
                property_id: reservation.property_id,
                room_type_id: reservation.room_type_id,
                stay_start: reservation.check_in_date,
                stay_end: reservation.check_out_date,
                requested_rate_code: Some(reservation.rate_code.clone()),
            })
            .await?)
    }

    /// Resolve the room for a check-in under the primary transaction's locks
    ///
    /// A supplied room must be lockable and Available; Dirty and the two
    /// out-of-* states are rejected. Without a supplied room, the best
    /// available room of the reservation's type is auto-assigned (lowest
    /// room number wins).
    async fn resolve_room_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        reservation: &Reservation,
        requested_room_id: Option<Uuid>,
    ) -> Result<Room, ReservationError> {
        match requested_room_id {
            Some(room_id) => {
                let room = self.rooms.lock_room(tx, room_id).await?.ok_or_else(|| {
                    ReservationError::RoomUnavailable(
                        "room is missing or held by another command".to_string(),
                    )
                })?;
                if !room.status.is_assignable() {
                    return Err(ReservationError::RoomUnavailable(format!(
                        "room {} is {}",
                        room.room_number, room.status
                    )));
                }
                Ok(room)
            }
            None => self
                .rooms
                .lock_best_available(
                    tx,
                    reservation.property_id,
                    reservation.room_type_id,
                    reservation.check_in_date,
                    reservation.check_out_date,
                )
                .await?
                .ok_or_else(|| {
                    ReservationError::RoomUnavailable(
                        "no available room of the requested type".to_string(),
                    )
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unsettled_balance_without_flags_is_rejected() {
        let result = decide_settlement(dec!(120.50), false, false);
        match result {
            Err(ReservationError::FolioUnsettled { balance }) => {
                assert_eq!(balance, dec!(120.50));
            }
            other => panic!("Expected FolioUnsettled, got {:?}", other),
        }
    }

    #[test]
    fn test_express_settles_regardless_of_balance() {
        assert_eq!(
            decide_settlement(dec!(500), false, true).unwrap(),
            SettlementAction::Settle(SettlementReason::ExpressCheckout)
        );
        assert_eq!(
            decide_settlement(dec!(0), false, true).unwrap(),
            SettlementAction::Settle(SettlementReason::ExpressCheckout)
        );
    }

    #[test]
    fn test_force_proceeds_without_settling() {
        assert_eq!(
            decide_settlement(dec!(75), true, false).unwrap(),
            SettlementAction::LeaveOpen
        );
    }

    #[test]
    fn test_express_wins_over_force() {
        assert_eq!(
            decide_settlement(dec!(75), true, true).unwrap(),
            SettlementAction::Settle(SettlementReason::ExpressCheckout)
        );
    }

    #[test]
    fn test_zero_balance_settles_normally() {
        assert_eq!(
            decide_settlement(dec!(0), false, false).unwrap(),
            SettlementAction::Settle(SettlementReason::Checkout)
        );
        assert_eq!(
            decide_settlement(dec!(-20), true, false).unwrap(),
            SettlementAction::Settle(SettlementReason::Checkout)
        );
    }

    #[test]
    fn test_settlement_reason_strings() {
        assert_eq!(SettlementReason::Checkout.as_str(), "CHECKOUT");
        assert_eq!(SettlementReason::ExpressCheckout.as_str(), "EXPRESS_CHECKOUT");
    }

    #[test]
    fn test_command_config_defaults() {
        let config = CommandConfig::default();
        assert_eq!(config.checkin_cutoff_hour, 14);
        assert_eq!(config.checkout_cutoff_hour, 12);
        assert_eq!(config.property_utc_offset_minutes, 0);
    }
}
