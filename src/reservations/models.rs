use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Reservation status enum representing the lifecycle of a stay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::CheckedIn => "checked_in",
            ReservationStatus::CheckedOut => "checked_out",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::NoShow => "no_show",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "checked_in" => Ok(ReservationStatus::CheckedIn),
            "checked_out" => Ok(ReservationStatus::CheckedOut),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "no_show" => Ok(ReservationStatus::NoShow),
            _ => Err(format!("Invalid reservation status: {}", s)),
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Domain model representing a reservation
///
/// `room_number` and `actual_check_in` are set only on the transition into
/// CheckedIn; `actual_check_out` only on the transition into CheckedOut.
/// Reservations are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub room_type_id: Uuid,
    pub room_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub status: ReservationStatus,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub actual_check_in: Option<DateTime<Utc>>,
    pub actual_check_out: Option<DateTime<Utc>>,
    pub total_amount: Decimal,
    pub currency: String,
    pub rate_code: String,
    pub source_channel: String,
    pub travel_agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Length of stay in nights
    pub fn nights(&self) -> i64 {
        (self.check_out_date - self.check_in_date).num_days()
    }
}

/// Folio status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FolioStatus {
    Open,
    Settled,
}

impl FolioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolioStatus::Open => "open",
            FolioStatus::Settled => "settled",
        }
    }
}

impl std::fmt::Display for FolioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The guest's running bill for a stay
///
/// balance = total_charges - total_payments, maintained by the posting
/// writes that change either side.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Folio {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub status: FolioStatus,
    pub settlement_reason: Option<String>,
    pub total_charges: Decimal,
    pub total_payments: Decimal,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable ledger line on a folio
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChargePosting {
    pub id: Uuid,
    pub folio_id: Uuid,
    pub reservation_id: Uuid,
    pub charge_code: String,
    pub description: String,
    pub amount: Decimal,
    pub posted_by: Uuid,
    pub posted_at: DateTime<Utc>,
}

/// Request DTO for checking in an existing reservation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckInRequest {
    pub tenant_id: Uuid,
    /// Explicit room assignment; omitted to auto-assign
    pub room_id: Option<Uuid>,
    /// Skip the deposit-blocking check
    #[serde(default)]
    pub override_deposit: bool,
    pub correlation_id: Uuid,
    pub initiated_by: Uuid,
}

/// Request DTO for checking out a reservation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckOutRequest {
    pub tenant_id: Uuid,
    /// Proceed despite an unsettled folio, leaving it open
    #[serde(default)]
    pub force: bool,
    /// Express checkout: auto-settle the folio for post-departure billing
    #[serde(default)]
    pub express: bool,
    pub correlation_id: Uuid,
    pub initiated_by: Uuid,
}

/// Request DTO for registering and checking in a walk-in guest
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WalkInCheckInRequest {
    pub tenant_id: Uuid,
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub room_type_id: Uuid,
    /// Explicit room assignment; omitted to auto-assign
    pub room_id: Option<Uuid>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub requested_rate_code: Option<String>,
    /// Accept a substituted rate plan when the requested code is unavailable
    #[serde(default)]
    pub accept_rate_fallback: bool,
    #[validate(custom = "crate::validation::validate_source_channel")]
    pub source_channel: String,
    pub travel_agent_id: Option<Uuid>,
    pub correlation_id: Uuid,
    pub initiated_by: Uuid,
}

/// Response for an accepted lifecycle command
#[derive(Debug, Clone, Serialize)]
pub struct CommandAccepted {
    pub event_id: Uuid,
    pub correlation_id: Uuid,
    pub status: &'static str,
}

impl CommandAccepted {
    pub fn new(event_id: Uuid, correlation_id: Uuid) -> Self {
        Self {
            event_id,
            correlation_id,
            status: "accepted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_status_round_trip() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::CheckedIn,
            ReservationStatus::CheckedOut,
            ReservationStatus::Cancelled,
            ReservationStatus::NoShow,
        ] {
            assert_eq!(ReservationStatus::from_str(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn test_reservation_status_serializes_snake_case() {
        let json = serde_json::to_string(&ReservationStatus::CheckedIn).unwrap();
        assert_eq!(json, "\"checked_in\"");
        let json = serde_json::to_string(&ReservationStatus::NoShow).unwrap();
        assert_eq!(json, "\"no_show\"");
    }

    #[test]
    fn test_command_accepted_shape() {
        let event_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let accepted = CommandAccepted::new(event_id, correlation_id);

        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["event_id"], event_id.to_string());
        assert_eq!(json["correlation_id"], correlation_id.to_string());
    }

    #[test]
    fn test_check_in_request_defaults_override_to_false() {
        let json = format!(
            r#"{{"tenant_id":"{}","correlation_id":"{}","initiated_by":"{}"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let request: CheckInRequest = serde_json::from_str(&json).unwrap();
        assert!(!request.override_deposit);
        assert!(request.room_id.is_none());
    }

    #[test]
    fn test_check_out_request_flag_defaults() {
        let json = format!(
            r#"{{"tenant_id":"{}","correlation_id":"{}","initiated_by":"{}"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let request: CheckOutRequest = serde_json::from_str(&json).unwrap();
        assert!(!request.force);
        assert!(!request.express);
    }

    #[test]
    fn test_walk_in_request_validates_source_channel() {
        let mk = |channel: &str| WalkInCheckInRequest {
            tenant_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            room_type_id: Uuid::new_v4(),
            room_id: None,
            check_in_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            requested_rate_code: None,
            accept_rate_fallback: false,
            source_channel: channel.to_string(),
            travel_agent_id: None,
            correlation_id: Uuid::new_v4(),
            initiated_by: Uuid::new_v4(),
        };

        assert!(mk("direct").validate().is_ok());
        assert!(mk("carrier_pigeon").validate().is_err());
    }

    #[test]
    fn test_nights_is_date_difference() {
        let reservation = Reservation {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            room_type_id: Uuid::new_v4(),
            room_id: None,
            room_number: None,
            status: ReservationStatus::Confirmed,
            check_in_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out_date: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            actual_check_in: None,
            actual_check_out: None,
            total_amount: Decimal::ZERO,
            currency: "USD".to_string(),
            rate_code: "BAR".to_string(),
            source_channel: "direct".to_string(),
            travel_agent_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(reservation.nights(), 3);
    }
}
