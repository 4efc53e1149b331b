use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::reservations::models::ReservationStatus;

/// Error types for the reservation lifecycle commands
///
/// Precondition rejections carry a machine-readable code and are surfaced
/// synchronously to the caller; they are never retried by the processor.
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Reservation not found")]
    NotFound,

    #[error("Reservation in status {0} cannot be checked in")]
    InvalidStatusForCheckIn(ReservationStatus),

    #[error("Reservation in status {0} cannot be checked out")]
    InvalidStatusForCheckOut(ReservationStatus),

    #[error("Outstanding deposit of {outstanding} blocks check-in")]
    DepositRequired { outstanding: Decimal },

    #[error("Folio balance {balance} is unsettled")]
    FolioUnsettled { balance: Decimal },

    #[error("Requested rate {requested} was not available; {applied} would apply")]
    RateFallbackNotAllowed { requested: String, applied: String },

    #[error("No applicable rate plan for the stay")]
    RateUnavailable,

    #[error("Room unavailable: {0}")]
    RoomUnavailable(String),

    #[error("Availability hold was denied")]
    LockDenied,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upstream service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl ReservationError {
    /// Machine-readable code for the ingress contract
    pub fn error_code(&self) -> &'static str {
        match self {
            ReservationError::NotFound => "NOT_FOUND",
            ReservationError::InvalidStatusForCheckIn(_) => "INVALID_STATUS_FOR_CHECKIN",
            ReservationError::InvalidStatusForCheckOut(_) => "INVALID_STATUS_FOR_CHECKOUT",
            ReservationError::DepositRequired { .. } => "DEPOSIT_REQUIRED",
            ReservationError::FolioUnsettled { .. } => "FOLIO_UNSETTLED",
            ReservationError::RateFallbackNotAllowed { .. } => "RATE_FALLBACK_NOT_ALLOWED",
            ReservationError::RateUnavailable => "RATE_UNAVAILABLE",
            ReservationError::RoomUnavailable(_) => "ROOM_UNAVAILABLE",
            ReservationError::LockDenied => "LOCK_DENIED",
            ReservationError::ValidationError(_) => "VALIDATION_ERROR",
            ReservationError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ReservationError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Extra machine-readable detail for rejections that carry an amount
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ReservationError::DepositRequired { outstanding } => {
                Some(json!({ "outstanding": outstanding }))
            }
            ReservationError::FolioUnsettled { balance } => Some(json!({ "balance": balance })),
            ReservationError::RateFallbackNotAllowed { requested, applied } => {
                Some(json!({ "requested": requested, "applied": applied }))
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ReservationError {
    fn from(err: sqlx::Error) -> Self {
        ReservationError::DatabaseError(err.to_string())
    }
}

impl From<crate::availability::GuardError> for ReservationError {
    fn from(err: crate::availability::GuardError) -> Self {
        ReservationError::ServiceUnavailable(err.to_string())
    }
}

impl From<crate::rates::RateError> for ReservationError {
    fn from(err: crate::rates::RateError) -> Self {
        match err {
            crate::rates::RateError::NoRateAvailable { .. } => ReservationError::RateUnavailable,
            crate::rates::RateError::Timeout => {
                ReservationError::ServiceUnavailable("rate resolution timed out".to_string())
            }
            crate::rates::RateError::Database(e) => ReservationError::DatabaseError(e.to_string()),
        }
    }
}

impl IntoResponse for ReservationError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReservationError::NotFound => StatusCode::NOT_FOUND,
            ReservationError::InvalidStatusForCheckIn(_)
            | ReservationError::InvalidStatusForCheckOut(_)
            | ReservationError::DepositRequired { .. }
            | ReservationError::FolioUnsettled { .. }
            | ReservationError::RateFallbackNotAllowed { .. }
            | ReservationError::RoomUnavailable(_)
            | ReservationError::LockDenied => StatusCode::CONFLICT,
            ReservationError::RateUnavailable => StatusCode::UNPROCESSABLE_ENTITY,
            ReservationError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ReservationError::ServiceUnavailable(_) => StatusCode::BAD_GATEWAY,
            ReservationError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Database failure details stay in the server log
        let message = match &self {
            ReservationError::DatabaseError(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        };

        let mut body = json!({
            "error_code": self.error_code(),
            "message": message,
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes_match_contract() {
        assert_eq!(
            ReservationError::InvalidStatusForCheckIn(ReservationStatus::CheckedOut).error_code(),
            "INVALID_STATUS_FOR_CHECKIN"
        );
        assert_eq!(
            ReservationError::InvalidStatusForCheckOut(ReservationStatus::Pending).error_code(),
            "INVALID_STATUS_FOR_CHECKOUT"
        );
        assert_eq!(
            ReservationError::DepositRequired {
                outstanding: dec!(150)
            }
            .error_code(),
            "DEPOSIT_REQUIRED"
        );
        assert_eq!(
            ReservationError::FolioUnsettled { balance: dec!(10) }.error_code(),
            "FOLIO_UNSETTLED"
        );
        assert_eq!(
            ReservationError::RateFallbackNotAllowed {
                requested: "CORP".to_string(),
                applied: "BAR".to_string()
            }
            .error_code(),
            "RATE_FALLBACK_NOT_ALLOWED"
        );
    }

    #[test]
    fn test_deposit_rejection_carries_outstanding_amount() {
        let err = ReservationError::DepositRequired {
            outstanding: dec!(350.00),
        };
        let details = err.details().unwrap();
        assert_eq!(details["outstanding"], json!(dec!(350.00)));
    }

    #[test]
    fn test_database_errors_convert_generically() {
        let err: ReservationError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_error_display_names_the_status() {
        let err = ReservationError::InvalidStatusForCheckIn(ReservationStatus::Cancelled);
        assert!(err.to_string().contains("cancelled"));
    }
}
