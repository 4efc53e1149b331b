// HTTP handlers for the reservation lifecycle commands

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::reservations::{
    CheckInRequest, CheckOutRequest, CommandAccepted, ReservationError, WalkInCheckInRequest,
};

/// Handler for POST /api/reservations/{reservation_id}/check-in
pub async fn check_in_handler(
    State(state): State<crate::AppState>,
    Path(reservation_id): Path<Uuid>,
    Json(request): Json<CheckInRequest>,
) -> Result<(StatusCode, Json<CommandAccepted>), ReservationError> {
    request
        .validate()
        .map_err(|e| ReservationError::ValidationError(e.to_string()))?;

    let accepted = state
        .reservation_commands
        .check_in(reservation_id, request)
        .await?;

    Ok((StatusCode::OK, Json(accepted)))
}

/// Handler for POST /api/reservations/{reservation_id}/check-out
pub async fn check_out_handler(
    State(state): State<crate::AppState>,
    Path(reservation_id): Path<Uuid>,
    Json(request): Json<CheckOutRequest>,
) -> Result<(StatusCode, Json<CommandAccepted>), ReservationError> {
    request
        .validate()
        .map_err(|e| ReservationError::ValidationError(e.to_string()))?;

    let accepted = state
        .reservation_commands
        .check_out(reservation_id, request)
        .await?;

    Ok((StatusCode::OK, Json(accepted)))
}

/// Handler for POST /api/walk-ins
/// Registers a walk-in guest and checks them in immediately
pub async fn walk_in_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<WalkInCheckInRequest>,
) -> Result<(StatusCode, Json<CommandAccepted>), ReservationError> {
    request
        .validate()
        .map_err(|e| ReservationError::ValidationError(e.to_string()))?;

    let accepted = state.reservation_commands.walk_in_check_in(request).await?;

    Ok((StatusCode::CREATED, Json(accepted)))
}
