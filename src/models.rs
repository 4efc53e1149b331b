use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Housekeeping / occupancy status of a physical room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Dirty,
    OutOfOrder,
    OutOfService,
}

impl RoomStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Dirty => "dirty",
            RoomStatus::OutOfOrder => "out_of_order",
            RoomStatus::OutOfService => "out_of_service",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "available" => Ok(RoomStatus::Available),
            "occupied" => Ok(RoomStatus::Occupied),
            "dirty" => Ok(RoomStatus::Dirty),
            "out_of_order" => Ok(RoomStatus::OutOfOrder),
            "out_of_service" => Ok(RoomStatus::OutOfService),
            _ => Err(format!("Invalid room status: {}", s)),
        }
    }

    /// A room can take a new guest only while it sits in Available.
    /// Dirty and the two out-of-* states never qualify for assignment.
    pub fn is_assignable(&self) -> bool {
        matches!(self, RoomStatus::Available)
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sellable category of rooms (e.g. "Standard Queen")
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RoomType {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub property_id: Uuid,
    #[schema(example = "STD-Q")]
    pub code: String,
    #[schema(example = "Standard Queen")]
    pub name: String,
    #[schema(example = 2)]
    pub base_occupancy: i32,
    pub created_at: DateTime<Utc>,
}

/// A physical room in the property inventory
///
/// The `version` counter is bumped on every status flip so that concurrent
/// writers can detect a stale read.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Room {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub property_id: Uuid,
    pub room_type_id: Uuid,
    #[schema(example = "204")]
    pub room_number: String,
    #[schema(example = 2)]
    pub floor: i32,
    pub status: RoomStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A priced, effective-dated plan for selling a room type
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RatePlan {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub property_id: Uuid,
    pub room_type_id: Uuid,
    #[schema(example = "BAR")]
    pub code: String,
    #[schema(example = 159.00)]
    pub nightly_amount: Decimal,
    #[schema(example = "USD")]
    pub currency: String,
    /// Fee charged when the guest arrives before the property cutoff hour
    pub early_checkin_fee: Decimal,
    /// Fee charged when the guest departs after the property cutoff hour
    pub late_checkout_fee: Decimal,
    pub is_default: bool,
    pub is_active: bool,
    pub effective_from: NaiveDate,
    pub effective_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A registered guest
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Guest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[schema(example = "Dana Whitfield")]
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}
