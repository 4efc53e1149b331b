// Error types for the billing rule engines

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by fee, deposit and commission computation
///
/// These never surface to HTTP callers directly: the orchestrators treat
/// billing failures as best-effort (logged) or fold them into their own
/// typed rejections.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The reservation has no open folio to post against
    #[error("no open folio for reservation {0}")]
    NoOpenFolio(Uuid),

    /// Database operation errors
    #[error("billing database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Rule evaluation produced an unusable value
    #[error("billing calculation error: {0}")]
    Calculation(String),
}

/// Result type alias for billing operations
pub type BillingResult<T> = Result<T, BillingError>;
