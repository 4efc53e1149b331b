// Rate Resolution collaborator
//
// Resolves the rate plan applied to a stay. A requested rate code that
// cannot be honored falls back to the property default plan for the room
// type, and the fallback is reported so callers can refuse it.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::RatePlan;

/// Lookup parameters for a stay
#[derive(Debug, Clone)]
pub struct RateQuery {
    pub tenant_id: Uuid,
    pub property_id: Uuid,
    pub room_type_id: Uuid,
    pub stay_start: NaiveDate,
    pub stay_end: NaiveDate,
    pub requested_rate_code: Option<String>,
}

/// Resolved rate for a stay
#[derive(Debug, Clone)]
pub struct RateResolution {
    pub applied_rate_code: String,
    pub requested_rate_code: Option<String>,
    /// True when the requested code could not be honored and the default
    /// plan was substituted
    pub fallback_applied: bool,
    pub nightly_amount: Decimal,
    pub currency: String,
    pub early_checkin_fee: Decimal,
    pub late_checkout_fee: Decimal,
}

/// Errors surfaced by rate resolution
#[derive(Debug, Error)]
pub enum RateError {
    /// Neither the requested plan nor a default plan exists for the stay
    #[error("no applicable rate plan for room type {room_type_id}")]
    NoRateAvailable { room_type_id: Uuid },

    /// The lookup did not answer within the configured RPC timeout
    #[error("rate resolution timed out")]
    Timeout,

    #[error("rate resolution database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Collaborator seam for rate resolution
#[async_trait]
pub trait RateResolver: Send + Sync {
    async fn resolve(&self, query: &RateQuery) -> Result<RateResolution, RateError>;
}

/// Builds a resolution from a concrete plan row
///
/// `fallback_applied` is true only when the caller asked for a specific code
/// and got a different one.
fn resolution_from(plan: &RatePlan, requested: Option<&str>) -> RateResolution {
    let fallback_applied = match requested {
        Some(code) => code != plan.code,
        None => false,
    };

    RateResolution {
        applied_rate_code: plan.code.clone(),
        requested_rate_code: requested.map(|s| s.to_string()),
        fallback_applied,
        nightly_amount: plan.nightly_amount,
        currency: plan.currency.clone(),
        early_checkin_fee: plan.early_checkin_fee,
        late_checkout_fee: plan.late_checkout_fee,
    }
}

/// PostgreSQL-backed rate resolver
#[derive(Clone)]
pub struct PgRateResolver {
    pool: PgPool,
    rpc_timeout: Duration,
}

impl PgRateResolver {
    pub fn new(pool: PgPool, rpc_timeout: Duration) -> Self {
        Self { pool, rpc_timeout }
    }

    /// Active plan matching the requested code and effective for the arrival date
    async fn find_by_code(
        &self,
        query: &RateQuery,
        code: &str,
    ) -> Result<Option<RatePlan>, sqlx::Error> {
        sqlx::query_as::<_, RatePlan>(
            r#"
            SELECT id, tenant_id, property_id, room_type_id, code, nightly_amount,
                   currency, early_checkin_fee, late_checkout_fee, is_default,
                   is_active, effective_from, effective_until, created_at
            FROM rate_plans
            WHERE property_id = $1
              AND room_type_id = $2
              AND code = $3
              AND is_active
              AND effective_from <= $4
              AND (effective_until IS NULL OR effective_until >= $4)
            "#,
        )
        .bind(query.property_id)
        .bind(query.room_type_id)
        .bind(code)
        .bind(query.stay_start)
        .fetch_optional(&self.pool)
        .await
    }

    /// Default plan for the room type, effective for the arrival date
    async fn find_default(&self, query: &RateQuery) -> Result<Option<RatePlan>, sqlx::Error> {
        sqlx::query_as::<_, RatePlan>(
            r#"
            SELECT id, tenant_id, property_id, room_type_id, code, nightly_amount,
                   currency, early_checkin_fee, late_checkout_fee, is_default,
                   is_active, effective_from, effective_until, created_at
            FROM rate_plans
            WHERE property_id = $1
              AND room_type_id = $2
              AND is_default
              AND is_active
              AND effective_from <= $3
              AND (effective_until IS NULL OR effective_until >= $3)
            ORDER BY effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(query.property_id)
        .bind(query.room_type_id)
        .bind(query.stay_start)
        .fetch_optional(&self.pool)
        .await
    }

    async fn resolve_inner(&self, query: &RateQuery) -> Result<RateResolution, RateError> {
        if let Some(ref code) = query.requested_rate_code {
            if let Some(plan) = self.find_by_code(query, code).await? {
                return Ok(resolution_from(&plan, Some(code)));
            }
        }

        match self.find_default(query).await? {
            Some(plan) => Ok(resolution_from(&plan, query.requested_rate_code.as_deref())),
            None => Err(RateError::NoRateAvailable {
                room_type_id: query.room_type_id,
            }),
        }
    }
}

#[async_trait]
impl RateResolver for PgRateResolver {
    async fn resolve(&self, query: &RateQuery) -> Result<RateResolution, RateError> {
        match tokio::time::timeout(self.rpc_timeout, self.resolve_inner(query)).await {
            Ok(result) => result,
            Err(_) => Err(RateError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn plan(code: &str) -> RatePlan {
        RatePlan {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            room_type_id: Uuid::new_v4(),
            code: code.to_string(),
            nightly_amount: dec!(159.00),
            currency: "USD".to_string(),
            early_checkin_fee: dec!(25.00),
            late_checkout_fee: dec!(40.00),
            is_default: false,
            is_active: true,
            effective_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            effective_until: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_honored_request_is_not_a_fallback() {
        let resolution = resolution_from(&plan("CORP"), Some("CORP"));
        assert_eq!(resolution.applied_rate_code, "CORP");
        assert!(!resolution.fallback_applied);
    }

    #[test]
    fn test_substituted_plan_reports_fallback() {
        let resolution = resolution_from(&plan("BAR"), Some("CORP"));
        assert_eq!(resolution.applied_rate_code, "BAR");
        assert_eq!(resolution.requested_rate_code.as_deref(), Some("CORP"));
        assert!(resolution.fallback_applied);
    }

    #[test]
    fn test_no_requested_code_uses_default_without_fallback() {
        let resolution = resolution_from(&plan("BAR"), None);
        assert!(!resolution.fallback_applied);
        assert!(resolution.requested_rate_code.is_none());
    }

    #[test]
    fn test_resolution_carries_fee_configuration() {
        let resolution = resolution_from(&plan("BAR"), None);
        assert_eq!(resolution.early_checkin_fee, dec!(25.00));
        assert_eq!(resolution.late_checkout_fee, dec!(40.00));
        assert_eq!(resolution.nightly_amount, dec!(159.00));
    }
}
