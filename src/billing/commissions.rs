// Commission Engine
//
// Resolves the applicable commission rule for a checked-out stay and writes
// the commission record pair. Runs strictly post-commit and best-effort:
// a commission that cannot be recorded never fails the checkout.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::billing::error::BillingResult;

/// How a rule computes its commission
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum CommissionRuleType {
    Percentage,
    Fixed,
}

/// A configured commission rule
///
/// Either agent-specific (agent_company_id set) or a source-channel
/// fallback (source_channel set).
#[derive(Debug, Clone, FromRow)]
pub struct CommissionRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub agent_company_id: Option<Uuid>,
    pub source_channel: Option<String>,
    pub rule_type: CommissionRuleType,
    pub rate: Decimal,
    pub flat_amount: Decimal,
    pub priority: i32,
    pub is_active: bool,
    pub effective_from: NaiveDate,
    pub effective_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// The revenue facts a commission is computed from
#[derive(Debug, Clone)]
pub struct CommissionBasis {
    pub tenant_id: Uuid,
    pub reservation_id: Uuid,
    pub agent_company_id: Option<Uuid>,
    pub source_channel: String,
    pub revenue: Decimal,
    pub currency: String,
}

impl CommissionBasis {
    /// Only agented or non-direct business earns commission
    pub fn qualifies(&self) -> bool {
        self.agent_company_id.is_some() || self.source_channel != "direct"
    }
}

/// The record pair written for one qualifying checkout
#[derive(Debug, Clone, FromRow)]
pub struct CommissionRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub reservation_id: Uuid,
    pub rule_id: Uuid,
    pub agent_company_id: Option<Uuid>,
    pub source_channel: String,
    pub base_amount: Decimal,
    pub rate: Decimal,
    pub gross_commission_amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Gross commission for a rule applied to revenue, rounded to 2 decimals
pub fn compute_gross(rule: &CommissionRule, revenue: Decimal) -> Decimal {
    let gross = match rule.rule_type {
        CommissionRuleType::Percentage => revenue * rule.rate / Decimal::from(100),
        CommissionRuleType::Fixed => rule.flat_amount,
    };
    gross.round_dp(2)
}

/// Rule lookup strategies, evaluated in precedence order
///
/// An agent-specific active rule beats the source-level fallback; the first
/// strategy that yields a rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleLookup {
    AgentSpecific,
    SourceFallback,
}

const RULE_PRECEDENCE: [RuleLookup; 2] = [RuleLookup::AgentSpecific, RuleLookup::SourceFallback];

/// Commission Engine
#[derive(Clone)]
pub struct CommissionEngine {
    pool: PgPool,
}

impl CommissionEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve the applicable rule for a basis, if any
    pub async fn find_rule(
        &self,
        basis: &CommissionBasis,
        as_of: NaiveDate,
    ) -> Result<Option<CommissionRule>, sqlx::Error> {
        for strategy in RULE_PRECEDENCE {
            let rule = match strategy {
                RuleLookup::AgentSpecific => match basis.agent_company_id {
                    Some(agent_id) => self.find_agent_rule(basis.tenant_id, agent_id, as_of).await?,
                    None => None,
                },
                RuleLookup::SourceFallback => {
                    self.find_source_rule(basis.tenant_id, &basis.source_channel, as_of)
                        .await?
                }
            };

            if rule.is_some() {
                return Ok(rule);
            }
        }

        Ok(None)
    }

    async fn find_agent_rule(
        &self,
        tenant_id: Uuid,
        agent_company_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<Option<CommissionRule>, sqlx::Error> {
        sqlx::query_as::<_, CommissionRule>(
            r#"
            SELECT id, tenant_id, agent_company_id, source_channel, rule_type, rate,
                   flat_amount, priority, is_active, effective_from, effective_until, created_at
            FROM commission_rules
            WHERE tenant_id = $1
              AND agent_company_id = $2
              AND is_active
              AND effective_from <= $3
              AND (effective_until IS NULL OR effective_until >= $3)
            ORDER BY priority DESC, effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(agent_company_id)
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_source_rule(
        &self,
        tenant_id: Uuid,
        source_channel: &str,
        as_of: NaiveDate,
    ) -> Result<Option<CommissionRule>, sqlx::Error> {
        sqlx::query_as::<_, CommissionRule>(
            r#"
            SELECT id, tenant_id, agent_company_id, source_channel, rule_type, rate,
                   flat_amount, priority, is_active, effective_from, effective_until, created_at
            FROM commission_rules
            WHERE tenant_id = $1
              AND agent_company_id IS NULL
              AND source_channel = $2
              AND is_active
              AND effective_from <= $3
              AND (effective_until IS NULL OR effective_until >= $3)
            ORDER BY priority DESC, effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(source_channel)
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record the commission pair for a qualifying checkout
    ///
    /// Returns None when the basis does not qualify, no rule matches, or the
    /// computed gross is not positive. The record and its tracking row are
    /// written in one transaction of their own.
    pub async fn record_commission(
        &self,
        basis: &CommissionBasis,
        as_of: NaiveDate,
    ) -> BillingResult<Option<CommissionRecord>> {
        if !basis.qualifies() {
            return Ok(None);
        }

        let Some(rule) = self.find_rule(basis, as_of).await? else {
            tracing::debug!(
                reservation_id = %basis.reservation_id,
                "No commission rule matched"
            );
            return Ok(None);
        };

        let gross = compute_gross(&rule, basis.revenue);
        if gross <= Decimal::ZERO {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, CommissionRecord>(
            r#"
            INSERT INTO commission_records
                (tenant_id, reservation_id, rule_id, agent_company_id, source_channel,
                 base_amount, rate, gross_commission_amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending')
            RETURNING id, tenant_id, reservation_id, rule_id, agent_company_id, source_channel,
                      base_amount, rate, gross_commission_amount, currency, status, created_at
            "#,
        )
        .bind(basis.tenant_id)
        .bind(basis.reservation_id)
        .bind(rule.id)
        .bind(basis.agent_company_id)
        .bind(&basis.source_channel)
        .bind(basis.revenue)
        .bind(rule.rate)
        .bind(gross)
        .bind(&basis.currency)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO commission_tracking (commission_record_id, reservation_id, status)
            VALUES ($1, $2, 'pending')
            "#,
        )
        .bind(record.id)
        .bind(basis.reservation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            reservation_id = %basis.reservation_id,
            gross = %record.gross_commission_amount,
            "Recorded pending commission"
        );
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rule(rule_type: CommissionRuleType, rate: Decimal, flat: Decimal) -> CommissionRule {
        CommissionRule {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            agent_company_id: Some(Uuid::new_v4()),
            source_channel: None,
            rule_type,
            rate,
            flat_amount: flat,
            priority: 0,
            is_active: true,
            effective_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            effective_until: None,
            created_at: Utc::now(),
        }
    }

    fn basis(agent: Option<Uuid>, source: &str) -> CommissionBasis {
        CommissionBasis {
            tenant_id: Uuid::new_v4(),
            reservation_id: Uuid::new_v4(),
            agent_company_id: agent,
            source_channel: source.to_string(),
            revenue: dec!(500),
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn test_percentage_rule_ten_percent_of_500_is_50() {
        let rule = rule(CommissionRuleType::Percentage, dec!(10), dec!(0));
        assert_eq!(compute_gross(&rule, dec!(500)), dec!(50.00));
    }

    #[test]
    fn test_percentage_gross_rounds_to_two_decimals() {
        let rule = rule(CommissionRuleType::Percentage, dec!(12.5), dec!(0));
        // 333.33 * 12.5% = 41.66625 -> 41.67 at 2 dp
        assert_eq!(compute_gross(&rule, dec!(333.33)), dec!(41.67));
    }

    #[test]
    fn test_fixed_rule_ignores_revenue() {
        let rule = rule(CommissionRuleType::Fixed, dec!(0), dec!(75.00));
        assert_eq!(compute_gross(&rule, dec!(10)), dec!(75.00));
        assert_eq!(compute_gross(&rule, dec!(10000)), dec!(75.00));
    }

    #[test]
    fn test_direct_unagented_business_never_qualifies() {
        assert!(!basis(None, "direct").qualifies());
    }

    #[test]
    fn test_agented_or_channel_business_qualifies() {
        assert!(basis(Some(Uuid::new_v4()), "direct").qualifies());
        assert!(basis(None, "ota").qualifies());
        assert!(basis(Some(Uuid::new_v4()), "travel_agent").qualifies());
    }

    #[test]
    fn test_precedence_list_tries_agent_rule_first() {
        assert_eq!(
            RULE_PRECEDENCE,
            [RuleLookup::AgentSpecific, RuleLookup::SourceFallback]
        );
    }
}
