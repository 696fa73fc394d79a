//! Evaluation context assembly.
//!
//! Snapshots customer, subscription, payment, system and campaign attributes
//! into one `EvaluationContext`. Money is exposed in major units (`amount`)
//! and, for payments, also in cents (`amountCents`). Attributes the stores
//! don't know are left out so conditions on them fail closed.

use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::domain::campaign::{Campaign, DunningError, PaymentSnapshot};
use crate::domain::foundation::{CustomerId, SubscriptionId, Timestamp};
use crate::domain::rules::EvaluationContext;
use crate::ports::{CustomerProfile, CustomerStore, DunningSettings, SubscriptionProfile};

/// Campaign-level facts exposed under `campaign.*`.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignFacts {
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub started_at: Timestamp,
    pub tags: Vec<String>,
}

impl CampaignFacts {
    /// Facts for a campaign that is about to be opened.
    pub fn opening(max_attempts: u32, now: Timestamp) -> Self {
        Self {
            attempt_count: 1,
            max_attempts,
            started_at: now,
            tags: Vec::new(),
        }
    }

    pub fn of(campaign: &Campaign) -> Self {
        Self {
            attempt_count: campaign.attempt_count,
            max_attempts: campaign.max_attempts,
            started_at: campaign.created_at,
            tags: campaign.tags.clone(),
        }
    }
}

fn major_units(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn section(extra: &Map<String, Value>, typed: Value) -> Value {
    let mut merged = extra.clone();
    if let Value::Object(fields) = typed {
        for (key, value) in fields {
            if !value.is_null() {
                merged.insert(key, value);
            }
        }
    }
    Value::Object(merged)
}

/// Pure assembly from already-fetched attributes.
pub fn assemble_context(
    customer: Option<&CustomerProfile>,
    subscription: Option<&SubscriptionProfile>,
    payment: &PaymentSnapshot,
    campaign: &CampaignFacts,
    settings: &DunningSettings,
    now: Timestamp,
) -> EvaluationContext {
    let mut ctx = EvaluationContext::new();

    if let Some(c) = customer {
        ctx = ctx.with_section(
            "customer",
            section(
                &c.attributes,
                json!({
                    "id": c.id.as_str(),
                    "name": c.name,
                    "email": c.email,
                    "segment": c.segment,
                    "lifetimeValue": major_units(c.lifetime_value_cents),
                    "accountAgeDays": now.days_since(&c.created_at),
                    "accountManager": c.account_manager,
                }),
            ),
        );
    }

    if let Some(s) = subscription {
        ctx = ctx.with_section(
            "subscription",
            section(
                &s.attributes,
                json!({
                    "id": s.id.as_str(),
                    "plan": s.plan,
                    "value": major_units(s.value_cents),
                    "billingInterval": s.billing_interval,
                }),
            ),
        );
    }

    ctx = ctx
        .with_section(
            "payment",
            json!({
                "id": payment.payment_id.as_str(),
                "amount": major_units(payment.amount_cents),
                "amountCents": payment.amount_cents,
                "currency": payment.currency,
                "failureCount": payment.failure_count,
                "failureReason": payment.failure_reason,
                "isHighValue": payment.amount_cents >= settings.high_value_threshold_cents,
            }),
        )
        .with_section(
            "system",
            json!({
                "dayOfWeek": now.weekday_name(),
                "hourOfDay": now.hour_of_day(),
            }),
        )
        .with_section(
            "campaign",
            json!({
                "attemptCount": campaign.attempt_count,
                "maxAttempts": campaign.max_attempts,
                "daysInDunning": now.days_since(&campaign.started_at),
                "escalationThreshold": settings.escalation_threshold_attempts,
                "tags": campaign.tags,
            }),
        );

    ctx
}

/// Fetches attributes from the customer store and assembles the context.
pub struct ContextBuilder {
    customers: Arc<dyn CustomerStore>,
}

impl ContextBuilder {
    pub fn new(customers: Arc<dyn CustomerStore>) -> Self {
        Self { customers }
    }

    pub async fn build(
        &self,
        customer_id: &CustomerId,
        subscription_id: &SubscriptionId,
        payment: &PaymentSnapshot,
        campaign: &CampaignFacts,
        settings: &DunningSettings,
        now: Timestamp,
    ) -> Result<EvaluationContext, DunningError> {
        let customer = self.customers.customer(customer_id).await?;
        let subscription = self.customers.subscription(subscription_id).await?;
        if customer.is_none() {
            tracing::debug!(customer_id = %customer_id, "customer attributes unavailable");
        }
        Ok(assemble_context(
            customer.as_ref(),
            subscription.as_ref(),
            payment,
            campaign,
            settings,
            now,
        ))
    }

    /// Customer segment, used for the advisory success probability.
    pub async fn segment(&self, customer_id: &CustomerId) -> Result<Option<String>, DunningError> {
        Ok(self
            .customers
            .customer(customer_id)
            .await?
            .and_then(|c| c.segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PaymentId;
    use chrono::{TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    fn customer(now: Timestamp) -> CustomerProfile {
        let mut attributes = Map::new();
        attributes.insert("region".into(), json!("emea"));
        CustomerProfile {
            id: CustomerId::new("cus_1").unwrap(),
            name: "Acme".into(),
            email: "billing@acme.test".into(),
            segment: Some("enterprise".into()),
            lifetime_value_cents: 1_500_000,
            created_at: now.add_days(-400),
            account_manager: None,
            attributes,
        }
    }

    fn payment(cents: i64) -> PaymentSnapshot {
        PaymentSnapshot {
            payment_id: PaymentId::new("pay_1").unwrap(),
            amount_cents: cents,
            currency: "usd".into(),
            failure_reason: "card_declined".into(),
            failure_count: 1,
        }
    }

    #[test]
    fn exposes_typed_fields_in_major_units() {
        let now = at(2026, 3, 4, 15);
        let settings = DunningSettings::default();
        let ctx = assemble_context(
            Some(&customer(now)),
            None,
            &payment(250_000),
            &CampaignFacts::opening(4, now),
            &settings,
            now,
        );

        assert_eq!(ctx.resolve("customer.lifetimeValue"), Some(&json!(15000.0)));
        assert_eq!(ctx.resolve("customer.accountAgeDays"), Some(&json!(400)));
        assert_eq!(ctx.resolve("customer.region"), Some(&json!("emea")));
        assert_eq!(ctx.resolve("payment.amount"), Some(&json!(2500.0)));
        assert_eq!(ctx.resolve("payment.isHighValue"), Some(&json!(true)));
        assert_eq!(ctx.resolve("system.dayOfWeek"), Some(&json!("wednesday")));
        assert_eq!(ctx.resolve("system.hourOfDay"), Some(&json!(15)));
        assert_eq!(ctx.resolve("campaign.attemptCount"), Some(&json!(1)));
        assert_eq!(ctx.resolve("campaign.escalationThreshold"), Some(&json!(3)));
    }

    #[test]
    fn absent_attributes_stay_missing() {
        let now = at(2026, 3, 4, 15);
        let ctx = assemble_context(
            Some(&customer(now)),
            None,
            &payment(100),
            &CampaignFacts::opening(4, now),
            &DunningSettings::default(),
            now,
        );

        assert!(ctx.resolve("customer.accountManager").is_none());
        assert!(ctx.resolve("subscription.plan").is_none());
        assert_eq!(ctx.resolve("payment.isHighValue"), Some(&json!(false)));
    }
}
