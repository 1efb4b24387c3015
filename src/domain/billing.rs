use super::PlanTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillingRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: BillingStatus,
    pub gateway_payment_id: Option<String>,
    pub gateway_subscription_id: Option<String>,
    pub plan: PlanTier,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BillingStatus {
    Pending,
    Paid,
    Failed,
}

impl BillingRecord {
    pub fn pending(user_id: Uuid, plan: PlanTier, subscription_id: String) -> Self {
        let details = plan.details();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount: details.amount,
            currency: details.currency.to_string(),
            status: BillingStatus::Pending,
            gateway_payment_id: None,
            gateway_subscription_id: Some(subscription_id),
            plan,
            description: Some(format!("Subscription for {}", details.name)),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_record_copies_plan_pricing() {
        let record = BillingRecord::pending(Uuid::new_v4(), PlanTier::Special, "sub_1".to_string());
        assert_eq!(record.amount, 89900);
        assert_eq!(record.currency, "USD");
        assert_eq!(record.status, BillingStatus::Pending);
        assert_eq!(record.description.as_deref(), Some("Subscription for Special Plan"));
    }
}
