use crate::domain::{BillingRecord, BillingStatus, PlanTier};
use crate::infrastructure::{
    verify_webhook_signature, AppCaches, BillingRepository, GatewayError, GatewaySubscription,
    PaymentGateway, RepositoryError,
};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use strum::Display;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const EVENT_SUBSCRIPTION_ACTIVATED: &str = "subscription.activated";
pub const EVENT_SUBSCRIPTION_HALTED: &str = "subscription.halted";
pub const EVENT_SUBSCRIPTION_CANCELLED: &str = "subscription.cancelled";

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
    #[error("Payment gateway not configured")]
    GatewayUnavailable,
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Missing webhook signature")]
    MissingSignature,
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// What a webhook delivery did; every variant is acknowledged to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WebhookOutcome {
    Activated,
    Failed,
    AlreadyProcessed,
    UnknownSubscription,
    Ignored,
}

/// Gateway-side plan identifiers for each tier.
#[derive(Debug, Clone)]
pub struct GatewayPlans {
    pub regular: String,
    pub special: String,
    pub agency: String,
}

impl GatewayPlans {
    pub fn plan_id(&self, plan: PlanTier) -> &str {
        match plan {
            PlanTier::Regular => &self.regular,
            PlanTier::Special => &self.special,
            PlanTier::Agency => &self.agency,
        }
    }
}

impl Default for GatewayPlans {
    fn default() -> Self {
        Self {
            regular: "plan_regular_id".to_string(),
            special: "plan_special_id".to_string(),
            agency: "plan_agency_id".to_string(),
        }
    }
}

pub fn parse_plan(plan: &str) -> Option<PlanTier> {
    PlanTier::from_str(&plan.trim().to_lowercase()).ok()
}

pub struct PaymentService<B>
where
    B: BillingRepository,
{
    billing_repo: Arc<B>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    webhook_secret: Option<String>,
    plans: GatewayPlans,
    caches: Arc<AppCaches>,
}

impl<B> PaymentService<B>
where
    B: BillingRepository,
{
    pub fn new(
        billing_repo: Arc<B>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        webhook_secret: Option<String>,
        plans: GatewayPlans,
        caches: Arc<AppCaches>,
    ) -> Self {
        Self {
            billing_repo,
            gateway,
            webhook_secret,
            plans,
            caches,
        }
    }

    /// Start a gateway subscription and record it as pending.
    pub async fn subscribe(
        &self,
        user_id: Uuid,
        plan: &str,
    ) -> Result<GatewaySubscription, PaymentError> {
        let plan = parse_plan(plan).ok_or_else(|| PaymentError::InvalidPlan(plan.to_string()))?;
        let gateway = self.gateway.as_ref().ok_or(PaymentError::GatewayUnavailable)?;

        let subscription = gateway
            .create_subscription(self.plans.plan_id(plan))
            .await?;

        let record = BillingRecord::pending(user_id, plan, subscription.id.clone());
        self.billing_repo.create(&record).await?;

        info!(
            user_id = %user_id,
            plan = %plan,
            subscription_id = %subscription.id,
            "Subscription created"
        );
        Ok(subscription)
    }

    /// Verify the signature over the raw body before anything is parsed.
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(PaymentError::MissingSignature)?;

        let secret = self.webhook_secret.as_deref().unwrap_or_default();
        if !verify_webhook_signature(secret, body, signature) {
            warn!("Rejected webhook with invalid signature");
            return Err(PaymentError::InvalidSignature);
        }

        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
        let event = payload.get("event").and_then(Value::as_str).unwrap_or_default();
        let subscription_id = payload
            .pointer("/payload/subscription/entity/id")
            .and_then(Value::as_str);
        let payment_id = payload
            .pointer("/payload/payment/entity/id")
            .and_then(Value::as_str);

        let outcome = match (event, subscription_id) {
            (EVENT_SUBSCRIPTION_ACTIVATED, Some(sub_id)) => {
                self.activate(sub_id, payment_id).await?
            }
            (EVENT_SUBSCRIPTION_HALTED | EVENT_SUBSCRIPTION_CANCELLED, Some(sub_id)) => {
                self.mark_failed(sub_id).await?
            }
            _ => WebhookOutcome::Ignored,
        };

        info!(event = %event, outcome = %outcome, "Webhook processed");
        Ok(outcome)
    }

    async fn activate(
        &self,
        subscription_id: &str,
        payment_id: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let Some(record) = self
            .billing_repo
            .find_by_subscription_id(subscription_id)
            .await?
        else {
            return Ok(WebhookOutcome::UnknownSubscription);
        };

        // Paid flag and plan upgrade commit together, so a failed delivery
        // leaves the record pending for the gateway's retry.
        if record.status == BillingStatus::Paid
            || !self
                .billing_repo
                .mark_paid_and_apply_plan(&record, payment_id)
                .await?
        {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }
        self.caches.invalidate_user(record.user_id);

        info!(
            user_id = %record.user_id,
            plan = %record.plan,
            "Plan upgraded"
        );
        Ok(WebhookOutcome::Activated)
    }

    async fn mark_failed(&self, subscription_id: &str) -> Result<WebhookOutcome, PaymentError> {
        let Some(record) = self
            .billing_repo
            .find_by_subscription_id(subscription_id)
            .await?
        else {
            return Ok(WebhookOutcome::UnknownSubscription);
        };

        if record.status == BillingStatus::Paid
            || !self
                .billing_repo
                .update_status(record.id, BillingStatus::Failed, None)
                .await?
        {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }
        Ok(WebhookOutcome::Failed)
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<BillingRecord>, PaymentError> {
        Ok(self.billing_repo.list_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_parse_case_insensitively() {
        assert_eq!(parse_plan(" Special "), Some(PlanTier::Special));
        assert_eq!(parse_plan("gold"), None);
    }

    #[test]
    fn gateway_plan_ids_per_tier() {
        let plans = GatewayPlans::default();
        assert_eq!(plans.plan_id(PlanTier::Regular), "plan_regular_id");
        assert_eq!(plans.plan_id(PlanTier::Agency), "plan_agency_id");
    }

    #[test]
    fn outcomes_render_snake_case() {
        assert_eq!(WebhookOutcome::AlreadyProcessed.to_string(), "already_processed");
    }
}
