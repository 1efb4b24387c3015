use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    RequestFailed(String),
    #[error("Subscription creation failed: {0}")]
    CreationFailed(String),
    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Subscription as created by the gateway; `raw` is returned to the client verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySubscription {
    pub id: String,
    pub raw: Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_subscription(
        &self,
        plan_id: &str,
    ) -> Result<GatewaySubscription, GatewayError>;
}

pub const SUBSCRIPTION_TOTAL_COUNT: u32 = 12;

pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(base_url: &str, key_id: String, key_secret: String) -> Result<Self, GatewayError> {
        if key_id.is_empty() || key_secret.is_empty() {
            return Err(GatewayError::InvalidConfig(
                "Razorpay key id and secret are required".to_string(),
            ));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                GatewayError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_subscription(
        &self,
        plan_id: &str,
    ) -> Result<GatewaySubscription, GatewayError> {
        let body = json!({
            "plan_id": plan_id,
            "customer_notify": 1,
            "total_count": SUBSCRIPTION_TOTAL_COUNT,
        });

        let resp = self
            .client
            .post(format!("{}/v1/subscriptions", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::CreationFailed(error_text));
        }

        let raw: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        parse_subscription(raw)
    }
}

pub fn parse_subscription(raw: Value) -> Result<GatewaySubscription, GatewayError> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse("Missing subscription id".to_string()))?
        .to_string();
    Ok(GatewaySubscription { id, raw })
}
