use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub bcrypt_cost: u32,
    pub server_host: String,
    pub server_port: u16,

    /// Base URL the embed snippets and widget call back to.
    pub public_api_url: String,
    /// Dashboard URL used in password reset links.
    pub frontend_url: String,
    pub cache_ttl_secs: u64,
    /// Requests per minute per client IP on the credential endpoints.
    pub auth_rate_limit_per_minute: u32,

    // Outgoing mail
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_email: String,

    // Payment gateway (Razorpay); subscriptions are disabled without keys
    pub razorpay_base_url: String,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    pub razorpay_webhook_secret: Option<String>,
    pub razorpay_plan_regular: String,
    pub razorpay_plan_special: String,
    pub razorpay_plan_agency: String,

    // LLM provider endpoints
    pub gemini_base_url: String,
    pub openai_base_url: String,
    pub openrouter_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("AGENTDESK").try_parsing(true))
            .set_default("token_ttl_secs", 3600)?
            .set_default("bcrypt_cost", 10)?
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 5000)?
            .set_default("public_api_url", "http://localhost:5000")?
            .set_default("frontend_url", "http://localhost:3000")?
            .set_default("cache_ttl_secs", 300)?
            .set_default("auth_rate_limit_per_minute", 10)?
            .set_default("smtp_host", "smtp.gmail.com")?
            .set_default("smtp_port", 587)?
            .set_default("from_email", "no-reply@agentdesk.local")?
            .set_default("razorpay_base_url", "https://api.razorpay.com")?
            .set_default("razorpay_plan_regular", "plan_regular_id")?
            .set_default("razorpay_plan_special", "plan_special_id")?
            .set_default("razorpay_plan_agency", "plan_agency_id")?
            .set_default("gemini_base_url", "https://generativelanguage.googleapis.com")?
            .set_default("openai_base_url", "https://api.openai.com")?
            .set_default("openrouter_base_url", "https://openrouter.ai")?
            .build()?;

        config.try_deserialize()
    }
}
