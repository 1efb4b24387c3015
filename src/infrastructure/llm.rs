use crate::domain::{Agent, LlmProvider};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    RequestFailed(String),
    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub const GEMINI_MODEL: &str = "gemini-pro";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const OPENROUTER_MODEL: &str = "openai/gpt-3.5-turbo";

/// One chat turn against the agent's configured provider.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        agent: &Agent,
        system_prompt: &str,
        message: &str,
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub gemini_base_url: String,
    pub openai_base_url: String,
    pub openrouter_base_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            openrouter_base_url: "https://openrouter.ai".to_string(),
        }
    }
}

pub struct HttpChatProvider {
    client: Client,
    endpoints: ProviderEndpoints,
}

impl HttpChatProvider {
    pub fn new(endpoints: ProviderEndpoints) -> Result<Self, ProviderError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                ProviderError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, endpoints })
    }

    fn request_for(
        &self,
        agent: &Agent,
        system_prompt: &str,
        message: &str,
    ) -> reqwest::RequestBuilder {
        match agent.provider {
            LlmProvider::Gemini => self
                .client
                .post(gemini_url(&self.endpoints.gemini_base_url))
                .query(&[("key", agent.api_key.as_str())])
                .json(&gemini_body(system_prompt, message)),
            LlmProvider::Chatgpt => self
                .client
                .post(format!(
                    "{}/v1/chat/completions",
                    self.endpoints.openai_base_url.trim_end_matches('/')
                ))
                .bearer_auth(&agent.api_key)
                .json(&chat_completions_body(OPENAI_MODEL, system_prompt, message)),
            LlmProvider::Openrouter => self
                .client
                .post(format!(
                    "{}/api/v1/chat/completions",
                    self.endpoints.openrouter_base_url.trim_end_matches('/')
                ))
                .bearer_auth(&agent.api_key)
                .json(&chat_completions_body(OPENROUTER_MODEL, system_prompt, message)),
        }
    }
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    async fn complete(
        &self,
        agent: &Agent,
        system_prompt: &str,
        message: &str,
    ) -> Result<String, ProviderError> {
        let resp = self
            .request_for(agent, system_prompt, message)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json_response: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        extract_reply(agent.provider, &json_response)
    }
}

fn gemini_url(base: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base.trim_end_matches('/'),
        GEMINI_MODEL
    )
}

/// Gemini has no system role here, so the prompt is folded into the user turn.
pub fn gemini_body(system_prompt: &str, message: &str) -> Value {
    json!({
        "contents": [{
            "parts": [{ "text": format!("{}\n\nUser: {}", system_prompt, message) }]
        }]
    })
}

pub fn chat_completions_body(model: &str, system_prompt: &str, message: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": message },
        ]
    })
}

pub fn extract_reply(provider: LlmProvider, body: &Value) -> Result<String, ProviderError> {
    let pointer = match provider {
        LlmProvider::Gemini => "/candidates/0/content/parts/0/text",
        LlmProvider::Chatgpt | LlmProvider::Openrouter => "/choices/0/message/content",
    };

    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("Missing {}", pointer)))
}
