use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const MAX_DESCRIPTION_WORDS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub api_key: String,
    pub provider: LlmProvider,
    pub configuration: serde_json::Value,
    pub domain: Option<String>,
    pub chat_count: i64,
    pub total_interactions: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    Chatgpt,
    Openrouter,
}

/// Input for creating an agent, validated before it reaches storage.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateAgentInput {
    #[validate(
        length(min = 1, max = 100, message = "Agent name must be 1 to 100 characters"),
        custom = "validate_agent_name"
    )]
    pub name: String,
    #[validate(
        length(max = 50000, message = "Description must not exceed 50,000 characters"),
        custom = "validate_description"
    )]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "API key must be 1 to 1000 characters"))]
    pub api_key: String,
    #[validate(custom = "validate_provider")]
    pub provider: String,
    pub configuration: Option<serde_json::Value>,
    #[validate(
        length(max = 253, message = "Domain must not exceed 253 characters"),
        custom = "validate_domain"
    )]
    pub domain: Option<String>,
}

/// Partial update; absent fields are left untouched, an empty
/// description or domain clears it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentInput {
    #[validate(
        length(min = 1, max = 100, message = "Agent name must be 1 to 100 characters"),
        custom = "validate_agent_name"
    )]
    pub name: Option<String>,
    #[validate(
        length(max = 50000, message = "Description must not exceed 50,000 characters"),
        custom = "validate_description"
    )]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "API key must be 1 to 1000 characters"))]
    pub api_key: Option<String>,
    #[validate(custom = "validate_provider")]
    pub provider: Option<String>,
    pub configuration: Option<serde_json::Value>,
    #[validate(
        length(max = 253, message = "Domain must not exceed 253 characters"),
        custom = "validate_domain"
    )]
    pub domain: Option<String>,
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

fn lowered(value: &str) -> String {
    value.trim().to_lowercase()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl CreateAgentInput {
    /// Trim free text and lower-case enum-like fields.
    pub fn normalize(mut self) -> Self {
        self.name = trimmed(&self.name);
        self.description = self.description.as_deref().map(trimmed);
        self.api_key = trimmed(&self.api_key);
        self.provider = lowered(&self.provider);
        self.domain = self.domain.as_deref().map(lowered);
        self
    }
}

impl UpdateAgentInput {
    pub fn normalize(mut self) -> Self {
        self.name = self.name.as_deref().map(trimmed);
        self.description = self.description.as_deref().map(trimmed);
        self.api_key = self.api_key.as_deref().map(trimmed);
        self.provider = self.provider.as_deref().map(lowered);
        self.domain = self.domain.as_deref().map(lowered);
        self
    }
}

pub fn validate_agent_name(name: &str) -> Result<(), ValidationError> {
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || c == '-' || c == '_');
    if name.is_empty() || !allowed {
        let mut err = ValidationError::new("agent_name");
        err.message = Some(
            "Agent name can only contain letters, numbers, spaces, hyphens, and underscores".into(),
        );
        return Err(err);
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    if word_count(description) > MAX_DESCRIPTION_WORDS {
        let mut err = ValidationError::new("description_words");
        err.message = Some("Description must not exceed 1000 words".into());
        return Err(err);
    }
    Ok(())
}

pub fn validate_provider(provider: &str) -> Result<(), ValidationError> {
    if LlmProvider::from_str(provider).is_err() {
        let mut err = ValidationError::new("provider");
        err.message = Some("Provider must be one of: gemini, chatgpt, openrouter".into());
        return Err(err);
    }
    Ok(())
}

/// Accepts `^[A-Za-z0-9.-]+\.[A-Za-z]{2,}$` or the empty string.
pub fn validate_domain(domain: &str) -> Result<(), ValidationError> {
    if domain.is_empty() || is_valid_domain(domain) {
        return Ok(());
    }
    let mut err = ValidationError::new("domain");
    err.message = Some("Domain must be a valid domain format or empty".into());
    Err(err)
}

pub fn is_valid_domain(domain: &str) -> bool {
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

impl Agent {
    /// Build a new agent from validated input. Callers must run
    /// `validate()` first; an unknown provider here is a logic error
    /// reported as `None`.
    pub fn new(user_id: Uuid, input: CreateAgentInput) -> Option<Self> {
        let provider = LlmProvider::from_str(&input.provider).ok()?;
        let now = Utc::now();
        Some(Self {
            id: Uuid::new_v4(),
            user_id,
            name: input.name,
            description: non_empty(input.description),
            api_key: input.api_key,
            provider,
            configuration: input
                .configuration
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            domain: non_empty(input.domain),
            chat_count: 0,
            total_interactions: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a validated partial update. Counters are never touched here.
    pub fn apply_update(&mut self, input: UpdateAgentInput) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(description) = input.description {
            self.description = non_empty(Some(description));
        }
        if let Some(api_key) = input.api_key {
            self.api_key = api_key;
        }
        if let Some(provider) = input.provider.and_then(|p| LlmProvider::from_str(&p).ok()) {
            self.provider = provider;
        }
        if let Some(configuration) = input.configuration {
            self.configuration = configuration;
        }
        if let Some(domain) = input.domain {
            self.domain = non_empty(Some(domain));
        }
        self.updated_at = Utc::now();
    }

    pub fn system_prompt(&self) -> String {
        let description = self.description.as_deref().unwrap_or("an AI assistant");
        let domain = self
            .domain
            .as_deref()
            .map(|d| format!("Your domain is {}.", d))
            .unwrap_or_default();
        let topics = self
            .description
            .as_deref()
            .unwrap_or("your designated services");

        format!(
            "You are {}, {}. {} Answer questions based on the information provided in your description. \
             Format your responses using markdown for better readability: use **bold** for emphasis, - for lists, etc. \
             If asked about something not related to your purpose or description, politely explain that you can only \
             assist with topics related to {}.",
            self.name, description, domain, topics
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateAgentInput {
        CreateAgentInput {
            name: "  Support Bot_1 ".to_string(),
            description: Some(" Helps customers ".to_string()),
            api_key: " key-123 ".to_string(),
            provider: " Gemini ".to_string(),
            configuration: None,
            domain: Some("Shop.Example.COM".to_string()),
        }
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        let n = input().normalize();
        assert_eq!(n.name, "Support Bot_1");
        assert_eq!(n.description.as_deref(), Some("Helps customers"));
        assert_eq!(n.api_key, "key-123");
        assert_eq!(n.provider, "gemini");
        assert_eq!(n.domain.as_deref(), Some("shop.example.com"));
        assert!(n.validate().is_ok());
    }

    #[test]
    fn rejects_bad_name_provider_and_domain() {
        let mut bad = input().normalize();
        bad.name = "<script>".to_string();
        assert!(bad.validate().is_err());

        let mut bad = input().normalize();
        bad.provider = "claude".to_string();
        assert!(bad.validate().is_err());

        let mut bad = input().normalize();
        bad.domain = Some("localhost".to_string());
        assert!(bad.validate().is_err());

        let mut ok = input().normalize();
        ok.domain = Some(String::new());
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn rejects_description_over_word_cap() {
        let mut bad = input().normalize();
        bad.description = Some("word ".repeat(MAX_DESCRIPTION_WORDS + 1).trim().to_string());
        assert!(bad.validate().is_err());

        let mut ok = input().normalize();
        ok.description = Some("word ".repeat(MAX_DESCRIPTION_WORDS).trim().to_string());
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn domain_format() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("a-b.c.example.io"));
        assert!(!is_valid_domain("example.c"));
        assert!(!is_valid_domain(".com"));
        assert!(!is_valid_domain("exa mple.com"));
        assert!(!is_valid_domain("example.c0m"));
    }

    #[test]
    fn system_prompt_interpolates_name_description_domain() {
        let agent = Agent::new(Uuid::new_v4(), input().normalize()).unwrap();
        let prompt = agent.system_prompt();
        assert!(prompt.starts_with("You are Support Bot_1, Helps customers. Your domain is shop.example.com."));
        assert!(prompt.ends_with("topics related to Helps customers."));
    }

    #[test]
    fn system_prompt_falls_back_without_description() {
        let mut i = input().normalize();
        i.description = None;
        i.domain = None;
        let agent = Agent::new(Uuid::new_v4(), i).unwrap();
        let prompt = agent.system_prompt();
        assert!(prompt.starts_with("You are Support Bot_1, an AI assistant.  Answer"));
        assert!(prompt.ends_with("your designated services."));
    }

    #[test]
    fn update_keeps_counters_and_clears_empty_fields() {
        let mut agent = Agent::new(Uuid::new_v4(), input().normalize()).unwrap();
        agent.chat_count = 7;
        agent.apply_update(UpdateAgentInput {
            domain: Some(String::new()),
            provider: Some("openrouter".to_string()),
            ..Default::default()
        });
        assert_eq!(agent.chat_count, 7);
        assert_eq!(agent.domain, None);
        assert_eq!(agent.provider, LlmProvider::Openrouter);
    }
}
