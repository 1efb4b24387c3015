use crate::domain::{
    Agent, AgentUsage, AnalyticsSnapshot, BillingRecord, CreateAgentInput, UpdateAgentInput, User,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Serialize, ToSchema)]
pub(super) struct HealthResponse {
    pub(super) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct MessageResponse {
    pub(super) message: String,
}

impl MessageResponse {
    pub(super) fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub(super) struct RegisterRequest {
    #[schema(example = "owner@example.com")]
    pub(super) email: String,
    #[schema(example = "s3cret-pass")]
    pub(super) password: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct VerifyRequest {
    pub(super) email: String,
    #[schema(example = "A1B2C3")]
    pub(super) code: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct LoginRequest {
    pub(super) email: String,
    pub(super) password: String,
}

#[derive(Serialize, ToSchema)]
pub(super) struct TokenResponse {
    pub(super) access_token: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct ForgotPasswordRequest {
    pub(super) email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct ResetPasswordRequest {
    pub(super) token: String,
    pub(super) new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct UpdateProfileRequest {
    #[schema(example = json!(["example.com"]))]
    pub(super) domains: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct ChangePasswordRequest {
    pub(super) current_password: String,
    pub(super) new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct DeleteAccountRequest {
    #[schema(example = "DELETE")]
    pub(super) confirmation: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProfileResponse {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) is_verified: bool,
    pub(super) plan: String,
    pub(super) agent_limit: i32,
    pub(super) domains: Vec<String>,
    pub(super) created_at: chrono::DateTime<chrono::Utc>,
    pub(super) updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_verified: user.is_verified,
            plan: user.plan.to_string(),
            agent_limit: user.agent_limit,
            domains: user.domains,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateAgentRequest {
    #[schema(example = "Support Bot")]
    pub(super) name: String,
    pub(super) description: Option<String>,
    pub(super) api_key: String,
    #[schema(example = "gemini")]
    pub(super) provider: String,
    #[schema(value_type = Option<Object>)]
    pub(super) configuration: Option<serde_json::Value>,
    #[schema(example = "example.com")]
    pub(super) domain: Option<String>,
}

impl From<CreateAgentRequest> for CreateAgentInput {
    fn from(req: CreateAgentRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            api_key: req.api_key,
            provider: req.provider,
            configuration: req.configuration,
            domain: req.domain,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateAgentRequest {
    pub(super) name: Option<String>,
    pub(super) description: Option<String>,
    pub(super) api_key: Option<String>,
    pub(super) provider: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub(super) configuration: Option<serde_json::Value>,
    pub(super) domain: Option<String>,
}

impl From<UpdateAgentRequest> for UpdateAgentInput {
    fn from(req: UpdateAgentRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            api_key: req.api_key,
            provider: req.provider,
            configuration: req.configuration,
            domain: req.domain,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct AgentResponse {
    pub(super) id: Uuid,
    pub(super) user_id: Uuid,
    pub(super) name: String,
    pub(super) description: Option<String>,
    pub(super) api_key: String,
    pub(super) provider: String,
    #[schema(value_type = Object)]
    pub(super) configuration: serde_json::Value,
    pub(super) domain: Option<String>,
    pub(super) chat_count: i64,
    pub(super) total_interactions: i64,
    pub(super) created_at: chrono::DateTime<chrono::Utc>,
    pub(super) updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            user_id: agent.user_id,
            name: agent.name,
            description: agent.description,
            api_key: agent.api_key,
            provider: agent.provider.to_string(),
            configuration: agent.configuration,
            domain: agent.domain,
            chat_count: agent.chat_count,
            total_interactions: agent.total_interactions,
            created_at: agent.created_at,
            updated_at: agent.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct AgentUsageResponse {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) chat_count: i64,
    pub(super) total_interactions: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct AnalyticsResponse {
    pub(super) total_agents: usize,
    pub(super) total_chats: i64,
    pub(super) total_interactions: i64,
    pub(super) agents: Vec<AgentUsageResponse>,
}

impl From<AgentUsage> for AgentUsageResponse {
    fn from(usage: AgentUsage) -> Self {
        Self {
            id: usage.id,
            name: usage.name,
            chat_count: usage.chat_count,
            total_interactions: usage.total_interactions,
        }
    }
}

impl From<AnalyticsSnapshot> for AnalyticsResponse {
    fn from(snapshot: AnalyticsSnapshot) -> Self {
        Self {
            total_agents: snapshot.total_agents,
            total_chats: snapshot.total_chats,
            total_interactions: snapshot.total_interactions,
            agents: snapshot.agents.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub(super) struct SnippetParams {
    /// `js` (default) or `react`
    #[serde(rename = "type")]
    pub(super) kind: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct SnippetResponse {
    pub(super) snippet: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct ChatRequest {
    #[serde(default)]
    #[schema(example = "What are your opening hours?")]
    pub(super) message: String,
}

#[derive(Serialize, ToSchema)]
pub(super) struct ChatResponse {
    pub(super) response: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct SubscribeRequest {
    #[schema(example = "regular")]
    pub(super) plan: String,
}

#[derive(Serialize, ToSchema)]
pub(super) struct SubscribeResponse {
    #[schema(value_type = Object)]
    pub(super) subscription: serde_json::Value,
}

#[derive(Serialize, ToSchema)]
pub(super) struct WebhookResponse {
    pub(super) status: String,
    pub(super) outcome: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct BillingRecordResponse {
    pub(super) id: Uuid,
    pub(super) amount: i64,
    pub(super) currency: String,
    pub(super) status: String,
    pub(super) plan: String,
    pub(super) description: Option<String>,
    pub(super) gateway_payment_id: Option<String>,
    pub(super) gateway_subscription_id: Option<String>,
    pub(super) created_at: chrono::DateTime<chrono::Utc>,
    pub(super) updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<BillingRecord> for BillingRecordResponse {
    fn from(record: BillingRecord) -> Self {
        Self {
            id: record.id,
            amount: record.amount,
            currency: record.currency,
            status: record.status.to_string(),
            plan: record.plan.to_string(),
            description: record.description,
            gateway_payment_id: record.gateway_payment_id,
            gateway_subscription_id: record.gateway_subscription_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub(super) struct EventsParams {
    /// Bearer token issued by `/auth/login`
    pub(super) token: String,
}
