use super::Agent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate usage for one user, as pushed in `analyticsUpdate` events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_agents: usize,
    pub total_chats: i64,
    pub total_interactions: i64,
    pub agents: Vec<AgentUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentUsage {
    pub id: Uuid,
    pub name: String,
    pub chat_count: i64,
    pub total_interactions: i64,
}

impl AnalyticsSnapshot {
    pub fn from_agents(agents: &[Agent]) -> Self {
        Self {
            total_agents: agents.len(),
            total_chats: agents.iter().map(|a| a.chat_count).sum(),
            total_interactions: agents.iter().map(|a| a.total_interactions).sum(),
            agents: agents
                .iter()
                .map(|a| AgentUsage {
                    id: a.id,
                    name: a.name.clone(),
                    chat_count: a.chat_count,
                    total_interactions: a.total_interactions,
                })
                .collect(),
        }
    }
}
