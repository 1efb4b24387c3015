use crate::domain::{
    render_snippet, Agent, AnalyticsSnapshot, CreateAgentInput, PlanTier, SnippetKind,
    UpdateAgentInput,
};
use crate::infrastructure::{
    agents_key, AgentRepository, AppCaches, ChatProvider, EventHub, ProviderError,
    RepositoryError, UserRepository,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Agent not found")]
    NotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Agent limit reached for {0} plan")]
    LimitReached(PlanTier),
    #[error("Message is required")]
    EmptyMessage,
    #[error("Chat provider request failed")]
    Provider(#[from] ProviderError),
}

/// Flatten validator output into one readable line.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

fn not_found(e: RepositoryError) -> AgentError {
    match e {
        RepositoryError::NotFound(_) => AgentError::NotFound,
        other => AgentError::Repository(other),
    }
}

pub struct AgentService<U, A>
where
    U: UserRepository,
    A: AgentRepository,
{
    user_repo: Arc<U>,
    agent_repo: Arc<A>,
    provider: Arc<dyn ChatProvider>,
    events: Arc<EventHub>,
    caches: Arc<AppCaches>,
    public_api_url: String,
}

impl<U, A> AgentService<U, A>
where
    U: UserRepository,
    A: AgentRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        agent_repo: Arc<A>,
        provider: Arc<dyn ChatProvider>,
        events: Arc<EventHub>,
        caches: Arc<AppCaches>,
        public_api_url: String,
    ) -> Self {
        Self {
            user_repo,
            agent_repo,
            provider,
            events,
            caches,
            public_api_url,
        }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateAgentInput,
    ) -> Result<Agent, AgentError> {
        let input = input.normalize();
        input
            .validate()
            .map_err(|e| AgentError::Validation(validation_message(&e)))?;

        let user = self.user_repo.get_by_id(user_id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => AgentError::UserNotFound,
            other => AgentError::Repository(other),
        })?;

        let agent = Agent::new(user_id, input)
            .ok_or_else(|| AgentError::Validation("Unsupported provider".to_string()))?;

        if !self
            .agent_repo
            .create_within_limit(&agent, user.effective_agent_limit())
            .await?
        {
            info!(user_id = %user_id, plan = %user.plan, "Agent limit reached");
            return Err(AgentError::LimitReached(user.plan));
        }

        self.caches.invalidate_agents(user_id);

        if let Some(domain) = &agent.domain {
            if !user.domains.contains(domain) {
                self.track_domain(user_id, domain).await;
            }
        }

        info!(
            user_id = %user_id,
            agent_id = %agent.id,
            provider = %agent.provider,
            "Agent created"
        );
        Ok(agent)
    }

    /// Newest first, served from the per-user cache when warm.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Agent>, AgentError> {
        let key = agents_key(user_id);
        if let Some(agents) = self.caches.agents.get(&key) {
            return Ok(agents);
        }

        let agents = self.agent_repo.list_by_user(user_id).await?;
        self.caches.agents.insert(key, agents.clone());
        Ok(agents)
    }

    pub async fn get(&self, user_id: Uuid, agent_id: Uuid) -> Result<Agent, AgentError> {
        self.agent_repo
            .get_for_user(agent_id, user_id)
            .await
            .map_err(not_found)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        agent_id: Uuid,
        input: UpdateAgentInput,
    ) -> Result<Agent, AgentError> {
        let input = input.normalize();
        input
            .validate()
            .map_err(|e| AgentError::Validation(validation_message(&e)))?;

        let mut agent = self.get(user_id, agent_id).await?;
        agent.apply_update(input);
        self.agent_repo.update(&agent).await.map_err(not_found)?;
        self.caches.invalidate_agents(user_id);

        if let Some(domain) = &agent.domain {
            self.track_domain(user_id, domain).await;
        }

        info!(user_id = %user_id, agent_id = %agent_id, "Agent updated");
        Ok(agent)
    }

    /// Add the agent's domain to the owner's list. The agent write has already
    /// committed at this point, so a failure is logged rather than returned.
    async fn track_domain(&self, user_id: Uuid, domain: &str) {
        match self.user_repo.add_domain(user_id, domain).await {
            Ok(()) => self.caches.invalidate_user(user_id),
            Err(e) => {
                error!(
                    user_id = %user_id,
                    domain = %domain,
                    error = %e,
                    "Failed to record agent domain"
                );
            }
        }
    }

    pub async fn delete(&self, user_id: Uuid, agent_id: Uuid) -> Result<(), AgentError> {
        if !self.agent_repo.delete_for_user(agent_id, user_id).await? {
            return Err(AgentError::NotFound);
        }
        self.caches.invalidate_agents(user_id);

        info!(user_id = %user_id, agent_id = %agent_id, "Agent deleted");
        Ok(())
    }

    pub async fn analytics(&self, user_id: Uuid) -> Result<AnalyticsSnapshot, AgentError> {
        let agents = self.list(user_id).await?;
        Ok(AnalyticsSnapshot::from_agents(&agents))
    }

    pub async fn snippet(
        &self,
        user_id: Uuid,
        agent_id: Uuid,
        kind: SnippetKind,
    ) -> Result<String, AgentError> {
        let agent = self.get(user_id, agent_id).await?;
        Ok(render_snippet(kind, agent.id, &self.public_api_url))
    }

    /// Public chat turn. Counters move only after the provider answered;
    /// the owner's refreshed analytics are then pushed to their sockets.
    pub async fn chat(&self, agent_id: Uuid, message: &str) -> Result<String, AgentError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        let agent = self.agent_repo.get_by_id(agent_id).await.map_err(not_found)?;

        let started = Instant::now();
        let reply = self
            .provider
            .complete(&agent, &agent.system_prompt(), message)
            .await
            .map_err(|e| {
                error!(
                    agent_id = %agent.id,
                    provider = %agent.provider,
                    error = %e,
                    "Chat provider request failed"
                );
                AgentError::Provider(e)
            })?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let updated = self.agent_repo.increment_counters(agent.id).await?;
        self.caches.invalidate_agents(updated.user_id);

        match self.analytics(updated.user_id).await {
            Ok(snapshot) => {
                self.events.publish_analytics(updated.user_id, snapshot);
            }
            Err(e) => {
                error!(user_id = %updated.user_id, error = %e, "Failed to refresh analytics");
            }
        }

        info!(
            agent_id = %agent.id,
            provider = %agent.provider,
            elapsed_ms,
            chat_count = updated.chat_count,
            "Chat completed"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LlmProvider, User};
    use async_trait::async_trait;
    use mockall::{mock, predicate::*};
    use std::sync::Mutex;
    use std::time::Duration;

    mock! {
        Users {}

        #[async_trait]
        impl UserRepository for Users {
            async fn create(&self, user: &User) -> Result<(), RepositoryError>;
            async fn get_by_id(&self, id: Uuid) -> Result<User, RepositoryError>;
            async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
            async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, RepositoryError>;
            async fn update(&self, user: &User) -> Result<(), RepositoryError>;
            async fn update_plan(&self, id: Uuid, plan: PlanTier, agent_limit: i32) -> Result<(), RepositoryError>;
            async fn add_domain(&self, id: Uuid, domain: &str) -> Result<(), RepositoryError>;
            async fn set_domains(&self, id: Uuid, domains: &[String]) -> Result<(), RepositoryError>;
            async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
        }
    }

    mock! {
        Agents {}

        #[async_trait]
        impl AgentRepository for Agents {
            async fn create_within_limit(&self, agent: &Agent, limit: Option<i64>) -> Result<bool, RepositoryError>;
            async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Agent>, RepositoryError>;
            async fn get_by_id(&self, id: Uuid) -> Result<Agent, RepositoryError>;
            async fn get_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Agent, RepositoryError>;
            async fn update(&self, agent: &Agent) -> Result<(), RepositoryError>;
            async fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError>;
            async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError>;
            async fn increment_counters(&self, id: Uuid) -> Result<Agent, RepositoryError>;
        }
    }

    mock! {
        Chat {}

        #[async_trait]
        impl ChatProvider for Chat {
            async fn complete(&self, agent: &Agent, system_prompt: &str, message: &str) -> Result<String, ProviderError>;
        }
    }

    fn agent_for(user_id: Uuid) -> Agent {
        Agent::new(
            user_id,
            CreateAgentInput {
                name: "Helper".to_string(),
                api_key: "key".to_string(),
                provider: "gemini".to_string(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn service(
        users: MockUsers,
        agents: MockAgents,
        chat: MockChat,
    ) -> (AgentService<MockUsers, MockAgents>, Arc<EventHub>) {
        let events = Arc::new(EventHub::default());
        let service = AgentService::new(
            Arc::new(users),
            Arc::new(agents),
            Arc::new(chat),
            events.clone(),
            Arc::new(AppCaches::new(Duration::from_secs(300))),
            "http://localhost:5000".to_string(),
        );
        (service, events)
    }

    #[test]
    fn validation_message_collects_field_messages() {
        let input = CreateAgentInput {
            name: "bad!name".to_string(),
            api_key: String::new(),
            provider: "claude".to_string(),
            ..Default::default()
        }
        .normalize();

        let errors = input.validate().unwrap_err();
        let message = validation_message(&errors);
        assert!(message.contains("API key must be 1 to 1000 characters"));
    }

    #[test]
    fn limit_error_names_the_plan() {
        assert_eq!(
            AgentError::LimitReached(PlanTier::Regular).to_string(),
            "Agent limit reached for regular plan"
        );
    }

    #[tokio::test]
    async fn chat_increments_counters_and_publishes_analytics() {
        let user_id = Uuid::new_v4();
        let agent = agent_for(user_id);
        let agent_id = agent.id;
        let mut counted = agent.clone();
        counted.chat_count = 1;
        counted.total_interactions = 1;

        let mut agents = MockAgents::new();
        let found = agent.clone();
        agents
            .expect_get_by_id()
            .with(eq(agent_id))
            .returning(move |_| Ok(found.clone()));
        let after = counted.clone();
        agents
            .expect_increment_counters()
            .times(1)
            .returning(move |_| Ok(after.clone()));
        agents
            .expect_list_by_user()
            .with(eq(user_id))
            .returning(move |_| Ok(vec![counted.clone()]));

        let mut chat = MockChat::new();
        chat.expect_complete()
            .withf(|_, prompt, message| prompt.starts_with("You are Helper,") && message == "hello")
            .returning(|_, _, _| Ok("**Hi!**".to_string()));

        let (service, events) = service(MockUsers::new(), agents, chat);
        let mut rx = events.subscribe();

        let reply = service.chat(agent_id, "  hello ").await.unwrap();
        assert_eq!(reply, "**Hi!**");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id, user_id);
        assert_eq!(event.snapshot.total_chats, 1);
        assert_eq!(event.snapshot.total_interactions, 1);
    }

    #[tokio::test]
    async fn failed_chat_leaves_counters_alone() {
        let agent = agent_for(Uuid::new_v4());
        let agent_id = agent.id;

        let mut agents = MockAgents::new();
        agents
            .expect_get_by_id()
            .returning(move |_| Ok(agent.clone()));
        agents.expect_increment_counters().times(0);

        let mut chat = MockChat::new();
        chat.expect_complete().returning(|_, _, _| {
            Err(ProviderError::Status {
                status: 401,
                body: "bad key".to_string(),
            })
        });

        let (service, _) = service(MockUsers::new(), agents, chat);
        let err = service.chat(agent_id, "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
        assert_eq!(err.to_string(), "Chat provider request failed");
    }

    #[tokio::test]
    async fn empty_message_never_reaches_the_provider() {
        let mut chat = MockChat::new();
        chat.expect_complete().times(0);

        let (service, _) = service(MockUsers::new(), MockAgents::new(), chat);
        assert!(matches!(
            service.chat(Uuid::new_v4(), "   ").await,
            Err(AgentError::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn create_passes_effective_limit_and_reports_plan() {
        let user = User::new("a@example.com".into(), "hash".into(), "ABC123".into());
        let user_id = user.id;

        let mut users = MockUsers::new();
        users
            .expect_get_by_id()
            .returning(move |_| Ok(user.clone()));

        let mut agents = MockAgents::new();
        agents
            .expect_create_within_limit()
            .withf(|agent, limit| agent.provider == LlmProvider::Gemini && *limit == Some(5))
            .returning(|_, _| Ok(false));

        let (service, _) = service(users, agents, MockChat::new());
        let err = service
            .create(
                user_id,
                CreateAgentInput {
                    name: "Helper".to_string(),
                    api_key: "key".to_string(),
                    provider: "Gemini".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::LimitReached(PlanTier::Regular)));
    }

    fn flaky_domain_users(user: User) -> MockUsers {
        let mut users = MockUsers::new();
        users
            .expect_get_by_id()
            .returning(move |_| Ok(user.clone()));
        users
            .expect_add_domain()
            .returning(|_, _| Err(RepositoryError::InvalidData("db blip".to_string())));
        users
    }

    #[tokio::test]
    async fn create_refreshes_list_even_when_domain_tracking_fails() {
        let user = User::new("a@example.com".into(), "hash".into(), "ABC123".into());
        let user_id = user.id;
        let stored: Arc<Mutex<Vec<Agent>>> = Arc::new(Mutex::new(Vec::new()));

        let mut agents = MockAgents::new();
        let inserted = stored.clone();
        agents.expect_create_within_limit().returning(move |agent, _| {
            inserted.lock().unwrap().push(agent.clone());
            Ok(true)
        });
        let listed = stored.clone();
        agents
            .expect_list_by_user()
            .times(2)
            .returning(move |_| Ok(listed.lock().unwrap().clone()));

        let (service, _) = service(flaky_domain_users(user), agents, MockChat::new());
        assert!(service.list(user_id).await.unwrap().is_empty());

        let agent = service
            .create(
                user_id,
                CreateAgentInput {
                    name: "Helper".to_string(),
                    api_key: "key".to_string(),
                    provider: "gemini".to_string(),
                    domain: Some("shop.example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let listed = service.list(user_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, agent.id);
    }

    #[tokio::test]
    async fn update_refreshes_list_even_when_domain_tracking_fails() {
        let user = User::new("a@example.com".into(), "hash".into(), "ABC123".into());
        let user_id = user.id;
        let stored = Arc::new(Mutex::new(agent_for(user_id)));
        let agent_id = stored.lock().unwrap().id;

        let mut agents = MockAgents::new();
        let current = stored.clone();
        agents
            .expect_get_for_user()
            .returning(move |_, _| Ok(current.lock().unwrap().clone()));
        let written = stored.clone();
        agents.expect_update().returning(move |agent| {
            *written.lock().unwrap() = agent.clone();
            Ok(())
        });
        let listed = stored.clone();
        agents
            .expect_list_by_user()
            .times(2)
            .returning(move |_| Ok(vec![listed.lock().unwrap().clone()]));

        let (service, _) = service(flaky_domain_users(user), agents, MockChat::new());
        assert_eq!(service.list(user_id).await.unwrap()[0].name, "Helper");

        let updated = service
            .update(
                user_id,
                agent_id,
                UpdateAgentInput {
                    name: Some("Renamed".to_string()),
                    domain: Some("shop.example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.domain.as_deref(), Some("shop.example.com"));
        assert_eq!(service.list(user_id).await.unwrap()[0].name, "Renamed");
    }
}
