use crate::domain::{Agent, BillingRecord, BillingStatus, LlmProvider, PlanTier, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    #[must_use]
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;
    #[must_use]
    async fn get_by_id(&self, id: Uuid) -> Result<User, RepositoryError>;
    #[must_use]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    #[must_use]
    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, RepositoryError>;
    /// Persist verification, password and reset-token state.
    #[must_use]
    async fn update(&self, user: &User) -> Result<(), RepositoryError>;
    #[must_use]
    async fn update_plan(
        &self,
        id: Uuid,
        plan: PlanTier,
        agent_limit: i32,
    ) -> Result<(), RepositoryError>;
    /// Append a domain unless the user already lists it.
    #[must_use]
    async fn add_domain(&self, id: Uuid, domain: &str) -> Result<(), RepositoryError>;
    #[must_use]
    async fn set_domains(&self, id: Uuid, domains: &[String]) -> Result<(), RepositoryError>;
    #[must_use]
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Insert the agent if the owner holds fewer than `limit` agents
    /// (`None` = unlimited). The check and insert are atomic per user.
    /// Returns `false` when the limit is already reached.
    #[must_use]
    async fn create_within_limit(
        &self,
        agent: &Agent,
        limit: Option<i64>,
    ) -> Result<bool, RepositoryError>;
    #[must_use]
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Agent>, RepositoryError>;
    #[must_use]
    async fn get_by_id(&self, id: Uuid) -> Result<Agent, RepositoryError>;
    /// Like `get_by_id` but `NotFound` unless `user_id` owns the agent.
    #[must_use]
    async fn get_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Agent, RepositoryError>;
    /// Writes the editable columns only; counters are left alone.
    #[must_use]
    async fn update(&self, agent: &Agent) -> Result<(), RepositoryError>;
    #[must_use]
    async fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError>;
    #[must_use]
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError>;
    /// Bump `chat_count` and `total_interactions` by one in a single statement.
    #[must_use]
    async fn increment_counters(&self, id: Uuid) -> Result<Agent, RepositoryError>;
}

#[async_trait]
pub trait BillingRepository: Send + Sync {
    #[must_use]
    async fn create(&self, record: &BillingRecord) -> Result<(), RepositoryError>;
    #[must_use]
    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<BillingRecord>, RepositoryError>;
    /// Paid records are final; returns whether the row changed.
    #[must_use]
    async fn update_status(
        &self,
        id: Uuid,
        status: BillingStatus,
        payment_id: Option<&str>,
    ) -> Result<bool, RepositoryError>;
    /// Flip a pending/failed record to paid and move its owner onto the
    /// record's plan, atomically. Returns `false` if the record was already paid.
    #[must_use]
    async fn mark_paid_and_apply_plan(
        &self,
        record: &BillingRecord,
        payment_id: Option<&str>,
    ) -> Result<bool, RepositoryError>;
    /// Newest first.
    #[must_use]
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<BillingRecord>, RepositoryError>;
}

fn map_not_found(e: sqlx::Error, what: String) -> RepositoryError {
    match e {
        sqlx::Error::RowNotFound => RepositoryError::NotFound(what),
        _ => RepositoryError::DatabaseError(e),
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = r#"
    id, email, password_hash, is_verified, verification_code, verification_code_expires_at,
    plan, agent_limit, domains, reset_password_token, reset_password_expires_at,
    created_at, updated_at
"#;

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, is_verified, verification_code,
                               verification_code_expires_at, plan, agent_limit, domains,
                               reset_password_token, reset_password_expires_at,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(&user.verification_code)
        .bind(user.verification_code_expires_at)
        .bind(user.plan.to_string())
        .bind(user.agent_limit)
        .bind(&user.domains)
        .bind(&user.reset_password_token)
        .bind(user.reset_password_expires_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("User {}", user.email))
            }
            _ => RepositoryError::DatabaseError(e),
        })?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_not_found(e, format!("User {}", id)))?;

        row_to_user(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE reset_password_token = $1",
            USER_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, is_verified = $2, verification_code = $3,
                verification_code_expires_at = $4, reset_password_token = $5,
                reset_password_expires_at = $6, updated_at = $7
            WHERE id = $8
            "#,
        )
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(&user.verification_code)
        .bind(user.verification_code_expires_at)
        .bind(&user.reset_password_token)
        .bind(user.reset_password_expires_at)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("User {}", user.id)));
        }
        Ok(())
    }

    async fn update_plan(
        &self,
        id: Uuid,
        plan: PlanTier,
        agent_limit: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE users
            SET plan = $1, agent_limit = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(plan.to_string())
        .bind(agent_limit)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_domain(&self, id: Uuid, domain: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE users
            SET domains = array_append(domains, $1), updated_at = $2
            WHERE id = $3 AND NOT ($1 = ANY(domains))
            "#,
        )
        .bind(domain)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_domains(&self, id: Uuid, domains: &[String]) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE users
            SET domains = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(domains)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        // agents and billing_records cascade
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User, RepositoryError> {
    let plan_str: String = row.try_get("plan")?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_verified: row.try_get("is_verified")?,
        verification_code: row.try_get("verification_code")?,
        verification_code_expires_at: row.try_get("verification_code_expires_at")?,
        plan: PlanTier::from_str(&plan_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown plan: {}", plan_str)))?,
        agent_limit: row.try_get("agent_limit")?,
        domains: row.try_get("domains")?,
        reset_password_token: row.try_get("reset_password_token")?,
        reset_password_expires_at: row.try_get("reset_password_expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const AGENT_COLUMNS: &str = r#"
    id, user_id, name, description, api_key, provider, configuration, domain,
    chat_count, total_interactions, created_at, updated_at
"#;

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn create_within_limit(
        &self,
        agent: &Agent,
        limit: Option<i64>,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the owner serialises concurrent creates for the same user
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(agent.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_not_found(e, format!("User {}", agent.user_id)))?;

        if let Some(limit) = limit {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agents WHERE user_id = $1")
                .bind(agent.user_id)
                .fetch_one(&mut *tx)
                .await?;
            if count >= limit {
                tx.rollback().await?;
                return Ok(false);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO agents (id, user_id, name, description, api_key, provider, configuration,
                                domain, chat_count, total_interactions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(agent.id)
        .bind(agent.user_id)
        .bind(&agent.name)
        .bind(&agent.description)
        .bind(&agent.api_key)
        .bind(agent.provider.to_string())
        .bind(&agent.configuration)
        .bind(&agent.domain)
        .bind(agent.chat_count)
        .bind(agent.total_interactions)
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM agents WHERE user_id = $1 ORDER BY created_at DESC",
            AGENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_agent).collect()
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Agent, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM agents WHERE id = $1", AGENT_COLUMNS))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_not_found(e, format!("Agent {}", id)))?;

        row_to_agent(&row)
    }

    async fn get_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Agent, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM agents WHERE id = $1 AND user_id = $2",
            AGENT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_not_found(e, format!("Agent {}", id)))?;

        row_to_agent(&row)
    }

    async fn update(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE agents
            SET name = $1, description = $2, api_key = $3, provider = $4,
                configuration = $5, domain = $6, updated_at = $7
            WHERE id = $8 AND user_id = $9
            "#,
        )
        .bind(&agent.name)
        .bind(&agent.description)
        .bind(&agent.api_key)
        .bind(agent.provider.to_string())
        .bind(&agent.configuration)
        .bind(&agent.domain)
        .bind(Utc::now())
        .bind(agent.id)
        .bind(agent.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Agent {}", agent.id)));
        }
        Ok(())
    }

    async fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM agents WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM agents WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn increment_counters(&self, id: Uuid) -> Result<Agent, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE agents
            SET chat_count = chat_count + 1,
                total_interactions = total_interactions + 1,
                updated_at = $1
            WHERE id = $2
            RETURNING {}
            "#,
            AGENT_COLUMNS
        ))
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_not_found(e, format!("Agent {}", id)))?;

        row_to_agent(&row)
    }
}

fn row_to_agent(row: &sqlx::postgres::PgRow) -> Result<Agent, RepositoryError> {
    let provider_str: String = row.try_get("provider")?;

    Ok(Agent {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        api_key: row.try_get("api_key")?,
        provider: LlmProvider::from_str(&provider_str).map_err(|_| {
            RepositoryError::InvalidData(format!("Unknown provider: {}", provider_str))
        })?,
        configuration: row.try_get("configuration")?,
        domain: row.try_get("domain")?,
        chat_count: row.try_get("chat_count")?,
        total_interactions: row.try_get("total_interactions")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
