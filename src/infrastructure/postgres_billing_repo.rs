use async_trait::async_trait;
use crate::domain::{BillingRecord, BillingStatus, PlanTier};
use crate::infrastructure::{BillingRepository, RepositoryError};
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

pub struct PostgresBillingRepository {
    pool: PgPool,
}

impl PostgresBillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingRepository for PostgresBillingRepository {
    async fn create(&self, record: &BillingRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO billing_records (id, user_id, amount, currency, status, gateway_payment_id,
                                         gateway_subscription_id, plan, description,
                                         created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(record.status.to_string())
        .bind(&record.gateway_payment_id)
        .bind(&record.gateway_subscription_id)
        .bind(record.plan.to_string())
        .bind(&record.description)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<BillingRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, amount, currency, status, gateway_payment_id,
                   gateway_subscription_id, plan, description, created_at, updated_at
            FROM billing_records
            WHERE gateway_subscription_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_record(&r)?)),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BillingStatus,
        payment_id: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE billing_records
            SET status = $1,
                gateway_payment_id = COALESCE($2, gateway_payment_id),
                updated_at = $3
            WHERE id = $4 AND status <> 'paid'
            "#,
        )
        .bind(status.to_string())
        .bind(payment_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_paid_and_apply_plan(
        &self,
        record: &BillingRecord,
        payment_id: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE billing_records
            SET status = 'paid',
                gateway_payment_id = COALESCE($1, gateway_payment_id),
                updated_at = $2
            WHERE id = $3 AND status <> 'paid'
            "#,
        )
        .bind(payment_id)
        .bind(now)
        .bind(record.id)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let upgraded = sqlx::query(
            r#"
            UPDATE users
            SET plan = $1, agent_limit = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(record.plan.to_string())
        .bind(record.plan.agent_limit())
        .bind(now)
        .bind(record.user_id)
        .execute(&mut *tx)
        .await?;

        if upgraded.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!("User {}", record.user_id)));
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<BillingRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, amount, currency, status, gateway_payment_id,
                   gateway_subscription_id, plan, description, created_at, updated_at
            FROM billing_records
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<BillingRecord, RepositoryError> {
    let status_str: String = row.try_get("status")?;
    let plan_str: String = row.try_get("plan")?;

    Ok(BillingRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        status: BillingStatus::from_str(&status_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown status: {}", status_str)))?,
        gateway_payment_id: row.try_get("gateway_payment_id")?,
        gateway_subscription_id: row.try_get("gateway_subscription_id")?,
        plan: PlanTier::from_str(&plan_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown plan: {}", plan_str)))?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
