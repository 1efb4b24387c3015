use crate::application::{AgentService, AuthService, GatewayPlans, PaymentService};
use crate::infrastructure::{
    AppCaches, AppConfig, AuthRateLimiter, EventHub, HttpChatProvider, PaymentGateway, PostgresAgentRepository,
    PostgresBillingRepository, PostgresUserRepository, ProviderEndpoints, RazorpayClient,
    TokenSigner, TracingMailer,
};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub type AuthServiceType = AuthService<PostgresUserRepository, PostgresAgentRepository>;
pub type AgentServiceType = AgentService<PostgresUserRepository, PostgresAgentRepository>;
pub type PaymentServiceType = PaymentService<PostgresBillingRepository>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth: Arc<AuthServiceType>,
    pub agents: Arc<AgentServiceType>,
    pub payments: Arc<PaymentServiceType>,
    pub events: Arc<EventHub>,
    pub auth_limiter: Arc<AuthRateLimiter>,
}

/// Build full state from config + an existing pool.
///
/// Intended for embedding into a larger service that already manages a `PgPool`.
pub async fn build_state_with_pool(
    config: AppConfig,
    pool: PgPool,
    run_migrations: bool,
) -> anyhow::Result<AppState> {
    if run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
    }

    let signer = Arc::new(
        TokenSigner::new(&config.jwt_secret, config.token_ttl_secs).context("init token signer")?,
    );

    let provider = Arc::new(
        HttpChatProvider::new(ProviderEndpoints {
            gemini_base_url: config.gemini_base_url.clone(),
            openai_base_url: config.openai_base_url.clone(),
            openrouter_base_url: config.openrouter_base_url.clone(),
        })
        .context("init chat provider client")?,
    );

    let gateway: Option<Arc<dyn PaymentGateway>> =
        match (&config.razorpay_key_id, &config.razorpay_key_secret) {
            (Some(key_id), Some(key_secret)) => Some(Arc::new(
                RazorpayClient::new(
                    &config.razorpay_base_url,
                    key_id.clone(),
                    key_secret.clone(),
                )
                .context("init Razorpay client")?,
            )),
            _ => {
                warn!("Razorpay keys not configured; subscriptions are disabled");
                None
            }
        };

    let mailer = Arc::new(TracingMailer::new(
        &config.smtp_host,
        config.smtp_port,
        &config.from_email,
    ));
    let caches = Arc::new(AppCaches::new(Duration::from_secs(config.cache_ttl_secs)));
    let events = Arc::new(EventHub::default());

    let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
    let agent_repo = Arc::new(PostgresAgentRepository::new(pool.clone()));
    let billing_repo = Arc::new(PostgresBillingRepository::new(pool.clone()));

    let auth = Arc::new(AuthService::new(
        user_repo.clone(),
        agent_repo.clone(),
        signer,
        mailer,
        caches.clone(),
        config.bcrypt_cost,
        config.frontend_url.clone(),
    ));

    let agents = Arc::new(AgentService::new(
        user_repo,
        agent_repo,
        provider,
        events.clone(),
        caches.clone(),
        config.public_api_url.clone(),
    ));

    let payments = Arc::new(PaymentService::new(
        billing_repo,
        gateway,
        config.razorpay_webhook_secret.clone(),
        GatewayPlans {
            regular: config.razorpay_plan_regular.clone(),
            special: config.razorpay_plan_special.clone(),
            agency: config.razorpay_plan_agency.clone(),
        },
        caches.clone(),
    ));

    let auth_limiter = Arc::new(AuthRateLimiter::new(config.auth_rate_limit_per_minute));

    spawn_janitor(
        caches,
        auth_limiter.clone(),
        Duration::from_secs(config.cache_ttl_secs.max(1)),
    );
    info!("Application state ready");

    Ok(AppState {
        pool,
        auth,
        agents,
        payments,
        events,
        auth_limiter,
    })
}

/// Periodically drop expired cache entries and idle rate limit keys so neither
/// map grows without bound.
fn spawn_janitor(caches: Arc<AppCaches>, auth_limiter: Arc<AuthRateLimiter>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let purged = caches.users.purge_expired() + caches.agents.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired cache entries");
            }
            auth_limiter.purge_idle();
        }
    });
}

/// Build state for the standalone server.
///
/// Creates the `PgPool`, runs migrations, and wires repositories/services.
pub async fn build_state_from_env(config: AppConfig) -> anyhow::Result<AppState> {
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("connect database")?;
    build_state_with_pool(config, pool, true).await
}
