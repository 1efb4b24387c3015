use super::http_agents::{
    agent_analytics, chat_with_agent, create_agent, delete_agent, get_agent, get_snippet,
    list_agents, update_agent,
};
use super::http_auth::{auth_rate_limit, require_user};
use super::http_errors::map_auth_error;
use super::http_payments::{billing_history, payment_webhook, subscribe};
use super::http_types::*;
use super::state::AppState;
use super::ws::events_socket;
use crate::application::AuthError;
use axum::{
    extract::State,
    http::{header, header::HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const WIDGET_JS: &str = include_str!("../../static/widget.js");

pub fn router(state: AppState) -> Router {
    // Credential endpoints are throttled per client IP; chat and the rest are not
    let credentials = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify", post(verify_email))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/change-password", patch(change_password))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_rate_limit));

    Router::new()
        .route("/health", get(health_check))
        .route("/widget.js", get(widget_script))
        .merge(credentials)
        .route("/auth/profile", get(get_profile).patch(update_profile))
        .route("/auth/account", delete(delete_account))
        .route("/agents", get(list_agents).post(create_agent))
        .route("/agents/analytics", get(agent_analytics))
        .route(
            "/agents/:id",
            get(get_agent).patch(update_agent).delete(delete_agent),
        )
        .route("/agents/:id/snippet", get(get_snippet))
        .route("/agents/:id/chat", post(chat_with_agent))
        .route("/payments/subscribe", post(subscribe))
        .route("/payments/webhook", post(payment_webhook))
        .route("/payments/history", get(billing_history))
        .route("/events", get(events_socket))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        // Widget and snippets are embedded on arbitrary customer sites
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        widget_script,
        register,
        verify_email,
        login,
        forgot_password,
        reset_password,
        get_profile,
        update_profile,
        change_password,
        delete_account,
        super::http_agents::create_agent,
        super::http_agents::list_agents,
        super::http_agents::agent_analytics,
        super::http_agents::get_agent,
        super::http_agents::update_agent,
        super::http_agents::delete_agent,
        super::http_agents::get_snippet,
        super::http_agents::chat_with_agent,
        super::http_payments::subscribe,
        super::http_payments::payment_webhook,
        super::http_payments::billing_history,
        super::ws::events_socket,
    ),
    components(
        schemas(
            HealthResponse,
            MessageResponse,
            RegisterRequest,
            VerifyRequest,
            LoginRequest,
            TokenResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            UpdateProfileRequest,
            ChangePasswordRequest,
            DeleteAccountRequest,
            ProfileResponse,
            CreateAgentRequest,
            UpdateAgentRequest,
            AgentResponse,
            AgentUsageResponse,
            AnalyticsResponse,
            SnippetResponse,
            ChatRequest,
            ChatResponse,
            SubscribeRequest,
            SubscribeResponse,
            WebhookResponse,
            BillingRecordResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration, login and account management"),
        (name = "Agents", description = "Agent management, snippets and chat"),
        (name = "Payments", description = "Plan subscriptions and billing history"),
        (name = "Events", description = "Live analytics stream"),
    ),
    info(
        title = "AgentDesk API",
        version = "0.1.0",
        description = "API for configuring, embedding and billing AI chat agents",
        license(name = "MIT")
    )
)]
struct ApiDoc;

/// Health check endpoint
///
/// Verifies database connectivity and returns service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed: DB connectivity issue");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    error: Some("Database connectivity failed".to_string()),
                }),
            )
        }
    }
}

/// Embeddable chat widget loaded by the generated snippets.
#[utoipa::path(
    get,
    path = "/widget.js",
    tag = "Agents",
    responses((status = 200, description = "Widget script", content_type = "application/javascript"))
)]
async fn widget_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        WIDGET_JS,
    )
}

fn auth_failure(e: &AuthError, context: &str) -> (StatusCode, Json<serde_json::Value>) {
    let (status, body) = map_auth_error(e);
    if status.is_server_error() {
        error!(error = %e, "{}", context);
    }
    (status, Json(body))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, verification code sent", body = MessageResponse),
        (status = 400, description = "Invalid input or user already exists", body = Object),
        (status = 429, description = "Too many requests from this client", body = Object)
    )
)]
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    match state.auth.register(&req.email, &req.password).await {
        Ok(user) => {
            info!(user_id = %user.id, "Registration accepted");
            (
                StatusCode::CREATED,
                Json(serde_json::json!(MessageResponse::new(
                    "Registration successful. Please check your email for verification code."
                ))),
            )
        }
        Err(e) => auth_failure(&e, "Registration failed"),
    }
}

#[utoipa::path(
    post,
    path = "/auth/verify",
    tag = "Auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Already verified or invalid code", body = Object),
        (status = 404, description = "User not found", body = Object),
        (status = 429, description = "Too many requests from this client", body = Object)
    )
)]
async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> impl IntoResponse {
    match state.auth.verify_email(&req.email, &req.code).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!(MessageResponse::new("Email verified successfully."))),
        ),
        Err(e) => auth_failure(&e, "Email verification failed"),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Bearer token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials or unverified email", body = Object),
        (status = 429, description = "Too many requests from this client", body = Object)
    )
)]
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> impl IntoResponse {
    match state.auth.login(&req.email, &req.password).await {
        Ok(access_token) => (
            StatusCode::OK,
            Json(serde_json::json!(TokenResponse { access_token })),
        ),
        Err(e) => auth_failure(&e, "Login failed"),
    }
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent", body = MessageResponse),
        (status = 404, description = "User not found", body = Object),
        (status = 429, description = "Too many requests from this client", body = Object)
    )
)]
async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> impl IntoResponse {
    match state.auth.forgot_password(&req.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!(MessageResponse::new("Password reset email sent."))),
        ),
        Err(e) => auth_failure(&e, "Forgot password failed"),
    }
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = Object),
        (status = 429, description = "Too many requests from this client", body = Object)
    )
)]
async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> impl IntoResponse {
    match state.auth.reset_password(&req.token, &req.new_password).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!(MessageResponse::new("Password reset successfully."))),
        ),
        Err(e) => auth_failure(&e, "Password reset failed"),
    }
}

#[utoipa::path(
    get,
    path = "/auth/profile",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token", body = Object)
    )
)]
async fn get_profile(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    match require_user(&state, &headers).await {
        Ok(user) => (
            StatusCode::OK,
            Json(serde_json::json!(ProfileResponse::from(user))),
        ),
        Err(rejection) => rejection,
    }
}

#[utoipa::path(
    patch,
    path = "/auth/profile",
    tag = "Auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated user", body = ProfileResponse),
        (status = 400, description = "Invalid domain", body = Object),
        (status = 401, description = "Missing or invalid token", body = Object)
    )
)]
async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    match state.auth.update_profile(user.id, req.domains).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(serde_json::json!(ProfileResponse::from(updated))),
        ),
        Err(e) => auth_failure(&e, "Profile update failed"),
    }
}

#[utoipa::path(
    patch,
    path = "/auth/change-password",
    tag = "Auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Wrong current password or invalid token", body = Object),
        (status = 429, description = "Too many requests from this client", body = Object)
    )
)]
async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    match state
        .auth
        .change_password(user.id, &req.current_password, &req.new_password)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!(MessageResponse::new("Password changed successfully."))),
        ),
        Err(e) => auth_failure(&e, "Password change failed"),
    }
}

#[utoipa::path(
    delete,
    path = "/auth/account",
    tag = "Auth",
    request_body = DeleteAccountRequest,
    responses(
        (status = 200, description = "Account and agents deleted", body = MessageResponse),
        (status = 400, description = "Confirmation text mismatch", body = Object),
        (status = 401, description = "Missing or invalid token", body = Object)
    )
)]
async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeleteAccountRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    match state.auth.delete_account(user.id, &req.confirmation).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!(MessageResponse::new("Account deleted successfully."))),
        ),
        Err(e) => auth_failure(&e, "Account deletion failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::AppConfig;
    use crate::server::build_state_with_pool;
    use std::net::SocketAddr;

    #[test]
    fn widget_falls_back_to_generic_error_on_unreadable_body() {
        // A non-JSON error page must not leak a parser message into the chat
        assert!(WIDGET_JS.contains("res.json().catch(function () { return null; })"));
        assert!(WIDGET_JS
            .contains("err instanceof ChatError && err.message ? err.message : GENERIC_ERROR"));
        assert!(!WIDGET_JS.contains("addMessage(err.message ||"));
    }

    #[test]
    fn credential_routes_document_throttling() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        for path in [
            "/auth/register",
            "/auth/verify",
            "/auth/login",
            "/auth/forgot-password",
            "/auth/reset-password",
        ] {
            assert!(
                doc["paths"][path]["post"]["responses"]["429"].is_object(),
                "{path} missing 429"
            );
        }
        assert!(doc["paths"]["/auth/change-password"]["patch"]["responses"]["429"].is_object());
        assert!(doc["paths"]["/agents/{id}/chat"]["post"]["responses"]["429"].is_null());
    }

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/agentdesk_unused".to_string(),
            jwt_secret: "router-test-secret-0123456789abcdef".to_string(),
            token_ttl_secs: 3600,
            bcrypt_cost: 4,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            public_api_url: "http://localhost:5000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            cache_ttl_secs: 300,
            auth_rate_limit_per_minute: 3,
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            from_email: "no-reply@agentdesk.local".to_string(),
            razorpay_base_url: "http://localhost:9".to_string(),
            razorpay_key_id: None,
            razorpay_key_secret: None,
            razorpay_webhook_secret: None,
            razorpay_plan_regular: "plan_regular_id".to_string(),
            razorpay_plan_special: "plan_special_id".to_string(),
            razorpay_plan_agency: "plan_agency_id".to_string(),
            gemini_base_url: "http://localhost:9".to_string(),
            openai_base_url: "http://localhost:9".to_string(),
            openrouter_base_url: "http://localhost:9".to_string(),
        }
    }

    /// Serve the full router on an ephemeral port with peer addresses attached.
    async fn spawn_app() -> String {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/agentdesk_unused").unwrap();
        let state = build_state_with_pool(test_config(), pool, false).await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    // Bodies are rejected by the JSON extractor, so no database is touched
    #[tokio::test]
    async fn credential_routes_are_throttled_per_client_but_chat_is_not() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        for _ in 0..3 {
            let res = client.post(format!("{base}/auth/login")).send().await.unwrap();
            assert_ne!(res.status().as_u16(), 429);
        }
        let res = client.post(format!("{base}/auth/register")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 429);
        let body: serde_json::Value = res.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("Too many requests"));

        let chat = format!("{base}/agents/{}/chat", uuid::Uuid::new_v4());
        for _ in 0..5 {
            let res = client.post(&chat).send().await.unwrap();
            assert_ne!(res.status().as_u16(), 429);
        }
    }
}
