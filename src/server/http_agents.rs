use super::http_auth::require_user;
use super::http_errors::map_agent_error;
use super::http_parse::{parse_agent_id, parse_snippet_kind};
use super::http_types::*;
use super::state::AppState;
use crate::application::AgentError;
use axum::{
    extract::{Path, Query, State},
    http::{header::HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::error;

fn agent_failure(e: &AgentError) -> (StatusCode, Json<serde_json::Value>) {
    let (status, body) = map_agent_error(e);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %e, "Agent request failed");
    }
    (status, Json(body))
}

fn agent_not_found() -> (StatusCode, Json<serde_json::Value>) {
    agent_failure(&AgentError::NotFound)
}

#[utoipa::path(
    post,
    path = "/agents",
    tag = "Agents",
    request_body = CreateAgentRequest,
    responses(
        (status = 201, description = "Agent created", body = AgentResponse),
        (status = 400, description = "Validation failed or plan limit reached", body = Object),
        (status = 401, description = "Missing or invalid token", body = Object)
    )
)]
pub(super) async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAgentRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    match state.agents.create(user.id, req.into()).await {
        Ok(agent) => (
            StatusCode::CREATED,
            Json(serde_json::json!(AgentResponse::from(agent))),
        ),
        Err(e) => agent_failure(&e),
    }
}

#[utoipa::path(
    get,
    path = "/agents",
    tag = "Agents",
    responses(
        (status = 200, description = "Caller's agents, newest first", body = [AgentResponse]),
        (status = 401, description = "Missing or invalid token", body = Object)
    )
)]
pub(super) async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    match state.agents.list(user.id).await {
        Ok(agents) => {
            let body: Vec<AgentResponse> = agents.into_iter().map(AgentResponse::from).collect();
            (StatusCode::OK, Json(serde_json::json!(body)))
        }
        Err(e) => agent_failure(&e),
    }
}

#[utoipa::path(
    get,
    path = "/agents/analytics",
    tag = "Agents",
    responses(
        (status = 200, description = "Usage totals across the caller's agents", body = AnalyticsResponse),
        (status = 401, description = "Missing or invalid token", body = Object)
    )
)]
pub(super) async fn agent_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    match state.agents.analytics(user.id).await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(serde_json::json!(AnalyticsResponse::from(snapshot))),
        ),
        Err(e) => agent_failure(&e),
    }
}

#[utoipa::path(
    get,
    path = "/agents/{id}",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent id")),
    responses(
        (status = 200, description = "Agent", body = AgentResponse),
        (status = 401, description = "Missing or invalid token", body = Object),
        (status = 404, description = "Agent not found", body = Object)
    )
)]
pub(super) async fn get_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let Some(agent_id) = parse_agent_id(&id) else {
        return agent_not_found();
    };

    match state.agents.get(user.id, agent_id).await {
        Ok(agent) => (
            StatusCode::OK,
            Json(serde_json::json!(AgentResponse::from(agent))),
        ),
        Err(e) => agent_failure(&e),
    }
}

#[utoipa::path(
    patch,
    path = "/agents/{id}",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent id")),
    request_body = UpdateAgentRequest,
    responses(
        (status = 200, description = "Updated agent", body = AgentResponse),
        (status = 400, description = "Validation failed", body = Object),
        (status = 401, description = "Missing or invalid token", body = Object),
        (status = 404, description = "Agent not found", body = Object)
    )
)]
pub(super) async fn update_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateAgentRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let Some(agent_id) = parse_agent_id(&id) else {
        return agent_not_found();
    };

    match state.agents.update(user.id, agent_id, req.into()).await {
        Ok(agent) => (
            StatusCode::OK,
            Json(serde_json::json!(AgentResponse::from(agent))),
        ),
        Err(e) => agent_failure(&e),
    }
}

#[utoipa::path(
    delete,
    path = "/agents/{id}",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent id")),
    responses(
        (status = 200, description = "Agent deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = Object),
        (status = 404, description = "Agent not found", body = Object)
    )
)]
pub(super) async fn delete_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let Some(agent_id) = parse_agent_id(&id) else {
        return agent_not_found();
    };

    match state.agents.delete(user.id, agent_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!(MessageResponse::new("Agent deleted successfully"))),
        ),
        Err(e) => agent_failure(&e),
    }
}

#[utoipa::path(
    get,
    path = "/agents/{id}/snippet",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent id"), SnippetParams),
    responses(
        (status = 200, description = "Embed snippet", body = SnippetResponse),
        (status = 400, description = "Unknown snippet type", body = Object),
        (status = 401, description = "Missing or invalid token", body = Object),
        (status = 404, description = "Agent not found", body = Object)
    )
)]
pub(super) async fn get_snippet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<SnippetParams>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let Some(agent_id) = parse_agent_id(&id) else {
        return agent_not_found();
    };
    let Some(kind) = parse_snippet_kind(params.kind.as_deref()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Invalid snippet type" })),
        );
    };

    match state.agents.snippet(user.id, agent_id, kind).await {
        Ok(snippet) => (
            StatusCode::OK,
            Json(serde_json::json!(SnippetResponse { snippet })),
        ),
        Err(e) => agent_failure(&e),
    }
}

/// Public endpoint called by the embedded widget; no bearer token.
#[utoipa::path(
    post,
    path = "/agents/{id}/chat",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent id")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Provider reply", body = ChatResponse),
        (status = 400, description = "Empty message", body = Object),
        (status = 404, description = "Agent not found", body = Object),
        (status = 502, description = "Chat provider request failed", body = Object)
    )
)]
pub(super) async fn chat_with_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let Some(agent_id) = parse_agent_id(&id) else {
        return agent_not_found();
    };

    match state.agents.chat(agent_id, &req.message).await {
        Ok(response) => (
            StatusCode::OK,
            Json(serde_json::json!(ChatResponse { response })),
        ),
        Err(e) => agent_failure(&e),
    }
}
