use crate::application::{AgentError, AuthError, PaymentError};
use axum::http::StatusCode;

pub(super) fn map_auth_error(err: &AuthError) -> (StatusCode, serde_json::Value) {
    match err {
        AuthError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "Validation failed", "details": msg }),
        ),
        AuthError::UserExists
        | AuthError::AlreadyVerified
        | AuthError::InvalidCode
        | AuthError::InvalidResetToken
        | AuthError::InvalidConfirmation => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": err.to_string() }),
        ),
        AuthError::UserNotFound => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": "User not found" }))
        }
        AuthError::InvalidCredentials
        | AuthError::NotVerified
        | AuthError::WrongPassword
        | AuthError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": err.to_string() }),
        ),
        AuthError::Mail(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Failed to send email" }),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Internal server error" }),
        ),
    }
}

pub(super) fn map_agent_error(err: &AgentError) -> (StatusCode, serde_json::Value) {
    match err {
        AgentError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "Validation failed", "details": msg }),
        ),
        AgentError::NotFound => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": "Agent not found" }))
        }
        AgentError::UserNotFound => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": "User not found" }))
        }
        AgentError::LimitReached(_) | AgentError::EmptyMessage => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": err.to_string() }),
        ),
        // Provider detail stays in the logs
        AgentError::Provider(_) => (
            StatusCode::BAD_GATEWAY,
            serde_json::json!({ "error": "Chat provider request failed" }),
        ),
        AgentError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Internal server error" }),
        ),
    }
}

pub(super) fn map_payment_error(err: &PaymentError) -> (StatusCode, serde_json::Value) {
    match err {
        PaymentError::InvalidPlan(_) => {
            (StatusCode::BAD_REQUEST, serde_json::json!({ "error": "Invalid plan" }))
        }
        PaymentError::GatewayUnavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({ "error": "Payment gateway not configured" }),
        ),
        PaymentError::Gateway(_) => (
            StatusCode::BAD_GATEWAY,
            serde_json::json!({ "error": "Payment gateway request failed" }),
        ),
        PaymentError::MissingSignature | PaymentError::InvalidPayload(_) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "Invalid request" }),
        ),
        PaymentError::InvalidSignature => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Invalid signature" }),
        ),
        PaymentError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Internal server error" }),
        ),
    }
}
