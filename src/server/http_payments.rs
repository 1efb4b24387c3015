use super::http_auth::require_user;
use super::http_errors::map_payment_error;
use super::http_types::*;
use super::state::AppState;
use crate::application::PaymentError;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{error, warn};

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

fn payment_failure(e: &PaymentError) -> (StatusCode, Json<serde_json::Value>) {
    let (status, body) = map_payment_error(e);
    if status.is_server_error() {
        error!(error = %e, "Payment request failed");
    }
    (status, Json(body))
}

#[utoipa::path(
    post,
    path = "/payments/subscribe",
    tag = "Payments",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Gateway subscription created", body = SubscribeResponse),
        (status = 400, description = "Invalid plan", body = Object),
        (status = 401, description = "Missing or invalid token", body = Object),
        (status = 503, description = "Payment gateway not configured", body = Object)
    )
)]
pub(super) async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubscribeRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    match state.payments.subscribe(user.id, &req.plan).await {
        Ok(subscription) => (
            StatusCode::OK,
            Json(serde_json::json!(SubscribeResponse {
                subscription: subscription.raw,
            })),
        ),
        Err(e) => payment_failure(&e),
    }
}

/// Gateway callback. The body is taken raw so the signature covers the exact bytes sent.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    tag = "Payments",
    params(("x-razorpay-signature" = String, Header, description = "Hex HMAC-SHA256 of the body")),
    request_body(content = Object, description = "Gateway event payload"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookResponse),
        (status = 400, description = "Missing signature or malformed payload", body = Object),
        (status = 401, description = "Invalid signature", body = Object)
    )
)]
pub(super) async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.payments.handle_webhook(&body, signature).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!(WebhookResponse {
                status: "ok".to_string(),
                outcome: outcome.to_string(),
            })),
        ),
        Err(e) => {
            if !matches!(e, PaymentError::Repository(_)) {
                warn!(error = %e, "Webhook rejected");
            }
            payment_failure(&e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/payments/history",
    tag = "Payments",
    responses(
        (status = 200, description = "Caller's billing records, newest first", body = [BillingRecordResponse]),
        (status = 401, description = "Missing or invalid token", body = Object)
    )
)]
pub(super) async fn billing_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    match state.payments.history(user.id).await {
        Ok(records) => {
            let body: Vec<BillingRecordResponse> =
                records.into_iter().map(BillingRecordResponse::from).collect();
            (StatusCode::OK, Json(serde_json::json!(body)))
        }
        Err(e) => payment_failure(&e),
    }
}
