use super::http_errors::map_auth_error;
use super::state::AppState;
use crate::domain::User;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, header::HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::warn;

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub(super) type AuthRejection = (StatusCode, Json<serde_json::Value>);

/// Resolve the caller from the `Authorization` header.
pub(super) async fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<User, AuthRejection> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        ));
    };

    state.auth.authenticate(token).await.map_err(|e| {
        let (status, body) = map_auth_error(&e);
        (status, Json(body))
    })
}

/// Throttle credential endpoints per client IP.
///
/// Without connection info (router served without
/// `into_make_service_with_connect_info`) every caller shares one budget.
pub(super) async fn auth_rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(connect_info.map(|ConnectInfo(addr)| addr));
    if state.auth_limiter.check(ip) {
        return next.run(request).await;
    }

    warn!(
        ip = %ip,
        path = %request.uri().path(),
        limit = state.auth_limiter.per_minute(),
        "Auth rate limit exceeded"
    );
    too_many_requests().into_response()
}

fn client_ip(addr: Option<SocketAddr>) -> IpAddr {
    addr.map(|a| a.ip()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn too_many_requests() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({ "error": "Too many requests, please try again later" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extract_bearer_token_happy_path() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn extract_bearer_token_rejects_missing_or_empty() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers2 = HeaderMap::new();
        headers2.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers2), None);
    }

    #[test]
    fn extract_bearer_token_rejects_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn client_ip_prefers_peer_address() {
        let addr: SocketAddr = "203.0.113.9:51000".parse().unwrap();
        assert_eq!(client_ip(Some(addr)), addr.ip());
        assert_eq!(client_ip(None), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn throttled_response_is_429_json() {
        let (status, Json(body)) = too_many_requests();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().unwrap().starts_with("Too many requests"));
    }
}
