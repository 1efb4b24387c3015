use super::http_errors::map_auth_error;
use super::http_types::EventsParams;
use super::state::AppState;
use crate::infrastructure::AnalyticsEvent;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Live analytics stream for the token's owner.
///
/// Frames are `{"event": "analyticsUpdate", "data": {...}}`, pushed after each
/// successful chat on one of the owner's agents.
#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    params(EventsParams),
    responses(
        (status = 101, description = "Switching to WebSocket"),
        (status = 401, description = "Missing or invalid token", body = Object)
    )
)]
pub(super) async fn events_socket(
    State(state): State<AppState>,
    Query(params): Query<EventsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let user = match state.auth.authenticate(params.token.trim()).await {
        Ok(user) => user,
        Err(e) => {
            let (status, body) = map_auth_error(&e);
            let status = if status.is_server_error() {
                status
            } else {
                StatusCode::UNAUTHORIZED
            };
            return (status, Json(body)).into_response();
        }
    };

    // Subscribe before the upgrade so nothing published during the handshake is lost
    let events = state.events.subscribe();
    let user_id = user.id;
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, events))
}

async fn handle_socket(
    socket: WebSocket,
    user_id: Uuid,
    mut events: broadcast::Receiver<AnalyticsEvent>,
) {
    info!(user_id = %user_id, "Analytics socket connected");
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.user_id == user_id => {
                    let frame = event.to_frame().to_string();
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user_id, skipped, "Analytics socket lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    debug!(user_id = %user_id, len = text.len(), "Ignoring client frame");
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(user_id = %user_id, "Analytics socket disconnected");
}
