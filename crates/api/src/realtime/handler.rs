//! WebSocket entry points and the per-session delivery loop
//!
//! Two symmetric endpoints, one socket per purpose: a room session for a
//! ticket's discussion thread and an identity session for the caller's
//! personal notification feed. Browsers cannot set headers on WebSocket
//! upgrades, so the access token travels as a `?token=` query parameter and
//! is validated before the upgrade completes.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

use super::session::Session;

#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Which channel a delivery loop is serving.
#[derive(Debug, Clone, Copy)]
enum ChannelTarget {
    Room(Uuid),
    Identity(Uuid),
}

/// Live view of one ticket's discussion, served at `GET /ws/tickets/:ticket_id`.
pub async fn ticket_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Query(params): Query<WsQuery>,
) -> Result<Response, StatusCode> {
    let claims = state
        .jwt
        .validate_token(&params.token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let ticket_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tickets WHERE id = $1)")
            .bind(ticket_id)
            .fetch_one(&state.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "Ticket lookup failed during WebSocket upgrade");
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
    if !ticket_exists {
        return Err(StatusCode::NOT_FOUND);
    }

    tracing::info!(ticket_id = %ticket_id, user_id = %claims.sub, "Room session upgrade requested");
    Ok(ws.on_upgrade(move |socket| {
        run_delivery_loop(socket, state, ChannelTarget::Room(ticket_id))
    }))
}

/// The caller's personal notification feed, served at `GET /ws/notifications`.
///
/// The identity channel key comes from the validated token, never from the
/// client's own say-so.
pub async fn notifications_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
) -> Result<Response, StatusCode> {
    let claims = state
        .jwt
        .validate_token(&params.token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id = claims.sub;
    tracing::info!(user_id = %user_id, "Identity session upgrade requested");
    Ok(ws.on_upgrade(move |socket| {
        run_delivery_loop(socket, state, ChannelTarget::Identity(user_id))
    }))
}

/// Drive one session from join to leave.
///
/// Registers the session, pumps its queue into the socket from a writer task,
/// then reads inbound frames until the transport closes. Leave always runs
/// before the session is dropped so the registry never holds a dangling
/// reference.
async fn run_delivery_loop(socket: WebSocket, state: AppState, target: ChannelTarget) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Arc::new(Session::new(tx));
    let session_id = session.session_id;

    match target {
        ChannelTarget::Room(ticket_id) => {
            state.registry.join_room(ticket_id, Arc::clone(&session)).await;
        }
        ChannelTarget::Identity(user_id) => {
            state
                .registry
                .join_identity(user_id, Arc::clone(&session))
                .await;
        }
    }

    // Writer task: drains the session queue into the socket. Ends when the
    // socket write fails or the session's sender side is dropped.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sink.send(Message::Text(json)).await.is_err() {
                        break; // peer gone
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize wire event");
                }
            }
        }
    });

    // Inbound frames carry no protocol; reading just detects disconnect.
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    match target {
        ChannelTarget::Room(ticket_id) => {
            state.registry.leave_room(&ticket_id, &session_id).await;
            tracing::info!(ticket_id = %ticket_id, session_id = %session_id, "Room session closed");
        }
        ChannelTarget::Identity(user_id) => {
            state.registry.leave_identity(&user_id, &session_id).await;
            tracing::info!(user_id = %user_id, session_id = %session_id, "Identity session closed");
        }
    }

    writer.abort();
}
