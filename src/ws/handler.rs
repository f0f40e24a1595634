//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{deliver, GameError};
use crate::http::auth::{extract_bearer_token, verify_jwt, AuthError};
use crate::matchmaking::PlayerIdentity;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Per-connection outbound buffer. Roughly one second of state frames.
const OUTBOX_CAPACITY: usize = 256;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Identity token; the Authorization header is used when absent
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let token = query.token.as_deref().or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(extract_bearer_token)
    });

    let Some(token) = token else {
        warn!("WebSocket upgrade without identity token");
        return AuthError::MissingToken.into_response();
    };

    // Verify the token before upgrading
    match verify_jwt(token, &state.config.jwt_secret) {
        Ok(claims) => {
            let identity = claims.identity();
            info!(player_id = identity.player_id, "WebSocket upgrade for authenticated player");
            ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
        }
        Err(e) => {
            warn!(error = %e, "WebSocket auth failed");
            e.into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, identity: PlayerIdentity, state: AppState) {
    let player_id = identity.player_id;
    let (outbox, mut outbound) = mpsc::channel::<ServerMsg>(OUTBOX_CAPACITY);
    let connection = state.lifecycle.connect(identity, outbox.clone());

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Writer task: outbox -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = PlayerRateLimiter::new();

    // Reader loop: WebSocket -> lifecycle
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let msg = match ClientMsg::from_json(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(player_id, error = %e, "Failed to parse client message");
                        deliver(&outbox, ServerMsg::error(&e, "invalid_message"));
                        continue;
                    }
                };

                if msg.is_rate_limited() && !rate_limiter.check_input() {
                    warn!(player_id, "Rate limited paddle input");
                    continue;
                }

                match state.lifecycle.handle(player_id, connection, msg).await {
                    Ok(()) => {}
                    Err(GameError::NotConnected) => {
                        info!(player_id, connection, "Connection superseded, closing");
                        deliver(&outbox, ServerMsg::error(&GameError::NotConnected, GameError::NotConnected.code()));
                        break;
                    }
                    Err(e) if e.is_silent() => {
                        debug!(player_id, error = %e, "Ignored client message");
                    }
                    Err(e) => {
                        debug!(player_id, error = %e, "Rejected client message");
                        deliver(&outbox, ServerMsg::error(&e, e.code()));
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.lifecycle.disconnect(player_id, connection).await;

    // Rooms keep outbox clones, so the writer never sees the channel close
    writer_handle.abort();

    info!(player_id, "WebSocket connection closed");
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
