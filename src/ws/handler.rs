//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::GameKind;
use crate::http::middleware::verify_jwt;
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::session::Session;

/// Outbound messages buffered per session
const OUTBOUND_BUFFER: usize = 64;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: String,
    pub game: String,
    #[serde(rename = "match")]
    pub match_id: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token before upgrading
    let claims = match verify_jwt(&query.token, &state.config.supabase_jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            error!(error = %e, "WebSocket auth failed");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let game: GameKind = match query.game.parse() {
        Ok(game) => game,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };
    if let Err(e) = game.match_path(&query.match_id) {
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    info!(user_id = %claims.sub, game = %game, match_id = %query.match_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, claims.sub, game, query.match_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    user_id: Uuid,
    game: GameKind,
    match_id: String,
    state: AppState,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);

    let mut session = Session::new(state, user_id, game, match_id.clone(), out_tx);
    let seat = match session.seat().await {
        Ok(seat) => seat,
        Err(e) => {
            warn!(user_id = %user_id, match_id = %match_id, error = %e, "Cannot open session");
            let _ = send_msg(
                &mut ws_sink,
                &ServerMsg::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let welcome = ServerMsg::Welcome {
        user_id,
        game,
        match_id: match_id.clone(),
        seat,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(user_id = %user_id, error = %e, "Failed to send welcome");
        return;
    }

    // Writer task: session output -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(user_id = %user_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let tasks = match session.start(seat) {
        Ok(tasks) => tasks,
        Err(e) => {
            error!(user_id = %user_id, match_id = %match_id, error = %e, "Failed to start session");
            writer_handle.abort();
            return;
        }
    };
    info!(user_id = %user_id, game = %game, match_id = %match_id, seat = ?seat, "Session started");

    let rate_limiter = SessionRateLimiter::new();

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_action() {
                    warn!(user_id = %user_id, "Rate limited action message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => session.handle(msg).await,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Teardown stops this session's loops; other participants keep theirs
    for task in tasks {
        task.abort();
    }
    writer_handle.abort();

    info!(user_id = %user_id, match_id = %match_id, "WebSocket connection closed");
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
