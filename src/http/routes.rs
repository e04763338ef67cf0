//! HTTP route definitions

use std::collections::HashSet;

use axum::{
    extract::{Extension, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::runner::{create_match, CreateMatchError, LoopKind};
use crate::game::{GameKind, Participant, UNKNOWN_PLAYER};
use crate::http::middleware::{require_auth, AuthenticatedUser};
use crate::store::KeyValueStore;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.client_origin.as_deref());

    // Public routes (the socket authenticates through its query string)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    let protected_routes = Router::new()
        .route("/matches", post(create_match_handler))
        .route("/matches/:game/:match_id", get(get_match_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Comma-separated origins; any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed).allow_credentials(true)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    watched_matches: usize,
    running_loops: usize,
    skirmish_authorities: usize,
    bow_loops: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = &state.match_registry;
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        watched_matches: state.watched_paths(),
        running_loops: registry.running_loops(),
        skirmish_authorities: registry.running_of(LoopKind::SkirmishAuthority),
        bow_loops: registry.running_of(LoopKind::Bow),
    })
}

// ============================================================================
// Lobby handoff
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMatchRequest {
    game: GameKind,
    lobby_id: String,
    /// Lobby members in seat order; the first one is the host
    participants: Vec<LobbyMember>,
}

#[derive(Debug, Deserialize)]
struct LobbyMember {
    id: Uuid,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMatchResponse {
    game: GameKind,
    match_id: String,
    participants: Vec<Participant>,
}

async fn create_match_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<CreateMatchResponse>), AppError> {
    if state.create_limiter.check().is_err() {
        return Err(AppError::RateLimited);
    }

    let host = req
        .participants
        .first()
        .ok_or_else(|| AppError::BadRequest("Lobby has no participants".to_string()))?;
    if host.id != auth.user_id {
        return Err(AppError::Forbidden(
            "Only the lobby host can start the match".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    if !req.participants.iter().all(|member| seen.insert(member.id)) {
        return Err(AppError::BadRequest("Duplicate participant".to_string()));
    }

    let mut participants = Vec::with_capacity(req.participants.len());
    for (number, member) in req.participants.iter().enumerate() {
        let username = match (&member.username, &state.profile_store) {
            (Some(name), _) => name.clone(),
            (None, Some(profiles)) => profiles.display_name(member.id).await,
            (None, None) => UNKNOWN_PLAYER.to_string(),
        };
        participants.push(Participant::new(member.id, username, number));
    }

    let mut rng = state.match_rng(req.game, &req.lobby_id, 0);
    create_match(
        state.store.clone(),
        req.game,
        &req.lobby_id,
        participants.clone(),
        &mut rng,
    )
    .await
    .map_err(|e| match e {
        CreateMatchError::AlreadyExists => {
            AppError::Conflict("Match already exists".to_string())
        }
        CreateMatchError::Invalid(e) => AppError::BadRequest(e.to_string()),
        CreateMatchError::Store(e) => {
            warn!(game = %req.game, match_id = %req.lobby_id, error = %e, "Match creation failed");
            AppError::Internal(e.to_string())
        }
    })?;

    info!(
        game = %req.game,
        match_id = %req.lobby_id,
        host = %auth.user_id,
        "Lobby handed off"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateMatchResponse {
            game: req.game,
            match_id: req.lobby_id,
            participants,
        }),
    ))
}

async fn get_match_handler(
    State(state): State<AppState>,
    Path((game, match_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let game: GameKind = game.parse().map_err(AppError::NotFound)?;
    let path = game
        .match_path(&match_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .store
        .get(&path)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No match at {path}")))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state() -> AppState {
        AppState::new(Config::for_tests())
    }

    fn lobby(game: GameKind, ids: &[Uuid]) -> CreateMatchRequest {
        CreateMatchRequest {
            game,
            lobby_id: "lobby-1".to_string(),
            participants: ids
                .iter()
                .map(|id| LobbyMember { id: *id, username: None })
                .collect(),
        }
    }

    fn caller(user_id: Uuid) -> Extension<AuthenticatedUser> {
        Extension(AuthenticatedUser { user_id })
    }

    #[tokio::test]
    async fn host_hands_off_the_lobby_once() {
        let state = state();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];

        let (status, Json(created)) = create_match_handler(
            State(state.clone()),
            caller(ids[0]),
            Json(lobby(GameKind::Cards, &ids)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.participants[1].number, 1);
        assert_eq!(created.participants[1].username, UNKNOWN_PLAYER);

        let again = create_match_handler(
            State(state.clone()),
            caller(ids[0]),
            Json(lobby(GameKind::Cards, &ids)),
        )
        .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let Json(record) = get_match_handler(
            State(state),
            Path(("uno".to_string(), "lobby-1".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(record["status"], "playing");
    }

    #[tokio::test]
    async fn only_the_host_can_hand_off() {
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let result = create_match_handler(
            State(state()),
            caller(ids[1]),
            Json(lobby(GameKind::Archery, &ids)),
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn invalid_lobbies_are_bad_requests() {
        let host = Uuid::new_v4();
        let result = create_match_handler(
            State(state()),
            caller(host),
            Json(lobby(GameKind::Skirmish, &[host])),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let result = create_match_handler(
            State(state()),
            caller(host),
            Json(lobby(GameKind::Cards, &[host, host])),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn unknown_matches_are_not_found() {
        let result = get_match_handler(
            State(state()),
            Path(("uno".to_string(), "nope".to_string())),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = get_match_handler(
            State(state()),
            Path(("chess".to_string(), "m".to_string())),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn errors_map_to_status_codes() {
        let response = AppError::Conflict("taken".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let response = AppError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
