// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod config;
mod notify;
mod store;
mod use_cases;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{TimeDelta, Utc};
use deflector_common::{
    AddPawnResult, CreateGameRequest, CreateGameResponse, EndTurnResult, ExpireTurnRequest,
    GameView, OngoingGameResponse, PawnRequest, PeekResult, PlayerGameStats, PlayerRequest,
    PlayerStatsRequest, RuleError, ShuffleRequest, ShuffleResult,
};
use lambda_http::run as lambda_run;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    config::{GameSettings, load_game_settings, lock_duration_from_env},
    notify::{Broadcaster, HttpBroadcaster, HttpStatsReporter, StatsReporter},
    store::{GameStore, InMemoryGameStore, StoreError},
    use_cases::UseCaseError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    store: Arc<dyn GameStore>,
    broadcaster: Arc<dyn Broadcaster>,
    stats_reporter: Arc<dyn StatsReporter>,
    settings: Arc<GameSettings>,
    lock_for: TimeDelta,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "game_manager_service=debug,tower_http=info".to_string()),
        )
        .init();

    let settings = load_game_settings();
    info!(
        x_max = settings.x_max,
        y_max = settings.y_max,
        target_score = settings.target_score,
        turn_seconds = settings.turn_seconds,
        pawn_durability = settings.ruleset.pawn_durability,
        "loaded game settings"
    );

    let state = AppState {
        store: Arc::new(InMemoryGameStore::default()),
        broadcaster: Arc::new(HttpBroadcaster::from_env()),
        stats_reporter: Arc::new(HttpStatsReporter::from_env()),
        settings: Arc::new(settings),
        lock_for: lock_duration_from_env(),
    };

    let app = build_router(state);

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        info!("AWS Lambda runtime detected; running game-manager-service in lambda mode");
        lambda_run(app)
            .await
            .map_err(|e| anyhow::Error::msg(format!("lambda runtime error: {e}")))?;
        return Ok(());
    }

    let bind_addr = parse_bind_addr("GAME_MANAGER_BIND", "0.0.0.0:8081")?;
    info!(%bind_addr, "game-manager-service listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v2/games", post(create_game_handler))
        .route("/v2/games/{game_id}", get(get_game_handler))
        .route("/v2/games/{game_id}/pawns", post(add_pawn_handler))
        .route("/v2/games/{game_id}/turn", post(end_turn_handler))
        .route("/v2/games/{game_id}/turn/expire", post(expire_turn_handler))
        .route("/v2/games/{game_id}/shuffle", post(shuffle_handler))
        .route("/v2/games/{game_id}/peek", post(peek_handler))
        .route("/v2/players/{player_id}/game", get(ongoing_game_handler))
        .route("/v2/players/stats", post(player_stats_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": "game-manager-service"}))
}

async fn create_game_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, ApiError> {
    let response = use_cases::create_game(&state, request.player_ids, Utc::now()).await?;
    Ok(Json(response))
}

async fn get_game_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<GameView>, ApiError> {
    Ok(Json(use_cases::get_game(&state, &game_id).await?))
}

async fn add_pawn_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<PawnRequest>,
) -> Result<Json<AddPawnResult>, ApiError> {
    Ok(Json(
        use_cases::add_pawn(&state, &game_id, request, Utc::now()).await?,
    ))
}

async fn end_turn_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<PlayerRequest>,
) -> Result<Json<EndTurnResult>, ApiError> {
    Ok(Json(
        use_cases::end_turn(&state, &game_id, &request.player_id, Utc::now()).await?,
    ))
}

async fn expire_turn_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<ExpireTurnRequest>,
) -> Result<Json<EndTurnResult>, ApiError> {
    Ok(Json(
        use_cases::expire_turn(&state, &game_id, request, Utc::now()).await?,
    ))
}

async fn shuffle_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<ShuffleRequest>,
) -> Result<Json<ShuffleResult>, ApiError> {
    Ok(Json(
        use_cases::shuffle(&state, &game_id, request, Utc::now()).await?,
    ))
}

async fn peek_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<PawnRequest>,
) -> Result<Json<PeekResult>, ApiError> {
    Ok(Json(use_cases::peek(&state, &game_id, request).await?))
}

async fn ongoing_game_handler(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<OngoingGameResponse>, ApiError> {
    Ok(Json(use_cases::ongoing_game(&state, &player_id).await?))
}

async fn player_stats_handler(
    State(state): State<AppState>,
    Json(request): Json<PlayerStatsRequest>,
) -> Result<Json<Vec<PlayerGameStats>>, ApiError> {
    Ok(Json(
        use_cases::player_stats(&state, &request.player_ids).await?,
    ))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    reason: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            message: message.into(),
        }
    }
}

impl From<UseCaseError> for ApiError {
    fn from(error: UseCaseError) -> Self {
        let message = error.to_string();
        match error {
            UseCaseError::Rule(RuleError::Decode(_)) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "DECODE_ERROR", message)
            }
            UseCaseError::Rule(rule) => Self::new(StatusCode::BAD_REQUEST, rule.code(), message),
            UseCaseError::Store(StoreError::NotFound { .. }) => {
                Self::new(StatusCode::NOT_FOUND, "GAME_NOT_FOUND", message)
            }
            UseCaseError::Store(StoreError::LockUnavailable { .. }) => {
                Self::new(StatusCode::LOCKED, "LOCK_UNAVAILABLE", message)
            }
            UseCaseError::Store(StoreError::Backend(_)) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", message)
            }
            UseCaseError::TurnAlreadyEnded { .. } => {
                Self::new(StatusCode::CONFLICT, "TURN_ALREADY_ENDED", message)
            }
            UseCaseError::NoOngoingGame { .. } => {
                Self::new(StatusCode::NOT_FOUND, "NO_ONGOING_GAME", message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(
            status = %self.status,
            reason = self.reason,
            message = %self.message,
            "request failed"
        );
        (
            self.status,
            Json(serde_json::json!({"error": self.message, "reason": self.reason})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::extract::{Path, State};
    use deflector_common::{GameEndUserUpdate, Notification, PlayerId};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingBroadcaster {
        pub(crate) sent: Mutex<Vec<(Vec<PlayerId>, Notification)>>,
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(
            &self,
            recipients: &[PlayerId],
            notification: &Notification,
        ) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipients.to_vec(), notification.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingStatsReporter {
        pub(crate) reported: Mutex<Vec<Vec<GameEndUserUpdate>>>,
    }

    #[async_trait]
    impl StatsReporter for RecordingStatsReporter {
        async fn report_game_end(&self, updates: &[GameEndUserUpdate]) -> anyhow::Result<()> {
            self.reported.lock().unwrap().push(updates.to_vec());
            Ok(())
        }
    }

    struct FailingBroadcaster;

    #[async_trait]
    impl Broadcaster for FailingBroadcaster {
        async fn broadcast(
            &self,
            _recipients: &[PlayerId],
            _notification: &Notification,
        ) -> anyhow::Result<()> {
            anyhow::bail!("realtime service unreachable")
        }
    }

    pub(crate) fn app_state_with(
        store: Arc<dyn GameStore>,
        broadcaster: Arc<dyn Broadcaster>,
        stats_reporter: Arc<dyn StatsReporter>,
    ) -> AppState {
        AppState {
            store,
            broadcaster,
            stats_reporter,
            settings: Arc::new(GameSettings::default()),
            lock_for: TimeDelta::seconds(5),
        }
    }

    pub(crate) fn app_state() -> AppState {
        app_state_with(
            Arc::new(InMemoryGameStore::default()),
            Arc::new(RecordingBroadcaster::default()),
            Arc::new(RecordingStatsReporter::default()),
        )
    }

    async fn create(state: &AppState) -> String {
        create_game_handler(
            State(state.clone()),
            Json(CreateGameRequest {
                player_ids: vec!["red".to_string(), "blue".to_string()],
            }),
        )
        .await
        .unwrap()
        .0
        .game_id
    }

    #[tokio::test]
    async fn create_then_get_returns_fresh_board_with_preview() {
        let state = app_state();
        let game_id = create(&state).await;

        let game = get_game_handler(State(state), Path(game_id.clone()))
            .await
            .unwrap()
            .0;

        assert_eq!(game.game_id, game_id);
        assert_eq!(game.player_ids, vec!["red".to_string(), "blue".to_string()]);
        assert_eq!(game.board.current_player_id.as_deref(), Some("red"));
        assert_eq!(game.board.event_count, 0);
        assert!(game.board.pawns.is_empty());
        assert_eq!(game.preview.len(), 1);
    }

    #[tokio::test]
    async fn get_game_returns_not_found_for_unknown_id() {
        let state = app_state();
        let err = get_game_handler(State(state), Path("missing-game".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.reason, "GAME_NOT_FOUND");
    }

    #[tokio::test]
    async fn create_game_with_one_player_is_bad_request() {
        let state = app_state();
        let err = create_game_handler(
            State(state),
            Json(CreateGameRequest {
                player_ids: vec!["red".to_string()],
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.reason, "INVALID_PLAYERS");
    }

    #[tokio::test]
    async fn add_pawn_returns_pawn_and_next_preview() {
        let state = app_state();
        let game_id = create(&state).await;

        let result = add_pawn_handler(
            State(state),
            Path(game_id),
            Json(PawnRequest {
                x: 2,
                y: 2,
                player_id: "red".to_string(),
            }),
        )
        .await
        .unwrap()
        .0;

        assert_eq!(result.pawn.player_owner, "red");
        assert_eq!(result.game.board.pawns, vec![result.pawn.clone()]);
        assert_eq!(result.game.board.event_count, 1);
        // The centre column always lies on the opening beam's path.
        assert!(result.game.preview.len() >= 2);
    }

    #[tokio::test]
    async fn rule_violations_map_to_reason_codes() {
        let state = app_state();
        let game_id = create(&state).await;

        let out_of_turn = add_pawn_handler(
            State(state.clone()),
            Path(game_id.clone()),
            Json(PawnRequest {
                x: 1,
                y: 1,
                player_id: "blue".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(out_of_turn.status, StatusCode::BAD_REQUEST);
        assert_eq!(out_of_turn.reason, "OUT_OF_TURN");

        let off_board = add_pawn_handler(
            State(state.clone()),
            Path(game_id.clone()),
            Json(PawnRequest {
                x: 500,
                y: 2,
                player_id: "red".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(off_board.reason, "INVALID_POSITION");

        let stale = expire_turn_handler(
            State(state),
            Path(game_id),
            Json(ExpireTurnRequest {
                player_id: "blue".to_string(),
                expected_event_count: 3,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(stale.status, StatusCode::CONFLICT);
        assert_eq!(stale.reason, "TURN_ALREADY_ENDED");
    }

    #[tokio::test]
    async fn held_lock_maps_to_locked_status() {
        let state = app_state();
        let game_id = create(&state).await;
        state
            .store
            .lock(&game_id, Utc::now(), TimeDelta::seconds(30))
            .await
            .unwrap();

        let err = end_turn_handler(
            State(state),
            Path(game_id),
            Json(PlayerRequest {
                player_id: "red".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::LOCKED);
        assert_eq!(err.reason, "LOCK_UNAVAILABLE");
    }

    #[tokio::test]
    async fn end_turn_hands_over_to_the_next_player() {
        let state = app_state();
        let game_id = create(&state).await;

        let result = end_turn_handler(
            State(state.clone()),
            Path(game_id.clone()),
            Json(PlayerRequest {
                player_id: "red".to_string(),
            }),
        )
        .await
        .unwrap()
        .0;

        assert_eq!(result.deflections.len(), 1);
        assert_eq!(result.winner, None);
        assert_eq!(result.game.board.current_player_id.as_deref(), Some("blue"));
        assert_eq!(result.game.board.turn, 1);

        let ongoing = ongoing_game_handler(State(state), Path("blue".to_string()))
            .await
            .unwrap()
            .0;
        assert_eq!(ongoing.game_id, game_id);
    }

    #[tokio::test]
    async fn broadcast_failures_do_not_fail_the_command() {
        let state = app_state_with(
            Arc::new(InMemoryGameStore::default()),
            Arc::new(FailingBroadcaster),
            Arc::new(RecordingStatsReporter::default()),
        );
        let game_id = create(&state).await;

        let result = shuffle_handler(
            State(state),
            Path(game_id),
            Json(ShuffleRequest {
                player_id: "red".to_string(),
                peek: None,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(result.available_shuffles, 0);
    }

    #[tokio::test]
    async fn unknown_player_has_no_ongoing_game() {
        let state = app_state();
        let err = ongoing_game_handler(State(state), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.reason, "NO_ONGOING_GAME");
    }

    #[tokio::test]
    async fn stats_count_only_finished_games() {
        let state = app_state();
        create(&state).await;

        let stats = player_stats_handler(
            State(state),
            Json(PlayerStatsRequest {
                player_ids: vec!["red".to_string()],
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(
            stats,
            vec![PlayerGameStats {
                player_id: "red".to_string(),
                games_played: 0,
                wins: 0,
            }]
        );
    }
}
