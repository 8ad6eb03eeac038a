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

//! Commands against a single game. Each one replays the stored log, applies
//! the request, and writes the whole log back while holding the game's lock.

use chrono::{DateTime, Utc};
use deflector_common::{
    AddPawnResult, CreateGameResponse, EndTurnResult, ExpireTurnRequest, GameDefinition,
    GameEvent, GameView, Notification, NotificationKind, OngoingGameResponse, PawnRequest,
    PeekResult, PlayerGameStats, PlayerId, Position, ProcessedBoard, RuleError, ShuffleRequest,
    ShuffleResult, TurnOutcome, game_end_updates, turn,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    store::{GameRecord, StoreError},
};

#[derive(Debug, Error)]
pub enum UseCaseError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("turn already ended: expected {expected} events, found {actual}")]
    TurnAlreadyEnded { expected: usize, actual: usize },

    #[error("player {player_id} has no game in progress")]
    NoOngoingGame { player_id: PlayerId },
}

pub type UseCaseResult<T> = Result<T, UseCaseError>;

pub async fn create_game(
    state: &AppState,
    player_ids: Vec<PlayerId>,
    now: DateTime<Utc>,
) -> UseCaseResult<CreateGameResponse> {
    GameDefinition::validate_players(&player_ids)?;
    let game_id = Uuid::new_v4().to_string();
    let definition = state.settings.definition(game_id.clone(), player_ids, now);
    state.store.insert(GameRecord::new(&definition)).await?;

    info!(
        game_id = %game_id,
        players = ?definition.player_ids,
        x_max = definition.x_max,
        y_max = definition.y_max,
        "created game"
    );
    Ok(CreateGameResponse { game_id })
}

pub async fn get_game(state: &AppState, game_id: &str) -> UseCaseResult<GameView> {
    let board = load_board(state, game_id).await?;
    Ok(GameView::from_board(&board)?)
}

pub async fn add_pawn(
    state: &AppState,
    game_id: &str,
    request: PawnRequest,
    now: DateTime<Utc>,
) -> UseCaseResult<AddPawnResult> {
    let position = Position::new(request.x, request.y);
    let player_id = request.player_id;

    let (board, ()) = with_locked_board(state, game_id, now, |board| {
        board.process([GameEvent::create_pawn(position, player_id.as_str())])?;
        Ok(())
    })
    .await?;

    let pawn = board
        .grid()
        .get(position)
        .cloned()
        .ok_or(RuleError::InvalidPosition { position })?;
    let result = AddPawnResult {
        pawn,
        game: GameView::from_board(&board)?,
    };

    info!(game_id = %game_id, player_id = %player_id, x = position.x, y = position.y, "placed pawn");
    notify_others(state, &board, &player_id, NotificationKind::Pawn, &result).await;
    Ok(result)
}

pub async fn end_turn(
    state: &AppState,
    game_id: &str,
    player_id: &str,
    now: DateTime<Utc>,
) -> UseCaseResult<EndTurnResult> {
    let (board, outcome) = with_locked_board(state, game_id, now, |board| {
        Ok(turn::end_turn(board, player_id, now)?)
    })
    .await?;

    finish_turn(state, &board, player_id, outcome).await
}

/// Ends a turn on behalf of a player whose opponent ran out of time, but only
/// if nothing happened since the caller last looked at the game.
pub async fn expire_turn(
    state: &AppState,
    game_id: &str,
    request: ExpireTurnRequest,
    now: DateTime<Utc>,
) -> UseCaseResult<EndTurnResult> {
    let player_id = request.player_id.as_str();
    let (board, outcome) = with_locked_board(state, game_id, now, |board| {
        let actual = board.events().len();
        if actual != request.expected_event_count {
            return Err(UseCaseError::TurnAlreadyEnded {
                expected: request.expected_event_count,
                actual,
            });
        }
        Ok(turn::end_turn(board, player_id, now)?)
    })
    .await?;

    finish_turn(state, &board, player_id, outcome).await
}

pub async fn shuffle(
    state: &AppState,
    game_id: &str,
    request: ShuffleRequest,
    now: DateTime<Utc>,
) -> UseCaseResult<ShuffleResult> {
    let player_id = request.player_id;

    let (board, peek) = with_locked_board(state, game_id, now, |board| {
        board.process([GameEvent::skip_pawn(player_id.as_str())])?;
        let peek = request
            .peek
            .map(|position| board.peek(position, &player_id))
            .transpose()?
            .map(|(pawn, deflections)| PeekResult { pawn, deflections });
        Ok(peek)
    })
    .await?;

    let standing = board.standing(&player_id).ok_or_else(|| RuleError::UnknownPlayer {
        player_id: player_id.clone(),
    })?;
    let result = ShuffleResult {
        player_id: player_id.clone(),
        variants: standing.variants.clone(),
        available_shuffles: standing.available_shuffles,
        peek,
        game: GameView::from_board(&board)?,
    };

    info!(game_id = %game_id, player_id = %player_id, "shuffled pawn");
    notify_others(state, &board, &player_id, NotificationKind::Shuffle, &result).await;
    Ok(result)
}

/// Read-only: shows where the player's next pawn would send the beam.
pub async fn peek(
    state: &AppState,
    game_id: &str,
    request: PawnRequest,
) -> UseCaseResult<PeekResult> {
    let board = load_board(state, game_id).await?;
    let (pawn, deflections) = board.peek(Position::new(request.x, request.y), &request.player_id)?;
    let result = PeekResult { pawn, deflections };

    notify_others(state, &board, &request.player_id, NotificationKind::Peek, &result).await;
    Ok(result)
}

pub async fn ongoing_game(state: &AppState, player_id: &str) -> UseCaseResult<OngoingGameResponse> {
    state
        .store
        .ongoing_game_for_player(player_id)
        .await?
        .map(|game_id| OngoingGameResponse { game_id })
        .ok_or_else(|| UseCaseError::NoOngoingGame {
            player_id: player_id.to_string(),
        })
}

pub async fn player_stats(
    state: &AppState,
    player_ids: &[PlayerId],
) -> UseCaseResult<Vec<PlayerGameStats>> {
    Ok(state.store.player_stats(player_ids).await?)
}

async fn load_board(state: &AppState, game_id: &str) -> UseCaseResult<ProcessedBoard> {
    let record = state.store.get(game_id).await?;
    Ok(ProcessedBoard::replay(&record.definition()?)?)
}

/// Runs `apply` against the replayed board while holding the game's lock.
///
/// The new log is persisted only when `apply` succeeds; any failure releases
/// the lock and leaves the stored record untouched.
async fn with_locked_board<T>(
    state: &AppState,
    game_id: &str,
    now: DateTime<Utc>,
    apply: impl FnOnce(&mut ProcessedBoard) -> UseCaseResult<T>,
) -> UseCaseResult<(ProcessedBoard, T)> {
    let record = state.store.lock(game_id, now, state.lock_for).await?;

    match replay_and_apply(&record, apply) {
        Ok((board, value)) => {
            state.store.save_and_unlock(record.updated_from(&board)).await?;
            Ok((board, value))
        }
        Err(error) => {
            if let Err(unlock_error) = state.store.unlock(game_id).await {
                warn!(game_id = %game_id, error = %unlock_error, "failed to release game lock");
            }
            Err(error)
        }
    }
}

fn replay_and_apply<T>(
    record: &GameRecord,
    apply: impl FnOnce(&mut ProcessedBoard) -> UseCaseResult<T>,
) -> UseCaseResult<(ProcessedBoard, T)> {
    let mut board = ProcessedBoard::replay(&record.definition()?)?;
    let value = apply(&mut board)?;
    Ok((board, value))
}

async fn finish_turn(
    state: &AppState,
    board: &ProcessedBoard,
    acting_player: &str,
    outcome: TurnOutcome,
) -> UseCaseResult<EndTurnResult> {
    let TurnOutcome {
        deflections,
        winner,
        new_match_points,
    } = outcome;
    let result = EndTurnResult {
        deflections,
        winner,
        new_match_points,
        game: GameView::from_board(board)?,
    };

    info!(
        game_id = %board.game_id(),
        player_id = %acting_player,
        turn = board.turn(),
        fires = result.deflections.len(),
        winner = ?result.winner,
        "ended turn"
    );
    notify_others(state, board, acting_player, NotificationKind::Turn, &result).await;

    if let Some(winner) = &result.winner {
        let updates = game_end_updates(&board.definition().player_ids, winner);
        if let Err(error) = state.stats_reporter.report_game_end(&updates).await {
            warn!(game_id = %board.game_id(), error = %error, "failed to report game stats");
        }
    }
    Ok(result)
}

async fn notify_others<T: Serialize>(
    state: &AppState,
    board: &ProcessedBoard,
    acting_player: &str,
    kind: NotificationKind,
    payload: &T,
) {
    let recipients: Vec<PlayerId> = board
        .definition()
        .player_ids
        .iter()
        .filter(|player_id| player_id.as_str() != acting_player)
        .cloned()
        .collect();
    if recipients.is_empty() {
        return;
    }

    let payload = match serde_json::to_value(payload) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(game_id = %board.game_id(), error = %error, "failed to encode notification");
            return;
        }
    };
    let notification = Notification {
        event: kind,
        payload,
    };
    if let Err(error) = state.broadcaster.broadcast(&recipients, &notification).await {
        warn!(
            game_id = %board.game_id(),
            event = kind.as_str(),
            error = %error,
            "failed to broadcast notification"
        );
    }
}
