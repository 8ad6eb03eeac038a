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

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod board;
pub mod deflection;
pub mod error;
pub mod event;
pub mod grid;
pub mod pawn;
pub mod position;
pub mod turn;
pub mod variance;

pub use board::{GameDefinition, PlayerStanding, ProcessedBoard, Ruleset};
pub use deflection::{Deflection, DeflectionEvent, DeflectionEventKind};
pub use error::{RuleError, RuleResult};
pub use event::{EventRecord, GameEvent};
pub use grid::Grid;
pub use pawn::{Orientation, Pawn};
pub use position::{DirectedPosition, Direction, Position};
pub use turn::TurnOutcome;

pub const NUM_PLAYERS: usize = 2;
pub const DEFAULT_X_MAX: i32 = 4;
pub const DEFAULT_Y_MAX: i32 = 4;
pub const DEFAULT_TARGET_SCORE: u32 = 5;
pub const DEFAULT_TURN_SECONDS: u64 = 60;
pub const DEFAULT_PAWN_DURABILITY: u32 = 5;
pub const DEFAULT_SHUFFLES_PER_TURN: u32 = 1;
pub const DEFAULT_STARTING_SCORE: u32 = 1;
pub const DEFAULT_LOCK_SECONDS: u64 = 5;

pub type PlayerId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub player_ids: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub game_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpireTurnRequest {
    pub player_id: PlayerId,
    /// Log length the client saw when it decided the turn had run out.
    pub expected_event_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PawnRequest {
    pub x: i32,
    pub y: i32,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuffleRequest {
    pub player_id: PlayerId,
    /// When present, the response also shows the reshuffled pawn at this cell.
    #[serde(default)]
    pub peek: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatsRequest {
    pub player_ids: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OngoingGameResponse {
    pub game_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub score: u32,
    pub match_point: bool,
    pub available_shuffles: u32,
    pub next_variant: Option<Orientation>,
    pub scoring_direction: Option<Direction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardView {
    pub x_max: i32,
    pub y_max: i32,
    pub pawns: Vec<Pawn>,
    pub turn: u32,
    pub current_player_id: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub winner: Option<PlayerId>,
    pub last_deflections: Vec<Deflection>,
    pub last_turn_end: DateTime<Utc>,
    /// Length of the event log, echoed back by turn-expiry requests.
    pub event_count: usize,
}

impl BoardView {
    pub fn from_board(board: &ProcessedBoard) -> Self {
        let players = board
            .players()
            .iter()
            .map(|standing| PlayerView {
                player_id: standing.player_id.clone(),
                score: standing.score,
                match_point: standing.match_point,
                available_shuffles: standing.available_shuffles,
                next_variant: standing.next_variant(),
                scoring_direction: board.scoring_direction(&standing.player_id),
            })
            .collect();

        Self {
            x_max: board.grid().x_max(),
            y_max: board.grid().y_max(),
            pawns: board.grid().pawns().cloned().collect(),
            turn: board.turn(),
            current_player_id: board.player_turn().cloned(),
            players,
            winner: board.winner().cloned(),
            last_deflections: board.last_deflections().to_vec(),
            last_turn_end: board.last_turn_end(),
            event_count: board.events().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameView {
    pub game_id: String,
    pub player_ids: Vec<PlayerId>,
    pub target_score: u32,
    pub turn_seconds: u64,
    pub start_time: DateTime<Utc>,
    pub board: BoardView,
    /// Trace of the beam that will be fired at the end of the current turn.
    pub preview: Vec<Deflection>,
}

impl GameView {
    pub fn from_board(board: &ProcessedBoard) -> RuleResult<Self> {
        let definition = board.definition();
        Ok(Self {
            game_id: definition.game_id.clone(),
            player_ids: definition.player_ids.clone(),
            target_score: definition.target_score,
            turn_seconds: definition.turn_seconds,
            start_time: definition.start_time,
            board: BoardView::from_board(board),
            preview: board.preview()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddPawnResult {
    pub pawn: Pawn,
    pub game: GameView,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndTurnResult {
    pub deflections: Vec<Vec<Deflection>>,
    pub winner: Option<PlayerId>,
    pub new_match_points: Vec<PlayerId>,
    pub game: GameView,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeekResult {
    pub pawn: Pawn,
    pub deflections: Vec<Deflection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShuffleResult {
    pub player_id: PlayerId,
    pub variants: Vec<Orientation>,
    pub available_shuffles: u32,
    pub peek: Option<PeekResult>,
    pub game: GameView,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Pawn,
    Turn,
    Shuffle,
    Peek,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Pawn => "pawn",
            NotificationKind::Turn => "turn",
            NotificationKind::Shuffle => "shuffle",
            NotificationKind::Peek => "peek",
        }
    }
}

/// Body pushed to the realtime service for each recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub event: NotificationKind,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEndUserUpdate {
    pub player_id: PlayerId,
    pub games_played_delta: u32,
    pub wins_delta: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStatsUpdate {
    pub updates: Vec<GameEndUserUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerGameStats {
    pub player_id: PlayerId,
    pub games_played: u32,
    pub wins: u32,
}

/// Stats deltas for every player of a finished game.
pub fn game_end_updates(player_ids: &[PlayerId], winner: &str) -> Vec<GameEndUserUpdate> {
    player_ids
        .iter()
        .map(|player_id| GameEndUserUpdate {
            player_id: player_id.clone(),
            games_played_delta: 1,
            wins_delta: u32::from(player_id == winner),
        })
        .collect()
}

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let Ok(re) = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}") else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> ProcessedBoard {
        ProcessedBoard::replay(&GameDefinition::new(
            "view-game",
            vec!["red".to_string(), "blue".to_string()],
            DateTime::<Utc>::UNIX_EPOCH,
        ))
        .unwrap()
    }

    #[test]
    fn game_view_reports_turn_and_edges() {
        let mut board = board();
        board
            .process([GameEvent::create_pawn(Position::new(2, 2), "red")])
            .unwrap();

        let view = GameView::from_board(&board).unwrap();

        assert_eq!(view.board.current_player_id.as_deref(), Some("red"));
        assert_eq!(view.board.event_count, 1);
        assert_eq!(view.board.pawns.len(), 1);
        assert_eq!(view.board.players[0].scoring_direction, Some(Direction::Left));
        assert_eq!(view.board.players[1].scoring_direction, Some(Direction::Right));
        assert_eq!(view.preview, board.preview().unwrap());
        assert!(view.preview.len() >= 2);
    }

    #[test]
    fn game_view_serializes_with_snake_case_enums() {
        let view = GameView::from_board(&board()).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        let direction = &json["board"]["players"][0]["scoring_direction"];
        assert_eq!(direction, "left");
        assert!(json["preview"].is_array());
    }

    #[test]
    fn notification_kind_names_match_wire_values() {
        for kind in [
            NotificationKind::Pawn,
            NotificationKind::Turn,
            NotificationKind::Shuffle,
            NotificationKind::Peek,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn game_end_updates_credit_only_the_winner() {
        let players = vec!["red".to_string(), "blue".to_string()];
        let updates = game_end_updates(&players, "blue");
        assert_eq!(
            updates,
            vec![
                GameEndUserUpdate {
                    player_id: "red".to_string(),
                    games_played_delta: 1,
                    wins_delta: 0,
                },
                GameEndUserUpdate {
                    player_id: "blue".to_string(),
                    games_played_delta: 1,
                    wins_delta: 1,
                },
            ]
        );
    }

    #[test]
    fn expand_env_vars_substitutes_and_blanks_unknowns() {
        // SAFETY: test-only mutation of a variable no other test reads.
        unsafe { std::env::set_var("DEFLECTOR_TEST_TARGET", "7") };
        let expanded = expand_env_vars("target: ${DEFLECTOR_TEST_TARGET}\nx: ${DEFLECTOR_UNSET_VAR}");
        assert_eq!(expanded, "target: 7\nx: ");
        assert_eq!(expand_env_vars("no placeholders"), "no placeholders");
    }
}
