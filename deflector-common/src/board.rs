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

//! Working game state rebuilt by replaying the event log.
//!
//! Nothing here is persisted: a [`ProcessedBoard`] is derived from a
//! [`GameDefinition`] on every read or write and dropped afterwards.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_PAWN_DURABILITY, DEFAULT_SHUFFLES_PER_TURN, DEFAULT_STARTING_SCORE,
    DEFAULT_TARGET_SCORE, DEFAULT_TURN_SECONDS, DEFAULT_X_MAX, DEFAULT_Y_MAX, Deflection,
    Direction, GameEvent, Grid, NUM_PLAYERS, Orientation, Pawn, PlayerId, Position, RuleError,
    RuleResult,
    variance::{pawn_variants, player_variant_key},
};

/// Tunables that change how events resolve. Stored with each game so replay
/// does not depend on the current service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Ruleset {
    pub pawn_durability: u32,
    pub shuffles_per_turn: u32,
    pub starting_score: u32,
    pub enforce_turn_order: bool,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            pawn_durability: DEFAULT_PAWN_DURABILITY,
            shuffles_per_turn: DEFAULT_SHUFFLES_PER_TURN,
            starting_score: DEFAULT_STARTING_SCORE,
            enforce_turn_order: true,
        }
    }
}

/// Everything persisted about a game. The event log is the only history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDefinition {
    pub game_id: String,
    /// Turn order. Index 0 scores on the left edge, index 1 on the right.
    pub player_ids: Vec<PlayerId>,
    pub x_max: i32,
    pub y_max: i32,
    pub target_score: u32,
    pub turn_seconds: u64,
    pub start_time: DateTime<Utc>,
    pub ruleset: Ruleset,
    pub events: Vec<GameEvent>,
}

impl GameDefinition {
    pub fn new(
        game_id: impl Into<String>,
        player_ids: Vec<PlayerId>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            player_ids,
            x_max: DEFAULT_X_MAX,
            y_max: DEFAULT_Y_MAX,
            target_score: DEFAULT_TARGET_SCORE,
            turn_seconds: DEFAULT_TURN_SECONDS,
            start_time,
            ruleset: Ruleset::default(),
            events: Vec::new(),
        }
    }

    /// A game is played by exactly two distinct players.
    pub fn validate_players(player_ids: &[PlayerId]) -> RuleResult<()> {
        let distinct = player_ids
            .iter()
            .enumerate()
            .all(|(index, id)| !player_ids[..index].contains(id));
        if player_ids.len() != NUM_PLAYERS || !distinct {
            return Err(RuleError::InvalidPlayers {
                expected: NUM_PLAYERS,
                actual: player_ids.len(),
            });
        }
        Ok(())
    }
}

/// Per-player slice of the working state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStanding {
    pub player_id: PlayerId,
    pub score: u32,
    pub match_point: bool,
    pub available_shuffles: u32,
    /// Deterministic orientation queue; the last entry is placed next.
    pub variants: Vec<Orientation>,
}

impl PlayerStanding {
    pub fn next_variant(&self) -> Option<Orientation> {
        self.variants.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedBoard {
    pub(crate) definition: GameDefinition,
    pub(crate) grid: Grid,
    pub(crate) turn: u32,
    pub(crate) players: Vec<PlayerStanding>,
    pub(crate) last_deflections: Vec<Deflection>,
    pub(crate) winner: Option<PlayerId>,
    pub(crate) last_turn_end: DateTime<Utc>,
}

impl ProcessedBoard {
    /// Rebuilds working state by applying the whole log to an empty grid.
    pub fn replay(definition: &GameDefinition) -> RuleResult<Self> {
        let mut board = Self::empty(definition);
        board.process(definition.events.iter().cloned())?;
        Ok(board)
    }

    fn empty(definition: &GameDefinition) -> Self {
        let ruleset = &definition.ruleset;
        let players = definition
            .player_ids
            .iter()
            .map(|player_id| PlayerStanding {
                player_id: player_id.clone(),
                score: ruleset.starting_score,
                match_point: false,
                available_shuffles: ruleset.shuffles_per_turn,
                variants: pawn_variants(&player_variant_key(&definition.game_id, player_id), 1),
            })
            .collect();

        Self {
            definition: GameDefinition {
                game_id: definition.game_id.clone(),
                player_ids: definition.player_ids.clone(),
                x_max: definition.x_max,
                y_max: definition.y_max,
                target_score: definition.target_score,
                turn_seconds: definition.turn_seconds,
                start_time: definition.start_time,
                ruleset: definition.ruleset.clone(),
                events: Vec::new(),
            },
            grid: Grid::new(definition.x_max, definition.y_max),
            turn: 0,
            players,
            last_deflections: Vec::new(),
            winner: None,
            last_turn_end: definition.start_time,
        }
    }

    /// Applies `events` in order and appends them to the log.
    ///
    /// All-or-nothing: if any event is rejected the board is left untouched.
    pub fn process(&mut self, events: impl IntoIterator<Item = GameEvent>) -> RuleResult<()> {
        let mut staged = self.clone();
        for event in events {
            event.apply(&mut staged)?;
            staged.definition.events.push(event);
        }
        *self = staged;
        Ok(())
    }

    /// Trace of the beam the next fire would produce, without keeping it.
    pub fn preview(&self) -> RuleResult<Vec<Deflection>> {
        let mut scratch = self.clone();
        scratch.process([GameEvent::fire()])?;
        Ok(scratch.last_deflections)
    }

    /// Places `player_id`'s next pawn at `position` on a scratch copy and
    /// returns that pawn with the trace the following fire would produce.
    pub fn peek(&self, position: Position, player_id: &str) -> RuleResult<(Pawn, Vec<Deflection>)> {
        let mut scratch = self.clone();
        scratch.process([GameEvent::create_pawn(position, player_id)])?;
        let pawn = scratch
            .grid
            .get(position)
            .cloned()
            .ok_or(RuleError::InvalidPosition { position })?;
        let trace = scratch.preview()?;
        Ok((pawn, trace))
    }

    pub fn definition(&self) -> &GameDefinition {
        &self.definition
    }

    pub fn game_id(&self) -> &str {
        &self.definition.game_id
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.definition.events
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn players(&self) -> &[PlayerStanding] {
        &self.players
    }

    pub fn standing(&self, player_id: &str) -> Option<&PlayerStanding> {
        self.players
            .iter()
            .find(|standing| standing.player_id == player_id)
    }

    pub(crate) fn require_standing(&self, player_id: &str) -> RuleResult<&PlayerStanding> {
        self.standing(player_id)
            .ok_or_else(|| RuleError::UnknownPlayer {
                player_id: player_id.to_string(),
            })
    }

    pub(crate) fn require_standing_mut(
        &mut self,
        player_id: &str,
    ) -> RuleResult<&mut PlayerStanding> {
        self.players
            .iter_mut()
            .find(|standing| standing.player_id == player_id)
            .ok_or_else(|| RuleError::UnknownPlayer {
                player_id: player_id.to_string(),
            })
    }

    /// Player holding the current turn, alternating in definition order.
    pub fn player_turn(&self) -> Option<&PlayerId> {
        let count = self.definition.player_ids.len();
        if count == 0 {
            return None;
        }
        self.definition
            .player_ids
            .get(self.turn as usize % count)
    }

    /// Player who scores when a beam leaves through `direction`.
    pub fn player_for_direction(&self, direction: Direction) -> Option<&PlayerId> {
        let index = match direction {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Up | Direction::Down => return None,
        };
        self.definition.player_ids.get(index)
    }

    /// Exit edge that scores for `player_id`.
    pub fn scoring_direction(&self, player_id: &str) -> Option<Direction> {
        match self
            .definition
            .player_ids
            .iter()
            .position(|id| id == player_id)
        {
            Some(0) => Some(Direction::Left),
            Some(1) => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn score(&self, player_id: &str) -> u32 {
        self.standing(player_id)
            .map(|standing| standing.score)
            .unwrap_or_default()
    }

    pub fn match_point_players(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|standing| standing.match_point)
            .map(|standing| standing.player_id.clone())
            .collect()
    }

    /// Players who reached the target score but are not flagged yet.
    pub fn pending_match_points(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|standing| {
                !standing.match_point && standing.score >= self.definition.target_score
            })
            .map(|standing| standing.player_id.clone())
            .collect()
    }

    pub fn last_deflections(&self) -> &[Deflection] {
        &self.last_deflections
    }

    pub fn winner(&self) -> Option<&PlayerId> {
        self.winner.as_ref()
    }

    pub fn in_progress(&self) -> bool {
        self.winner.is_none()
    }

    pub fn last_turn_end(&self) -> DateTime<Utc> {
        self.last_turn_end
    }

    /// The current player has used up the per-turn time budget.
    pub fn turn_expired(&self, now: DateTime<Utc>) -> bool {
        let budget = i64::try_from(self.definition.turn_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.last_turn_end) > budget
    }

    pub(crate) fn ensure_in_progress(&self) -> RuleResult<()> {
        if self.in_progress() {
            Ok(())
        } else {
            Err(RuleError::GameFinished)
        }
    }

    pub(crate) fn ensure_turn(&self, player_id: &str) -> RuleResult<()> {
        match self.player_turn() {
            Some(current) if current == player_id => Ok(()),
            _ => Err(RuleError::OutOfTurn {
                player_id: player_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn definition(events: Vec<GameEvent>) -> GameDefinition {
        GameDefinition {
            events,
            ..GameDefinition::new(
                "replay-game",
                vec!["red".to_string(), "blue".to_string()],
                DateTime::<Utc>::UNIX_EPOCH,
            )
        }
    }

    #[test]
    fn empty_log_yields_fresh_state() {
        let board = ProcessedBoard::replay(&definition(Vec::new())).unwrap();
        assert_eq!(board.turn(), 0);
        assert_eq!(board.grid().pawn_count(), 0);
        assert_eq!(board.player_turn().map(String::as_str), Some("red"));
        assert!(board.in_progress());
        for standing in board.players() {
            assert_eq!(standing.score, DEFAULT_STARTING_SCORE);
            assert_eq!(standing.available_shuffles, DEFAULT_SHUFFLES_PER_TURN);
            assert_eq!(standing.variants.len(), 1);
        }
    }

    #[test]
    fn validate_players_requires_two_distinct_ids() {
        let ok = vec!["a".to_string(), "b".to_string()];
        assert!(GameDefinition::validate_players(&ok).is_ok());

        let same = vec!["a".to_string(), "a".to_string()];
        assert!(matches!(
            GameDefinition::validate_players(&same),
            Err(RuleError::InvalidPlayers { .. })
        ));

        let three = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(
            GameDefinition::validate_players(&three),
            Err(RuleError::InvalidPlayers {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn process_is_all_or_nothing() {
        let mut board = ProcessedBoard::replay(&definition(Vec::new())).unwrap();
        let before = board.clone();

        let err = board
            .process([
                GameEvent::create_pawn(Position::new(1, 1), "red"),
                GameEvent::create_pawn(Position::new(2, 2), "red"),
            ])
            .unwrap_err();

        assert!(matches!(err, RuleError::OutOfScore { .. }));
        assert_eq!(board, before);
    }

    #[test]
    fn left_and_right_edges_belong_to_the_players_in_order() {
        let board = ProcessedBoard::replay(&definition(Vec::new())).unwrap();
        assert_eq!(
            board.player_for_direction(Direction::Left).map(String::as_str),
            Some("red")
        );
        assert_eq!(
            board
                .player_for_direction(Direction::Right)
                .map(String::as_str),
            Some("blue")
        );
        assert_eq!(board.player_for_direction(Direction::Up), None);
        assert_eq!(board.player_for_direction(Direction::Down), None);
    }

    #[test]
    fn preview_leaves_the_board_untouched() {
        let mut board = ProcessedBoard::replay(&definition(Vec::new())).unwrap();
        board
            .process([GameEvent::create_pawn(Position::new(2, 2), "red")])
            .unwrap();
        let before = board.clone();

        let first = board.preview().unwrap();
        let second = board.preview().unwrap();

        assert_eq!(first, second);
        assert_eq!(board, before);
    }

    #[test]
    fn peek_shows_the_next_pawn_without_placing_it() {
        let board = ProcessedBoard::replay(&definition(Vec::new())).unwrap();
        let expected = board.standing("red").unwrap().next_variant();

        let (pawn, trace) = board.peek(Position::new(2, 2), "red").unwrap();

        assert_eq!(Some(pawn.orientation), expected);
        assert_eq!(pawn.position, Position::new(2, 2));
        assert!(trace.len() >= 2);
        assert_eq!(board.grid().pawn_count(), 0);
        assert!(board.events().is_empty());
    }

    #[test]
    fn turn_expiry_uses_last_turn_end() {
        let board = ProcessedBoard::replay(&definition(Vec::new())).unwrap();
        let start = board.last_turn_end();
        assert!(!board.turn_expired(start + TimeDelta::seconds(DEFAULT_TURN_SECONDS as i64)));
        assert!(board.turn_expired(start + TimeDelta::seconds(DEFAULT_TURN_SECONDS as i64 + 1)));
    }

    #[derive(Debug, Clone)]
    enum Action {
        Place(i32, i32),
        Shuffle,
        EndTurn,
        Fire,
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            (0..5, 0..5).prop_map(|(x, y)| Action::Place(x, y)),
            Just(Action::Shuffle),
            Just(Action::EndTurn),
            Just(Action::Fire),
        ]
    }

    proptest! {
        #[test]
        fn replaying_the_log_rebuilds_identical_state(actions in prop::collection::vec(action(), 0..40)) {
            let mut board = ProcessedBoard::replay(&definition(Vec::new())).unwrap();
            let mut clock = DateTime::<Utc>::UNIX_EPOCH;

            for action in actions {
                let Some(current) = board.player_turn().cloned() else {
                    break;
                };
                clock += TimeDelta::seconds(7);
                let event = match action {
                    Action::Place(x, y) => GameEvent::create_pawn(Position::new(x, y), current),
                    Action::Shuffle => GameEvent::skip_pawn(current),
                    Action::EndTurn => GameEvent::end_turn(current, clock),
                    Action::Fire => GameEvent::fire(),
                };
                // Rejected actions leave no trace in the log.
                let _ = board.process([event]);
            }

            let first = ProcessedBoard::replay(board.definition()).unwrap();
            let second = ProcessedBoard::replay(board.definition()).unwrap();
            prop_assert_eq!(&first, &board);
            prop_assert_eq!(&first, &second);
        }
    }
}
