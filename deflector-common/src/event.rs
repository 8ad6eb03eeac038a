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

//! Game events: the persisted log entries and how each one changes a board.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    DirectedPosition, Direction, Pawn, PlayerId, Position, ProcessedBoard, RuleError,
    RuleResult,
    deflection::{bounce_cap, exit_direction, fire_beam},
    variance::{deflection_source, pawn_variants, player_variant_key},
};

pub const CREATE_PAWN: &str = "create_pawn";
pub const FIRE_DEFLECTOR: &str = "fire_deflector";
pub const SKIP_PAWN: &str = "skip_pawn";
pub const END_TURN: &str = "end_turn";
pub const MATCH_POINT: &str = "match_point";
pub const GAME_WIN: &str = "win";

/// Flat key/value form an event takes in storage.
pub type EventRecord = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    CreatePawn {
        position: Position,
        player_owner: PlayerId,
    },
    /// Fires a beam. Without an explicit source the origin is derived from
    /// the game id and the turn number.
    FireDeflector {
        source: Option<DirectedPosition>,
    },
    SkipPawn {
        player_owner: PlayerId,
    },
    EndTurn {
        player_owner: PlayerId,
        ended_at: DateTime<Utc>,
    },
    MatchPoint {
        player_owner: PlayerId,
    },
    Win {
        player_owner: PlayerId,
    },
}

impl GameEvent {
    pub fn create_pawn(position: Position, player_owner: impl Into<PlayerId>) -> Self {
        Self::CreatePawn {
            position,
            player_owner: player_owner.into(),
        }
    }

    pub fn fire() -> Self {
        Self::FireDeflector { source: None }
    }

    pub fn fire_from(source: DirectedPosition) -> Self {
        Self::FireDeflector {
            source: Some(source),
        }
    }

    pub fn skip_pawn(player_owner: impl Into<PlayerId>) -> Self {
        Self::SkipPawn {
            player_owner: player_owner.into(),
        }
    }

    pub fn end_turn(player_owner: impl Into<PlayerId>, ended_at: DateTime<Utc>) -> Self {
        Self::EndTurn {
            player_owner: player_owner.into(),
            ended_at,
        }
    }

    pub fn match_point(player_owner: impl Into<PlayerId>) -> Self {
        Self::MatchPoint {
            player_owner: player_owner.into(),
        }
    }

    pub fn win(player_owner: impl Into<PlayerId>) -> Self {
        Self::Win {
            player_owner: player_owner.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::CreatePawn { .. } => CREATE_PAWN,
            GameEvent::FireDeflector { .. } => FIRE_DEFLECTOR,
            GameEvent::SkipPawn { .. } => SKIP_PAWN,
            GameEvent::EndTurn { .. } => END_TURN,
            GameEvent::MatchPoint { .. } => MATCH_POINT,
            GameEvent::Win { .. } => GAME_WIN,
        }
    }

    pub fn player_owner(&self) -> Option<&PlayerId> {
        match self {
            GameEvent::CreatePawn { player_owner, .. }
            | GameEvent::SkipPawn { player_owner }
            | GameEvent::EndTurn { player_owner, .. }
            | GameEvent::MatchPoint { player_owner }
            | GameEvent::Win { player_owner } => Some(player_owner),
            GameEvent::FireDeflector { .. } => None,
        }
    }

    pub fn encode(&self) -> EventRecord {
        let mut record = EventRecord::new();
        record.insert("name".to_string(), Value::from(self.name()));
        match self {
            GameEvent::CreatePawn {
                position,
                player_owner,
            } => {
                record.insert("position_x".to_string(), Value::from(position.x));
                record.insert("position_y".to_string(), Value::from(position.y));
                record.insert("playerOwner".to_string(), Value::from(player_owner.as_str()));
            }
            GameEvent::FireDeflector { source } => {
                if let Some(source) = source {
                    record.insert("source_x".to_string(), Value::from(source.position.x));
                    record.insert("source_y".to_string(), Value::from(source.position.y));
                    record.insert(
                        "source_direction".to_string(),
                        Value::from(source.direction.as_str()),
                    );
                }
            }
            GameEvent::EndTurn {
                player_owner,
                ended_at,
            } => {
                record.insert("playerOwner".to_string(), Value::from(player_owner.as_str()));
                record.insert("endedAt".to_string(), Value::from(ended_at.timestamp_millis()));
            }
            GameEvent::SkipPawn { player_owner }
            | GameEvent::MatchPoint { player_owner }
            | GameEvent::Win { player_owner } => {
                record.insert("playerOwner".to_string(), Value::from(player_owner.as_str()));
            }
        }
        record
    }

    pub fn decode(record: &EventRecord) -> RuleResult<Self> {
        let name = text_field(record, "name")?;
        let event = match name {
            CREATE_PAWN => GameEvent::CreatePawn {
                position: Position::new(
                    int_field(record, "position_x")?,
                    int_field(record, "position_y")?,
                ),
                player_owner: owner_field(record)?,
            },
            FIRE_DEFLECTOR => {
                let source = if record.contains_key("source_x") {
                    let direction = text_field(record, "source_direction")?;
                    let direction = Direction::parse(direction).ok_or_else(|| {
                        RuleError::Decode(format!("unknown direction {direction:?}"))
                    })?;
                    Some(DirectedPosition::new(
                        Position::new(int_field(record, "source_x")?, int_field(record, "source_y")?),
                        direction,
                    ))
                } else {
                    None
                };
                GameEvent::FireDeflector { source }
            }
            SKIP_PAWN => GameEvent::SkipPawn {
                player_owner: owner_field(record)?,
            },
            END_TURN => {
                let millis = record
                    .get("endedAt")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| missing("endedAt"))?;
                let ended_at = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    RuleError::Decode(format!("endedAt out of range: {millis}"))
                })?;
                GameEvent::EndTurn {
                    player_owner: owner_field(record)?,
                    ended_at,
                }
            }
            MATCH_POINT => GameEvent::MatchPoint {
                player_owner: owner_field(record)?,
            },
            GAME_WIN => GameEvent::Win {
                player_owner: owner_field(record)?,
            },
            other => return Err(RuleError::Decode(format!("unknown event name {other:?}"))),
        };
        Ok(event)
    }

    /// Applies the event to `board`. Preconditions are checked before any
    /// state changes, so a rejected event leaves the board as it was.
    pub fn apply(&self, board: &mut ProcessedBoard) -> RuleResult<()> {
        match self {
            GameEvent::CreatePawn {
                position,
                player_owner,
            } => create_pawn(board, *position, player_owner),
            GameEvent::FireDeflector { source } => fire_deflector(board, *source),
            GameEvent::SkipPawn { player_owner } => skip_pawn(board, player_owner),
            GameEvent::EndTurn {
                player_owner,
                ended_at,
            } => end_turn(board, player_owner, *ended_at),
            GameEvent::MatchPoint { player_owner } => {
                board.require_standing_mut(player_owner)?.match_point = true;
                Ok(())
            }
            GameEvent::Win { player_owner } => {
                board.require_standing(player_owner)?;
                board.winner = Some(player_owner.clone());
                Ok(())
            }
        }
    }
}

fn missing(key: &str) -> RuleError {
    RuleError::Decode(format!("missing or malformed field {key:?}"))
}

fn text_field<'a>(record: &'a EventRecord, key: &str) -> RuleResult<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(key))
}

fn int_field(record: &EventRecord, key: &str) -> RuleResult<i32> {
    record
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|value| i32::try_from(value).ok())
        .ok_or_else(|| missing(key))
}

fn owner_field(record: &EventRecord) -> RuleResult<PlayerId> {
    text_field(record, "playerOwner").map(str::to_string)
}

fn create_pawn(board: &mut ProcessedBoard, position: Position, player_owner: &str) -> RuleResult<()> {
    board.ensure_in_progress()?;
    let standing = board.require_standing(player_owner)?;
    if board.definition.ruleset.enforce_turn_order {
        board.ensure_turn(player_owner)?;
    }
    if !board.grid.contains(position) {
        return Err(RuleError::InvalidPosition { position });
    }
    if standing.score == 0 {
        return Err(RuleError::OutOfScore {
            player_id: player_owner.to_string(),
        });
    }

    let key = player_variant_key(&board.definition.game_id, player_owner);
    let orientation = standing
        .next_variant()
        .unwrap_or_else(|| pawn_variants(&key, 1)[0]);
    let queue_len = standing.variants.len();

    board.grid.place(Pawn::new(
        position,
        orientation,
        board.definition.ruleset.pawn_durability,
        player_owner,
        board.turn,
    ))?;

    let standing = board.require_standing_mut(player_owner)?;
    standing.score -= 1;
    standing.variants = pawn_variants(&key, queue_len + 1);
    Ok(())
}

fn fire_deflector(board: &mut ProcessedBoard, source: Option<DirectedPosition>) -> RuleResult<()> {
    let source = source.unwrap_or_else(|| {
        deflection_source(
            &board.definition.game_id,
            board.turn,
            board.grid.x_max(),
            board.grid.y_max(),
        )
    });
    let cap = bounce_cap(board.definition.events.len());
    let trace = fire_beam(&mut board.grid, source, cap);

    let scorer = exit_direction(&trace)
        .and_then(|direction| board.player_for_direction(direction))
        .cloned();
    if let Some(scorer) = scorer {
        board.require_standing_mut(&scorer)?.score += 1;
    }
    board.last_deflections = trace;
    Ok(())
}

fn skip_pawn(board: &mut ProcessedBoard, player_owner: &str) -> RuleResult<()> {
    board.ensure_in_progress()?;
    let standing = board.require_standing(player_owner)?;
    if board.definition.ruleset.enforce_turn_order {
        board.ensure_turn(player_owner)?;
    }
    if standing.available_shuffles == 0 {
        return Err(RuleError::OutOfShuffles {
            player_id: player_owner.to_string(),
        });
    }

    let key = player_variant_key(&board.definition.game_id, player_owner);
    let standing = board.require_standing_mut(player_owner)?;
    standing.available_shuffles -= 1;
    standing.variants = pawn_variants(&key, standing.variants.len() + 1);
    Ok(())
}

fn end_turn(board: &mut ProcessedBoard, player_owner: &str, ended_at: DateTime<Utc>) -> RuleResult<()> {
    board.ensure_in_progress()?;
    board.require_standing(player_owner)?;
    board.ensure_turn(player_owner)?;

    board.turn += 1;
    board.last_turn_end = ended_at;

    let target = board.definition.target_score;
    let shuffles = board.definition.ruleset.shuffles_per_turn;
    if let Some(next) = board.player_turn().cloned() {
        let standing = board.require_standing_mut(&next)?;
        standing.available_shuffles = shuffles;
        if standing.score < target {
            standing.score += 1;
        }
    }
    Ok(())
}
