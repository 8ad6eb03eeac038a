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

//! Rule violations raised while applying or decoding game events.

use thiserror::Error;

use crate::{PlayerId, Position};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("player {player_id} does not hold the turn")]
    OutOfTurn { player_id: PlayerId },

    #[error("player {player_id} has no score left to spend on a pawn")]
    OutOfScore { player_id: PlayerId },

    #[error("player {player_id} has no shuffles left this turn")]
    OutOfShuffles { player_id: PlayerId },

    #[error("position ({}, {}) is outside the board", .position.x, .position.y)]
    InvalidPosition { position: Position },

    #[error("player {player_id} is not part of this game")]
    UnknownPlayer { player_id: PlayerId },

    #[error("a game needs exactly {expected} distinct players, got {actual}")]
    InvalidPlayers { expected: usize, actual: usize },

    #[error("game already has a winner")]
    GameFinished,

    #[error("cannot decode event record: {0}")]
    Decode(String),
}

impl RuleError {
    /// Stable machine-readable reason, surfaced to clients next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            RuleError::OutOfTurn { .. } => "OUT_OF_TURN",
            RuleError::OutOfScore { .. } => "OUT_OF_SCORE",
            RuleError::OutOfShuffles { .. } => "OUT_OF_SHUFFLES",
            RuleError::InvalidPosition { .. } => "INVALID_POSITION",
            RuleError::UnknownPlayer { .. } => "UNKNOWN_PLAYER",
            RuleError::InvalidPlayers { .. } => "INVALID_PLAYERS",
            RuleError::GameFinished => "GAME_FINISHED",
            RuleError::Decode(_) => "DECODE_ERROR",
        }
    }
}

pub type RuleResult<T> = std::result::Result<T, RuleError>;
