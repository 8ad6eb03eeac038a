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

use serde::{Deserialize, Serialize};

use crate::{Direction, PlayerId, Position};

/// The two mirror shapes a pawn can take.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// `/`
    Slash,
    /// `\`
    Backslash,
}

impl Orientation {
    /// Direction a beam leaves in after bouncing off this mirror.
    pub fn deflect(self, incoming: Direction) -> Direction {
        match (self, incoming) {
            (Orientation::Backslash, Direction::Up) => Direction::Left,
            (Orientation::Backslash, Direction::Left) => Direction::Up,
            (Orientation::Backslash, Direction::Down) => Direction::Right,
            (Orientation::Backslash, Direction::Right) => Direction::Down,
            (Orientation::Slash, Direction::Up) => Direction::Right,
            (Orientation::Slash, Direction::Right) => Direction::Up,
            (Orientation::Slash, Direction::Down) => Direction::Left,
            (Orientation::Slash, Direction::Left) => Direction::Down,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Orientation::Slash => '/',
            Orientation::Backslash => '\\',
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pawn {
    pub position: Position,
    pub orientation: Orientation,
    pub durability: u32,
    pub player_owner: PlayerId,
    pub turn_placed: u32,
}

impl Pawn {
    pub fn new(
        position: Position,
        orientation: Orientation,
        durability: u32,
        player_owner: impl Into<PlayerId>,
        turn_placed: u32,
    ) -> Self {
        Self {
            position,
            orientation,
            durability,
            player_owner: player_owner.into(),
            turn_placed,
        }
    }

    /// Registers one beam hit. Returns `true` once the pawn is worn out.
    pub fn hit(&mut self) -> bool {
        self.durability = self.durability.saturating_sub(1);
        self.durability == 0
    }
}
