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

use crate::{Direction, Pawn, Position, RuleError, RuleResult};

/// Fixed `(x_max + 1) × (y_max + 1)` board holding at most one pawn per cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grid {
    x_max: i32,
    y_max: i32,
    cells: Vec<Option<Pawn>>,
}

impl Grid {
    pub fn new(x_max: i32, y_max: i32) -> Self {
        let x_max = x_max.max(0);
        let y_max = y_max.max(0);
        let capacity = ((x_max + 1) * (y_max + 1)) as usize;
        Self {
            x_max,
            y_max,
            cells: vec![None; capacity],
        }
    }

    pub fn x_max(&self) -> i32 {
        self.x_max
    }

    pub fn y_max(&self) -> i32 {
        self.y_max
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0 && position.y >= 0 && position.x <= self.x_max && position.y <= self.y_max
    }

    fn index(&self, position: Position) -> Option<usize> {
        self.contains(position)
            .then(|| (position.y * (self.x_max + 1) + position.x) as usize)
    }

    pub fn get(&self, position: Position) -> Option<&Pawn> {
        self.index(position)
            .and_then(|index| self.cells[index].as_ref())
    }

    pub fn get_mut(&mut self, position: Position) -> Option<&mut Pawn> {
        let index = self.index(position)?;
        self.cells[index].as_mut()
    }

    /// Puts `pawn` at its own position, returning whatever occupied the cell.
    pub fn place(&mut self, pawn: Pawn) -> RuleResult<Option<Pawn>> {
        let index = self.index(pawn.position).ok_or(RuleError::InvalidPosition {
            position: pawn.position,
        })?;
        Ok(self.cells[index].replace(pawn))
    }

    pub fn remove(&mut self, position: Position) -> Option<Pawn> {
        let index = self.index(position)?;
        self.cells[index].take()
    }

    pub fn pawns(&self) -> impl Iterator<Item = &Pawn> {
        self.cells.iter().flatten()
    }

    pub fn pawn_count(&self) -> usize {
        self.pawns().count()
    }

    pub fn is_full(&self) -> bool {
        self.pawn_count() == self.capacity()
    }

    /// More than half of the cells are occupied.
    pub fn is_dense(&self) -> bool {
        self.pawn_count() * 2 > self.capacity()
    }

    /// Nearest occupied cell strictly beyond `from` along `direction`.
    ///
    /// `from` may lie outside the grid, e.g. a beam origin just past an edge.
    pub fn next_pawn(&self, from: Position, direction: Direction) -> Option<Position> {
        let mut cursor = from.step(direction);
        while !self.has_passed(cursor, direction) {
            if self.get(cursor).is_some() {
                return Some(cursor);
            }
            cursor = cursor.step(direction);
        }
        None
    }

    /// Whether a beam at `position` heading `direction` can no longer enter a cell.
    fn has_passed(&self, position: Position, direction: Direction) -> bool {
        let column_outside = position.x < 0 || position.x > self.x_max;
        let row_outside = position.y < 0 || position.y > self.y_max;
        match direction {
            Direction::Up => column_outside || position.y > self.y_max,
            Direction::Down => column_outside || position.y < 0,
            Direction::Right => row_outside || position.x > self.x_max,
            Direction::Left => row_outside || position.x < 0,
        }
    }
}
