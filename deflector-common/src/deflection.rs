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

//! Beam traversal across the grid.

use serde::{Deserialize, Serialize};

use crate::{DirectedPosition, Direction, Grid, Position};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeflectionEventKind {
    DestroyPawn,
}

/// Side effect recorded on a bounce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeflectionEvent {
    pub name: DeflectionEventKind,
    pub position: Position,
}

/// One point of a beam trace: where the beam is and where it heads next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deflection {
    pub position: Position,
    pub to_direction: Direction,
    pub events: Vec<DeflectionEvent>,
}

/// Upper bound on bounces for one fire, given how many events were replayed.
pub fn bounce_cap(event_count: usize) -> usize {
    (100 + event_count) * 2
}

/// Fires a beam from `source`, wearing down every pawn it bounces off.
///
/// The first entry of the trace is the origin itself; the final entry's
/// direction is the edge the beam leaves through. Stops silently after
/// `max_bounces` bounces.
pub fn fire_beam(grid: &mut Grid, source: DirectedPosition, max_bounces: usize) -> Vec<Deflection> {
    let mut position = source.position;
    let mut direction = source.direction;
    let mut trace = vec![Deflection {
        position,
        to_direction: direction,
        events: Vec::new(),
    }];

    for _ in 0..max_bounces {
        let Some(hit) = grid.next_pawn(position, direction) else {
            break;
        };
        let Some(pawn) = grid.get_mut(hit) else {
            break;
        };

        direction = pawn.orientation.deflect(direction);
        position = hit;
        let worn_out = pawn.hit();

        let mut events = Vec::new();
        if worn_out {
            grid.remove(hit);
            events.push(DeflectionEvent {
                name: DeflectionEventKind::DestroyPawn,
                position: hit,
            });
        }

        trace.push(Deflection {
            position,
            to_direction: direction,
            events,
        });
    }

    trace
}

/// Edge the traced beam left the grid through.
pub fn exit_direction(trace: &[Deflection]) -> Option<Direction> {
    trace.last().map(|deflection| deflection.to_direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Orientation, Pawn};

    fn grid_with(pawns: &[(i32, i32, Orientation)], durability: u32) -> Grid {
        let mut grid = Grid::new(4, 4);
        for &(x, y, orientation) in pawns {
            grid.place(Pawn::new(
                Position::new(x, y),
                orientation,
                durability,
                "red",
                0,
            ))
            .unwrap();
        }
        grid
    }

    fn up_from(x: i32, y: i32) -> DirectedPosition {
        DirectedPosition::new(Position::new(x, y), Direction::Up)
    }

    #[test]
    fn empty_board_trace_is_just_the_origin() {
        let mut grid = Grid::new(4, 4);
        let trace = fire_beam(&mut grid, up_from(2, -1), bounce_cap(0));
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].position, Position::new(2, -1));
        assert_eq!(exit_direction(&trace), Some(Direction::Up));
    }

    #[test]
    fn single_backslash_sends_beam_left() {
        let mut grid = grid_with(
            &[(1, 1, Orientation::Backslash), (1, 4, Orientation::Slash)],
            5,
        );
        let trace = fire_beam(&mut grid, up_from(1, 0), bounce_cap(0));

        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1].position, Position::new(1, 1));
        assert_eq!(exit_direction(&trace), Some(Direction::Left));
        assert_eq!(grid.get(Position::new(1, 1)).unwrap().durability, 4);
        assert_eq!(grid.get(Position::new(1, 4)).unwrap().durability, 5);
    }

    #[test]
    fn zigzag_layout_exits_left() {
        let mut grid = grid_with(
            &[
                (0, 1, Orientation::Slash),
                (1, 1, Orientation::Slash),
                (1, 2, Orientation::Backslash),
                (0, 2, Orientation::Slash),
            ],
            5,
        );
        let trace = fire_beam(&mut grid, up_from(0, 0), bounce_cap(0));

        let path: Vec<(Position, Direction)> = trace
            .iter()
            .map(|deflection| (deflection.position, deflection.to_direction))
            .collect();
        assert_eq!(
            path,
            vec![
                (Position::new(0, 0), Direction::Up),
                (Position::new(0, 1), Direction::Right),
                (Position::new(1, 1), Direction::Up),
                (Position::new(1, 2), Direction::Left),
                (Position::new(0, 2), Direction::Down),
                (Position::new(0, 1), Direction::Left),
            ]
        );
        assert_eq!(grid.get(Position::new(0, 1)).unwrap().durability, 3);
    }

    #[test]
    fn pawn_is_destroyed_on_its_last_hit() {
        let mut grid = grid_with(&[(2, 2, Orientation::Slash)], 3);

        for _ in 0..2 {
            let trace = fire_beam(&mut grid, up_from(2, -1), bounce_cap(0));
            assert!(trace.iter().all(|deflection| deflection.events.is_empty()));
        }
        let trace = fire_beam(&mut grid, up_from(2, -1), bounce_cap(0));

        assert!(grid.get(Position::new(2, 2)).is_none());
        assert_eq!(
            trace[1].events,
            vec![DeflectionEvent {
                name: DeflectionEventKind::DestroyPawn,
                position: Position::new(2, 2),
            }]
        );
        assert_eq!(exit_direction(&trace), Some(Direction::Right));
    }

    #[test]
    fn bounce_cap_cuts_a_closed_loop() {
        let mut grid = grid_with(
            &[
                (2, 0, Orientation::Slash),
                (2, 2, Orientation::Backslash),
                (0, 2, Orientation::Slash),
                (0, 0, Orientation::Backslash),
            ],
            1000,
        );
        let source = DirectedPosition::new(Position::new(1, 0), Direction::Right);
        let trace = fire_beam(&mut grid, source, 10);
        assert_eq!(trace.len(), 11);
        assert_eq!(trace[4].position, Position::new(0, 0));
        assert_eq!(trace[5].position, Position::new(2, 0));
    }
}
