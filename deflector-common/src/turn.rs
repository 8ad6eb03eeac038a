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

//! End-of-turn resolution: beam cascade, win detection, handover and
//! match-point flagging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Deflection, GameEvent, PlayerId, ProcessedBoard, RuleError, RuleResult,
    deflection::exit_direction,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnOutcome {
    /// One trace per beam fired, in firing order.
    pub deflections: Vec<Vec<Deflection>>,
    pub winner: Option<PlayerId>,
    /// Players flagged at match point by this turn.
    pub new_match_points: Vec<PlayerId>,
}

/// Most fires a single cascade may take. Every fire that hits a pawn wears
/// it down, so this is never reached on a well-formed board.
pub fn cascade_cap(board: &ProcessedBoard) -> usize {
    let durability = board.definition().ruleset.pawn_durability.max(1) as usize;
    board.grid().capacity() * durability + 1
}

/// Resolves an EndTurn intent from `requested_by` at wall-clock `now`.
///
/// The current player may always end their turn; anybody else in the game
/// only once the turn budget has run out. On success `board` holds every
/// appended event; on failure it is unchanged.
pub fn end_turn(
    board: &mut ProcessedBoard,
    requested_by: &str,
    now: DateTime<Utc>,
) -> RuleResult<TurnOutcome> {
    board.ensure_in_progress()?;
    board.require_standing(requested_by)?;
    let out_of_turn = || RuleError::OutOfTurn {
        player_id: requested_by.to_string(),
    };
    let current = board.player_turn().cloned().ok_or_else(out_of_turn)?;
    if current != requested_by && !board.turn_expired(now) {
        return Err(out_of_turn());
    }

    let mut staged = board.clone();
    let full_on_turn_start = staged.grid().is_full();
    let max_fires = cascade_cap(&staged);
    let mut outcome = TurnOutcome::default();

    loop {
        staged.process([GameEvent::fire()])?;
        let trace = staged.last_deflections().to_vec();
        let hit_something = trace.len() > 1;

        let winner = exit_direction(&trace)
            .filter(|_| hit_something)
            .and_then(|direction| staged.player_for_direction(direction))
            .filter(|player_id| {
                staged
                    .standing(player_id)
                    .is_some_and(|standing| standing.match_point)
            })
            .cloned();
        outcome.deflections.push(trace);

        if let Some(winner) = winner {
            staged.process([GameEvent::win(winner.clone())])?;
            outcome.winner = Some(winner);
            break;
        }
        if !full_on_turn_start
            || !hit_something
            || !staged.grid().is_dense()
            || outcome.deflections.len() >= max_fires
        {
            break;
        }
    }

    if staged.in_progress() {
        staged.process([GameEvent::end_turn(current, now)])?;
        outcome.new_match_points = staged.pending_match_points();
        staged.process(
            outcome
                .new_match_points
                .iter()
                .cloned()
                .map(GameEvent::match_point),
        )?;
    }

    *board = staged;
    Ok(outcome)
}
