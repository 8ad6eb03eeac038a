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

//! Deterministic pseudo-random choices.
//!
//! Every draw is seeded from a SHA-256 digest of a string key built from stable
//! identifiers, so the server and a client preview derive the same pawn
//! orientations and beam origins without exchanging randomness.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use sha2::{Digest, Sha256};

use crate::{DirectedPosition, Direction, Orientation, Position};

/// Reduces `key` to a numeric seed: the first eight digest bytes, big-endian.
pub fn seed_from_key(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn stream_for(key: &str) -> Pcg32 {
    Pcg32::seed_from_u64(seed_from_key(key))
}

pub fn player_variant_key(game_id: &str, player_id: &str) -> String {
    format!("{game_id}:{player_id}")
}

pub fn deflection_key(game_id: &str, turn: u32) -> String {
    format!("{game_id}:{turn}")
}

/// First `count` orientations of the stream keyed by `key`.
///
/// `pawn_variants(key, n)` is always a prefix of `pawn_variants(key, n + 1)`.
pub fn pawn_variants(key: &str, count: usize) -> Vec<Orientation> {
    let mut rng = stream_for(key);
    (0..count)
        .map(|_| {
            if rng.random::<f64>() < 0.5 {
                Orientation::Slash
            } else {
                Orientation::Backslash
            }
        })
        .collect()
}

/// Origin of the beam fired during `turn`: the centre column, just outside the
/// top edge heading down or just outside the bottom edge heading up.
pub fn deflection_source(game_id: &str, turn: u32, x_max: i32, y_max: i32) -> DirectedPosition {
    let mut rng = stream_for(&deflection_key(game_id, turn));
    let column = x_max / 2;
    if rng.random::<f64>() < 0.5 {
        DirectedPosition::new(Position::new(column, y_max + 1), Direction::Down)
    } else {
        DirectedPosition::new(Position::new(column, -1), Direction::Up)
    }
}
