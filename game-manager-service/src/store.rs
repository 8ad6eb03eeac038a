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

//! Persisted game documents and the time-boxed advisory lock guarding them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use deflector_common::{
    EventRecord, GameDefinition, GameEvent, PlayerGameStats, PlayerId, ProcessedBoard,
    RuleResult, Ruleset,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// One game as stored: its fixed parameters plus the encoded event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameRecord {
    pub game_id: String,
    pub player_ids: Vec<PlayerId>,
    pub x_max: i32,
    pub y_max: i32,
    pub target_score: u32,
    pub turn_seconds: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub ruleset: Ruleset,
    #[serde(default)]
    pub lock_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub winner: Option<PlayerId>,
    pub events: Vec<EventRecord>,
}

impl GameRecord {
    pub fn new(definition: &GameDefinition) -> Self {
        Self {
            game_id: definition.game_id.clone(),
            player_ids: definition.player_ids.clone(),
            x_max: definition.x_max,
            y_max: definition.y_max,
            target_score: definition.target_score,
            turn_seconds: definition.turn_seconds,
            start_time: definition.start_time,
            ruleset: definition.ruleset.clone(),
            lock_expires_at: None,
            winner: None,
            events: definition.events.iter().map(GameEvent::encode).collect(),
        }
    }

    /// Decodes the stored log back into a replayable definition.
    pub fn definition(&self) -> RuleResult<GameDefinition> {
        let events = self
            .events
            .iter()
            .map(GameEvent::decode)
            .collect::<RuleResult<Vec<_>>>()?;
        Ok(GameDefinition {
            game_id: self.game_id.clone(),
            player_ids: self.player_ids.clone(),
            x_max: self.x_max,
            y_max: self.y_max,
            target_score: self.target_score,
            turn_seconds: self.turn_seconds,
            start_time: self.start_time,
            ruleset: self.ruleset.clone(),
            events,
        })
    }

    /// The record as it should be written back after `board` was processed.
    pub fn updated_from(&self, board: &ProcessedBoard) -> Self {
        Self {
            lock_expires_at: self.lock_expires_at,
            winner: board.winner().cloned(),
            ..Self::new(board.definition())
        }
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_expires_at.is_some_and(|expires_at| expires_at > now)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("game {game_id} not found")]
    NotFound { game_id: String },

    #[error("game {game_id} is being updated by another request")]
    LockUnavailable { game_id: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait GameStore: Send + Sync {
    async fn insert(&self, record: GameRecord) -> Result<(), StoreError>;

    async fn get(&self, game_id: &str) -> Result<GameRecord, StoreError>;

    /// Takes the advisory lock until `now + lock_for` and returns the record.
    /// Fails immediately with `LockUnavailable` while another holder's lock
    /// has not expired.
    async fn lock(
        &self,
        game_id: &str,
        now: DateTime<Utc>,
        lock_for: TimeDelta,
    ) -> Result<GameRecord, StoreError>;

    async fn unlock(&self, game_id: &str) -> Result<(), StoreError>;

    /// Replaces the stored record and clears its lock in one write.
    async fn save_and_unlock(&self, record: GameRecord) -> Result<(), StoreError>;

    async fn ongoing_game_for_player(&self, player_id: &str)
    -> Result<Option<String>, StoreError>;

    async fn player_stats(&self, player_ids: &[PlayerId])
    -> Result<Vec<PlayerGameStats>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryGameStore {
    games: RwLock<HashMap<String, GameRecord>>,
}

fn not_found(game_id: &str) -> StoreError {
    StoreError::NotFound {
        game_id: game_id.to_string(),
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn insert(&self, record: GameRecord) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        if games.contains_key(&record.game_id) {
            return Err(anyhow::anyhow!("game {} already exists", record.game_id).into());
        }
        games.insert(record.game_id.clone(), record);
        Ok(())
    }

    async fn get(&self, game_id: &str) -> Result<GameRecord, StoreError> {
        let games = self.games.read().await;
        games.get(game_id).cloned().ok_or_else(|| not_found(game_id))
    }

    async fn lock(
        &self,
        game_id: &str,
        now: DateTime<Utc>,
        lock_for: TimeDelta,
    ) -> Result<GameRecord, StoreError> {
        let mut games = self.games.write().await;
        let record = games.get_mut(game_id).ok_or_else(|| not_found(game_id))?;
        if record.is_locked(now) {
            return Err(StoreError::LockUnavailable {
                game_id: game_id.to_string(),
            });
        }
        record.lock_expires_at = Some(now.checked_add_signed(lock_for).unwrap_or(now));
        Ok(record.clone())
    }

    async fn unlock(&self, game_id: &str) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        let record = games.get_mut(game_id).ok_or_else(|| not_found(game_id))?;
        record.lock_expires_at = None;
        Ok(())
    }

    async fn save_and_unlock(&self, mut record: GameRecord) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        let stored = games
            .get_mut(&record.game_id)
            .ok_or_else(|| not_found(&record.game_id))?;
        record.lock_expires_at = None;
        *stored = record;
        Ok(())
    }

    async fn ongoing_game_for_player(
        &self,
        player_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let games = self.games.read().await;
        let mut ongoing: Vec<&GameRecord> = games
            .values()
            .filter(|record| {
                record.winner.is_none() && record.player_ids.iter().any(|id| id == player_id)
            })
            .collect();
        ongoing.sort_by_key(|record| std::cmp::Reverse(record.start_time));
        Ok(ongoing.first().map(|record| record.game_id.clone()))
    }

    async fn player_stats(
        &self,
        player_ids: &[PlayerId],
    ) -> Result<Vec<PlayerGameStats>, StoreError> {
        let games = self.games.read().await;
        let stats = player_ids
            .iter()
            .map(|player_id| {
                let finished = games.values().filter(|record| {
                    record.winner.is_some() && record.player_ids.contains(player_id)
                });
                let (games_played, wins) = finished.fold((0, 0), |(played, wins), record| {
                    let won = record.winner.as_ref() == Some(player_id);
                    (played + 1, wins + u32::from(won))
                });
                PlayerGameStats {
                    player_id: player_id.clone(),
                    games_played,
                    wins,
                }
            })
            .collect();
        Ok(stats)
    }
}
