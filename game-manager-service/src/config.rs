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

use chrono::{DateTime, TimeDelta, Utc};
use deflector_common::{
    DEFAULT_LOCK_SECONDS, DEFAULT_TARGET_SCORE, DEFAULT_TURN_SECONDS, DEFAULT_X_MAX,
    DEFAULT_Y_MAX, GameDefinition, PlayerId, Ruleset, expand_env_vars,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parameters stamped onto every new game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameSettings {
    pub x_max: i32,
    pub y_max: i32,
    pub target_score: u32,
    pub turn_seconds: u64,
    pub ruleset: Ruleset,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            x_max: DEFAULT_X_MAX,
            y_max: DEFAULT_Y_MAX,
            target_score: DEFAULT_TARGET_SCORE,
            turn_seconds: DEFAULT_TURN_SECONDS,
            ruleset: Ruleset::default(),
        }
    }
}

impl GameSettings {
    pub fn definition(
        &self,
        game_id: impl Into<String>,
        player_ids: Vec<PlayerId>,
        start_time: DateTime<Utc>,
    ) -> GameDefinition {
        GameDefinition {
            x_max: self.x_max.max(0),
            y_max: self.y_max.max(0),
            target_score: self.target_score,
            turn_seconds: self.turn_seconds.max(1),
            ruleset: self.ruleset.clone(),
            ..GameDefinition::new(game_id, player_ids, start_time)
        }
    }
}

pub fn load_game_settings() -> GameSettings {
    let Some(path) = std::env::var("GAME_SETTINGS_PATH")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return GameSettings::default();
    };

    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read game settings file");
            return GameSettings::default();
        }
    };

    if raw.trim().is_empty() {
        warn!(path = %path, "game settings file is empty");
        return GameSettings::default();
    }

    match parse_game_settings(&raw) {
        Ok(settings) => settings,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to parse game settings yaml");
            GameSettings::default()
        }
    }
}

fn parse_game_settings(raw: &str) -> Result<GameSettings, serde_yaml::Error> {
    serde_yaml::from_str(&expand_env_vars(raw))
}

/// How long a writer may hold a game before the lock expires on its own.
pub fn lock_duration_from_env() -> TimeDelta {
    let seconds = std::env::var("GAME_LOCK_SECONDS")
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|seconds| *seconds > 0)
        .unwrap_or(DEFAULT_LOCK_SECONDS as i64);
    TimeDelta::try_seconds(seconds).unwrap_or(TimeDelta::MAX)
}
