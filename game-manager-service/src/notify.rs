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

//! Outbound collaborators: realtime pushes to players and profile stats.

use anyhow::Context;
use async_trait::async_trait;
use deflector_common::{GameEndUserUpdate, GameStatsUpdate, Notification, PlayerId};
use tracing::{debug, warn};

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Queues `notification` for each recipient. Delivery is not awaited.
    async fn broadcast(
        &self,
        recipients: &[PlayerId],
        notification: &Notification,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait StatsReporter: Send + Sync {
    async fn report_game_end(&self, updates: &[GameEndUserUpdate]) -> anyhow::Result<()>;
}

#[derive(Clone)]
struct InternalClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl InternalClient {
    fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token: std::env::var("INTERNAL_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: String,
        payload: &T,
    ) -> anyhow::Result<()> {
        let mut request = self.client.post(url.clone()).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to call {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_string());
            anyhow::bail!("{url} returned {status}: {body}");
        }

        Ok(())
    }
}

/// Pushes notifications through the realtime service's internal endpoint.
#[derive(Clone)]
pub struct HttpBroadcaster {
    internal: InternalClient,
}

impl HttpBroadcaster {
    pub fn from_env() -> Self {
        let base_url = std::env::var("INTERNAL_SERVICES_URL")
            .ok()
            .unwrap_or_else(|| "http://realtime-service:8080".to_string());
        Self {
            internal: InternalClient::new(base_url),
        }
    }
}

#[async_trait]
impl Broadcaster for HttpBroadcaster {
    async fn broadcast(
        &self,
        recipients: &[PlayerId],
        notification: &Notification,
    ) -> anyhow::Result<()> {
        for player_id in recipients {
            let internal = self.internal.clone();
            let url = internal.endpoint(&format!("realtime/internal/notify/{player_id}"));
            let notification = notification.clone();
            let player_id = player_id.clone();
            tokio::spawn(async move {
                match internal.post_json(url, &notification).await {
                    Ok(()) => debug!(
                        player_id = %player_id,
                        event = notification.event.as_str(),
                        "delivered notification"
                    ),
                    Err(error) => warn!(
                        player_id = %player_id,
                        event = notification.event.as_str(),
                        error = %error,
                        "failed to deliver notification"
                    ),
                }
            });
        }
        Ok(())
    }
}

/// Sends finished-game deltas to the user service.
#[derive(Clone)]
pub struct HttpStatsReporter {
    internal: InternalClient,
}

impl HttpStatsReporter {
    pub fn from_env() -> Self {
        let base_url = std::env::var("USER_SERVICE_URL")
            .ok()
            .unwrap_or_else(|| "http://user-service:8080".to_string());
        Self {
            internal: InternalClient::new(base_url),
        }
    }
}

#[async_trait]
impl StatsReporter for HttpStatsReporter {
    async fn report_game_end(&self, updates: &[GameEndUserUpdate]) -> anyhow::Result<()> {
        let url = self.internal.endpoint("users/internal/stats/games");
        let payload = GameStatsUpdate {
            updates: updates.to_vec(),
        };
        self.internal.post_json(url, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let internal = InternalClient {
            client: reqwest::Client::new(),
            base_url: "http://realtime:8080/".to_string(),
            token: None,
        };
        assert_eq!(
            internal.endpoint("realtime/internal/notify/red"),
            "http://realtime:8080/realtime/internal/notify/red"
        );
    }
}
