//! Match results sink
//!
//! Results are handed to a background worker through a channel so a finishing
//! room never waits on the network. Delivery is best effort.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::room::{MatchOutcome, RoomState};
use crate::game::PlayerId;

/// Final record of one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub room_id: Uuid,
    pub player_a: PlayerId,
    /// `None` when seat B was the bot
    pub player_b: Option<PlayerId>,
    pub score_a: u32,
    pub score_b: u32,
    pub winner: Option<PlayerId>,
    pub reason: String,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl MatchResult {
    /// Only matches with a winner and a human seat A are recorded
    pub fn from_outcome(state: &RoomState, outcome: &MatchOutcome) -> Option<Self> {
        let winner_seat = outcome.winner?;
        let player_a = state.seats.a.player_id()?;

        Some(Self {
            room_id: outcome.room_id,
            player_a,
            player_b: state.seats.b.player_id(),
            score_a: outcome.score.a,
            score_b: outcome.score.b,
            winner: state.seats[winner_seat].player_id(),
            reason: outcome.reason.as_str().to_string(),
            finished_at: chrono::Utc::now(),
        })
    }
}

/// REST client for the results endpoint
#[derive(Clone)]
pub struct ResultsClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl ResultsClient {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            api_key,
        }
    }

    /// Build from config; `None` when no results URL is configured
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .results_url
            .clone()
            .map(|url| Self::new(url, config.results_api_key.clone()))
    }

    /// POST one result
    pub async fn post(&self, result: &MatchResult) -> Result<(), StoreError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(result);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        Ok(())
    }
}

/// Fire-and-forget handle used by rooms
#[derive(Clone)]
pub struct ResultRecorder {
    tx: mpsc::UnboundedSender<MatchResult>,
}

impl ResultRecorder {
    /// Spawn the delivery worker. Without a client results are only logged.
    pub fn spawn(client: Option<ResultsClient>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<MatchResult>();

        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match &client {
                    Some(client) => {
                        if let Err(e) = client.post(&result).await {
                            warn!(room_id = %result.room_id, error = %e, "Failed to record match result");
                        } else {
                            debug!(room_id = %result.room_id, "Match result recorded");
                        }
                    }
                    None => {
                        info!(
                            room_id = %result.room_id,
                            winner = ?result.winner,
                            score_a = result.score_a,
                            score_b = result.score_b,
                            "Match result (persistence disabled)"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    /// Recorder whose results land in the returned receiver
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MatchResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn record(&self, result: MatchResult) {
        if self.tx.send(result).is_err() {
            warn!("Result worker stopped, dropping match result");
        }
    }
}

/// Results store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::bot::TrackingBot;
    use crate::game::physics::Score;
    use crate::game::room::{FinishReason, HumanPlayer, Player};
    use crate::game::{Seat, SeatPair};

    fn bot_state() -> RoomState {
        let (tx, _rx) = mpsc::channel(1);
        let seats = SeatPair::new(
            Player::Human(HumanPlayer::new(7, "seven".into(), tx)),
            Player::Bot(Box::new(TrackingBot)),
        );
        RoomState::new(Uuid::new_v4(), seats, 1)
    }

    #[test]
    fn test_bot_win_is_recorded_without_winner_id() {
        let state = bot_state();
        let outcome = MatchOutcome {
            room_id: state.id,
            winner: Some(Seat::B),
            score: Score { a: 1, b: 5 },
            reason: FinishReason::Score,
        };

        let result = MatchResult::from_outcome(&state, &outcome).unwrap();
        assert_eq!(result.player_a, 7);
        assert_eq!(result.player_b, None);
        assert_eq!(result.winner, None);
        assert_eq!(result.reason, "score");
    }

    #[test]
    fn test_abandoned_match_is_not_recorded() {
        let state = bot_state();
        let outcome = MatchOutcome {
            room_id: state.id,
            winner: None,
            score: Score::default(),
            reason: FinishReason::Abandoned,
        };
        assert!(MatchResult::from_outcome(&state, &outcome).is_none());
    }
}
