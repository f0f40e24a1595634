//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::physics::{BallState, Score};
use crate::game::{RoomId, Seat, SeatPair};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Wait for a human opponent
    JoinQueue,

    /// Start a match against the computer right away
    PlayWithBot,

    /// Paddle input; validated to -1, 0 or 1 by the lifecycle
    Move { direction: i64 },

    PauseGame,

    ResumeGame,

    /// Forfeit the current match
    LeaveGame,

    /// Where am I? Also resumes a paused match after a reconnect.
    GetPlayerState,
}

impl ClientMsg {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// High-frequency input subject to the per-connection rate limit.
    /// Control messages always get through.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientMsg::Move { .. })
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Added to the matchmaking queue
    Queued { position: usize },

    /// A match was created with the receiver in `seat`
    StartGame {
        seat: Seat,
        room: RoomId,
        /// Display name of the other seat
        opponent: String,
    },

    /// Full room snapshot, sent every snapshot tick while active
    State {
        tick: u64,
        paddles: SeatPair<f32>,
        ball: BallState,
        score: Score,
    },

    /// Match paused by `seat`; forfeit follows if nobody resumes
    Paused { seat: Seat },

    Resumed,

    /// Match ended. `won` is relative to the receiver.
    GameOver { won: bool, score: Score },

    /// Reply to `getPlayerState`
    PlayerState { player: PlayerStatus },

    /// Rejected request
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(err: &impl std::fmt::Display, code: &str) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: err.to_string(),
        }
    }

    /// State frames may be dropped for a lagging client; nothing else may
    pub fn is_droppable(&self) -> bool {
        matches!(self, ServerMsg::State { .. })
    }
}

/// A player's position in the matchmaking system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PlayerStatus {
    Idle,
    Queued { position: usize },
    InMatch { room: RoomId, seat: Seat, paused: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        assert_eq!(
            ClientMsg::from_json(r#"{"type":"joinQueue"}"#).unwrap(),
            ClientMsg::JoinQueue
        );
        assert_eq!(
            ClientMsg::from_json(r#"{"type":"move","direction":-1}"#).unwrap(),
            ClientMsg::Move { direction: -1 }
        );
        assert_eq!(
            ClientMsg::from_json(r#"{"type":"getPlayerState"}"#).unwrap(),
            ClientMsg::GetPlayerState
        );
    }

    #[test]
    fn test_only_moves_are_rate_limited() {
        assert!(ClientMsg::Move { direction: 1 }.is_rate_limited());
        for msg in [
            ClientMsg::JoinQueue,
            ClientMsg::PlayWithBot,
            ClientMsg::PauseGame,
            ClientMsg::ResumeGame,
            ClientMsg::LeaveGame,
            ClientMsg::GetPlayerState,
        ] {
            assert!(!msg.is_rate_limited(), "{msg:?}");
        }
    }

    #[test]
    fn test_malformed_client_messages_are_rejected() {
        assert!(ClientMsg::from_json(r#"{"type":"move","direction":"up"}"#).is_err());
        assert!(ClientMsg::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMsg::from_json("not json").is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let msg = ServerMsg::GameOver {
            won: true,
            score: Score { a: 5, b: 3 },
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "gameOver");
        assert_eq!(json["won"], true);
        assert_eq!(json["score"]["a"], 5);

        let status = ServerMsg::PlayerState {
            player: PlayerStatus::Queued { position: 1 },
        };
        let json: serde_json::Value = serde_json::to_value(&status).unwrap();
        assert_eq!(json["type"], "playerState");
        assert_eq!(json["player"]["status"], "queued");
    }
}
