//! Connection supervision: routes pauses, disconnects and resumes to rooms

use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::game::room::{RoomCommand, RoomView};
use crate::game::{GameError, Outbox, PlayerId, RoomRegistry, Seat};

/// Maps a player to their room seat and drives the shared pause/resume path.
/// The grace countdown itself lives in the room task.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    registry: Arc<RoomRegistry>,
}

impl ConnectionSupervisor {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Transport for `player_id` dropped. Returns true if a room was told.
    pub async fn on_disconnect(&self, player_id: PlayerId) -> bool {
        let Some((room, seat)) = self.registry.find_by_player(player_id) else {
            return false;
        };
        debug!(player_id, room_id = %room.id, %seat, "Seat disconnected");
        room.send(RoomCommand::Disconnect { seat }).await.is_ok()
    }

    /// Client asked to pause its active match
    pub async fn pause(&self, player_id: PlayerId) -> Result<(), GameError> {
        let (room, seat) = self
            .registry
            .find_by_player(player_id)
            .ok_or(GameError::NotInMatch)?;
        room.send(RoomCommand::Pause { seat }).await
    }

    /// Cancel a pending grace period for the player's room, optionally
    /// re-attaching a fresh outbox. No-op when nothing is pending.
    pub async fn on_reconnect_or_resume(
        &self,
        player_id: PlayerId,
        outbox: Option<Outbox>,
    ) -> Result<(RoomView, Seat), GameError> {
        let (room, seat) = self
            .registry
            .find_by_player(player_id)
            .ok_or(GameError::NotInMatch)?;

        let (reply, rx) = oneshot::channel();
        room.send(RoomCommand::Resume {
            seat,
            outbox,
            reply: Some(reply),
        })
        .await?;

        let view = rx.await.map_err(|_| GameError::RoomNotFound)?;
        Ok((view, seat))
    }
}
