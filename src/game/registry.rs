//! Registry of live rooms
//!
//! The registry is the only owner of room storage and room task handles.
//! Destroying a room aborts its task, which owns both the tick clock and the
//! grace timer, so neither can fire afterwards.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{MatchResult, ResultRecorder};
use crate::util::time::tick_duration;

use super::grace::DEFAULT_GRACE_PERIOD;
use super::room::{GameRoom, HumanPlayer, Player, RoomCommand, RoomState};
use super::{GameError, PlayerId, RoomId, Seat, SeatPair};

/// Per-room runtime settings
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub tick_period: Duration,
    pub grace_period: Duration,
    /// Broadcast every Nth tick
    pub snapshot_interval: u32,
    /// Fixed serve seed for every room; random per room when unset
    pub seed: Option<u64>,
    pub command_buffer: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            tick_period: tick_duration(),
            grace_period: DEFAULT_GRACE_PERIOD,
            snapshot_interval: 1,
            seed: None,
            command_buffer: 256,
        }
    }
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: RoomId,
    commands: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub async fn send(&self, cmd: RoomCommand) -> Result<(), GameError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| GameError::RoomNotFound)
    }

    #[cfg(test)]
    pub async fn view(&self) -> Result<super::room::RoomView, GameError> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.send(RoomCommand::Inspect { reply }).await?;
        rx.await.map_err(|_| GameError::RoomNotFound)
    }

    /// Resolves once the room task has stopped
    #[cfg(test)]
    pub async fn closed(&self) {
        self.commands.closed().await
    }
}

struct RoomEntry {
    handle: RoomHandle,
    task: Option<AbortHandle>,
    players: Vec<PlayerId>,
}

/// Registry of all live rooms
pub struct RoomRegistry {
    rooms: DashMap<RoomId, RoomEntry>,
    players: DashMap<PlayerId, (RoomId, Seat)>,
    settings: RoomSettings,
    recorder: ResultRecorder,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings, recorder: ResultRecorder) -> Self {
        Self {
            rooms: DashMap::new(),
            players: DashMap::new(),
            settings,
            recorder,
        }
    }

    /// Allocate a room and start its task. Fails if a seat is already playing.
    pub fn create(self: &Arc<Self>, seat_a: HumanPlayer, seat_b: Player) -> Result<RoomHandle, GameError> {
        let seated: Vec<(PlayerId, Seat)> = [
            Some((seat_a.player_id, Seat::A)),
            seat_b.player_id().map(|id| (id, Seat::B)),
        ]
        .into_iter()
        .flatten()
        .collect();

        for (player_id, _) in &seated {
            if self.players.contains_key(player_id) {
                return Err(GameError::AlreadyInMatch);
            }
        }

        let id = Uuid::new_v4();
        let seed = self.settings.seed.unwrap_or_else(rand::random);
        let state = RoomState::new(id, SeatPair::new(Player::Human(seat_a), seat_b), seed);

        let (tx, rx) = mpsc::channel(self.settings.command_buffer);
        let room = GameRoom::new(
            state,
            rx,
            self.settings.tick_period,
            self.settings.grace_period,
            self.settings.snapshot_interval,
        );
        let handle = RoomHandle { id, commands: tx };

        for (player_id, seat) in &seated {
            self.players.insert(*player_id, (id, *seat));
        }
        self.rooms.insert(
            id,
            RoomEntry {
                handle: handle.clone(),
                task: None,
                players: seated.iter().map(|(player_id, _)| *player_id).collect(),
            },
        );

        let registry = Arc::clone(self);
        let task = tokio::spawn(async move {
            let (state, outcome) = room.run().await;

            // Unregister before announcing so post-game queries see no room
            registry.release(&id);
            state.announce_result(&outcome);

            if let Some(result) = MatchResult::from_outcome(&state, &outcome) {
                registry.recorder.record(result);
            }
        });

        if let Some(mut entry) = self.rooms.get_mut(&id) {
            entry.task = Some(task.abort_handle());
        }

        info!(room_id = %id, seed, players = seated.len(), "Created new room");
        Ok(handle)
    }

    pub fn get(&self, id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(id).map(|entry| entry.handle.clone())
    }

    /// Room and seat currently held by a player
    pub fn find_by_player(&self, player_id: PlayerId) -> Option<(RoomHandle, Seat)> {
        let (room_id, seat) = self.players.get(&player_id).map(|r| *r)?;
        match self.get(&room_id) {
            Some(handle) => Some((handle, seat)),
            None => {
                warn!(player_id, room_id = %room_id, "Player indexed to a missing room");
                self.players.remove_if(&player_id, |_, (rid, _)| *rid == room_id);
                None
            }
        }
    }

    /// Unregister a room whose task is finishing on its own
    pub fn release(&self, id: &RoomId) -> bool {
        self.take(id).is_some()
    }

    /// Unregister a room and stop its task
    pub fn destroy(&self, id: &RoomId) -> bool {
        match self.take(id) {
            Some(entry) => {
                if let Some(task) = entry.task {
                    task.abort();
                }
                info!(room_id = %id, "Room destroyed");
                true
            }
            None => false,
        }
    }

    /// Destroy every room (server shutdown)
    pub fn shutdown(&self) {
        let ids: Vec<RoomId> = self.rooms.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.destroy(&id);
        }
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    #[cfg(test)]
    pub fn seated_players(&self) -> usize {
        self.players.len()
    }

    fn take(&self, id: &RoomId) -> Option<RoomEntry> {
        let (_, entry) = self.rooms.remove(id)?;
        for player_id in &entry.players {
            self.players.remove_if(player_id, |_, (rid, _)| rid == id);
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::bot::TrackingBot;
    use crate::game::room::{RoomStatus, RoomCommand};
    use crate::ws::protocol::ServerMsg;

    fn human(id: PlayerId) -> (HumanPlayer, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(8192);
        (HumanPlayer::new(id, format!("player-{id}"), tx), rx)
    }

    fn registry() -> (Arc<RoomRegistry>, mpsc::UnboundedReceiver<MatchResult>) {
        let (recorder, results) = ResultRecorder::channel();
        let settings = RoomSettings {
            seed: Some(3),
            ..Default::default()
        };
        (Arc::new(RoomRegistry::new(settings, recorder)), results)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_indexes_both_seats() {
        let (registry, _results) = registry();
        let (a, _rx_a) = human(1);
        let (b, _rx_b) = human(2);

        let handle = registry.create(a, Player::Human(b)).unwrap();

        let (found, seat) = registry.find_by_player(2).unwrap();
        assert_eq!(found.id, handle.id);
        assert_eq!(seat, Seat::B);
        assert_eq!(registry.active_rooms(), 1);
        assert_eq!(registry.seated_players(), 2);

        let view = handle.view().await.unwrap();
        assert_eq!(view.status, RoomStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seated_player_cannot_get_second_room() {
        let (registry, _results) = registry();
        let (a, _rx_a) = human(1);
        registry.create(a, Player::Bot(Box::new(TrackingBot))).unwrap();

        let (again, _rx) = human(1);
        let err = registry
            .create(again, Player::Bot(Box::new(TrackingBot)))
            .err()
            .unwrap();
        assert_eq!(err, GameError::AlreadyInMatch);
        assert_eq!(registry.active_rooms(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_stops_room_task() {
        let (registry, mut results) = registry();
        let (a, _rx_a) = human(1);
        let handle = registry.create(a, Player::Bot(Box::new(TrackingBot))).unwrap();

        assert!(registry.destroy(&handle.id));
        assert!(!registry.destroy(&handle.id));
        assert!(registry.find_by_player(1).is_none());

        tokio::time::timeout(Duration::from_secs(1), handle.closed())
            .await
            .unwrap();
        assert_eq!(handle.view().await.err(), Some(GameError::RoomNotFound));
        assert!(results.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_releases_room_and_records_result() {
        let (registry, mut results) = registry();
        let (a, mut rx_a) = human(1);
        let (b, mut rx_b) = human(2);
        let handle = registry.create(a, Player::Human(b)).unwrap();

        handle.send(RoomCommand::Leave { seat: Seat::A }).await.unwrap();

        loop {
            if let ServerMsg::GameOver { won, .. } = rx_a.recv().await.unwrap() {
                assert!(!won);
                break;
            }
        }
        assert!(registry.find_by_player(1).is_none());
        assert!(registry.find_by_player(2).is_none());

        loop {
            if let ServerMsg::GameOver { won, .. } = rx_b.recv().await.unwrap() {
                assert!(won);
                break;
            }
        }

        let result = results.recv().await.unwrap();
        assert_eq!(result.winner, Some(2));
        assert_eq!(result.reason, "forfeit");
    }
}
