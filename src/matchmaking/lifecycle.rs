//! Match lifecycle - routes client messages to the queue, registry and rooms

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::game::bot::TrackingBot;
use crate::game::room::{HumanPlayer, Player, RoomCommand, RoomStatus};
use crate::game::{deliver, Direction, GameError, Outbox, PlayerId, RoomRegistry};
use crate::ws::protocol::{ClientMsg, PlayerStatus, ServerMsg};

use super::queue::{MatchmakingQueue, Pairing, QueueEntry};
use super::supervisor::ConnectionSupervisor;

/// Identifies one transport connection of a player
pub type ConnectionId = u64;

/// Identity supplied by the identity provider
#[derive(Debug, Clone)]
pub struct PlayerIdentity {
    pub player_id: PlayerId,
    pub display_name: String,
}

#[derive(Clone)]
struct Session {
    connection: ConnectionId,
    display_name: String,
    outbox: Outbox,
}

/// Orchestrates matchmaking, rooms and connection supervision
pub struct MatchLifecycle {
    /// Also serializes room creation so a player is never seated twice
    queue: Mutex<MatchmakingQueue>,
    registry: Arc<RoomRegistry>,
    supervisor: ConnectionSupervisor,
    sessions: DashMap<PlayerId, Session>,
    next_connection: AtomicU64,
}

impl MatchLifecycle {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            queue: Mutex::new(MatchmakingQueue::new()),
            supervisor: ConnectionSupervisor::new(registry.clone()),
            registry,
            sessions: DashMap::new(),
            next_connection: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Register an authenticated connection. A newer connection replaces an
    /// older one, including the outbox of a queue entry it left behind.
    pub fn connect(&self, identity: PlayerIdentity, outbox: Outbox) -> ConnectionId {
        let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let player_id = identity.player_id;
        let previous = self.sessions.insert(
            player_id,
            Session {
                connection,
                display_name: identity.display_name,
                outbox: outbox.clone(),
            },
        );

        if previous.is_some() {
            if self.queue.lock().reattach(player_id, outbox) {
                debug!(player_id, connection, "Queue entry moved to new connection");
            }
            info!(player_id, connection, "Player connection replaced");
        } else {
            info!(player_id = identity.player_id, connection, "Player connected");
        }
        connection
    }

    /// Transport closed. Ignored if the connection was already superseded.
    pub async fn disconnect(&self, player_id: PlayerId, connection: ConnectionId) {
        if self
            .sessions
            .remove_if(&player_id, |_, s| s.connection == connection)
            .is_none()
        {
            debug!(player_id, connection, "Superseded connection closed");
            return;
        }

        {
            let mut queue = self.queue.lock();
            if queue.dequeue(player_id).is_some() {
                info!(player_id, "Player left matchmaking queue on disconnect");
            }
        }

        self.supervisor.on_disconnect(player_id).await;
        info!(player_id, connection, "Player disconnected");
    }

    /// Handle one inbound message
    pub async fn handle(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
        msg: ClientMsg,
    ) -> Result<(), GameError> {
        let session = self.session(player_id, connection)?;

        match msg {
            ClientMsg::JoinQueue => self.join_queue(player_id, &session),
            ClientMsg::PlayWithBot => self.play_with_bot(player_id, &session),
            ClientMsg::Move { direction } => self.move_paddle(player_id, direction).await,
            ClientMsg::PauseGame => self.supervisor.pause(player_id).await,
            ClientMsg::ResumeGame => self
                .supervisor
                .on_reconnect_or_resume(player_id, Some(session.outbox.clone()))
                .await
                .map(|_| ()),
            ClientMsg::LeaveGame => self.leave(player_id).await,
            ClientMsg::GetPlayerState => {
                let player = self.player_state(player_id, Some(session.outbox.clone())).await;
                deliver(&session.outbox, ServerMsg::PlayerState { player });
                Ok(())
            }
        }
    }

    fn session(&self, player_id: PlayerId, connection: ConnectionId) -> Result<Session, GameError> {
        self.sessions
            .get(&player_id)
            .filter(|s| s.connection == connection)
            .map(|s| s.value().clone())
            .ok_or(GameError::NotConnected)
    }

    fn join_queue(&self, player_id: PlayerId, session: &Session) -> Result<(), GameError> {
        let mut queue = self.queue.lock();

        if self.registry.find_by_player(player_id).is_some() {
            return Err(GameError::AlreadyInMatch);
        }

        let entry = QueueEntry::new(player_id, session.display_name.clone(), session.outbox.clone());
        match queue.enqueue(entry)? {
            Some(pairing) => self.start_match(pairing),
            None => {
                let position = queue.position(player_id).unwrap_or(1);
                info!(player_id, queue_size = queue.len(), "Player joined matchmaking queue");
                deliver(&session.outbox, ServerMsg::Queued { position });
            }
        }
        Ok(())
    }

    /// Called with the queue lock held
    fn start_match(&self, pairing: Pairing) {
        let (a, b) = (pairing.first.player_id, pairing.second.player_id);
        debug!(
            player_a = a,
            player_b = b,
            waited_ms = pairing.first.wait_time().as_millis() as u64,
            "Pairing oldest queue entries"
        );
        let seat_b = Player::Human(pairing.second.into_player());

        match self.registry.create(pairing.first.into_player(), seat_b) {
            Ok(room) => info!(room_id = %room.id, player_a = a, player_b = b, "Paired players"),
            Err(e) => error!(player_a = a, player_b = b, error = %e, "Queued players were already seated"),
        }
    }

    fn play_with_bot(&self, player_id: PlayerId, session: &Session) -> Result<(), GameError> {
        let mut queue = self.queue.lock();

        if self.registry.find_by_player(player_id).is_some() {
            return Err(GameError::AlreadyInMatch);
        }
        if queue.dequeue(player_id).is_some() {
            debug!(player_id, "Left queue for a bot match");
        }

        let human = HumanPlayer::new(player_id, session.display_name.clone(), session.outbox.clone());
        let room = self.registry.create(human, Player::Bot(Box::new(TrackingBot)))?;
        info!(room_id = %room.id, player_id, "Started bot match");
        Ok(())
    }

    async fn move_paddle(&self, player_id: PlayerId, direction: i64) -> Result<(), GameError> {
        let direction = Direction::try_from(direction)?;
        let (room, seat) = self
            .registry
            .find_by_player(player_id)
            .ok_or(GameError::NotInMatch)?;

        // A room finishing right now is the same benign race as no room at all
        room.send(RoomCommand::Move { seat, direction })
            .await
            .map_err(|_| GameError::NotInMatch)
    }

    async fn leave(&self, player_id: PlayerId) -> Result<(), GameError> {
        if let Some((room, seat)) = self.registry.find_by_player(player_id) {
            return room.send(RoomCommand::Leave { seat }).await;
        }

        let mut queue = self.queue.lock();
        match queue.dequeue(player_id) {
            Some(_) => {
                info!(player_id, "Player left matchmaking queue");
                Ok(())
            }
            None => Err(GameError::NotInMatch),
        }
    }

    /// Resolve a player's position; resumes their paused room as a side effect
    async fn player_state(&self, player_id: PlayerId, outbox: Option<Outbox>) -> PlayerStatus {
        match self.supervisor.on_reconnect_or_resume(player_id, outbox).await {
            Ok((view, seat)) if view.status != RoomStatus::Finished => PlayerStatus::InMatch {
                room: view.id,
                seat,
                paused: view.status == RoomStatus::Paused,
            },
            _ => self.queue_status(player_id),
        }
    }

    /// Side-effect free variant of [`Self::player_state`]
    #[cfg(test)]
    pub async fn status_of(&self, player_id: PlayerId) -> PlayerStatus {
        if let Some((room, seat)) = self.registry.find_by_player(player_id) {
            if let Ok(view) = room.view().await {
                if view.status != RoomStatus::Finished {
                    return PlayerStatus::InMatch {
                        room: view.id,
                        seat,
                        paused: view.status == RoomStatus::Paused,
                    };
                }
            }
        }
        self.queue_status(player_id)
    }

    fn queue_status(&self, player_id: PlayerId) -> PlayerStatus {
        match self.queue.lock().position(player_id) {
            Some(position) => PlayerStatus::Queued { position },
            None => PlayerStatus::Idle,
        }
    }

    pub fn queue_size(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn connected_players(&self) -> usize {
        self.sessions.len()
    }

    /// Tear down every room
    pub fn shutdown(&self) {
        info!(rooms = self.registry.active_rooms(), "Shutting down rooms");
        self.registry.shutdown();
    }
}
