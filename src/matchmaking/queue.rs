//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::game::room::HumanPlayer;
use crate::game::{GameError, Outbox, PlayerId};

/// Player in the matchmaking queue
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub outbox: Outbox,
    pub enqueued_at: Instant,
}

impl QueueEntry {
    pub fn new(player_id: PlayerId, display_name: String, outbox: Outbox) -> Self {
        Self {
            player_id,
            display_name,
            outbox,
            enqueued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    pub fn into_player(self) -> HumanPlayer {
        HumanPlayer::new(self.player_id, self.display_name, self.outbox)
    }
}

/// Two players taken off the queue together, oldest first
#[derive(Debug)]
pub struct Pairing {
    pub first: QueueEntry,
    pub second: QueueEntry,
}

/// FIFO matchmaking queue. No priority, no skill matching.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueueEntry>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player; pairs the two oldest entries as soon as two are waiting
    pub fn enqueue(&mut self, entry: QueueEntry) -> Result<Option<Pairing>, GameError> {
        if self.contains(entry.player_id) {
            return Err(GameError::AlreadyQueued);
        }
        self.queue.push_back(entry);
        Ok(self.try_pair())
    }

    /// Remove a waiting player. No-op if they were never queued or already paired.
    pub fn dequeue(&mut self, player_id: PlayerId) -> Option<QueueEntry> {
        let pos = self.queue.iter().position(|p| p.player_id == player_id)?;
        self.queue.remove(pos)
    }

    /// Point a waiting player's entry at a newer connection
    pub fn reattach(&mut self, player_id: PlayerId, outbox: Outbox) -> bool {
        match self.queue.iter_mut().find(|p| p.player_id == player_id) {
            Some(entry) => {
                entry.outbox = outbox;
                true
            }
            None => false,
        }
    }

    /// Check if a player is in the queue
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.queue.iter().any(|p| p.player_id == player_id)
    }

    /// 1-based position of a waiting player
    pub fn position(&self, player_id: PlayerId) -> Option<usize> {
        self.queue
            .iter()
            .position(|p| p.player_id == player_id)
            .map(|pos| pos + 1)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if queue is empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn try_pair(&mut self) -> Option<Pairing> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some(Pairing { first, second })
    }
}
