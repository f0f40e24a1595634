//! Game simulation modules

pub mod bot;
pub mod error;
pub mod grace;
pub mod physics;
pub mod registry;
pub mod room;
pub mod snapshot;

pub use error::GameError;
pub use registry::{RoomRegistry, RoomSettings};

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Stable player identifier supplied by the identity provider
pub type PlayerId = i64;

/// Room identifier (random, unguessable)
pub type RoomId = Uuid;

/// Outbound channel to one connected client
pub type Outbox = mpsc::Sender<ServerMsg>;

/// One of the two player slots in a room. A plays the left paddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    A,
    B,
}

impl Seat {
    pub fn opponent(self) -> Self {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }
}

impl std::fmt::Display for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Seat::A => f.write_str("A"),
            Seat::B => f.write_str("B"),
        }
    }
}

/// Paddle input direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Up,
    #[default]
    Still,
    Down,
}

impl Direction {
    pub fn as_f32(self) -> f32 {
        match self {
            Direction::Up => -1.0,
            Direction::Still => 0.0,
            Direction::Down => 1.0,
        }
    }
}

impl TryFrom<i64> for Direction {
    type Error = GameError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Direction::Up),
            0 => Ok(Direction::Still),
            1 => Ok(Direction::Down),
            other => Err(GameError::InvalidDirection(other)),
        }
    }
}

/// Queue a message for a client without blocking the caller.
///
/// A lagging client loses `state` frames. Any other message is handed to a
/// background send so it is never lost, but two overflowing control messages
/// are not ordered relative to each other.
pub fn deliver(outbox: &Outbox, msg: ServerMsg) {
    match outbox.try_send(msg) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(msg)) if !msg.is_droppable() => {
            let outbox = outbox.clone();
            tokio::spawn(async move {
                let _ = outbox.send(msg).await;
            });
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::trace!("Outbox full, dropping state frame");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

/// A value held per seat
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeatPair<T> {
    pub a: T,
    pub b: T,
}

impl<T> SeatPair<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }
}

impl<T> Index<Seat> for SeatPair<T> {
    type Output = T;

    fn index(&self, seat: Seat) -> &T {
        match seat {
            Seat::A => &self.a,
            Seat::B => &self.b,
        }
    }
}

impl<T> IndexMut<Seat> for SeatPair<T> {
    fn index_mut(&mut self, seat: Seat) -> &mut T {
        match seat {
            Seat::A => &mut self.a,
            Seat::B => &mut self.b,
        }
    }
}
