//! Match error taxonomy

/// Errors raised by matchmaking and room operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Already waiting in the matchmaking queue")]
    AlreadyQueued,

    #[error("Already playing in a match")]
    AlreadyInMatch,

    #[error("Not a seat in a running match")]
    NotInMatch,

    #[error("Room no longer exists")]
    RoomNotFound,

    #[error("Invalid paddle direction: {0}")]
    InvalidDirection(i64),

    #[error("Connection is not registered")]
    NotConnected,
}

impl GameError {
    /// Wire code sent in `error` events
    pub fn code(&self) -> &'static str {
        match self {
            GameError::AlreadyQueued => "already_queued",
            GameError::AlreadyInMatch => "already_in_match",
            GameError::NotInMatch => "not_in_match",
            GameError::RoomNotFound => "room_not_found",
            GameError::InvalidDirection(_) => "invalid_direction",
            GameError::NotConnected => "not_connected",
        }
    }

    /// Benign races that are never reported back to the client
    pub fn is_silent(&self) -> bool {
        matches!(self, GameError::NotInMatch)
    }
}
