//! Matchmaking: FIFO queue, connection supervision and the match lifecycle

pub mod lifecycle;
pub mod queue;
pub mod supervisor;

pub use lifecycle::{MatchLifecycle, PlayerIdentity};
