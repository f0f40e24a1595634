//! Snapshot building for network transmission

use crate::ws::protocol::ServerMsg;

use super::physics::Court;
use super::SeatPair;

/// Decides which ticks are broadcast and builds the `state` message
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        let snapshot_interval = snapshot_interval.max(1);
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for scoring ticks)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    pub fn build(&self, tick: u64, court: &Court) -> ServerMsg {
        ServerMsg::State {
            tick,
            paddles: SeatPair::new(court.paddles.a.y, court.paddles.b.y),
            ball: court.ball,
            score: court.score,
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tick_by_default() {
        let mut builder = SnapshotBuilder::default();
        assert!((0..5).all(|_| builder.should_send()));
    }

    #[test]
    fn test_interval_and_force() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());

        builder.should_send();
        builder.force_next();
        assert!(builder.should_send());
    }
}
