//! Pause grace period bookkeeping for one room

use std::time::Duration;
use tokio::time::Instant;

use super::Seat;

/// Default window between a pause and the automatic forfeit
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// An armed forfeit countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingForfeit {
    /// Seat whose pause or disconnect opened the window
    pub seat: Seat,
    pub deadline: Instant,
}

/// At most one pending forfeit per room
#[derive(Debug, Clone)]
pub struct GraceTimer {
    period: Duration,
    pending: Option<PendingForfeit>,
}

impl GraceTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            pending: None,
        }
    }

    /// Start the countdown. Returns false when one is already running; the
    /// existing deadline is never extended.
    pub fn arm(&mut self, seat: Seat, now: Instant) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(PendingForfeit {
            seat,
            deadline: now + self.period,
        });
        true
    }

    pub fn disarm(&mut self) -> Option<PendingForfeit> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<PendingForfeit> {
        self.pending
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    #[cfg(test)]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.pending.map(|p| now >= p.deadline).unwrap_or(false)
    }
}

impl Default for GraceTimer {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_arm_keeps_first_deadline() {
        let now = Instant::now();
        let mut timer = GraceTimer::default();

        assert!(timer.arm(Seat::A, now));
        assert!(!timer.arm(Seat::B, now + Duration::from_secs(3)));

        let pending = timer.pending().unwrap();
        assert_eq!(pending.seat, Seat::A);
        assert_eq!(pending.deadline, now + DEFAULT_GRACE_PERIOD);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let mut timer = GraceTimer::new(Duration::from_secs(10));
        timer.arm(Seat::B, now);

        assert!(!timer.is_expired(now + Duration::from_millis(9_999)));
        assert!(timer.is_expired(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_disarm_without_pending_is_noop() {
        let mut timer = GraceTimer::default();
        assert!(timer.disarm().is_none());
        assert!(timer.deadline().is_none());
    }
}
