//! Computer opponent policies

use super::physics::{BallState, PaddleState};
use super::Direction;

/// Decides the bot paddle's direction once per tick
pub trait BotPolicy: Send {
    fn name(&self) -> &'static str;

    fn steer(&self, ball: &BallState, paddle: &PaddleState) -> Direction;
}

/// Follows the ball center with a one unit dead band. No lookahead, no delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackingBot;

impl TrackingBot {
    const DEAD_BAND: f32 = 1.0;
}

impl BotPolicy for TrackingBot {
    fn name(&self) -> &'static str {
        "tracking"
    }

    fn steer(&self, ball: &BallState, paddle: &PaddleState) -> Direction {
        let target = ball.center_y();
        let center = paddle.center_y();

        if target < center - Self::DEAD_BAND {
            Direction::Up
        } else if target > center + Self::DEAD_BAND {
            Direction::Down
        } else {
            Direction::Still
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_at(y: f32) -> BallState {
        BallState { x: 400.0, y, dx: 2.0, dy: 0.0 }
    }

    #[test]
    fn test_tracking_bot_follows_ball() {
        let bot = TrackingBot;
        let paddle = PaddleState::centered(); // center 250

        assert_eq!(bot.steer(&ball_at(100.0), &paddle), Direction::Up);
        assert_eq!(bot.steer(&ball_at(400.0), &paddle), Direction::Down);
    }

    #[test]
    fn test_tracking_bot_holds_inside_dead_band() {
        let bot = TrackingBot;
        let paddle = PaddleState::centered();

        // Ball center 250.5 vs paddle center 250
        assert_eq!(bot.steer(&ball_at(240.5), &paddle), Direction::Still);
        assert_eq!(bot.steer(&ball_at(239.5), &paddle), Direction::Still);
    }
}
