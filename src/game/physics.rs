//! Ball and paddle physics for one court
//!
//! Everything here is pure: a step reads and writes a [`Court`] and draws serve
//! angles from the caller's RNG. No timers, no I/O.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bot::BotPolicy;
use super::{Direction, Seat, SeatPair};

/// Court width in logical units
pub const FIELD_WIDTH: f32 = 800.0;
/// Court height in logical units
pub const FIELD_HEIGHT: f32 = 500.0;
pub const PADDLE_WIDTH: f32 = 20.0;
pub const PADDLE_HEIGHT: f32 = 100.0;
/// Paddle travel per direction unit per tick
pub const PADDLE_SPEED: f32 = 3.0;
/// The ball is a square of this edge
pub const BALL_SIZE: f32 = 20.0;
pub const SERVE_SPEED: f32 = 2.0;
/// Serve angle off the horizontal (22.5 degrees)
pub const SERVE_ANGLE: f32 = std::f32::consts::FRAC_PI_8;
/// Vertical speed given by a hit on the very edge of a paddle
pub const BOUNCE_FACTOR: f32 = 5.0;
pub const WIN_SCORE: u32 = 5;

/// Lowest paddle top
pub const PADDLE_MAX_Y: f32 = FIELD_HEIGHT - PADDLE_HEIGHT;
/// Lowest ball top
pub const BALL_MAX_Y: f32 = FIELD_HEIGHT - BALL_SIZE;
/// Ball x at which the right paddle is reached
pub const RIGHT_BAND_X: f32 = FIELD_WIDTH - PADDLE_WIDTH - BALL_SIZE;
/// Ball x at which seat A scores
pub const RIGHT_GOAL_X: f32 = FIELD_WIDTH - BALL_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleState {
    pub y: f32,
    #[serde(skip)]
    pub direction: Direction,
}

impl PaddleState {
    pub fn centered() -> Self {
        Self {
            y: PADDLE_MAX_Y / 2.0,
            direction: Direction::Still,
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + PADDLE_HEIGHT / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

impl BallState {
    pub fn center_y(&self) -> f32 {
        self.y + BALL_SIZE / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub a: u32,
    pub b: u32,
}

impl Score {
    fn increment(&mut self, seat: Seat) -> u32 {
        let slot = match seat {
            Seat::A => &mut self.a,
            Seat::B => &mut self.b,
        };
        *slot += 1;
        *slot
    }

    /// Seat that reached the win score, if any
    pub fn winner(&self) -> Option<Seat> {
        if self.a >= WIN_SCORE {
            Some(Seat::A)
        } else if self.b >= WIN_SCORE {
            Some(Seat::B)
        } else {
            None
        }
    }
}

/// Everything the simulation moves
#[derive(Debug, Clone, PartialEq)]
pub struct Court {
    pub paddles: SeatPair<PaddleState>,
    pub ball: BallState,
    pub score: Score,
}

impl Court {
    /// Fresh court with a neutral first serve
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        Self {
            paddles: SeatPair::new(PaddleState::centered(), PaddleState::centered()),
            ball: PhysicsEngine::serve(None, rng),
            score: Score::default(),
        }
    }
}

/// Result of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Scored(Seat),
    /// The seat reached the win score on this tick
    Won(Seat),
}

pub struct PhysicsEngine;

impl PhysicsEngine {
    /// Advance the court by one fixed tick
    pub fn step<R: Rng>(court: &mut Court, bot: Option<&dyn BotPolicy>, rng: &mut R) -> TickOutcome {
        Self::move_paddle(&mut court.paddles.a);
        Self::move_paddle(&mut court.paddles.b);

        if let Some(policy) = bot {
            court.paddles.b.direction = policy.steer(&court.ball, &court.paddles.b);
        }

        let ball = &mut court.ball;
        ball.x += ball.dx;
        ball.y += ball.dy;

        Self::bounce_walls(ball);

        if ball.dx < 0.0 && ball.x <= PADDLE_WIDTH && Self::overlaps(ball, &court.paddles.a) {
            ball.x = PADDLE_WIDTH;
            ball.dx = -ball.dx;
            ball.dy = Self::deflection(ball, &court.paddles.a);
        } else if ball.dx > 0.0 && ball.x >= RIGHT_BAND_X && Self::overlaps(ball, &court.paddles.b) {
            ball.x = RIGHT_BAND_X;
            ball.dx = -ball.dx;
            ball.dy = Self::deflection(ball, &court.paddles.b);
        }

        let scorer = if ball.x <= 0.0 {
            Some(Seat::B)
        } else if ball.x >= RIGHT_GOAL_X {
            Some(Seat::A)
        } else {
            None
        };

        match scorer {
            Some(seat) => {
                let points = court.score.increment(seat);
                court.ball = Self::serve(Some(seat), rng);
                if points >= WIN_SCORE {
                    TickOutcome::Won(seat)
                } else {
                    TickOutcome::Scored(seat)
                }
            }
            None => TickOutcome::Continue,
        }
    }

    /// Apply one tick of paddle travel, clamped to the court
    pub fn move_paddle(paddle: &mut PaddleState) {
        let y = paddle.y + paddle.direction.as_f32() * PADDLE_SPEED;
        paddle.y = y.clamp(0.0, PADDLE_MAX_Y);
    }

    /// Reflect off the top and bottom walls
    pub fn bounce_walls(ball: &mut BallState) {
        if ball.y <= 0.0 {
            ball.y = 0.0;
            ball.dy = -ball.dy;
        } else if ball.y >= BALL_MAX_Y {
            ball.y = BALL_MAX_Y;
            ball.dy = -ball.dy;
        }
    }

    fn overlaps(ball: &BallState, paddle: &PaddleState) -> bool {
        ball.y + BALL_SIZE >= paddle.y && ball.y <= paddle.y + PADDLE_HEIGHT
    }

    /// Vertical speed after a paddle hit: offset from paddle center in [-1, 1], scaled
    pub fn deflection(ball: &BallState, paddle: &PaddleState) -> f32 {
        let half = PADDLE_HEIGHT / 2.0;
        ((ball.center_y() - paddle.center_y()) / half) * BOUNCE_FACTOR
    }

    /// Centered ball heading toward `toward` (the seat that just scored), or
    /// a random side on the first serve
    pub fn serve<R: Rng>(toward: Option<Seat>, rng: &mut R) -> BallState {
        let horizontal = match toward {
            Some(Seat::A) => -1.0,
            Some(Seat::B) => 1.0,
            None => {
                if rng.gen_bool(0.5) {
                    1.0
                } else {
                    -1.0
                }
            }
        };
        let vertical = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

        BallState {
            x: (FIELD_WIDTH - BALL_SIZE) / 2.0,
            y: (FIELD_HEIGHT - BALL_SIZE) / 2.0,
            dx: horizontal * SERVE_SPEED * SERVE_ANGLE.cos(),
            dy: vertical * SERVE_SPEED * SERVE_ANGLE.sin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn court() -> Court {
        Court::new(&mut ChaCha8Rng::seed_from_u64(7))
    }

    #[test]
    fn test_paddle_stays_on_court() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut paddle = PaddleState::centered();

        for _ in 0..10_000 {
            paddle.direction = match rng.gen_range(0..3) {
                0 => Direction::Up,
                1 => Direction::Still,
                _ => Direction::Down,
            };
            PhysicsEngine::move_paddle(&mut paddle);
            assert!(paddle.y >= 0.0 && paddle.y <= PADDLE_MAX_Y, "y = {}", paddle.y);
        }
    }

    #[test]
    fn test_paddle_moves_three_units_per_tick() {
        let mut paddle = PaddleState::centered();
        paddle.direction = Direction::Down;
        PhysicsEngine::move_paddle(&mut paddle);
        assert_eq!(paddle.y, 203.0);

        paddle.y = 1.0;
        paddle.direction = Direction::Up;
        PhysicsEngine::move_paddle(&mut paddle);
        assert_eq!(paddle.y, 0.0);
    }

    #[test]
    fn test_wall_bounce_flips_dy_and_clamps() {
        let mut ball = BallState { x: 400.0, y: -2.0, dx: 1.0, dy: -3.0 };
        PhysicsEngine::bounce_walls(&mut ball);
        assert_eq!(ball.y, 0.0);
        assert_eq!(ball.dy, 3.0);

        let mut ball = BallState { x: 400.0, y: 483.0, dx: 1.0, dy: 4.0 };
        PhysicsEngine::bounce_walls(&mut ball);
        assert_eq!(ball.y, BALL_MAX_Y);
        assert_eq!(ball.dy, -4.0);
    }

    #[test]
    fn test_ball_never_leaves_vertical_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut court = court();
        court.ball.dy = 5.5;

        for _ in 0..20_000 {
            PhysicsEngine::step(&mut court, None, &mut rng);
            assert!(court.ball.y >= 0.0 && court.ball.y <= BALL_MAX_Y, "y = {}", court.ball.y);
        }
    }

    #[test]
    fn test_paddle_hit_redirects_by_offset() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut court = court();
        // Paddle A spans 200..300, center 250. Ball center ends at 275.
        court.ball = BallState { x: 22.0, y: 265.0, dx: -2.0, dy: 0.0 };

        let outcome = PhysicsEngine::step(&mut court, None, &mut rng);

        assert_eq!(outcome, TickOutcome::Continue);
        assert_eq!(court.ball.x, PADDLE_WIDTH);
        assert_eq!(court.ball.dx, 2.0);
        assert!((court.ball.dy - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_right_paddle_hit_reflects() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut court = court();
        court.ball = BallState { x: 759.0, y: 240.0, dx: 2.0, dy: 0.0 };

        PhysicsEngine::step(&mut court, None, &mut rng);

        assert_eq!(court.ball.x, RIGHT_BAND_X);
        assert_eq!(court.ball.dx, -2.0);
        assert!(court.ball.dy.abs() < 1e-5);
    }

    #[test]
    fn test_scoring_is_exclusive() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut court = court();
        court.paddles.b.y = 0.0;
        court.ball = BallState { x: 779.0, y: 400.0, dx: 2.0, dy: 0.0 };

        let outcome = PhysicsEngine::step(&mut court, None, &mut rng);

        assert_eq!(outcome, TickOutcome::Scored(Seat::A));
        assert_eq!(court.score, Score { a: 1, b: 0 });
    }

    #[test]
    fn test_serve_heads_toward_scorer() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut court = court();
        court.paddles.a.y = 0.0;
        court.ball = BallState { x: 1.0, y: 400.0, dx: -2.0, dy: 0.0 };

        let outcome = PhysicsEngine::step(&mut court, None, &mut rng);

        assert_eq!(outcome, TickOutcome::Scored(Seat::B));
        assert!(court.ball.dx > 0.0);
        assert_eq!(court.ball.x, 390.0);
        assert_eq!(court.ball.y, 240.0);
        let speed = (court.ball.dx.powi(2) + court.ball.dy.powi(2)).sqrt();
        assert!((speed - SERVE_SPEED).abs() < 1e-5);
    }

    #[test]
    fn test_win_on_fifth_point_not_fourth() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut court = court();
        court.paddles.b.y = 0.0;
        court.score = Score { a: 3, b: 2 };

        court.ball = BallState { x: 779.0, y: 400.0, dx: 2.0, dy: 0.0 };
        assert_eq!(PhysicsEngine::step(&mut court, None, &mut rng), TickOutcome::Scored(Seat::A));
        assert_eq!(court.score.winner(), None);

        court.ball = BallState { x: 779.0, y: 400.0, dx: 2.0, dy: 0.0 };
        assert_eq!(PhysicsEngine::step(&mut court, None, &mut rng), TickOutcome::Won(Seat::A));
        assert_eq!(court.score, Score { a: 5, b: 2 });
        assert_eq!(court.score.winner(), Some(Seat::A));
    }
}
