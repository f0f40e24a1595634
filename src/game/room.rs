//! Room state and the authoritative per-room tick loop

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval};
use tracing::{debug, error, info};

use crate::util::time::tick_clock;
use crate::ws::protocol::ServerMsg;

use super::bot::BotPolicy;
use super::grace::GraceTimer;
use super::physics::{Court, PhysicsEngine, Score, TickOutcome};
use super::snapshot::SnapshotBuilder;
use super::{deliver, Direction, Outbox, PlayerId, RoomId, Seat, SeatPair};

/// Room lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Allocated, not yet announced to the seats
    WaitingForPlayers,
    Active,
    /// Ticking suspended until resume or forfeit
    Paused,
    Finished,
}

/// A human occupying a seat
#[derive(Debug, Clone)]
pub struct HumanPlayer {
    pub player_id: PlayerId,
    pub display_name: String,
    pub outbox: Outbox,
    pub connected: bool,
}

impl HumanPlayer {
    pub fn new(player_id: PlayerId, display_name: String, outbox: Outbox) -> Self {
        Self {
            player_id,
            display_name,
            outbox,
            connected: true,
        }
    }
}

/// Seat occupant
pub enum Player {
    Human(HumanPlayer),
    Bot(Box<dyn BotPolicy>),
}

impl Player {
    pub fn human(&self) -> Option<&HumanPlayer> {
        match self {
            Player::Human(human) => Some(human),
            Player::Bot(_) => None,
        }
    }

    pub fn human_mut(&mut self) -> Option<&mut HumanPlayer> {
        match self {
            Player::Human(human) => Some(human),
            Player::Bot(_) => None,
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.human().map(|h| h.player_id)
    }

    pub fn display_name(&self) -> String {
        match self {
            Player::Human(human) => human.display_name.clone(),
            Player::Bot(policy) => format!("Bot ({})", policy.name()),
        }
    }

    /// Bots never disconnect
    pub fn is_connected(&self) -> bool {
        self.human().map(|h| h.connected).unwrap_or(true)
    }
}

/// Why a room finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// A seat reached the win score
    Score,
    /// Explicit leave or an expired grace period
    Forfeit,
    /// Both seats gone, or the room was torn down; no winner
    Abandoned,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Score => "score",
            FinishReason::Forfeit => "forfeit",
            FinishReason::Abandoned => "abandoned",
        }
    }
}

/// Terminal result of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub room_id: RoomId,
    pub winner: Option<Seat>,
    pub score: Score,
    pub reason: FinishReason,
}

/// Point-in-time view of a room for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomView {
    pub id: RoomId,
    pub status: RoomStatus,
    pub paused_by: Option<Seat>,
    pub score: Score,
    pub tick: u64,
}

/// Room state (owned by the room task)
pub struct RoomState {
    pub id: RoomId,
    pub seats: SeatPair<Player>,
    pub court: Court,
    pub status: RoomStatus,
    pub paused_by: Option<Seat>,
    pub tick: u64,
    rng: ChaCha8Rng,
}

impl RoomState {
    pub fn new(id: RoomId, seats: SeatPair<Player>, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let court = Court::new(&mut rng);
        Self {
            id,
            seats,
            court,
            status: RoomStatus::WaitingForPlayers,
            paused_by: None,
            tick: 0,
            rng,
        }
    }

    pub fn start(&mut self) {
        if self.status == RoomStatus::WaitingForPlayers {
            self.status = RoomStatus::Active;
        }
    }

    /// Run one physics step. `None` unless the room is active.
    pub fn advance(&mut self) -> Option<TickOutcome> {
        if self.status != RoomStatus::Active {
            return None;
        }
        self.tick += 1;

        let bot = match &self.seats.b {
            Player::Bot(policy) => Some(&**policy),
            Player::Human(_) => None,
        };
        let outcome = PhysicsEngine::step(&mut self.court, bot, &mut self.rng);

        if let TickOutcome::Won(_) = outcome {
            self.status = RoomStatus::Finished;
        }
        Some(outcome)
    }

    /// Apply a human seat's input. Ignored unless the room is active.
    pub fn set_direction(&mut self, seat: Seat, direction: Direction) -> bool {
        if self.status != RoomStatus::Active || self.seats[seat].human().is_none() {
            return false;
        }
        self.court.paddles[seat].direction = direction;
        true
    }

    /// Active -> Paused. False if the room was not active.
    pub fn pause(&mut self, seat: Seat) -> bool {
        if self.status != RoomStatus::Active {
            return false;
        }
        self.status = RoomStatus::Paused;
        self.paused_by = Some(seat);
        true
    }

    /// Paused -> Active. False if the room was not paused.
    pub fn resume(&mut self) -> bool {
        if self.status != RoomStatus::Paused {
            return false;
        }
        self.status = RoomStatus::Active;
        self.paused_by = None;
        true
    }

    pub fn finish(&mut self) {
        self.status = RoomStatus::Finished;
        self.paused_by = None;
    }

    pub fn all_connected(&self) -> bool {
        self.seats.a.is_connected() && self.seats.b.is_connected()
    }

    /// Human seats that are currently disconnected
    pub fn disconnected_seats(&self) -> Vec<Seat> {
        [Seat::A, Seat::B]
            .into_iter()
            .filter(|seat| !self.seats[*seat].is_connected())
            .collect()
    }

    pub fn view(&self) -> RoomView {
        RoomView {
            id: self.id,
            status: self.status,
            paused_by: self.paused_by,
            score: self.court.score,
            tick: self.tick,
        }
    }

    /// Send a message to every human seat
    pub fn broadcast(&self, msg: &ServerMsg) {
        for seat in [Seat::A, Seat::B] {
            if let Some(human) = self.seats[seat].human() {
                deliver(&human.outbox, msg.clone());
            }
        }
    }

    /// Tell each human seat where it sits
    pub fn announce_start(&self) {
        for seat in [Seat::A, Seat::B] {
            if let Some(human) = self.seats[seat].human() {
                deliver(
                    &human.outbox,
                    ServerMsg::StartGame {
                        seat,
                        room: self.id,
                        opponent: self.seats[seat.opponent()].display_name(),
                    },
                );
            }
        }
    }

    /// Send `gameOver` relative to each human seat
    pub fn announce_result(&self, outcome: &MatchOutcome) {
        for seat in [Seat::A, Seat::B] {
            if let Some(human) = self.seats[seat].human() {
                deliver(
                    &human.outbox,
                    ServerMsg::GameOver {
                        won: outcome.winner == Some(seat),
                        score: outcome.score,
                    },
                );
            }
        }
    }
}

/// Commands routed into a room task
pub enum RoomCommand {
    Move { seat: Seat, direction: Direction },
    /// Client-initiated pause
    Pause { seat: Seat },
    /// Transport dropped for this seat
    Disconnect { seat: Seat },
    /// Resume request; re-attaches the seat's outbox when one is given
    Resume {
        seat: Seat,
        outbox: Option<Outbox>,
        reply: Option<oneshot::Sender<RoomView>>,
    },
    /// Immediate forfeit by `seat`
    Leave { seat: Seat },
    #[cfg(test)]
    Inspect { reply: oneshot::Sender<RoomView> },
}

enum RoomEvent {
    Command(RoomCommand),
    Tick,
    GraceExpired,
    Closed,
}

/// The authoritative game room
pub struct GameRoom {
    state: RoomState,
    commands: mpsc::Receiver<RoomCommand>,
    /// The room's only tick timer; `None` whenever the room is not active
    clock: Option<Interval>,
    grace: GraceTimer,
    snapshots: SnapshotBuilder,
    tick_period: Duration,
    outcome: Option<MatchOutcome>,
}

impl GameRoom {
    pub fn new(
        state: RoomState,
        commands: mpsc::Receiver<RoomCommand>,
        tick_period: Duration,
        grace_period: Duration,
        snapshot_interval: u32,
    ) -> Self {
        Self {
            state,
            commands,
            clock: None,
            grace: GraceTimer::new(grace_period),
            snapshots: SnapshotBuilder::new(snapshot_interval),
            tick_period,
            outcome: None,
        }
    }

    /// Run the room until it finishes. Returns the final state for announcement.
    pub async fn run(mut self) -> (RoomState, MatchOutcome) {
        info!(room_id = %self.state.id, "Room started");

        self.state.announce_start();
        self.state.start();
        self.clock = Some(tick_clock(self.tick_period));

        loop {
            let event = tokio::select! {
                biased;
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => RoomEvent::Command(cmd),
                    None => RoomEvent::Closed,
                },
                _ = next_tick(&mut self.clock) => RoomEvent::Tick,
                _ = grace_expiry(self.grace.deadline()) => RoomEvent::GraceExpired,
            };

            match event {
                RoomEvent::Command(cmd) => self.handle_command(cmd),
                RoomEvent::Tick => self.run_tick(),
                RoomEvent::GraceExpired => self.expire_grace(),
                RoomEvent::Closed => {
                    debug!(room_id = %self.state.id, "Command channel closed");
                    self.finish(FinishReason::Abandoned, None);
                }
            }

            if let Some(outcome) = self.outcome.take() {
                return (self.state, outcome);
            }
        }
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Move { seat, direction } => {
                if !self.state.set_direction(seat, direction) {
                    debug!(room_id = %self.state.id, %seat, "Ignored move outside active play");
                }
            }
            RoomCommand::Pause { seat } => self.pause(seat),
            RoomCommand::Disconnect { seat } => self.disconnect(seat),
            RoomCommand::Resume { seat, outbox, reply } => {
                if let Some(outbox) = outbox {
                    if let Some(human) = self.state.seats[seat].human_mut() {
                        human.outbox = outbox;
                        human.connected = true;
                    }
                }
                self.resume(seat);
                if let Some(reply) = reply {
                    let _ = reply.send(self.state.view());
                }
            }
            RoomCommand::Leave { seat } => {
                info!(room_id = %self.state.id, %seat, "Seat left the match");
                self.finish(FinishReason::Forfeit, Some(seat.opponent()));
            }
            #[cfg(test)]
            RoomCommand::Inspect { reply } => {
                let _ = reply.send(self.state.view());
            }
        }
    }

    fn run_tick(&mut self) {
        let Some(outcome) = self.state.advance() else {
            return;
        };

        match outcome {
            TickOutcome::Continue => {}
            TickOutcome::Scored(seat) | TickOutcome::Won(seat) => {
                debug!(room_id = %self.state.id, %seat, score = ?self.state.court.score, "Point scored");
                self.snapshots.force_next();
            }
        }

        if self.snapshots.should_send() {
            let snapshot = self.snapshots.build(self.state.tick, &self.state.court);
            self.state.broadcast(&snapshot);
        }

        if let TickOutcome::Won(seat) = outcome {
            self.finish(FinishReason::Score, Some(seat));
        }
    }

    /// Shared pause path for explicit pauses and disconnects
    fn pause(&mut self, seat: Seat) {
        if !self.state.pause(seat) {
            debug!(room_id = %self.state.id, %seat, status = ?self.state.status, "Pause ignored");
            return;
        }

        self.clock = None;
        if !self.grace.arm(seat, Instant::now()) {
            error!(room_id = %self.state.id, %seat, "Grace timer already armed for a room that was active");
        }

        info!(room_id = %self.state.id, %seat, "Room paused");
        self.state.broadcast(&ServerMsg::Paused { seat });
    }

    fn disconnect(&mut self, seat: Seat) {
        if let Some(human) = self.state.seats[seat].human_mut() {
            human.connected = false;
        }

        if self.state.disconnected_seats().len() == 2 {
            info!(room_id = %self.state.id, "Both seats disconnected, closing room");
            self.finish(FinishReason::Abandoned, None);
            return;
        }

        self.pause(seat);
    }

    /// Resume needs a pending grace period and every human seat connected
    fn resume(&mut self, seat: Seat) {
        if self.grace.pending().is_none() {
            debug!(room_id = %self.state.id, %seat, "Nothing to resume");
            return;
        }
        if !self.state.all_connected() {
            debug!(room_id = %self.state.id, %seat, "Resume refused while a seat is away");
            return;
        }

        self.grace.disarm();
        if !self.state.resume() {
            error!(room_id = %self.state.id, status = ?self.state.status, "Grace timer pending on a room that was not paused");
            return;
        }
        self.clock = Some(tick_clock(self.tick_period));

        info!(room_id = %self.state.id, %seat, "Room resumed");
        self.state.broadcast(&ServerMsg::Resumed);
    }

    fn expire_grace(&mut self) {
        let Some(pending) = self.grace.disarm() else {
            return;
        };

        let away = self.state.disconnected_seats();
        let loser = match away.as_slice() {
            [seat] => *seat,
            _ => pending.seat,
        };

        info!(room_id = %self.state.id, seat = %loser, "Grace period expired, seat forfeits");
        self.finish(FinishReason::Forfeit, Some(loser.opponent()));
    }

    fn finish(&mut self, reason: FinishReason, winner: Option<Seat>) {
        self.state.finish();
        self.clock = None;
        self.grace.disarm();

        let outcome = MatchOutcome {
            room_id: self.state.id,
            winner,
            score: self.state.court.score,
            reason,
        };
        info!(
            room_id = %self.state.id,
            winner = ?winner,
            reason = reason.as_str(),
            score_a = outcome.score.a,
            score_b = outcome.score.b,
            "Room finished"
        );
        self.outcome = Some(outcome);
    }
}

async fn next_tick(clock: &mut Option<Interval>) {
    match clock {
        Some(clock) => {
            clock.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn grace_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
