use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::fsm::StateMachine;
use crate::math::{self, UP};

/// Which side of the character the wall is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Detection order when looking for a new wall.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Sign of the yaw rotation that turns pawn-forward toward this side.
    /// Counter-clockwise (seen from above) is positive, so Left is +1.
    pub fn turn_sign(self) -> f32 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Sub-states of an active run, in the only order they may occur.
///
/// - `Start`: still rising quickly up the wall.
/// - `Mid`: past the rise, low gravity, duration timer running.
/// - `End`: duration spent, gravity ramps up to force a fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Start,
    Mid,
    End,
}

/// Detected wall surface backing a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub side: Side,
    /// Horizontal unit normal (zero only before the first successful probe).
    pub normal: Vec3,
    pub impact_point: Vec3,
}

impl Contact {
    pub fn new(side: Side, raw_normal: Vec3, impact_point: Vec3) -> Self {
        Self {
            side,
            normal: math::horizontal_normal(raw_normal),
            impact_point,
        }
    }
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            side: Side::Left,
            normal: Vec3::ZERO,
            impact_point: Vec3::ZERO,
        }
    }
}

/// Direction of travel along a wall: the wall normal turned a quarter turn
/// toward `side`.
pub fn wall_run_forward_direction(side: Side, wall_normal: Vec3) -> Vec3 {
    math::rotate_about_up(wall_normal, 90.0 * side.turn_sign())
}

/// Wall-run bookkeeping. Everything but `active` is stale while inactive.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub phase: StateMachine<Phase>,
    pub contact: Contact,
    pub side: Side,
    pub duration_remaining: f32,
    pub timer_armed: bool,
    pub end_gravity: f32,
    pub active: bool,
}

impl RunState {
    pub fn phase(&self) -> Phase {
        self.phase.state
    }

    pub fn forward_direction(&self) -> Vec3 {
        wall_run_forward_direction(self.side, self.contact.normal)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: StateMachine::new(Phase::Start),
            contact: Contact::default(),
            side: Side::Left,
            duration_remaining: 0.0,
            timer_armed: false,
            end_gravity: 0.0,
            active: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnstickState {
    pub requested: bool,
    /// Counts down only while `requested`.
    pub remaining_hold_time: f32,
}

/// Seconds left before each side may be run on again.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CooldownState {
    pub left: f32,
    pub right: f32,
}

/// Launch speeds for one jump direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpProfile {
    pub forward_velocity: f32,
    pub up_velocity: f32,
}

impl JumpProfile {
    pub const fn new(forward_velocity: f32, up_velocity: f32) -> Self {
        Self {
            forward_velocity,
            up_velocity,
        }
    }
}

impl Default for JumpProfile {
    fn default() -> Self {
        Self::new(600.0, 900.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementMode {
    Walking,
    Falling,
    WallRunning,
}

/// Everything the wall-run core mutates for one character, in one place.
/// Snapshots hold value copies of it, never references.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementState {
    pub mode: MovementMode,
    pub velocity: Vec3,
    /// Input acceleration for the current move (already scaled by max acceleration).
    pub acceleration: Vec3,
    pub run: RunState,
    pub unstick: UnstickState,
    pub cooldown: CooldownState,
    /// Side whose wall is close enough for cosmetic consumers (camera tilt etc.).
    pub near_wall: Option<Side>,
}

impl MovementState {
    pub fn new(mode: MovementMode) -> Self {
        Self {
            mode,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            run: RunState::default(),
            unstick: UnstickState::default(),
            cooldown: CooldownState::default(),
            near_wall: None,
        }
    }

    pub fn is_wall_running(&self) -> bool {
        self.run.active && self.mode == MovementMode::WallRunning
    }

    pub fn is_wall_running_side(&self, side: Side) -> bool {
        self.is_wall_running() && self.run.side == side
    }

    pub fn is_falling(&self) -> bool {
        self.mode == MovementMode::Falling
    }
}

impl Default for MovementState {
    fn default() -> Self {
        Self::new(MovementMode::Falling)
    }
}

/// One tick of player intent, as produced locally and replayed by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveInput {
    /// Input intent, length at most 1. Scaled by the current mode's max acceleration.
    pub acceleration: Vec3,
    /// Facing, degrees counter-clockwise from +X.
    pub facing_yaw: f32,
    pub jump: bool,
    pub wants_to_unstick: bool,
}

impl MoveInput {
    pub fn forward(&self) -> Vec3 {
        math::rotate_about_up(Vec3::X, self.facing_yaw)
    }
}

/// Read-only view of the owning pawn for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PawnView {
    pub location: Vec3,
    pub forward: Vec3,
}

impl PawnView {
    pub fn new(location: Vec3, forward: Vec3) -> Self {
        let flat = math::horizontal_normal(forward);
        Self {
            location,
            forward: if flat == Vec3::ZERO { Vec3::X } else { flat },
        }
    }

    pub fn head(&self, offset: f32) -> Vec3 {
        self.location + UP * offset
    }
}
