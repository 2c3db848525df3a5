//! Contract of the host's generic character mover.
//!
//! The wall-run integrator specialises the host's falling integrator. Rather
//! than reimplementing collision response it calls back into the host through
//! [`BaseMover`]. The `scene` module ships a reference implementation.

use glam::Vec3;

use crate::components::MovementMode;

/// Sub-steps shorter than this are not simulated.
pub const MIN_TICK_TIME: f32 = 1.0e-6;

/// Result of sweeping the character along a displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveHit {
    pub blocking: bool,
    /// Fraction of the requested displacement covered before the hit.
    /// 1.0 when nothing was hit.
    pub time: f32,
    /// Normal of the swept shape at contact.
    pub normal: Vec3,
    /// Normal of the surface that was hit.
    pub impact_normal: Vec3,
    /// Character location after the sweep.
    pub location: Vec3,
    pub start_penetrating: bool,
}

impl MoveHit {
    /// Unobstructed move ending at `location`.
    pub fn clear(location: Vec3) -> Self {
        Self {
            blocking: false,
            time: 1.0,
            normal: Vec3::ZERO,
            impact_normal: Vec3::ZERO,
            location,
            start_penetrating: false,
        }
    }

    pub fn is_valid_blocking_hit(&self) -> bool {
        self.blocking && !self.start_penetrating
    }
}

/// Speed limits handed to `velocity_from_acceleration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityLimits {
    pub max_speed: f32,
    pub max_acceleration: f32,
    pub braking_deceleration: f32,
}

/// Variable-height jump bookkeeping owned by the character.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JumpForce {
    pub time_remaining: f32,
    /// When false, gravity is suspended while jump force remains.
    pub apply_gravity_while_jumping: bool,
}

/// What the host wants after being told about an impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactResponse {
    Continue,
    /// The host switched the character out of wall-running (e.g. a scripted
    /// knock-back). Remaining sub-steps are skipped.
    Detach,
}

pub trait BaseMover {
    fn location(&self) -> Vec3;

    /// Teleport, used when the authority corrects a prediction.
    fn set_location(&mut self, location: Vec3);

    /// Signed gravity along Z (negative is down).
    fn gravity_z(&self) -> f32;

    fn max_simulation_iterations(&self) -> u32;

    fn max_jump_apex_attempts(&self) -> u32;

    /// Length of the next sub-step given the time left this tick.
    fn simulation_time_step(&self, remaining: f32, iterations: u32) -> f32;

    /// Standard acceleration/braking/friction velocity update.
    fn velocity_from_acceleration(
        &self,
        velocity: Vec3,
        acceleration: Vec3,
        dt: f32,
        friction: f32,
        limits: &VelocityLimits,
    ) -> Vec3;

    /// Free-fall velocity update (terminal velocity clamp included).
    fn apply_gravity(&self, velocity: Vec3, gravity: Vec3, dt: f32) -> Vec3;

    /// Sweep the character by `delta`, stopping at the first blocking hit.
    fn move_and_collide(&mut self, delta: Vec3) -> MoveHit;

    /// Deflect the `time` fraction of `delta` along the surface `normal`.
    fn slide_along_surface(&self, delta: Vec3, time: f32, normal: Vec3, hit: &MoveHit) -> Vec3;

    /// Adjust a slide after hitting a second surface in the same move.
    fn two_wall_adjust(&self, delta: Vec3, hit: &MoveHit, old_hit_normal: Vec3) -> Vec3;

    fn is_valid_landing_spot(&self, location: Vec3, hit: &MoveHit) -> bool;

    /// Whether an otherwise invalid landing hit deserves a floor check.
    fn should_check_for_valid_landing_spot(&self, _dt: f32, _delta: Vec3, _hit: &MoveHit) -> bool {
        false
    }

    /// Walkable floor directly below `location`, if any.
    fn find_floor(&self, location: Vec3) -> Option<MoveHit>;

    fn should_limit_air_control(&self, dt: f32, acceleration: Vec3) -> bool;

    fn limit_air_control(
        &self,
        dt: f32,
        acceleration: Vec3,
        hit: &MoveHit,
        check_landing_spot: bool,
    ) -> Vec3;

    fn handle_impact(&mut self, _hit: &MoveHit, _time_slice: f32, _delta: Vec3) -> ImpactResponse {
        ImpactResponse::Continue
    }

    fn walkable_floor_z(&self) -> f32;

    fn perch_radius_threshold(&self) -> f32 {
        0.0
    }

    fn jump_z_velocity(&self) -> f32;

    /// Acceleration reached at full input outside a wall-run.
    fn max_acceleration(&self) -> f32;

    /// Deterministic random stream in [0, 1). Seeded identically on client and server.
    fn random_unit(&mut self) -> f32;

    /// Restart the random stream for the move stamped `tick`. Called before
    /// every simulated, replayed or applied move so each draws the same numbers.
    fn seed_random(&mut self, tick: u64);

    fn jump_force(&mut self) -> &mut JumpForce;

    fn has_root_motion_override(&self) -> bool {
        false
    }

    fn apply_root_motion(&mut self, velocity: Vec3, _dt: f32) -> Vec3 {
        velocity
    }

    /// Generic falling/walking physics. Returns the mode after the step.
    fn simulate_base(
        &mut self,
        mode: MovementMode,
        velocity: &mut Vec3,
        acceleration: Vec3,
        dt: f32,
    ) -> MovementMode;
}
