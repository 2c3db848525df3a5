use glam::Vec3;
use tracing::info;

use crate::components::{JumpProfile, MovementState, Side};
use crate::config::{JumpConfig, WallRunConfig};
use crate::debug::{self, Color, DebugShape, DebugSink};
use crate::math;

use super::state::{StopReason, WallRunStateMachine};

/// Result of a wall jump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpLaunch {
    /// Pawn-forward heading relative to the run direction, wrapped to ±180.
    pub aim_angle: f32,
    pub facing_into_wall: bool,
    /// |aim| clamped to the configured range; also the launch rotation.
    pub clamped_angle: f32,
    /// 0 at the minimum angle (forward profile), 1 at the maximum (side profile).
    pub alpha: f32,
    pub velocity: Vec3,
}

/// Turns a wall-run into a launch whose speed and direction depend on where
/// the pawn looks relative to the run direction.
pub struct JumpLauncher<'a> {
    cfg: &'a WallRunConfig,
}

impl<'a> JumpLauncher<'a> {
    pub fn new(cfg: &'a WallRunConfig) -> Self {
        Self { cfg }
    }

    fn jump(&self) -> &JumpConfig {
        &self.cfg.jump
    }

    /// Interpolation factor for an unsigned aim angle, clamped to [0, 1].
    pub fn alpha(&self, aim_degrees: f32) -> f32 {
        let JumpConfig {
            min_angle,
            max_angle,
            ..
        } = *self.jump();
        let clamped = aim_degrees.abs().clamp(min_angle.min(max_angle), max_angle.max(min_angle));
        let span = max_angle - min_angle;
        if span <= 0.0 {
            return if clamped >= max_angle { 1.0 } else { 0.0 };
        }
        ((clamped - min_angle) / span).clamp(0.0, 1.0)
    }

    /// Blend of the forward and side profiles for an aim angle.
    pub fn jump_speeds(&self, aim_degrees: f32) -> JumpProfile {
        let alpha = self.alpha(aim_degrees);
        let (forward, side) = (self.jump().forward, self.jump().side);
        JumpProfile::new(
            math::lerp(forward.forward_velocity, side.forward_velocity, alpha),
            math::lerp(forward.up_velocity, side.up_velocity, alpha),
        )
    }

    /// Launch velocity for a run along `velocity` on `side`. Pure.
    pub fn launch(&self, velocity: Vec3, pawn_forward: Vec3, side: Side) -> JumpLaunch {
        let aim_angle = math::signed_heading_delta(pawn_forward, velocity);
        let facing_into_wall = match side {
            Side::Left => aim_angle > 0.0,
            Side::Right => aim_angle < 0.0,
        };

        let jump = self.jump();
        let clamped_angle = aim_angle
            .abs()
            .clamp(jump.min_angle.min(jump.max_angle), jump.max_angle.max(jump.min_angle));
        let alpha = self.alpha(aim_angle);
        let speeds = self.jump_speeds(aim_angle);

        let horizontal = math::horizontal_normal(velocity) * speeds.forward_velocity;
        let launched = Vec3::new(horizontal.x, horizontal.y, velocity.z.max(speeds.up_velocity));
        // Always turn away from the wall.
        let launched = math::rotate_about_up(launched, -side.turn_sign() * clamped_angle);

        JumpLaunch {
            aim_angle,
            facing_into_wall,
            clamped_angle,
            alpha,
            velocity: launched,
        }
    }

    /// Jump off the current wall: replaces the velocity and ends the run.
    pub fn jump_off(
        &self,
        state: &mut MovementState,
        pawn_forward: Vec3,
        location: Vec3,
        sink: &mut dyn DebugSink,
    ) -> JumpLaunch {
        let launch = self.launch(state.velocity, pawn_forward, state.run.side);
        state.velocity = launch.velocity;

        if self.cfg.debug.jumps() {
            sink.draw(DebugShape::Point {
                at: state.run.contact.impact_point,
                size: 10.0,
                color: Color::GREEN,
            });
            debug::arrow(sink, location, launch.velocity, 200.0, Color::RED);
        }
        info!(
            aim = launch.aim_angle,
            alpha = launch.alpha,
            into_wall = launch.facing_into_wall,
            "wall jump"
        );

        WallRunStateMachine::new(self.cfg).stop(state, StopReason::Jump);
        launch
    }
}
