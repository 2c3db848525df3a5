use glam::Vec3;
use tracing::debug;

use crate::components::{MovementMode, MovementState, MoveInput, PawnView, Side};
use crate::config::WallRunConfig;
use crate::debug::DebugSink;
use crate::engine::{BaseMover, Raycast};

use super::integrator::{StepOutcome, WallRunIntegrator};
use super::jump::{JumpLaunch, JumpLauncher};
use super::state::{StopReason, WallRunStateMachine};

/// What happened during one [`WallRunMovement::perform_move`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveReport {
    pub started: Option<Side>,
    pub stopped: Option<StopReason>,
    pub jump: Option<JumpLaunch>,
    /// Touched walkable floor while wall-running.
    pub landed: bool,
}

/// One simulated tick for one character: jump, wall-run bookkeeping, physics.
///
/// Both the predicting client and the authority drive characters through
/// here, which is what keeps their results identical.
pub struct WallRunMovement<'a> {
    cfg: &'a WallRunConfig,
}

impl<'a> WallRunMovement<'a> {
    pub fn new(cfg: &'a WallRunConfig) -> Self {
        Self { cfg }
    }

    pub fn state_machine(&self) -> WallRunStateMachine<'a> {
        WallRunStateMachine::new(self.cfg)
    }

    /// Max acceleration for the current mode.
    pub fn max_acceleration(&self, state: &MovementState, mover: &impl BaseMover) -> f32 {
        if state.is_wall_running() {
            self.cfg.speed.run_acceleration
        } else {
            mover.max_acceleration()
        }
    }

    /// Advance one tick. Unstick input must already be applied to `state`.
    ///
    /// Order: acceleration from input, jump, state machine tick, physics.
    /// Landing on the wall hands the leftover time to walking.
    pub fn perform_move<W, M>(
        &self,
        state: &mut MovementState,
        world: &W,
        mover: &mut M,
        input: &MoveInput,
        dt: f32,
        sink: &mut dyn DebugSink,
    ) -> MoveReport
    where
        W: Raycast + ?Sized,
        M: BaseMover,
    {
        let mut report = MoveReport::default();
        let pawn = PawnView::new(mover.location(), input.forward());

        state.acceleration =
            input.acceleration.clamp_length_max(1.0) * self.max_acceleration(state, &*mover);

        if input.jump {
            if state.is_wall_running() {
                let launch = JumpLauncher::new(self.cfg).jump_off(state, pawn.forward, pawn.location, sink);
                report.jump = Some(launch);
                report.stopped = Some(StopReason::Jump);
            } else if state.mode == MovementMode::Walking {
                state.velocity.z = state.velocity.z.max(mover.jump_z_velocity());
                state.mode = MovementMode::Falling;
                debug!(vz = state.velocity.z, "jump");
            }
        }

        let tick = self.state_machine().tick(state, &world, Some(&pawn), dt);
        report.started = tick.started;
        if tick.stopped.is_some() {
            report.stopped = tick.stopped;
        }
        if state.is_wall_running() {
            // Acceleration limit may have changed on attach.
            state.acceleration =
                input.acceleration.clamp_length_max(1.0) * self.max_acceleration(state, &*mover);
        }

        match state.mode {
            MovementMode::WallRunning => {
                match WallRunIntegrator::new(self.cfg).step(state, mover, dt, sink) {
                    StepOutcome::Completed => {}
                    StepOutcome::Aborted => {
                        report.stopped = report.stopped.or(Some(StopReason::Detached));
                    }
                    StepOutcome::Landed { remaining, .. } => {
                        report.landed = true;
                        report.stopped = Some(StopReason::Landed);
                        state.velocity.z = 0.0;
                        state.mode = mover.simulate_base(
                            MovementMode::Walking,
                            &mut state.velocity,
                            state.acceleration,
                            remaining,
                        );
                    }
                }
            }
            mode => {
                state.mode = mover.simulate_base(mode, &mut state.velocity, state.acceleration, dt);
            }
        }
        report
    }

    /// Direction of travel along the current wall, zero when not running.
    pub fn run_forward(&self, state: &MovementState) -> Vec3 {
        if state.is_wall_running() {
            state.run.forward_direction()
        } else {
            Vec3::ZERO
        }
    }
}
