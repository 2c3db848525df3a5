use tracing::{debug, info};

use crate::components::{
    wall_run_forward_direction, Contact, MovementMode, MovementState, PawnView, Phase, Side,
    UnstickState,
};
use crate::config::WallRunConfig;
use crate::engine::Raycast;
use crate::math;

use super::probe::WallProbe;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LostWall,
    Unstick,
    Jump,
    Landed,
    /// The host pulled the character off the wall during a sweep.
    Detached,
}

impl StopReason {
    pub fn label(self) -> &'static str {
        match self {
            StopReason::LostWall => "lost wall",
            StopReason::Unstick => "unstick",
            StopReason::Jump => "jump",
            StopReason::Landed => "landed",
            StopReason::Detached => "detached",
        }
    }
}

/// What changed during one [`WallRunStateMachine::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub started: Option<Side>,
    pub stopped: Option<StopReason>,
    /// Phase entered this tick, if any.
    pub entered: Option<Phase>,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Phase, timers and contact of a wall-run.
///
/// Owns no state itself: every operation works on the caller's
/// [`MovementState`], so snapshots can restore and replay it freely.
pub struct WallRunStateMachine<'a> {
    cfg: &'a WallRunConfig,
}

impl<'a> WallRunStateMachine<'a> {
    pub fn new(cfg: &'a WallRunConfig) -> Self {
        Self { cfg }
    }

    fn probe(&self) -> WallProbe<'a> {
        WallProbe::new(&self.cfg.detection)
    }

    fn unstick_threshold(&self) -> f32 {
        self.cfg.timing.unstick_hold_time.max(0.0)
    }

    fn note_near_wall(state: &mut MovementState, side: Side, near: bool) {
        if near {
            state.near_wall = Some(side);
        } else if state.near_wall == Some(side) {
            state.near_wall = None;
        }
    }

    /// Contact to start a run on `side` with, if every start condition holds.
    /// Refreshes the near-wall flag for `side` as a side effect.
    pub fn can_start(
        &self,
        state: &mut MovementState,
        world: &impl Raycast,
        pawn: Option<&PawnView>,
        side: Side,
    ) -> Option<Contact> {
        if state.cooldown.is_cooling(side) {
            return None;
        }
        let pawn = pawn?;
        let report = self.probe().trace(world, Some(pawn), state.velocity, side, false);
        Self::note_near_wall(state, side, report.near_wall);
        let contact = report.contact?;

        let run_direction = wall_run_forward_direction(side, contact.normal);
        let aim = math::signed_heading_delta(pawn.forward, run_direction);
        if aim.abs() > self.cfg.detection.start_max_angle {
            return None;
        }

        if self.cfg.detection.prevent_backwards_start
            && state.velocity.normalize_or_zero().dot(pawn.forward) <= 0.0
        {
            return None;
        }
        Some(contact)
    }

    /// Attach to the wall described by `contact`. Restarts the phase and every timer.
    pub fn start(&self, state: &mut MovementState, contact: Contact) {
        let run = &mut state.run;
        run.phase.restart(Phase::Start);
        run.contact = contact;
        run.side = contact.side;
        run.duration_remaining = self.cfg.timing.duration.max(0.0);
        run.timer_armed = false;
        run.end_gravity = self.cfg.gravity.mid_scale;
        run.active = true;

        state.unstick = UnstickState {
            requested: false,
            remaining_hold_time: self.unstick_threshold(),
        };
        state.velocity.z = state.velocity.z.max(self.cfg.speed.start_vertical_velocity);
        state.mode = MovementMode::WallRunning;

        info!(
            side = contact.side.label(),
            normal = ?contact.normal,
            "wall-run started"
        );
    }

    /// Detach: arm the side's cooldown and fall.
    pub fn stop(&self, state: &mut MovementState, reason: StopReason) {
        if !state.run.active {
            return;
        }
        let side = state.run.side;
        state.cooldown.arm(side, self.cfg.timing.cooldown);
        state.run.active = false;
        state.mode = MovementMode::Falling;
        info!(side = side.label(), reason = reason.label(), "wall-run stopped");
    }

    /// Begin the unstick hold. Ignored unless running and not already held.
    pub fn press_unstick(&self, state: &mut MovementState) {
        if state.is_wall_running() && !state.unstick.requested {
            state.unstick = UnstickState {
                requested: true,
                remaining_hold_time: self.unstick_threshold(),
            };
        }
    }

    pub fn release_unstick(&self, state: &mut MovementState) {
        state.unstick = UnstickState {
            requested: false,
            remaining_hold_time: self.unstick_threshold(),
        };
    }

    /// Local input path: holding presses, letting go releases.
    pub fn apply_unstick_input(&self, state: &mut MovementState, held: bool) {
        if held {
            self.press_unstick(state);
        } else {
            self.release_unstick(state);
        }
    }

    /// Remote path: the received bit is taken as the flag itself.
    pub fn set_unstick_requested(&self, state: &mut MovementState, requested: bool) {
        state.unstick.requested = requested;
    }

    /// Force the End phase. Idempotent once End is reached.
    pub fn transition_to_end(&self, state: &mut MovementState) -> bool {
        let mid_time = state.run.phase.elapsed;
        if state.run.phase.advance(Phase::End) {
            state.run.end_gravity = self.cfg.gravity.mid_scale;
            debug!(side = state.run.side.label(), mid_time, "wall-run phase -> End");
            true
        } else {
            false
        }
    }

    /// Per-tick update, run before physics.
    ///
    /// Order: acquire or re-probe the wall, Start -> Mid, End gravity ramp,
    /// unstick hold, cooldowns, duration timer. A missing pawn skips the tick.
    pub fn tick(
        &self,
        state: &mut MovementState,
        world: &impl Raycast,
        pawn: Option<&PawnView>,
        dt: f32,
    ) -> TickReport {
        let mut report = TickReport::default();
        let Some(pawn) = pawn else {
            return report;
        };

        if state.is_wall_running() {
            let side = state.run.side;
            let probe = self.probe().trace(world, Some(pawn), state.velocity, side, true);
            Self::note_near_wall(state, side, probe.near_wall);
            match probe.contact {
                Some(contact) => state.run.contact = contact,
                None => {
                    self.stop(state, StopReason::LostWall);
                    report.stopped = Some(StopReason::LostWall);
                }
            }
        } else if state.is_falling() {
            for side in Side::BOTH {
                if let Some(contact) = self.can_start(state, world, Some(pawn), side) {
                    self.start(state, contact);
                    report.started = Some(side);
                    report.entered = Some(Phase::Start);
                    break;
                }
            }
        }

        let gravity = &self.cfg.gravity;
        let start_time = state.run.phase.elapsed;
        if state.is_wall_running()
            && state.run.phase() == Phase::Start
            && state.velocity.z <= gravity.mid_velocity_threshold
            && state.run.phase.advance(Phase::Mid)
        {
            if !self.cfg.timing.infinite {
                state.run.timer_armed = true;
            }
            report.entered = Some(Phase::Mid);
            debug!(vz = state.velocity.z, start_time, "wall-run phase -> Mid");
        }

        if state.is_wall_running() && state.run.phase() == Phase::End {
            state.run.end_gravity =
                ramp_toward(state.run.end_gravity, gravity.end_scale, gravity.end_ramp_time, dt);
        }

        if state.unstick.requested {
            state.unstick.remaining_hold_time = (state.unstick.remaining_hold_time - dt).max(0.0);
            if state.unstick.remaining_hold_time <= 0.0 && state.is_wall_running() {
                state.velocity += state.run.contact.normal * self.cfg.speed.unstick_velocity;
                self.stop(state, StopReason::Unstick);
                report.stopped = Some(StopReason::Unstick);
            }
        } else {
            state.unstick.remaining_hold_time = self.unstick_threshold();
        }

        state.cooldown.tick(dt);

        let run = &mut state.run;
        if run.timer_armed && run.active && run.phase() != Phase::End && run.duration_remaining > 0.0 {
            run.duration_remaining = (run.duration_remaining - dt).max(0.0);
            if run.duration_remaining <= 0.0 && self.transition_to_end(state) {
                report.entered = Some(Phase::End);
            }
        }

        state.run.phase.tick(dt);
        report
    }
}

/// Move `current` toward `target` by `dt / ramp_time` units. Snaps when
/// `ramp_time` is not positive.
pub fn ramp_toward(current: f32, target: f32, ramp_time: f32, dt: f32) -> f32 {
    if ramp_time <= 0.0 {
        return target;
    }
    let step = dt / ramp_time;
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_scene;
    use glam::Vec3;

    fn pawn() -> PawnView {
        PawnView::new(test_scene::SPAWN, Vec3::Y)
    }

    fn airborne() -> MovementState {
        let mut state = MovementState::new(MovementMode::Falling);
        state.velocity = Vec3::new(0.0, 500.0, -50.0);
        state
    }

    /// Running on the right wall in `phase`.
    fn running(cfg: &WallRunConfig, phase: Phase) -> MovementState {
        let machine = WallRunStateMachine::new(cfg);
        let level = test_scene::wall_corridor();
        let mut state = airborne();
        let contact = machine
            .can_start(&mut state, &level, Some(&pawn()), Side::Right)
            .expect("right wall");
        machine.start(&mut state, contact);
        if phase >= Phase::Mid {
            state.run.phase.advance(Phase::Mid);
            state.run.timer_armed = !cfg.timing.infinite;
        }
        if phase == Phase::End {
            machine.transition_to_end(&mut state);
        }
        state
    }

    #[test]
    fn start_on_right_wall() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = airborne();

        assert!(machine.can_start(&mut state, &level, Some(&pawn()), Side::Left).is_none());
        let contact = machine
            .can_start(&mut state, &level, Some(&pawn()), Side::Right)
            .expect("can start right");
        assert_eq!(contact.normal, Vec3::NEG_X);

        machine.start(&mut state, contact);
        assert!(state.is_wall_running_side(Side::Right));
        assert_eq!(state.run.phase(), Phase::Start);
        assert_eq!(state.velocity.z, cfg.speed.start_vertical_velocity);
        assert!(!state.run.timer_armed);
    }

    #[test]
    fn start_keeps_faster_climb() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let mut state = airborne();
        state.velocity.z = 400.0;
        machine.start(&mut state, Contact::new(Side::Left, Vec3::X, Vec3::ZERO));
        assert_eq!(state.velocity.z, 400.0);
    }

    #[test]
    fn cooldown_blocks_start() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = airborne();
        state.cooldown.arm(Side::Right, 0.2);
        assert!(machine.can_start(&mut state, &level, Some(&pawn()), Side::Right).is_none());
    }

    #[test]
    fn moving_backwards_blocks_start() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = airborne();
        state.velocity = Vec3::new(0.0, -500.0, -50.0);
        assert!(machine.can_start(&mut state, &level, Some(&pawn()), Side::Right).is_none());

        let lenient = WallRunConfig {
            detection: crate::config::DetectionConfig {
                prevent_backwards_start: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let machine = WallRunStateMachine::new(&lenient);
        assert!(machine.can_start(&mut state, &level, Some(&pawn()), Side::Right).is_some());
    }

    #[test]
    fn falling_tick_attaches() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = airborne();
        let report = machine.tick(&mut state, &level, Some(&pawn()), 1.0 / 60.0);
        assert_eq!(report.started, Some(Side::Right));
        assert!(state.is_wall_running());
    }

    #[test]
    fn walking_never_attaches() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = airborne();
        state.mode = MovementMode::Walking;
        let report = machine.tick(&mut state, &level, Some(&pawn()), 1.0 / 60.0);
        assert_eq!(report, TickReport::default());
        assert!(!state.run.active);
    }

    #[test]
    fn start_to_mid_arms_timer() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = running(&cfg, Phase::Start);

        state.velocity.z = 150.0;
        machine.tick(&mut state, &level, Some(&pawn()), 0.016);
        machine.tick(&mut state, &level, Some(&pawn()), 0.016);
        assert_eq!(state.run.phase(), Phase::Start);
        assert!((state.run.phase.elapsed - 0.032).abs() < 1e-6);

        state.velocity.z = 100.0;
        let report = machine.tick(&mut state, &level, Some(&pawn()), 0.016);
        assert_eq!(report.entered, Some(Phase::Mid));
        assert_eq!(state.run.phase(), Phase::Mid);
        assert!(state.run.timer_armed);
        // Time in Mid counts from the transition tick.
        assert!((state.run.phase.elapsed - 0.016).abs() < 1e-6);
    }

    #[test]
    fn infinite_run_never_ends_on_its_own() {
        let cfg = WallRunConfig {
            timing: crate::config::TimingConfig {
                infinite: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = running(&cfg, Phase::Start);
        state.velocity.z = 0.0;
        for _ in 0..600 {
            machine.tick(&mut state, &level, Some(&pawn()), 0.016);
        }
        assert!(state.is_wall_running());
        assert_eq!(state.run.phase(), Phase::Mid);
        assert!(!state.run.timer_armed);
        assert_eq!(state.run.duration_remaining, cfg.timing.duration);
    }

    #[test]
    fn phase_never_regresses() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = running(&cfg, Phase::Mid);
        state.velocity.z = 900.0;
        let mut last = state.run.phase();
        for _ in 0..200 {
            machine.tick(&mut state, &level, Some(&pawn()), 0.016);
            assert!(state.run.phase() >= last);
            last = state.run.phase();
        }
        assert_eq!(last, Phase::End);
    }

    #[test]
    fn forced_end_ramps_gravity() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = running(&cfg, Phase::Mid);
        state.velocity.z = 0.0;
        state.run.duration_remaining = 0.01;

        let report = machine.tick(&mut state, &level, Some(&pawn()), 0.016);
        assert_eq!(report.entered, Some(Phase::End));
        assert_eq!(state.run.duration_remaining, 0.0);
        assert_eq!(state.run.end_gravity, cfg.gravity.mid_scale);

        machine.tick(&mut state, &level, Some(&pawn()), 0.125);
        let expected = cfg.gravity.mid_scale + 0.125 / cfg.gravity.end_ramp_time;
        assert!((state.run.end_gravity - expected).abs() < 1e-6);

        for _ in 0..20 {
            machine.tick(&mut state, &level, Some(&pawn()), 0.125);
        }
        assert_eq!(state.run.end_gravity, cfg.gravity.end_scale);
        assert!(!machine.transition_to_end(&mut state));
        assert_eq!(state.run.end_gravity, cfg.gravity.end_scale);
    }

    #[test]
    fn holding_unstick_detaches() {
        let cfg = WallRunConfig {
            timing: crate::config::TimingConfig {
                unstick_hold_time: 0.25,
                ..Default::default()
            },
            ..Default::default()
        };
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = running(&cfg, Phase::Mid);
        let vx = state.velocity.x;

        machine.press_unstick(&mut state);
        machine.tick(&mut state, &level, Some(&pawn()), 0.125);
        assert!(state.is_wall_running());
        assert_eq!(state.unstick.remaining_hold_time, 0.125);

        let report = machine.tick(&mut state, &level, Some(&pawn()), 0.125);
        assert_eq!(report.stopped, Some(StopReason::Unstick));
        assert!(!state.is_wall_running());
        assert_eq!(state.mode, MovementMode::Falling);
        assert!((state.velocity.x - (vx - cfg.speed.unstick_velocity)).abs() < 1e-3);
        assert!(state.cooldown.is_cooling(Side::Right));
        assert!(!state.cooldown.is_cooling(Side::Left));
    }

    #[test]
    fn releasing_unstick_resets_hold() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = running(&cfg, Phase::Mid);

        machine.press_unstick(&mut state);
        machine.tick(&mut state, &level, Some(&pawn()), 0.1);
        machine.release_unstick(&mut state);
        machine.tick(&mut state, &level, Some(&pawn()), 0.1);
        assert!(state.is_wall_running());
        assert_eq!(state.unstick.remaining_hold_time, cfg.timing.unstick_hold_time);
    }

    #[test]
    fn unstick_press_needs_a_run() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let mut state = airborne();
        machine.press_unstick(&mut state);
        assert!(!state.unstick.requested);
    }

    #[test]
    fn losing_the_wall_stops() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = running(&cfg, Phase::Mid);
        let far = PawnView::new(test_scene::SPAWN - Vec3::X * 2000.0, Vec3::Y);
        let report = machine.tick(&mut state, &level, Some(&far), 0.016);
        assert_eq!(report.stopped, Some(StopReason::LostWall));
        assert!(state.cooldown.is_cooling(Side::Right));
    }

    #[test]
    fn missing_pawn_is_a_no_op() {
        let cfg = WallRunConfig::default();
        let machine = WallRunStateMachine::new(&cfg);
        let level = test_scene::wall_corridor();
        let mut state = running(&cfg, Phase::Mid);
        state.cooldown.arm(Side::Left, 0.3);
        let before = state.clone();
        assert_eq!(machine.tick(&mut state, &level, None, 0.016), TickReport::default());
        assert_eq!(state, before);
    }

    #[test]
    fn ramp_snaps_without_ramp_time() {
        assert_eq!(ramp_toward(0.1, 0.7, 0.0, 0.016), 0.7);
        assert_eq!(ramp_toward(0.9, 0.7, 0.5, 0.25), 0.7);
    }
}
