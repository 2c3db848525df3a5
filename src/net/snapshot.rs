use glam::Vec3;

use crate::components::{MoveInput, MovementState};
use crate::config::PredictionConfig;

use super::wire::MoveMessage;

/// One predicted tick: the state it started from, the input that drove it
/// and where it ended. Holds value copies only.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tick: u64,
    pub dt: f32,
    pub input: MoveInput,
    pub start_location: Vec3,
    /// State after the tick's unstick input was applied, before simulation.
    pub start: MovementState,
    pub end_location: Vec3,
}

impl Snapshot {
    pub fn capture(tick: u64, dt: f32, input: MoveInput, location: Vec3, state: &MovementState) -> Self {
        Self {
            tick,
            dt,
            input,
            start_location: location,
            start: state.clone(),
            end_location: location,
        }
    }

    /// The one bit of wall-run state that goes over the wire.
    pub fn unstick_requested(&self) -> bool {
        self.start.unstick.requested
    }

    pub fn finish(&mut self, location: Vec3) {
        self.end_location = location;
    }

    /// Must be sent until acknowledged: the unstick bit changed since the
    /// last move the authority confirmed.
    pub fn is_important(&self, last_acked_unstick: bool) -> bool {
        self.unstick_requested() != last_acked_unstick
    }

    /// Whether `self` and the `newer` snapshot right after it may be
    /// replayed as one move of their summed delta time.
    ///
    /// Timers only need matching zero status; the wall normal needs to agree
    /// within `cfg.normal_combine_tolerance`.
    pub fn can_combine(&self, newer: &Snapshot, cfg: &PredictionConfig, end_scale: f32) -> bool {
        if cfg.max_combined_dt <= 0.0 || self.dt + newer.dt > cfg.max_combined_dt {
            return false;
        }
        if self.input.jump || newer.input.jump {
            return false;
        }
        if self.input.acceleration != newer.input.acceleration || self.input.facing_yaw != newer.input.facing_yaw {
            return false;
        }
        if self.start.mode != newer.start.mode {
            return false;
        }

        let (a, b) = (&self.start, &newer.start);
        if a.unstick.requested != b.unstick.requested {
            return false;
        }
        if (a.run.duration_remaining == 0.0) != (b.run.duration_remaining == 0.0) {
            return false;
        }
        if (a.cooldown.left == 0.0) != (b.cooldown.left == 0.0)
            || (a.cooldown.right == 0.0) != (b.cooldown.right == 0.0)
        {
            return false;
        }
        if a.run.active != b.run.active || a.run.side != b.run.side || a.run.phase() != b.run.phase() {
            return false;
        }
        let normal_error = (a.run.contact.normal - b.run.contact.normal).abs().max_element();
        if normal_error > cfg.normal_combine_tolerance {
            return false;
        }
        // Ramp finished vs. still ramping.
        (a.run.end_gravity >= end_scale) == (b.run.end_gravity >= end_scale)
    }

    /// Fold `self` and the `newer` snapshot into one move ending where
    /// `newer` ends. Timers and the start point roll back to `self`, so the
    /// combined move re-simulates both ticks.
    pub fn combine(&self, newer: Snapshot) -> Snapshot {
        let mut start = newer.start;
        start.run.duration_remaining = self.start.run.duration_remaining;
        start.run.end_gravity = self.start.run.end_gravity;
        start.run.phase = self.start.run.phase.clone();
        start.unstick.remaining_hold_time = self.start.unstick.remaining_hold_time;
        start.cooldown = self.start.cooldown;
        start.velocity = self.start.velocity;
        start.mode = self.start.mode;
        start.near_wall = self.start.near_wall;

        Snapshot {
            tick: newer.tick,
            dt: self.dt + newer.dt,
            input: newer.input,
            start_location: self.start_location,
            start,
            end_location: newer.end_location,
        }
    }

    /// Restore the captured wall-run state before replaying this move.
    /// Position, velocity and mode come from the replay itself.
    pub fn prep(&self, state: &mut MovementState) {
        state.run = self.start.run.clone();
        state.unstick = self.start.unstick;
        state.cooldown = self.start.cooldown;
    }

    pub fn to_message(&self) -> MoveMessage {
        MoveMessage {
            tick: self.tick,
            dt: self.dt,
            acceleration: self.input.acceleration,
            facing_yaw: self.input.facing_yaw,
            jump: self.input.jump,
            wants_to_unstick: self.unstick_requested(),
            end_location: self.end_location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Contact, MovementMode, Phase, Side};
    use crate::config::WallRunConfig;
    use crate::systems::WallRunStateMachine;

    fn running(cfg: &WallRunConfig) -> MovementState {
        let mut state = MovementState::new(MovementMode::Falling);
        state.velocity = Vec3::new(0.0, 800.0, 0.0);
        WallRunStateMachine::new(cfg).start(&mut state, Contact::new(Side::Right, Vec3::NEG_X, Vec3::ZERO));
        state
    }

    fn pair(cfg: &WallRunConfig) -> (Snapshot, Snapshot) {
        let input = MoveInput {
            acceleration: Vec3::Y,
            facing_yaw: 90.0,
            ..Default::default()
        };
        let state = running(cfg);
        let older = Snapshot::capture(1, 1.0 / 60.0, input, Vec3::ZERO, &state);
        let mut newer_state = state.clone();
        newer_state.run.duration_remaining -= 0.016;
        let newer = Snapshot::capture(2, 1.0 / 60.0, input, Vec3::Y * 13.0, &newer_state);
        (older, newer)
    }

    #[test]
    fn differing_timer_values_combine() {
        let cfg = WallRunConfig::default();
        let (older, newer) = pair(&cfg);
        assert!(older.can_combine(&newer, &cfg.prediction, cfg.gravity.end_scale));
    }

    #[test]
    fn discrete_differences_block_combining() {
        let cfg = WallRunConfig::default();
        let (older, base) = pair(&cfg);
        let end_scale = cfg.gravity.end_scale;
        let p = &cfg.prediction;

        let mut newer = base.clone();
        newer.start.run.phase.advance(Phase::Mid);
        assert!(!older.can_combine(&newer, p, end_scale));

        let mut newer = base.clone();
        newer.start.run.side = Side::Left;
        assert!(!older.can_combine(&newer, p, end_scale));

        let mut newer = base.clone();
        newer.start.unstick.requested = true;
        assert!(!older.can_combine(&newer, p, end_scale));

        let mut newer = base.clone();
        newer.start.run.duration_remaining = 0.0;
        assert!(!older.can_combine(&newer, p, end_scale));

        let mut newer = base.clone();
        newer.start.cooldown.left = 0.2;
        assert!(!older.can_combine(&newer, p, end_scale));

        let mut newer = base.clone();
        newer.input.jump = true;
        assert!(!older.can_combine(&newer, p, end_scale));

        let mut newer = base.clone();
        newer.start.run.end_gravity = end_scale;
        assert!(!older.can_combine(&newer, p, end_scale));
    }

    #[test]
    fn normal_tolerance() {
        let cfg = WallRunConfig::default();
        let (older, base) = pair(&cfg);
        let tol = cfg.prediction.normal_combine_tolerance;

        let mut newer = base.clone();
        newer.start.run.contact.normal = Vec3::new(-1.0, tol * 0.5, 0.0);
        assert!(older.can_combine(&newer, &cfg.prediction, cfg.gravity.end_scale));

        newer.start.run.contact.normal = Vec3::new(-1.0, tol * 2.0, 0.0);
        assert!(!older.can_combine(&newer, &cfg.prediction, cfg.gravity.end_scale));
    }

    #[test]
    fn combined_dt_is_capped() {
        let mut cfg = WallRunConfig::default();
        let (older, newer) = pair(&cfg);
        cfg.prediction.max_combined_dt = 0.02;
        assert!(!older.can_combine(&newer, &cfg.prediction, cfg.gravity.end_scale));
        cfg.prediction.max_combined_dt = 0.0;
        assert!(!older.can_combine(&newer, &cfg.prediction, cfg.gravity.end_scale));
    }

    #[test]
    fn combine_rolls_timers_back() {
        let cfg = WallRunConfig::default();
        let (older, mut newer) = pair(&cfg);
        newer.end_location = Vec3::Y * 26.0;
        let combined = older.combine(newer.clone());
        assert_eq!(combined.tick, 2);
        assert!((combined.dt - 2.0 / 60.0).abs() < 1e-6);
        assert_eq!(combined.start.run.duration_remaining, older.start.run.duration_remaining);
        assert_eq!(combined.start_location, older.start_location);
        assert_eq!(combined.end_location, newer.end_location);
    }

    #[test]
    fn importance_tracks_the_unstick_bit() {
        let cfg = WallRunConfig::default();
        let (mut older, _) = pair(&cfg);
        assert!(!older.is_important(false));
        older.start.unstick.requested = true;
        assert!(older.is_important(false));
        assert!(!older.is_important(true));
        assert!(older.to_message().wants_to_unstick);
    }

    #[test]
    fn prep_restores_run_state_only() {
        let cfg = WallRunConfig::default();
        let (older, _) = pair(&cfg);
        let mut state = MovementState::new(MovementMode::Walking);
        state.velocity = Vec3::X;
        older.prep(&mut state);
        assert_eq!(state.run, older.start.run);
        assert_eq!(state.velocity, Vec3::X);
        assert_eq!(state.mode, MovementMode::Walking);
    }
}
