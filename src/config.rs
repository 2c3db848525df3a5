//! Wall-run tuning. Pure data; loaded from RON, validated into non-fatal warnings.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

use crate::components::JumpProfile;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Speeds used while attached to a wall.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SpeedConfig {
    pub run_speed: f32,
    pub run_acceleration: f32,
    /// Deceleration when wall-running with no input acceleration.
    pub braking_deceleration: f32,
    /// Constant velocity pressing the character into the wall, per second.
    pub stick_velocity: f32,
    /// Minimum upward speed given when a run begins.
    pub start_vertical_velocity: f32,
    /// Outward push along the wall normal when unsticking.
    pub unstick_velocity: f32,
}
impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            run_speed: 1200.0,
            run_acceleration: 2048.0,
            braking_deceleration: 400.0,
            stick_velocity: 1600.0,
            start_vertical_velocity: 150.0,
            unstick_velocity: 300.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GravityConfig {
    /// Scale while still rising faster than `mid_velocity_threshold`.
    pub ascending_scale: f32,
    pub mid_scale: f32,
    pub end_scale: f32,
    /// Seconds for the End-phase gravity to climb by one whole unit of scale.
    pub end_ramp_time: f32,
    /// Vertical speed at or below which Start becomes Mid.
    pub mid_velocity_threshold: f32,
    pub scale_with_speed: bool,
    /// Fraction of `run_speed` below which gravity starts to grow.
    pub slow_start_fraction: f32,
    /// Scale reached at zero horizontal speed.
    pub slow_scale: f32,
}
impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            ascending_scale: 0.75,
            mid_scale: 0.11,
            end_scale: 0.7,
            end_ramp_time: 0.5,
            mid_velocity_threshold: 130.0,
            scale_with_speed: true,
            slow_start_fraction: 0.6,
            slow_scale: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    /// Rays per side; the fan uses `rays_per_side - 1` interior angles.
    pub rays_per_side: u32,
    pub detect_distance: f32,
    /// Shorter distance that flags the cosmetic "near wall" state.
    pub near_wall_distance: f32,
    /// Vertical offset of the head-level trace from the pawn origin.
    pub head_offset: f32,
    /// Vertical offset of the fallback (foot-level) trace.
    pub foot_offset: f32,
    /// Largest angle between pawn forward and run direction that may start a run.
    pub start_max_angle: f32,
    pub prevent_backwards_start: bool,
    /// Length of the velocity ray used by the near-wall check.
    pub near_wall_velocity_reach: f32,
}
impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rays_per_side: 7,
            detect_distance: 100.0,
            near_wall_distance: 200.0,
            head_offset: 50.0,
            foot_offset: -200.0,
            start_max_angle: 120.0,
            prevent_backwards_start: true,
            near_wall_velocity_reach: 700.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub infinite: bool,
    /// Seconds of Mid phase before End is forced.
    pub duration: f32,
    /// Per-side refractory period after leaving a wall.
    pub cooldown: f32,
    /// Seconds the unstick input must be held.
    pub unstick_hold_time: f32,
}
impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            infinite: false,
            duration: 1.7,
            cooldown: 0.5,
            unstick_hold_time: 0.15,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct JumpConfig {
    /// Jump when facing along the wall.
    pub forward: JumpProfile,
    /// Jump when facing away from the wall at `max_angle`.
    pub side: JumpProfile,
    pub min_angle: f32,
    pub max_angle: f32,
}
impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            forward: JumpProfile::new(1600.0, 600.0),
            side: JumpProfile::new(700.0, 900.0),
            min_angle: 15.0,
            max_angle: 90.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PredictionConfig {
    /// Two snapshots whose wall normals differ by more than this never combine.
    pub normal_combine_tolerance: f32,
    /// Upper bound on the delta time of a combined move. 0 disables combining.
    pub max_combined_dt: f32,
    /// Authority corrects the client when end positions differ by more than this.
    pub max_position_error: f32,
}
impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            normal_combine_tolerance: 0.01,
            max_combined_dt: 0.125,
            max_position_error: 1.7,
        }
    }
}

/// Observational toggles. Never alter the simulation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DebugFlags {
    pub show_all: bool,
    pub show_capsule: bool,
    pub show_jumps: bool,
    pub show_run_forward: bool,
    pub show_wall_normal: bool,
    pub show_gravity: bool,
    pub show_wall_push: bool,
    pub show_acceleration: bool,
    pub show_state: bool,
}

/// Tuning for the bundled reference mover (falling/walking, sweeps).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BaseMoverConfig {
    pub gravity_z: f32,
    pub terminal_velocity: f32,
    pub max_walk_speed: f32,
    pub max_acceleration: f32,
    pub ground_friction: f32,
    pub braking_deceleration_walking: f32,
    pub braking_deceleration_falling: f32,
    /// Fraction of input acceleration available while falling.
    pub air_control: f32,
    pub jump_z_velocity: f32,
    /// Minimum normal Z treated as walkable floor.
    pub walkable_floor_z: f32,
    pub perch_radius_threshold: f32,
    pub max_simulation_time_step: f32,
    pub max_simulation_iterations: u32,
    pub max_jump_apex_attempts: u32,
    pub capsule_radius: f32,
    pub capsule_half_height: f32,
    pub rng_seed: u64,
}
impl Default for BaseMoverConfig {
    fn default() -> Self {
        Self {
            gravity_z: -980.0,
            terminal_velocity: 4000.0,
            max_walk_speed: 900.0,
            max_acceleration: 2048.0,
            ground_friction: 8.0,
            braking_deceleration_walking: 2048.0,
            braking_deceleration_falling: 0.0,
            air_control: 0.35,
            jump_z_velocity: 420.0,
            walkable_floor_z: 0.71,
            perch_radius_threshold: 0.0,
            max_simulation_time_step: 0.05,
            max_simulation_iterations: 8,
            max_jump_apex_attempts: 2,
            capsule_radius: 34.0,
            capsule_half_height: 88.0,
            rng_seed: 0x5eed,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct WallRunConfig {
    pub speed: SpeedConfig,
    pub gravity: GravityConfig,
    pub detection: DetectionConfig,
    pub timing: TimingConfig,
    pub jump: JumpConfig,
    pub prediction: PredictionConfig,
    pub debug: DebugFlags,
    pub base: BaseMoverConfig,
}

impl WallRunConfig {
    /// Load from a single RON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron(&data)
    }

    pub fn from_ron(data: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(data)?)
    }

    /// Load file; on failure returns the default config plus the error.
    pub fn load_or_default(path: impl AsRef<Path>) -> (Self, Option<ConfigError>) {
        match Self::load_from_file(path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Produce validation warnings (non-fatal) for suspicious values.
    pub fn validate(&self) -> Vec<String> {
        let mut w = Vec::new();
        if self.speed.run_speed <= 0.0 {
            w.push("speed.run_speed must be > 0".into());
        }
        if self.speed.stick_velocity < 0.0 {
            w.push("speed.stick_velocity negative pushes away from the wall".into());
        }
        if self.detection.rays_per_side < 2 {
            w.push(format!(
                "detection.rays_per_side {} leaves no interior fan angles",
                self.detection.rays_per_side
            ));
        }
        if self.detection.detect_distance <= 0.0 {
            w.push("detection.detect_distance must be > 0".into());
        }
        if self.detection.near_wall_distance < 0.0 {
            w.push("detection.near_wall_distance negative".into());
        }
        if self.jump.min_angle >= self.jump.max_angle {
            w.push(format!(
                "jump.min_angle ({}) must be below jump.max_angle ({})",
                self.jump.min_angle, self.jump.max_angle
            ));
        }
        if !self.timing.infinite && self.timing.duration <= 0.0 {
            w.push("timing.duration must be > 0 for a finite run".into());
        }
        if self.timing.cooldown < 0.0 {
            w.push("timing.cooldown negative -> treated as 0".into());
        }
        if self.timing.unstick_hold_time < 0.0 {
            w.push("timing.unstick_hold_time negative -> unstick is immediate".into());
        }
        if self.gravity.end_ramp_time <= 0.0 {
            w.push("gravity.end_ramp_time <= 0 -> end gravity applied instantly".into());
        }
        if self.gravity.scale_with_speed && self.gravity.slow_start_fraction <= 0.0 {
            w.push("gravity.slow_start_fraction must be > 0 when scale_with_speed".into());
        }
        if self.prediction.normal_combine_tolerance < 0.0 {
            w.push("prediction.normal_combine_tolerance negative; nothing will combine".into());
        }
        if self.base.gravity_z >= 0.0 {
            w.push(format!(
                "base.gravity_z is {} ; expected negative (down is -Z)",
                self.base.gravity_z
            ));
        }
        if self.base.max_simulation_iterations == 0 {
            w.push("base.max_simulation_iterations is 0; nothing will move".into());
        }
        w
    }
}
