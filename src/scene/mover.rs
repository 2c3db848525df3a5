use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::components::MovementMode;
use crate::config::BaseMoverConfig;
use crate::engine::{BaseMover, JumpForce, MoveHit, VelocityLimits, MIN_TICK_TIME};
use crate::math::{self, SMALL_NUMBER};

use super::world::LevelGeometry;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How far below the character a floor is still "under" it.
const MAX_FLOOR_DIST: f32 = 2.4;

const VERTICAL_SLOPE_NORMAL_Z: f32 = 0.001;

/// Nudge off a wall when a second hit lands on the same plane.
const SAME_PLANE_NUDGE: f32 = 0.01;

// ---------------------------------------------------------------------------
// Mover
// ---------------------------------------------------------------------------

/// Reference [`BaseMover`] over a [`LevelGeometry`].
///
/// The capsule is approximated by an axis-aligned box of
/// `radius x radius x half_height` half extents. Walking keeps the box on
/// the floor; falling is a midpoint integrator with single-slide response.
pub struct SceneMover<'w> {
    level: &'w LevelGeometry,
    cfg: BaseMoverConfig,
    location: Vec3,
    jump_force: JumpForce,
    rng: StdRng,
}

impl<'w> SceneMover<'w> {
    pub fn new(level: &'w LevelGeometry, cfg: BaseMoverConfig, location: Vec3) -> Self {
        let rng = StdRng::seed_from_u64(cfg.rng_seed);
        Self {
            level,
            cfg,
            location,
            jump_force: JumpForce::default(),
            rng,
        }
    }

    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.cfg.capsule_radius, self.cfg.capsule_radius, self.cfg.capsule_half_height)
    }

    fn walking_limits(&self) -> VelocityLimits {
        VelocityLimits {
            max_speed: self.cfg.max_walk_speed,
            max_acceleration: self.cfg.max_acceleration,
            braking_deceleration: self.cfg.braking_deceleration_walking,
        }
    }

    fn falling_limits(&self) -> VelocityLimits {
        VelocityLimits {
            max_speed: self.cfg.max_walk_speed,
            max_acceleration: self.cfg.max_acceleration,
            braking_deceleration: self.cfg.braking_deceleration_falling,
        }
    }

    fn walk(&mut self, velocity: &mut Vec3, acceleration: Vec3, dt: f32) -> MovementMode {
        let limits = self.walking_limits();
        let mut v = self.velocity_from_acceleration(
            math::horizontal(*velocity),
            math::horizontal(acceleration),
            dt,
            self.cfg.ground_friction,
            &limits,
        );

        let delta = v * dt;
        let hit = self.move_and_collide(delta);
        if hit.blocking && !self.is_valid_landing_spot(hit.location, &hit) {
            let slide = math::horizontal(self.slide_along_surface(delta, 1.0 - hit.time, hit.normal, &hit));
            if slide.dot(delta) > 0.0 {
                self.move_and_collide(slide);
            }
            let into = v.dot(hit.normal).min(0.0);
            v = math::horizontal(v - hit.normal * into);
        }
        *velocity = v;

        match self.find_floor(self.location) {
            Some(floor) => {
                self.location = floor.location;
                MovementMode::Walking
            }
            None => {
                trace!(location = ?self.location, "walked off a ledge");
                MovementMode::Falling
            }
        }
    }

    fn fall(&mut self, velocity: &mut Vec3, acceleration: Vec3, dt: f32) -> MovementMode {
        let limits = self.falling_limits();
        let acceleration = math::horizontal(acceleration) * self.cfg.air_control;
        let gravity = Vec3::new(0.0, 0.0, self.cfg.gravity_z);

        let mut remaining = dt;
        let mut iterations = 0;
        while remaining >= MIN_TICK_TIME && iterations < self.cfg.max_simulation_iterations {
            iterations += 1;
            let time_tick = self.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let old = *velocity;
            let lateral = self.velocity_from_acceleration(math::horizontal(old), acceleration, time_tick, 0.0, &limits);
            let v = self.apply_gravity(Vec3::new(lateral.x, lateral.y, old.z), gravity, time_tick);
            *velocity = v;

            let delta = 0.5 * (old + v) * time_tick;
            let mut hit = self.move_and_collide(delta);
            if !hit.blocking {
                continue;
            }
            let mut sub_remaining = time_tick * (1.0 - hit.time);
            if self.is_valid_landing_spot(hit.location, &hit) {
                return self.land(velocity, acceleration, remaining + sub_remaining);
            }

            let slide = self.slide_along_surface(v * time_tick, 1.0 - hit.time, hit.normal, &hit);
            let into = velocity.dot(hit.normal).min(0.0);
            *velocity -= hit.normal * into;
            if sub_remaining > SMALL_NUMBER && slide.dot(delta) > 0.0 {
                hit = self.move_and_collide(slide);
                if hit.blocking {
                    sub_remaining *= 1.0 - hit.time;
                    if self.is_valid_landing_spot(hit.location, &hit) {
                        return self.land(velocity, acceleration, remaining + sub_remaining);
                    }
                }
            }
        }
        MovementMode::Falling
    }

    fn land(&mut self, velocity: &mut Vec3, acceleration: Vec3, remaining: f32) -> MovementMode {
        velocity.z = 0.0;
        trace!(location = ?self.location, remaining, "landed");
        if remaining >= MIN_TICK_TIME {
            self.walk(velocity, acceleration, remaining)
        } else {
            MovementMode::Walking
        }
    }
}

impl BaseMover for SceneMover<'_> {
    fn location(&self) -> Vec3 {
        self.location
    }

    fn set_location(&mut self, location: Vec3) {
        self.location = location;
    }

    fn gravity_z(&self) -> f32 {
        self.cfg.gravity_z
    }

    fn max_simulation_iterations(&self) -> u32 {
        self.cfg.max_simulation_iterations
    }

    fn max_jump_apex_attempts(&self) -> u32 {
        self.cfg.max_jump_apex_attempts
    }

    fn simulation_time_step(&self, remaining: f32, iterations: u32) -> f32 {
        let max_step = self.cfg.max_simulation_time_step;
        let step = if remaining > max_step && iterations < self.cfg.max_simulation_iterations {
            max_step.min(remaining * 0.5)
        } else {
            remaining
        };
        step.max(MIN_TICK_TIME)
    }

    fn velocity_from_acceleration(
        &self,
        velocity: Vec3,
        acceleration: Vec3,
        dt: f32,
        friction: f32,
        limits: &VelocityLimits,
    ) -> Vec3 {
        let friction = friction.max(0.0);
        let max_speed = limits.max_speed.max(0.0);
        let acceleration = acceleration.clamp_length_max(limits.max_acceleration.max(0.0));
        let zero_acceleration = acceleration.length_squared() <= SMALL_NUMBER * SMALL_NUMBER;
        let exceeding = velocity.length_squared() > max_speed * max_speed;

        let mut v = velocity;
        if zero_acceleration || exceeding {
            let old = v;
            let braking = limits.braking_deceleration.max(0.0);
            if braking > 0.0 || friction > 0.0 {
                let reverse = -braking * v.normalize_or_zero();
                v += (-friction * v + reverse) * dt;
                if v.dot(old) <= 0.0 || v.length_squared() <= SMALL_NUMBER {
                    v = Vec3::ZERO;
                }
            }
            // Braking never takes a fast move below the limit while still pushing.
            if exceeding && v.length_squared() < max_speed * max_speed && acceleration.dot(old) > 0.0 {
                v = old.normalize_or_zero() * max_speed;
            }
        } else {
            let speed = v.length();
            let direction = acceleration.normalize_or_zero();
            v -= (v - direction * speed) * (dt * friction).min(1.0);
        }

        let max_input_speed = if exceeding { v.length() } else { max_speed };
        (v + acceleration * dt).clamp_length_max(max_input_speed)
    }

    fn apply_gravity(&self, velocity: Vec3, gravity: Vec3, dt: f32) -> Vec3 {
        let result = velocity + gravity * dt;
        let terminal = self.cfg.terminal_velocity;
        if terminal > 0.0 && result.length_squared() > terminal * terminal && gravity.dot(result) > 0.0 {
            result.clamp_length_max(terminal)
        } else {
            result
        }
    }

    fn move_and_collide(&mut self, delta: Vec3) -> MoveHit {
        match self.level.sweep(self.location, self.half_extents(), delta) {
            None => {
                self.location += delta;
                MoveHit::clear(self.location)
            }
            Some(sweep) => {
                self.location += delta * sweep.time;
                MoveHit {
                    blocking: true,
                    time: sweep.time,
                    normal: sweep.normal,
                    impact_normal: sweep.normal,
                    location: self.location,
                    start_penetrating: sweep.start_penetrating,
                }
            }
        }
    }

    fn slide_along_surface(&self, delta: Vec3, time: f32, normal: Vec3, _hit: &MoveHit) -> Vec3 {
        (delta - normal * delta.dot(normal)) * time
    }

    fn two_wall_adjust(&self, delta: Vec3, hit: &MoveHit, old_hit_normal: Vec3) -> Vec3 {
        let normal = hit.normal;
        if delta.dot(normal) > 0.0 {
            return self.slide_along_surface(delta, 1.0 - hit.time, normal, hit);
        }

        if old_hit_normal.dot(normal) <= 0.0 {
            // Corner of 90 degrees or less: run along the crease.
            let crease = normal.cross(old_hit_normal).normalize_or_zero();
            let adjusted = crease * delta.dot(crease) * (1.0 - hit.time);
            if delta.dot(adjusted) < 0.0 {
                -adjusted
            } else {
                adjusted
            }
        } else {
            let adjusted = self.slide_along_surface(delta, 1.0 - hit.time, normal, hit);
            if adjusted.dot(delta) <= 0.0 {
                Vec3::ZERO
            } else if (normal.dot(old_hit_normal) - 1.0).abs() < SMALL_NUMBER {
                adjusted + normal * SAME_PLANE_NUDGE
            } else {
                adjusted
            }
        }
    }

    fn is_valid_landing_spot(&self, _location: Vec3, hit: &MoveHit) -> bool {
        hit.blocking && hit.impact_normal.z >= self.cfg.walkable_floor_z
    }

    fn find_floor(&self, location: Vec3) -> Option<MoveHit> {
        let delta = Vec3::new(0.0, 0.0, -(MAX_FLOOR_DIST + super::world::SKIN));
        let sweep = self.level.sweep(location, self.half_extents(), delta)?;
        let hit = MoveHit {
            blocking: true,
            time: sweep.time,
            normal: sweep.normal,
            impact_normal: sweep.normal,
            location: location + delta * sweep.time,
            start_penetrating: sweep.start_penetrating,
        };
        self.is_valid_landing_spot(location, &hit).then_some(hit)
    }

    fn should_limit_air_control(&self, _dt: f32, acceleration: Vec3) -> bool {
        math::horizontal(acceleration).length_squared() > 0.0
    }

    fn limit_air_control(&self, _dt: f32, acceleration: Vec3, hit: &MoveHit, check_landing_spot: bool) -> Vec3 {
        if hit.is_valid_blocking_hit() && hit.normal.z > VERTICAL_SLOPE_NORMAL_Z {
            if (!check_landing_spot || !self.is_valid_landing_spot(hit.location, hit))
                && acceleration.dot(hit.normal) < 0.0
            {
                // Do not steer up into a slope we cannot stand on.
                let normal_2d = math::horizontal_normal(hit.normal);
                return acceleration - normal_2d * acceleration.dot(normal_2d);
            }
        } else if hit.start_penetrating {
            return if acceleration.dot(hit.normal) > 0.0 {
                acceleration
            } else {
                Vec3::ZERO
            };
        }
        acceleration
    }

    fn walkable_floor_z(&self) -> f32 {
        self.cfg.walkable_floor_z
    }

    fn perch_radius_threshold(&self) -> f32 {
        self.cfg.perch_radius_threshold
    }

    fn jump_z_velocity(&self) -> f32 {
        self.cfg.jump_z_velocity
    }

    fn max_acceleration(&self) -> f32 {
        self.cfg.max_acceleration
    }

    fn random_unit(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    fn seed_random(&mut self, tick: u64) {
        self.rng = StdRng::seed_from_u64(self.cfg.rng_seed ^ tick);
    }

    fn jump_force(&mut self) -> &mut JumpForce {
        &mut self.jump_force
    }

    fn simulate_base(&mut self, mode: MovementMode, velocity: &mut Vec3, acceleration: Vec3, dt: f32) -> MovementMode {
        if dt < MIN_TICK_TIME {
            return mode;
        }
        match mode {
            MovementMode::Walking => self.walk(velocity, acceleration, dt),
            // The wall-run integrator owns wall-running; treat a stray request as a fall.
            MovementMode::Falling | MovementMode::WallRunning => self.fall(velocity, acceleration, dt),
        }
    }
}
