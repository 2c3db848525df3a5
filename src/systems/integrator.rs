use glam::Vec3;
use tracing::trace;

use crate::components::{MovementState, Phase};
use crate::config::WallRunConfig;
use crate::debug::{self, phase_color, Color, DebugShape, DebugSink};
use crate::engine::{BaseMover, ImpactResponse, MoveHit, VelocityLimits, MIN_TICK_TIME};
use crate::math::{self, SMALL_NUMBER};

use super::state::{StopReason, WallRunStateMachine};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Apex sub-steps shorter than this are skipped; we are already there.
const APEX_TIME_MINIMUM: f32 = 1.0e-4;

/// Hit normals with Z above this count as facing up for air control.
const VERTICAL_SLOPE_NORMAL_Z: f32 = 0.001;

/// Squared horizontal speed below which horizontal velocity is zeroed.
const HORIZONTAL_SNAP_SQ: f32 = SMALL_NUMBER * 10.0;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// All of the time was simulated on the wall.
    Completed,
    /// Touched a walkable floor. The run is over; `remaining` seconds are
    /// left for landing processing.
    Landed { remaining: f32, hit: MoveHit },
    /// The run ended mid-step. Remaining sub-steps were skipped.
    Aborted,
}

// ---------------------------------------------------------------------------
// Integrator
// ---------------------------------------------------------------------------

/// Wall-attached specialisation of the host's falling integrator.
///
/// Per sub-step: lateral acceleration with vertical velocity held, inward
/// stick push, shaped gravity with apex refinement, midpoint displacement,
/// then collision response through the [`BaseMover`].
pub struct WallRunIntegrator<'a> {
    cfg: &'a WallRunConfig,
}

impl<'a> WallRunIntegrator<'a> {
    pub fn new(cfg: &'a WallRunConfig) -> Self {
        Self { cfg }
    }

    pub fn velocity_limits(&self) -> VelocityLimits {
        VelocityLimits {
            max_speed: self.cfg.speed.run_speed,
            max_acceleration: self.cfg.speed.run_acceleration,
            braking_deceleration: self.cfg.speed.braking_deceleration,
        }
    }

    /// Gravity multiplier for the current state.
    ///
    /// Fixed while still climbing fast. Otherwise the phase sets a floor (none
    /// in Start, mid scale in Mid, the ramped end gravity in End) and slow
    /// horizontal speed can raise it toward the slow scale.
    pub fn gravity_scale(&self, state: &MovementState) -> f32 {
        let g = &self.cfg.gravity;
        if state.velocity.z > g.mid_velocity_threshold {
            return g.ascending_scale;
        }

        let mut scale = match state.run.phase() {
            Phase::Start => 0.0,
            Phase::Mid => g.mid_scale.max(0.0),
            Phase::End => state.run.end_gravity,
        };

        if g.scale_with_speed {
            let slow_start = self.cfg.speed.run_speed * g.slow_start_fraction;
            let speed = math::horizontal(state.velocity).length();
            if speed < slow_start {
                let alpha = (speed / slow_start).clamp(0.0, 1.0);
                scale = scale.max(math::lerp(g.slow_scale, g.mid_scale, alpha));
            }
        }
        scale
    }

    /// Simulate `dt` seconds of wall-running.
    pub fn step<M: BaseMover + ?Sized>(
        &self,
        state: &mut MovementState,
        mover: &mut M,
        dt: f32,
        sink: &mut dyn DebugSink,
    ) -> StepOutcome {
        if dt < MIN_TICK_TIME {
            return StepOutcome::Completed;
        }

        let machine = WallRunStateMachine::new(self.cfg);
        let limits = self.velocity_limits();
        let acceleration = math::horizontal(state.acceleration);
        let limited_air_control = mover.should_limit_air_control(dt, acceleration);

        let mut remaining = dt;
        let mut iterations = 0;
        let mut apex_attempts = 0;

        while remaining >= MIN_TICK_TIME && iterations < mover.max_simulation_iterations() {
            iterations += 1;
            let mut time_tick = mover.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let old_location = mover.location();
            let old_velocity = state.velocity;

            // Lateral and vertical channels integrate independently.
            if !mover.has_root_motion_override() {
                let lateral = math::horizontal(state.velocity);
                let v = mover.velocity_from_acceleration(lateral, acceleration, time_tick, 0.0, &limits);
                state.velocity = Vec3::new(v.x, v.y, old_velocity.z);
            }

            let push = -state.run.contact.normal * self.cfg.speed.stick_velocity * time_tick;
            state.velocity += push;

            let gravity = Vec3::new(0.0, 0.0, mover.gravity_z() * self.gravity_scale(state));
            let mut gravity_time = time_tick;
            self.draw_sub_step(state, old_location, gravity, push, sink);

            // Jump force may suspend gravity.
            let mut ending_jump_force = false;
            let jump_force = mover.jump_force();
            let gravity_while_jumping = jump_force.apply_gravity_while_jumping;
            if jump_force.time_remaining > 0.0 {
                let force_time = jump_force.time_remaining.min(time_tick);
                if !gravity_while_jumping {
                    gravity_time = (time_tick - force_time).max(0.0);
                }
                jump_force.time_remaining -= force_time;
                if jump_force.time_remaining <= 0.0 {
                    jump_force.time_remaining = 0.0;
                    ending_jump_force = true;
                }
            }

            state.velocity = mover.apply_gravity(state.velocity, gravity, gravity_time);

            // Split the sub-step at the apex so the top of the arc is not cut off.
            if old_velocity.z > 0.0
                && state.velocity.z <= 0.0
                && apex_attempts < mover.max_jump_apex_attempts()
            {
                let derived = (state.velocity - old_velocity) / time_tick;
                if derived.z.abs() > f32::EPSILON {
                    let time_to_apex = -old_velocity.z / derived.z;
                    if time_to_apex >= APEX_TIME_MINIMUM && time_to_apex < time_tick {
                        let mut apex = old_velocity + derived * time_to_apex;
                        apex.z = 0.0;
                        state.velocity = apex;
                        remaining += time_tick - time_to_apex;
                        time_tick = time_to_apex;
                        iterations -= 1;
                        apex_attempts += 1;
                        trace!(time_to_apex, "wall-run apex sub-step");
                    }
                }
            }

            state.velocity = mover.apply_root_motion(state.velocity, time_tick);

            let mut adjusted = 0.5 * (old_velocity + state.velocity) * time_tick;
            if ending_jump_force && !gravity_while_jumping {
                let non_gravity_time = (time_tick - gravity_time).max(0.0);
                adjusted = old_velocity * non_gravity_time
                    + 0.5 * (old_velocity + state.velocity) * gravity_time;
            }

            let mut hit = mover.move_and_collide(adjusted);
            let mut last_slice = time_tick;
            let mut sub_remaining = time_tick * (1.0 - hit.time);

            if hit.blocking {
                if mover.is_valid_landing_spot(mover.location(), &hit) {
                    remaining += sub_remaining;
                    machine.stop(state, StopReason::Landed);
                    return StepOutcome::Landed { remaining, hit };
                }

                // Deflect using the final velocity so the slide includes all of gravity.
                adjusted = state.velocity * time_tick;

                if !hit.start_penetrating
                    && mover.should_check_for_valid_landing_spot(time_tick, adjusted, &hit)
                {
                    let location = mover.location();
                    if let Some(floor) = mover.find_floor(location) {
                        if mover.is_valid_landing_spot(location, &floor) {
                            remaining += sub_remaining;
                            machine.stop(state, StopReason::Landed);
                            return StepOutcome::Landed { remaining, hit: floor };
                        }
                    }
                }

                if mover.handle_impact(&hit, last_slice, adjusted) == ImpactResponse::Detach {
                    machine.stop(state, StopReason::Detached);
                }
                if !state.is_wall_running() {
                    return StepOutcome::Aborted;
                }

                let mut velocity_no_air_control = old_velocity;
                let mut air_control_accel = state.acceleration;
                if limited_air_control {
                    let lateral = math::horizontal(old_velocity);
                    let v = mover.velocity_from_acceleration(lateral, Vec3::ZERO, time_tick, 0.0, &limits);
                    velocity_no_air_control =
                        mover.apply_gravity(Vec3::new(v.x, v.y, old_velocity.z), gravity, gravity_time);
                    air_control_accel = (state.velocity - velocity_no_air_control) / time_tick;
                    let delta_v = mover.limit_air_control(last_slice, air_control_accel, &hit, false) * last_slice;
                    adjusted = (velocity_no_air_control + delta_v) * last_slice;
                }

                let old_hit_normal = hit.normal;
                let old_hit_impact_normal = hit.impact_normal;
                let mut delta = mover.slide_along_surface(adjusted, 1.0 - hit.time, old_hit_normal, &hit);

                if sub_remaining > SMALL_NUMBER {
                    self.set_deflected_velocity(state, mover, delta / sub_remaining);
                }

                if sub_remaining > SMALL_NUMBER && delta.dot(adjusted) > 0.0 {
                    hit = mover.move_and_collide(delta);

                    if hit.blocking {
                        // Second surface.
                        last_slice = sub_remaining;
                        sub_remaining *= 1.0 - hit.time;

                        if mover.is_valid_landing_spot(mover.location(), &hit) {
                            remaining += sub_remaining;
                            machine.stop(state, StopReason::Landed);
                            return StepOutcome::Landed { remaining, hit };
                        }

                        if mover.handle_impact(&hit, last_slice, delta) == ImpactResponse::Detach {
                            machine.stop(state, StopReason::Detached);
                        }
                        if !state.is_wall_running() {
                            return StepOutcome::Aborted;
                        }

                        if limited_air_control && hit.normal.z > VERTICAL_SLOPE_NORMAL_Z {
                            let no_air_control = velocity_no_air_control * last_slice;
                            delta = mover.slide_along_surface(no_air_control, 1.0, old_hit_normal, &hit);
                        }

                        delta = mover.two_wall_adjust(delta, &hit, old_hit_normal);

                        // Slide along the second wall, never back into the first.
                        if limited_air_control {
                            let delta_v =
                                mover.limit_air_control(sub_remaining, air_control_accel, &hit, false) * sub_remaining;
                            if delta_v.dot(old_hit_normal) > 0.0 {
                                delta += delta_v * sub_remaining;
                            }
                        }

                        if sub_remaining > SMALL_NUMBER {
                            self.set_deflected_velocity(state, mover, delta / sub_remaining);
                        }

                        // Straddling two slopes, neither walkable.
                        let ditch = old_hit_impact_normal.z > 0.0
                            && hit.impact_normal.z > 0.0
                            && delta.z.abs() <= SMALL_NUMBER
                            && hit.impact_normal.dot(old_hit_impact_normal) < 0.0;

                        hit = mover.move_and_collide(delta);
                        if hit.time == 0.0 {
                            // Stuck: side-step.
                            let mut side_delta = math::horizontal_normal(old_hit_normal + hit.impact_normal);
                            if side_delta == Vec3::ZERO {
                                side_delta = Vec3::new(old_hit_normal.y, -old_hit_normal.x, 0.0).normalize_or_zero();
                            }
                            hit = mover.move_and_collide(side_delta);
                        }

                        if ditch || mover.is_valid_landing_spot(mover.location(), &hit) || hit.time == 0.0 {
                            machine.stop(state, StopReason::Landed);
                            return StepOutcome::Landed { remaining: 0.0, hit };
                        } else if mover.perch_radius_threshold() > 0.0
                            && hit.time == 1.0
                            && old_hit_impact_normal.z >= mover.walkable_floor_z()
                        {
                            // Virtual ditch inside the perch radius: jitter out.
                            let location = mover.location();
                            let z_moved = (location.z - old_location.z).abs();
                            let moved_2d_sq = math::horizontal(location - old_location).length_squared();
                            if z_moved <= 0.2 * time_tick && moved_2d_sq <= 4.0 * time_tick {
                                let max_speed = self.cfg.speed.run_speed;
                                state.velocity.x += 0.25 * max_speed * (mover.random_unit() - 0.5);
                                state.velocity.y += 0.25 * max_speed * (mover.random_unit() - 0.5);
                                state.velocity.z = (mover.jump_z_velocity() * 0.25).max(1.0);
                                mover.move_and_collide(state.velocity * time_tick);
                            }
                        }
                    }
                }
            }

            if math::horizontal(state.velocity).length_squared() <= HORIZONTAL_SNAP_SQ {
                state.velocity.x = 0.0;
                state.velocity.y = 0.0;
            }

            if !state.is_wall_running() {
                return StepOutcome::Aborted;
            }
        }

        StepOutcome::Completed
    }

    /// Velocity after a deflection. Root motion keeps its own horizontal part.
    fn set_deflected_velocity<M: BaseMover + ?Sized>(
        &self,
        state: &mut MovementState,
        mover: &M,
        deflected: Vec3,
    ) {
        state.velocity = if mover.has_root_motion_override() {
            Vec3::new(state.velocity.x, state.velocity.y, deflected.z)
        } else {
            deflected
        };
    }

    fn draw_sub_step(
        &self,
        state: &MovementState,
        location: Vec3,
        gravity: Vec3,
        push: Vec3,
        sink: &mut dyn DebugSink,
    ) {
        let flags = &self.cfg.debug;
        if flags.capsule() {
            let color = if flags.show_state || flags.show_all {
                phase_color(state.run.phase())
            } else {
                Color::BLUE
            };
            sink.draw(DebugShape::Capsule {
                center: location,
                half_height: self.cfg.base.capsule_half_height,
                radius: self.cfg.base.capsule_radius,
                color,
            });
        }
        if flags.run_forward() {
            debug::arrow(sink, location, state.run.forward_direction(), 300.0, Color::BLUE);
        }
        if flags.gravity() && gravity != Vec3::ZERO {
            sink.draw(DebugShape::Arrow {
                from: location,
                to: location + gravity / 4.0,
                color: Color::RED,
            });
        }
        if flags.wall_push() {
            debug::arrow(sink, location, push, 100.0, Color::CYAN);
        }
        if flags.wall_normal() {
            debug::arrow(sink, location, state.run.contact.normal, 100.0, Color::YELLOW);
        }
        if flags.acceleration() {
            debug::arrow(sink, location, state.acceleration, 100.0, Color::ORANGE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Contact, MovementMode, Side};
    use crate::config::GravityConfig;
    use crate::debug::{NullSink, ShapeLog};
    use crate::scene::{test_scene, SceneMover};

    fn running_state(cfg: &WallRunConfig, velocity: Vec3) -> MovementState {
        let mut state = MovementState::new(MovementMode::Falling);
        state.velocity = velocity;
        let contact = Contact::new(Side::Right, Vec3::NEG_X, Vec3::new(50.0, 0.0, 0.0));
        WallRunStateMachine::new(cfg).start(&mut state, contact);
        state.velocity = velocity;
        state
    }

    #[test]
    fn climbing_fast_uses_ascending_scale() {
        let cfg = WallRunConfig::default();
        let integrator = WallRunIntegrator::new(&cfg);
        let state = running_state(&cfg, Vec3::new(0.0, 1200.0, 300.0));
        assert_eq!(integrator.gravity_scale(&state), cfg.gravity.ascending_scale);
    }

    #[test]
    fn phase_sets_the_floor_at_full_speed() {
        let cfg = WallRunConfig::default();
        let integrator = WallRunIntegrator::new(&cfg);
        let mut state = running_state(&cfg, Vec3::new(0.0, 1200.0, 0.0));
        assert_eq!(integrator.gravity_scale(&state), 0.0);
        state.run.phase.advance(Phase::Mid);
        assert_eq!(integrator.gravity_scale(&state), cfg.gravity.mid_scale);
        state.run.phase.advance(Phase::End);
        state.run.end_gravity = 0.5;
        assert_eq!(integrator.gravity_scale(&state), 0.5);
    }

    #[test]
    fn slowing_down_raises_gravity() {
        let cfg = WallRunConfig::default();
        let integrator = WallRunIntegrator::new(&cfg);
        let mut state = running_state(&cfg, Vec3::ZERO);
        state.run.phase.advance(Phase::Mid);
        assert_eq!(integrator.gravity_scale(&state), cfg.gravity.slow_scale);

        let slow_start = cfg.speed.run_speed * cfg.gravity.slow_start_fraction;
        state.velocity = Vec3::new(0.0, slow_start * 0.5, 0.0);
        let expected = math::lerp(cfg.gravity.slow_scale, cfg.gravity.mid_scale, 0.5);
        assert!((integrator.gravity_scale(&state) - expected).abs() < 1e-6);

        let flat = WallRunConfig {
            gravity: GravityConfig {
                scale_with_speed: false,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(WallRunIntegrator::new(&flat).gravity_scale(&state), flat.gravity.mid_scale);
    }

    #[test]
    fn tiny_step_does_nothing() {
        let cfg = WallRunConfig::default();
        let level = test_scene::wall_corridor();
        let mut mover = SceneMover::new(&level, cfg.base.clone(), test_scene::SPAWN);
        let mut state = running_state(&cfg, Vec3::new(0.0, 800.0, 0.0));
        let before = state.clone();
        let outcome = WallRunIntegrator::new(&cfg).step(&mut state, &mut mover, 1.0e-7, &mut NullSink);
        assert_eq!(outcome, StepOutcome::Completed);
        assert_eq!(state, before);
        assert_eq!(mover.location(), test_scene::SPAWN);
    }

    #[test]
    fn runs_along_the_wall() {
        let cfg = WallRunConfig::default();
        let level = test_scene::wall_corridor();
        let mut mover = SceneMover::new(&level, cfg.base.clone(), test_scene::SPAWN);
        let mut state = running_state(&cfg, Vec3::new(0.0, 800.0, 0.0));
        state.run.phase.advance(Phase::Mid);
        state.acceleration = Vec3::Y * cfg.speed.run_acceleration;
        let integrator = WallRunIntegrator::new(&cfg);

        for _ in 0..30 {
            let outcome = integrator.step(&mut state, &mut mover, 1.0 / 60.0, &mut NullSink);
            assert_eq!(outcome, StepOutcome::Completed);
        }
        let location = mover.location();
        assert!(location.y > 300.0, "moved along the run: {location}");
        assert!(location.x <= test_scene::WALL_FACE_X - cfg.base.capsule_radius + 1e-3);
        assert!(location.x > 0.0, "pressed toward the wall");
        assert!(state.velocity.y <= cfg.speed.run_speed + 1e-3);
        assert!(state.is_wall_running());
    }

    #[test]
    fn touching_floor_lands() {
        let cfg = WallRunConfig::default();
        let level = test_scene::wall_corridor();
        let start = Vec3::new(0.0, 0.0, cfg.base.capsule_half_height + 5.0);
        let mut mover = SceneMover::new(&level, cfg.base.clone(), start);
        let mut state = running_state(&cfg, Vec3::new(0.0, 600.0, -900.0));
        state.run.phase.advance(Phase::Mid);

        let outcome = WallRunIntegrator::new(&cfg).step(&mut state, &mut mover, 1.0 / 30.0, &mut NullSink);
        match outcome {
            StepOutcome::Landed { remaining, hit } => {
                assert!(remaining > 0.0 && remaining < 1.0 / 30.0);
                assert!(hit.impact_normal.z > cfg.base.walkable_floor_z);
            }
            other => panic!("expected landing, got {other:?}"),
        }
        assert!(!state.is_wall_running());
        assert!(state.cooldown.is_cooling(Side::Right));
    }

    #[test]
    fn debug_shapes_follow_flags() {
        let mut cfg = WallRunConfig::default();
        cfg.debug.show_all = true;
        let level = test_scene::wall_corridor();
        let mut mover = SceneMover::new(&level, cfg.base.clone(), test_scene::SPAWN);
        let mut state = running_state(&cfg, Vec3::new(0.0, 800.0, 0.0));
        state.acceleration = Vec3::Y * 100.0;
        let mut log = ShapeLog::default();
        WallRunIntegrator::new(&cfg).step(&mut state, &mut mover, 1.0 / 60.0, &mut log);
        assert!(log.shapes.iter().any(|s| matches!(s, DebugShape::Capsule { color, .. } if *color == Color::GREEN)));
        // Start phase at full speed has no gravity, so no gravity arrow.
        assert_eq!(log.shapes.len(), 5);
    }
}
