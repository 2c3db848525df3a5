use glam::Vec3;

use wallrun::components::{MoveInput, MovementMode, MovementState, Phase, Side};
use wallrun::config::WallRunConfig;
use wallrun::debug::NullSink;
use wallrun::engine::BaseMover;
use wallrun::scene::{test_scene, SceneMover};
use wallrun::systems::{StopReason, WallRunMovement};

const DT: f32 = 1.0 / 60.0;

fn run_forward() -> MoveInput {
    MoveInput {
        acceleration: Vec3::Y,
        facing_yaw: 90.0,
        ..Default::default()
    }
}

fn airborne() -> MovementState {
    let mut state = MovementState::new(MovementMode::Falling);
    state.velocity = Vec3::new(0.0, 500.0, -50.0);
    state
}

#[test]
fn full_run_reaches_end_and_lands() {
    let cfg = WallRunConfig::default();
    let level = test_scene::wall_corridor();
    let high = test_scene::SPAWN + Vec3::Z * 300.0;
    let mut mover = SceneMover::new(&level, cfg.base.clone(), high);
    let mut state = airborne();
    let movement = WallRunMovement::new(&cfg);

    let mut phases = Vec::new();
    let mut landed_at = None;
    for tick in 0..900 {
        let report = movement.perform_move(&mut state, &level, &mut mover, &run_forward(), DT, &mut NullSink);
        if tick == 0 {
            assert_eq!(report.started, Some(Side::Right));
        }
        if state.is_wall_running() && phases.last() != Some(&state.run.phase()) {
            phases.push(state.run.phase());
        }
        if report.landed {
            assert_eq!(report.stopped, Some(StopReason::Landed));
            landed_at = Some(tick);
            break;
        }
    }

    let landed_at = landed_at.expect("run ends on the floor");
    assert_eq!(phases, vec![Phase::Start, Phase::Mid, Phase::End]);
    // Mid alone lasts the configured duration.
    assert!(landed_at as f32 * DT > cfg.timing.duration);
    assert_eq!(state.mode, MovementMode::Walking);
    assert!(state.cooldown.is_cooling(Side::Right));
    assert!(mover.location().y > 1000.0, "ran along the wall");
    assert!(mover.location().x <= test_scene::WALL_FACE_X - cfg.base.capsule_radius);
}

#[test]
fn holding_unstick_pushes_off() {
    let cfg = WallRunConfig::default();
    let level = test_scene::wall_corridor();
    let mut mover = SceneMover::new(&level, cfg.base.clone(), test_scene::SPAWN);
    let mut state = airborne();
    let movement = WallRunMovement::new(&cfg);
    let machine = movement.state_machine();

    let mut stopped = None;
    for tick in 0..60 {
        machine.apply_unstick_input(&mut state, tick >= 20);
        let report = movement.perform_move(&mut state, &level, &mut mover, &run_forward(), DT, &mut NullSink);
        if tick < 20 {
            assert!(state.is_wall_running(), "still running at tick {tick}");
        }
        if let Some(reason) = report.stopped {
            stopped = Some((tick, reason));
            break;
        }
    }

    let (tick, reason) = stopped.expect("unstick fires");
    assert_eq!(reason, StopReason::Unstick);
    let held = (tick - 20 + 1) as f32 * DT;
    assert!(held >= cfg.timing.unstick_hold_time - 1e-4);
    assert!(held < cfg.timing.unstick_hold_time + 2.0 * DT);
    assert!(state.velocity.x < 0.0, "pushed away from the wall");
    assert_eq!(state.mode, MovementMode::Falling);
}

#[test]
fn wall_jump_to_the_opposite_wall() {
    let cfg = WallRunConfig::default();
    let level = test_scene::double_wall();
    let mut mover = SceneMover::new(&level, cfg.base.clone(), test_scene::SPAWN);
    let mut state = airborne();
    let movement = WallRunMovement::new(&cfg);

    for _ in 0..20 {
        movement.perform_move(&mut state, &level, &mut mover, &run_forward(), DT, &mut NullSink);
    }
    assert!(state.is_wall_running_side(Side::Right));

    let jump = MoveInput {
        jump: true,
        ..run_forward()
    };
    let report = movement.perform_move(&mut state, &level, &mut mover, &jump, DT, &mut NullSink);
    assert!(report.jump.is_some());

    let mut attached = None;
    for _ in 0..90 {
        let report = movement.perform_move(&mut state, &level, &mut mover, &run_forward(), DT, &mut NullSink);
        if let Some(side) = report.started {
            attached = Some(side);
            break;
        }
    }
    assert_eq!(attached, Some(Side::Left));
    assert!(state.cooldown.is_cooling(Side::Right));
}
