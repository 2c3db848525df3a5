use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{info, warn};

use wallrun::components::{MoveInput, MovementMode, MovementState};
use wallrun::config::WallRunConfig;
use wallrun::debug::{NullSink, ShapeLog};
use wallrun::engine::FixedTimestep;
use wallrun::net::{Authority, ClientPrediction, DelayLine};
use wallrun::scene::{test_scene, SceneMover};
use wallrun::trace::init_tracing;

const TICK_DT: f32 = 1.0 / 60.0;

#[derive(Parser)]
#[command(name = "wallrun", about = "Headless wall-run prediction session")]
struct Args {
    /// RON tuning file. Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Simulation ticks to run.
    #[arg(long, default_value_t = 240)]
    ticks: u64,
    /// One-way network delay, in frames.
    #[arg(long, default_value_t = 3)]
    latency: u64,
    /// Hold the unstick input from this tick on.
    #[arg(long)]
    hold_unstick: Option<u64>,
    /// Press jump on this tick.
    #[arg(long)]
    jump_at: Option<u64>,
    /// Send every tick as its own move.
    #[arg(long)]
    no_combine: bool,
    /// Record debug shapes and report how many were drawn.
    #[arg(long)]
    debug_shapes: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => WallRunConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WallRunConfig::default(),
    };
    for w in cfg.validate() {
        warn!("config: {w}");
    }
    if args.no_combine {
        cfg.prediction.max_combined_dt = 0.0;
    }
    if args.debug_shapes {
        cfg.debug.show_all = true;
    }

    let level = test_scene::wall_corridor();
    let mut start = MovementState::new(MovementMode::Falling);
    start.velocity = Vec3::new(0.0, 500.0, -50.0);

    let mut client = ClientPrediction::new(
        cfg.clone(),
        &level,
        SceneMover::new(&level, cfg.base.clone(), test_scene::SPAWN),
        start.clone(),
    );
    let mut authority = Authority::new(
        cfg.clone(),
        &level,
        SceneMover::new(&level, cfg.base.clone(), test_scene::SPAWN),
        start,
    );

    let mut upstream = DelayLine::new(args.latency);
    let mut downstream = DelayLine::new(args.latency);
    let mut shapes = ShapeLog::default();
    let mut clock = FixedTimestep::new(TICK_DT);
    // Uneven frame times, so frames produce zero, one or two ticks.
    let mut frame_rng = StdRng::seed_from_u64(cfg.base.rng_seed);
    let mut frame = 0u64;
    let mut tick = 0u64;

    info!(ticks = args.ticks, latency = args.latency, "session start");
    while tick < args.ticks {
        let due = clock.advance(TICK_DT * frame_rng.gen_range(0.6..1.6));
        for _ in 0..due {
            if tick >= args.ticks {
                break;
            }
            tick += 1;
            let input = MoveInput {
                acceleration: Vec3::Y,
                facing_yaw: 90.0,
                jump: args.jump_at == Some(tick),
                wants_to_unstick: args.hold_unstick.is_some_and(|t| tick >= t),
            };
            let report = client.tick(input, TICK_DT, &mut shapes);
            if let Some(side) = report.started {
                info!(tick, side = side.label(), "client attached");
            }
            if let Some(reason) = report.stopped {
                info!(tick, reason = reason.label(), "client detached");
            }
        }

        frame += 1;
        for bytes in client.flush_frames() {
            upstream.send(frame, bytes);
        }
        for bytes in upstream.receive(frame) {
            if let Some(ack) = authority.handle_frame(&bytes, &mut NullSink)? {
                downstream.send(frame, ack);
            }
        }
        for bytes in downstream.receive(frame) {
            client.handle_frame(&bytes, &mut NullSink)?;
        }
    }

    // Drain whatever is still in flight.
    while upstream.in_flight() > 0 || downstream.in_flight() > 0 {
        frame += 1;
        for bytes in upstream.receive(frame) {
            if let Some(ack) = authority.handle_frame(&bytes, &mut NullSink)? {
                downstream.send(frame, ack);
            }
        }
        for bytes in downstream.receive(frame) {
            client.handle_frame(&bytes, &mut NullSink)?;
        }
    }

    let error = (client.location() - authority.location()).length();
    info!(
        frames = frame,
        clock_ticks = clock.tick,
        corrections = client.corrections(),
        pending = client.ledger().len(),
        error,
        mode = ?authority.state().mode,
        location = ?authority.location(),
        "session end"
    );
    if args.debug_shapes {
        info!(shapes = shapes.shapes.len(), "debug shapes drawn");
    }
    Ok(())
}
