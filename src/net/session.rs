use std::collections::VecDeque;

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::components::{MoveInput, MovementMode, MovementState};
use crate::config::WallRunConfig;
use crate::debug::DebugSink;
use crate::engine::{BaseMover, Raycast};
use crate::systems::{MoveReport, WallRunMovement};

use super::ledger::PredictionLedger;
use super::snapshot::Snapshot;
use super::wire::{self, Correction, Frame, MoveAck, MoveMessage, WireError};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Predicting side: simulates locally, records every tick, replays on correction.
pub struct ClientPrediction<W, M> {
    cfg: WallRunConfig,
    world: W,
    mover: M,
    state: MovementState,
    ledger: PredictionLedger,
    next_tick: u64,
    corrections: u32,
}

impl<W: Raycast, M: BaseMover> ClientPrediction<W, M> {
    pub fn new(cfg: WallRunConfig, world: W, mover: M, state: MovementState) -> Self {
        Self {
            cfg,
            world,
            mover,
            state,
            ledger: PredictionLedger::new(),
            next_tick: 1,
            corrections: 0,
        }
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    pub fn location(&self) -> Vec3 {
        self.mover.location()
    }

    pub fn ledger(&self) -> &PredictionLedger {
        &self.ledger
    }

    /// Corrections received so far.
    pub fn corrections(&self) -> u32 {
        self.corrections
    }

    /// Simulate one local tick and record it.
    pub fn tick(&mut self, input: MoveInput, dt: f32, sink: &mut dyn DebugSink) -> MoveReport {
        let movement = WallRunMovement::new(&self.cfg);
        movement
            .state_machine()
            .apply_unstick_input(&mut self.state, input.wants_to_unstick);

        let tick = self.next_tick;
        self.next_tick += 1;
        let mut snapshot = Snapshot::capture(tick, dt, input, self.mover.location(), &self.state);

        if self
            .ledger
            .can_combine_with_tail(&snapshot, &self.cfg.prediction, self.cfg.gravity.end_scale)
        {
            if let Some(tail) = self.ledger.pop_unsent_tail() {
                // Re-simulate both ticks as one from the older start.
                snapshot = tail.combine(snapshot);
                self.mover.set_location(snapshot.start_location);
                self.state = snapshot.start.clone();
            }
        }

        self.mover.seed_random(snapshot.tick);
        let report = movement.perform_move(
            &mut self.state,
            &self.world,
            &mut self.mover,
            &snapshot.input,
            snapshot.dt,
            sink,
        );
        snapshot.finish(self.mover.location());
        self.ledger.record(snapshot);
        report
    }

    /// Outgoing moves for this frame.
    pub fn flush(&mut self) -> Vec<MoveMessage> {
        self.ledger.flush()
    }

    /// Encode outgoing moves, one frame each.
    pub fn flush_frames(&mut self) -> Vec<Vec<u8>> {
        self.flush()
            .into_iter()
            .map(|m| {
                let mut buf = Vec::new();
                wire::encode(&Frame::Move(m), &mut buf);
                buf
            })
            .collect()
    }

    /// Consume an acknowledgement. A correction rewinds to the authority's
    /// state and replays everything still pending.
    pub fn handle_ack(&mut self, ack: &MoveAck, sink: &mut dyn DebugSink) {
        if self.ledger.last_acked_tick().is_some_and(|last| ack.tick <= last) {
            debug!(tick = ack.tick, "ignoring stale acknowledgement");
            return;
        }
        let acked = self.ledger.acknowledge(ack.tick);
        let Some(correction) = ack.correction else {
            return;
        };

        let predicted = acked.map_or(self.mover.location(), |m| m.end_location);
        info!(
            tick = ack.tick,
            error = (correction.position - predicted).length(),
            mode = ?correction.mode,
            "prediction corrected"
        );
        self.corrections += 1;
        self.mover.set_location(correction.position);
        self.state.velocity = correction.velocity;
        self.state.mode = correction.mode;

        let movement = WallRunMovement::new(&self.cfg);
        let mut replayed = 0;
        for snapshot in self.ledger.pending_mut() {
            snapshot.prep(&mut self.state);
            self.mover.seed_random(snapshot.tick);
            movement.perform_move(
                &mut self.state,
                &self.world,
                &mut self.mover,
                &snapshot.input,
                snapshot.dt,
                sink,
            );
            snapshot.finish(self.mover.location());
            replayed += 1;
        }
        debug!(replayed, "replayed pending moves");
    }

    pub fn handle_frame(&mut self, bytes: &[u8], sink: &mut dyn DebugSink) -> Result<(), WireError> {
        match wire::decode(bytes)? {
            Frame::Ack(ack) => self.handle_ack(&ack, sink),
            Frame::Move(m) => warn!(tick = m.tick, "client received a move frame"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

/// Authoritative side: applies client moves in order and checks their outcome.
pub struct Authority<W, M> {
    cfg: WallRunConfig,
    world: W,
    mover: M,
    state: MovementState,
    last_tick: Option<u64>,
}

impl<W: Raycast, M: BaseMover> Authority<W, M> {
    pub fn new(cfg: WallRunConfig, world: W, mover: M, state: MovementState) -> Self {
        Self {
            cfg,
            world,
            mover,
            state,
            last_tick: None,
        }
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    pub fn location(&self) -> Vec3 {
        self.mover.location()
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// Apply one move. Stale or repeated ticks are dropped without an ack.
    pub fn apply(&mut self, msg: &MoveMessage, sink: &mut dyn DebugSink) -> Option<MoveAck> {
        if self.last_tick.is_some_and(|last| msg.tick <= last) {
            debug!(tick = msg.tick, "dropping stale move");
            return None;
        }
        if msg.dt <= 0.0 {
            warn!(tick = msg.tick, dt = msg.dt, "dropping move with bad delta time");
            return None;
        }
        self.last_tick = Some(msg.tick);

        let input = MoveInput {
            acceleration: msg.acceleration,
            facing_yaw: msg.facing_yaw,
            jump: msg.jump,
            wants_to_unstick: msg.wants_to_unstick,
        };
        let movement = WallRunMovement::new(&self.cfg);
        movement
            .state_machine()
            .set_unstick_requested(&mut self.state, msg.wants_to_unstick);
        self.mover.seed_random(msg.tick);
        movement.perform_move(&mut self.state, &self.world, &mut self.mover, &input, msg.dt, sink);

        let location = self.mover.location();
        let error = (location - msg.end_location).length();
        let correction = (error > self.cfg.prediction.max_position_error).then(|| {
            debug!(tick = msg.tick, error, "client out of tolerance");
            Correction {
                position: location,
                velocity: self.state.velocity,
                mode: self.state.mode,
            }
        });
        Some(MoveAck {
            tick: msg.tick,
            correction,
        })
    }

    /// Decode and apply one frame; returns the encoded acknowledgement.
    pub fn handle_frame(&mut self, bytes: &[u8], sink: &mut dyn DebugSink) -> Result<Option<Vec<u8>>, WireError> {
        let msg = match wire::decode(bytes)? {
            Frame::Move(m) => m,
            Frame::Ack(a) => {
                warn!(tick = a.tick, "authority received an ack frame");
                return Ok(None);
            }
        };
        Ok(self.apply(&msg, sink).map(|ack| {
            let mut buf = Vec::new();
            wire::encode(&Frame::Ack(ack), &mut buf);
            buf
        }))
    }

    /// Force the authority's character somewhere, as a level script would.
    pub fn teleport(&mut self, location: Vec3, velocity: Vec3, mode: MovementMode) {
        self.mover.set_location(location);
        self.state.velocity = velocity;
        self.state.mode = mode;
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// In-order delivery with a fixed delay in ticks.
#[derive(Debug)]
pub struct DelayLine<T> {
    latency: u64,
    queue: VecDeque<(u64, T)>,
}

impl<T> DelayLine<T> {
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            queue: VecDeque::new(),
        }
    }

    pub fn send(&mut self, now: u64, item: T) {
        self.queue.push_back((now + self.latency, item));
    }

    /// Everything due at or before `now`, in send order.
    pub fn receive(&mut self, now: u64) -> Vec<T> {
        let mut out = Vec::new();
        while self.queue.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, item)) = self.queue.pop_front() {
                out.push(item);
            }
        }
        out
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }
}
