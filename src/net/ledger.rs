use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::config::PredictionConfig;

use super::snapshot::Snapshot;
use super::wire::MoveMessage;

/// Ordered record of predicted moves the authority has not confirmed yet.
///
/// Moves are appended in tick order, combined with the unsent tail when the
/// rules allow, flushed as wire messages, and dropped once acknowledged.
#[derive(Debug, Default)]
pub struct PredictionLedger {
    moves: VecDeque<Snapshot>,
    /// Highest tick handed out by `flush`.
    sent_through: Option<u64>,
    last_acked_tick: Option<u64>,
    last_acked_unstick: bool,
}

impl PredictionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn last_acked_tick(&self) -> Option<u64> {
        self.last_acked_tick
    }

    pub fn is_important(&self, snapshot: &Snapshot) -> bool {
        snapshot.is_important(self.last_acked_unstick)
    }

    fn is_sent(&self, tick: u64) -> bool {
        self.sent_through.is_some_and(|sent| tick <= sent)
    }

    /// Whether `candidate` may be folded into the newest recorded move.
    /// Sent or important moves are never combined.
    pub fn can_combine_with_tail(&self, candidate: &Snapshot, cfg: &PredictionConfig, end_scale: f32) -> bool {
        let Some(tail) = self.moves.back() else {
            return false;
        };
        !self.is_sent(tail.tick)
            && !self.is_important(tail)
            && !self.is_important(candidate)
            && tail.can_combine(candidate, cfg, end_scale)
    }

    /// Remove the newest move so it can be combined and re-simulated.
    pub fn pop_unsent_tail(&mut self) -> Option<Snapshot> {
        let tail = self.moves.back()?;
        if self.is_sent(tail.tick) {
            return None;
        }
        let tail = self.moves.pop_back()?;
        trace!(tick = tail.tick, "combining with unsent tail");
        Some(tail)
    }

    /// Append a finished move. Ticks must increase.
    pub fn record(&mut self, snapshot: Snapshot) {
        debug_assert!(self.moves.back().map_or(true, |b| b.tick < snapshot.tick));
        self.moves.push_back(snapshot);
    }

    /// Messages to send now: every unsent move, preceded by the oldest
    /// important move that was sent but is still unacknowledged.
    pub fn flush(&mut self) -> Vec<MoveMessage> {
        let mut out = Vec::new();
        if let Some(resend) = self
            .moves
            .iter()
            .find(|m| self.is_sent(m.tick) && self.is_important(m))
        {
            trace!(tick = resend.tick, "resending important move");
            out.push(resend.to_message());
        }
        for m in self.moves.iter().filter(|m| !self.is_sent(m.tick)) {
            out.push(m.to_message());
        }
        if let Some(last) = self.moves.back() {
            self.sent_through = Some(last.tick);
        }
        out
    }

    /// Drop every move up to and including `tick`. Returns the acknowledged
    /// move if it was still held.
    pub fn acknowledge(&mut self, tick: u64) -> Option<Snapshot> {
        if self.last_acked_tick.is_some_and(|last| tick <= last) {
            debug!(tick, "ignoring stale acknowledgement");
            return None;
        }
        let mut acked = None;
        while self.moves.front().is_some_and(|m| m.tick <= tick) {
            acked = self.moves.pop_front();
        }
        self.last_acked_tick = Some(tick);
        if let Some(m) = &acked {
            self.last_acked_unstick = m.unstick_requested();
        }
        trace!(tick, pending = self.moves.len(), "acknowledged");
        acked
    }

    pub fn pending(&self) -> impl Iterator<Item = &Snapshot> {
        self.moves.iter()
    }

    pub fn pending_mut(&mut self) -> impl Iterator<Item = &mut Snapshot> {
        self.moves.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MoveInput, MovementMode, MovementState};
    use crate::config::WallRunConfig;
    use glam::Vec3;

    fn snapshot(tick: u64, unstick: bool) -> Snapshot {
        let mut state = MovementState::new(MovementMode::Falling);
        state.unstick.requested = unstick;
        Snapshot::capture(tick, 1.0 / 60.0, MoveInput::default(), Vec3::ZERO, &state)
    }

    #[test]
    fn flush_sends_each_move_once() {
        let mut ledger = PredictionLedger::new();
        ledger.record(snapshot(1, false));
        ledger.record(snapshot(2, false));
        let sent: Vec<u64> = ledger.flush().iter().map(|m| m.tick).collect();
        assert_eq!(sent, vec![1, 2]);
        assert!(ledger.flush().is_empty());

        ledger.record(snapshot(3, false));
        let sent: Vec<u64> = ledger.flush().iter().map(|m| m.tick).collect();
        assert_eq!(sent, vec![3]);
    }

    #[test]
    fn important_moves_resend_until_acked() {
        let mut ledger = PredictionLedger::new();
        ledger.record(snapshot(1, true));
        assert_eq!(ledger.flush().len(), 1);
        ledger.record(snapshot(2, true));
        let sent: Vec<u64> = ledger.flush().iter().map(|m| m.tick).collect();
        assert_eq!(sent, vec![1, 2]);

        ledger.acknowledge(1);
        // Tick 2 matches the acknowledged bit now.
        assert!(!ledger.is_important(ledger.pending().next().expect("tick 2")));
        assert!(ledger.flush().is_empty());
    }

    #[test]
    fn acknowledge_drops_prefix() {
        let mut ledger = PredictionLedger::new();
        for tick in 1..=5 {
            ledger.record(snapshot(tick, false));
        }
        let acked = ledger.acknowledge(3).expect("held");
        assert_eq!(acked.tick, 3);
        let left: Vec<u64> = ledger.pending().map(|m| m.tick).collect();
        assert_eq!(left, vec![4, 5]);
        assert!(ledger.acknowledge(2).is_none());
        assert_eq!(ledger.last_acked_tick(), Some(3));
    }

    #[test]
    fn only_unsent_tail_combines() {
        let cfg = WallRunConfig::default();
        let end_scale = cfg.gravity.end_scale;
        let mut ledger = PredictionLedger::new();
        ledger.record(snapshot(1, false));
        assert!(ledger.can_combine_with_tail(&snapshot(2, false), &cfg.prediction, end_scale));
        assert!(!ledger.can_combine_with_tail(&snapshot(2, true), &cfg.prediction, end_scale));

        ledger.flush();
        assert!(!ledger.can_combine_with_tail(&snapshot(2, false), &cfg.prediction, end_scale));
        assert!(ledger.pop_unsent_tail().is_none());
    }
}
