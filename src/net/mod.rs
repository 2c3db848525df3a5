//! Client-side prediction: saved moves, their ledger, the wire format and
//! the client/authority pair that exchanges them.

mod ledger;
pub mod session;
mod snapshot;
pub mod wire;

pub use ledger::PredictionLedger;
pub use session::{Authority, ClientPrediction, DelayLine};
pub use snapshot::Snapshot;
pub use wire::{Correction, Frame, MoveAck, MoveMessage, WireError};
