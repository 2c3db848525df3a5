//! Deterministic wall-running movement core with client-side prediction.
//!
//! Per tick: probe for a wall, advance the run's phase and timers, integrate
//! along the wall (or hand off to the host's base mover), and record the move
//! for reconciliation with the authority.

pub mod components;
pub mod config;
pub mod debug;
pub mod engine;
pub mod fsm;
pub mod math;
pub mod net;
pub mod scene;
pub mod systems;
pub mod trace;
