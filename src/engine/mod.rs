pub mod mover;
pub mod raycast;
pub mod time;

pub use mover::{BaseMover, ImpactResponse, JumpForce, MoveHit, VelocityLimits, MIN_TICK_TIME};
pub use raycast::{RayHit, Raycast};
pub use time::FixedTimestep;
