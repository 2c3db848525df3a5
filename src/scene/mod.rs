//! Bundled level geometry and reference mover, used by the demo binary and tests.

mod mover;
pub mod test_scene;
mod world;

pub use mover::SceneMover;
pub use world::{LevelGeometry, SweepHit, SKIN};
