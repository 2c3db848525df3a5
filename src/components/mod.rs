pub mod physics;
mod wallrun;

pub use physics::{Collider, Label, Position, Static};
pub use wallrun::*;
