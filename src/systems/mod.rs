mod cooldown;
pub mod integrator;
pub mod jump;
pub mod movement;
pub mod probe;
pub mod state;

pub use integrator::{StepOutcome, WallRunIntegrator};
pub use jump::{JumpLaunch, JumpLauncher};
pub use movement::{MoveReport, WallRunMovement};
pub use probe::{ProbeReport, WallProbe};
pub use state::{ramp_toward, StopReason, TickReport, WallRunStateMachine};
