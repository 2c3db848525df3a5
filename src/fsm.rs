/// Forward-only finite-state-machine container.
///
/// `S` is an ordered state type (usually a fieldless enum whose declaration
/// order is the allowed progression). The machine tracks the current state
/// and how long it has been in it. Transitions may only move forward; going
/// back requires an explicit [`restart`](StateMachine::restart).
///
/// # Usage
/// ```
/// use wallrun::fsm::StateMachine;
/// use wallrun::components::Phase;
///
/// let mut fsm = StateMachine::new(Phase::Start);
/// assert!(fsm.advance(Phase::Mid));
/// assert!(!fsm.advance(Phase::Start));
/// fsm.tick(0.1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine<S: Copy + Ord> {
    pub state: S,
    /// Seconds spent in the current state. Reset to 0.0 on each transition.
    pub elapsed: f32,
}

impl<S: Copy + Ord> StateMachine<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            elapsed: 0.0,
        }
    }

    /// Move to `next` only if it lies strictly after the current state.
    /// Returns whether a transition happened.
    pub fn advance(&mut self, next: S) -> bool {
        if next <= self.state {
            return false;
        }
        self.state = next;
        self.elapsed = 0.0;
        true
    }

    /// Unconditionally jump back to `initial`, as when a new run begins.
    pub fn restart(&mut self, initial: S) {
        self.state = initial;
        self.elapsed = 0.0;
    }

    /// Advance the elapsed-in-state timer by `dt` seconds. Call once per
    /// tick after processing transitions.
    pub fn tick(&mut self, dt: f32) {
        self.elapsed += dt;
    }
}
