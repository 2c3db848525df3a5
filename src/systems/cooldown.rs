use crate::components::{CooldownState, Side};

impl CooldownState {
    pub fn remaining(&self, side: Side) -> f32 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn is_cooling(&self, side: Side) -> bool {
        self.remaining(side) > 0.0
    }

    /// Block `side` for `duration` seconds. Negative durations clamp to 0.
    pub fn arm(&mut self, side: Side, duration: f32) {
        let slot = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        *slot = duration.max(0.0);
    }

    /// Count both sides down toward zero.
    pub fn tick(&mut self, dt: f32) {
        for slot in [&mut self.left, &mut self.right] {
            if *slot > 0.0 {
                *slot = (*slot - dt).max(0.0);
            }
        }
    }
}
