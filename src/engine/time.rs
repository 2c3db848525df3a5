/// Smallest accepted step. Anything below is raised to this.
const MIN_STEP: f32 = 1.0e-4;

/// Fixed-step accumulator. Variable frame time goes in, whole simulation
/// ticks come out; the remainder carries to the next frame.
pub struct FixedTimestep {
    step: f32,
    accumulator: f32,
    /// Index of the next tick to be produced.
    pub tick: u64,
}

impl FixedTimestep {
    /// Non-positive or NaN steps are clamped to a small positive step.
    pub fn new(step: f32) -> Self {
        Self {
            step: step.max(MIN_STEP),
            accumulator: 0.0,
            tick: 0,
        }
    }

    /// Add `frame_dt` seconds and return how many fixed ticks are now due.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        self.accumulator += frame_dt;
        let mut due = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            self.tick += 1;
            due += 1;
        }
        due
    }
}
