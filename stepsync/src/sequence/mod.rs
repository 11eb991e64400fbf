//! Maps clock ticks onto a cyclic step position.

use std::num::NonZeroUsize;

pub fn step_index(tick: u64, step_count: NonZeroUsize) -> usize {
    (tick % step_count.get() as u64) as usize
}

#[derive(Clone, Debug)]
pub struct StepIndexer {
    step_count: NonZeroUsize,
    current: usize,
}

impl StepIndexer {
    /// # Panics
    /// When `step_count` is zero.
    pub fn new(step_count: usize) -> Self {
        let step_count = NonZeroUsize::new(step_count)
            .unwrap_or_else(|| panic!("step count must be positive"));

        Self {
            step_count,
            current: 0,
        }
    }

    pub fn step_count(&self) -> usize {
        self.step_count.get()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn update(&mut self, tick: u64) -> usize {
        self.current = step_index(tick, self.step_count);
        self.current
    }

    /// Restarts the sequence at step 0 independent of the clock.
    pub fn reset(&mut self) {
        self.current = 0;
    }
}
