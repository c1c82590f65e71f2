use serde::{Deserialize, Serialize};

/// Linear decay from `initial` to `minimum` over a horizon of training updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSchedule {
    pub initial: f64,
    pub minimum: f64,
}

impl LinearSchedule {
    pub fn new(initial: f64, minimum: f64) -> Self {
        Self { initial, minimum }
    }

    /// Value after `updates` of `horizon` updates. Holds at `minimum` from the
    /// horizon on; a zero horizon means the minimum applies immediately.
    pub fn value(&self, updates: usize, horizon: usize) -> f64 {
        if updates >= horizon {
            return self.minimum;
        }
        (self.minimum - self.initial) / horizon as f64 * updates as f64 + self.initial
    }
}
