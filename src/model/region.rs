//! Time regions on the project timeline.

use serde::{Deserialize, Serialize};

/// A time range in seconds. `t0 == t1` denotes a cursor point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectedRegion {
    t0: f64,
    t1: f64,
}

impl SelectedRegion {
    /// Creates a region, ordering the bounds so that `t0 <= t1`.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { t0: a, t1: b }
        } else {
            Self { t0: b, t1: a }
        }
    }

    /// A point region at the given time.
    pub fn point(t: f64) -> Self {
        Self { t0: t, t1: t }
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn t1(&self) -> f64 {
        self.t1
    }

    /// Whether the region collapses to a single point.
    pub fn is_point(&self) -> bool {
        self.t0 == self.t1
    }

    /// Sets both bounds, reordering if needed.
    pub fn set_times(&mut self, a: f64, b: f64) {
        *self = Self::new(a, b);
    }

    /// Moves the start bound. If it passes the end bound the region
    /// collapses to a point at `t0`.
    pub fn set_t0(&mut self, t0: f64) {
        self.t0 = t0;
        if self.t1 < t0 {
            self.t1 = t0;
        }
    }
}
