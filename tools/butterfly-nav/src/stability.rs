//! Running-range convergence detector
//!
//! Tracks the min and max of a sequence since the last reset. Whenever the
//! spread exceeds the tolerance the window restarts at the latest value;
//! `held` counts observations since then.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spread {
    /// `max - min`
    Absolute,
    /// `(max - min) / min`
    Relative,
}

#[derive(Debug, Clone)]
pub struct StabilityWindow {
    spread: Spread,
    tolerance: f64,
    min: f64,
    max: f64,
    held: u32,
}

impl StabilityWindow {
    pub fn new(spread: Spread, tolerance: f64) -> Self {
        Self {
            spread,
            tolerance,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            held: 0,
        }
    }

    pub fn observe(&mut self, value: f64) {
        self.held += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if self.spread() > self.tolerance {
            self.held = 0;
            self.min = value;
            self.max = value;
        }
    }

    /// Observations since the window last restarted
    pub fn held(&self) -> u32 {
        self.held
    }

    pub fn spread(&self) -> f64 {
        match self.spread {
            Spread::Absolute => self.max - self.min,
            Spread::Relative => (self.max - self.min) / self.min,
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
