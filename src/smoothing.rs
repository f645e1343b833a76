//! Moving-average filter for the tracked hand x-coordinate.
//!
//! A plain mean over the last N samples: no tuning beyond the window size and
//! at most N-1 frames of lag. A larger window suppresses more jitter but makes
//! the estimated fret trail real hand movement for longer; at ~20 detections/s
//! the default of 5 lags a shift by about a quarter of a second.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone)]
pub struct PositionSmoother {
    history: VecDeque<f64>,
    capacity: usize,
}

impl Default for PositionSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl PositionSmoother {
    /// A window of 0 is treated as 1 (no smoothing).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, evicting the oldest past capacity, and return the current mean.
    pub fn add(&mut self, value: f64) -> f64 {
        self.history.push_back(value);
        if self.history.len() > self.capacity {
            self.history.pop_front();
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
