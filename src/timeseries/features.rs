//! Lag features for autoregressive models

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Lag structure: value at t-1 .. t-order predicts value at t
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagConfig {
    pub order: usize,
}

impl Default for LagConfig {
    fn default() -> Self {
        Self { order: 3 }
    }
}

impl LagConfig {
    pub fn new(order: usize) -> Self {
        Self { order: order.max(1) }
    }

    /// Supervised (lags, target) pairs over a series.
    ///
    /// Row `i` holds `[v[t-1], .., v[t-order]]` for `t = order + i`; the first
    /// `order` points have no full lag set and are dropped. Returns `None` when
    /// no row survives.
    pub fn build(&self, series: &[f64]) -> Option<(Array2<f64>, Array1<f64>)> {
        if series.len() <= self.order {
            return None;
        }

        let n_rows = series.len() - self.order;
        let x = Array2::from_shape_fn((n_rows, self.order), |(i, lag)| {
            let t = self.order + i;
            series[t - 1 - lag]
        });
        let y = Array1::from_iter(series[self.order..].iter().copied());
        Some((x, y))
    }

    /// Window holding the most recent `order` values of the series
    pub fn seed_window(&self, series: &[f64]) -> Option<LagWindow> {
        if series.len() < self.order {
            return None;
        }
        let lags = series.iter().rev().take(self.order).copied().collect();
        Some(LagWindow { lags })
    }
}

/// Sliding lag window carried through recursive prediction, most recent value first
#[derive(Debug, Clone, PartialEq)]
pub struct LagWindow {
    lags: VecDeque<f64>,
}

impl LagWindow {
    /// Current window as a single feature row
    pub fn features(&self) -> Array2<f64> {
        Array2::from_shape_fn((1, self.lags.len()), |(_, lag)| self.lags[lag])
    }

    /// Slide the window: `value` becomes lag 1 and the oldest lag falls off
    pub fn push(&mut self, value: f64) {
        self.lags.push_front(value);
        self.lags.pop_back();
    }

    pub fn lags(&self) -> Vec<f64> {
        self.lags.iter().copied().collect()
    }
}
