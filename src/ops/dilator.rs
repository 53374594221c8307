//! Dilation: non-uniform time warping anchored at feature times.

use crate::error::{Error, Result};
use crate::model::{Partial, PartialList};

/// Piecewise-linear remapping of the time axis through (initial, target)
/// anchor pairs. Outside the anchored range times shift with unit slope.
#[derive(Debug, Clone)]
pub struct Dilator {
    initial: Vec<f64>,
    target: Vec<f64>,
}

impl Dilator {
    pub fn new(initial: &[f64], target: &[f64]) -> Result<Self> {
        if initial.is_empty() || initial.len() != target.len() {
            return Err(Error::invalid_argument(format!(
                "anchor counts {} and {} must match and be non-zero",
                initial.len(),
                target.len()
            )));
        }
        if initial.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::invalid_argument(
                "initial times must be strictly increasing",
            ));
        }
        if target.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::invalid_argument(
                "target times must be non-decreasing",
            ));
        }
        if initial.iter().chain(target.iter()).any(|t| !t.is_finite()) {
            return Err(Error::invalid_argument("anchor time is not finite"));
        }
        Ok(Self {
            initial: initial.to_vec(),
            target: target.to_vec(),
        })
    }

    /// Map one time through the warp.
    pub fn warp(&self, t: f64) -> f64 {
        let first = 0;
        let last = self.initial.len() - 1;
        if t <= self.initial[first] {
            return self.target[first] + (t - self.initial[first]);
        }
        if t >= self.initial[last] {
            return self.target[last] + (t - self.initial[last]);
        }
        let i = self
            .initial
            .partition_point(|&anchor| anchor <= t)
            .saturating_sub(1);
        let span = self.initial[i + 1] - self.initial[i];
        let alpha = (t - self.initial[i]) / span;
        self.target[i] + alpha * (self.target[i + 1] - self.target[i])
    }

    /// Remap every breakpoint time of a partial. Breakpoint parameters
    /// are untouched; times collapsed together by a flat warp keep the
    /// earliest breakpoint.
    pub fn dilate_partial(&self, partial: &mut Partial) {
        let mut warped = Partial::with_label(partial.label());
        for (t, bp) in partial.iter() {
            let _ = warped.push_point(self.warp(t), *bp);
        }
        *partial = warped;
    }

    pub fn dilate(&self, partials: &mut PartialList) {
        for p in partials.iter_mut() {
            self.dilate_partial(p);
        }
    }

    /// Remap an opaque list of times (feature markers and the like).
    pub fn dilate_times(&self, times: &mut [f64]) {
        for t in times.iter_mut() {
            *t = self.warp(*t);
        }
    }
}
