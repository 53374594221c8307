//! Time-ordered breakpoint sequences and parameter interpolation.

use std::f64::consts::TAU;

use crate::error::{Error, Result};
use crate::model::breakpoint::Breakpoint;

/// A single bandwidth-enhanced sinusoidal track: breakpoints at strictly
/// increasing times, plus an integer label (0 = unlabeled).
///
/// Breakpoints live in a contiguous array; lookups are binary searches and
/// traversal is sequential.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partial {
    label: i32,
    points: Vec<(f64, Breakpoint)>,
}

/// Order-preserving list of partials. Operations that fuse or re-order
/// partials (distill, collate) document their output ordering.
pub type PartialList = Vec<Partial>;

impl Partial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: i32) -> Self {
        Self {
            label,
            points: Vec::new(),
        }
    }

    pub fn label(&self) -> i32 {
        self.label
    }

    pub fn set_label(&mut self, label: i32) {
        self.label = label;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start_time(&self) -> Option<f64> {
        self.points.first().map(|&(t, _)| t)
    }

    pub fn end_time(&self) -> Option<f64> {
        self.points.last().map(|&(t, _)| t)
    }

    pub fn duration(&self) -> Option<f64> {
        match (self.start_time(), self.end_time()) {
            (Some(s), Some(e)) => Some(e - s),
            _ => None,
        }
    }

    pub fn first(&self) -> Option<(f64, &Breakpoint)> {
        self.points.first().map(|(t, bp)| (*t, bp))
    }

    pub fn last(&self) -> Option<(f64, &Breakpoint)> {
        self.points.last().map(|(t, bp)| (*t, bp))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &Breakpoint)> {
        self.points.iter().map(|(t, bp)| (*t, bp))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (f64, &mut Breakpoint)> {
        self.points.iter_mut().map(|(t, bp)| (*t, bp))
    }

    pub fn point(&self, index: usize) -> Option<(f64, &Breakpoint)> {
        self.points.get(index).map(|(t, bp)| (*t, bp))
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Binary search by time: Ok(index) on an exact hit, Err(insertion
    /// point) otherwise.
    fn locate(&self, t: f64) -> std::result::Result<usize, usize> {
        self.points.binary_search_by(|&(pt, _)| pt.total_cmp(&t))
    }

    /// Insert a breakpoint at time `t`, keeping times strictly increasing.
    /// Returns the insertion index.
    pub fn insert(&mut self, t: f64, bp: Breakpoint) -> Result<usize> {
        if !t.is_finite() {
            return Err(Error::invalid_partial(format!("non-finite time {t}")));
        }
        if !bp.is_valid() {
            return Err(Error::invalid_partial(format!(
                "breakpoint parameters out of range at t = {t}"
            )));
        }
        match self.locate(t) {
            Ok(_) => Err(Error::invalid_partial(format!(
                "duplicate breakpoint time {t}"
            ))),
            Err(idx) => {
                self.points.insert(idx, (t, bp));
                Ok(idx)
            }
        }
    }

    /// Append a breakpoint known to come after every existing one.
    /// Cheaper than `insert` for construction in time order.
    pub(crate) fn push_point(&mut self, t: f64, bp: Breakpoint) -> Result<()> {
        if let Some(last) = self.end_time() {
            if t <= last {
                return Err(Error::invalid_partial(format!(
                    "non-increasing breakpoint time {t} after {last}"
                )));
            }
        }
        if !t.is_finite() || !bp.is_valid() {
            return Err(Error::invalid_partial(format!(
                "breakpoint parameters out of range at t = {t}"
            )));
        }
        self.points.push((t, bp));
        Ok(())
    }

    /// Remove the breakpoint at `index`.
    pub fn remove(&mut self, index: usize) -> Result<(f64, Breakpoint)> {
        if index >= self.points.len() {
            return Err(Error::InvalidIndex(format!(
                "breakpoint index {index} out of {}",
                self.points.len()
            )));
        }
        Ok(self.points.remove(index))
    }

    /// Index of the breakpoint nearest in time to `t`.
    pub fn find_nearest(&self, t: f64) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }
        match self.locate(t) {
            Ok(i) => Some(i),
            Err(i) => {
                if i == 0 {
                    Some(0)
                } else if i == self.points.len() {
                    Some(self.points.len() - 1)
                } else {
                    let before = t - self.points[i - 1].0;
                    let after = self.points[i].0 - t;
                    Some(if after < before { i } else { i - 1 })
                }
            }
        }
    }

    /// Split off the breakpoints from `at` onward into a new partial with
    /// the same label.
    pub fn split(&mut self, at: usize) -> Result<Partial> {
        if at > self.points.len() {
            return Err(Error::InvalidIndex(format!(
                "split index {at} out of {}",
                self.points.len()
            )));
        }
        let tail = self.points.split_off(at);
        Ok(Partial {
            label: self.label,
            points: tail,
        })
    }

    /// Frequency at `t`: linear between flanking breakpoints, constant
    /// outside the span. 0 for an empty partial.
    pub fn frequency_at(&self, t: f64) -> f64 {
        self.parameters_at(t).map_or(0.0, |bp| bp.frequency)
    }

    /// Amplitude at `t`: linear inside the span, 0 strictly outside it
    /// (fade-in / fade-out). 0 for an empty partial.
    pub fn amplitude_at(&self, t: f64) -> f64 {
        self.parameters_at(t).map_or(0.0, |bp| bp.amplitude)
    }

    /// Bandwidth at `t`: linear inside the span, constant outside.
    pub fn bandwidth_at(&self, t: f64) -> f64 {
        self.parameters_at(t).map_or(0.0, |bp| bp.bandwidth)
    }

    /// Phase at `t`, derived from the stored phase of the preceding
    /// breakpoint by integrating the linearly-varying frequency. Outside
    /// the span the phase is back- or forward-integrated at the edge
    /// frequency. Never wrapped.
    pub fn phase_at(&self, t: f64) -> f64 {
        self.parameters_at(t).map_or(0.0, |bp| bp.phase)
    }

    /// All four parameters at `t`, or None for an empty partial.
    pub fn parameters_at(&self, t: f64) -> Option<Breakpoint> {
        let (first_t, first) = self.first()?;
        let (last_t, last) = self.last()?;

        if t <= first_t {
            let amplitude = if t < first_t { 0.0 } else { first.amplitude };
            return Some(Breakpoint {
                frequency: first.frequency,
                amplitude,
                bandwidth: first.bandwidth,
                phase: first.phase - TAU * first.frequency * (first_t - t),
            });
        }
        if t >= last_t {
            let amplitude = if t > last_t { 0.0 } else { last.amplitude };
            return Some(Breakpoint {
                frequency: last.frequency,
                amplitude,
                bandwidth: last.bandwidth,
                phase: last.phase + TAU * last.frequency * (t - last_t),
            });
        }

        let i = match self.locate(t) {
            Ok(i) => return Some(self.points[i].1),
            Err(i) => i - 1,
        };
        let (t0, a) = &self.points[i];
        let (t1, b) = &self.points[i + 1];
        let span = t1 - t0;
        let alpha = (t - t0) / span;
        let dt = t - t0;
        let slope = (b.frequency - a.frequency) / span;
        Some(Breakpoint {
            frequency: a.frequency + alpha * (b.frequency - a.frequency),
            amplitude: a.amplitude + alpha * (b.amplitude - a.amplitude),
            bandwidth: a.bandwidth + alpha * (b.bandwidth - a.bandwidth),
            phase: a.phase + TAU * (a.frequency * dt + 0.5 * slope * dt * dt),
        })
    }

    /// Fuse another partial's energy into this one at this partial's
    /// breakpoint times: amplitudes combine as root summed energy and the
    /// other partial's entire energy joins the noise share.
    pub fn absorb(&mut self, other: &Partial) {
        for (t, bp) in self.points.iter_mut().map(|(t, bp)| (*t, bp)) {
            let e_other = other.amplitude_at(t).powi(2);
            bp.add_noise_energy(e_other);
        }
    }

    /// Greatest breakpoint amplitude.
    pub fn peak_amplitude(&self) -> f64 {
        self.points
            .iter()
            .map(|(_, bp)| bp.amplitude)
            .fold(0.0, f64::max)
    }

    /// Total energy weighted by segment durations (trapezoidal).
    pub fn energy(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| {
                let (t0, a) = &w[0];
                let (t1, b) = &w[1];
                0.5 * (a.energy() + b.energy()) * (t1 - t0)
            })
            .sum()
    }
}
