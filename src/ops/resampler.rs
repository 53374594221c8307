//! Resampling: rewrite partials onto a uniform breakpoint grid.

use std::f64::consts::TAU;

use crate::error::{Error, Result};
use crate::model::{Breakpoint, Envelope, LinearEnvelope, Partial, PartialList};

/// Resamples partial envelopes at a fixed interval. With phase correction
/// (the default) phases are re-integrated from the frequency trajectory
/// so the resampled partial stays phase-consistent; otherwise the
/// interpolated phases are kept.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    interval: f64,
    phase_correct: bool,
}

impl Resampler {
    pub fn new(interval: f64) -> Result<Self> {
        if !(interval.is_finite() && interval > 0.0) {
            return Err(Error::invalid_argument(format!(
                "resampling interval {interval} s"
            )));
        }
        Ok(Self {
            interval,
            phase_correct: true,
        })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn set_phase_correct(&mut self, enabled: bool) {
        self.phase_correct = enabled;
    }

    /// Resample one partial onto grid slots from round(start/interval) to
    /// round(end/interval).
    pub fn resample_partial(&self, partial: &mut Partial) {
        let (Some(start), Some(end)) = (partial.start_time(), partial.end_time()) else {
            return;
        };
        let n0 = (start / self.interval).round() as i64;
        let n1 = (end / self.interval).round() as i64;

        let mut resampled = Partial::with_label(partial.label());
        for n in n0..=n1 {
            let t = n as f64 * self.interval;
            if let Some(bp) = partial.parameters_at(t) {
                let _ = resampled.push_point(t, bp);
            }
        }
        if self.phase_correct {
            integrate_phases(&mut resampled);
        }
        *partial = resampled;
    }

    pub fn resample(&self, partials: &mut PartialList) {
        for p in partials.iter_mut() {
            self.resample_partial(p);
        }
    }

    /// Resample against a timing envelope mapping output time to source
    /// time: the output grid covers the envelope's domain wherever the
    /// envelope's image falls inside the partial's span, and each output
    /// breakpoint takes the partial's parameters at env(t).
    pub fn resample_partial_with_timing(
        &self,
        partial: &mut Partial,
        timing: &LinearEnvelope,
    ) -> Result<()> {
        let mut last = f64::NEG_INFINITY;
        for (_, v) in timing.iter() {
            if v < last {
                return Err(Error::invalid_argument(
                    "timing envelope must be non-decreasing",
                ));
            }
            last = v;
        }
        let (Some(env_start), Some(env_end)) = (timing.first(), timing.last()) else {
            return Err(Error::invalid_argument("empty timing envelope"));
        };
        let (Some(start), Some(end)) = (partial.start_time(), partial.end_time()) else {
            return Ok(());
        };

        let n0 = (env_start.0 / self.interval).round() as i64;
        let n1 = (env_end.0 / self.interval).round() as i64;

        // The valid grid points are those whose envelope image lies in
        // the partial's span; the output covers the contiguous range from
        // the first to the last of them.
        let tol = 1e-9 * self.interval.max(1.0);
        let in_span = |n: i64| -> bool {
            let v = timing.value_at(n as f64 * self.interval);
            v >= start - tol && v <= end + tol
        };
        let first = (n0..=n1).find(|&n| in_span(n));
        let last_valid = (n0..=n1).rev().find(|&n| in_span(n));

        let mut resampled = Partial::with_label(partial.label());
        if let (Some(first), Some(last_valid)) = (first, last_valid) {
            for n in first..=last_valid {
                let t = n as f64 * self.interval;
                if let Some(bp) = partial.parameters_at(timing.value_at(t)) {
                    let _ = resampled.push_point(t, bp);
                }
            }
            if self.phase_correct {
                integrate_phases(&mut resampled);
            }
        }
        *partial = resampled;
        Ok(())
    }

    pub fn resample_with_timing(
        &self,
        partials: &mut PartialList,
        timing: &LinearEnvelope,
    ) -> Result<()> {
        for p in partials.iter_mut() {
            self.resample_partial_with_timing(p, timing)?;
        }
        Ok(())
    }

    /// Quantize breakpoint times to the grid without resampling the
    /// envelopes: each grid slot keeps the nearest original breakpoint,
    /// moved to the slot time.
    pub fn quantize_partial(&self, partial: &mut Partial) {
        let mut kept: Vec<(i64, f64, Breakpoint)> = Vec::with_capacity(partial.len());
        for (t, bp) in partial.iter() {
            let slot = (t / self.interval).round() as i64;
            let slot_time = slot as f64 * self.interval;
            let dist = (t - slot_time).abs();
            match kept.last_mut() {
                Some((last_slot, last_dist, last_bp)) if *last_slot == slot => {
                    if dist < *last_dist {
                        *last_dist = dist;
                        *last_bp = *bp;
                    }
                }
                _ => kept.push((slot, dist, *bp)),
            }
        }

        let mut quantized = Partial::with_label(partial.label());
        for (slot, _, bp) in kept {
            let _ = quantized.push_point(slot as f64 * self.interval, bp);
        }
        *partial = quantized;
    }

    pub fn quantize(&self, partials: &mut PartialList) {
        for p in partials.iter_mut() {
            self.quantize_partial(p);
        }
    }
}

/// Rewrite stored phases so each breakpoint's phase is the previous one
/// plus the integral of the linearly varying frequency.
fn integrate_phases(partial: &mut Partial) {
    let data: Vec<(f64, f64, f64)> = partial
        .iter()
        .map(|(t, bp)| (t, bp.frequency, bp.phase))
        .collect();
    if data.len() < 2 {
        return;
    }
    let mut phases = vec![data[0].2; data.len()];
    for k in 1..data.len() {
        let (t0, f0, _) = data[k - 1];
        let (t1, f1, _) = data[k];
        phases[k] = phases[k - 1] + TAU * 0.5 * (f0 + f1) * (t1 - t0);
    }
    for (k, (_, bp)) in partial.iter_mut().enumerate() {
        bp.phase = phases[k];
    }
}
