//! Fundamental frequency estimation from partials or from samples.

use crate::analysis::db_to_linear;
use crate::analysis::peaks::{extract_peaks, PeakExtractConfig};
use crate::analysis::spectrum::ReassignedSpectrum;
use crate::core::window::{kaiser_length, kaiser_shape};
use crate::error::{Error, Result};
use crate::model::{LinearEnvelope, Partial};

/// One fundamental estimate with the fraction of supporting energy that
/// fit the harmonic model.
#[derive(Debug, Clone, Copy)]
pub struct F0Estimate {
    pub frequency: f64,
    pub confidence: f64,
}

/// Parameters shared by both estimator front ends.
#[derive(Debug, Clone)]
struct EstimatorParams {
    precision: f64,
    amp_floor_db: f64,
    amp_range_db: f64,
    freq_ceiling: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            precision: 0.1,
            amp_floor_db: -60.0,
            amp_range_db: 30.0,
            freq_ceiling: 10_000.0,
        }
    }
}

/// Rank fundamental candidates in [fmin, fmax] against measured
/// (frequency, amplitude) pairs.
///
/// A candidate is rewarded by energy-weighted closeness of each measured
/// frequency to its nearest harmonic, and penalized for predicted
/// harmonics that have no measured support (which is what separates an
/// octave-low candidate from the true fundamental).
fn rank_candidates(
    pairs: &[(f64, f64)],
    fmin: f64,
    fmax: f64,
    params: &EstimatorParams,
) -> Option<F0Estimate> {
    if pairs.is_empty() || fmin <= 0.0 || fmax <= fmin {
        return None;
    }

    let loudest = pairs.iter().map(|&(_, a)| a).fold(0.0, f64::max);
    let floor = db_to_linear(params.amp_floor_db);
    let range_floor = loudest * db_to_linear(-params.amp_range_db);
    let cutoff = floor.max(range_floor);

    let support: Vec<(f64, f64)> = pairs
        .iter()
        .filter(|&&(f, a)| a >= cutoff && f > 0.0 && f <= params.freq_ceiling)
        .map(|&(f, a)| (f, a * a))
        .collect();
    if support.is_empty() {
        return None;
    }

    let total_weight: f64 = support.iter().map(|&(_, w)| w).sum();
    let top_freq = support.iter().map(|&(f, _)| f).fold(0.0, f64::max);

    let score_of = |f0: f64| -> f64 {
        let mut score = 0.0;
        for &(f, w) in &support {
            let ratio = f / f0;
            let m = ratio.round().max(1.0);
            let d = (ratio - m).abs().min(0.5);
            let fit = (std::f64::consts::PI * d).cos();
            score += w * fit * fit;
        }
        // Penalize unsupported predicted harmonics.
        let predicted = (top_freq / f0).floor().max(1.0);
        let mut missing = 0.0;
        let mut h = 1.0;
        while h <= predicted {
            let near = support
                .iter()
                .any(|&(f, _)| (f / f0 - h).abs() < 0.25);
            if !near {
                missing += 1.0;
            }
            h += 1.0;
        }
        score - total_weight * 0.5 * missing / predicted
    };

    let step = params.precision.max(1e-3);
    let mut best_f0 = fmin;
    let mut best_score = f64::NEG_INFINITY;
    let mut f0 = fmin;
    while f0 <= fmax {
        let s = score_of(f0);
        if s > best_score {
            best_score = s;
            best_f0 = f0;
        }
        f0 += step;
    }

    if best_score <= 0.0 {
        return None;
    }
    Some(F0Estimate {
        frequency: best_f0,
        confidence: (best_score / total_weight).clamp(0.0, 1.0),
    })
}

/// Per-frame estimate used by the analyzer's built-in fundamental
/// tracking.
pub(crate) fn estimate_from_pairs(
    pairs: &[(f64, f64)],
    fmin: f64,
    fmax: f64,
    precision: f64,
) -> Option<F0Estimate> {
    let params = EstimatorParams {
        precision,
        ..EstimatorParams::default()
    };
    rank_candidates(pairs, fmin, fmax, &params)
}

/// Fundamental estimation from an existing partial set.
#[derive(Debug, Clone, Default)]
pub struct FundamentalFromPartials {
    params: EstimatorParams,
}

impl FundamentalFromPartials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn precision(&self) -> f64 {
        self.params.precision
    }

    pub fn set_precision(&mut self, hz: f64) {
        self.params.precision = hz.max(1e-3);
    }

    pub fn amp_floor(&self) -> f64 {
        self.params.amp_floor_db
    }

    pub fn set_amp_floor(&mut self, db: f64) {
        self.params.amp_floor_db = db;
    }

    pub fn amp_range(&self) -> f64 {
        self.params.amp_range_db
    }

    pub fn set_amp_range(&mut self, db: f64) {
        self.params.amp_range_db = db.abs();
    }

    pub fn freq_ceiling(&self) -> f64 {
        self.params.freq_ceiling
    }

    pub fn set_freq_ceiling(&mut self, hz: f64) {
        self.params.freq_ceiling = hz;
    }

    /// Estimate the fundamental at one instant.
    pub fn estimate_at(
        &self,
        partials: &[Partial],
        time: f64,
        fmin: f64,
        fmax: f64,
    ) -> Option<F0Estimate> {
        let pairs: Vec<(f64, f64)> = partials
            .iter()
            .filter_map(|p| {
                let bp = p.parameters_at(time)?;
                (bp.amplitude > 0.0).then_some((bp.frequency, bp.amplitude))
            })
            .collect();
        rank_candidates(&pairs, fmin, fmax, &self.params)
    }

    /// Build a fundamental envelope over [t0, t1] at `interval` spacing,
    /// keeping only estimates at or above `confidence`.
    pub fn build_envelope(
        &self,
        partials: &[Partial],
        t0: f64,
        t1: f64,
        interval: f64,
        fmin: f64,
        fmax: f64,
        confidence: f64,
    ) -> Result<LinearEnvelope> {
        check_bracket(interval, fmin, fmax)?;
        let mut env = LinearEnvelope::new();
        let mut t = t0;
        while t <= t1 + interval * 1e-9 {
            if let Some(est) = self.estimate_at(partials, t, fmin, fmax) {
                if est.confidence >= confidence {
                    env.insert(t, est.frequency);
                }
            }
            t += interval;
        }
        Ok(env)
    }
}

/// Fundamental estimation directly from samples, via short-window
/// magnitude spectra computed on demand.
#[derive(Debug, Clone)]
pub struct FundamentalFromSamples {
    window_width: f64,
    params: EstimatorParams,
}

impl FundamentalFromSamples {
    pub fn new(window_width_hz: f64) -> Result<Self> {
        if !(window_width_hz.is_finite() && window_width_hz > 0.0) {
            return Err(Error::invalid_argument(format!(
                "window width {window_width_hz} Hz"
            )));
        }
        Ok(Self {
            window_width: window_width_hz,
            params: EstimatorParams::default(),
        })
    }

    pub fn window_width(&self) -> f64 {
        self.window_width
    }

    pub fn set_amp_floor(&mut self, db: f64) {
        self.params.amp_floor_db = db;
    }

    pub fn set_amp_range(&mut self, db: f64) {
        self.params.amp_range_db = db.abs();
    }

    pub fn set_freq_ceiling(&mut self, hz: f64) {
        self.params.freq_ceiling = hz;
    }

    pub fn set_precision(&mut self, hz: f64) {
        self.params.precision = hz.max(1e-3);
    }

    pub fn build_envelope(
        &self,
        samples: &[f64],
        sample_rate: f64,
        t0: f64,
        t1: f64,
        interval: f64,
        fmin: f64,
        fmax: f64,
        confidence: f64,
    ) -> Result<LinearEnvelope> {
        check_bracket(interval, fmin, fmax)?;
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(Error::invalid_argument(format!(
                "sample rate {sample_rate}"
            )));
        }

        let beta = kaiser_shape(90.0);
        let len = kaiser_length(self.window_width / sample_rate, beta);
        let mut spec = ReassignedSpectrum::new(len, beta);
        let peak_cfg = PeakExtractConfig {
            amp_floor: db_to_linear(self.params.amp_floor_db),
            freq_floor: 0.0,
            crop_time: f64::INFINITY,
        };

        let mut env = LinearEnvelope::new();
        let mut t = t0;
        while t <= t1 + interval * 1e-9 {
            let center = (t * sample_rate).round() as isize;
            spec.transform(samples, center);
            let (peaks, _) = extract_peaks(&spec, t, sample_rate, &peak_cfg);
            let pairs: Vec<(f64, f64)> =
                peaks.iter().map(|p| (p.frequency, p.amplitude)).collect();
            if let Some(est) = rank_candidates(&pairs, fmin, fmax, &self.params) {
                if est.confidence >= confidence {
                    env.insert(t, est.frequency);
                }
            }
            t += interval;
        }
        Ok(env)
    }
}

fn check_bracket(interval: f64, fmin: f64, fmax: f64) -> Result<()> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(Error::invalid_argument(format!(
            "estimation interval {interval}"
        )));
    }
    if !(fmin > 0.0 && fmax > fmin) {
        return Err(Error::invalid_argument(format!(
            "fundamental bracket ({fmin}, {fmax})"
        )));
    }
    Ok(())
}
