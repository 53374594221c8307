//! Deterministic band-limited noise for bandwidth-enhanced synthesis.
//!
//! The modulator value at output sample `n` is a pure function of `n` and
//! the seed: white noise is drawn from a PCG stream keyed by the sample
//! index, then band-limited by a short FIR so no filter state survives
//! between calls. Two synthesis runs over the same samples — or the same
//! samples rendered partial-by-partial in parallel — therefore modulate
//! identically.

use rand::RngCore;
use rand_pcg::Pcg32;

/// Number of white-noise taps combined per output value.
const TAPS: usize = 8;

/// Stream selector for the index-keyed PCG draws.
const STREAM: u64 = 0xda3e_39cb_94b9_5bdb;

#[derive(Debug, Clone)]
pub struct NoiseModulator {
    seed: u64,
    weights: [f64; TAPS],
}

impl NoiseModulator {
    pub fn new(seed: u64) -> Self {
        // Raised-cosine lowpass taps, scaled so the output of the
        // uniform [-1,1) tap noise has unit variance: var = sum(w^2)/3.
        let mut weights = [0.0; TAPS];
        let mut sum_sq = 0.0;
        for (k, w) in weights.iter_mut().enumerate() {
            let x = std::f64::consts::PI * (k as f64 + 1.0) / (TAPS as f64 + 1.0);
            *w = 0.5 * (1.0 - (2.0 * x).cos());
            sum_sq += *w * *w;
        }
        let scale = (3.0 / sum_sq).sqrt();
        for w in weights.iter_mut() {
            *w *= scale;
        }
        Self { seed, weights }
    }

    /// White uniform [-1, 1) value keyed by absolute sample index.
    fn white(&self, index: u64) -> f64 {
        let mut rng = Pcg32::new(index.wrapping_add(self.seed), STREAM);
        (rng.next_u32() as f64 / 2147483648.0) - 1.0
    }

    /// Unit-variance band-limited noise at absolute sample index `n`.
    pub fn value(&self, n: u64) -> f64 {
        let mut acc = 0.0;
        for (k, &w) in self.weights.iter().enumerate() {
            if let Some(idx) = n.checked_sub(k as u64) {
                acc += w * self.white(idx);
            }
        }
        acc
    }
}

impl Default for NoiseModulator {
    fn default() -> Self {
        Self::new(0x6c07_8965_5f12_c7a1)
    }
}
