//! Bandwidth-enhanced oscillator with phase-accurate segment rendering.

use std::f64::consts::TAU;

use crate::core::noise::NoiseModulator;

/// Oscillator state between breakpoints: unwrapped phase in radians,
/// frequency in radians per sample, linear amplitude, and noise fraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oscillator {
    phase: f64,
    frequency: f64,
    amplitude: f64,
    bandwidth: f64,
}

impl Oscillator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the state at the start of a partial.
    pub fn reset(&mut self, frequency: f64, amplitude: f64, bandwidth: f64, phase: f64) {
        self.frequency = frequency;
        self.amplitude = amplitude;
        self.bandwidth = bandwidth;
        self.phase = phase;
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Render one segment into `out`, accumulating samples.
    ///
    /// The segment spans `length` samples starting at fractional sample
    /// position `start_pos`; rendered sample indices run from
    /// `first_index` (absolute) while `first_index < start_pos + length`.
    /// Target parameters apply at the segment end. The phase trajectory
    /// is the cubic polynomial that meets the stored target phase (up to
    /// the nearest whole number of cycles) and both endpoint frequencies;
    /// with breakpoint phases consistent with the frequency envelope it
    /// degenerates to the exact linear-frequency phase integral.
    #[allow(clippy::too_many_arguments)]
    pub fn render_segment(
        &mut self,
        out: &mut [f64],
        noise: &NoiseModulator,
        start_pos: f64,
        length: f64,
        first_index: i64,
        target_frequency: f64,
        target_amplitude: f64,
        target_bandwidth: f64,
        target_phase: f64,
    ) {
        if length <= 0.0 {
            return;
        }
        let w0 = self.frequency;
        let w1 = target_frequency;
        let t = length;

        // Choose the whole-cycle offset that keeps the average frequency
        // nearest the linear mean of the endpoint frequencies.
        let linear_estimate = self.phase + 0.5 * (w0 + w1) * t;
        let cycles = ((linear_estimate - target_phase) / TAU).round();
        let adjusted_target = target_phase + TAU * cycles;

        let delta = adjusted_target - self.phase - w0 * t;
        let dw = w1 - w0;
        let a2 = 3.0 * delta / (t * t) - dw / t;
        let a3 = (dw * t - 2.0 * delta) / (t * t * t);

        let end_index = (start_pos + length).ceil() as i64;
        for n in first_index.max(0)..end_index {
            let idx = n as usize;
            if idx >= out.len() {
                break;
            }
            let u = n as f64 - start_pos;
            if u < 0.0 || u >= length {
                continue;
            }
            let frac = u / length;
            let amp = self.amplitude + (target_amplitude - self.amplitude) * frac;
            let bw = (self.bandwidth + (target_bandwidth - self.bandwidth) * frac).clamp(0.0, 1.0);
            let theta = self.phase + u * (w0 + u * (a2 + u * a3));
            let carrier = (1.0 - bw).sqrt() + (2.0 * bw).sqrt() * noise.value(n as u64);
            out[idx] += amp * carrier * theta.cos();
        }

        self.phase = adjusted_target;
        self.frequency = w1;
        self.amplitude = target_amplitude;
        self.bandwidth = target_bandwidth;
    }
}
