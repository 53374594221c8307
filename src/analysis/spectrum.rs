//! Reassigned short-time spectrum.
//!
//! One frame holds three DFTs of the same windowed segment: against the
//! analysis window w, the time-ramped window t·w, and the window time
//! derivative dw/dt. The three transforms give every bin a time-corrected
//! and frequency-corrected location (Auger–Flandrin reassignment) and the
//! mixed phase derivative used by convergence bandwidth.
//!
//! Segments are rotated so the window center sits at index 0; bin phase is
//! then the phase at the window center directly, with no linear ramp to
//! subtract.

use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::core::window::{kaiser_window, kaiser_window_derivative, time_ramp};

pub struct ReassignedSpectrum {
    window: Vec<f64>,
    ramp_window: Vec<f64>,
    deriv_window: Vec<f64>,
    window_sum: f64,
    enbw_bins: f64,
    fft_len: usize,
    fft: Arc<dyn Fft<f64>>,
    buf_w: Vec<Complex64>,
    buf_tw: Vec<Complex64>,
    buf_dw: Vec<Complex64>,
}

impl ReassignedSpectrum {
    /// Build the spectrum machinery for a Kaiser window of odd length
    /// `window_len` and shape `beta`. The transform length is the next
    /// power of two at least twice the window length, for peak
    /// interpolation headroom.
    pub fn new(window_len: usize, beta: f64) -> Self {
        let window = kaiser_window(window_len, beta);
        let deriv_window = kaiser_window_derivative(window_len, beta);
        let ramp = time_ramp(window_len);
        let ramp_window: Vec<f64> = ramp.iter().zip(&window).map(|(r, w)| r * w).collect();

        let window_sum: f64 = window.iter().sum();
        let window_sq_sum: f64 = window.iter().map(|w| w * w).sum();
        let fft_len = (2 * window_len).next_power_of_two();
        let enbw_bins = fft_len as f64 * window_sq_sum / (window_sum * window_sum);

        let fft = FftPlanner::new().plan_fft_forward(fft_len);

        Self {
            window,
            ramp_window,
            deriv_window,
            window_sum,
            enbw_bins,
            fft_len,
            fft,
            buf_w: vec![Complex64::default(); fft_len],
            buf_tw: vec![Complex64::default(); fft_len],
            buf_dw: vec![Complex64::default(); fft_len],
        }
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    /// Number of usable positive-frequency bins (0..=fft_len/2).
    pub fn num_bins(&self) -> usize {
        self.fft_len / 2 + 1
    }

    /// Equivalent noise bandwidth of the window, in transform bins.
    pub fn enbw_bins(&self) -> f64 {
        self.enbw_bins
    }

    /// Compute the three transforms for the segment of `samples` centered
    /// at sample index `center`. Out-of-range samples read as zero.
    pub fn transform(&mut self, samples: &[f64], center: isize) {
        let n = self.window.len();
        let half = (n / 2) as isize;
        for buf in [&mut self.buf_w, &mut self.buf_tw, &mut self.buf_dw] {
            buf.iter_mut().for_each(|c| *c = Complex64::default());
        }

        for j in 0..n as isize {
            let src = center - half + j;
            if src < 0 || src >= samples.len() as isize {
                continue;
            }
            let s = samples[src as usize];
            // Rotate so the window center lands at index 0.
            let dst = (j - half).rem_euclid(self.fft_len as isize) as usize;
            let j = j as usize;
            self.buf_w[dst].re = s * self.window[j];
            self.buf_tw[dst].re = s * self.ramp_window[j];
            self.buf_dw[dst].re = s * self.deriv_window[j];
        }

        self.fft.process(&mut self.buf_w);
        self.fft.process(&mut self.buf_tw);
        self.fft.process(&mut self.buf_dw);
    }

    #[inline]
    fn norm_sq(&self, k: usize) -> f64 {
        self.buf_w[k].norm_sqr()
    }

    /// Raw transform magnitude at bin `k`.
    pub fn magnitude(&self, k: usize) -> f64 {
        self.buf_w[k].norm()
    }

    /// Magnitude expressed as the amplitude of the sinusoid that would
    /// produce it (2|X| / Σw).
    pub fn bin_amplitude(&self, k: usize) -> f64 {
        2.0 * self.magnitude(k) / self.window_sum
    }

    /// Time correction at bin `k`, in samples relative to the window
    /// center (positive = later). Non-finite at spectral nulls.
    pub fn time_correction(&self, k: usize) -> f64 {
        let x = self.buf_w[k];
        let xt = self.buf_tw[k];
        (xt * x.conj()).re / self.norm_sq(k)
    }

    /// Reassigned frequency at bin `k`, in radians per sample.
    pub fn reassigned_frequency(&self, k: usize) -> f64 {
        let x = self.buf_w[k];
        let xd = self.buf_dw[k];
        let omega_k = std::f64::consts::TAU * k as f64 / self.fft_len as f64;
        omega_k - (xd * x.conj()).im / self.norm_sq(k)
    }

    /// Phase at the window center for bin `k`.
    pub fn phase(&self, k: usize) -> f64 {
        self.buf_w[k].arg()
    }

    /// Mixed partial derivative of spectral phase with respect to time and
    /// frequency, dimensionless. Zero for a stationary sinusoid; deviation
    /// from zero measures how far the bin's energy is from converging to a
    /// single sinusoid.
    pub fn mixed_phase_derivative(&self, k: usize) -> f64 {
        let x = self.buf_w[k];
        let xt = self.buf_tw[k];
        let xd = self.buf_dw[k];
        let nsq = self.norm_sq(k);
        (xd * xt.conj()).im / nsq - (xd * x.conj()).im * (xt * x.conj()).re / (nsq * nsq)
    }
}
