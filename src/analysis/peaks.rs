//! Extract reassigned spectral peaks from one transformed frame.

use std::f64::consts::TAU;

use crate::analysis::spectrum::ReassignedSpectrum;

/// Reduce an angle to its principal value by subtracting whole turns.
/// Stored peak phases stay within [-pi, pi]; partials re-unwrap them by
/// integrating frequency.
fn principal_angle(x: f64) -> f64 {
    x - TAU * (x / TAU).round()
}

/// One time-frequency peak: a breakpoint candidate.
#[derive(Debug, Clone, Copy)]
pub struct SpectralPeak {
    /// Reassigned time, absolute seconds.
    pub time: f64,
    /// Reassigned frequency, Hz.
    pub frequency: f64,
    /// Sinusoidal amplitude estimate.
    pub amplitude: f64,
    /// Noise fraction, filled in by bandwidth association.
    pub bandwidth: f64,
    /// Phase at the reassigned time, reduced to the principal interval.
    pub phase: f64,
    /// Mixed phase derivative at the peak bin (convergence indicator).
    pub mixed_derivative: f64,
}

#[derive(Debug, Clone)]
pub struct PeakExtractConfig {
    /// Reject peaks whose amplitude falls below this linear level.
    pub amp_floor: f64,
    /// Reject peaks below this frequency in Hz.
    pub freq_floor: f64,
    /// Reject peaks reassigned further than this from the frame center,
    /// in seconds.
    pub crop_time: f64,
}

/// Scan the positive-frequency bins of a transformed frame for local
/// magnitude maxima and turn them into reassigned peaks.
///
/// Returns the accepted peaks in bin order plus the count of peaks dropped
/// because reassignment produced non-finite values (recovered locally per
/// the arithmetic-error policy).
pub fn extract_peaks(
    spec: &ReassignedSpectrum,
    frame_center: f64,
    sample_rate: f64,
    cfg: &PeakExtractConfig,
) -> (Vec<SpectralPeak>, usize) {
    let mut peaks = Vec::new();
    let mut dropped = 0usize;

    let bins = spec.num_bins();
    for k in 1..bins.saturating_sub(1) {
        let mag = spec.magnitude(k);
        if !(mag > spec.magnitude(k - 1) && mag >= spec.magnitude(k + 1)) {
            continue;
        }
        if spec.bin_amplitude(k) < cfg.amp_floor {
            continue;
        }

        // Parabolic refinement of the peak level on log magnitude.
        let y0 = spec.magnitude(k - 1).max(f64::MIN_POSITIVE).ln();
        let y1 = mag.max(f64::MIN_POSITIVE).ln();
        let y2 = spec.magnitude(k + 1).max(f64::MIN_POSITIVE).ln();
        let denom = y0 - 2.0 * y1 + y2;
        let amplitude = if denom.abs() > 1e-12 {
            let delta = 0.5 * (y0 - y2) / denom;
            spec.bin_amplitude(k) * (-0.25 * (y0 - y2) * delta).exp()
        } else {
            spec.bin_amplitude(k)
        };

        let dt_samples = spec.time_correction(k);
        let omega = spec.reassigned_frequency(k);
        let mixed = spec.mixed_phase_derivative(k);
        let phase_center = spec.phase(k);

        if !(dt_samples.is_finite()
            && omega.is_finite()
            && mixed.is_finite()
            && amplitude.is_finite())
        {
            dropped += 1;
            continue;
        }

        let time = frame_center + dt_samples / sample_rate;
        let frequency = omega * sample_rate / TAU;
        let phase = principal_angle(phase_center + dt_samples * omega);

        if frequency < cfg.freq_floor {
            continue;
        }
        if (time - frame_center).abs() > cfg.crop_time {
            continue;
        }
        if amplitude < cfg.amp_floor {
            continue;
        }

        peaks.push(SpectralPeak {
            time,
            frequency,
            amplitude,
            bandwidth: 0.0,
            phase,
            mixed_derivative: mixed,
        });
    }

    (peaks, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::window::{kaiser_length, kaiser_shape};
    use approx::assert_abs_diff_eq;

    #[test]
    fn principal_angle_stays_within_half_a_turn() {
        use std::f64::consts::PI;
        for x in [-9.5 * TAU, -PI, -0.1, 0.0, 0.1, PI, 2.7 * TAU, 100.0] {
            let a = principal_angle(x);
            assert!(a.abs() <= PI + 1e-12, "principal angle {a} for {x}");
            let turns = (x - a) / TAU;
            assert_abs_diff_eq!(turns, turns.round(), epsilon = 1e-9);
        }
    }

    #[test]
    fn finds_two_tones_with_refined_amplitudes() {
        let rate = 44_100.0;
        let samples: Vec<f64> = (0..16384)
            .map(|n| {
                let t = n as f64 / rate;
                0.5 * (TAU * 440.0 * t).cos() + 0.25 * (TAU * 1234.5 * t).cos()
            })
            .collect();

        let beta = kaiser_shape(90.0);
        let len = kaiser_length(400.0 / rate, beta);
        let mut spec = ReassignedSpectrum::new(len, beta);
        let center = 8192;
        spec.transform(&samples, center);

        let cfg = PeakExtractConfig {
            amp_floor: 0.01,
            freq_floor: 0.0,
            crop_time: f64::INFINITY,
        };
        let (peaks, dropped) = extract_peaks(&spec, center as f64 / rate, rate, &cfg);
        assert_eq!(dropped, 0);
        assert_eq!(peaks.len(), 2);

        assert_abs_diff_eq!(peaks[0].frequency, 440.0, epsilon = 0.05);
        assert_abs_diff_eq!(peaks[1].frequency, 1234.5, epsilon = 0.05);
        assert!((peaks[0].amplitude - 0.5).abs() / 0.5 < 0.02);
        assert!((peaks[1].amplitude - 0.25).abs() / 0.25 < 0.02);
        for p in &peaks {
            assert_abs_diff_eq!(p.time, center as f64 / rate, epsilon = 1e-3);
        }
    }

    #[test]
    fn floors_reject_weak_and_low_peaks() {
        let rate = 44_100.0;
        let samples: Vec<f64> = (0..16384)
            .map(|n| {
                let t = n as f64 / rate;
                0.5 * (TAU * 80.0 * t).cos() + 0.001 * (TAU * 2000.0 * t).cos()
            })
            .collect();

        let beta = kaiser_shape(90.0);
        let len = kaiser_length(120.0 / rate, beta);
        let mut spec = ReassignedSpectrum::new(len, beta);
        spec.transform(&samples, 8192);

        let cfg = PeakExtractConfig {
            amp_floor: 0.01,
            freq_floor: 100.0,
            crop_time: f64::INFINITY,
        };
        let (peaks, _) = extract_peaks(&spec, 8192.0 / rate, rate, &cfg);
        // 80 Hz is below the frequency floor, 2 kHz below the amp floor.
        assert!(peaks.is_empty());
    }
}
