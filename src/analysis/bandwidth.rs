//! Bandwidth association: decide how much of each peak's energy is noise.

use serde::{Deserialize, Serialize};

use crate::analysis::peaks::SpectralPeak;
use crate::analysis::spectrum::ReassignedSpectrum;

/// Bandwidth extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandwidthMode {
    /// Spread the spectral energy not captured by peaks over the peaks of
    /// each fixed-width frequency region.
    Residue { region_width: f64 },
    /// Derive bandwidth from the mixed phase derivative at each peak.
    Convergence { tolerance: f64 },
    /// Leave bandwidth at zero.
    None,
}

impl Default for BandwidthMode {
    fn default() -> Self {
        // The original analyzer's default association region.
        BandwidthMode::Residue {
            region_width: 2000.0,
        }
    }
}

/// Residue association over one frame.
///
/// Within each `region_width`-Hz region, the spectral energy left over
/// after subtracting the peaks' sinusoidal energy is distributed across
/// those peaks in proportion to their energy. Each receiving peak's
/// amplitude grows to carry its noise share and its bandwidth becomes
/// share / (share + energy).
pub fn associate_residue(
    peaks: &mut [SpectralPeak],
    spec: &ReassignedSpectrum,
    sample_rate: f64,
    region_width: f64,
) {
    if region_width <= 0.0 || peaks.is_empty() {
        return;
    }
    let bin_hz = sample_rate / spec.fft_len() as f64;
    let nyquist = sample_rate / 2.0;
    let regions = (nyquist / region_width).ceil() as usize;
    if regions == 0 {
        return;
    }

    let region_of = |freq: f64| -> usize {
        ((freq / region_width) as usize).min(regions - 1)
    };

    // Spectral energy per region, in sinusoid-amplitude-squared units.
    // Dividing by the window's equivalent noise bandwidth converts summed
    // bin energies into the energy of the underlying signal.
    let mut spectral = vec![0.0f64; regions];
    for k in 1..spec.num_bins() - 1 {
        let a = spec.bin_amplitude(k);
        spectral[region_of(k as f64 * bin_hz)] += a * a / spec.enbw_bins();
    }

    let mut sinusoidal = vec![0.0f64; regions];
    for p in peaks.iter() {
        sinusoidal[region_of(p.frequency)] += p.amplitude * p.amplitude;
    }

    for p in peaks.iter_mut() {
        let r = region_of(p.frequency);
        if sinusoidal[r] <= 0.0 {
            continue;
        }
        let noise = (spectral[r] - sinusoidal[r]).max(0.0);
        let energy = p.amplitude * p.amplitude;
        let share = noise * energy / sinusoidal[r];
        let total = energy + share;
        if total > 0.0 {
            p.amplitude = total.sqrt();
            p.bandwidth = (share / total).clamp(0.0, 1.0);
        }
    }
}

/// Convergence association: a converged bin (mixed derivative 0) is a pure
/// sinusoid; the noise fraction grows linearly until the mixed derivative
/// reaches the tolerance.
pub fn associate_convergence(peaks: &mut [SpectralPeak], tolerance: f64) {
    if tolerance <= 0.0 {
        return;
    }
    for p in peaks.iter_mut() {
        p.bandwidth = (p.mixed_derivative.abs() / tolerance).clamp(0.0, 1.0);
    }
}
