//! Reassigned short-time analysis driver: samples in, partials out.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::bandwidth::{associate_convergence, associate_residue, BandwidthMode};
use crate::analysis::db_to_linear;
use crate::analysis::fundamental::estimate_from_pairs;
use crate::analysis::peaks::{extract_peaks, PeakExtractConfig};
use crate::analysis::spectrum::ReassignedSpectrum;
use crate::analysis::tracker::PartialTracker;
use crate::core::filter::Filter;
use crate::core::window::{kaiser_length, kaiser_shape};
use crate::error::{Error, Result};
use crate::model::{LinearEnvelope, PartialList};

/// Fundamental-tracking bracket, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundamentalBracket {
    pub fmin: f64,
    pub fmax: f64,
}

/// Analyzer configuration. Options left unset derive their defaults from
/// the frequency resolution at analysis time:
/// window width = 2x resolution, frequency drift = resolution / 2,
/// hop time = 1 / window width, crop time = hop time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Minimum separation between distinguishable component frequencies,
    /// in Hz. Required.
    pub freq_resolution: f64,
    /// Analysis window main-lobe width in Hz.
    #[serde(default)]
    pub window_width: Option<f64>,
    /// Window sidelobe attenuation in positive dB.
    #[serde(default = "AnalyzerConfig::default_sidelobe_level")]
    pub sidelobe_level: f64,
    /// Peak rejection threshold in dB relative to full scale.
    #[serde(default = "AnalyzerConfig::default_amp_floor")]
    pub amp_floor: f64,
    /// Peak rejection threshold in Hz.
    #[serde(default)]
    pub freq_floor: f64,
    /// Greatest frequency step between consecutive breakpoints of one
    /// partial, in Hz.
    #[serde(default)]
    pub freq_drift: Option<f64>,
    /// Inter-frame hop in seconds.
    #[serde(default)]
    pub hop_time: Option<f64>,
    /// Greatest distance between a peak's reassigned time and its frame
    /// center, in seconds.
    #[serde(default)]
    pub crop_time: Option<f64>,
    /// Bandwidth extraction strategy.
    #[serde(default)]
    pub bw_mode: BandwidthMode,
    /// Track a fundamental estimate during analysis.
    #[serde(default)]
    pub fundamental: Option<FundamentalBracket>,
    /// Track the frame-energy amplitude envelope during analysis.
    #[serde(default)]
    pub build_amp_env: bool,
}

impl AnalyzerConfig {
    fn default_sidelobe_level() -> f64 {
        90.0
    }

    fn default_amp_floor() -> f64 {
        -90.0
    }

    pub fn new(freq_resolution: f64) -> Self {
        Self {
            freq_resolution,
            window_width: None,
            sidelobe_level: Self::default_sidelobe_level(),
            amp_floor: Self::default_amp_floor(),
            freq_floor: 0.0,
            freq_drift: None,
            hop_time: None,
            crop_time: None,
            bw_mode: BandwidthMode::default(),
            fundamental: None,
            build_amp_env: false,
        }
    }

    pub fn window_width(&self) -> f64 {
        self.window_width.unwrap_or(2.0 * self.freq_resolution)
    }

    pub fn freq_drift(&self) -> f64 {
        self.freq_drift.unwrap_or(0.5 * self.freq_resolution)
    }

    pub fn hop_time(&self) -> f64 {
        self.hop_time.unwrap_or(1.0 / self.window_width())
    }

    pub fn crop_time(&self) -> f64 {
        self.crop_time.unwrap_or_else(|| self.hop_time())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.freq_resolution.is_finite() && self.freq_resolution > 0.0) {
            return Err(Error::invalid_argument(format!(
                "frequency resolution {} Hz",
                self.freq_resolution
            )));
        }
        if !(self.window_width().is_finite() && self.window_width() > 0.0) {
            return Err(Error::invalid_argument(format!(
                "window width {} Hz",
                self.window_width()
            )));
        }
        if !(self.sidelobe_level.is_finite() && self.sidelobe_level > 0.0) {
            return Err(Error::invalid_argument(format!(
                "sidelobe level {} dB",
                self.sidelobe_level
            )));
        }
        if self.freq_floor < 0.0 {
            return Err(Error::invalid_argument(format!(
                "frequency floor {} Hz",
                self.freq_floor
            )));
        }
        if !(self.freq_drift().is_finite() && self.freq_drift() > 0.0) {
            return Err(Error::invalid_argument(format!(
                "frequency drift {} Hz",
                self.freq_drift()
            )));
        }
        if !(self.hop_time().is_finite() && self.hop_time() > 0.0) {
            return Err(Error::invalid_argument(format!(
                "hop time {} s",
                self.hop_time()
            )));
        }
        if !(self.crop_time().is_finite() && self.crop_time() >= 0.0) {
            return Err(Error::invalid_argument(format!(
                "crop time {} s",
                self.crop_time()
            )));
        }
        match self.bw_mode {
            BandwidthMode::Residue { region_width } => {
                if region_width < 0.0 || !region_width.is_finite() {
                    return Err(Error::invalid_argument(format!(
                        "bandwidth region width {region_width} Hz"
                    )));
                }
            }
            BandwidthMode::Convergence { tolerance } => {
                if !(tolerance > 0.0 && tolerance < 1.0) {
                    return Err(Error::invalid_argument(format!(
                        "bandwidth convergence tolerance {tolerance}"
                    )));
                }
            }
            BandwidthMode::None => {}
        }
        if let Some(FundamentalBracket { fmin, fmax }) = self.fundamental {
            if !(fmin > 0.0 && fmax > fmin) {
                return Err(Error::invalid_argument(format!(
                    "fundamental bracket ({fmin}, {fmax})"
                )));
            }
        }
        Ok(())
    }
}

/// Reassigned bandwidth-enhanced analyzer.
///
/// Owns its configuration and the products of the last `analyze` call;
/// every run resets the previous products.
#[derive(Debug)]
pub struct Analyzer {
    config: AnalyzerConfig,
    preemphasis: Option<Filter>,
    partials: PartialList,
    fundamental_env: LinearEnvelope,
    amp_env: LinearEnvelope,
    dropped_peaks: usize,
}

impl Analyzer {
    /// Analyzer with the given frequency resolution and derived defaults.
    pub fn new(freq_resolution: f64) -> Result<Self> {
        Self::from_config(AnalyzerConfig::new(freq_resolution))
    }

    /// Analyzer with explicit resolution and window width.
    pub fn with_window_width(freq_resolution: f64, window_width: f64) -> Result<Self> {
        let mut cfg = AnalyzerConfig::new(freq_resolution);
        cfg.window_width = Some(window_width);
        Self::from_config(cfg)
    }

    pub fn from_config(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            preemphasis: None,
            partials: PartialList::new(),
            fundamental_env: LinearEnvelope::new(),
            amp_env: LinearEnvelope::new(),
            dropped_peaks: 0,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn freq_resolution(&self) -> f64 {
        self.config.freq_resolution
    }

    pub fn window_width(&self) -> f64 {
        self.config.window_width()
    }

    pub fn hop_time(&self) -> f64 {
        self.config.hop_time()
    }

    pub fn amp_floor(&self) -> f64 {
        self.config.amp_floor
    }

    pub fn set_amp_floor(&mut self, db: f64) {
        self.config.amp_floor = db;
    }

    /// Apply a config edit only if the result still validates.
    fn try_update(&mut self, edit: impl FnOnce(&mut AnalyzerConfig)) -> Result<()> {
        let mut candidate = self.config.clone();
        edit(&mut candidate);
        candidate.validate()?;
        self.config = candidate;
        Ok(())
    }

    pub fn set_freq_floor(&mut self, hz: f64) -> Result<()> {
        self.try_update(|cfg| cfg.freq_floor = hz)
    }

    pub fn set_freq_drift(&mut self, hz: f64) -> Result<()> {
        self.try_update(|cfg| cfg.freq_drift = Some(hz))
    }

    pub fn set_hop_time(&mut self, seconds: f64) -> Result<()> {
        self.try_update(|cfg| cfg.hop_time = Some(seconds))
    }

    pub fn set_crop_time(&mut self, seconds: f64) -> Result<()> {
        self.try_update(|cfg| cfg.crop_time = Some(seconds))
    }

    pub fn set_sidelobe_level(&mut self, db: f64) -> Result<()> {
        self.try_update(|cfg| cfg.sidelobe_level = db)
    }

    /// Residue bandwidth association with the given region width; a zero
    /// width disables bandwidth extraction.
    pub fn store_residue_bandwidth(&mut self, region_width: f64) -> Result<()> {
        self.try_update(|cfg| {
            cfg.bw_mode = if region_width > 0.0 {
                BandwidthMode::Residue { region_width }
            } else {
                BandwidthMode::None
            };
        })
    }

    pub fn store_convergence_bandwidth(&mut self, tolerance: f64) -> Result<()> {
        self.try_update(|cfg| cfg.bw_mode = BandwidthMode::Convergence { tolerance })
    }

    pub fn store_no_bandwidth(&mut self) {
        self.config.bw_mode = BandwidthMode::None;
    }

    /// Estimate a fundamental envelope inside (fmin, fmax) during
    /// analysis.
    pub fn build_fundamental_env(&mut self, fmin: f64, fmax: f64) -> Result<()> {
        self.try_update(|cfg| cfg.fundamental = Some(FundamentalBracket { fmin, fmax }))
    }

    pub fn build_amp_env(&mut self, enabled: bool) {
        self.config.build_amp_env = enabled;
    }

    /// Pre-emphasis filter applied to a copy of the input before
    /// analysis.
    pub fn set_preemphasis(&mut self, filter: Option<Filter>) {
        self.preemphasis = filter;
    }

    pub fn partials(&self) -> &PartialList {
        &self.partials
    }

    pub fn take_partials(&mut self) -> PartialList {
        std::mem::take(&mut self.partials)
    }

    pub fn fundamental_env(&self) -> &LinearEnvelope {
        &self.fundamental_env
    }

    pub fn amp_env(&self) -> &LinearEnvelope {
        &self.amp_env
    }

    /// Peaks discarded during the last run because reassignment produced
    /// non-finite values or non-advancing times.
    pub fn dropped_peaks(&self) -> usize {
        self.dropped_peaks
    }

    /// Discard the products of the previous run.
    pub fn reset(&mut self) {
        self.partials.clear();
        self.fundamental_env = LinearEnvelope::new();
        self.amp_env = LinearEnvelope::new();
        self.dropped_peaks = 0;
    }

    /// Analyze a buffer of samples at `sample_rate` Hz.
    pub fn analyze(&mut self, samples: &[f64], sample_rate: f64) -> Result<()> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(Error::invalid_argument(format!(
                "sample rate {sample_rate}"
            )));
        }
        self.config.validate()?;
        self.reset();
        if samples.is_empty() {
            return Ok(());
        }

        let filtered;
        let input: &[f64] = match &self.preemphasis {
            Some(filter) => {
                let mut f = filter.clone();
                f.reset();
                filtered = samples.iter().map(|&x| f.apply(x)).collect::<Vec<f64>>();
                &filtered
            }
            None => samples,
        };

        let beta = kaiser_shape(self.config.sidelobe_level);
        let window_len = kaiser_length(self.config.window_width() / sample_rate, beta);
        let mut spectrum = ReassignedSpectrum::new(window_len, beta);
        debug!(
            window_len,
            fft_len = spectrum.fft_len(),
            hop_time = self.config.hop_time(),
            "analysis frames configured"
        );

        let peak_cfg = PeakExtractConfig {
            amp_floor: db_to_linear(self.config.amp_floor),
            freq_floor: self.config.freq_floor,
            crop_time: self.config.crop_time(),
        };
        let mut tracker = PartialTracker::new(self.config.freq_drift(), self.config.crop_time());

        let hop = self.config.hop_time();
        let half_window = (window_len / 2) as f64;
        let end_sample = input.len() as f64 + half_window;
        let mut dropped = 0usize;

        let mut frame = 0u64;
        loop {
            let frame_time = frame as f64 * hop;
            let center = (frame_time * sample_rate).round();
            if center >= end_sample {
                break;
            }

            spectrum.transform(input, center as isize);
            let (mut peaks, frame_dropped) =
                extract_peaks(&spectrum, frame_time, sample_rate, &peak_cfg);
            dropped += frame_dropped;

            match self.config.bw_mode {
                BandwidthMode::Residue { region_width } => {
                    associate_residue(&mut peaks, &spectrum, sample_rate, region_width);
                }
                BandwidthMode::Convergence { tolerance } => {
                    associate_convergence(&mut peaks, tolerance);
                }
                BandwidthMode::None => {}
            }

            if let Some(FundamentalBracket { fmin, fmax }) = self.config.fundamental {
                let pairs: Vec<(f64, f64)> =
                    peaks.iter().map(|p| (p.frequency, p.amplitude)).collect();
                if let Some(est) = estimate_from_pairs(&pairs, fmin, fmax, 0.1) {
                    if est.confidence >= 0.5 {
                        self.fundamental_env.insert(frame_time, est.frequency);
                    }
                }
            }

            if self.config.build_amp_env {
                let energy: f64 = peaks.iter().map(|p| p.amplitude * p.amplitude).sum();
                self.amp_env.insert(frame_time, energy.sqrt());
            }

            tracker.track_frame(&peaks, frame_time);
            frame += 1;
        }

        dropped += tracker.dropped_peaks();
        self.dropped_peaks = dropped;
        if dropped > 0 {
            warn!(dropped, "peaks dropped during analysis");
        }
        self.partials = tracker.finish();
        info!(
            partials = self.partials.len(),
            frames = frame,
            "analysis complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    #[test]
    fn config_defaults_derive_from_resolution() {
        let cfg = AnalyzerConfig::new(300.0);
        assert_eq!(cfg.window_width(), 600.0);
        assert_eq!(cfg.freq_drift(), 150.0);
        assert!((cfg.hop_time() - 1.0 / 600.0).abs() < 1e-15);
        assert_eq!(cfg.crop_time(), cfg.hop_time());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(Analyzer::new(-100.0).is_err());
        let mut a = Analyzer::new(100.0).unwrap();
        assert!(a.set_hop_time(0.0).is_err());
        assert!(a.store_convergence_bandwidth(1.5).is_err());
        assert!(a.build_fundamental_env(500.0, 200.0).is_err());
    }

    #[test]
    fn analyzes_a_steady_tone_into_one_partial() {
        let rate = 44_100.0;
        let samples: Vec<f64> = (0..22_050)
            .map(|n| 0.3 * (TAU * 440.0 * n as f64 / rate).cos())
            .collect();
        let mut a = Analyzer::with_window_width(300.0, 400.0).unwrap();
        a.set_amp_floor(-50.0);
        a.store_no_bandwidth();
        a.analyze(&samples, rate).unwrap();

        let strong: Vec<_> = a
            .partials()
            .iter()
            .filter(|p| p.peak_amplitude() > 0.1)
            .collect();
        assert_eq!(strong.len(), 1);
        let p = strong[0];
        assert!(p.duration().unwrap() > 0.4);
        let mid = 0.25;
        assert!((p.frequency_at(mid) - 440.0).abs() < 0.1);
        assert!((p.amplitude_at(mid) - 0.3).abs() / 0.3 < 0.02);
    }

    #[test]
    fn empty_input_produces_no_partials() {
        let mut a = Analyzer::new(100.0).unwrap();
        a.analyze(&[], 44_100.0).unwrap();
        assert!(a.partials().is_empty());
    }

    #[test]
    fn fundamental_env_tracks_a_harmonic_tone() {
        let rate = 44_100.0;
        let f0 = 220.0;
        let samples: Vec<f64> = (0..44_100)
            .map(|n| {
                let t = n as f64 / rate;
                0.25 * (TAU * f0 * t).cos()
                    + 0.15 * (TAU * 2.0 * f0 * t).cos()
                    + 0.1 * (TAU * 3.0 * f0 * t).cos()
            })
            .collect();
        let mut a = Analyzer::new(100.0).unwrap();
        a.set_amp_floor(-50.0);
        a.store_no_bandwidth();
        a.build_fundamental_env(150.0, 300.0).unwrap();
        a.analyze(&samples, rate).unwrap();

        let env = a.fundamental_env();
        assert!(env.len() > 10);
        use crate::model::Envelope;
        assert!((env.value_at(0.5) - f0).abs() < 1.0);
    }
}
