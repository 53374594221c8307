//! Additive rendering of partial lists into sample buffers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::noise::NoiseModulator;
use crate::error::{Error, Result};
use crate::model::{Breakpoint, Partial};
use crate::synth::oscillator::Oscillator;
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    /// Fade applied before a partial's first breakpoint and after its
    /// last, in seconds.
    #[serde(default = "SynthesizerConfig::default_fade_time")]
    pub fade_time: f64,
}

impl SynthesizerConfig {
    fn default_fade_time() -> f64 {
        1e-3
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            fade_time: Self::default_fade_time(),
        }
    }
}

/// Bandwidth-enhanced additive synthesizer.
///
/// Renders partials additively into a caller-supplied buffer (grown as
/// needed, never cleared), one oscillator per partial. The shared noise
/// modulator is indexed by absolute sample position, so rendering is
/// bit-identical across runs and across any partition of the partial
/// list into separate renders.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    sample_rate: f64,
    fade_time: f64,
    noise: NoiseModulator,
}

impl Synthesizer {
    pub fn new(sample_rate: f64) -> Result<Self> {
        Self::with_config(sample_rate, SynthesizerConfig::default())
    }

    pub fn with_config(sample_rate: f64, config: SynthesizerConfig) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(Error::invalid_argument(format!(
                "sample rate {sample_rate}"
            )));
        }
        if !(config.fade_time.is_finite() && config.fade_time >= 0.0) {
            return Err(Error::invalid_argument(format!(
                "fade time {} s",
                config.fade_time
            )));
        }
        Ok(Self {
            sample_rate,
            fade_time: config.fade_time,
            noise: NoiseModulator::default(),
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn fade_time(&self) -> f64 {
        self.fade_time
    }

    /// Render one partial, accumulating into `out`.
    pub fn synthesize_partial(&self, partial: &Partial, out: &mut Vec<f64>) -> Result<()> {
        if partial.is_empty() {
            return Ok(());
        }
        let schedule = self.schedule(partial);
        let (Some(&(t0, first)), Some(&(end_time, _))) = (schedule.first(), schedule.last())
        else {
            return Ok(());
        };
        if end_time < 0.0 {
            return Ok(());
        }
        let needed = (end_time * self.sample_rate).ceil() as usize + 1;
        if out.len() < needed {
            out.resize(needed, 0.0);
        }

        let mut osc = Oscillator::new();
        osc.reset(
            TAU * first.frequency / self.sample_rate,
            first.amplitude,
            first.bandwidth,
            first.phase,
        );

        let mut pos = t0 * self.sample_rate;
        let mut next_index = pos.ceil() as i64;
        for &(t1, bp) in &schedule[1..] {
            let end_pos = t1 * self.sample_rate;
            let length = end_pos - pos;
            osc.render_segment(
                out,
                &self.noise,
                pos,
                length,
                next_index,
                TAU * bp.frequency / self.sample_rate,
                bp.amplitude,
                bp.bandwidth,
                bp.phase,
            );
            pos = end_pos;
            next_index = pos.ceil() as i64;
        }
        Ok(())
    }

    /// Render a list of partials additively.
    pub fn synthesize(&self, partials: &[Partial], out: &mut Vec<f64>) -> Result<()> {
        debug!(partials = partials.len(), "synthesizing");
        for p in partials {
            self.synthesize_partial(p, out)?;
        }
        Ok(())
    }

    /// Breakpoint schedule with fade-in and fade-out nulls. Fades are
    /// shortened when the partial starts too close to time zero.
    fn schedule(&self, partial: &Partial) -> Vec<(f64, Breakpoint)> {
        let mut schedule: Vec<(f64, Breakpoint)> = Vec::with_capacity(partial.len() + 2);
        let (Some((t_first, first)), Some((t_last, last))) = (partial.first(), partial.last())
        else {
            return schedule;
        };

        let fade_in = self.fade_time.min(t_first.max(0.0));
        if fade_in > 0.0 {
            let t = t_first - fade_in;
            schedule.push((
                t,
                Breakpoint::new(
                    first.frequency,
                    0.0,
                    first.bandwidth,
                    first.phase - TAU * first.frequency * fade_in,
                ),
            ));
        }
        for (t, bp) in partial.iter() {
            schedule.push((t, *bp));
        }
        if self.fade_time > 0.0 {
            schedule.push((
                t_last + self.fade_time,
                Breakpoint::new(
                    last.frequency,
                    0.0,
                    last.bandwidth,
                    last.phase + TAU * last.frequency * self.fade_time,
                ),
            ));
        }
        schedule
    }
}
