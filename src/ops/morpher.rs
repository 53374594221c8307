//! Morphing: interpolate between two partial sets under time-varying
//! weight envelopes.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Breakpoint, Envelope, LinearEnvelope, Partial, PartialList};

/// Guard constant for log-amplitude mixing.
const LOG_AMP_EPSILON: f64 = 1e-12;

/// Morph weights below this count as 0, above one minus this as 1.
const WEIGHT_EDGE: f64 = 1e-9;

/// Interpolates paired partials under three weight envelopes (frequency,
/// amplitude, bandwidth; 0 = source, 1 = target). Partials are paired by
/// label; an unpaired partial morphs against an empty dummy, which
/// reduces to a fade governed by the amplitude envelope.
#[derive(Debug, Clone)]
pub struct Morpher {
    freq_env: LinearEnvelope,
    amp_env: LinearEnvelope,
    bw_env: LinearEnvelope,
    log_freq_morphing: bool,
    log_amp_morphing: bool,
    min_breakpoint_gap: f64,
    source_reference: Option<(Partial, i32)>,
    target_reference: Option<(Partial, i32)>,
}

impl Morpher {
    /// One envelope steering all three parameters.
    pub fn new(morph_env: LinearEnvelope) -> Self {
        Self::with_envelopes(morph_env.clone(), morph_env.clone(), morph_env)
    }

    pub fn with_envelopes(
        freq_env: LinearEnvelope,
        amp_env: LinearEnvelope,
        bw_env: LinearEnvelope,
    ) -> Self {
        Self {
            freq_env,
            amp_env,
            bw_env,
            log_freq_morphing: true,
            log_amp_morphing: true,
            min_breakpoint_gap: 1e-3,
            source_reference: None,
            target_reference: None,
        }
    }

    pub fn frequency_function(&self) -> &LinearEnvelope {
        &self.freq_env
    }

    pub fn set_frequency_function(&mut self, env: LinearEnvelope) {
        self.freq_env = env;
    }

    pub fn amplitude_function(&self) -> &LinearEnvelope {
        &self.amp_env
    }

    pub fn set_amplitude_function(&mut self, env: LinearEnvelope) {
        self.amp_env = env;
    }

    pub fn bandwidth_function(&self) -> &LinearEnvelope {
        &self.bw_env
    }

    pub fn set_bandwidth_function(&mut self, env: LinearEnvelope) {
        self.bw_env = env;
    }

    pub fn enable_log_freq_morphing(&mut self, enabled: bool) {
        self.log_freq_morphing = enabled;
    }

    pub fn enable_log_amp_morphing(&mut self, enabled: bool) {
        self.log_amp_morphing = enabled;
    }

    pub fn min_breakpoint_gap(&self) -> f64 {
        self.min_breakpoint_gap
    }

    /// Thin morphed breakpoints so no two are closer than `gap` seconds.
    pub fn set_min_breakpoint_gap(&mut self, gap: f64) -> Result<()> {
        if !(gap.is_finite() && gap > 0.0) {
            return Err(Error::invalid_argument(format!(
                "minimum breakpoint gap {gap} s"
            )));
        }
        self.min_breakpoint_gap = gap;
        Ok(())
    }

    /// Use the labeled partial as the frequency reference for unpaired
    /// source-side morphs.
    pub fn set_source_reference(&mut self, partial: Partial, label: i32) -> Result<()> {
        if label < 1 || partial.is_empty() {
            return Err(Error::invalid_argument("source reference partial"));
        }
        self.source_reference = Some((partial, label));
        Ok(())
    }

    pub fn set_target_reference(&mut self, partial: Partial, label: i32) -> Result<()> {
        if label < 1 || partial.is_empty() {
            return Err(Error::invalid_argument("target reference partial"));
        }
        self.target_reference = Some((partial, label));
        Ok(())
    }

    /// Morph two breakpoints sampled at time `t`.
    ///
    /// The phase comes from whichever side dominates the frequency morph;
    /// partial-level morphing replaces interior phases with the frequency
    /// integral.
    pub fn morph_breakpoints(&self, src: &Breakpoint, tgt: &Breakpoint, t: f64) -> Breakpoint {
        let wf = self.freq_env.value_at(t).clamp(0.0, 1.0);
        let wa = self.amp_env.value_at(t).clamp(0.0, 1.0);
        let wb = self.bw_env.value_at(t).clamp(0.0, 1.0);

        let frequency = if self.log_freq_morphing && src.frequency > 0.0 && tgt.frequency > 0.0 {
            ((1.0 - wf) * src.frequency.ln() + wf * tgt.frequency.ln()).exp()
        } else {
            (1.0 - wf) * src.frequency + wf * tgt.frequency
        };

        let amplitude = if self.log_amp_morphing {
            let mixed = ((1.0 - wa) * (src.amplitude + LOG_AMP_EPSILON).ln()
                + wa * (tgt.amplitude + LOG_AMP_EPSILON).ln())
            .exp()
                - LOG_AMP_EPSILON;
            mixed.max(0.0)
        } else {
            (1.0 - wa) * src.amplitude + wa * tgt.amplitude
        };

        let bandwidth = ((1.0 - wb) * src.bandwidth + wb * tgt.bandwidth).clamp(0.0, 1.0);

        let phase = if wf <= WEIGHT_EDGE {
            src.phase
        } else if wf >= 1.0 - WEIGHT_EDGE {
            tgt.phase
        } else if wf < 0.5 {
            src.phase
        } else {
            tgt.phase
        };

        Breakpoint {
            frequency,
            amplitude,
            bandwidth,
            phase,
        }
    }

    /// Morph a pair of partials into one labeled `label`.
    ///
    /// Breakpoint times are the union of both sources' times, thinned by
    /// the minimum gap. An empty side acts as a silent dummy at the real
    /// side's frequency.
    pub fn morph_partial(&self, src: &Partial, tgt: &Partial, label: i32) -> Partial {
        let mut out = Partial::with_label(label);
        if src.is_empty() && tgt.is_empty() {
            return out;
        }

        let mut times: Vec<f64> = src
            .iter()
            .map(|(t, _)| t)
            .chain(tgt.iter().map(|(t, _)| t))
            .collect();
        times.sort_by(f64::total_cmp);
        let mut thinned: Vec<f64> = Vec::with_capacity(times.len());
        for t in times {
            if thinned
                .last()
                .map_or(true, |&prev| t - prev >= self.min_breakpoint_gap)
            {
                thinned.push(t);
            }
        }

        for &t in &thinned {
            let bp_src = self.side_parameters(src, tgt, t, label, true);
            let bp_tgt = self.side_parameters(tgt, src, t, label, false);
            let morphed = self.morph_breakpoints(&bp_src, &bp_tgt, t);
            let _ = out.push_point(t, morphed);
        }

        self.fix_interior_phases(&mut out);
        out
    }

    /// Parameters contributed by one side at time `t`; an empty side
    /// yields a silent dummy borrowing the other side's frequency (or the
    /// configured reference partial's, scaled by the label ratio).
    fn side_parameters(
        &self,
        this: &Partial,
        other: &Partial,
        t: f64,
        label: i32,
        is_source: bool,
    ) -> Breakpoint {
        if let Some(bp) = this.parameters_at(t) {
            return bp;
        }
        let reference = if is_source {
            &self.source_reference
        } else {
            &self.target_reference
        };
        let frequency = match reference {
            Some((ref_partial, ref_label)) if label > 0 => {
                ref_partial.frequency_at(t) * label as f64 / *ref_label as f64
            }
            _ => other.parameters_at(t).map_or(0.0, |bp| bp.frequency),
        };
        let other_bp = other.parameters_at(t).unwrap_or_default();
        Breakpoint {
            frequency,
            amplitude: 0.0,
            bandwidth: other_bp.bandwidth,
            phase: other_bp.phase,
        }
    }

    /// Recompute phases by frequency integration wherever the frequency
    /// morph is strictly between its endpoints, so blended regions stay
    /// phase-continuous.
    fn fix_interior_phases(&self, partial: &mut Partial) {
        let snapshot: Vec<(f64, f64, f64)> = partial
            .iter()
            .map(|(t, bp)| (t, bp.frequency, bp.phase))
            .collect();
        if snapshot.len() < 2 {
            return;
        }

        let mut phases: Vec<f64> = snapshot.iter().map(|&(_, _, ph)| ph).collect();
        for k in 1..snapshot.len() {
            let (t0, f0, _) = snapshot[k - 1];
            let (t1, f1, _) = snapshot[k];
            let wf = self.freq_env.value_at(t1).clamp(0.0, 1.0);
            if wf > WEIGHT_EDGE && wf < 1.0 - WEIGHT_EDGE {
                phases[k] = phases[k - 1] + TAU * 0.5 * (f0 + f1) * (t1 - t0);
            }
        }

        for (k, (_, bp)) in partial.iter_mut().enumerate() {
            bp.phase = phases[k];
        }
    }

    /// Morph two partial lists. Partials are paired by non-zero label;
    /// label-0 partials crossfade against dummies. The output carries the
    /// crossfaded partials first, then the labeled morphs in ascending
    /// label order.
    pub fn morph(&self, sources: &[Partial], targets: &[Partial]) -> PartialList {
        let empty = Partial::new();
        let mut out = PartialList::new();

        for p in sources.iter().filter(|p| p.label() == 0 && !p.is_empty()) {
            out.push(self.morph_partial(p, &empty, 0));
        }
        for p in targets.iter().filter(|p| p.label() == 0 && !p.is_empty()) {
            out.push(self.morph_partial(&empty, p, 0));
        }

        let mut by_label: BTreeMap<i32, (Option<&Partial>, Option<&Partial>)> = BTreeMap::new();
        for p in sources.iter().filter(|p| p.label() > 0) {
            let entry = by_label.entry(p.label()).or_default();
            if entry.0.is_some() {
                warn!(label = p.label(), "duplicate source label, keeping first");
            } else {
                entry.0 = Some(p);
            }
        }
        for p in targets.iter().filter(|p| p.label() > 0) {
            let entry = by_label.entry(p.label()).or_default();
            if entry.1.is_some() {
                warn!(label = p.label(), "duplicate target label, keeping first");
            } else {
                entry.1 = Some(p);
            }
        }

        debug!(pairs = by_label.len(), "morphing labeled pairs");
        for (label, (src, tgt)) in by_label {
            out.push(self.morph_partial(
                src.unwrap_or(&empty),
                tgt.unwrap_or(&empty),
                label,
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(points: &[(f64, f64)]) -> LinearEnvelope {
        points.iter().copied().collect()
    }

    fn linear_morpher() -> Morpher {
        // Frequency: holds 0 until 0.2, reaches 1 at 0.8.
        // Amplitude: reaches 1 at 0.4. Bandwidth: returns to 0 at 0.8.
        let fenv = env(&[(0.0, 0.0), (0.2, 0.0), (0.4, 0.5), (0.6, 0.5), (0.8, 1.0), (1.0, 1.0)]);
        let aenv = env(&[(0.0, 0.0), (0.2, 0.5), (0.4, 1.0), (1.0, 1.0)]);
        let bwenv = env(&[(0.0, 0.0), (0.2, 0.5), (0.4, 1.0), (0.6, 1.0), (0.8, 0.0), (1.0, 0.0)]);
        let mut m = Morpher::with_envelopes(fenv, aenv, bwenv);
        m.enable_log_amp_morphing(false);
        m.enable_log_freq_morphing(false);
        m
    }

    fn ramp_partial(t0: f64, dt: f64, count: usize, f0: f64, fslope: f64, a0: f64, aslope: f64) -> Partial {
        let mut p = Partial::new();
        for k in 0..count {
            let rel = k as f64 * dt;
            let t = t0 + rel;
            let freq = f0 + fslope * rel;
            let phase = TAU * (f0 * rel + 0.5 * fslope * rel * rel);
            p.insert(t, Breakpoint::new(freq, a0 + aslope * rel, 0.1, phase))
                .unwrap();
        }
        p
    }

    #[test]
    fn linear_morph_averages_at_half_weight() {
        let m = linear_morpher();
        let p1 = ramp_partial(0.0, 0.08, 11, 100.0, 100.0, 0.2, 0.0);
        let p2 = ramp_partial(0.2, 0.021, 39, 200.0, 0.0, 0.1, 0.625);
        let morphed = m.morph_partial(&p1, &p2, 2);

        assert_eq!(morphed.label(), 2);
        assert_eq!(morphed.start_time(), p1.start_time());
        assert_eq!(morphed.end_time(), p2.end_time());

        // Frequency: source at the start, average at 0.5, target at the end.
        assert!((morphed.frequency_at(0.0) - p1.frequency_at(0.0)).abs() < 1.0);
        let avg = 0.5 * (p1.frequency_at(0.5) + p2.frequency_at(0.5));
        assert!((morphed.frequency_at(0.5) - avg).abs() / avg < 0.01);
        let end = p2.end_time().unwrap();
        assert!((morphed.frequency_at(end) - p2.frequency_at(end)).abs() < 1.0);

        // Amplitude: average at 0.2, target from 0.4 on.
        let avg_a = 0.5 * (p1.amplitude_at(0.2) + p2.amplitude_at(0.2));
        assert!((morphed.amplitude_at(0.2) - avg_a).abs() < 0.01);
        assert!((morphed.amplitude_at(0.6) - p2.amplitude_at(0.6)).abs() < 0.01);

        // Bandwidth: source at both ends of the bandwidth envelope,
        // target at 0.5.
        assert!((morphed.bandwidth_at(0.5) - p2.bandwidth_at(0.5)).abs() < 0.01);
        assert!((morphed.bandwidth_at(1.0) - p1.bandwidth_at(1.0)).abs() < 0.01);
    }

    #[test]
    fn morph_to_dummy_is_an_amplitude_fade() {
        let m = linear_morpher();
        let p1 = ramp_partial(0.0, 0.08, 11, 100.0, 100.0, 0.2, 0.0);
        let morphed = m.morph_partial(&p1, &Partial::new(), 3);

        assert_eq!(morphed.label(), 3);
        assert_eq!(morphed.len(), p1.len());
        for (t, bp) in morphed.iter() {
            let expected = (1.0 - m.amplitude_function().value_at(t)) * p1.amplitude_at(t);
            assert!((bp.amplitude - expected).abs() < 1e-9, "at t = {t}");
            assert!((bp.frequency - p1.frequency_at(t)).abs() < 1e-9);
        }
    }

    #[test]
    fn pairing_by_label_and_output_order() {
        let m = linear_morpher();
        let mut s1 = ramp_partial(0.0, 0.1, 5, 100.0, 0.0, 0.2, 0.0);
        s1.set_label(2);
        let mut s2 = ramp_partial(0.0, 0.1, 5, 300.0, 0.0, 0.2, 0.0);
        s2.set_label(9);
        let mut t1 = ramp_partial(0.0, 0.1, 5, 110.0, 0.0, 0.2, 0.0);
        t1.set_label(2);
        let unlabeled = ramp_partial(0.0, 0.1, 3, 50.0, 0.0, 0.2, 0.0);

        let out = m.morph(&[s1, s2, unlabeled.clone()], &[t1]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].label(), 0);
        assert_eq!(out[1].label(), 2);
        assert_eq!(out[2].label(), 9);
    }

    #[test]
    fn min_gap_thins_breakpoints() {
        let mut m = linear_morpher();
        m.set_min_breakpoint_gap(0.045).unwrap();
        let p1 = ramp_partial(0.0, 0.01, 21, 100.0, 0.0, 0.2, 0.0);
        let morphed = m.morph_partial(&p1, &Partial::new(), 1);
        // 0.2 s of breakpoints at a 45 ms floor: every fifth survives.
        assert_eq!(morphed.len(), 5);
        assert!(m.set_min_breakpoint_gap(0.0).is_err());
    }

    #[test]
    fn reference_partial_steers_dummy_frequency() {
        let m = {
            let mut m = linear_morpher();
            let reference = ramp_partial(0.0, 0.1, 11, 100.0, 0.0, 0.2, 0.0);
            m.set_source_reference(reference, 1).unwrap();
            m
        };
        // Source side silent for label 3: dummy frequency must be three
        // times the reference.
        let tgt = ramp_partial(0.0, 0.1, 11, 310.0, 0.0, 0.2, 0.0);
        let morphed = m.morph_partial(&Partial::new(), &tgt, 3);
        // Early in the morph the frequency envelope still favors the
        // source side.
        let f = morphed.frequency_at(0.1);
        assert!((f - 300.0).abs() < 5.0, "frequency {f}");
    }
}
