//! Parameter-axis utilities over partials and partial lists.

use std::f64::consts::TAU;

use crate::model::{Envelope, Partial, PartialList};
use crate::ops::cropper::Cropper;

/// Scale every breakpoint amplitude by an envelope (or constant factor).
pub fn scale_amplitude(partial: &mut Partial, factor: &impl Envelope) {
    for (t, bp) in partial.iter_mut() {
        bp.amplitude = (bp.amplitude * factor.value_at(t)).max(0.0);
    }
}

pub fn scale_amplitude_list(partials: &mut PartialList, factor: &impl Envelope) {
    for p in partials.iter_mut() {
        scale_amplitude(p, factor);
    }
}

/// Scale every breakpoint frequency by an envelope (or constant factor).
/// Stored phases are left alone; resynthesis re-integrates them.
pub fn scale_frequency(partial: &mut Partial, factor: &impl Envelope) {
    for (t, bp) in partial.iter_mut() {
        bp.frequency = (bp.frequency * factor.value_at(t)).max(0.0);
    }
}

pub fn scale_frequency_list(partials: &mut PartialList, factor: &impl Envelope) {
    for p in partials.iter_mut() {
        scale_frequency(p, factor);
    }
}

/// Scale every breakpoint bandwidth, clamped back into [0, 1].
pub fn scale_bandwidth(partial: &mut Partial, factor: &impl Envelope) {
    for (t, bp) in partial.iter_mut() {
        bp.bandwidth = (bp.bandwidth * factor.value_at(t)).clamp(0.0, 1.0);
    }
}

pub fn scale_bandwidth_list(partials: &mut PartialList, factor: &impl Envelope) {
    for p in partials.iter_mut() {
        scale_bandwidth(p, factor);
    }
}

/// Overwrite every breakpoint bandwidth with an envelope value.
pub fn set_bandwidth(partial: &mut Partial, bandwidth: &impl Envelope) {
    for (t, bp) in partial.iter_mut() {
        bp.bandwidth = bandwidth.value_at(t).clamp(0.0, 1.0);
    }
}

/// Shift pitch by an envelope of cents.
pub fn shift_pitch(partial: &mut Partial, cents: &impl Envelope) {
    for (t, bp) in partial.iter_mut() {
        bp.frequency *= (cents.value_at(t) / 1200.0).exp2();
    }
}

pub fn shift_pitch_list(partials: &mut PartialList, cents: &impl Envelope) {
    for p in partials.iter_mut() {
        shift_pitch(p, cents);
    }
}

/// Shift every breakpoint time by a constant offset.
pub fn shift_time(partials: &mut PartialList, offset: f64) {
    for p in partials.iter_mut() {
        let shifted: Vec<_> = p.iter().map(|(t, bp)| (t + offset, *bp)).collect();
        let mut rebuilt = Partial::with_label(p.label());
        for (t, bp) in shifted {
            let _ = rebuilt.push_point(t, bp);
        }
        *p = rebuilt;
    }
}

/// Recompute stored phases after time `t` so that each one is the
/// trapezoidal frequency integral from its predecessor. The breakpoint at
/// or after `t` keeps its phase and anchors the integration.
pub fn fix_phase_after(partial: &mut Partial, t: f64) {
    let data: Vec<(f64, f64)> = partial.iter().map(|(bt, bp)| (bt, bp.frequency)).collect();
    if data.len() < 2 {
        return;
    }
    let anchor = match data.iter().position(|&(bt, _)| bt >= t) {
        Some(i) => i,
        None => return,
    };

    let mut phases: Vec<Option<f64>> = vec![None; data.len()];
    let mut prev_phase = match partial.point(anchor) {
        Some((_, bp)) => bp.phase,
        None => return,
    };
    for k in anchor + 1..data.len() {
        let (t0, f0) = data[k - 1];
        let (t1, f1) = data[k];
        prev_phase += TAU * 0.5 * (f0 + f1) * (t1 - t0);
        phases[k] = Some(prev_phase);
    }

    for (k, (_, bp)) in partial.iter_mut().enumerate() {
        if let Some(ph) = phases[k] {
            bp.phase = ph;
        }
    }
}

/// Crop every partial in the list to [t0, t1]; partials left empty are
/// removed.
pub fn crop(partials: &mut PartialList, t0: f64, t1: f64) -> crate::error::Result<()> {
    let cropper = Cropper::new(t0, t1)?;
    cropper.crop(partials);
    partials.retain(|p| !p.is_empty());
    Ok(())
}

/// Remove empty partials.
pub fn strip_empty(partials: &mut PartialList) {
    partials.retain(|p| !p.is_empty());
}

/// Earliest start and latest end over the list.
pub fn time_span(partials: &[Partial]) -> Option<(f64, f64)> {
    let mut span: Option<(f64, f64)> = None;
    for p in partials {
        if let (Some(s), Some(e)) = (p.start_time(), p.end_time()) {
            span = Some(match span {
                Some((s0, e0)) => (s0.min(s), e0.max(e)),
                None => (s, e),
            });
        }
    }
    span
}

/// Stable sort by label, then start time within a label.
pub fn sort_by_label(partials: &mut PartialList) {
    partials.sort_by(|a, b| {
        a.label().cmp(&b.label()).then(
            a.start_time()
                .unwrap_or(f64::INFINITY)
                .total_cmp(&b.start_time().unwrap_or(f64::INFINITY)),
        )
    });
}

/// Stable sort by start time (empty partials last).
pub fn sort_by_start_time(partials: &mut PartialList) {
    partials.sort_by(|a, b| {
        a.start_time()
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.start_time().unwrap_or(f64::INFINITY))
    });
}
