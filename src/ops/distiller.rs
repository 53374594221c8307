//! Distillation: fuse the partials sharing a label into one partial per
//! label.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Breakpoint, Partial, PartialList};

/// Fuses same-label partials. Label-0 partials pass through untouched;
/// the output holds them first (in their original order) followed by one
/// partial per non-zero label, in ascending label order.
#[derive(Debug, Clone, Copy)]
pub struct Distiller {
    fade_time: f64,
}

impl Distiller {
    pub fn new(fade_time: f64) -> Result<Self> {
        if !(fade_time.is_finite() && fade_time >= 0.0) {
            return Err(Error::invalid_argument(format!("fade time {fade_time} s")));
        }
        Ok(Self { fade_time })
    }

    pub fn fade_time(&self) -> f64 {
        self.fade_time
    }

    /// Distill the list in place.
    pub fn distill(&self, partials: &mut PartialList) {
        let mut unlabeled = Vec::new();
        let mut groups: BTreeMap<i32, Vec<Partial>> = BTreeMap::new();
        for p in partials.drain(..) {
            if p.label() <= 0 {
                unlabeled.push(p);
            } else {
                groups.entry(p.label()).or_default().push(p);
            }
        }
        debug!(
            labels = groups.len(),
            unlabeled = unlabeled.len(),
            "distilling"
        );

        partials.extend(unlabeled);
        for (label, sources) in groups {
            partials.push(fuse(sources, self.fade_time, label));
        }
    }
}

/// Fuse a group of same-label partials into one.
///
/// Sources merge in start-time order. A later-starting source owns the
/// region it covers: the breakpoints it displaces contribute their energy
/// to its breakpoints as noise. Temporal gaps are bridged with
/// zero-amplitude null breakpoints one fade time away from each edge
/// (collapsed to a single midpoint null when the gap is shorter than two
/// fade times).
pub(crate) fn fuse(sources: Vec<Partial>, fade_time: f64, label: i32) -> Partial {
    let mut sources: Vec<Partial> = sources.into_iter().filter(|p| !p.is_empty()).collect();
    sources.sort_by(|a, b| {
        a.start_time()
            .unwrap_or(0.0)
            .total_cmp(&b.start_time().unwrap_or(0.0))
    });

    let mut iter = sources.into_iter();
    let Some(first) = iter.next() else {
        return Partial::with_label(label);
    };

    let mut acc = first;
    acc.set_label(label);
    for src in iter {
        acc = merge(acc, &src, fade_time, label);
    }
    acc
}

/// Merge one later-starting source into the accumulated partial.
fn merge(acc: Partial, src: &Partial, fade: f64, label: i32) -> Partial {
    let src_start = match src.start_time() {
        Some(t) => t,
        None => return acc,
    };
    let src_end = src.end_time().unwrap_or(src_start);

    let mut out = Partial::with_label(label);

    // Keep the accumulated breakpoints strictly before the source starts.
    for (t, bp) in acc.iter() {
        if t < src_start {
            let _ = out.push_point(t, *bp);
        }
    }

    // Bridge from the retained head into the source.
    if let Some(close_t) = out.end_time() {
        insert_gap_nulls(&mut out, &acc, close_t, src, src_start, fade);
    }

    // The source owns its span; displaced accumulated energy becomes
    // noise on the source's breakpoints.
    for (t, bp) in src.iter() {
        let mut bp = *bp;
        let displaced = acc.amplitude_at(t);
        bp.add_noise_energy(displaced * displaced);
        let _ = out.push_point(t, bp);
    }

    // Re-attach any accumulated breakpoints beyond the source's end.
    let tail: Vec<(f64, Breakpoint)> = acc
        .iter()
        .filter(|&(t, _)| t > src_end)
        .map(|(t, bp)| (t, *bp))
        .collect();
    if let Some(&(tail_start, _)) = tail.first() {
        let mut opener = Partial::new();
        for &(t, bp) in &tail {
            let _ = opener.push_point(t, bp);
        }
        insert_gap_nulls(&mut out, src, src_end, &opener, tail_start, fade);
        for (t, bp) in tail {
            if out.end_time().map_or(true, |last| t > last) {
                let _ = out.push_point(t, bp);
            }
        }
    }

    out
}

/// Null breakpoints bridging the gap between a closing partial (last real
/// breakpoint at `close_t`) and an opening one (first real breakpoint at
/// `open_t`). Nulls carry zero amplitude and bandwidth; frequency and
/// phase extrapolate from the adjacent partial.
fn insert_gap_nulls(
    out: &mut Partial,
    closing: &Partial,
    close_t: f64,
    opening: &Partial,
    open_t: f64,
    fade: f64,
) {
    let gap = open_t - close_t;
    if fade <= 0.0 || gap <= 0.0 {
        return;
    }
    if gap > 2.0 * fade {
        if let Some(bp) = closing.parameters_at(close_t + fade) {
            let _ = out.push_point(close_t + fade, null_of(&bp));
        }
        if let Some(bp) = opening.parameters_at(open_t - fade) {
            let _ = out.push_point(open_t - fade, null_of(&bp));
        }
    } else {
        let mid = 0.5 * (close_t + open_t);
        if let Some(bp) = closing.parameters_at(mid) {
            let _ = out.push_point(mid, null_of(&bp));
        }
    }
}

fn null_of(bp: &Breakpoint) -> Breakpoint {
    Breakpoint::new(bp.frequency, 0.0, 0.0, bp.phase)
}
