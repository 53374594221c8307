//! Sifting: resolve same-label overlaps before distillation.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::PartialList;
use crate::ops::cropper::Cropper;
use crate::ops::distiller::Distiller;

/// Within each non-zero label, overlapping partials are contested: the
/// partial with the greater amplitude at the overlap midpoint keeps the
/// overlap, and the loser is trimmed to its non-overlapping portion
/// (emptied when fully covered). Sifting is normally followed by
/// distillation of the trimmed list.
#[derive(Debug, Clone, Copy)]
pub struct Sieve {
    fade_time: f64,
}

impl Sieve {
    pub fn new(fade_time: f64) -> Result<Self> {
        if !(fade_time.is_finite() && fade_time >= 0.0) {
            return Err(Error::invalid_argument(format!("fade time {fade_time} s")));
        }
        Ok(Self { fade_time })
    }

    /// Trim overlap conflicts in place, leaving labels and list order
    /// unchanged. Fully-covered losers become empty partials.
    pub fn sift(&self, partials: &mut PartialList) {
        let mut order: Vec<usize> = (0..partials.len())
            .filter(|&i| partials[i].label() > 0 && !partials[i].is_empty())
            .collect();
        order.sort_by(|&a, &b| {
            partials[a]
                .start_time()
                .unwrap_or(0.0)
                .total_cmp(&partials[b].start_time().unwrap_or(0.0))
        });

        let mut trimmed = 0usize;
        for pos in 0..order.len() {
            let i = order[pos];
            for &j in order.iter().take(pos) {
                if partials[j].label() != partials[i].label() {
                    continue;
                }
                let (Some(si), Some(ei)) = (partials[i].start_time(), partials[i].end_time())
                else {
                    break;
                };
                let (Some(sj), Some(ej)) = (partials[j].start_time(), partials[j].end_time())
                else {
                    continue;
                };
                let overlap_start = si.max(sj);
                let overlap_end = ei.min(ej);
                if overlap_end <= overlap_start {
                    continue;
                }

                let mid = 0.5 * (overlap_start + overlap_end);
                let i_wins = partials[i].amplitude_at(mid) > partials[j].amplitude_at(mid);
                let (loser, keep_from, keep_to) = if i_wins {
                    // The earlier partial keeps what precedes the winner.
                    (j, sj, si)
                } else {
                    // The later partial keeps what follows the winner.
                    (i, ej, ei)
                };
                trimmed += 1;
                if keep_to > keep_from {
                    if let Ok(cropper) = Cropper::new(keep_from, keep_to) {
                        cropper.crop_partial(&mut partials[loser]);
                    }
                } else {
                    partials[loser].clear();
                }
            }
        }
        if trimmed > 0 {
            debug!(trimmed, "sifted overlap conflicts");
        }
    }

    /// Sift, drop the partials that were emptied by trimming, and distill
    /// what remains with the same fade time.
    pub fn apply(&self, partials: &mut PartialList) -> Result<()> {
        self.sift(partials);
        partials.retain(|p| !p.is_empty());
        Distiller::new(self.fade_time)?.distill(partials);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Breakpoint, Partial};

    fn labeled(label: i32, t0: f64, t1: f64, amp: f64) -> Partial {
        let mut p = Partial::with_label(label);
        p.insert(t0, Breakpoint::new(100.0, amp, 0.0, 0.0)).unwrap();
        p.insert(t1, Breakpoint::new(100.0, amp, 0.0, 0.0)).unwrap();
        p
    }

    #[test]
    fn quieter_overlap_is_trimmed() {
        let mut list = vec![
            labeled(5, 0.0, 1.0, 0.5),
            labeled(5, 0.6, 1.5, 0.2),
        ];
        Sieve::new(0.01).unwrap().sift(&mut list);
        // Loud partial intact; quiet one keeps only its part after the
        // winner's span.
        assert_eq!(list[0].start_time(), Some(0.0));
        assert_eq!(list[0].end_time(), Some(1.0));
        assert_eq!(list[1].start_time(), Some(1.0));
        assert_eq!(list[1].end_time(), Some(1.5));
    }

    #[test]
    fn fully_covered_loser_empties() {
        let mut list = vec![
            labeled(5, 0.0, 1.0, 0.5),
            labeled(5, 0.2, 0.8, 0.1),
        ];
        Sieve::new(0.01).unwrap().sift(&mut list);
        assert!(list[1].is_empty());
        assert_eq!(list[0].len(), 2);
    }

    #[test]
    fn different_labels_do_not_contest() {
        let mut list = vec![
            labeled(5, 0.0, 1.0, 0.5),
            labeled(6, 0.2, 0.8, 0.1),
        ];
        Sieve::new(0.01).unwrap().sift(&mut list);
        assert_eq!(list[0].len(), 2);
        assert_eq!(list[1].len(), 2);
    }

    #[test]
    fn apply_yields_one_partial_per_label() {
        let mut list = vec![
            labeled(5, 0.0, 1.0, 0.5),
            labeled(5, 0.6, 1.5, 0.2),
            labeled(9, 2.0, 2.5, 0.3),
        ];
        Sieve::new(0.01).unwrap().apply(&mut list).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].label(), 5);
        assert_eq!(list[1].label(), 9);
    }
}
