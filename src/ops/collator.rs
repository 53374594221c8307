//! Collation: pack partials into as few non-overlapping tracks as
//! possible.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Partial, PartialList};
use crate::ops::distiller::fuse;

/// Packs partials (labels ignored) into the smallest number of output
/// partials such that the sources inside one output are separated by at
/// least two fade times. Outputs are labeled 1, 2, ... in packing order.
#[derive(Debug, Clone, Copy)]
pub struct Collator {
    fade_time: f64,
}

impl Collator {
    pub fn new(fade_time: f64) -> Result<Self> {
        if !(fade_time.is_finite() && fade_time >= 0.0) {
            return Err(Error::invalid_argument(format!("fade time {fade_time} s")));
        }
        Ok(Self { fade_time })
    }

    pub fn collate(&self, partials: &mut PartialList) {
        let mut sources: Vec<Partial> = partials.drain(..).filter(|p| !p.is_empty()).collect();
        sources.sort_by(|a, b| {
            a.start_time()
                .unwrap_or(0.0)
                .total_cmp(&b.start_time().unwrap_or(0.0))
        });

        // First-fit: a source joins the earliest bin that ended at least
        // two fade times before the source starts.
        let mut bins: Vec<Vec<Partial>> = Vec::new();
        let mut bin_ends: Vec<f64> = Vec::new();
        for src in sources {
            let start = src.start_time().unwrap_or(0.0);
            let end = src.end_time().unwrap_or(start);
            match bin_ends
                .iter()
                .position(|&bin_end| bin_end + 2.0 * self.fade_time <= start)
            {
                Some(i) => {
                    bins[i].push(src);
                    bin_ends[i] = end;
                }
                None => {
                    bins.push(vec![src]);
                    bin_ends.push(end);
                }
            }
        }
        debug!(bins = bins.len(), "collated");

        for (i, bin) in bins.into_iter().enumerate() {
            let label = (i + 1) as i32;
            partials.push(fuse(bin, self.fade_time, label));
        }
    }
}
