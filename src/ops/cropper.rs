//! Trim partials to a time interval.

use crate::error::{Error, Result};
use crate::model::{Partial, PartialList};

/// Removes breakpoints outside [t0, t1], inserting interpolated boundary
/// breakpoints where a partial spans an edge. Partials entirely outside
/// the interval become empty but remain in the list.
#[derive(Debug, Clone, Copy)]
pub struct Cropper {
    t0: f64,
    t1: f64,
}

impl Cropper {
    pub fn new(t0: f64, t1: f64) -> Result<Self> {
        if !(t0.is_finite() && t1.is_finite() && t1 > t0) {
            return Err(Error::invalid_argument(format!(
                "crop interval [{t0}, {t1}]"
            )));
        }
        Ok(Self { t0, t1 })
    }

    pub fn crop_partial(&self, partial: &mut Partial) {
        let (Some(start), Some(end)) = (partial.start_time(), partial.end_time()) else {
            return;
        };
        if end < self.t0 || start > self.t1 {
            partial.clear();
            return;
        }
        if start >= self.t0 && end <= self.t1 {
            return;
        }

        let mut cropped = Partial::with_label(partial.label());
        if start < self.t0 {
            if let Some(bp) = partial.parameters_at(self.t0) {
                let _ = cropped.push_point(self.t0, bp);
            }
        }
        for (t, bp) in partial.iter() {
            if t >= self.t0 && t <= self.t1 {
                let _ = cropped.push_point(t, *bp);
            }
        }
        if end > self.t1 {
            if let Some(bp) = partial.parameters_at(self.t1) {
                let _ = cropped.push_point(self.t1, bp);
            }
        }
        *partial = cropped;
    }

    pub fn crop(&self, partials: &mut PartialList) {
        for p in partials.iter_mut() {
            self.crop_partial(p);
        }
    }
}
