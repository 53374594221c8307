//! Harmonic labeling against a reference frequency envelope.

use crate::error::{Error, Result};
use crate::model::{Envelope, LinearEnvelope, Partial, PartialList};

/// Assigns each partial the harmonic number it occupies relative to a
/// reference envelope. The envelope traces harmonic `stretch` (usually 1,
/// the fundamental); a partial's label is the nearest integer to
/// stretch * frequency / reference at the partial's temporal midpoint.
/// Ratios rounding to zero or below leave the partial unlabeled.
#[derive(Debug, Clone)]
pub struct Channelizer {
    reference: LinearEnvelope,
    stretch: i32,
}

impl Channelizer {
    pub fn new(reference: LinearEnvelope, stretch: i32) -> Result<Self> {
        if reference.is_empty() {
            return Err(Error::invalid_argument("empty reference envelope"));
        }
        if stretch < 1 {
            return Err(Error::invalid_argument(format!(
                "reference stretch {stretch}"
            )));
        }
        Ok(Self { reference, stretch })
    }

    pub fn channelize_partial(&self, partial: &mut Partial) {
        let (Some(start), Some(end)) = (partial.start_time(), partial.end_time()) else {
            partial.set_label(0);
            return;
        };
        let mid = 0.5 * (start + end);
        let reference = self.reference.value_at(mid);
        if reference <= 0.0 {
            partial.set_label(0);
            return;
        }
        let ratio = self.stretch as f64 * partial.frequency_at(mid) / reference;
        let label = ratio.round() as i64;
        partial.set_label(if label >= 1 { label.min(i32::MAX as i64) as i32 } else { 0 });
    }

    pub fn channelize(&self, partials: &mut PartialList) {
        for p in partials.iter_mut() {
            self.channelize_partial(p);
        }
    }
}
