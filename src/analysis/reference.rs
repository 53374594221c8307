//! Reference frequency envelope traced from an analyzed partial set.

use crate::error::{Error, Result};
use crate::model::{Envelope, LinearEnvelope, Partial};

/// Traces the frequency of the strongest partial whose average frequency
/// lies inside a bracket. The result seeds channelization when no
/// fundamental envelope was built during analysis.
#[derive(Debug, Clone)]
pub struct FrequencyReference {
    envelope: LinearEnvelope,
}

impl FrequencyReference {
    /// Pick the best partial in [fmin, fmax] and sample its frequency at
    /// `num_samples` evenly spaced times across its span.
    pub fn new(partials: &[Partial], fmin: f64, fmax: f64, num_samples: usize) -> Result<Self> {
        if !(fmin > 0.0 && fmax > fmin) {
            return Err(Error::invalid_argument(format!(
                "reference bracket ({fmin}, {fmax})"
            )));
        }
        if num_samples < 2 {
            return Err(Error::invalid_argument(
                "reference needs at least two samples",
            ));
        }

        let best = partials
            .iter()
            .filter(|p| {
                p.len() >= 2 && {
                    let f = amplitude_weighted_frequency(p);
                    f >= fmin && f <= fmax
                }
            })
            .max_by(|a, b| a.energy().total_cmp(&b.energy()))
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "no partial with average frequency in ({fmin}, {fmax})"
                ))
            })?;

        let start = best.start_time().unwrap_or(0.0);
        let end = best.end_time().unwrap_or(start);
        let step = (end - start) / (num_samples - 1) as f64;
        let mut envelope = LinearEnvelope::new();
        for i in 0..num_samples {
            let t = start + i as f64 * step;
            envelope.insert(t, best.frequency_at(t));
        }

        Ok(Self { envelope })
    }

    pub fn envelope(&self) -> &LinearEnvelope {
        &self.envelope
    }

    pub fn into_envelope(self) -> LinearEnvelope {
        self.envelope
    }
}

impl Envelope for FrequencyReference {
    fn value_at(&self, t: f64) -> f64 {
        self.envelope.value_at(t)
    }
}

fn amplitude_weighted_frequency(p: &Partial) -> f64 {
    let mut weight = 0.0;
    let mut acc = 0.0;
    for (_, bp) in p.iter() {
        let w = bp.energy();
        weight += w;
        acc += w * bp.frequency;
    }
    if weight > 0.0 {
        acc / weight
    } else {
        0.0
    }
}
