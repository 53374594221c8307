//! Frame-based partial interchange representation.
//!
//! The core exchanges partials as a sequence of timestamped frames; each
//! frame row carries one breakpoint of one partial plus the residual
//! offset of the breakpoint's exact time from the frame time. Because the
//! offset is kept, export followed by import reproduces the original
//! partial list exactly. Byte-level container codecs live outside the
//! core and serialize these frames (the types derive serde for that
//! purpose).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Breakpoint, Partial, PartialList};

/// One breakpoint of one partial, carried inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Identity of the partial this row belongs to, stable across the
    /// whole frame sequence.
    pub index: u32,
    /// The partial's label.
    pub label: i32,
    pub frequency: f64,
    pub amplitude: f64,
    pub bandwidth: f64,
    pub phase: f64,
    /// Exact breakpoint time minus the frame time.
    pub time_offset: f64,
}

/// All the breakpoints that fall nearest one frame time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub time: f64,
    pub rows: Vec<TrackPoint>,
}

/// Export a partial list as frames spaced `frame_interval` seconds apart.
/// Every breakpoint lands in the nearest frame, with its exact time
/// preserved in the row's offset.
pub fn export_frames(partials: &[Partial], frame_interval: f64) -> Result<Vec<Frame>> {
    if !(frame_interval.is_finite() && frame_interval > 0.0) {
        return Err(Error::invalid_argument(format!(
            "frame interval {frame_interval} s"
        )));
    }

    let mut slots: std::collections::BTreeMap<i64, Vec<TrackPoint>> =
        std::collections::BTreeMap::new();
    for (index, partial) in partials.iter().enumerate() {
        let index = u32::try_from(index)
            .map_err(|_| Error::invalid_argument("too many partials for interchange"))?;
        for (t, bp) in partial.iter() {
            let slot = (t / frame_interval).round() as i64;
            let frame_time = slot as f64 * frame_interval;
            slots.entry(slot).or_default().push(TrackPoint {
                index,
                label: partial.label(),
                frequency: bp.frequency,
                amplitude: bp.amplitude,
                bandwidth: bp.bandwidth,
                phase: bp.phase,
                time_offset: t - frame_time,
            });
        }
    }

    Ok(slots
        .into_iter()
        .map(|(slot, rows)| Frame {
            time: slot as f64 * frame_interval,
            rows,
        })
        .collect())
}

/// Rebuild a partial list from frames. Partials come back in order of
/// their first appearance; exported lists reproduce exactly.
pub fn import_frames(frames: &[Frame]) -> Result<PartialList> {
    let mut order: Vec<u32> = Vec::new();
    let mut by_index: std::collections::HashMap<u32, Partial> = std::collections::HashMap::new();

    for frame in frames {
        for row in &frame.rows {
            let partial = by_index.entry(row.index).or_insert_with(|| {
                order.push(row.index);
                Partial::new()
            });
            partial.set_label(row.label);
            partial.insert(
                frame.time + row.time_offset,
                Breakpoint::new(row.frequency, row.amplitude, row.bandwidth, row.phase),
            )?;
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|idx| by_index.remove(&idx))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(label: i32, points: &[(f64, f64, f64, f64, f64)]) -> Partial {
        let mut p = Partial::with_label(label);
        for &(t, f, a, bw, ph) in points {
            p.insert(t, Breakpoint::new(f, a, bw, ph)).unwrap();
        }
        p
    }

    #[test]
    fn round_trip_is_exact() {
        let list = vec![
            partial(
                3,
                &[
                    (0.1000000001, 440.123456789, 0.25, 0.1, -0.7),
                    (0.3, 441.0, 0.26, 0.12, 2.4),
                    (0.51, 442.0, 0.2, 0.0, 9.9),
                ],
            ),
            partial(0, &[(0.05, 881.0, 0.1, 0.5, 0.0)]),
            Partial::with_label(7),
        ];
        let frames = export_frames(&list, 0.01).unwrap();
        let back = import_frames(&frames).unwrap();

        // The empty partial has no rows to carry; everything else must
        // reproduce bit for bit.
        assert_eq!(back.len(), 2);
        assert_eq!(back[0], list[0]);
        assert_eq!(back[1], list[1]);
    }

    #[test]
    fn frames_are_time_ordered_with_local_offsets() {
        let list = vec![partial(1, &[(0.123, 100.0, 0.1, 0.0, 0.0), (0.377, 100.0, 0.1, 0.0, 0.0)])];
        let frames = export_frames(&list, 0.05).unwrap();
        assert!(frames.windows(2).all(|w| w[0].time < w[1].time));
        for frame in &frames {
            for row in &frame.rows {
                assert!(row.time_offset.abs() <= 0.025 + 1e-12);
                let t = frame.time + row.time_offset;
                assert!((t - 0.123).abs() < 1e-12 || (t - 0.377).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn duplicate_times_surface_invalid_partial() {
        let frames = vec![Frame {
            time: 0.0,
            rows: vec![
                TrackPoint {
                    index: 0,
                    label: 1,
                    frequency: 100.0,
                    amplitude: 0.1,
                    bandwidth: 0.0,
                    phase: 0.0,
                    time_offset: 0.0,
                },
                TrackPoint {
                    index: 0,
                    label: 1,
                    frequency: 200.0,
                    amplitude: 0.1,
                    bandwidth: 0.0,
                    phase: 0.0,
                    time_offset: 0.0,
                },
            ],
        }];
        assert!(matches!(
            import_frames(&frames),
            Err(crate::error::Error::InvalidPartial(_))
        ));
    }

    #[test]
    fn rejects_bad_interval() {
        assert!(export_frames(&[], 0.0).is_err());
        assert!(export_frames(&[], f64::NAN).is_err());
    }
}
