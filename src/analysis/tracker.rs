//! Frame-to-frame partial tracking.
//!
//! Peaks are claimed by live partials in order of decreasing amplitude
//! (the specified tie-break): each peak takes the nearest-in-frequency
//! unclaimed partial within the drift bound, otherwise it founds a new
//! partial. Live partials idle for longer than the crop time retire.

use crate::analysis::peaks::SpectralPeak;
use crate::model::{Breakpoint, Partial, PartialList};

#[derive(Debug)]
struct LiveTrack {
    partial: Partial,
    last_time: f64,
    last_frequency: f64,
    /// Creation order, used to emit partials in birth order.
    birth: usize,
}

#[derive(Debug)]
pub struct PartialTracker {
    freq_drift: f64,
    crop_time: f64,
    live: Vec<LiveTrack>,
    retired: Vec<LiveTrack>,
    births: usize,
    dropped: usize,
}

impl PartialTracker {
    pub fn new(freq_drift: f64, crop_time: f64) -> Self {
        Self {
            freq_drift,
            crop_time,
            live: Vec::new(),
            retired: Vec::new(),
            births: 0,
            dropped: 0,
        }
    }

    /// Peaks whose reassigned time failed to advance their partial and
    /// were therefore discarded.
    pub fn dropped_peaks(&self) -> usize {
        self.dropped
    }

    /// Assign one frame's peaks to live partials.
    pub fn track_frame(&mut self, peaks: &[SpectralPeak], frame_time: f64) {
        // Retire tracks that have been idle too long.
        let crop = self.crop_time;
        let mut i = 0;
        while i < self.live.len() {
            if frame_time - self.live[i].last_time > crop {
                let track = self.live.swap_remove(i);
                self.retired.push(track);
            } else {
                i += 1;
            }
        }

        // Louder peaks choose first.
        let mut order: Vec<usize> = (0..peaks.len()).collect();
        order.sort_by(|&a, &b| peaks[b].amplitude.total_cmp(&peaks[a].amplitude));

        let mut claimed = vec![false; self.live.len()];
        for peak_idx in order {
            let peak = &peaks[peak_idx];
            let mut best: Option<(usize, f64)> = None;
            for (j, track) in self.live.iter().enumerate() {
                if claimed[j] {
                    continue;
                }
                let dist = (peak.frequency - track.last_frequency).abs();
                if dist > self.freq_drift {
                    continue;
                }
                if best.map_or(true, |(_, d)| dist < d) {
                    best = Some((j, dist));
                }
            }

            match best {
                Some((j, _)) => {
                    claimed[j] = true;
                    self.append(j, peak);
                }
                None => {
                    let mut partial = Partial::new();
                    // A peak that fails insertion here is unrepresentable;
                    // times on a fresh partial always advance.
                    let _ = partial.push_point(peak.time, breakpoint_of(peak));
                    self.live.push(LiveTrack {
                        partial,
                        last_time: peak.time,
                        last_frequency: peak.frequency,
                        birth: self.births,
                    });
                    claimed.push(true);
                    self.births += 1;
                }
            }
        }
    }

    fn append(&mut self, track_idx: usize, peak: &SpectralPeak) {
        let track = &mut self.live[track_idx];
        if peak.time <= track.last_time {
            // Reassignment can step backwards across frames; a breakpoint
            // time must not.
            self.dropped += 1;
            track.last_frequency = peak.frequency;
            return;
        }
        match track.partial.push_point(peak.time, breakpoint_of(peak)) {
            Ok(()) => {
                track.last_time = peak.time;
                track.last_frequency = peak.frequency;
            }
            Err(_) => self.dropped += 1,
        }
    }

    /// Close every live partial and return all tracked partials in birth
    /// order.
    pub fn finish(mut self) -> PartialList {
        self.retired.append(&mut self.live);
        self.retired.sort_by_key(|t| t.birth);
        self.retired.into_iter().map(|t| t.partial).collect()
    }
}

fn breakpoint_of(peak: &SpectralPeak) -> Breakpoint {
    Breakpoint::new(
        peak.frequency,
        peak.amplitude,
        peak.bandwidth.clamp(0.0, 1.0),
        peak.phase,
    )
}
