//! Reassigned bandwidth-enhanced additive sound modeling.
//!
//! A sound is modeled as a set of [`Partial`]s: time-varying sinusoids,
//! each carrying a noise-energy (bandwidth) fraction. The crate covers
//! the four activities over that representation:
//!
//! - **analysis** — [`analysis::Analyzer`] converts samples into partials
//!   by reassigned short-time spectral analysis;
//! - **manipulation** — [`ops`] channelizes, distills, collates, sifts,
//!   morphs, dilates, resamples, crops, and scales partial lists;
//! - **synthesis** — [`synth::Synthesizer`] renders partials back to
//!   samples with phase-accurate bandwidth-enhanced oscillators;
//! - **persistence** — [`interchange`] exposes the frame representation
//!   that external codecs serialize.
//!
//! ```no_run
//! use filament::analysis::Analyzer;
//! use filament::synth::Synthesizer;
//!
//! # fn main() -> filament::Result<()> {
//! # let samples = vec![0.0f64; 44_100];
//! let mut analyzer = Analyzer::with_window_width(300.0, 400.0)?;
//! analyzer.analyze(&samples, 44_100.0)?;
//!
//! let mut rendered = Vec::new();
//! Synthesizer::new(44_100.0)?.synthesize(analyzer.partials(), &mut rendered)?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod core;
pub mod error;
pub mod interchange;
pub mod model;
pub mod ops;
pub mod synth;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use model::{Breakpoint, Envelope, LinearEnvelope, Partial, PartialList};

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
