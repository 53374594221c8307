//! Bandwidth-enhanced additive synthesis.

pub mod oscillator;
pub mod synthesizer;

pub use oscillator::Oscillator;
pub use synthesizer::{Synthesizer, SynthesizerConfig};
