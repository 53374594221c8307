//! Manipulations over partial lists.

pub mod channelizer;
pub mod collator;
pub mod cropper;
pub mod dilator;
pub mod distiller;
pub mod morpher;
pub mod resampler;
pub mod sieve;
pub mod utils;

pub use channelizer::Channelizer;
pub use collator::Collator;
pub use cropper::Cropper;
pub use dilator::Dilator;
pub use distiller::Distiller;
pub use morpher::Morpher;
pub use resampler::Resampler;
pub use sieve::Sieve;
