//! Error taxonomy shared by every component.

use thiserror::Error;

/// Errors surfaced by analysis, manipulation, synthesis, and interchange.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration value outside its legal range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Breakpoint insertion or partial mutation that would break the
    /// partial invariants (duplicate time, negative frequency or
    /// amplitude, bandwidth outside [0,1], non-finite parameter).
    #[error("invalid partial: {0}")]
    InvalidPartial(String),

    /// Index or time outside a partial's range where a valid one is
    /// required.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// I/O failure surfaced from an external codec collaborator.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Non-finite value produced by a numeric kernel. Analysis recovers
    /// from these locally by dropping the offending peak; this variant is
    /// surfaced only where no local recovery exists.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_partial(msg: impl Into<String>) -> Self {
        Error::InvalidPartial(msg.into())
    }
}
