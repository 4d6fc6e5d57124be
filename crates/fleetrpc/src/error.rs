//! # Error Definitions
//!
//! The central ledger of codec and protocol failures.

/// Failures while encoding or decoding rpc payloads.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The underlying buffer read or write failed (e.g., buffer exhaustion).
    #[error("buffer error: {0}")]
    Buffer(#[from] fleetpack::Error),
    /// A value tag byte is not part of the mapper's vocabulary.
    #[error("unknown value tag {0:#04x}")]
    UnknownValueTag(u8),
    /// The nested depth of a value exceeded the safety limit.
    #[error("value nesting exceeds {} levels", crate::value::MAX_NESTING_DEPTH)]
    NestingTooDeep,
    /// A decoded value does not have the requested type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: &'static str },
    /// A response carried a status byte we do not know.
    #[error("unknown response status {0:#04x}")]
    UnknownStatus(u8),
    /// A method descriptor could not be parsed.
    #[error("invalid method descriptor {descriptor:?}: {reason}")]
    InvalidDescriptor { descriptor: String, reason: &'static str },
    /// The message structure was malformed.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// A specialized Result type for rpc codec operations.
pub type Result<T> = std::result::Result<T, Error>;
