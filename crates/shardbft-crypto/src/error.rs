//! Error types for crypto operations.

use thiserror::Error;

/// Errors that can occur during crypto operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A fixed-width byte type was constructed from the wrong number of bytes.
    #[error("invalid length for {what}: expected {expected}, got {got}")]
    InvalidLength {
        /// Name of the type being constructed.
        what: &'static str,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length supplied.
        got: usize,
    },

    /// Bytes did not decode to a valid secp256k1 point.
    #[error("invalid curve point: {0}")]
    InvalidPoint(String),

    /// Bytes did not decode to a valid scalar (or decoded to zero where a
    /// nonzero scalar is required).
    #[error("invalid scalar: {0}")]
    InvalidScalar(String),

    /// An aggregate (of commits, keys, or responses) evaluated to the
    /// group identity or otherwise failed its initialization predicate.
    #[error("uninitialized aggregate: {0}")]
    UninitializedAggregate(&'static str),

    /// Signature verification failed.
    #[error("signature verification failed")]
    InvalidSignature,

    /// Key generation or signing failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}

/// A specialized Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
