//! Consensus error types.

use thiserror::Error;

/// Errors that can occur during consensus operations.
///
/// These are only ever returned from host-facing entry points
/// (`start_consensus`, construction). Per-message rejection never surfaces
/// as an error; it is logged and silently dropped, per the wire protocol's
/// rejection contract.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// `start_consensus` was called outside state `INITIAL`.
    #[error("consensus already started for instance {0}")]
    AlreadyStarted(String),

    /// Signing the proposal or a response failed.
    #[error("signing failed: {0}")]
    Signing(#[from] shardbft_crypto::CryptoError),

    /// Aggregation over commits, keys, or responses produced an
    /// uninitialized (identity) result.
    #[error("aggregation failed for {0}")]
    Aggregation(&'static str),

    /// The committee did not contain `my_id`.
    #[error("own index {my_id} out of range for committee of size {committee_len}")]
    InvalidCommittee { my_id: u16, committee_len: usize },
}

/// A specialized Result type for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Why a single inbound frame was rejected. Used only for `tracing` fields;
/// never returned to callers (§7 of the design: per-message rejection is
/// silent from the caller's point of view).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The frame was too short, had an unknown type byte, or a malformed
    /// variable-length field (e.g. bad bitmap length).
    Malformed,
    /// `consensus_id` or `block_hash` did not match this instance.
    WrongInstance,
    /// `CheckStateMain` or `CheckStateSubset` rejected the action in the
    /// instance's current state.
    OutOfPhase,
    /// An embedded signature, response, or collective signature failed to
    /// verify.
    AuthFailure,
    /// The sender's index does not exist in the committee, or has already
    /// contributed in this round/subset.
    DuplicateOrUnknownSender,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::Malformed => "malformed",
            RejectReason::WrongInstance => "wrong_instance",
            RejectReason::OutOfPhase => "out_of_phase",
            RejectReason::AuthFailure => "auth_failure",
            RejectReason::DuplicateOrUnknownSender => "duplicate_or_unknown_sender",
        };
        f.write_str(s)
    }
}
