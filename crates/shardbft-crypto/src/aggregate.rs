//! Aggregation helpers tying commits, keys, and responses into a collective
//! Schnorr signature.
//!
//! These are thin, explicit wrappers over the per-type `aggregate` methods
//! so the consensus core has one place documenting the "pure function with
//! an explicit initialization predicate" contract it depends on: every
//! aggregate here either returns a well-formed, non-identity value or an
//! error — it never returns a silently-degenerate zero/identity result.

use crate::challenge::Challenge;
use crate::commit::CommitPoint;
use crate::error::Result;
use crate::public_key::PublicKey;
use crate::response::Response;
use crate::signature::Signature;

/// Aggregates commit points by elliptic-curve addition.
///
/// # Errors
///
/// Returns an error if `points` is empty or the sum is the group identity.
pub fn aggregate_commits(points: &[CommitPoint]) -> Result<CommitPoint> {
    CommitPoint::aggregate(points)
}

/// Aggregates public keys by elliptic-curve addition.
///
/// # Errors
///
/// Returns an error if `keys` is empty or the sum is the group identity.
pub fn aggregate_keys(keys: &[PublicKey]) -> Result<PublicKey> {
    PublicKey::aggregate(keys)
}

/// Aggregates responses by scalar addition modulo the group order.
///
/// # Errors
///
/// Returns an error if `responses` is empty.
pub fn aggregate_responses(responses: &[Response]) -> Result<Response> {
    Response::aggregate(responses)
}

/// Derives the Schnorr challenge `H(message || agg_commit || agg_key)`.
#[must_use]
pub fn derive_challenge(message: &[u8], agg_commit: &CommitPoint, agg_key: &PublicKey) -> Challenge {
    Challenge::derive(message, agg_commit, agg_key)
}

/// Verifies a collective signature `(challenge, agg_response)` over `message`
/// under the aggregated public key `agg_key`.
///
/// # Errors
///
/// Returns an error if the signature does not verify under the aggregated key.
pub fn verify_collective(message: &[u8], agg_key: &PublicKey, signature: &Signature) -> Result<()> {
    agg_key.verify(message, signature)
}
