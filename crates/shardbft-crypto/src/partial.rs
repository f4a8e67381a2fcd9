//! Per-participant response verification.
//!
//! Before a response is folded into an aggregate, the aggregator checks it
//! individually against the round's shared challenge, so one bad
//! contribution can be rejected without poisoning the whole aggregate.

use crate::challenge::Challenge;
use crate::commit::CommitPoint;
use crate::error::{CryptoError, Result};
use crate::public_key::PublicKey;
use crate::response::Response;
use k256::ProjectivePoint;

/// Verifies that `response` is the correct Schnorr response for
/// `commit_point` under `public_key` and the shared `challenge`:
/// `response * G == commit_point + challenge * public_key`.
///
/// # Errors
///
/// Returns an error if the check fails.
pub fn verify_partial_response(
    response: &Response,
    challenge: &Challenge,
    commit_point: &CommitPoint,
    public_key: &PublicKey,
) -> Result<()> {
    let lhs = ProjectivePoint::GENERATOR * response.as_scalar();
    let rhs = commit_point.as_projective() + public_key.as_projective() * challenge.as_scalar();
    if lhs == rhs {
        Ok(())
    } else {
        Err(CryptoError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::Keypair;
    use rand::rngs::OsRng;

    #[test]
    fn partial_response_verifies_for_honest_party() {
        let kp = Keypair::generate();
        let (secret, commit) = CommitPoint::generate(&mut OsRng);
        let message = b"round one";
        let challenge = Challenge::derive(message, &commit, &kp.public_key());
        let response = Response::from_scalar(secret + challenge.as_scalar() * kp.secret_scalar());

        assert!(verify_partial_response(&response, &challenge, &commit, &kp.public_key()).is_ok());
    }

    #[test]
    fn partial_response_rejects_wrong_commit_point() {
        let kp = Keypair::generate();
        let (secret, commit) = CommitPoint::generate(&mut OsRng);
        let (_other_secret, other_commit) = CommitPoint::generate(&mut OsRng);
        let message = b"round one";
        let challenge = Challenge::derive(message, &commit, &kp.public_key());
        let response = Response::from_scalar(secret + challenge.as_scalar() * kp.secret_scalar());

        assert!(verify_partial_response(&response, &challenge, &other_commit, &kp.public_key()).is_err());
    }
}
