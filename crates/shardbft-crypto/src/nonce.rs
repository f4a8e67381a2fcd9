//! Per-round Schnorr nonces for multi-party aggregation.
//!
//! A party participating in a round of aggregate signing needs to hand out
//! its commit point before the challenge is known, then fold its secret
//! scalar into a response once the challenge arrives. `Nonce` models exactly
//! that two-step lifecycle without ever exposing the underlying scalar type
//! to callers outside this crate.

use crate::challenge::Challenge;
use crate::commit::CommitPoint;
use crate::keypair::Keypair;
use crate::response::Response;
use k256::Scalar;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// A fresh secret scalar and its commit point, generated once per round.
pub struct Nonce {
    secret: Zeroizing<Scalar>,
    commit: CommitPoint,
}

impl Nonce {
    /// Generates a fresh nonce.
    #[must_use]
    pub fn generate() -> Self {
        let (secret, commit) = CommitPoint::generate(&mut OsRng);
        Self {
            secret: Zeroizing::new(secret),
            commit,
        }
    }

    /// The commit point, safe to broadcast before the challenge is known.
    #[must_use]
    pub fn commit_point(&self) -> CommitPoint {
        self.commit
    }

    /// Computes the Schnorr response `secret + challenge * keypair.secret`
    /// once the challenge is known. Consumes the nonce so it cannot be
    /// reused for a second response.
    #[must_use]
    pub fn respond(self, challenge: &Challenge, keypair: &Keypair) -> Response {
        let response = *self.secret + challenge.as_scalar() * keypair.secret_scalar();
        Response::from_scalar(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate_commits, aggregate_keys, aggregate_responses, derive_challenge, verify_collective};
    use crate::signature::Signature;

    #[test]
    fn nonce_round_trip_two_party_aggregate() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let message = b"nonce aggregate";

        let nonce1 = Nonce::generate();
        let nonce2 = Nonce::generate();
        let commit1 = nonce1.commit_point();
        let commit2 = nonce2.commit_point();

        let agg_commit = aggregate_commits(&[commit1, commit2]).unwrap();
        let agg_key = aggregate_keys(&[kp1.public_key(), kp2.public_key()]).unwrap();
        let challenge = derive_challenge(message, &agg_commit, &agg_key);

        let resp1 = nonce1.respond(&challenge, &kp1);
        let resp2 = nonce2.respond(&challenge, &kp2);
        let agg_response = aggregate_responses(&[resp1, resp2]).unwrap();
        let signature = Signature::new(challenge, agg_response);

        assert!(verify_collective(message, &agg_key, &signature).is_ok());
    }
}
