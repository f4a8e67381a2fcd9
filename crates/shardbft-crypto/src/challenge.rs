//! Schnorr challenge scalar: `H(message || aggregated_commit || aggregated_key)`.

use crate::commit::CommitPoint;
use crate::error::{CryptoError, Result};
use crate::public_key::{challenge_scalar, PublicKey};
use k256::elliptic_curve::PrimeField;
use k256::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The challenge scalar binding a message to an aggregated commit and key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Challenge(Scalar);

impl Challenge {
    /// The length of a challenge in bytes.
    pub const LEN: usize = 32;

    /// Derives the challenge for `message` under the given aggregated commit
    /// point and aggregated public key, per `H(message || agg_commit || agg_key)`.
    #[must_use]
    pub fn derive(message: &[u8], agg_commit: &CommitPoint, agg_key: &PublicKey) -> Self {
        let scalar = challenge_scalar(message, &agg_commit.as_bytes(), &agg_key.as_bytes());
        Self(scalar)
    }

    pub(crate) fn as_scalar(&self) -> Scalar {
        self.0
    }

    /// Creates a challenge from a big-endian scalar byte encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::InvalidLength {
                what: "Challenge",
                expected: Self::LEN,
                got: bytes.len(),
            });
        }
        let mut repr = k256::FieldBytes::default();
        repr.copy_from_slice(bytes);
        let scalar = Option::<Scalar>::from(Scalar::from_repr(repr))
            .ok_or_else(|| CryptoError::InvalidScalar("out of range".into()))?;
        Ok(Self(scalar))
    }

    /// Returns the big-endian byte encoding of this challenge scalar.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Challenge({}...)", hex::encode(&self.as_bytes()[..8]))
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl Serialize for Challenge {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.as_bytes()))
        } else {
            serializer.serialize_bytes(&self.as_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for Challenge {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            Challenge::from_bytes(&bytes).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            Challenge::from_bytes(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::Keypair;
    use rand::rngs::OsRng;

    #[test]
    fn challenge_deterministic() {
        let kp = Keypair::generate();
        let (_secret, commit) = CommitPoint::generate(&mut OsRng);
        let key = kp.public_key();

        let c1 = Challenge::derive(b"hello", &commit, &key);
        let c2 = Challenge::derive(b"hello", &commit, &key);
        assert_eq!(c1, c2);
    }

    #[test]
    fn challenge_roundtrip() {
        let kp = Keypair::generate();
        let (_secret, commit) = CommitPoint::generate(&mut OsRng);
        let key = kp.public_key();
        let c = Challenge::derive(b"hello", &commit, &key);
        let bytes = c.as_bytes();
        assert_eq!(Challenge::from_bytes(&bytes).unwrap(), c);
    }
}
