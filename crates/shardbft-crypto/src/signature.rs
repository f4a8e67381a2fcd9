//! Schnorr signature: the pair `(challenge, aggregated_response)`.

use crate::challenge::Challenge;
use crate::error::{CryptoError, Result};
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Schnorr (collective or single-party) signature: `(challenge, response)`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    challenge: Challenge,
    response: Response,
}

impl Signature {
    /// The length of a signature in bytes (32-byte challenge + 32-byte response).
    pub const LEN: usize = 64;

    /// Creates a signature from its challenge and response components.
    #[must_use]
    pub fn new(challenge: Challenge, response: Response) -> Self {
        Self {
            challenge,
            response,
        }
    }

    /// Returns the challenge component.
    #[must_use]
    pub fn challenge(&self) -> Challenge {
        self.challenge
    }

    /// Returns the response component.
    #[must_use]
    pub fn response(&self) -> Response {
        self.response
    }

    /// Creates a signature from its 64-byte wire encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 64 bytes or either half
    /// does not decode to a valid scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::InvalidLength {
                what: "Signature",
                expected: Self::LEN,
                got: bytes.len(),
            });
        }
        let challenge = Challenge::from_bytes(&bytes[..32])?;
        let response = Response::from_bytes(&bytes[32..])?;
        Ok(Self {
            challenge,
            response,
        })
    }

    /// Returns the 64-byte wire encoding of this signature.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..32].copy_from_slice(&self.challenge.as_bytes());
        out[32..].copy_from_slice(&self.response.as_bytes());
        out
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.as_bytes()[..8]))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl Serialize for Signature {
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

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            Signature::from_bytes(&bytes).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            Signature::from_bytes(&bytes).map_err(serde::de::Error::custom)
        }
    }
}
