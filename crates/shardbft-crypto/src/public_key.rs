//! secp256k1 public key for Schnorr verification.

use crate::error::{CryptoError, Result};
use crate::signature::Signature;
use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(k256::AffinePoint);

impl PublicKey {
    /// The length of a public key in compressed SEC1 bytes.
    pub const LEN: usize = 33;

    /// Creates a public key from an affine point.
    pub(crate) fn from_affine(point: AffinePoint) -> Result<Self> {
        if bool::from(ProjectivePoint::from(point).is_identity()) {
            return Err(CryptoError::InvalidPoint("identity point".into()));
        }
        Ok(Self(point))
    }

    /// Returns the underlying projective point.
    pub(crate) fn as_projective(&self) -> ProjectivePoint {
        ProjectivePoint::from(self.0)
    }

    /// Creates a public key from compressed SEC1 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not represent a valid, non-identity
    /// point on the curve.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::InvalidLength {
                what: "PublicKey",
                expected: Self::LEN,
                got: bytes.len(),
            });
        }
        let encoded = EncodedPoint::from_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPoint(e.to_string()))?;
        let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or_else(|| CryptoError::InvalidPoint("point not on curve".into()))?;
        Self::from_affine(affine)
    }

    /// Returns the compressed SEC1 byte encoding of this public key.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; Self::LEN] {
        let encoded = self.0.to_encoded_point(true);
        let mut out = [0u8; Self::LEN];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Returns a short identifier (first 8 bytes as hex).
    #[must_use]
    pub fn short_id(&self) -> String {
        hex::encode(&self.as_bytes()[..8])
    }

    /// Sums a set of public keys via elliptic-curve point addition.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or the sum is the identity.
    pub fn aggregate<'a, I: IntoIterator<Item = &'a PublicKey>>(keys: I) -> Result<Self> {
        let mut acc = ProjectivePoint::IDENTITY;
        let mut any = false;
        for k in keys {
            acc += k.as_projective();
            any = true;
        }
        if !any || bool::from(acc.is_identity()) {
            return Err(CryptoError::UninitializedAggregate("aggregated key"));
        }
        Self::from_affine(acc.to_affine())
    }

    /// Verifies a single-party Schnorr signature over `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not verify.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        crate::keypair::verify_schnorr(message, signature, self)
    }
}

/// Computes the Schnorr challenge `H(message || agg_commit || agg_key) mod q`.
pub(crate) fn challenge_scalar(message: &[u8], agg_commit: &[u8], agg_key: &[u8]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.update(agg_commit);
    hasher.update(agg_key);
    let digest = hasher.finalize();
    let mut repr = k256::FieldBytes::default();
    repr.copy_from_slice(&digest);
    Scalar::reduce_bytes(&repr)
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short_id())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl Serialize for PublicKey {
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

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
        }
    }
}
