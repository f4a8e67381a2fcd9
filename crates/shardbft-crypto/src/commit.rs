//! Commit points: per-round Schnorr nonce commitments over secp256k1.

use crate::error::{CryptoError, Result};
use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A commitment point `r * G` for a fresh per-round secret scalar `r`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommitPoint(ProjectivePoint);

impl CommitPoint {
    /// The length of a commit point in compressed SEC1 bytes.
    pub const LEN: usize = 33;

    /// Generates a fresh random commit secret and its commit point.
    #[must_use]
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> (Scalar, Self) {
        loop {
            let secret: Scalar = k256::elliptic_curve::Field::random(&mut *rng);
            if bool::from(<Scalar as k256::elliptic_curve::Field>::is_zero(&secret)) {
                continue;
            }
            let point = ProjectivePoint::GENERATOR * secret;
            return (secret, Self(point));
        }
    }

    /// Creates a commit point from a projective point, rejecting the identity.
    pub(crate) fn from_projective(point: ProjectivePoint) -> Result<Self> {
        if bool::from(point.is_identity()) {
            return Err(CryptoError::UninitializedAggregate("commit point"));
        }
        Ok(Self(point))
    }

    /// Returns the underlying projective point.
    pub(crate) fn as_projective(&self) -> ProjectivePoint {
        self.0
    }

    /// Creates a commit point from compressed SEC1 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid, non-identity point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::InvalidLength {
                what: "CommitPoint",
                expected: Self::LEN,
                got: bytes.len(),
            });
        }
        let encoded = EncodedPoint::from_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPoint(e.to_string()))?;
        let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or_else(|| CryptoError::InvalidPoint("point not on curve".into()))?;
        let point = ProjectivePoint::from(affine);
        if bool::from(point.is_identity()) {
            return Err(CryptoError::InvalidPoint("identity point".into()));
        }
        Ok(Self(point))
    }

    /// Returns the compressed SEC1 byte encoding of this commit point.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; Self::LEN] {
        let encoded = self.0.to_affine().to_encoded_point(true);
        let mut out = [0u8; Self::LEN];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Sums a set of commit points via elliptic-curve point addition.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or the sum is the identity.
    pub fn aggregate<'a, I: IntoIterator<Item = &'a CommitPoint>>(points: I) -> Result<Self> {
        let mut acc = ProjectivePoint::IDENTITY;
        let mut any = false;
        for p in points {
            acc += p.0;
            any = true;
        }
        if !any || bool::from(acc.is_identity()) {
            return Err(CryptoError::UninitializedAggregate("aggregated commit"));
        }
        Ok(Self(acc))
    }
}

impl fmt::Debug for CommitPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitPoint({}...)", hex::encode(&self.as_bytes()[..8]))
    }
}

impl fmt::Display for CommitPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl Serialize for CommitPoint {
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

impl<'de> Deserialize<'de> for CommitPoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            CommitPoint::from_bytes(&bytes).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            CommitPoint::from_bytes(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn commit_point_roundtrip() {
        let (_secret, point) = CommitPoint::generate(&mut OsRng);
        let bytes = point.as_bytes();
        let point2 = CommitPoint::from_bytes(&bytes).unwrap();
        assert_eq!(point, point2);
    }

    #[test]
    fn commit_point_aggregate_commutes() {
        let (_s1, p1) = CommitPoint::generate(&mut OsRng);
        let (_s2, p2) = CommitPoint::generate(&mut OsRng);
        let (_s3, p3) = CommitPoint::generate(&mut OsRng);

        let a = CommitPoint::aggregate([&p1, &p2, &p3]).unwrap();
        let b = CommitPoint::aggregate([&p3, &p1, &p2]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn commit_point_aggregate_empty_fails() {
        assert!(CommitPoint::aggregate(Vec::<&CommitPoint>::new()).is_err());
    }

    #[test]
    fn commit_point_rejects_wrong_length() {
        assert!(CommitPoint::from_bytes(&[0u8; 10]).is_err());
    }
}
