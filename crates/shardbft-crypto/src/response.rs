//! Schnorr response scalar: `r + challenge * privkey mod q`.

use crate::error::{CryptoError, Result};
use k256::elliptic_curve::{Field, PrimeField};
use k256::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Schnorr response scalar.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Response(Scalar);

impl Response {
    /// The length of a response in bytes.
    pub const LEN: usize = 32;

    pub(crate) fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar)
    }

    pub(crate) fn as_scalar(&self) -> Scalar {
        self.0
    }

    /// Creates a response from a big-endian scalar byte encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid length or out of range.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::InvalidLength {
                what: "Response",
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

    /// Returns the big-endian byte encoding of this response scalar.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    /// Sums a set of responses modulo the group order.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty.
    pub fn aggregate<'a, I: IntoIterator<Item = &'a Response>>(responses: I) -> Result<Self> {
        let mut acc = Scalar::ZERO;
        let mut any = false;
        for r in responses {
            acc += r.0;
            any = true;
        }
        if !any {
            return Err(CryptoError::UninitializedAggregate("aggregated response"));
        }
        Ok(Self(acc))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Response({}...)", hex::encode(&self.as_bytes()[..8]))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl Serialize for Response {
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

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            Response::from_bytes(&bytes).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            Response::from_bytes(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_aggregate_commutes() {
        let a = Response::from_scalar(Scalar::from(3u64));
        let b = Response::from_scalar(Scalar::from(5u64));
        let c = Response::from_scalar(Scalar::from(7u64));

        let agg1 = Response::aggregate([&a, &b, &c]).unwrap();
        let agg2 = Response::aggregate([&c, &b, &a]).unwrap();
        assert_eq!(agg1, agg2);
        assert_eq!(agg1.as_scalar(), Scalar::from(15u64));
    }

    #[test]
    fn response_roundtrip() {
        let r = Response::from_scalar(Scalar::from(42u64));
        let bytes = r.as_bytes();
        assert_eq!(Response::from_bytes(&bytes).unwrap(), r);
    }

    #[test]
    fn response_aggregate_empty_fails() {
        assert!(Response::aggregate(Vec::<&Response>::new()).is_err());
    }
}
