//! Participation bitmaps over a fixed-size committee.

use bitvec::order::Lsb0;
use bitvec::vec::BitVec;
use std::fmt;
use thiserror::Error;

/// Errors decoding a wire bitmap.
#[derive(Debug, Error)]
pub enum BitmapError {
    /// The length-prefix byte count did not match the body length.
    #[error("bitmap length mismatch: prefix says {declared_bits} bits ({expected_bytes} bytes), got {got_bytes} bytes")]
    LengthMismatch {
        /// Declared bit length.
        declared_bits: u16,
        /// Bytes implied by the declared bit length.
        expected_bytes: usize,
        /// Bytes actually present.
        got_bytes: usize,
    },
    /// Fewer than 2 bytes were available for the length prefix.
    #[error("bitmap too short for length prefix")]
    TooShort,
}

/// A participation bitmap over committee indices `0..N`.
///
/// Bit `i` set means backup index `i` participated. Matches the wire layout
/// of §4.1: a 2-byte bit-length prefix followed by `ceil(N / 8)` bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ParticipantBitmap {
    bits: BitVec<u8, Lsb0>,
}

impl ParticipantBitmap {
    /// Creates an all-unset bitmap of size `n`.
    #[must_use]
    pub fn zeroed(n: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, n),
        }
    }

    /// Total number of committee slots this bitmap covers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` if this bitmap covers zero slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Returns whether index `i` is set.
    #[must_use]
    pub fn get(&self, i: usize) -> bool {
        self.bits.get(i).map(|b| *b).unwrap_or(false)
    }

    /// Sets index `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    pub fn set(&mut self, i: usize) {
        self.bits.set(i, true);
    }

    /// Number of set bits.
    #[must_use]
    pub fn popcount(&self) -> usize {
        self.bits.count_ones()
    }

    /// Iterates the indices of set bits, in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    /// Encodes this bitmap in the wire format: 2-byte bit-length (big-endian)
    /// then `ceil(len / 8)` bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let len = self.bits.len() as u16;
        let mut out = Vec::with_capacity(2 + self.bits.as_raw_slice().len());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(self.bits.as_raw_slice());
        out
    }

    /// Decodes a bitmap from its wire format, returning the bitmap and the
    /// number of bytes consumed from `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is shorter than the declared length.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), BitmapError> {
        if data.len() < 2 {
            return Err(BitmapError::TooShort);
        }
        let declared_bits = u16::from_be_bytes([data[0], data[1]]);
        let byte_len = (declared_bits as usize).div_ceil(8);
        if data.len() < 2 + byte_len {
            return Err(BitmapError::LengthMismatch {
                declared_bits,
                expected_bytes: byte_len,
                got_bytes: data.len().saturating_sub(2),
            });
        }
        let raw = &data[2..2 + byte_len];
        let mut bits: BitVec<u8, Lsb0> = BitVec::from_slice(raw);
        bits.truncate(declared_bits as usize);
        Ok((Self { bits }, 2 + byte_len))
    }
}

impl fmt::Debug for ParticipantBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantBitmap(")?;
        for i in 0..self.len() {
            write!(f, "{}", u8::from(self.get(i)))?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_and_get() {
        let mut bm = ParticipantBitmap::zeroed(10);
        bm.set(3);
        bm.set(7);
        assert!(bm.get(3));
        assert!(bm.get(7));
        assert!(!bm.get(0));
        assert_eq!(bm.popcount(), 2);
        assert_eq!(bm.iter_set().collect::<Vec<_>>(), vec![3, 7]);
    }

    #[test]
    fn wire_roundtrip() {
        let mut bm = ParticipantBitmap::zeroed(13);
        bm.set(0);
        bm.set(12);
        let encoded = bm.encode();
        let (decoded, consumed) = ParticipantBitmap::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, bm);
    }

    #[test]
    fn decode_rejects_truncated_body() {
        let bm = ParticipantBitmap::zeroed(20);
        let mut encoded = bm.encode();
        encoded.truncate(encoded.len() - 1);
        assert!(ParticipantBitmap::decode(&encoded).is_err());
    }

    #[test]
    fn decode_rejects_missing_prefix() {
        assert!(ParticipantBitmap::decode(&[0u8]).is_err());
    }
}
