//! secp256k1 keypair generation, single-party signing, and verification.

use crate::commit::CommitPoint;
use crate::error::{CryptoError, Result};
use crate::public_key::{challenge_scalar, PublicKey};
use crate::signature::Signature;
use crate::{Challenge, Response};
use k256::elliptic_curve::Field;
use k256::{ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// A secp256k1 keypair for signing and verification.
pub struct Keypair {
    secret: Zeroizing<Scalar>,
}

impl Keypair {
    /// Generates a new random keypair.
    #[must_use]
    pub fn generate() -> Self {
        loop {
            let secret = Scalar::random(&mut OsRng);
            if !bool::from(Field::is_zero(&secret)) {
                return Self {
                    secret: Zeroizing::new(secret),
                };
            }
        }
    }

    /// Creates a keypair from a raw 32-byte secret scalar.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not encode a valid nonzero scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidLength {
                what: "secret key",
                expected: 32,
                got: bytes.len(),
            });
        }
        let mut repr = k256::FieldBytes::default();
        repr.copy_from_slice(bytes);
        let secret = Option::<Scalar>::from(k256::elliptic_curve::PrimeField::from_repr(repr))
            .ok_or_else(|| CryptoError::InvalidScalar("out of range".into()))?;
        if bool::from(Field::is_zero(&secret)) {
            return Err(CryptoError::InvalidScalar("zero secret".into()));
        }
        Ok(Self {
            secret: Zeroizing::new(secret),
        })
    }

    /// Returns the public key for this keypair.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        let point = ProjectivePoint::GENERATOR * *self.secret;
        PublicKey::from_affine(point.to_affine())
            .expect("generator times nonzero scalar is never the identity")
    }

    /// Returns the secret scalar.
    pub(crate) fn secret_scalar(&self) -> Scalar {
        *self.secret
    }

    /// Signs `message` with a fresh single-party Schnorr signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        let (nonce, commit) = CommitPoint::generate(&mut OsRng);
        let public = self.public_key();
        let challenge = Challenge::derive(message, &commit, &public);
        let response = nonce + challenge.as_scalar() * *self.secret;
        Signature::new(challenge, Response::from_scalar(response))
    }

    /// Verifies a signature this keypair produced, as a convenience over
    /// `PublicKey::verify`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not verify.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        self.public_key().verify(message, signature)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self {
            secret: Zeroizing::new(*self.secret),
        }
    }
}

/// Verifies a Schnorr signature `(challenge, response)` under `public` over
/// `message`: recomputes `R' = response*G - challenge*public` and checks
/// `challenge == H(message || R' || public)`.
pub(crate) fn verify_schnorr(
    message: &[u8],
    signature: &Signature,
    public: &PublicKey,
) -> Result<()> {
    let response = signature.response().as_scalar();
    let challenge = signature.challenge().as_scalar();

    let recovered = ProjectivePoint::GENERATOR * response - public.as_projective() * challenge;
    let recovered_point =
        CommitPoint::from_projective(recovered).map_err(|_| CryptoError::InvalidSignature)?;

    let expected = challenge_scalar(message, &recovered_point.as_bytes(), &public.as_bytes());
    if expected == challenge {
        Ok(())
    } else {
        Err(CryptoError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::elliptic_curve::PrimeField;
    use pretty_assertions::assert_eq;

    #[test]
    fn keypair_generate_distinct() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn keypair_sign_verify() {
        let kp = Keypair::generate();
        let message = b"hello shardbft";
        let sig = kp.sign(message);
        assert!(kp.verify(message, &sig).is_ok());
    }

    #[test]
    fn keypair_wrong_message_fails() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"message one");
        assert!(kp.verify(b"message two", &sig).is_err());
    }

    #[test]
    fn keypair_wrong_key_fails() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let sig = kp1.sign(b"hello");
        assert!(kp2.verify(b"hello", &sig).is_err());
    }

    #[test]
    fn keypair_from_secret_roundtrips_public_key() {
        let kp1 = Keypair::generate();
        let bytes = kp1.secret_scalar().to_bytes();
        let kp2 = Keypair::from_secret_bytes(&bytes).unwrap();
        assert_eq!(kp1.public_key(), kp2.public_key());
    }
}
