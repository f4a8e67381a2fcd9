//! # shardbft-crypto
//!
//! Schnorr multi-signature primitives over the secp256k1 group, used by
//! `shardbft-consensus` to aggregate per-participant commitments and
//! responses into a single collective signature.
//!
//! Every aggregate-producing function in this crate is a pure function with
//! an explicit initialization predicate: it returns `Ok` with a well-formed,
//! non-identity result, or `Err` — it never returns a silently degenerate
//! zero/identity value for the caller to trip over later.
//!
//! ## Example
//!
//! ```rust
//! use shardbft_crypto::Keypair;
//!
//! let keypair = Keypair::generate();
//! let message = b"propose block 42";
//! let signature = keypair.sign(message);
//! assert!(keypair.verify(message, &signature).is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod aggregate;
mod challenge;
mod commit;
mod error;
mod keypair;
mod nonce;
mod partial;
mod public_key;
mod response;
mod signature;

pub use aggregate::{
    aggregate_commits, aggregate_keys, aggregate_responses, derive_challenge, verify_collective,
};
pub use challenge::Challenge;
pub use commit::CommitPoint;
pub use error::{CryptoError, Result};
pub use keypair::Keypair;
pub use nonce::Nonce;
pub use partial::verify_partial_response;
pub use public_key::PublicKey;
pub use response::Response;
pub use signature::Signature;
