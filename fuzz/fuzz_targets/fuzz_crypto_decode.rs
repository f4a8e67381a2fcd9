//! Fuzz target for the fixed-width crypto byte newtypes.
//!
//! Tests that every `from_bytes` constructor on the curve-point and scalar
//! wrappers rejects malformed input cleanly rather than panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = shardbft_crypto::PublicKey::from_bytes(data);
    let _ = shardbft_crypto::Signature::from_bytes(data);
    let _ = shardbft_crypto::CommitPoint::from_bytes(data);
    let _ = shardbft_crypto::Response::from_bytes(data);
    let _ = shardbft_crypto::Challenge::from_bytes(data);
});
