//! Fuzz target for the consensus wire frame codec.
//!
//! Tests that `Frame::decode` handles arbitrary input without panicking, for
//! any class/instruction byte prefix and any type byte that follows it.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = shardbft_consensus::Frame::decode(data);
});
