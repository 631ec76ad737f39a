//! Fuzz target for delta application.
//!
//! Tests that applying an arbitrary delta to an arbitrary base never panics
//! and never produces a result of the wrong size.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    base: Vec<u8>,
    delta: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let _ = minigit_transfer::apply_delta(&input.base, &input.delta);
});
