//! Fuzz target for pack file decoding.
//!
//! Tests that the pack parser handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use minigit_transfer::PackParser;

fuzz_target!(|data: &[u8]| {
    let _ = PackParser::new(data).parse();
});
