//! Fuzz target for pkt-line parsing.
//!
//! Tests that the pkt-line reader handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut reader = minigit_transfer::PktLineReader::new(Cursor::new(data));

    // Bounded so crafted input cannot spin forever
    for _ in 0..100 {
        match reader.read() {
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => break,
        }
    }
});
