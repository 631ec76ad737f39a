//! Fuzz target for smart-HTTP responses.
//!
//! Tests that ref advertisement and upload-pack response parsing handle
//! arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use minigit_transfer::{split_pack_response, RefDiscovery};

fuzz_target!(|data: &[u8]| {
    if let Ok(discovery) = RefDiscovery::parse(data) {
        let _ = discovery.symref_target();
    }
    let _ = split_pack_response(data);
});
