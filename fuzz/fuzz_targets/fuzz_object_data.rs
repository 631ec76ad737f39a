//! Fuzz target for loose object decoding.
//!
//! Tests that the object, tree and commit decoders handle arbitrary input
//! without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use minigit_storage::{Commit, Object, Tree};

fuzz_target!(|data: &[u8]| {
    if let Ok(object) = Object::decode(data) {
        let _ = object.size();
    }

    let _ = Tree::decode(data.to_vec());
    let _ = Commit::decode(data.to_vec());
});
