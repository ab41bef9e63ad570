//! Fuzz target for hardware ID property decoding.
//!
//! Feeds arbitrary bytes to the NUL-separated multi-string splitter.

#![no_main]

use driverfetch::hwid::fuzz_split_multi_sz;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = fuzz_split_multi_sz(data);
});
