//! Fuzz target for topology snapshot parsing.
//!
//! This fuzzer feeds arbitrary UTF-8 input to the snapshot parser,
//! checking for panics, crashes, or hangs.

#![no_main]

use driverfetch::hwid::topology::fuzz_parse_snapshot;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let _ = fuzz_parse_snapshot(input);
});
