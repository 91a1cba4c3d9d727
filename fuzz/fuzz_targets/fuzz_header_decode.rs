#![no_main]

use libfuzzer_sys::fuzz_target;
use segment_manager::segment::deserialize_header;

/// The header decoder must never panic on any input; short or malformed
/// buffers return `None`.
fuzz_target!(|data: &[u8]| {
    let _ = deserialize_header(data);
});
