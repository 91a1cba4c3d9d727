#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use segment_manager::segment::SEG_PAYLOAD_SIZE;
use segment_manager::{NullProtocolParser, Segment, SegmentManager, SegmentManagerConfig};

/// Feed arbitrary bytes in as a segment payload through `enqueue_received`
/// and drain with `recv`. Must never panic regardless of segment content,
/// including on segments whose declared `len` exceeds what was written.
fuzz_target!(|data: &[u8]| {
    let mgr = SegmentManager::new(SegmentManagerConfig::default(), Arc::new(NullProtocolParser));

    let mut seg = Segment::zeroed();
    let len = data.len().min(SEG_PAYLOAD_SIZE);
    seg.set_payload(&data[..len]);
    seg.seq_no = 0;

    mgr.enqueue_received(seg);
    let _ = mgr.recv(false);
});
