//! Property-based tests for the segment header codec and the gap-holding
//! reassembly queue's delivery order under arbitrary arrival permutations.

use proptest::prelude::*;
use segment_manager::segment::{deserialize_header, serialize_header, SegmentHeader, SEG_HEADER_SIZE};
use segment_manager::queue::{EnqueueOutcome, SegmentQueue};
use segment_manager::Segment;

fn header_strategy() -> impl Strategy<Value = SegmentHeader> {
    (
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
        any::<i32>(),
        any::<i32>(),
    )
        .prop_map(
            |(seq_no, len, flag, send_start_ts_sec, send_start_ts_usec)| SegmentHeader {
                seq_no,
                len,
                flag,
                send_start_ts_sec,
                send_start_ts_usec,
            },
        )
}

proptest! {
    #[test]
    fn header_roundtrips_for_any_field_values(header in header_strategy()) {
        let mut buf = [0u8; SEG_HEADER_SIZE];
        serialize_header(&header, &mut buf);
        let decoded = deserialize_header(&buf).unwrap();
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn deserialize_never_panics_on_short_input(len in 0usize..SEG_HEADER_SIZE) {
        let buf = vec![0u8; len];
        prop_assert!(deserialize_header(&buf).is_none());
    }

    #[test]
    fn reassembly_queue_delivers_in_order_regardless_of_arrival_permutation(
        perm in prop::collection::vec(0u32..32, 32..33)
            .prop_filter("must be a permutation of 0..32", |v| {
                let mut sorted = v.clone();
                sorted.sort_unstable();
                sorted == (0u32..32).collect::<Vec<_>>()
            })
    ) {
        let mut q = SegmentQueue::new();
        let mut delivered = Vec::new();

        for &seq in &perm {
            let mut seg = Segment::zeroed();
            seg.seq_no = seq;
            if matches!(q.enqueue(seg), EnqueueOutcome::Inserted { continuous: true }) {
                while let Some(d) = q.dequeue() {
                    delivered.push(d.seq_no);
                }
            }
        }

        prop_assert_eq!(delivered, (0u32..32).collect::<Vec<_>>());
    }
}
