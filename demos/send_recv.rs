//! Minimal demo: segment a message, hand it across the send/receive
//! boundary, and reassemble it, using two threads to show the
//! condition-variable handoff in action.

use std::sync::Arc;
use std::thread;

use segment_manager::{NullProtocolParser, SegmentManager, SegmentManagerConfig};

fn main() {
    tracing_subscriber::fmt::init();

    let mgr = Arc::new(SegmentManager::new(
        SegmentManagerConfig::default(),
        Arc::new(NullProtocolParser),
    ));

    let sender = {
        let mgr = Arc::clone(&mgr);
        thread::spawn(move || loop {
            if let Some(seg) = mgr.dequeue_for_send() {
                mgr.enqueue_received(seg);
            } else {
                break;
            }
        })
    };

    mgr.send(b"hello from the segment manager demo", false).unwrap();
    let message = mgr.recv(false).unwrap();
    println!("reassembled: {}", String::from_utf8_lossy(&message));

    mgr.shutdown();
    sender.join().unwrap();
}
