//! # Manager statistics
//!
//! Monotonic counters observing send requests, queue lengths, and
//! reassembly completions, designed for JSON export the way
//! `strata-transport`'s `SenderStats`/`ReceiverStats` are (Prometheus
//! scraping itself is left to the embedding daemon, out of scope here).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters updated on the hot path. Snapshot into
/// [`ManagerStatsSnapshot`] for serialization.
#[derive(Default)]
pub struct ManagerStats {
    pub send_requests: AtomicU64,
    pub segments_sent_enqueued: AtomicU64,
    pub segments_received_enqueued: AtomicU64,
    pub messages_reassembled: AtomicU64,
    pub duplicates_dropped: AtomicU64,
    pub segments_reclaimed_by_ack: AtomicU64,
    pub segments_retransmitted: AtomicU64,
    pub free_pool_shrinks: AtomicU64,
}

impl ManagerStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn record_send_request(&self) {
        Self::bump(&self.send_requests, 1);
    }

    pub fn record_send_enqueued(&self, segments: u64) {
        Self::bump(&self.segments_sent_enqueued, segments);
    }

    pub fn record_recv_enqueued(&self) {
        Self::bump(&self.segments_received_enqueued, 1);
    }

    pub fn record_duplicate_dropped(&self) {
        Self::bump(&self.duplicates_dropped, 1);
    }

    pub fn record_message_reassembled(&self) {
        Self::bump(&self.messages_reassembled, 1);
    }

    pub fn record_reclaimed_by_ack(&self, count: u64) {
        Self::bump(&self.segments_reclaimed_by_ack, count);
    }

    pub fn record_retransmitted(&self, count: u64) {
        Self::bump(&self.segments_retransmitted, count);
    }

    pub fn record_free_pool_shrink(&self) {
        Self::bump(&self.free_pool_shrinks, 1);
    }

    pub fn snapshot(&self) -> ManagerStatsSnapshot {
        ManagerStatsSnapshot {
            send_requests: self.send_requests.load(Ordering::Relaxed),
            segments_sent_enqueued: self.segments_sent_enqueued.load(Ordering::Relaxed),
            segments_received_enqueued: self.segments_received_enqueued.load(Ordering::Relaxed),
            messages_reassembled: self.messages_reassembled.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            segments_reclaimed_by_ack: self.segments_reclaimed_by_ack.load(Ordering::Relaxed),
            segments_retransmitted: self.segments_retransmitted.load(Ordering::Relaxed),
            free_pool_shrinks: self.free_pool_shrinks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time, serializable copy of [`ManagerStats`].
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ManagerStatsSnapshot {
    pub send_requests: u64,
    pub segments_sent_enqueued: u64,
    pub segments_received_enqueued: u64,
    pub messages_reassembled: u64,
    pub duplicates_dropped: u64,
    pub segments_reclaimed_by_ack: u64,
    pub segments_retransmitted: u64,
    pub free_pool_shrinks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ManagerStats::new();
        stats.record_send_request();
        stats.record_send_enqueued(3);
        stats.record_recv_enqueued();
        stats.record_recv_enqueued();

        let snap = stats.snapshot();
        assert_eq!(snap.send_requests, 1);
        assert_eq!(snap.segments_sent_enqueued, 3);
        assert_eq!(snap.segments_received_enqueued, 2);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let stats = ManagerStats::new();
        stats.record_message_reassembled();
        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("\"messages_reassembled\":1"));
    }
}
