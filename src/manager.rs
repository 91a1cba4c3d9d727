//! # Segment Manager
//!
//! The public facade: segmentation on send, priority-scheduled enqueue/
//! dequeue with condition-variable waits, reassembly on receive, and
//! sent/failed-segment bookkeeping. Everything else in this crate exists to
//! serve this type.
//!
//! The sending side has a single logical consumer view
//! (`SEND_CONTROL_OR_DATA`) that always prefers control over data; the
//! receiving side exposes two independent consumer views (`RECV_CONTROL`,
//! `RECV_DATA`). See spec §4.7 for the exact coordination contract this
//! mirrors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::config::SegmentManagerConfig;
use crate::error::SegmentError;
use crate::pool::{SequenceAllocator, SharedFreeSegmentPool};
use crate::protocol::ProtocolHeaderParser;
use crate::queue::{EnqueueOutcome, SegmentQueue};
use crate::segment::{Segment, SeqClass, SEG_FLAG_CONTROL, SEG_FLAG_MF, SEG_PAYLOAD_SIZE};
use crate::sent::{FailedSegmentList, SentSegmentList};
use crate::stats::{ManagerStats, ManagerStatsSnapshot};

/// One send-side class: the strictly-ordered queue fresh sends go through,
/// plus a plain retransmit bypass FIFO.
///
/// `SegmentQueue` gates delivery on an ever-advancing `expected_seq` — right
/// for fresh traffic, but a segment popped off the failed list always has a
/// `seq_no` behind that gate (it was already dequeued for send once) and
/// would be silently dropped as a stale duplicate if re-enqueued the same
/// way. `retransmit` exists so [`SegmentManager::resubmit_failed_segment`]
/// actually gets the segment back out instead of into a dead end; it is
/// drained ahead of `ordered` within this class.
struct ClassSendQueue {
    ordered: Mutex<SegmentQueue>,
    retransmit: Mutex<VecDeque<Segment>>,
}

impl ClassSendQueue {
    fn new() -> Self {
        ClassSendQueue {
            ordered: Mutex::new(SegmentQueue::new()),
            retransmit: Mutex::new(VecDeque::new()),
        }
    }

    fn len(&self) -> usize {
        self.retransmit.lock().expect("retransmit queue mutex poisoned").len()
            + self.ordered.lock().expect("send queue mutex poisoned").len()
    }

    /// Retransmits first, then fresh traffic in sequence order.
    fn dequeue(&self) -> Option<Segment> {
        if let Some(seg) = self
            .retransmit
            .lock()
            .expect("retransmit queue mutex poisoned")
            .pop_front()
        {
            return Some(seg);
        }
        self.ordered.lock().expect("send queue mutex poisoned").dequeue()
    }
}

/// Both send-side classes plus the single condition variable their combined
/// consumer view waits on.
struct SendSide {
    control: ClassSendQueue,
    data: ClassSendQueue,
    cond: Condvar,
    /// A single mutex the condvar parks against, guarding nothing on its
    /// own — `control`/`data` are independently locked for their own
    /// enqueue/dequeue, this lock only serializes the wait predicate.
    wait_gate: Mutex<()>,
}

/// One receive-side class: its queue plus the condition variable a blocked
/// `recv`/`dequeue` waits on.
struct RecvSide {
    queue: Mutex<SegmentQueue>,
    cond: Condvar,
    wait_gate: Mutex<()>,
}

/// The segmentation/reassembly core. Construct one per session; share it
/// behind an `Arc` across producer threads, transport worker threads, and
/// consumer threads.
pub struct SegmentManager {
    config: SegmentManagerConfig,
    free_pool: SharedFreeSegmentPool,
    seq_alloc: SequenceAllocator,
    send: SendSide,
    recv_control: RecvSide,
    recv_data: RecvSide,
    sent: [Mutex<SentSegmentList>; SeqClass::COUNT],
    failed: Mutex<FailedSegmentList>,
    protocol_parser: Arc<dyn ProtocolHeaderParser>,
    stats: ManagerStats,
    shutting_down: AtomicBool,
}

impl SegmentManager {
    pub fn new(config: SegmentManagerConfig, protocol_parser: Arc<dyn ProtocolHeaderParser>) -> Self {
        SegmentManager {
            free_pool: SharedFreeSegmentPool::new(config.free_pool_threshold),
            seq_alloc: SequenceAllocator::new(),
            send: SendSide {
                control: ClassSendQueue::new(),
                data: ClassSendQueue::new(),
                cond: Condvar::new(),
                wait_gate: Mutex::new(()),
            },
            recv_control: RecvSide {
                queue: Mutex::new(SegmentQueue::new()),
                cond: Condvar::new(),
                wait_gate: Mutex::new(()),
            },
            recv_data: RecvSide {
                queue: Mutex::new(SegmentQueue::new()),
                cond: Condvar::new(),
                wait_gate: Mutex::new(()),
            },
            sent: [Mutex::new(SentSegmentList::new()), Mutex::new(SentSegmentList::new())],
            failed: Mutex::new(FailedSegmentList::new()),
            protocol_parser,
            stats: ManagerStats::new(),
            shutting_down: AtomicBool::new(false),
            config,
        }
    }

    // ─── Send path (spec §4.5) ──────────────────────────────────────────

    /// Chop `data` into segments, reserve a contiguous sequence range for
    /// them, and enqueue each into the class-appropriate send queue.
    /// Returns the number of segments produced. Success is unconditional
    /// once enqueued — transport failure is surfaced later, out of band,
    /// via [`SegmentManager::add_sent_segment`]'s counterpart retransmit
    /// path, not from this call.
    pub fn send(&self, data: &[u8], is_control: bool) -> Result<u32, SegmentError> {
        if data.is_empty() {
            return Err(SegmentError::InvalidArgument(
                "send buffer must be non-empty".into(),
            ));
        }

        let class = if is_control { SeqClass::Control } else { SeqClass::Data };
        let n = ((data.len() + SEG_PAYLOAD_SIZE - 1) / SEG_PAYLOAD_SIZE) as u32;
        let base = self.seq_alloc.reserve(class, n);

        // One wall-clock read per message — every fragment is stamped with
        // the same timestamp (latency is measured from enqueue time of the
        // whole message, not per fragment).
        let (ts_sec, ts_usec) = wall_clock_now();

        let mut offset = 0usize;
        for i in 0..n {
            let remaining = data.len() - offset;
            let seg_len = remaining.min(SEG_PAYLOAD_SIZE);
            let mut seg = self.free_pool.pop();

            seg.seq_no = base + i;
            let mut flag = 0u32;
            if i < n - 1 {
                flag |= SEG_FLAG_MF;
            }
            if is_control {
                flag |= SEG_FLAG_CONTROL;
            }
            seg.flag = flag;
            seg.send_start_ts_sec = ts_sec;
            seg.send_start_ts_usec = ts_usec;
            seg.set_payload(&data[offset..offset + seg_len]);
            seg.serialize_header();

            debug!(seq_no = seg.seq_no, len = seg.len, flag, "enqueue(send)");
            offset += seg_len;
            self.enqueue_send(seg, class);
        }

        self.stats.record_send_request();
        Ok(n)
    }

    fn send_side_for(&self, class: SeqClass) -> &ClassSendQueue {
        let target_is_control =
            class == SeqClass::Control && !self.config.route_control_to_data_queue;
        if target_is_control {
            &self.send.control
        } else {
            &self.send.data
        }
    }

    /// Place `seg` into the ordered send queue matching `class` (honoring
    /// `route_control_to_data_queue`), waking a blocked `dequeue_for_send`
    /// if the insertion made a new prefix deliverable. A duplicate/stale
    /// `seq_no` (shouldn't occur for a freshly-allocated segment, but is
    /// handled the same way `enqueue_received` does) is recorded and
    /// recycled into the free pool instead of being stored.
    fn enqueue_send(&self, seg: Segment, class: SeqClass) {
        let side = self.send_side_for(class);

        let outcome = side.ordered.lock().expect("send queue mutex poisoned").enqueue(seg);
        self.stats.record_send_enqueued(1);
        match outcome {
            EnqueueOutcome::Inserted { continuous } => {
                if continuous {
                    let _gate = self.send.wait_gate.lock().expect("send wait gate poisoned");
                    self.send.cond.notify_all();
                }
            }
            EnqueueOutcome::Duplicate(seg) => {
                self.stats.record_duplicate_dropped();
                self.free_pool.push(seg);
            }
        }
    }

    /// Place `seg` directly into `class`'s retransmit bypass FIFO, skipping
    /// the ordered queue's expected-sequence gate. See [`ClassSendQueue`].
    fn enqueue_retransmit(&self, seg: Segment, class: SeqClass) {
        let side = self.send_side_for(class);
        side.retransmit
            .lock()
            .expect("retransmit queue mutex poisoned")
            .push_back(seg);

        let _gate = self.send.wait_gate.lock().expect("send wait gate poisoned");
        self.send.cond.notify_all();
    }

    /// Block until a segment is available from either send queue, control
    /// strictly preempting data, and return it. Returns `None` once the
    /// manager has been told to shut down and both queues are drained, or
    /// on a benign race where another consumer already took the head.
    pub fn dequeue_for_send(&self) -> Option<Segment> {
        let mut gate = self.send.wait_gate.lock().expect("send wait gate poisoned");
        loop {
            if self.send.control.len() != 0 || self.send.data.len() != 0 {
                break;
            }
            if self.shutting_down.load(Ordering::Acquire) {
                return None;
            }
            gate = self
                .send
                .cond
                .wait(gate)
                .expect("send condvar wait poisoned");
        }
        drop(gate);

        if self.send.control.len() != 0 {
            self.send.control.dequeue()
        } else {
            self.send.data.dequeue()
        }
    }

    // ─── Receive path (spec §4.6) ───────────────────────────────────────

    fn recv_side(&self, is_control: bool) -> &RecvSide {
        if is_control {
            &self.recv_control
        } else {
            &self.recv_data
        }
    }

    /// Deposit a raw, already-deserialized inbound segment into its class
    /// receive queue. Called by transport workers as bytes arrive off the
    /// wire (transport adapters themselves are out of scope, §1).
    pub fn enqueue_received(&self, seg: Segment) {
        let side = self.recv_side(seg.is_control());
        let outcome = {
            let mut q = side.queue.lock().expect("recv queue mutex poisoned");
            q.enqueue(seg)
        };
        self.stats.record_recv_enqueued();
        match outcome {
            EnqueueOutcome::Inserted { continuous } => {
                if continuous {
                    let _gate = side.wait_gate.lock().expect("recv wait gate poisoned");
                    side.cond.notify_all();
                }
            }
            EnqueueOutcome::Duplicate(seg) => {
                self.stats.record_duplicate_dropped();
                self.free_pool.push(seg);
            }
        }
    }

    /// One dequeue attempt from a receive class; may return `None` on a
    /// benign race even after being woken.
    fn dequeue_recv_once(&self, is_control: bool) -> Option<Segment> {
        let side = self.recv_side(is_control);
        let mut gate = side.wait_gate.lock().expect("recv wait gate poisoned");
        loop {
            let len = side.queue.lock().expect("recv queue mutex poisoned").len();
            if len != 0 {
                break;
            }
            if self.shutting_down.load(Ordering::Acquire) {
                return None;
            }
            gate = side.cond.wait(gate).expect("recv condvar wait poisoned");
        }
        drop(gate);
        side.queue.lock().expect("recv queue mutex poisoned").dequeue()
    }

    /// Keep retrying `dequeue_recv_once` until it actually returns a
    /// segment. `None` only means "try again" here (spurious wakeup or a
    /// race with another consumer) — `recv()` itself must see a segment
    /// before proceeding, per spec §4.6 step 1. Returns `None` only if the
    /// manager is shutting down.
    fn blocking_dequeue_recv(&self, is_control: bool) -> Option<Segment> {
        loop {
            if self.shutting_down.load(Ordering::Acquire) {
                let side = self.recv_side(is_control);
                if side.queue.lock().expect("recv queue mutex poisoned").is_empty() {
                    return None;
                }
            }
            if let Some(seg) = self.dequeue_recv_once(is_control) {
                return Some(seg);
            }
        }
    }

    /// Block-dequeue and reassemble one logical message from the given
    /// class, delivering segments back to the free pool as they're
    /// consumed. Returns `None` if the manager shut down before a message
    /// was available, or if the upstream protocol parser reports a
    /// zero-length message.
    pub fn recv(&self, is_control: bool) -> Option<Vec<u8>> {
        let mut seg = self.blocking_dequeue_recv(is_control)?;

        let (header_len, total_len) = self.protocol_parser.parse_header(seg.payload())?;
        if total_len == 0 {
            self.free_pool.push(seg);
            return None;
        }

        let mut out = Vec::with_capacity(total_len);
        let first_payload = &seg.payload()[header_len..];
        out.extend_from_slice(first_payload);
        let mut cont = seg.more_fragments();
        self.free_pool.push(seg);

        while cont {
            seg = self.blocking_dequeue_recv(is_control)?;
            out.extend_from_slice(seg.payload());
            cont = seg.more_fragments();
            self.free_pool.push(seg);
        }

        self.stats.record_message_reassembled();
        Some(out)
    }

    // ─── Sent / failed bookkeeping (spec §4.8) ──────────────────────────

    /// Record that `seg` has been handed to a transport and is now awaiting
    /// acknowledgment. Called by transport workers after a successful send
    /// of a segment obtained from [`SegmentManager::dequeue_for_send`].
    pub fn add_sent_segment(&self, class: SeqClass, seg: Segment) {
        self.sent[class.index()]
            .lock()
            .expect("sent list mutex poisoned")
            .add(seg);
    }

    /// Reclaim every sent segment the peer has cumulatively acknowledged.
    /// `None` for a class means "no update" for that class (the sentinel
    /// the original conflated with an always-true `>= 0` unsigned
    /// comparison — see DESIGN.md).
    pub fn deallocate_sent_segments_by_peer(
        &self,
        last_seq_no_control: Option<u32>,
        last_seq_no_data: Option<u32>,
    ) {
        for (class, last) in [
            (SeqClass::Control, last_seq_no_control),
            (SeqClass::Data, last_seq_no_data),
        ] {
            let Some(max_seq) = last else { continue };
            let reclaimed = self.sent[class.index()]
                .lock()
                .expect("sent list mutex poisoned")
                .reclaim_up_to(max_seq);
            let n = reclaimed.len();
            for seg in reclaimed {
                self.free_pool.push(seg);
            }
            if n > 0 {
                self.stats.record_reclaimed_by_ack(n as u64);
                self.stats.record_free_pool_shrink();
            }
        }
    }

    /// Move every sent segment of `class` in `[start, end]` into the
    /// failed list for retransmission. Logs a warning (not an error — this
    /// is best-effort) if fewer segments were moved than requested, since
    /// some may have already been acknowledged or retransmitted.
    pub fn retransmit_missing_segments_by_peer(
        &self,
        class: SeqClass,
        start: u32,
        end: u32,
    ) -> Result<usize, SegmentError> {
        if end < start {
            return Err(SegmentError::InvalidArgument(format!(
                "retransmit range end ({end}) precedes start ({start})"
            )));
        }

        let moved = self.sent[class.index()]
            .lock()
            .expect("sent list mutex poisoned")
            .take_range(start, end);
        let moved_count = moved.len();
        {
            let mut failed = self.failed.lock().expect("failed list mutex poisoned");
            for seg in moved {
                failed.push(seg);
            }
        }

        let requested = (end - start + 1) as usize;
        if moved_count != requested {
            warn!(
                requested,
                moved = moved_count,
                start,
                end,
                "retransmit shortfall: some requested segments are no longer held"
            );
        }
        self.stats.record_retransmitted(moved_count as u64);
        Ok(moved_count)
    }

    /// Wire-facing convenience over [`SegmentManager::retransmit_missing_segments_by_peer`]
    /// for callers holding a raw class identifier instead of a [`SeqClass`].
    pub fn retransmit_missing_segments_by_peer_raw(
        &self,
        class_id: u8,
        start: u32,
        end: u32,
    ) -> Result<usize, SegmentError> {
        let class = SeqClass::from_u8(class_id).inspect_err(|_| {
            warn!(class_id, "unknown sequence class in retransmit request");
        })?;
        self.retransmit_missing_segments_by_peer(class, start, end)
    }

    /// FIFO pop from the failed list. Consumers re-enqueue the returned
    /// segment into its class's send queue via [`SegmentManager::resubmit_failed_segment`].
    pub fn pop_failed_segment(&self) -> Option<Segment> {
        self.failed.lock().expect("failed list mutex poisoned").pop()
    }

    /// Re-enqueue a segment popped from the failed list back onto the wire.
    /// Split out from `pop_failed_segment` so a caller can inspect/log the
    /// segment (e.g. bump a retry counter) before deciding to resubmit it.
    ///
    /// Goes through the class's retransmit bypass, not the ordered send
    /// queue: the segment's `seq_no` was already dequeued for send once, so
    /// it necessarily lies behind the ordered queue's `expected_seq` gate
    /// and `SegmentQueue::enqueue` would drop it as a stale duplicate (see
    /// `ClassSendQueue`).
    pub fn resubmit_failed_segment(&self, seg: Segment) {
        let class = SeqClass::from_flag(seg.flag);
        self.enqueue_retransmit(seg, class);
    }

    /// Reserved placeholder — not implemented, matching the upstream
    /// source where this is a stub. Do not add behavior here without a
    /// spec to back it; see DESIGN.md's Open Questions.
    pub fn request_retransmit_missing_segments(&self) {}

    // ─── Lifecycle & diagnostics ─────────────────────────────────────────

    /// Wake every blocked `dequeue_for_send`/`recv` waiter and drain the
    /// free pool. Returns the number of segments deallocated from the free
    /// pool. Does not drain the send/receive/sent/failed lists themselves
    /// — in-flight segments remain valid until their owning call returns.
    pub fn shutdown(&self) -> usize {
        self.shutting_down.store(true, Ordering::Release);
        {
            let _gate = self.send.wait_gate.lock().expect("send wait gate poisoned");
            self.send.cond.notify_all();
        }
        {
            let _gate = self
                .recv_control
                .wait_gate
                .lock()
                .expect("recv wait gate poisoned");
            self.recv_control.cond.notify_all();
        }
        {
            let _gate = self
                .recv_data
                .wait_gate
                .lock()
                .expect("recv wait gate poisoned");
            self.recv_data.cond.notify_all();
        }

        let drained = self.free_pool.drain_all();
        info!(drained, "segment manager shutdown: free pool drained");
        drained
    }

    /// Whether both receive queues are currently empty — the completion
    /// predicate an embedding daemon can poll as a precondition before
    /// tearing down a session (spec §4.7 "check_receiving_done").
    pub fn receiving_done(&self) -> bool {
        self.recv_control.queue.lock().expect("recv queue mutex poisoned").is_empty()
            && self.recv_data.queue.lock().expect("recv queue mutex poisoned").is_empty()
    }

    pub fn stats(&self) -> ManagerStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn free_pool_len(&self) -> usize {
        self.free_pool.len()
    }
}

fn wall_clock_now() -> (i32, i32) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() as i32, now.subsec_micros() as i32)
}
