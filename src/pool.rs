//! # Free Segment Pool & Sequence Allocator
//!
//! `FreeSegmentPool` amortizes allocation: new `Segment`s dominate hot-path
//! cost, so idle ones are cached here instead of being dropped. The shrink
//! policy in [`FreeSegmentPool::push`] bounds steady-state memory.
//!
//! `SequenceAllocator` hands out contiguous, disjoint sequence-number ranges
//! to concurrent callers, one independent counter per [`SeqClass`].

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::segment::{SeqClass, Segment, SEG_FREE_THRESHOLD};

// ─── FreeSegmentPool ─────────────────────────────────────────────────────────

/// Bounded, reusable cache of idle `Segment`s.
///
/// A segment is in exactly one of {free pool, a send queue, a sent list, a
/// receive queue, a failed list, a caller-held transient} at any instant —
/// this type owns it only while it sits in "free pool".
pub struct FreeSegmentPool {
    free: VecDeque<Segment>,
    threshold: usize,
}

impl FreeSegmentPool {
    pub fn new(threshold: usize) -> Self {
        FreeSegmentPool {
            free: VecDeque::new(),
            threshold,
        }
    }

    /// Take a segment from the pool, allocating a fresh zeroed one on a miss.
    /// Metadata fields are reset to zero before return; the payload bytes
    /// beyond the caller's own `len` are unspecified.
    pub fn pop(&mut self) -> Segment {
        let mut seg = match self.free.pop_front() {
            Some(seg) => seg,
            None => Segment::zeroed(),
        };
        seg.reset_metadata();
        seg
    }

    /// Return a segment to the pool. Trims the pool to half of `threshold`
    /// if this push pushed it over the high-water mark.
    pub fn push(&mut self, seg: Segment) {
        self.free.push_front(seg);
        if self.free.len() > self.threshold {
            self.shrink(self.threshold / 2);
        }
    }

    /// Deallocate down to `target` segments.
    pub fn shrink(&mut self, target: usize) {
        while self.free.len() > target {
            self.free.pop_back();
        }
    }

    /// Drain every idle segment. Called on shutdown. Returns the count
    /// deallocated.
    pub fn drain_all(&mut self) -> usize {
        let n = self.free.len();
        self.shrink(0);
        n
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

impl Default for FreeSegmentPool {
    fn default() -> Self {
        Self::new(SEG_FREE_THRESHOLD)
    }
}

/// Thread-safe wrapper handing out unique ownership of pooled segments.
pub struct SharedFreeSegmentPool {
    inner: Mutex<FreeSegmentPool>,
}

impl SharedFreeSegmentPool {
    pub fn new(threshold: usize) -> Self {
        SharedFreeSegmentPool {
            inner: Mutex::new(FreeSegmentPool::new(threshold)),
        }
    }

    pub fn pop(&self) -> Segment {
        self.inner.lock().expect("free pool mutex poisoned").pop()
    }

    pub fn push(&self, seg: Segment) {
        self.inner
            .lock()
            .expect("free pool mutex poisoned")
            .push(seg);
    }

    pub fn drain_all(&self) -> usize {
        self.inner
            .lock()
            .expect("free pool mutex poisoned")
            .drain_all()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("free pool mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── SequenceAllocator ───────────────────────────────────────────────────────

/// Per-class mutex-guarded counter handing out contiguous sequence ranges.
/// One independent counter per [`SeqClass`], each guarded by its own lock so
/// control and data allocation never contend.
pub struct SequenceAllocator {
    counters: [Mutex<u32>; SeqClass::COUNT],
}

impl SequenceAllocator {
    pub fn new() -> Self {
        SequenceAllocator {
            counters: [Mutex::new(0), Mutex::new(0)],
        }
    }

    /// Reserve `n` contiguous sequence numbers for `class`, returning the
    /// first one. A range is never allowed to overflow the 32-bit counter —
    /// this crate asserts rather than wrapping silently, since wraparound
    /// would alias live sequence numbers (UB per the wire contract).
    pub fn reserve(&self, class: SeqClass, n: u32) -> u32 {
        let mut counter = self.counters[class.index()]
            .lock()
            .expect("sequence allocator mutex poisoned");
        let base = *counter;
        *counter = counter
            .checked_add(n)
            .expect("sequence counter overflowed 32 bits");
        base
    }

    /// Current counter value (next sequence number to be handed out) for a
    /// class. Exposed for tests and diagnostics only.
    pub fn peek(&self, class: SeqClass) -> u32 {
        *self.counters[class.index()]
            .lock()
            .expect("sequence allocator mutex poisoned")
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_allocates_on_empty() {
        let mut pool = FreeSegmentPool::new(4);
        let seg = pool.pop();
        assert_eq!(seg.seq_no, 0);
        assert_eq!(seg.len, 0);
        assert_eq!(seg.flag, 0);
    }

    #[test]
    fn push_pop_reuses_segment() {
        let mut pool = FreeSegmentPool::new(4);
        let mut seg = pool.pop();
        seg.seq_no = 42;
        pool.push(seg);
        assert_eq!(pool.len(), 1);

        let reused = pool.pop();
        assert_eq!(reused.seq_no, 0, "metadata must be reset on pop");
        assert!(pool.is_empty());
    }

    #[test]
    fn push_shrinks_above_threshold() {
        let mut pool = FreeSegmentPool::new(4);
        for _ in 0..10 {
            pool.push(Segment::zeroed());
        }
        assert!(pool.len() <= 4, "pool never exceeds threshold after push");
        assert_eq!(pool.len(), 2, "shrinks to threshold/2");
    }

    #[test]
    fn drain_all_empties_pool() {
        let mut pool = FreeSegmentPool::new(4);
        for _ in 0..3 {
            pool.push(Segment::zeroed());
        }
        let drained = pool.drain_all();
        assert_eq!(drained, 3);
        assert!(pool.is_empty());
    }

    #[test]
    fn sequence_allocator_contiguous_and_disjoint() {
        let alloc = SequenceAllocator::new();
        let a = alloc.reserve(SeqClass::Data, 3);
        let b = alloc.reserve(SeqClass::Data, 2);
        assert_eq!(a, 0);
        assert_eq!(b, 3);
        assert_eq!(alloc.peek(SeqClass::Data), 5);
    }

    #[test]
    fn sequence_allocator_classes_are_independent() {
        let alloc = SequenceAllocator::new();
        alloc.reserve(SeqClass::Control, 10);
        assert_eq!(alloc.peek(SeqClass::Data), 0);
        assert_eq!(alloc.peek(SeqClass::Control), 10);
    }

    #[test]
    fn sequence_allocator_concurrent_callers_stay_disjoint() {
        use std::sync::Arc;
        use std::thread;

        let alloc = Arc::new(SequenceAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let alloc = Arc::clone(&alloc);
            handles.push(thread::spawn(move || alloc.reserve(SeqClass::Data, 10)));
        }
        let mut bases: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        bases.sort_unstable();
        for (i, base) in bases.iter().enumerate() {
            assert_eq!(*base, (i as u32) * 10);
        }
    }
}
