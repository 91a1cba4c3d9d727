//! # Error taxonomy
//!
//! The core surfaces no exceptions upward for the normal not-ready/no-data
//! case — `recv`, `pop_failed_segment`, and `dequeue_for_send` return
//! `Option` the way the original did. `SegmentError` is reserved for caller
//! misuse and logged-but-survivable anomalies.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    /// Null/empty send buffer, or `seq_no_end < seq_no_start` in a
    /// retransmit request. No state is mutated before this is returned.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested retransmit range was only partially present in the sent
    /// list. Not fatal — best-effort partial retransmission proceeds; this
    /// variant exists so callers/tests can assert on the shortfall if they
    /// want to, but `retransmit_missing_segments_by_peer` logs it via
    /// `tracing::warn!` rather than returning it as an error by default.
    #[error("retransmit shortfall: moved {moved} of {requested} requested segments")]
    RetransmitShortfall { requested: usize, moved: usize },

    /// A sequence class value outside `{Control, Data}` reached a dispatch
    /// point. Indicates a bug in the caller.
    #[error("unknown sequence class")]
    UnknownClass,
}
