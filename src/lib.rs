//! # segment-manager
//!
//! Segmentation, reassembly, and priority send/receive core for a
//! multi-path transport stack.
//!
//! Application messages are chopped into fixed-size segments, each stamped
//! with an in-band header carrying a per-class sequence number and
//! fragmentation flag. Two independent sequence spaces (control, data) are
//! tracked end to end: on send, a combined priority queue always drains
//! control ahead of data; on receive, per-class reassembly queues hold
//! out-of-order arrivals until their predecessor shows up. Sent segments
//! are tracked until a peer's cumulative ACK reclaims them, or a peer's
//! retransmit request moves them into a shared failed-segment list.
//!
//! Bytes-on-the-wire transport (sockets, paths, bonding policy) and
//! upper-layer message framing are both out of scope — see
//! [`protocol::ProtocolHeaderParser`] for the seam the latter plugs into.
//!
//! ## Crate structure
//!
//! - [`segment`] — Fixed-size segment type and its in-band header codec
//! - [`pool`] — Free-segment cache and per-class sequence allocator
//! - [`queue`] — Gap-holding, ascending-order reassembly queue
//! - [`sent`] — Sent-segment bookkeeping and the failed-segment retransmit list
//! - [`protocol`] — Seam to the upper-layer message framing collaborator
//! - [`config`] — Compile-time tunables for a [`manager::SegmentManager`]
//! - [`error`] — Caller-misuse and logged-anomaly error taxonomy
//! - [`stats`] — Monotonic counters for observability export
//! - [`manager`] — The public facade: `send`/`recv`, priority dequeue, reassembly

pub mod config;
pub mod error;
pub mod manager;
pub mod pool;
pub mod protocol;
pub mod queue;
pub mod segment;
pub mod sent;
pub mod stats;

pub use config::SegmentManagerConfig;
pub use error::SegmentError;
pub use manager::SegmentManager;
pub use protocol::{NullProtocolParser, ProtocolHeaderParser};
pub use segment::{Segment, SeqClass};
pub use stats::ManagerStatsSnapshot;
