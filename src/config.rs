//! # Configuration
//!
//! Compile-time tunables for a [`crate::manager::SegmentManager`] instance,
//! supplied once at construction — there is no live reload, matching the
//! original's `#define`-based constants.

use crate::segment::SEG_FREE_THRESHOLD;

/// Parameters a `SegmentManager` is built with.
#[derive(Debug, Clone)]
pub struct SegmentManagerConfig {
    /// Free-pool high-water mark before it's trimmed to half.
    pub free_pool_threshold: usize,
    /// When `true`, segments flagged `CONTROL` are still routed to the
    /// `SEND_DATA` queue instead of `SEND_CONTROL` — recovering the
    /// original's `EXP_CONTROL_SEGQUEUE` compile-time toggle as an explicit,
    /// documented switch. Default `false`: control always gets its own
    /// queue and dequeue priority, matching spec §4.5/§4.7.
    pub route_control_to_data_queue: bool,
}

impl Default for SegmentManagerConfig {
    fn default() -> Self {
        SegmentManagerConfig {
            free_pool_threshold: SEG_FREE_THRESHOLD,
            route_control_to_data_queue: false,
        }
    }
}
