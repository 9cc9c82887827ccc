//! # Metrics Traits
//!
//! Recording, snapshotting and resetting are kept apart so the policy code
//! only ever writes counters.
//!
//! ```text
//!   ┌─────────────────────────────┐
//!   │    LirsMetricsRecorder      │  written by Segment under its lock
//!   │ insert/update/reject/...    │
//!   └──────────────┬──────────────┘
//!                  │ merged per segment
//!                  ▼
//!   ┌─────────────────────────────┐    ┌─────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>  │    │ MetricsReset                │
//!   │ (LirsCache, bench/test)     │    │ (LirsCache)                 │
//!   └─────────────────────────────┘    └─────────────────────────────┘
//! ```

/// Counters for LIRS structural events.
///
/// Hits and misses are not part of the recorder: segments count them
/// unconditionally and copy them into snapshots.
pub trait LirsMetricsRecorder {
    fn record_insert(&mut self);
    fn record_update(&mut self);
    fn record_rejected(&mut self);
    fn record_promotion(&mut self);
    fn record_demotion(&mut self);
    fn record_cold_eviction(&mut self);
    fn record_revival(&mut self);
    fn record_non_resident_drop(&mut self);
    fn record_resize(&mut self);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&self);
}
