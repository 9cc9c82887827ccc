//! Optional counters for cache behavior, compiled in with the `metrics`
//! feature.

pub mod snapshot;
pub mod traits;

pub use snapshot::LirsMetrics;
pub use traits::{LirsMetricsRecorder, MetricsReset, MetricsSnapshotProvider};
