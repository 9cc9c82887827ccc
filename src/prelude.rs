pub use crate::config::LirsConfig;
pub use crate::error::{CacheError, ConfigError};
#[cfg(feature = "metrics")]
pub use crate::metrics::{LirsMetrics, MetricsReset, MetricsSnapshotProvider};
pub use crate::policy::lirs::{
    ENTRY_MEMORY_OVERHEAD, EntryState, KeyFilter, LirsCache, LirsCacheBuilder, Segment,
};
pub use crate::traits::ConcurrentCache;
