//! lirskit: a memory-bounded, sharded LIRS cache keyed by `i64`.
//!
//! The cache is meant to sit under a storage engine's page cache: values are
//! charged a caller-declared memory cost, the working set of frequently
//! reused pages stays resident, and one-pass scans only churn a small cold
//! queue.
//!
//! Start with [`LirsCache::builder`](policy::lirs::LirsCache::builder) or
//! import everything through [`prelude`].

pub mod config;
pub mod ds;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod traits;
