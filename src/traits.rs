//! # Cache Traits
//!
//! | Trait             | Bounds        | Purpose                          |
//! |-------------------|---------------|----------------------------------|
//! | `ConcurrentCache` | `Send + Sync` | Marker for thread-safe caches    |
//!
//! Caches in this crate take `&self` for every operation and synchronize
//! internally, so they can be shared through an `Arc` without an outer lock.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use lirskit::policy::lirs::LirsCache;
//! use lirskit::traits::ConcurrentCache;
//!
//! fn share<C: ConcurrentCache + 'static>(cache: C) -> Arc<C> {
//!     Arc::new(cache)
//! }
//!
//! let cache = share(LirsCache::<u64>::builder().max_memory(1 << 16).build());
//! let worker = {
//!     let cache = Arc::clone(&cache);
//!     thread::spawn(move || cache.put(1, 1, 8).unwrap())
//! };
//! worker.join().unwrap();
//! assert!(cache.contains_key(1));
//! ```

/// Marker trait for caches that are safe to share across threads.
pub trait ConcurrentCache: Send + Sync {}
