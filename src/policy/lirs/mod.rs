//! LIRS (Low Inter-reference Recency Set) replacement policy.
//!
//! LIRS ranks entries by *reuse distance*, the number of distinct keys
//! referenced between two references to the same key, rather than by plain
//! recency. Keys with a short reuse distance are **hot** and are never evicted
//! directly. Every other resident key is **cold** and sits in a small queue
//! that absorbs one-time references, so a sequential scan only churns the cold
//! queue and leaves the hot working set in place.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                            LirsCache<V>                                  │
//! │                                                                          │
//! │   key ─► mix64 ─► low bits ─► segment index                              │
//! │                                                                          │
//! │   ┌──────────────────┐ ┌──────────────────┐     ┌──────────────────┐     │
//! │   │ Mutex<Segment>   │ │ Mutex<Segment>   │ ... │ Mutex<Segment>   │     │
//! │   │  table           │ │  table           │     │  table           │     │
//! │   │  stack           │ │  stack           │     │  stack           │     │
//! │   │  cold queue      │ │  cold queue      │     │  cold queue      │     │
//! │   │  non-resident q. │ │  non-resident q. │     │  non-resident q. │     │
//! │   └──────────────────┘ └──────────────────┘     └──────────────────┘     │
//! └──────────────────────────────────────────────────────────────────────────┘
//!
//!   State transitions (per entry)
//!   ─────────────────────────────
//!
//!            put (cache full)                    get while on stack
//!   absent ─────────────────────► Cold ─────────────────────────────► Hot
//!      │                           │ ▲                                 │
//!      │ put (room left)           │ │ get off stack: requeue          │ oldest hot
//!      └───────────────────────────┼─┼──────────────────────► Hot      │ demoted
//!                                  │ └─────────────────────────────────┘
//!                     evicted      ▼
//!                            NonResident ──── put ───► Hot (via access)
//!                                  │
//!                                  ├── get, value still held ──► Cold, or Hot if on stack
//!                                  │
//!                                  └── quota exceeded / remove ──► absent
//! ```
//!
//! ## Memory Accounting
//!
//! Every entry is charged its declared cost plus [`ENTRY_MEMORY_OVERHEAD`].
//! A segment evicts cold entries until its used memory is back under its
//! bound. Values are stored as `Arc<V>`; eviction keeps only a `Weak`
//! handle, and a non-resident entry is charged nothing. If a caller still
//! holds the value, `get` revives the entry and charges its cost again, so a
//! segment can sit above its bound until its next `put`.
//!
//! ## Example Usage
//!
//! ```
//! use lirskit::policy::lirs::{EntryState, LirsCache};
//!
//! let cache = LirsCache::builder()
//!     .max_memory(4 * (1 + 64))
//!     .segment_count(1)
//!     .build();
//!
//! for key in 1..=4 {
//!     cache.put(key, key * 10, 1).unwrap();
//! }
//! assert_eq!(cache.size_hot(), 4);
//!
//! // a fifth entry forces the oldest hot entry out
//! cache.put(5, 50, 1).unwrap();
//! assert_eq!(cache.size(), 4);
//! assert_eq!(cache.state(1), Some(EntryState::NonResident));
//! assert_eq!(cache.get(1), None);
//! ```
//!
//! ## Thread Safety
//!
//! [`LirsCache`] is `Send + Sync` for `V: Send + Sync`. [`Segment`] is a plain
//! single-threaded structure.

mod cache;
mod entry;
mod segment;

pub use cache::{LirsCache, LirsCacheBuilder, Weigher};
pub use entry::{ENTRY_MEMORY_OVERHEAD, EntryState};
pub use segment::{KeyFilter, Segment};
