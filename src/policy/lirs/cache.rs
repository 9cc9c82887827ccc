use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::config::{DEFAULT_ENTRY_COST, LirsConfig, split_memory};
use crate::ds::SegmentSelector;
use crate::error::{CacheError, ConfigError};
#[cfg(feature = "metrics")]
use crate::metrics::{LirsMetrics, MetricsReset, MetricsSnapshotProvider};
use crate::traits::ConcurrentCache;

use super::entry::{ENTRY_MEMORY_OVERHEAD, EntryState};
use super::segment::{KeyFilter, Segment};

/// Cost function used by [`LirsCache::insert`] and [`LirsCache::put_all`].
pub type Weigher<V> = Arc<dyn Fn(&V) -> i32 + Send + Sync>;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring a [`LirsCache`].
///
/// # Example
///
/// ```
/// use lirskit::policy::lirs::LirsCache;
///
/// let cache = LirsCache::<Vec<u8>>::builder()
///     .max_memory(1 << 20)
///     .segment_count(4)
///     .weigher(|page: &Vec<u8>| page.len() as i32)
///     .build();
/// assert_eq!(cache.segment_count(), 4);
/// ```
pub struct LirsCacheBuilder<V> {
    config: LirsConfig,
    weigher: Option<Weigher<V>>,
}

impl<V> LirsCacheBuilder<V> {
    /// Creates a builder with [`LirsConfig::default`] and the constant weigher.
    pub fn new() -> Self {
        Self::from_config(LirsConfig::default())
    }

    pub fn from_config(config: LirsConfig) -> Self {
        Self {
            config,
            weigher: None,
        }
    }

    /// Sets the memory bound summed over all segments.
    pub fn max_memory(mut self, max_memory: i64) -> Self {
        self.config.max_memory = max_memory;
        self
    }

    /// Sets the segment count; rounded up to a power of two.
    pub fn segment_count(mut self, segment_count: usize) -> Self {
        self.config.segment_count = segment_count;
        self
    }

    pub fn stack_move_distance(mut self, distance: u32) -> Self {
        self.config.stack_move_distance = distance;
        self
    }

    /// Sets how many non-resident entries are kept per resident entry.
    pub fn non_resident_queue_size(mut self, factor: u32) -> Self {
        self.config.non_resident_queue_size = factor;
        self
    }

    /// Sets the per-resident quota applied while the oldest non-resident
    /// value is still held by a caller.
    pub fn non_resident_queue_size_high(mut self, factor: u32) -> Self {
        self.config.non_resident_queue_size_high = factor;
        self
    }

    /// Sets the cost function for `insert` and `put_all`. Without one, every
    /// value costs [`DEFAULT_ENTRY_COST`].
    pub fn weigher(mut self, weigher: impl Fn(&V) -> i32 + Send + Sync + 'static) -> Self {
        self.weigher = Some(Arc::new(weigher));
        self
    }

    pub fn config(&self) -> &LirsConfig {
        &self.config
    }

    /// Builds the cache.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. For a non-panicking
    /// alternative, use [`try_build`](Self::try_build).
    pub fn build(self) -> LirsCache<V> {
        match self.try_build() {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Builds the cache, returning an error on invalid parameters instead of
    /// panicking.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails
    /// [`LirsConfig::validate`].
    pub fn try_build(self) -> Result<LirsCache<V>, ConfigError> {
        LirsCache::from_parts(self.config, self.weigher)
    }
}

impl<V> Default for LirsCacheBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for LirsCacheBuilder<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LirsCacheBuilder")
            .field("config", &self.config)
            .field("weigher", &self.weigher.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LirsCache
// ---------------------------------------------------------------------------

/// Sharded, memory-bounded LIRS cache keyed by `i64`.
///
/// Every key belongs to exactly one [`Segment`], each behind its own
/// `parking_lot::Mutex`. Values are stored and handed out as `Arc<V>`; a
/// value evicted while a caller still holds it is revived by the next
/// [`get`](Self::get). Point operations lock one segment. Aggregates
/// (`size`, `used_memory`, `key_set`, ...) lock segments one at a time in
/// index order, so they are a sum of per-segment snapshots rather than an
/// atomic view.
///
/// # Example
///
/// ```
/// use lirskit::policy::lirs::LirsCache;
///
/// let cache = LirsCache::builder().max_memory(10_000).build();
/// cache.put(7, "page".to_string(), 100).unwrap();
///
/// let page = cache.get(7).unwrap();
/// assert_eq!(page.as_str(), "page");
/// assert!(cache.contains_key(7));
/// assert_eq!(cache.memory(7), 100 + cache.memory_overhead());
/// ```
pub struct LirsCache<V> {
    segments: Box<[Mutex<Segment<V>>]>,
    selector: SegmentSelector,
    max_memory: AtomicI64,
    config: LirsConfig,
    weigher: Option<Weigher<V>>,
}

impl<V> LirsCache<V> {
    /// Creates a cache from `config` with the constant weigher.
    ///
    /// # Panics
    ///
    /// Panics on an invalid configuration. For a non-panicking alternative,
    /// use [`try_new`](Self::try_new).
    pub fn new(config: LirsConfig) -> Self {
        match Self::try_new(config) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails [`LirsConfig::validate`].
    pub fn try_new(config: LirsConfig) -> Result<Self, ConfigError> {
        Self::from_parts(config, None)
    }

    pub fn builder() -> LirsCacheBuilder<V> {
        LirsCacheBuilder::new()
    }

    fn from_parts(config: LirsConfig, weigher: Option<Weigher<V>>) -> Result<Self, ConfigError> {
        config.validate()?;
        let selector = SegmentSelector::new(config.segment_count);
        let count = selector.segment_count();
        let segments = split_memory(config.max_memory, count)
            .map(|bound| {
                Mutex::new(Segment::new(bound, &config).with_hash_shift(selector.segment_bits()))
            })
            .collect();
        debug!(
            max_memory = config.max_memory,
            segments = count,
            stack_move_distance = config.stack_move_distance,
            non_resident_queue_size = config.non_resident_queue_size,
            "created LIRS cache"
        );
        Ok(Self {
            segments,
            selector,
            max_memory: AtomicI64::new(config.max_memory),
            config,
            weigher,
        })
    }

    #[inline]
    fn segment(&self, key: i64) -> &Mutex<Segment<V>> {
        &self.segments[self.selector.segment_for_key(key)]
    }

    fn sum<T: std::iter::Sum>(&self, f: impl Fn(&Segment<V>) -> T) -> T {
        self.segments.iter().map(|s| f(&*s.lock())).sum()
    }

    // -----------------------------------------------------------------------
    // Point operations
    // -----------------------------------------------------------------------

    /// Returns the value for `key` and records the reference.
    ///
    /// See [`Segment::get`] for how non-resident entries are revived.
    pub fn get(&self, key: i64) -> Option<Arc<V>> {
        self.segment(key).lock().get(key)
    }

    /// Applies `f` to the value for `key`, recording the reference. `f` runs
    /// after the segment lock is released.
    pub fn get_with<R>(&self, key: i64, f: impl FnOnce(&V) -> R) -> Option<R> {
        let value = self.segment(key).lock().get(key);
        value.map(|value| f(&*value))
    }

    /// Like [`get`](Self::get) but leaves recency and counters untouched.
    pub fn peek(&self, key: i64) -> Option<Arc<V>> {
        self.segment(key).lock().peek(key)
    }

    pub fn peek_with<R>(&self, key: i64, f: impl FnOnce(&V) -> R) -> Option<R> {
        let value = self.segment(key).lock().peek(key);
        value.map(|value| f(&*value))
    }

    /// Stores `value` with caller-declared cost `memory` and returns the
    /// previous value, if it was resident or is still held elsewhere.
    ///
    /// # Errors
    ///
    /// - [`CacheError::InvalidArgument`] if `memory` is negative or overflows
    ///   once [`memory_overhead`](Self::memory_overhead) is added.
    /// - [`CacheError::InternalInconsistency`] if the segment is found broken.
    pub fn put(&self, key: i64, value: V, memory: i32) -> Result<Option<Arc<V>>, CacheError> {
        self.put_shared(key, Arc::new(value), memory)
    }

    /// Stores a value the caller keeps a handle to. While any handle lives,
    /// the entry can be revived after eviction.
    ///
    /// # Errors
    ///
    /// As [`put`](Self::put).
    pub fn put_shared(
        &self,
        key: i64,
        value: Arc<V>,
        memory: i32,
    ) -> Result<Option<Arc<V>>, CacheError> {
        self.segment(key).lock().put_shared(key, value, memory)
    }

    /// Stores `value` with the cost given by the configured weigher.
    ///
    /// # Errors
    ///
    /// As [`put`](Self::put); a weigher returning a negative cost yields
    /// [`CacheError::InvalidArgument`].
    pub fn insert(&self, key: i64, value: V) -> Result<Option<Arc<V>>, CacheError> {
        let memory = self.size_of(&value);
        self.put(key, value, memory)
    }

    /// Inserts every pair with [`insert`](Self::insert), stopping at the
    /// first error.
    pub fn put_all(&self, entries: impl IntoIterator<Item = (i64, V)>) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Cost the weigher assigns to `value`.
    pub fn size_of(&self, value: &V) -> i32 {
        match &self.weigher {
            Some(weigher) => weigher(value),
            None => DEFAULT_ENTRY_COST,
        }
    }

    /// Removes `key` and returns its value if it was resident or is still
    /// held elsewhere.
    pub fn remove(&self, key: i64) -> Option<Arc<V>> {
        self.segment(key).lock().remove(key)
    }

    /// `true` if `key` is resident. Non-resident keys report `false`.
    pub fn contains_key(&self, key: i64) -> bool {
        self.segment(key).lock().contains_key(key)
    }

    /// Scans resident values segment by segment, stopping at the first match.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.segments.iter().any(|s| s.lock().contains_value(value))
    }

    pub fn state(&self, key: i64) -> Option<EntryState> {
        self.segment(key).lock().state(key)
    }

    /// Charged memory of `key` including [`memory_overhead`](Self::memory_overhead);
    /// 0 if absent or non-resident.
    pub fn memory(&self, key: i64) -> i32 {
        self.segment(key).lock().memory(key)
    }

    // -----------------------------------------------------------------------
    // Whole-cache operations
    // -----------------------------------------------------------------------

    /// Drops every entry in every segment. Memory bounds are kept.
    pub fn clear(&self) {
        for segment in self.segments.iter() {
            segment.lock().clear();
        }
        debug!("cleared LIRS cache");
    }

    /// Sets the cache-wide memory bound and splits it over the segments.
    /// Nothing is evicted until the next `put` on each segment.
    ///
    /// Each segment keeps a bound of at least 1, so for `max_memory` below the
    /// segment count the bounds add up to more than `max_memory`; see
    /// [`effective_max_memory`](Self::effective_max_memory).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`] if `max_memory <= 0`.
    pub fn set_max_memory(&self, max_memory: i64) -> Result<(), CacheError> {
        if max_memory <= 0 {
            return Err(CacheError::invalid_argument(format!(
                "max memory must be > 0, got {max_memory}"
            )));
        }
        for (segment, bound) in self
            .segments
            .iter()
            .zip(split_memory(max_memory, self.segments.len()))
        {
            segment.lock().set_max_memory(bound)?;
        }
        self.max_memory.store(max_memory, Ordering::Release);
        debug!(max_memory, "updated LIRS cache memory bound");
        Ok(())
    }

    /// Calls [`Segment::trim_non_resident_queue`] on every segment.
    pub fn trim_non_resident_queue(&self) {
        for segment in self.segments.iter() {
            segment.lock().trim_non_resident_queue();
        }
    }

    // -----------------------------------------------------------------------
    // Sizes and memory
    // -----------------------------------------------------------------------

    /// The bound last requested through the builder or
    /// [`set_max_memory`](Self::set_max_memory).
    pub fn max_memory(&self) -> i64 {
        self.max_memory.load(Ordering::Acquire)
    }

    /// Sum of the segment bounds actually enforced. Equals
    /// [`max_memory`](Self::max_memory) unless that is smaller than the
    /// segment count.
    pub fn effective_max_memory(&self) -> i64 {
        self.sum(Segment::max_memory)
    }

    /// Largest memory bound of a single segment, which caps the cost of any
    /// one entry.
    pub fn max_item_size(&self) -> i64 {
        self.segments
            .iter()
            .map(|s| s.lock().max_memory())
            .max()
            .unwrap_or(0)
    }

    pub fn used_memory(&self) -> i64 {
        self.sum(Segment::used_memory)
    }

    /// Resident entries (hot + cold).
    pub fn size(&self) -> usize {
        self.sum(Segment::size)
    }

    pub fn size_hot(&self) -> usize {
        self.sum(Segment::size_hot)
    }

    pub fn size_non_resident(&self) -> usize {
        self.sum(Segment::size_non_resident)
    }

    /// Total hash buckets over all segments.
    pub fn size_map_array(&self) -> usize {
        self.sum(Segment::size_map_array)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.lock().is_empty())
    }

    pub fn hits(&self) -> u64 {
        self.sum(Segment::hits)
    }

    pub fn misses(&self) -> u64 {
        self.sum(Segment::misses)
    }

    /// Bookkeeping cost added to every entry's declared memory.
    pub fn memory_overhead(&self) -> i32 {
        ENTRY_MEMORY_OVERHEAD
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn config(&self) -> &LirsConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Keys of one structure, concatenated over segments in index order.
    pub fn keys(&self, filter: KeyFilter) -> Vec<i64> {
        let mut keys = Vec::new();
        for segment in self.segments.iter() {
            keys.extend(segment.lock().keys(filter));
        }
        keys
    }

    /// Resident keys.
    pub fn key_set(&self) -> FxHashSet<i64> {
        let mut keys = FxHashSet::default();
        for segment in self.segments.iter() {
            keys.extend(segment.lock().iter().map(|(key, _)| key));
        }
        keys
    }

    /// Every resident value, in no particular order.
    pub fn values(&self) -> Vec<Arc<V>> {
        let mut values = Vec::new();
        for segment in self.segments.iter() {
            values.extend(segment.lock().iter().map(|(_, value)| Arc::clone(value)));
        }
        values
    }

    /// Snapshot of every resident entry.
    pub fn to_map(&self) -> FxHashMap<i64, Arc<V>> {
        let mut map = FxHashMap::default();
        for segment in self.segments.iter() {
            map.extend(segment.lock().iter().map(|(key, value)| (key, Arc::clone(value))));
        }
        map
    }

    /// Verifies the invariants of every segment.
    ///
    /// # Errors
    ///
    /// Returns the first [`CacheError::InternalInconsistency`] found, with the
    /// segment index prepended.
    pub fn check_invariants(&self) -> Result<(), CacheError> {
        for (index, segment) in self.segments.iter().enumerate() {
            segment.lock().check_invariants().map_err(|err| {
                CacheError::inconsistency(format!("segment {index}: {}", err.message()))
            })?;
        }
        Ok(())
    }
}

impl<V> fmt::Debug for LirsCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LirsCache")
            .field("segments", &self.segments.len())
            .field("max_memory", &self.max_memory())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<V: Send + Sync> ConcurrentCache for LirsCache<V> {}

#[cfg(feature = "metrics")]
impl<V> MetricsSnapshotProvider<LirsMetrics> for LirsCache<V> {
    fn snapshot(&self) -> LirsMetrics {
        let mut total = LirsMetrics::default();
        for segment in self.segments.iter() {
            total.merge(&segment.lock().metrics());
        }
        total
    }
}

#[cfg(feature = "metrics")]
impl<V> MetricsReset for LirsCache<V> {
    fn reset_metrics(&self) {
        for segment in self.segments.iter() {
            segment.lock().reset_metrics();
        }
    }
}
