//! One independently locked shard of the LIRS cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │ Segment<V>                                                               │
//! │                                                                          │
//! │  buckets: [Option<SlotId>; 2^n]   chained by Entry::map_next             │
//! │                                                                          │
//! │  entries: SlotArena<Entry<V>>                                            │
//! │                                                                          │
//! │  stack (recency, MRU at head)                                            │
//! │    head ─► [H] ◄─► [c] ◄─► [n] ◄─► [H] ◄─► ... ◄─► [H] ◄─ tail           │
//! │                                                  tail is always hot      │
//! │                                                                          │
//! │  cold queue (resident, newest at head)                                   │
//! │    head ─► [c] ◄─► [c] ◄─► [c] ◄─ tail    evicted from the tail          │
//! │                                                                          │
//! │  non-resident queue (weak value, newest at head)                         │
//! │    head ─► [n] ◄─► [n] ◄─► [n] ◄─ tail    forgotten from the tail        │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hot entries are never queued and are always on the stack. Cold and
//! non-resident entries may or may not be on the stack; an entry that is still
//! on the stack when it is referenced again has a short reuse distance and is
//! promoted to hot.
//!
//! Values are held as `Arc<V>`. Eviction keeps only a `Weak<V>`, so a value a
//! caller still holds can be revived by the next `get` without a new `put`.
//!
//! ## Operations
//!
//! | Operation      | Effect                                                       |
//! |----------------|--------------------------------------------------------------|
//! | `get`          | Hit on hot: maybe move to stack head                         |
//! |                | Hit on cold: promote if on stack, else requeue               |
//! |                | Non-resident, value still held: revive as cold, then as above|
//! |                | Non-resident, value dropped, or absent: miss                 |
//! | `put`          | Replace any existing entry, admit as hot while under budget, |
//! |                | otherwise evict and admit as cold                            |
//! | `remove`       | Unlink everywhere; newest cold entry takes a hot slot        |
//!
//! ## Thread Safety
//!
//! `Segment` is not synchronized. [`LirsCache`](super::LirsCache) keeps each
//! one behind its own `parking_lot::Mutex`.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{debug, error, trace};

use crate::config::LirsConfig;
use crate::ds::{SlotArena, SlotId, mix64};
use crate::error::CacheError;
#[cfg(feature = "metrics")]
use crate::metrics::{LirsMetrics, LirsMetricsRecorder};

use super::entry::{ENTRY_MEMORY_OVERHEAD, Entry, EntryState, QueueKind};

const INITIAL_TABLE_LEN: usize = 8;
const MAX_TABLE_LEN: usize = 1 << 28;

/// Selects which structure [`Segment::keys`] walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFilter {
    /// Recency stack, most recently referenced first.
    Stack,
    /// Cold resident queue, newest first.
    Cold,
    /// Non-resident queue, newest first.
    NonResident,
}

#[derive(Debug, Default, Clone, Copy)]
struct List {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

pub struct Segment<V> {
    entries: SlotArena<Entry<V>>,
    buckets: Vec<Option<SlotId>>,
    /// Low hash bits already consumed by segment selection.
    hash_shift: u32,
    /// Entries in the table, non-resident included.
    map_size: usize,
    stack: List,
    cold: List,
    non_resident: List,
    used_memory: i64,
    max_memory: i64,
    stack_move_distance: u64,
    stack_move_counter: u64,
    non_resident_queue_size: usize,
    non_resident_queue_size_high: usize,
    hits: u64,
    misses: u64,
    #[cfg(feature = "metrics")]
    metrics: LirsMetrics,
}

impl<V> Segment<V> {
    /// Creates an empty segment bounded by `max_memory` (raised to 1 if lower).
    ///
    /// Only the policy knobs of `config` are read; its `max_memory` and
    /// `segment_count` describe the whole cache.
    pub fn new(max_memory: i64, config: &LirsConfig) -> Self {
        Self {
            entries: SlotArena::new(),
            buckets: vec![None; INITIAL_TABLE_LEN],
            hash_shift: 0,
            map_size: 0,
            stack: List::default(),
            cold: List::default(),
            non_resident: List::default(),
            used_memory: 0,
            max_memory: max_memory.max(1),
            stack_move_distance: u64::from(config.stack_move_distance),
            stack_move_counter: 0,
            non_resident_queue_size: config.non_resident_queue_size as usize,
            non_resident_queue_size_high: config.non_resident_queue_size_high as usize,
            hits: 0,
            misses: 0,
            #[cfg(feature = "metrics")]
            metrics: LirsMetrics::default(),
        }
    }

    pub(crate) fn with_hash_shift(mut self, shift: u32) -> Self {
        self.hash_shift = shift;
        self
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[inline]
    fn bucket_index(&self, key: i64) -> usize {
        ((mix64(key) >> self.hash_shift) as usize) & (self.buckets.len() - 1)
    }

    fn find(&self, key: i64) -> Option<SlotId> {
        let mut cur = self.buckets[self.bucket_index(key)];
        while let Some(id) = cur {
            let entry = &self.entries[id];
            if entry.key == key {
                return Some(id);
            }
            cur = entry.map_next;
        }
        None
    }

    /// Returns the value for `key` and records the reference.
    ///
    /// A non-resident entry whose value is still held elsewhere is revived:
    /// its memory is charged again and it rejoins the cold queue, or becomes
    /// hot if it is still on the stack. The segment may then exceed its bound
    /// until the next `put`. Absent keys and non-resident keys whose value is
    /// gone count as misses and change nothing.
    pub fn get(&mut self, key: i64) -> Option<Arc<V>> {
        let found = self
            .find(key)
            .and_then(|id| self.entries[id].live_value().map(|value| (id, value)));
        let Some((id, value)) = found else {
            self.misses += 1;
            return None;
        };
        if let Err(err) = self.access(id) {
            error!(key, %err, "LIRS segment inconsistent after access");
            debug_assert!(false, "{err}");
        }
        self.hits += 1;
        Some(value)
    }

    /// Returns the value for `key` without touching recency or counters.
    ///
    /// Like `get`, this sees the value of a non-resident entry that is still
    /// held elsewhere, but leaves the entry non-resident.
    pub fn peek(&self, key: i64) -> Option<Arc<V>> {
        self.find(key).and_then(|id| self.entries[id].live_value())
    }

    /// `true` if `key` is resident (hot or cold).
    pub fn contains_key(&self, key: i64) -> bool {
        self.find(key)
            .is_some_and(|id| self.entries[id].value.is_some())
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.iter().any(|(_, v)| **v == *value)
    }

    /// Classification of `key`, or `None` if the segment has never seen it
    /// (or has forgotten it).
    pub fn state(&self, key: i64) -> Option<EntryState> {
        self.find(key).map(|id| self.entries[id].state())
    }

    /// Charged memory of `key` including the per-entry overhead; 0 if the
    /// key is absent or non-resident.
    pub fn memory(&self, key: i64) -> i32 {
        self.find(key)
            .map_or(0, |id| self.entries[id].resident_memory())
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Stores `value` under `key` with caller-declared cost `memory`.
    ///
    /// Any existing entry for `key`, resident or not, is removed first and its
    /// value returned. A value whose charged cost exceeds the segment bound is
    /// not stored.
    ///
    /// # Errors
    ///
    /// - [`CacheError::InvalidArgument`] if `memory` is negative or too large
    ///   to add [`ENTRY_MEMORY_OVERHEAD`] to.
    /// - [`CacheError::InternalInconsistency`] if eviction finds the segment
    ///   in a broken state.
    pub fn put(&mut self, key: i64, value: V, memory: i32) -> Result<Option<Arc<V>>, CacheError> {
        self.put_shared(key, Arc::new(value), memory)
    }

    /// Like [`put`](Self::put) for a value the caller keeps a handle to.
    ///
    /// While that handle lives, the entry can be revived after eviction.
    ///
    /// # Errors
    ///
    /// As [`put`](Self::put).
    pub fn put_shared(
        &mut self,
        key: i64,
        value: Arc<V>,
        memory: i32,
    ) -> Result<Option<Arc<V>>, CacheError> {
        if memory < 0 {
            return Err(CacheError::invalid_argument(format!(
                "memory must be >= 0, got {memory} for key {key}"
            )));
        }
        let Some(cost) = memory.checked_add(ENTRY_MEMORY_OVERHEAD) else {
            return Err(CacheError::invalid_argument(format!(
                "memory {memory} for key {key} overflows with the entry overhead"
            )));
        };
        self.resize_if_needed();

        let existed = self.find(key).is_some();
        let old = if existed {
            self.remove_entry(key)
        } else {
            None
        };

        if i64::from(cost) > self.max_memory {
            trace!(key, cost, max_memory = self.max_memory, "value too large to cache");
            #[cfg(feature = "metrics")]
            self.metrics.record_rejected();
            return Ok(old);
        }

        let id = self.entries.insert(Entry::new(key, value, cost));
        let bucket = self.bucket_index(key);
        self.entries[id].map_next = self.buckets[bucket];
        self.buckets[bucket] = Some(id);
        self.used_memory += i64::from(cost);

        if self.used_memory > self.max_memory {
            self.evict()?;
            if self.stack.len > 0 {
                self.push_queue(QueueKind::Cold, id);
            }
        }
        self.map_size += 1;
        self.push_stack(id);

        #[cfg(feature = "metrics")]
        {
            if existed {
                self.metrics.record_update();
            } else {
                self.metrics.record_insert();
            }
        }

        if existed {
            self.access(id)?;
        }
        Ok(old)
    }

    /// Removes `key` from every structure and returns its value.
    ///
    /// A non-resident entry is forgotten too; its value is returned only if
    /// something still holds it.
    pub fn remove(&mut self, key: i64) -> Option<Arc<V>> {
        self.resize_if_needed();
        self.remove_entry(key)
    }

    fn remove_entry(&mut self, key: i64) -> Option<Arc<V>> {
        let bucket = self.bucket_index(key);
        let mut prev: Option<SlotId> = None;
        let mut cur = self.buckets[bucket];
        let id = loop {
            let id = cur?;
            if self.entries[id].key == key {
                break id;
            }
            prev = Some(id);
            cur = self.entries[id].map_next;
        };

        let next = self.entries[id].map_next;
        match prev {
            Some(p) => self.entries[p].map_next = next,
            None => self.buckets[bucket] = next,
        }
        self.map_size -= 1;
        self.used_memory -= i64::from(self.entries[id].resident_memory());

        if self.entries[id].on_stack {
            self.remove_from_stack(id);
        }
        if self.entries[id].is_hot() {
            // keep the hot count stable by promoting the newest cold entry
            if let Some(newest) = self.cold.head {
                self.remove_from_queue(newest);
                if !self.entries[newest].on_stack {
                    self.push_stack_bottom(newest);
                }
                #[cfg(feature = "metrics")]
                self.metrics.record_promotion();
            }
            self.prune_stack();
        } else {
            self.remove_from_queue(id);
        }

        self.entries.remove(id).and_then(|entry| entry.live_value())
    }

    /// Drops every entry and resets all counters. The memory bound is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.buckets = vec![None; INITIAL_TABLE_LEN];
        self.map_size = 0;
        self.stack = List::default();
        self.cold = List::default();
        self.non_resident = List::default();
        self.used_memory = 0;
        self.stack_move_counter = 0;
        self.hits = 0;
        self.misses = 0;
        #[cfg(feature = "metrics")]
        {
            self.metrics = LirsMetrics::default();
        }
    }

    /// Changes the memory bound. Nothing is evicted until the next `put`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`] if `max_memory <= 0`.
    pub fn set_max_memory(&mut self, max_memory: i64) -> Result<(), CacheError> {
        if max_memory <= 0 {
            return Err(CacheError::invalid_argument(format!(
                "max memory must be > 0, got {max_memory}"
            )));
        }
        self.max_memory = max_memory;
        Ok(())
    }

    /// Forgets the oldest non-resident entries until at most
    /// `non_resident_queue_size` per resident entry remain.
    ///
    /// Between that quota and `non_resident_queue_size_high` per resident
    /// entry, trimming stops at the first entry whose value is still held
    /// elsewhere.
    pub fn trim_non_resident_queue(&mut self) {
        let resident = self.map_size - self.non_resident.len;
        let limit = self.non_resident_queue_size.saturating_mul(resident);
        let limit_high = self.non_resident_queue_size_high.saturating_mul(resident);
        while self.non_resident.len > limit {
            let Some(oldest) = self.non_resident.tail else {
                break;
            };
            if self.non_resident.len <= limit_high && self.entries[oldest].is_revivable() {
                break;
            }
            let key = self.entries[oldest].key;
            self.remove_entry(key);
            trace!(key, "forgot non-resident entry");
            #[cfg(feature = "metrics")]
            self.metrics.record_non_resident_drop();
        }
    }

    // -----------------------------------------------------------------------
    // LIRS core
    // -----------------------------------------------------------------------

    /// Records a reference to an entry, reviving it first if it is
    /// non-resident with a live value.
    fn access(&mut self, id: SlotId) -> Result<(), CacheError> {
        let entry = &self.entries[id];
        if entry.is_hot() {
            if self.stack.head != Some(id)
                && entry.on_stack
                && self.stack_move_counter - entry.top_move > self.stack_move_distance
            {
                let was_tail = self.stack.tail == Some(id);
                self.remove_from_stack(id);
                if was_tail {
                    self.prune_stack();
                }
                self.push_stack(id);
            }
            return Ok(());
        }
        if entry.value.is_none() {
            let entry = &mut self.entries[id];
            let Some(value) = entry.weak.take().and_then(|weak| weak.upgrade()) else {
                return Ok(());
            };
            entry.value = Some(value);
            self.used_memory += i64::from(entry.memory);
            trace!(key = entry.key, memory = entry.memory, "revived non-resident entry");
            #[cfg(feature = "metrics")]
            self.metrics.record_revival();
        }

        self.remove_from_queue(id);
        if self.entries[id].on_stack {
            // second reference while still on the stack: becomes hot
            self.remove_from_stack(id);
            self.convert_oldest_hot_to_cold()?;
            #[cfg(feature = "metrics")]
            self.metrics.record_promotion();
        } else {
            self.push_queue(QueueKind::Cold, id);
        }
        self.push_stack(id);
        self.prune_stack();
        Ok(())
    }

    fn evict(&mut self) -> Result<(), CacheError> {
        loop {
            let before = (self.used_memory, self.stack.len, self.cold.len);
            self.evict_block()?;
            if self.used_memory <= self.max_memory {
                return Ok(());
            }
            if (self.used_memory, self.stack.len, self.cold.len) == before {
                return Err(CacheError::inconsistency(format!(
                    "eviction stalled with {} of {} bytes in use",
                    self.used_memory, self.max_memory
                )));
            }
        }
    }

    fn evict_block(&mut self) -> Result<(), CacheError> {
        // keep roughly 1/32 of resident entries cold
        while self.cold.len <= (self.map_size - self.non_resident.len) >> 5 && self.stack.len > 0 {
            self.convert_oldest_hot_to_cold()?;
        }
        while self.used_memory > self.max_memory {
            let Some(oldest) = self.cold.tail else {
                break;
            };
            self.remove_from_queue(oldest);
            let entry = &mut self.entries[oldest];
            self.used_memory -= i64::from(entry.memory);
            entry.evict_value();
            self.push_queue(QueueKind::NonResident, oldest);
            #[cfg(feature = "metrics")]
            self.metrics.record_cold_eviction();
            self.trim_non_resident_queue();
        }
        Ok(())
    }

    fn convert_oldest_hot_to_cold(&mut self) -> Result<(), CacheError> {
        let Some(last) = self.stack.tail else {
            return Err(CacheError::inconsistency(
                "cannot demote a hot entry: recency stack is empty",
            ));
        };
        if !self.entries[last].is_hot() {
            return Err(CacheError::inconsistency(format!(
                "stack tail {} is not hot",
                self.entries[last].key
            )));
        }
        self.remove_from_stack(last);
        self.push_queue(QueueKind::Cold, last);
        self.prune_stack();
        #[cfg(feature = "metrics")]
        self.metrics.record_demotion();
        Ok(())
    }

    /// Strips non-hot entries off the stack tail.
    fn prune_stack(&mut self) {
        while let Some(tail) = self.stack.tail {
            if self.entries[tail].is_hot() {
                break;
            }
            self.remove_from_stack(tail);
        }
    }

    // -----------------------------------------------------------------------
    // Stack and queue links
    // -----------------------------------------------------------------------

    fn push_stack(&mut self, id: SlotId) {
        let head = self.stack.head;
        let counter = self.stack_move_counter;
        self.stack_move_counter += 1;

        let entry = &mut self.entries[id];
        entry.top_move = counter;
        entry.on_stack = true;
        entry.stack_prev = None;
        entry.stack_next = head;
        match head {
            Some(h) => self.entries[h].stack_prev = Some(id),
            None => self.stack.tail = Some(id),
        }
        self.stack.head = Some(id);
        self.stack.len += 1;
    }

    fn push_stack_bottom(&mut self, id: SlotId) {
        let tail = self.stack.tail;
        let entry = &mut self.entries[id];
        entry.on_stack = true;
        entry.stack_next = None;
        entry.stack_prev = tail;
        match tail {
            Some(t) => self.entries[t].stack_next = Some(id),
            None => self.stack.head = Some(id),
        }
        self.stack.tail = Some(id);
        self.stack.len += 1;
    }

    fn remove_from_stack(&mut self, id: SlotId) {
        let entry = &mut self.entries[id];
        let prev = entry.stack_prev.take();
        let next = entry.stack_next.take();
        entry.on_stack = false;
        match prev {
            Some(p) => self.entries[p].stack_next = next,
            None => self.stack.head = next,
        }
        match next {
            Some(n) => self.entries[n].stack_prev = prev,
            None => self.stack.tail = prev,
        }
        self.stack.len -= 1;
    }

    fn queue_list(&mut self, kind: QueueKind) -> &mut List {
        match kind {
            QueueKind::Cold => &mut self.cold,
            QueueKind::NonResident => &mut self.non_resident,
        }
    }

    fn push_queue(&mut self, kind: QueueKind, id: SlotId) {
        let head = self.queue_list(kind).head;
        let entry = &mut self.entries[id];
        entry.queue = Some(kind);
        entry.queue_prev = None;
        entry.queue_next = head;
        match head {
            Some(h) => self.entries[h].queue_prev = Some(id),
            None => self.queue_list(kind).tail = Some(id),
        }
        let list = self.queue_list(kind);
        list.head = Some(id);
        list.len += 1;
    }

    fn remove_from_queue(&mut self, id: SlotId) {
        let entry = &mut self.entries[id];
        let Some(kind) = entry.queue.take() else {
            return;
        };
        let prev = entry.queue_prev.take();
        let next = entry.queue_next.take();
        match prev {
            Some(p) => self.entries[p].queue_next = next,
            None => self.queue_list(kind).head = next,
        }
        match next {
            Some(n) => self.entries[n].queue_prev = prev,
            None => self.queue_list(kind).tail = prev,
        }
        self.queue_list(kind).len -= 1;
    }

    // -----------------------------------------------------------------------
    // Hash table sizing
    // -----------------------------------------------------------------------

    /// Bucket count the table should move to, if any. Grows past 75% load,
    /// shrinks below 12.5% load once larger than 32 buckets.
    fn new_table_len(&self) -> Option<usize> {
        let len = self.buckets.len();
        if len * 3 < self.map_size * 4 && len < MAX_TABLE_LEN {
            Some(len * 2)
        } else if len > 32 && len / 8 > self.map_size {
            Some(len / 2)
        } else {
            None
        }
    }

    fn resize_if_needed(&mut self) {
        if let Some(new_len) = self.new_table_len() {
            self.rehash(new_len);
        }
    }

    fn rehash(&mut self, new_len: usize) {
        let old_len = self.buckets.len();
        self.buckets = vec![None; new_len];
        for id in self.entries.ids() {
            let bucket = self.bucket_index(self.entries[id].key);
            self.entries[id].map_next = self.buckets[bucket];
            self.buckets[bucket] = Some(id);
        }
        debug!(old_len, new_len, entries = self.map_size, "resized LIRS segment table");
        #[cfg(feature = "metrics")]
        self.metrics.record_resize();
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Resident entries (hot + cold).
    pub fn size(&self) -> usize {
        self.map_size - self.non_resident.len
    }

    pub fn size_hot(&self) -> usize {
        self.map_size - self.cold.len - self.non_resident.len
    }

    pub fn size_non_resident(&self) -> usize {
        self.non_resident.len
    }

    /// Number of hash buckets.
    pub fn size_map_array(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn used_memory(&self) -> i64 {
        self.used_memory
    }

    pub fn max_memory(&self) -> i64 {
        self.max_memory
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Keys of one structure in its natural order (see [`KeyFilter`]).
    pub fn keys(&self, filter: KeyFilter) -> Vec<i64> {
        let (list, stack) = match filter {
            KeyFilter::Stack => (self.stack, true),
            KeyFilter::Cold => (self.cold, false),
            KeyFilter::NonResident => (self.non_resident, false),
        };
        let mut keys = Vec::with_capacity(list.len);
        let mut cur = list.head;
        while let Some(id) = cur {
            let entry = &self.entries[id];
            keys.push(entry.key);
            cur = if stack { entry.stack_next } else { entry.queue_next };
        }
        keys
    }

    /// Resident `(key, value)` pairs in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &Arc<V>)> {
        self.entries
            .iter()
            .filter_map(|(_, entry)| entry.value.as_ref().map(|value| (entry.key, value)))
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> LirsMetrics {
        LirsMetrics {
            hits: self.hits,
            misses: self.misses,
            ..self.metrics
        }
    }

    /// Zeroes hit/miss counters and feature-gated metrics.
    pub fn reset_metrics(&mut self) {
        self.hits = 0;
        self.misses = 0;
        #[cfg(feature = "metrics")]
        {
            self.metrics = LirsMetrics::default();
        }
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    fn walk(
        &self,
        name: &str,
        list: List,
        links: impl Fn(&Entry<V>) -> (Option<SlotId>, Option<SlotId>),
    ) -> Result<Vec<SlotId>, CacheError> {
        let mut ids = Vec::with_capacity(list.len);
        let mut prev: Option<SlotId> = None;
        let mut cur = list.head;
        while let Some(id) = cur {
            let entry = self.entries.get(id).ok_or_else(|| {
                CacheError::inconsistency(format!("{name} links vacant slot {}", id.index()))
            })?;
            let (entry_prev, entry_next) = links(entry);
            if entry_prev != prev {
                return Err(CacheError::inconsistency(format!(
                    "{name} back link of key {} is broken",
                    entry.key
                )));
            }
            ids.push(id);
            if ids.len() > self.entries.len() {
                return Err(CacheError::inconsistency(format!("{name} contains a cycle")));
            }
            prev = Some(id);
            cur = entry_next;
        }
        if prev != list.tail {
            return Err(CacheError::inconsistency(format!("{name} tail pointer is stale")));
        }
        if ids.len() != list.len {
            return Err(CacheError::inconsistency(format!(
                "{name} length {} but {} linked",
                list.len,
                ids.len()
            )));
        }
        Ok(ids)
    }

    /// Verifies every structural invariant of the segment.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InternalInconsistency`] describing the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), CacheError> {
        let mut chained = 0usize;
        let mut seen = FxHashSet::default();
        for (bucket, head) in self.buckets.iter().enumerate() {
            let mut cur = *head;
            while let Some(id) = cur {
                let entry = self.entries.get(id).ok_or_else(|| {
                    CacheError::inconsistency(format!("bucket {bucket} links vacant slot"))
                })?;
                if self.bucket_index(entry.key) != bucket {
                    return Err(CacheError::inconsistency(format!(
                        "key {} chained in bucket {bucket}",
                        entry.key
                    )));
                }
                if !seen.insert(entry.key) {
                    return Err(CacheError::inconsistency(format!(
                        "key {} appears twice",
                        entry.key
                    )));
                }
                chained += 1;
                if chained > self.entries.len() {
                    return Err(CacheError::inconsistency("hash chain contains a cycle"));
                }
                cur = entry.map_next;
            }
        }
        if chained != self.entries.len() || chained != self.map_size {
            return Err(CacheError::inconsistency(format!(
                "map size {} but {chained} chained and {} stored",
                self.map_size,
                self.entries.len()
            )));
        }

        let stack = self.walk("stack", self.stack, |e| (e.stack_prev, e.stack_next))?;
        if let Some(tail) = self.stack.tail {
            if !self.entries[tail].is_hot() {
                return Err(CacheError::inconsistency("stack tail is not hot"));
            }
        }
        if stack.iter().any(|&id| !self.entries[id].on_stack) {
            return Err(CacheError::inconsistency("stacked entry not flagged on_stack"));
        }

        let cold = self.walk("cold queue", self.cold, |e| (e.queue_prev, e.queue_next))?;
        for id in cold {
            let entry = &self.entries[id];
            if entry.queue != Some(QueueKind::Cold) || entry.value.is_none() {
                return Err(CacheError::inconsistency(format!(
                    "cold queue holds key {} in state {:?}",
                    entry.key,
                    entry.state()
                )));
            }
        }
        let non_resident =
            self.walk("non-resident queue", self.non_resident, |e| (e.queue_prev, e.queue_next))?;
        for id in non_resident {
            let entry = &self.entries[id];
            if entry.queue != Some(QueueKind::NonResident) || entry.value.is_some() {
                return Err(CacheError::inconsistency(format!(
                    "non-resident queue holds key {} with a value",
                    entry.key
                )));
            }
        }

        let mut on_stack = 0usize;
        let mut hot = 0usize;
        let mut used = 0i64;
        for (_, entry) in self.entries.iter() {
            if entry.on_stack {
                on_stack += 1;
            }
            if entry.is_hot() {
                hot += 1;
                if !entry.on_stack {
                    return Err(CacheError::inconsistency(format!(
                        "hot key {} is not on the stack",
                        entry.key
                    )));
                }
                if entry.value.is_none() {
                    return Err(CacheError::inconsistency(format!(
                        "hot key {} has no value",
                        entry.key
                    )));
                }
            }
            used += i64::from(entry.resident_memory());
        }
        if on_stack != self.stack.len {
            return Err(CacheError::inconsistency("on_stack flags disagree with stack"));
        }
        if hot != self.size_hot() {
            return Err(CacheError::inconsistency(format!(
                "{hot} hot entries but size_hot is {}",
                self.size_hot()
            )));
        }
        if used != self.used_memory {
            return Err(CacheError::inconsistency(format!(
                "used memory {} but entries hold {used}",
                self.used_memory
            )));
        }
        Ok(())
    }
}

impl<V> fmt::Debug for Segment<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("size", &self.size())
            .field("size_hot", &self.size_hot())
            .field("size_non_resident", &self.size_non_resident())
            .field("used_memory", &self.used_memory)
            .field("max_memory", &self.max_memory)
            .field("table_len", &self.buckets.len())
            .finish()
    }
}
