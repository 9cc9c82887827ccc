//! Cache entry and its intrusive links.

use std::sync::{Arc, Weak};

use crate::ds::SlotId;

/// Bookkeeping bytes charged to every entry on top of the caller's cost.
pub const ENTRY_MEMORY_OVERHEAD: i32 = 64;

/// Classification of a cached key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Low inter-reference recency. Resident and protected from eviction.
    Hot,
    /// Resident, but first in line for eviction.
    Cold,
    /// Evicted. Only the key, its recency history and a weak handle to the
    /// old value remain.
    NonResident,
}

/// Which queue an entry is linked into. Hot entries are in neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueKind {
    Cold,
    NonResident,
}

#[derive(Debug)]
pub(crate) struct Entry<V> {
    pub(crate) key: i64,
    /// Set while resident.
    pub(crate) value: Option<Arc<V>>,
    /// Set while non-resident; upgrades as long as a caller still holds the
    /// value.
    pub(crate) weak: Option<Weak<V>>,
    /// Charged cost including [`ENTRY_MEMORY_OVERHEAD`]. Kept after eviction
    /// so a revived entry is charged the same again.
    pub(crate) memory: i32,
    /// Stack move counter at the last move to the stack head.
    pub(crate) top_move: u64,
    pub(crate) queue: Option<QueueKind>,
    pub(crate) on_stack: bool,
    pub(crate) stack_prev: Option<SlotId>,
    pub(crate) stack_next: Option<SlotId>,
    pub(crate) queue_prev: Option<SlotId>,
    pub(crate) queue_next: Option<SlotId>,
    pub(crate) map_next: Option<SlotId>,
}

impl<V> Entry<V> {
    pub(crate) fn new(key: i64, value: Arc<V>, memory: i32) -> Self {
        Self {
            key,
            value: Some(value),
            weak: None,
            memory,
            top_move: 0,
            queue: None,
            on_stack: false,
            stack_prev: None,
            stack_next: None,
            queue_prev: None,
            queue_next: None,
            map_next: None,
        }
    }

    #[inline]
    pub(crate) fn is_hot(&self) -> bool {
        self.queue.is_none()
    }

    pub(crate) fn state(&self) -> EntryState {
        match self.queue {
            None => EntryState::Hot,
            Some(QueueKind::Cold) => EntryState::Cold,
            Some(QueueKind::NonResident) => EntryState::NonResident,
        }
    }

    /// Memory this entry currently holds against the segment budget.
    #[inline]
    pub(crate) fn resident_memory(&self) -> i32 {
        if self.value.is_some() { self.memory } else { 0 }
    }

    /// The resident value, or the evicted one if something still holds it.
    pub(crate) fn live_value(&self) -> Option<Arc<V>> {
        match &self.value {
            Some(value) => Some(Arc::clone(value)),
            None => self.weak.as_ref().and_then(Weak::upgrade),
        }
    }

    /// `true` for a non-resident entry whose value can still be revived.
    pub(crate) fn is_revivable(&self) -> bool {
        self.value.is_none() && self.weak.as_ref().is_some_and(|w| w.strong_count() > 0)
    }

    /// Drops the value, keeping a weak handle to it.
    pub(crate) fn evict_value(&mut self) {
        self.weak = self.value.take().map(|value| Arc::downgrade(&value));
    }
}
