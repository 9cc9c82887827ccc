use std::fmt;

use super::traits::LirsMetricsRecorder;

/// Counters for one segment, or the sum over all segments of a cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LirsMetrics {
    /// Number of `get` calls that returned a value.
    pub hits: u64,
    /// Number of `get` calls on absent or non-resident keys.
    pub misses: u64,
    /// Number of puts for keys that were not present.
    pub inserts: u64,
    /// Number of puts that replaced an existing entry (resident or not).
    pub updates: u64,
    /// Number of puts refused because the value exceeds the segment bound.
    pub rejected: u64,
    /// Number of cold entries promoted to hot.
    pub promotions: u64,
    /// Number of hot entries demoted to cold.
    pub demotions: u64,
    /// Number of cold entries that lost their value and became non-resident.
    pub cold_evictions: u64,
    /// Number of non-resident entries brought back by `get`.
    pub revivals: u64,
    /// Number of non-resident entries forgotten by the quota.
    pub non_resident_drops: u64,
    /// Number of hash table resizes.
    pub resizes: u64,
}

impl LirsMetrics {
    /// Fraction of `get` calls that hit, in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Adds every counter of `other` into `self`.
    pub fn merge(&mut self, other: &LirsMetrics) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.inserts += other.inserts;
        self.updates += other.updates;
        self.rejected += other.rejected;
        self.promotions += other.promotions;
        self.demotions += other.demotions;
        self.cold_evictions += other.cold_evictions;
        self.revivals += other.revivals;
        self.non_resident_drops += other.non_resident_drops;
        self.resizes += other.resizes;
    }
}

impl LirsMetricsRecorder for LirsMetrics {
    #[inline]
    fn record_insert(&mut self) {
        self.inserts += 1;
    }

    #[inline]
    fn record_update(&mut self) {
        self.updates += 1;
    }

    #[inline]
    fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    #[inline]
    fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    #[inline]
    fn record_demotion(&mut self) {
        self.demotions += 1;
    }

    #[inline]
    fn record_cold_eviction(&mut self) {
        self.cold_evictions += 1;
    }

    #[inline]
    fn record_revival(&mut self) {
        self.revivals += 1;
    }

    #[inline]
    fn record_non_resident_drop(&mut self) {
        self.non_resident_drops += 1;
    }

    #[inline]
    fn record_resize(&mut self) {
        self.resizes += 1;
    }
}

impl fmt::Display for LirsMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LirsMetrics {{ hits: {}, misses: {}, hit_rate: {:.2}%, inserts: {}, updates: {}, \
             rejected: {}, promotions: {}, demotions: {}, cold_evictions: {}, revivals: {}, \
             non_resident_drops: {}, resizes: {} }}",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.inserts,
            self.updates,
            self.rejected,
            self.promotions,
            self.demotions,
            self.cold_evictions,
            self.revivals,
            self.non_resident_drops,
            self.resizes
        )
    }
}
