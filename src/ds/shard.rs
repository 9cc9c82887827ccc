//! Key-to-segment routing for the sharded cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Segment Selection Flow                           │
//! │                                                                         │
//! │   i64 key                                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   mix64(key)  ── 64-bit finalizer, every input bit affects every        │
//! │       │          output bit                                             │
//! │       ▼                                                                 │
//! │   ┌─────────────────────────────── hash ─────────────────────────────┐  │
//! │   │ ... bucket bits (used inside the segment) ... │ segment bits (s) │  │
//! │   └───────────────────────────────────────────────┴──────────────────┘  │
//! │                                                                         │
//! │   segment = hash & (segments - 1)                                       │
//! │   bucket  = (hash >> s) & (buckets - 1)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The segment count is always a power of two so the segment index is a mask
//! of the low bits. Buckets use the bits above them, so keys that share a
//! segment still spread evenly over that segment's hash table.
//!
//! ## Example Usage
//!
//! ```
//! use lirskit::ds::SegmentSelector;
//!
//! let selector = SegmentSelector::new(6);
//! assert_eq!(selector.segment_count(), 8);
//! assert_eq!(selector.segment_bits(), 3);
//!
//! let seg = selector.segment_for_key(42);
//! assert!(seg < 8);
//! assert_eq!(selector.segment_for_key(42), seg);
//! ```

/// 64-bit finalizer from MurmurHash3.
#[inline]
pub fn mix64(key: i64) -> u64 {
    let mut h = key as u64;
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

/// Routes keys to one of a power-of-two number of segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSelector {
    mask: u64,
    bits: u32,
}

impl SegmentSelector {
    /// Creates a selector, rounding `segments` up to a power of two.
    /// Zero is treated as one.
    pub fn new(segments: usize) -> Self {
        let count = segments.max(1).next_power_of_two();
        Self {
            mask: (count - 1) as u64,
            bits: count.trailing_zeros(),
        }
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.mask as usize + 1
    }

    /// Number of low hash bits consumed by segment selection.
    #[inline]
    pub fn segment_bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    pub fn segment_for_key(&self, key: i64) -> usize {
        (mix64(key) & self.mask) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_power_of_two() {
        assert_eq!(SegmentSelector::new(0).segment_count(), 1);
        assert_eq!(SegmentSelector::new(1).segment_count(), 1);
        assert_eq!(SegmentSelector::new(3).segment_count(), 4);
        assert_eq!(SegmentSelector::new(16).segment_count(), 16);
        assert_eq!(SegmentSelector::new(17).segment_count(), 32);
    }

    #[test]
    fn segment_bits_match_count() {
        assert_eq!(SegmentSelector::new(1).segment_bits(), 0);
        assert_eq!(SegmentSelector::new(16).segment_bits(), 4);
        assert_eq!(SegmentSelector::new(100).segment_bits(), 7);
    }

    #[test]
    fn single_segment_takes_everything() {
        let selector = SegmentSelector::new(1);
        for key in [-5, 0, 1, i64::MAX, i64::MIN] {
            assert_eq!(selector.segment_for_key(key), 0);
        }
    }

    #[test]
    fn sequential_keys_spread_over_segments() {
        let selector = SegmentSelector::new(8);
        let mut counts = [0usize; 8];
        for key in 0..8_000 {
            counts[selector.segment_for_key(key)] += 1;
        }
        for count in counts {
            assert!((600..=1_400).contains(&count), "skewed: {counts:?}");
        }
    }

    #[test]
    fn mix64_is_deterministic_and_not_identity() {
        assert_eq!(mix64(12345), mix64(12345));
        assert_ne!(mix64(1), 1);
        assert_ne!(mix64(1), mix64(2));
        assert_eq!(mix64(0), 0);
    }
}
