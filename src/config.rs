//! Cache configuration.
//!
//! ## LirsConfig
//!
//! | Field                     | Type    | Default | Description                              |
//! |---------------------------|---------|---------|------------------------------------------|
//! | `max_memory`              | `i64`   | 1       | Memory bound summed over all segments    |
//! | `segment_count`           | `usize` | 16      | Rounded up to a power of two             |
//! | `stack_move_distance`     | `u32`   | 32      | Head-moves tolerated before a hot entry  |
//! |                           |         |         | is moved to the stack head again         |
//! | `non_resident_queue_size` | `u32`   | 3       | Non-resident entries kept per resident   |
//! | `non_resident_queue_size_high` | `u32` | 12   | Same, while the oldest non-resident      |
//! |                           |         |         | value is still referenced elsewhere      |
//!
//! A `stack_move_distance` of 0 moves a hot entry on every access that finds
//! it below the head. Larger values trade recency precision for fewer stack
//! writes under read-heavy load.
//!
//! ## Example
//!
//! ```
//! use lirskit::config::LirsConfig;
//!
//! let config = LirsConfig {
//!     max_memory: 64 * 1024 * 1024,
//!     segment_count: 12,
//!     ..LirsConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.effective_segment_count(), 16);
//! ```

use crate::error::ConfigError;

pub const DEFAULT_MAX_MEMORY: i64 = 1;
pub const DEFAULT_SEGMENT_COUNT: usize = 16;
pub const DEFAULT_STACK_MOVE_DISTANCE: u32 = 32;
pub const DEFAULT_NON_RESIDENT_QUEUE_SIZE: u32 = 3;
pub const DEFAULT_NON_RESIDENT_QUEUE_SIZE_HIGH: u32 = 12;
/// Cost charged by `insert`/`put_all` when no weigher is configured.
pub const DEFAULT_ENTRY_COST: i32 = 16;
/// Upper bound on `segment_count`, before rounding.
pub const MAX_SEGMENT_COUNT: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LirsConfig {
    pub max_memory: i64,
    pub segment_count: usize,
    pub stack_move_distance: u32,
    pub non_resident_queue_size: u32,
    /// Upper quota applied while the oldest non-resident entry can still be
    /// revived. Never below `non_resident_queue_size`.
    pub non_resident_queue_size_high: u32,
}

impl Default for LirsConfig {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_MAX_MEMORY,
            segment_count: DEFAULT_SEGMENT_COUNT,
            stack_move_distance: DEFAULT_STACK_MOVE_DISTANCE,
            non_resident_queue_size: DEFAULT_NON_RESIDENT_QUEUE_SIZE,
            non_resident_queue_size_high: DEFAULT_NON_RESIDENT_QUEUE_SIZE_HIGH,
        }
    }
}

impl LirsConfig {
    /// Checks every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_memory` is not positive,
    /// `segment_count` exceeds [`MAX_SEGMENT_COUNT`], or the high
    /// non-resident quota is below the regular one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory <= 0 {
            return Err(ConfigError::new(format!(
                "max_memory must be > 0, got {}",
                self.max_memory
            )));
        }
        if self.segment_count > MAX_SEGMENT_COUNT {
            return Err(ConfigError::new(format!(
                "segment_count must be <= {MAX_SEGMENT_COUNT}, got {}",
                self.segment_count
            )));
        }
        if self.non_resident_queue_size_high < self.non_resident_queue_size {
            return Err(ConfigError::new(format!(
                "non_resident_queue_size_high ({}) must be >= non_resident_queue_size ({})",
                self.non_resident_queue_size_high, self.non_resident_queue_size
            )));
        }
        Ok(())
    }

    /// Segment count actually used: rounded up to a power of two, at least 1.
    pub fn effective_segment_count(&self) -> usize {
        self.segment_count.max(1).next_power_of_two()
    }
}

/// Splits `total` into `parts` bounds that sum to `total`.
///
/// The remainder goes to the first segments. Every bound is at least 1, so
/// when `total < parts` the bounds sum to `parts` instead.
pub(crate) fn split_memory(total: i64, parts: usize) -> impl Iterator<Item = i64> {
    let parts_i = parts as i64;
    let base = total / parts_i;
    let extra = total % parts_i;
    (0..parts_i).map(move |i| (base + i64::from(i < extra)).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = LirsConfig::default();
        assert_eq!(config.max_memory, 1);
        assert_eq!(config.segment_count, 16);
        assert_eq!(config.stack_move_distance, 32);
        assert_eq!(config.non_resident_queue_size, 3);
        assert_eq!(config.non_resident_queue_size_high, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn high_quota_below_regular_is_rejected() {
        let config = LirsConfig {
            non_resident_queue_size: 4,
            non_resident_queue_size_high: 2,
            ..LirsConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.message().contains("non_resident_queue_size_high"));

        let equal = LirsConfig {
            non_resident_queue_size_high: 4,
            ..config
        };
        assert!(equal.validate().is_ok());
    }

    #[test]
    fn non_positive_memory_is_rejected() {
        for max_memory in [0, -1, i64::MIN] {
            let config = LirsConfig {
                max_memory,
                ..LirsConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.message().contains("max_memory"));
        }
    }

    #[test]
    fn oversized_segment_count_is_rejected() {
        let config = LirsConfig {
            segment_count: MAX_SEGMENT_COUNT + 1,
            ..LirsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_segment_count_rounds_up() {
        let mut config = LirsConfig::default();
        config.segment_count = 0;
        assert_eq!(config.effective_segment_count(), 1);
        config.segment_count = 5;
        assert_eq!(config.effective_segment_count(), 8);
        config.segment_count = 64;
        assert_eq!(config.effective_segment_count(), 64);
    }

    #[test]
    fn split_memory_sums_to_total() {
        let parts: Vec<i64> = split_memory(10, 4).collect();
        assert_eq!(parts, vec![3, 3, 2, 2]);
        assert_eq!(split_memory(1 << 40, 16).sum::<i64>(), 1 << 40);
    }

    #[test]
    fn split_memory_never_yields_zero() {
        let parts: Vec<i64> = split_memory(2, 4).collect();
        assert_eq!(parts, vec![1, 1, 1, 1]);
    }
}
