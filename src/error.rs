//! Error types for the lirskit library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by cache operations. Either the caller passed an
//!   argument the cache cannot accept ([`CacheError::InvalidArgument`]) or an
//!   internal invariant was found broken ([`CacheError::InternalInconsistency`]).
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. a non-positive memory bound). Converts into
//!   [`CacheError::InvalidArgument`].
//!
//! ## Example Usage
//!
//! ```
//! use lirskit::error::{CacheError, ConfigError};
//! use lirskit::policy::lirs::LirsCache;
//!
//! let cache = LirsCache::<u64>::builder().max_memory(4096).build();
//!
//! // Negative memory cost is rejected without touching the cache
//! let err = cache.put(1, 10, -1).unwrap_err();
//! assert!(matches!(err, CacheError::InvalidArgument(_)));
//!
//! // Invalid configuration is caught without panicking
//! let bad: Result<LirsCache<u64>, ConfigError> =
//!     LirsCache::builder().max_memory(0).try_build();
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by fallible cache operations.
///
/// `InvalidArgument` is a caller error and leaves the cache untouched.
/// `InternalInconsistency` signals a defect: some structural invariant of a
/// segment no longer holds. It is also what
/// [`Segment::check_invariants`](crate::policy::lirs::Segment::check_invariants)
/// reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The operation was called with an argument it cannot accept.
    InvalidArgument(String),
    /// A structural invariant was violated.
    InternalInconsistency(String),
}

impl CacheError {
    /// Creates an [`CacheError::InvalidArgument`] with the given description.
    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an [`CacheError::InternalInconsistency`] with the given description.
    #[inline]
    pub fn inconsistency(msg: impl Into<String>) -> Self {
        Self::InternalInconsistency(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(msg) | Self::InternalInconsistency(msg) => msg,
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::InternalInconsistency(msg) => write!(f, "internal inconsistency: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<ConfigError> for CacheError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidArgument(err.0)
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`LirsConfig::validate`](crate::config::LirsConfig::validate)
/// and builder `try_build()` methods.
///
/// # Example
///
/// ```
/// use lirskit::config::LirsConfig;
///
/// let config = LirsConfig { max_memory: -5, ..LirsConfig::default() };
/// let err = config.validate().unwrap_err();
/// assert!(err.to_string().contains("max_memory"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- CacheError -------------------------------------------------------

    #[test]
    fn invalid_argument_display_is_prefixed() {
        let err = CacheError::invalid_argument("memory must be >= 0");
        assert_eq!(err.to_string(), "invalid argument: memory must be >= 0");
        assert_eq!(err.message(), "memory must be >= 0");
    }

    #[test]
    fn inconsistency_display_is_prefixed() {
        let err = CacheError::inconsistency("stack tail is cold");
        assert_eq!(err.to_string(), "internal inconsistency: stack tail is cold");
        assert!(matches!(err, CacheError::InternalInconsistency(_)));
    }

    #[test]
    fn cache_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(CacheError::inconsistency("x"));
        assert!(err.to_string().contains('x'));
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("max_memory must be > 0");
        assert_eq!(err.to_string(), "max_memory must be > 0");
        assert_eq!(err.message(), "max_memory must be > 0");
    }

    #[test]
    fn config_error_converts_to_invalid_argument() {
        let err: CacheError = ConfigError::new("segment_count too large").into();
        assert_eq!(
            err,
            CacheError::InvalidArgument("segment_count too large".into())
        );
    }

    #[test]
    fn errors_are_clone_and_eq() {
        let a = ConfigError::new("same");
        assert_eq!(a.clone(), a);
        let b = CacheError::invalid_argument("same");
        assert_eq!(b.clone(), b);
        assert_ne!(b, CacheError::inconsistency("same"));
    }
}
