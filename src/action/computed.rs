//! Values that are either fixed or computed at call time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Computed
// ============================================================================

/// A value fixed up front or produced by a closure each time it is needed.
///
/// Load scripts use the closure form for per-call payloads and jittered
/// delays.
pub enum Computed<T> {
    /// Same value every time.
    Fixed(T),
    /// Evaluated on every [`resolve`](Self::resolve).
    With(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> Computed<T> {
    /// Creates a computed value from a closure.
    #[inline]
    pub fn with<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::With(Arc::new(f))
    }

    /// Produces the current value.
    #[inline]
    #[must_use]
    pub fn resolve(&self) -> T {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::With(f) => f(),
        }
    }
}

impl<T: Clone> Clone for Computed<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(value) => Self::Fixed(value.clone()),
            Self::With(f) => Self::With(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::With(_) => f.write_str("With(<fn>)"),
        }
    }
}

impl<T> From<T> for Computed<T> {
    #[inline]
    fn from(value: T) -> Self {
        Self::Fixed(value)
    }
}

impl From<&str> for Computed<String> {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Fixed(value.to_string())
    }
}

// ============================================================================
// Aliases
// ============================================================================

/// Request parameter value.
pub type Param = Computed<String>;

/// Timeout or delay.
pub type Delay = Computed<Duration>;

// ============================================================================
// Tests
// ============================================================================
