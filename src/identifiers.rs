//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Identifies |
//! |------|------------|
//! | [`ListenerId`] | One listener registered on a channel |
//! | [`PageId`] | One loaded page within a session |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Counters
// ============================================================================

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// ListenerId
// ============================================================================

/// Identifier of a listener registered with [`Channel::on`](crate::transport::Channel::on).
///
/// Unique process-wide, so a stale id can never remove someone else's listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates the next listener ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// PageId
// ============================================================================

/// Identifier of a loaded page.
///
/// A connect attempt remembers the page it started on; if the page was
/// replaced meanwhile the new channel is not attached to the new page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(u64);

impl PageId {
    /// Allocates the next page ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_PAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_ids_are_unique() {
        let a = ListenerId::next();
        let b = ListenerId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_page_id_display() {
        let id = PageId::next();
        assert!(id.to_string().starts_with("page-"));
    }
}
