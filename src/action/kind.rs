//! Action kind discriminant and its stable string names.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ============================================================================
// ActionKind
// ============================================================================

/// Kind of an [`Action`](super::Action).
///
/// String names are the stable vocabulary used by JSON scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// `generic-request`
    Request,
    /// `ajax`
    Ajax,
    /// `get`
    Get,
    /// `post`
    Post,
    /// `page-unload`
    PageUnload,
    /// `load-static-assets`
    LoadStaticAssets,
    /// `channel-connect`
    ChannelConnect,
    /// `emit`
    Emit,
    /// `await-emit`
    AwaitEmit,
    /// `confirm-no-emit`
    ConfirmNoEmit,
    /// `confirm-no-matching-emit`
    ConfirmNoMatchingEmit,
    /// `connect-and-await-emit`
    ConnectAndAwaitEmit,
    /// `connect-and-confirm-no-emit`
    ConnectAndConfirmNoEmit,
}

impl ActionKind {
    /// Every kind, in vocabulary order.
    pub const ALL: [Self; 13] = [
        Self::Request,
        Self::Ajax,
        Self::Get,
        Self::Post,
        Self::PageUnload,
        Self::LoadStaticAssets,
        Self::ChannelConnect,
        Self::Emit,
        Self::AwaitEmit,
        Self::ConfirmNoEmit,
        Self::ConfirmNoMatchingEmit,
        Self::ConnectAndAwaitEmit,
        Self::ConnectAndConfirmNoEmit,
    ];

    /// Returns the stable name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "generic-request",
            Self::Ajax => "ajax",
            Self::Get => "get",
            Self::Post => "post",
            Self::PageUnload => "page-unload",
            Self::LoadStaticAssets => "load-static-assets",
            Self::ChannelConnect => "channel-connect",
            Self::Emit => "emit",
            Self::AwaitEmit => "await-emit",
            Self::ConfirmNoEmit => "confirm-no-emit",
            Self::ConfirmNoMatchingEmit => "confirm-no-matching-emit",
            Self::ConnectAndAwaitEmit => "connect-and-await-emit",
            Self::ConnectAndConfirmNoEmit => "connect-and-confirm-no-emit",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::unknown_action_kind(s))
    }
}

// ============================================================================
// Tests
// ============================================================================
