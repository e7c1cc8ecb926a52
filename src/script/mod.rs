//! Scripted runs.
//!
//! A [`Script`] is a named list of actions with optional delays. A
//! [`ScriptRunner`] executes scripts strictly in sequence against one
//! client and clears the session after each run.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `definition` | [`Script`], [`ScriptStep`] and their JSON form |
//! | `runner` | [`ScriptRunner`] |

// ============================================================================
// Submodules
// ============================================================================

/// Script definitions.
pub mod definition;

/// Sequential execution.
pub mod runner;

// ============================================================================
// Re-exports
// ============================================================================

pub use definition::{Script, ScriptStep};
pub use runner::ScriptRunner;
