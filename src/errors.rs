//! The crate's single public error surface.
//!
//! Every fallible operation on [`crate::ClassicBrowserService`] and its
//! component services returns `Result<_, CoreError>`. Component-local
//! recoverable errors (a destroy failure on an already-dead renderer, a
//! swallowed capture failure) are logged and never reach this type.

use crate::ids::{TabId, WindowId};

/// Errors that can cross a component boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// `ViewPool::acquire` failed while constructing a new renderer.
    #[error("renderer creation failed for tab {tab_id}: {reason}")]
    RendererCreationFailed { tab_id: TabId, reason: String },

    /// The engine reported a load failure on the main frame.
    #[error("navigation to {url} failed for tab {tab_id}: {reason}")]
    NavigationFailed {
        tab_id: TabId,
        url: String,
        reason: String,
    },

    /// A snapshot could not be produced.
    #[error("snapshot capture failed for window {window_id}: {reason}")]
    CaptureFailed { window_id: WindowId, reason: String },

    /// A defensive invariant was violated; the triggering event was dropped.
    #[error("invariant broken: {detail}")]
    InvariantBroken { detail: String },

    /// A navigation was rejected by URL policy (scheme not allow-listed, etc).
    #[error("insecure url rejected: {url}")]
    InsecureUrl { url: String },

    /// No window exists with this id.
    #[error("unknown window {0}")]
    UnknownWindow(WindowId),

    /// No tab exists with this id.
    #[error("unknown tab {0}")]
    UnknownTab(TabId),

    /// Reserved for a future hard cap on pool size; not currently raised
    /// (`MAX_POOL_SIZE` is enforced by eviction, not rejection).
    #[error("view pool exhausted")]
    PoolExhausted,
}
