use thiserror::Error;

use crate::sys::bridge::{BridgeError, WindowId};

/// Failure taxonomy for the core. Every variant is contained within the
/// action that produced it; none of them abort the event loop.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// A single compositor call failed; the affected window is skipped
    /// for this action and may succeed on the next retile.
    #[error("bridge call failed for this action: {0}")]
    BridgeTransient(#[from] BridgeError),
    /// The accessibility element backing a tracked window is gone. The
    /// window stops being managed but stays tracked until the observer
    /// reports destruction.
    #[error("lost the element for window {0:?}, no longer managing it")]
    IdentityLost(WindowId),
    /// Internal inconsistency, e.g. the column flattening diverging from
    /// the tile order. The core re-derives and continues.
    #[error("internal invariant violated: {0}")]
    InvariantViolated(String),
    /// Accessibility or input-monitoring trust is absent.
    #[error("missing permission: {0}")]
    PermissionMissing(&'static str),
    #[error("window {0:?} is not tracked")]
    WindowNotFound(WindowId),
}
