//! Events reported by the window observer, and the handle the core uses
//! to pause it during its own bulk mutations.
//!
//! The observer itself (OS notifications plus a poll fallback) lives
//! outside this crate; it feeds [`WindowEvent`]s into the core's queue.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::sys::bridge::{pid_t, WindowId};
use crate::sys::geometry::Point;

/// Notifications delivered to the core, in observation order.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Created {
        window_id: WindowId,
        pid: pid_t,
        app_name: String,
        bundle_id: Option<String>,
    },
    Destroyed(WindowId),
    FocusChanged(WindowId),
    AppActivated(pid_t),
    AppTerminated(pid_t),
    MouseMoved(Point),
}

/// Pause/resume control over the observer's callback delivery.
///
/// Pausing blocks queued callbacks from running; a callback already
/// executing completes first. Resume triggers a single catch-up poll.
/// Both operations are re-entrant-safe: the pause count nests.
#[derive(Clone, Default)]
pub struct ObserverHandle {
    inner: Arc<Mutex<ObserverState>>,
}

#[derive(Default)]
struct ObserverState {
    pause_depth: u32,
    resume_polls: u32,
}

impl ObserverHandle {
    pub fn new() -> Self { Self::default() }

    pub fn pause(&self) {
        let mut state = self.inner.lock();
        state.pause_depth += 1;
    }

    pub fn resume(&self) {
        let mut state = self.inner.lock();
        if state.pause_depth > 0 {
            state.pause_depth -= 1;
            if state.pause_depth == 0 {
                state.resume_polls += 1;
            }
        }
    }

    pub fn is_paused(&self) -> bool { self.inner.lock().pause_depth > 0 }

    /// Number of catch-up polls requested by resumes. The observer
    /// drains this counter; tests read it to assert replay behavior.
    pub fn take_resume_polls(&self) -> u32 {
        let mut state = self.inner.lock();
        std::mem::take(&mut state.resume_polls)
    }
}
