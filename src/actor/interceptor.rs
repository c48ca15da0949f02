//! The window cloak: a high-priority background loop that hides freshly
//! created windows before they can render at the app's default position.
//!
//! The loop knows nothing about workspaces. It compares the compositor's
//! window list against a set of known ids and pre-hides anything new by
//! setting alpha to 0. The core acknowledges each window when its
//! create event arrives, and decides whether to reveal or keep it
//! hidden. The `(known, hidden)` pair is the only state shared between
//! threads, behind a single lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::collections::HashSet;
use crate::sys::bridge::{CompositorBridge, WindowId};

const SCAN_INTERVAL: Duration = Duration::from_millis(8);

#[derive(Default)]
struct CloakState {
    known: HashSet<WindowId>,
    hidden: HashSet<WindowId>,
}

/// Shared handle between the scan loop and the core.
#[derive(Clone, Default)]
pub struct Cloak {
    state: Arc<Mutex<CloakState>>,
}

impl Cloak {
    pub fn new() -> Self { Self::default() }

    /// Seed the known set at startup so pre-existing windows are never
    /// cloaked.
    pub fn seed_known(&self, ids: impl IntoIterator<Item = WindowId>) {
        let mut state = self.state.lock();
        state.known.extend(ids);
    }

    /// One scan pass: cloak every window the compositor reports that we
    /// have not seen before. Returns the newly hidden ids.
    pub fn scan(&self, bridge: &dyn CompositorBridge) -> Vec<WindowId> {
        let windows = bridge.list_windows();
        let mut state = self.state.lock();
        let mut newly_hidden = Vec::new();
        for info in windows {
            if state.known.insert(info.id) {
                trace!(wid = ?info.id, "cloaking new window");
                if let Err(e) = bridge.set_alpha(info.id, 0.0) {
                    debug!(wid = ?info.id, %e, "cloak failed");
                    continue;
                }
                state.hidden.insert(info.id);
                newly_hidden.push(info.id);
            }
        }
        newly_hidden
    }

    /// The core claims a window after receiving its create event.
    /// Returns true if the cloak had hidden it (so the core owes it an
    /// alpha restore once it is positioned).
    pub fn acknowledge(&self, wid: WindowId) -> bool {
        let mut state = self.state.lock();
        state.known.insert(wid);
        state.hidden.remove(&wid)
    }

    /// Forget a destroyed window so a recycled id is cloaked again.
    pub fn forget(&self, wid: WindowId) {
        let mut state = self.state.lock();
        state.known.remove(&wid);
        state.hidden.remove(&wid);
    }

    pub fn is_hidden(&self, wid: WindowId) -> bool { self.state.lock().hidden.contains(&wid) }
}

/// Owns the background scan thread.
pub struct Interceptor {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    pub cloak: Cloak,
}

impl Interceptor {
    pub fn spawn(bridge: Arc<dyn CompositorBridge>, cloak: Cloak) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_cloak = cloak.clone();
        let thread_stop = stop.clone();
        let thread = std::thread::Builder::new()
            .name("window-cloak".into())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    thread_cloak.scan(bridge.as_ref());
                    std::thread::sleep(SCAN_INTERVAL);
                }
            })
            .expect("spawning the cloak thread");
        Interceptor {
            stop,
            thread: Some(thread),
            cloak,
        }
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}
