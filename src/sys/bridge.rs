//! The seam between the window-management core and the compositor.
//!
//! Everything the core needs from the native window server goes through
//! [`CompositorBridge`]. The production implementation wraps the
//! platform's accessibility and private compositor APIs; tests and the
//! headless CLI use [`RecordingBridge`], which keeps an in-memory window
//! table and records every call.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::collections::HashMap;
use crate::sys::geometry::{Point, Rect};

#[allow(non_camel_case_types)]
pub type pid_t = i32;

/// Opaque window-server identifier, unique for the session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WindowId(pub u32);

impl WindowId {
    pub fn new(id: u32) -> Self { WindowId(id) }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Positions expressible through the desktop environment's own tiling
/// commands. Used instead of computed frames when native animation is
/// requested and the layout degenerates to halves or quarters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeTile {
    LeftHalf,
    RightHalf,
    TopLeftQuarter,
    TopRightQuarter,
    BottomLeftQuarter,
    BottomRightQuarter,
}

/// Accessibility subrole of a window, as far as the core cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSubrole {
    Standard,
    Dialog,
    Sheet,
    FloatingWindow,
    SystemDialog,
    SystemFloatingWindow,
    Unknown,
}

impl WindowSubrole {
    /// Subroles that force a window to float when dialog auto-floating
    /// is enabled.
    pub fn is_dialog_like(self) -> bool {
        matches!(
            self,
            WindowSubrole::Dialog
                | WindowSubrole::Sheet
                | WindowSubrole::FloatingWindow
                | WindowSubrole::SystemDialog
                | WindowSubrole::SystemFloatingWindow
        )
    }
}

/// What the bridge knows about a window when enumerating the current
/// native space.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub id: WindowId,
    pub pid: pid_t,
    pub app_name: String,
    pub bundle_id: Option<String>,
    pub title: Option<String>,
    pub frame: Rect,
    pub subrole: WindowSubrole,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("window {0} is gone from the window server")]
    WindowGone(WindowId),
    #[error("accessibility element for window {0} could not be resolved")]
    ElementLost(WindowId),
    #[error("compositor call failed: {0}")]
    CallFailed(&'static str),
}

/// Commands the core issues against the compositor. All calls are safe
/// to invoke from any thread; the production connection serializes them.
pub trait CompositorBridge: Send + Sync {
    /// Set a single window frame.
    fn set_frame(&self, id: WindowId, frame: Rect) -> Result<(), BridgeError>;

    /// Set many frames inside one disabled-display-updates transaction.
    /// The frames become visible atomically.
    fn set_frames_batched(&self, frames: &[(WindowId, Rect)]) -> Result<(), BridgeError>;

    /// Apply a native tiling command, letting the desktop environment
    /// animate the move itself.
    fn set_native_tile(&self, id: WindowId, tile: NativeTile) -> Result<(), BridgeError>;

    fn set_alpha(&self, id: WindowId, alpha: f64) -> Result<(), BridgeError>;

    /// Apply a centered affine scale. `1.0` is identity.
    fn set_scale(&self, id: WindowId, scale: f64, anchor: Point) -> Result<(), BridgeError>;

    /// Reset transform to identity and alpha to 1.
    fn reset_transform(&self, id: WindowId) -> Result<(), BridgeError>;

    /// Additive brightness offset in compositor space; negative darkens.
    fn set_brightness(&self, id: WindowId, offset: f64) -> Result<(), BridgeError>;

    /// Give a window keyboard focus without activating its app's space.
    fn focus_window(&self, id: WindowId) -> Result<(), BridgeError>;

    /// Focus the desktop / file-manager app. Used when a workspace has
    /// no windows left to focus.
    fn focus_desktop(&self);

    /// Invoke the window's close button.
    fn press_close_button(&self, id: WindowId) -> Result<(), BridgeError>;

    /// Live frame query.
    fn window_frame(&self, id: WindowId) -> Result<Rect, BridgeError>;

    fn window_title(&self, id: WindowId) -> Option<String>;

    fn window_subrole(&self, id: WindowId) -> Option<WindowSubrole>;

    /// Enumerate windows on the current native space.
    fn list_windows(&self) -> Vec<WindowInfo>;
}

/// One recorded bridge call. The variants mirror the trait surface the
/// tests care about.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    SetFrame(WindowId, Rect),
    SetFramesBatched(Vec<(WindowId, Rect)>),
    SetNativeTile(WindowId, NativeTile),
    SetAlpha(WindowId, f64),
    SetScale(WindowId, f64),
    ResetTransform(WindowId),
    SetBrightness(WindowId, f64),
    FocusWindow(WindowId),
    FocusDesktop,
    PressCloseButton(WindowId),
}

#[derive(Debug, Default)]
struct RecordingState {
    windows: HashMap<WindowId, WindowInfo>,
    alphas: HashMap<WindowId, f64>,
    calls: Vec<BridgeCall>,
    /// Windows whose accessibility element should fail to resolve.
    lost: Vec<WindowId>,
}

/// In-memory bridge used by tests and the headless CLI path.
#[derive(Clone, Default)]
pub struct RecordingBridge {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingBridge {
    pub fn new() -> Self { Self::default() }

    pub fn add_window(&self, info: WindowInfo) {
        let mut state = self.state.lock();
        state.alphas.insert(info.id, 1.0);
        state.windows.insert(info.id, info);
    }

    pub fn remove_window(&self, id: WindowId) {
        let mut state = self.state.lock();
        state.windows.remove(&id);
        state.alphas.remove(&id);
    }

    /// Mark a window's accessibility element as unresolvable.
    pub fn lose_element(&self, id: WindowId) {
        self.state.lock().lost.push(id);
    }

    pub fn calls(&self) -> Vec<BridgeCall> { self.state.lock().calls.clone() }

    pub fn drain_calls(&self) -> Vec<BridgeCall> {
        std::mem::take(&mut self.state.lock().calls)
    }

    pub fn frame_of(&self, id: WindowId) -> Option<Rect> {
        self.state.lock().windows.get(&id).map(|w| w.frame)
    }

    pub fn alpha_of(&self, id: WindowId) -> Option<f64> {
        self.state.lock().alphas.get(&id).copied()
    }

    fn check_alive(state: &RecordingState, id: WindowId) -> Result<(), BridgeError> {
        if state.lost.contains(&id) {
            return Err(BridgeError::ElementLost(id));
        }
        if !state.windows.contains_key(&id) {
            return Err(BridgeError::WindowGone(id));
        }
        Ok(())
    }
}

impl CompositorBridge for RecordingBridge {
    fn set_frame(&self, id: WindowId, frame: Rect) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        Self::check_alive(&state, id)?;
        if let Some(w) = state.windows.get_mut(&id) {
            w.frame = frame;
        }
        state.calls.push(BridgeCall::SetFrame(id, frame));
        Ok(())
    }

    fn set_frames_batched(&self, frames: &[(WindowId, Rect)]) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        for &(id, frame) in frames {
            if let Some(w) = state.windows.get_mut(&id) {
                w.frame = frame;
            }
        }
        state.calls.push(BridgeCall::SetFramesBatched(frames.to_vec()));
        Ok(())
    }

    fn set_native_tile(&self, id: WindowId, tile: NativeTile) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        Self::check_alive(&state, id)?;
        state.calls.push(BridgeCall::SetNativeTile(id, tile));
        Ok(())
    }

    fn set_alpha(&self, id: WindowId, alpha: f64) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        Self::check_alive(&state, id)?;
        state.alphas.insert(id, alpha);
        state.calls.push(BridgeCall::SetAlpha(id, alpha));
        Ok(())
    }

    fn set_scale(&self, id: WindowId, scale: f64, _anchor: Point) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        Self::check_alive(&state, id)?;
        state.calls.push(BridgeCall::SetScale(id, scale));
        Ok(())
    }

    fn reset_transform(&self, id: WindowId) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.alphas.insert(id, 1.0);
        state.calls.push(BridgeCall::ResetTransform(id));
        Ok(())
    }

    fn set_brightness(&self, id: WindowId, offset: f64) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        Self::check_alive(&state, id)?;
        state.calls.push(BridgeCall::SetBrightness(id, offset));
        Ok(())
    }

    fn focus_window(&self, id: WindowId) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        Self::check_alive(&state, id)?;
        state.calls.push(BridgeCall::FocusWindow(id));
        Ok(())
    }

    fn focus_desktop(&self) {
        self.state.lock().calls.push(BridgeCall::FocusDesktop);
    }

    fn press_close_button(&self, id: WindowId) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        Self::check_alive(&state, id)?;
        state.calls.push(BridgeCall::PressCloseButton(id));
        Ok(())
    }

    fn window_frame(&self, id: WindowId) -> Result<Rect, BridgeError> {
        let state = self.state.lock();
        Self::check_alive(&state, id)?;
        Ok(state.windows[&id].frame)
    }

    fn window_title(&self, id: WindowId) -> Option<String> {
        self.state.lock().windows.get(&id).and_then(|w| w.title.clone())
    }

    fn window_subrole(&self, id: WindowId) -> Option<WindowSubrole> {
        self.state.lock().windows.get(&id).map(|w| w.subrole)
    }

    fn list_windows(&self) -> Vec<WindowInfo> {
        self.state.lock().windows.values().cloned().collect()
    }
}
