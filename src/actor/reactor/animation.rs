//! Window birth/death animations and batched position updates.
//!
//! Two GPU-composited transitions exist: a popin when a window is born
//! (scale 0.80 → 1.0, alpha 0 → 1) and a popout when one is closed
//! (scale 1.0 → 0.80, alpha 1 → 0). Both run off a single ~8 ms tick.
//! Plain position changes are never animated; the compositor's affine
//! transform animates scale reliably but not translation, so moves go
//! out as one atomic batched frame set instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::sys::bridge::{CompositorBridge, WindowId};
use crate::sys::geometry::Rect;

const TICK: Duration = Duration::from_millis(8);

/// Delay before the popin starts, giving the app time to finish its own
/// initial resize so the scale-in does not fight it.
pub const POPIN_SETTLE_DELAY: Duration = Duration::from_millis(80);
pub const POPIN_DURATION: Duration = Duration::from_millis(500);
pub const POPOUT_DURATION: Duration = Duration::from_millis(200);

pub const POPIN_SCALE_FROM: f64 = 0.80;
pub const POPOUT_SCALE_TO: f64 = 0.80;

/// Easing curve for the popin.
const OPEN_CURVE: CubicBezier = CubicBezier {
    x1: 0.25,
    y1: 1.0,
    x2: 0.5,
    y2: 1.0,
};

/// Easing curve for the popout.
const CLOSE_CURVE: CubicBezier = CubicBezier {
    x1: 0.5,
    y1: 0.5,
    x2: 0.75,
    y2: 1.0,
};

#[derive(Debug, Clone, Copy)]
struct CubicBezier {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl CubicBezier {
    fn sample_axis(t: f64, p1: f64, p2: f64) -> f64 {
        // Cubic bezier with fixed endpoints (0,0) and (1,1).
        let inv = 1.0 - t;
        3.0 * inv * inv * t * p1 + 3.0 * inv * t * t * p2 + t * t * t
    }

    /// Evaluate progress for time fraction `x` in [0, 1] by solving the
    /// x-polynomial with bisection, then sampling y.
    fn eval(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        let mut lo = 0.0;
        let mut hi = 1.0;
        let mut t = x;
        for _ in 0..24 {
            let sampled = Self::sample_axis(t, self.x1, self.x2);
            if (sampled - x).abs() < 1e-5 {
                break;
            }
            if sampled < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) / 2.0;
        }
        Self::sample_axis(t, self.y1, self.y2)
    }
}

fn blend(a: f64, b: f64, s: f64) -> f64 { (1.0 - s) * a + s * b }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnimatorState {
    Idle,
    PopinActive,
    CloseActive,
}

/// Drives the two window transitions against the bridge. Single-timer,
/// single animation at a time; `cancel_all` is idempotent.
pub struct Animator {
    bridge: Arc<dyn CompositorBridge>,
    /// When false every transition jumps straight to its end state.
    pub animate: bool,
    state: AnimatorState,
    /// Close callback not yet fired, with its window.
    pending_close: Option<(WindowId, Box<dyn FnOnce() + Send>)>,
    active_window: Option<WindowId>,
}

impl Animator {
    pub fn new(bridge: Arc<dyn CompositorBridge>, animate: bool) -> Self {
        Animator {
            bridge,
            animate,
            state: AnimatorState::Idle,
            pending_close: None,
            active_window: None,
        }
    }

    /// Clear stale transforms left behind by a previous crash. Run once
    /// at process startup over every window the compositor reports.
    pub fn startup_reset(&self, windows: &[WindowId]) {
        for &wid in windows {
            if let Err(e) = self.bridge.reset_transform(wid) {
                debug!(?wid, %e, "startup transform reset failed");
            }
        }
    }

    /// Atomic batched position update; display updates are suspended
    /// while the frames are written.
    pub fn batch_move(&self, frames: &[(WindowId, Rect)]) {
        if frames.is_empty() {
            return;
        }
        if let Err(e) = self.bridge.set_frames_batched(frames) {
            debug!(%e, "batched frame set failed");
        }
    }

    /// Scale-plus-alpha entrance for a newly created window. The frame
    /// is applied first, then the window scales in from 80%.
    pub fn popin(&mut self, wid: WindowId, frame: Rect) {
        self.cancel_all();
        if let Err(e) = self.bridge.set_frame(wid, frame) {
            debug!(?wid, %e, "skipping popin, frame set failed");
            return;
        }

        if !self.animate {
            _ = self.bridge.reset_transform(wid);
            return;
        }

        self.state = AnimatorState::PopinActive;
        self.active_window = Some(wid);

        std::thread::sleep(POPIN_SETTLE_DELAY);
        let start = Instant::now();
        let anchor = frame.center();
        loop {
            let elapsed = start.elapsed();
            let x = elapsed.as_secs_f64() / POPIN_DURATION.as_secs_f64();
            let progress = OPEN_CURVE.eval(x.min(1.0));
            let scale = blend(POPIN_SCALE_FROM, 1.0, progress);
            let alpha = progress;
            trace!(?wid, scale, alpha, "popin tick");
            if self.bridge.set_scale(wid, scale, anchor).is_err()
                || self.bridge.set_alpha(wid, alpha).is_err()
            {
                break;
            }
            if x >= 1.0 {
                break;
            }
            std::thread::sleep(TICK);
        }
        _ = self.bridge.reset_transform(wid);
        self.state = AnimatorState::Idle;
        self.active_window = None;
    }

    /// Scale-plus-alpha exit, run concurrently with the redistribution
    /// batch for the surviving windows. `on_complete` performs the
    /// actual close (pressing the window's close button) and fires
    /// exactly once, from here or from `cancel_all`.
    pub fn popout(
        &mut self,
        wid: WindowId,
        redistribution: &[(WindowId, Rect)],
        on_complete: Box<dyn FnOnce() + Send>,
    ) {
        self.cancel_all();
        self.batch_move(redistribution);

        if !self.animate {
            on_complete();
            return;
        }

        self.state = AnimatorState::CloseActive;
        self.active_window = Some(wid);
        self.pending_close = Some((wid, on_complete));

        let anchor = match self.bridge.window_frame(wid) {
            Ok(frame) => frame.center(),
            Err(e) => {
                debug!(?wid, %e, "window vanished before close animation");
                self.finish_close();
                return;
            }
        };

        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            let x = elapsed.as_secs_f64() / POPOUT_DURATION.as_secs_f64();
            let progress = CLOSE_CURVE.eval(x.min(1.0));
            let scale = blend(1.0, POPOUT_SCALE_TO, progress);
            let alpha = 1.0 - progress;
            if self.bridge.set_scale(wid, scale, anchor).is_err()
                || self.bridge.set_alpha(wid, alpha).is_err()
            {
                break;
            }
            if x >= 1.0 {
                break;
            }
            std::thread::sleep(TICK);
        }
        self.finish_close();
    }

    fn finish_close(&mut self) {
        if let Some((wid, callback)) = self.pending_close.take() {
            callback();
            _ = self.bridge.reset_transform(wid);
        }
        self.state = AnimatorState::Idle;
        self.active_window = None;
    }

    /// Reset transforms and fire any pending close callback. Safe to
    /// call repeatedly and while idle.
    pub fn cancel_all(&mut self) {
        if self.state == AnimatorState::Idle
            && self.active_window.is_none()
            && self.pending_close.is_none()
        {
            return;
        }
        if let Some(wid) = self.active_window.take() {
            _ = self.bridge.reset_transform(wid);
        }
        if let Some((wid, callback)) = self.pending_close.take() {
            callback();
            _ = self.bridge.reset_transform(wid);
        }
        self.state = AnimatorState::Idle;
    }
}
