use serde::{Deserialize, Serialize};

use crate::sys::geometry::{Point, Rect, Size};

/// Stable identifier for a physical display, derived from the display
/// hardware id. Survives cable re-plugs; does not survive hardware swaps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MonitorId(pub u32);

impl MonitorId {
    pub fn new(id: u32) -> Self { MonitorId(id) }
}

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "monitor-{}", self.0)
    }
}

/// A connected display and the region the layout engine may tile into.
#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
    pub id: MonitorId,
    /// Full frame in compositor coordinates.
    pub frame: Rect,
    /// Frame minus menu bar / dock reservations.
    pub tiling_frame: Rect,
}

impl Monitor {
    pub fn new(id: MonitorId, frame: Rect) -> Self {
        Monitor {
            id,
            frame,
            tiling_frame: frame,
        }
    }
}

/// Frame used to park a window off-screen while keeping it alive.
/// One pixel stays on-screen in the bottom-right corner so the window
/// server does not treat the window as being on another display.
pub fn hidden_frame(monitor_frame: Rect, window_size: Size) -> Rect {
    Rect {
        origin: Point::new(monitor_frame.right() - 1.0, monitor_frame.bottom() - 1.0),
        size: window_size,
    }
}

/// True if a frame sits at (or within `slack` pixels of) the hidden
/// position for the given monitor.
pub fn is_at_hidden_position(frame: Rect, monitor_frame: Rect, slack: f64) -> bool {
    frame.origin.x >= monitor_frame.right() - slack
        && frame.origin.y >= monitor_frame.bottom() - slack
}
