//! Control-drag handling: resizing the master/stack split when the drag
//! starts near the divider, swapping two tiles otherwise.

use crate::sys::bridge::WindowId;
use crate::sys::geometry::{Point, Rect};

/// How close to the split line a drag must start to count as a resize.
pub const DIVIDER_GRAB_DISTANCE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragMode {
    /// Cursor position maps linearly onto the split ratio.
    ResizeSplit,
    /// The drag started inside a tile; dropping it on another tile swaps
    /// the two windows.
    SwapTiles { source: WindowId },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DragState {
    active: Option<DragMode>,
}

impl DragState {
    pub fn new() -> Self { Self::default() }

    /// Classify a drag that just started. `divider` is the current split
    /// line coordinate (x for side-by-side, y for stacked), `source` the
    /// tile under the cursor, if any.
    pub fn begin(&mut self, start: Point, divider: f64, horizontal: bool, source: Option<WindowId>) {
        let cursor_coord = if horizontal { start.x } else { start.y };
        self.active = if (cursor_coord - divider).abs() <= DIVIDER_GRAB_DISTANCE {
            Some(DragMode::ResizeSplit)
        } else {
            source.map(|wid| DragMode::SwapTiles { source: wid })
        };
    }

    pub fn mode(&self) -> Option<DragMode> { self.active }

    pub fn is_resizing(&self) -> bool { matches!(self.active, Some(DragMode::ResizeSplit)) }

    pub fn dragged_window(&self) -> Option<WindowId> {
        match self.active {
            Some(DragMode::SwapTiles { source }) => Some(source),
            _ => None,
        }
    }

    pub fn end(&mut self) -> Option<DragMode> { self.active.take() }

    pub fn reset(&mut self) { self.active = None; }
}

/// Map a cursor position to a split ratio over the tiling region.
pub fn ratio_for_cursor(region: Rect, cursor: Point, horizontal: bool) -> f64 {
    let fraction = if horizontal {
        (cursor.x - region.origin.x) / region.size.width
    } else {
        (cursor.y - region.origin.y) / region.size.height
    };
    fraction.clamp(
        crate::model::workspace::SPLIT_RATIO_MIN,
        crate::model::workspace::SPLIT_RATIO_MAX,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_divider_becomes_resize() {
        let mut drag = DragState::new();
        drag.begin(Point::new(510.0, 300.0), 500.0, true, Some(WindowId::new(1)));
        assert!(drag.is_resizing());
    }

    #[test]
    fn away_from_divider_becomes_swap() {
        let mut drag = DragState::new();
        drag.begin(Point::new(100.0, 300.0), 500.0, true, Some(WindowId::new(1)));
        assert_eq!(drag.dragged_window(), Some(WindowId::new(1)));
    }

    #[test]
    fn drag_outside_any_tile_is_inert() {
        let mut drag = DragState::new();
        drag.begin(Point::new(100.0, 300.0), 500.0, true, None);
        assert_eq!(drag.mode(), None);
    }

    #[test]
    fn cursor_ratio_is_clamped() {
        let region = Rect::new(0.0, 0.0, 1000.0, 1000.0);
        assert_eq!(ratio_for_cursor(region, Point::new(-50.0, 0.0), true), 0.2);
        assert_eq!(ratio_for_cursor(region, Point::new(2000.0, 0.0), true), 0.8);
        assert_eq!(ratio_for_cursor(region, Point::new(300.0, 0.0), true), 0.3);
    }
}
