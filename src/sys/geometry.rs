//! Geometry primitives shared by the layout engine and the compositor
//! bridge. Coordinates are compositor-space f64 with y growing downward.

use serde::{Deserialize, Serialize};

/// Frames within half a pixel of each other count as the same frame;
/// the window server only honors whole-pixel coordinates.
pub const PIXEL_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self { Point { x, y } }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self { Size { width, height } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size { width: 0.0, height: 0.0 },
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn right(&self) -> f64 { self.origin.x + self.size.width }

    pub fn bottom(&self) -> f64 { self.origin.y + self.size.height }

    pub fn mid_x(&self) -> f64 { self.origin.x + self.size.width / 2.0 }

    pub fn mid_y(&self) -> f64 { self.origin.y + self.size.height / 2.0 }

    pub fn center(&self) -> Point { Point::new(self.mid_x(), self.mid_y()) }

    /// Snap to whole pixels. The edges are rounded, not the size, so
    /// rects that shared an edge before snapping still share it after.
    pub fn snap(&self) -> Rect {
        let left = self.origin.x.round();
        let top = self.origin.y.round();
        let width = self.right().round() - left;
        let height = self.bottom().round() - top;
        Rect::new(left, top, width, height)
    }

    /// True for points on the boundary as well as the interior.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.origin.x
            && point.x <= self.right()
            && point.y >= self.origin.y
            && point.y <= self.bottom()
    }

    pub fn area(&self) -> f64 { self.size.width * self.size.height }

    /// Area shared with `other`; zero when the rects are disjoint or
    /// touch only along an edge.
    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let overlap_w = self.right().min(other.right()) - self.origin.x.max(other.origin.x);
        let overlap_h = self.bottom().min(other.bottom()) - self.origin.y.max(other.origin.y);
        if overlap_w <= 0.0 || overlap_h <= 0.0 {
            return 0.0;
        }
        overlap_w * overlap_h
    }

    /// Component-wise equality within [`PIXEL_TOLERANCE`].
    pub fn approx_eq(&self, other: Rect) -> bool {
        (self.origin.x - other.origin.x).abs() <= PIXEL_TOLERANCE
            && (self.origin.y - other.origin.y).abs() <= PIXEL_TOLERANCE
            && (self.size.width - other.size.width).abs() <= PIXEL_TOLERANCE
            && (self.size.height - other.size.height).abs() <= PIXEL_TOLERANCE
    }
}
