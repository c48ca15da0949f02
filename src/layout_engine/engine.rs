//! Pure layout math. No side effects, no window-server calls; the core
//! feeds in counts, regions and column structures and gets frames back.
//!
//! Gap model: the region is first inset by the outer gap, then split
//! into cells, and every cell is inset by half the inner gap on all
//! edges. Adjacent cells therefore sit exactly `inner` apart.

use crate::model::workspace::{Column, LayoutVariant, COLUMN_WIDTH_MAX, COLUMN_WIDTH_MIN};
use crate::sys::bridge::WindowId;
use crate::sys::geometry::{Point, Rect, Size};

/// Smallest frame the engine will emit. Windows below this become
/// unusable and some apps refuse the resize outright.
pub const MIN_WINDOW_WIDTH: f64 = 100.0;
pub const MIN_WINDOW_HEIGHT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaps {
    pub inner: f64,
    pub outer: f64,
    pub single_window_padding: f64,
}

impl Default for Gaps {
    fn default() -> Self {
        Gaps {
            inner: 8.0,
            outer: 8.0,
            single_window_padding: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// Position targets for the explicit ordering keybinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTarget {
    First,
    Last,
    OneEarlier,
    OneLater,
}

fn min_sized(rect: Rect) -> Rect {
    Rect {
        origin: rect.origin,
        size: Size {
            width: rect.size.width.max(MIN_WINDOW_WIDTH),
            height: rect.size.height.max(MIN_WINDOW_HEIGHT),
        },
    }
}

fn inset(rect: Rect, amount: f64) -> Rect {
    Rect::new(
        rect.origin.x + amount,
        rect.origin.y + amount,
        (rect.size.width - 2.0 * amount).max(0.0),
        (rect.size.height - 2.0 * amount).max(0.0),
    )
}

/// Split `area` into `count` equal full-width rows (cells, not yet
/// gapped).
fn equal_row_cells(area: Rect, count: usize) -> Vec<Rect> {
    let row_height = area.size.height / count as f64;
    (0..count)
        .map(|i| {
            Rect::new(
                area.origin.x,
                area.origin.y + i as f64 * row_height,
                area.size.width,
                row_height,
            )
        })
        .collect()
}

/// Frames for the master-stack layouts.
///
/// The returned sequence has exactly `count` frames, index-aligned with
/// the tile order. Windows beyond the fourth in `SideBySide` share the
/// bottom-right quarter.
pub fn master_stack_frames(
    count: usize,
    region: Rect,
    gaps: &Gaps,
    split_ratio: f64,
    variant: LayoutVariant,
) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }

    let area = inset(region, gaps.outer);
    let half = gaps.inner / 2.0;

    if variant == LayoutVariant::Monocle {
        return vec![min_sized(inset(area, half)).snap(); count];
    }

    if count == 1 {
        // A lone window consumes the outer gaps unless explicit padding
        // is configured.
        let frame = if gaps.single_window_padding > 0.0 {
            inset(region, gaps.single_window_padding)
        } else {
            region
        };
        return vec![min_sized(frame).snap()];
    }

    let cells = match (count, variant) {
        (2, LayoutVariant::SideBySide) => {
            let master_width = area.size.width * split_ratio;
            vec![
                Rect::new(area.origin.x, area.origin.y, master_width, area.size.height),
                Rect::new(
                    area.origin.x + master_width,
                    area.origin.y,
                    area.size.width - master_width,
                    area.size.height,
                ),
            ]
        }
        (2, LayoutVariant::Stacked) => {
            let master_height = area.size.height * split_ratio;
            vec![
                Rect::new(area.origin.x, area.origin.y, area.size.width, master_height),
                Rect::new(
                    area.origin.x,
                    area.origin.y + master_height,
                    area.size.width,
                    area.size.height - master_height,
                ),
            ]
        }
        (3, LayoutVariant::SideBySide) => {
            let master_width = area.size.width * split_ratio;
            let stack_x = area.origin.x + master_width;
            let stack_width = area.size.width - master_width;
            let half_height = area.size.height / 2.0;
            vec![
                Rect::new(area.origin.x, area.origin.y, master_width, area.size.height),
                Rect::new(stack_x, area.origin.y, stack_width, half_height),
                Rect::new(stack_x, area.origin.y + half_height, stack_width, half_height),
            ]
        }
        // Three equal rows; the split ratio deliberately does not apply
        // here.
        (3, LayoutVariant::Stacked) => equal_row_cells(area, 3),
        (n, LayoutVariant::SideBySide) => {
            let half_width = area.size.width / 2.0;
            let half_height = area.size.height / 2.0;
            let quarters = [
                Rect::new(area.origin.x, area.origin.y, half_width, half_height),
                Rect::new(area.origin.x + half_width, area.origin.y, half_width, half_height),
                Rect::new(area.origin.x, area.origin.y + half_height, half_width, half_height),
                Rect::new(
                    area.origin.x + half_width,
                    area.origin.y + half_height,
                    half_width,
                    half_height,
                ),
            ];
            (0..n).map(|i| quarters[i.min(3)]).collect()
        }
        (n, LayoutVariant::Stacked) => equal_row_cells(area, n),
        (_, LayoutVariant::Monocle) => unreachable!(),
    };

    cells.into_iter().map(|cell| min_sized(inset(cell, half)).snap()).collect()
}

/// Per-column output of the scrolling layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFrames {
    pub column_index: usize,
    pub frames: Vec<(WindowId, Rect)>,
    pub is_visible: bool,
}

/// Frames for the scrolling-column strip.
///
/// Columns are laid out on a virtual horizontal strip, then the strip is
/// offset so the active column's midpoint sits on the region's midpoint.
/// Off-screen columns still get frames (at their strip coordinates) so
/// the core can park them at alpha 0.
pub fn scrolling_frames(
    columns: &[Column],
    active_column: usize,
    region: Rect,
    gaps: &Gaps,
    default_column_width: f64,
) -> Vec<ColumnFrames> {
    if columns.is_empty() {
        return Vec::new();
    }
    let active_column = active_column.min(columns.len() - 1);
    let area = inset(region, gaps.outer);
    let half = gaps.inner / 2.0;

    let widths: Vec<f64> = columns
        .iter()
        .map(|c| {
            let fraction = c
                .width_override
                .unwrap_or(default_column_width)
                .clamp(COLUMN_WIDTH_MIN, COLUMN_WIDTH_MAX);
            area.size.width * fraction
        })
        .collect();

    let mut xs = Vec::with_capacity(columns.len());
    let mut x = 0.0;
    for width in &widths {
        xs.push(x);
        x += width;
    }

    let offset = area.mid_x() - (area.origin.x + xs[active_column] + widths[active_column] / 2.0);

    columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let column_x = area.origin.x + xs[i] + offset;
            let is_visible = column_x < area.right() && column_x + widths[i] > area.origin.x;

            let cell = Rect::new(column_x, area.origin.y, widths[i], area.size.height);
            let rows = equal_row_cells(cell, column.windows.len().max(1));
            let frames = column
                .windows
                .iter()
                .zip(rows)
                .map(|(&wid, row)| (wid, min_sized(inset(row, half)).snap()))
                .collect();

            ColumnFrames {
                column_index: i,
                frames,
                is_visible,
            }
        })
        .collect()
}

/// Pick the nearest candidate whose center lies strictly in `direction`
/// from `current`'s center. Distance ties resolve to the lower id so
/// repeated presses are deterministic.
pub fn neighbor_in_direction(
    current: Rect,
    candidates: &[(WindowId, Rect)],
    direction: Direction,
) -> Option<WindowId> {
    let from = current.center();
    candidates
        .iter()
        .filter(|(_, frame)| {
            let center = frame.center();
            match direction {
                Direction::Left => center.x < from.x,
                Direction::Right => center.x > from.x,
                Direction::Up => center.y < from.y,
                Direction::Down => center.y > from.y,
            }
        })
        .min_by(|(id_a, a), (id_b, b)| {
            let da = from.distance(a.center());
            let db = from.distance(b.center());
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal).then(id_a.cmp(id_b))
        })
        .map(|&(id, _)| id)
}

/// Tiled window whose frame contains `point`, if any. Used by
/// focus-follows-mouse.
pub fn window_at_point(candidates: &[(WindowId, Rect)], point: Point) -> Option<WindowId> {
    candidates
        .iter()
        .find(|(_, frame)| frame.contains(point))
        .map(|&(id, _)| id)
}

/// Swap the target with the first (master) position. No-op when the
/// target is already first or unknown.
pub fn swap_with_first(tiled: &mut [WindowId], wid: WindowId) {
    if tiled.len() < 2 {
        return;
    }
    if let Some(index) = tiled.iter().position(|&w| w == wid) {
        if index != 0 {
            tiled.swap(0, index);
        }
    }
}

/// Wrap right: the last window becomes the new master.
pub fn rotate_next(tiled: &mut Vec<WindowId>) {
    if tiled.len() < 2 {
        return;
    }
    let last = tiled.pop().expect("len checked above");
    tiled.insert(0, last);
}

/// Wrap left: the master goes to the back.
pub fn rotate_prev(tiled: &mut Vec<WindowId>) {
    if tiled.len() < 2 {
        return;
    }
    let first = tiled.remove(0);
    tiled.push(first);
}

pub fn move_position(tiled: &mut Vec<WindowId>, wid: WindowId, target: OrderTarget) {
    if tiled.len() < 2 {
        return;
    }
    let Some(index) = tiled.iter().position(|&w| w == wid) else {
        return;
    };
    let new_index = match target {
        OrderTarget::First => 0,
        OrderTarget::Last => tiled.len() - 1,
        OrderTarget::OneEarlier => index.saturating_sub(1),
        OrderTarget::OneLater => (index + 1).min(tiled.len() - 1),
    };
    if new_index != index {
        let window = tiled.remove(index);
        tiled.insert(new_index, window);
    }
}
