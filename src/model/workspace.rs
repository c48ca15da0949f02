//! Per-monitor virtual workspace state.
//!
//! The store is passive: it hands out state and performs bookkeeping
//! inserts/removals, but every rule (floating, swallow, focus policy)
//! is enforced by the core. Exactly one workspace is active per monitor.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::collections::{BTreeMap, HashMap, HashSet};
use crate::common::config::{WorkspaceNumber, MAX_WORKSPACE, MIN_WORKSPACE};
use crate::sys::bridge::{pid_t, WindowId};
use crate::sys::geometry::Rect;
use crate::sys::screen::MonitorId;

pub const SPLIT_RATIO_MIN: f64 = 0.2;
pub const SPLIT_RATIO_MAX: f64 = 0.8;
pub const COLUMN_WIDTH_MIN: f64 = 0.1;
pub const COLUMN_WIDTH_MAX: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutVariant {
    #[default]
    SideBySide,
    Stacked,
    Monocle,
}

impl LayoutVariant {
    pub fn next(self) -> LayoutVariant {
        match self {
            LayoutVariant::SideBySide => LayoutVariant::Stacked,
            LayoutVariant::Stacked => LayoutVariant::Monocle,
            LayoutVariant::Monocle => LayoutVariant::SideBySide,
        }
    }
}

/// Everything the core remembers about one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedWindow {
    pub window_id: WindowId,
    pub owner_pid: pid_t,
    pub app_name: String,
    pub bundle_id: Option<String>,
    pub is_floating: bool,
    pub is_sticky: bool,
    pub last_frame: Rect,
    /// Window this one was spawned from and replaced in the tile order.
    pub swallowed_from: Option<WindowId>,
    /// Window that replaced this one in the tile order.
    pub swallowed_by: Option<WindowId>,
}

impl TrackedWindow {
    pub fn new(window_id: WindowId, owner_pid: pid_t, app_name: impl Into<String>) -> Self {
        TrackedWindow {
            window_id,
            owner_pid,
            app_name: app_name.into(),
            bundle_id: None,
            is_floating: false,
            is_sticky: false,
            last_frame: Rect::ZERO,
            swallowed_from: None,
            swallowed_by: None,
        }
    }
}

/// Which of the three disjoint subsets a window lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSubset {
    Tiled,
    Floating,
    Fullscreen,
}

/// A column of the scrolling strip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub windows: Vec<WindowId>,
    /// Fraction of the region width; `None` uses the configured default.
    pub width_override: Option<f64>,
    pub focused_row: usize,
}

impl Column {
    pub fn single(wid: WindowId) -> Self {
        Column {
            windows: vec![wid],
            width_override: None,
            focused_row: 0,
        }
    }

    pub fn clamp_focused_row(&mut self) {
        if self.windows.is_empty() {
            self.focused_row = 0;
        } else if self.focused_row >= self.windows.len() {
            self.focused_row = self.windows.len() - 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualWorkspace {
    /// Tile order. In scrolling mode this is derived from `columns`.
    pub tiled: Vec<WindowId>,
    pub floating: HashSet<WindowId>,
    pub fullscreen: HashSet<WindowId>,
    /// Minimized windows keep their tracked entry but leave `tiled`.
    pub minimized: HashSet<WindowId>,
    pub tracked: HashMap<WindowId, TrackedWindow>,
    pub focused: Option<WindowId>,
    pub layout_variant: LayoutVariant,
    pub split_ratio: f64,
    pub columns: Vec<Column>,
    pub active_column: usize,
    /// Live frames of floating/fullscreen windows captured when the
    /// workspace was switched away from.
    pub saved_frames: HashMap<WindowId, Rect>,
}

impl VirtualWorkspace {
    pub fn new() -> Self {
        VirtualWorkspace {
            split_ratio: 0.5,
            ..Default::default()
        }
    }

    pub fn contains(&self, wid: WindowId) -> bool { self.tracked.contains_key(&wid) }

    pub fn is_empty(&self) -> bool { self.tracked.is_empty() }

    pub fn window_count(&self) -> usize { self.tracked.len() }

    pub fn subset_of(&self, wid: WindowId) -> Option<WindowSubset> {
        if self.fullscreen.contains(&wid) {
            Some(WindowSubset::Fullscreen)
        } else if self.floating.contains(&wid) {
            Some(WindowSubset::Floating)
        } else if self.tiled.contains(&wid) {
            Some(WindowSubset::Tiled)
        } else {
            None
        }
    }

    /// Insert a tiled window after the currently focused one, or at the
    /// end when nothing is focused.
    pub fn insert_tiled_after_focus(&mut self, wid: WindowId) {
        let index = self
            .focused
            .and_then(|f| self.tiled.iter().position(|&w| w == f))
            .map(|i| i + 1)
            .unwrap_or(self.tiled.len());
        self.tiled.insert(index.min(self.tiled.len()), wid);
    }

    /// Remove a window from every subset. The tracked entry is returned
    /// so the caller can migrate or drop it.
    pub fn remove_window(&mut self, wid: WindowId) -> Option<TrackedWindow> {
        self.tiled.retain(|&w| w != wid);
        self.floating.remove(&wid);
        self.fullscreen.remove(&wid);
        self.minimized.remove(&wid);
        self.saved_frames.remove(&wid);
        for column in &mut self.columns {
            column.windows.retain(|&w| w != wid);
            column.clamp_focused_row();
        }
        self.columns.retain(|c| !c.windows.is_empty());
        self.clamp_active_column();
        if self.focused == Some(wid) {
            self.focused = None;
        }
        self.tracked.remove(&wid)
    }

    pub fn set_split_ratio(&mut self, ratio: f64) {
        self.split_ratio = ratio.clamp(SPLIT_RATIO_MIN, SPLIT_RATIO_MAX);
    }

    pub fn clamp_active_column(&mut self) {
        if self.columns.is_empty() {
            self.active_column = 0;
        } else if self.active_column >= self.columns.len() {
            self.active_column = self.columns.len() - 1;
        }
    }

    /// Left-to-right, top-to-bottom flattening of the column strip.
    pub fn flatten_columns(&self) -> Vec<WindowId> {
        self.columns.iter().flat_map(|c| c.windows.iter().copied()).collect()
    }

    /// Rebuild the column structure from `tiled`, one window per column.
    /// Used when switching into scrolling mode.
    pub fn rebuild_columns_from_tiled(&mut self) {
        self.columns = self.tiled.iter().map(|&w| Column::single(w)).collect();
        self.active_column = self
            .focused
            .and_then(|f| self.columns.iter().position(|c| c.windows.contains(&f)))
            .unwrap_or(0);
        self.clamp_active_column();
    }

    /// Materialize the column structure if it lags behind `tiled`, e.g.
    /// after a mode switch on a workspace that has not been retiled.
    /// Must run before any column insert, or the flatten would drop the
    /// windows that only exist in `tiled`.
    pub fn ensure_columns(&mut self) {
        if self.columns.is_empty() && !self.tiled.is_empty() {
            self.rebuild_columns_from_tiled();
        }
    }

    /// Re-derive `tiled` from the columns. In scrolling mode the columns
    /// are authoritative; call this after any column mutation.
    pub fn sync_tiled_from_columns(&mut self) {
        self.tiled = self.flatten_columns();
    }

    /// Detect and repair a diverged tiled/columns pair. Returns true if
    /// a repair was needed.
    pub fn repair_column_divergence(&mut self) -> bool {
        let flattened = self.flatten_columns();
        if flattened == self.tiled {
            return false;
        }
        warn!(
            tiled = ?self.tiled,
            columns = ?flattened,
            "column flattening diverged from tile order, re-deriving"
        );
        self.tiled = flattened;
        true
    }
}

/// All workspace state, keyed monitor-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceStore {
    per_monitor: HashMap<MonitorId, BTreeMap<WorkspaceNumber, VirtualWorkspace>>,
    active: HashMap<MonitorId, WorkspaceNumber>,
}

impl WorkspaceStore {
    pub fn new() -> Self { Self::default() }

    pub fn active_workspace(&self, monitor: MonitorId) -> WorkspaceNumber {
        self.active.get(&monitor).copied().unwrap_or(MIN_WORKSPACE)
    }

    pub fn set_active_workspace(&mut self, monitor: MonitorId, n: WorkspaceNumber) {
        debug_assert!((MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n));
        self.active.insert(monitor, n);
    }

    pub fn workspace(&self, monitor: MonitorId, n: WorkspaceNumber) -> Option<&VirtualWorkspace> {
        self.per_monitor.get(&monitor).and_then(|m| m.get(&n))
    }

    pub fn workspace_mut(
        &mut self,
        monitor: MonitorId,
        n: WorkspaceNumber,
    ) -> &mut VirtualWorkspace {
        self.per_monitor
            .entry(monitor)
            .or_default()
            .entry(n)
            .or_insert_with(VirtualWorkspace::new)
    }

    pub fn active_mut(&mut self, monitor: MonitorId) -> &mut VirtualWorkspace {
        let n = self.active_workspace(monitor);
        self.workspace_mut(monitor, n)
    }

    pub fn active_ref(&self, monitor: MonitorId) -> Option<&VirtualWorkspace> {
        self.workspace(monitor, self.active_workspace(monitor))
    }

    pub fn monitors(&self) -> impl Iterator<Item = MonitorId> + '_ {
        self.per_monitor.keys().copied()
    }

    /// `(workspace, window count)` for every non-empty workspace of a
    /// monitor, in workspace order.
    pub fn workspaces_with_windows(
        &self,
        monitor: MonitorId,
    ) -> Vec<(WorkspaceNumber, usize)> {
        self.per_monitor
            .get(&monitor)
            .map(|m| {
                m.iter()
                    .filter(|(_, ws)| !ws.is_empty())
                    .map(|(&n, ws)| (n, ws.window_count()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn window_count(&self, monitor: MonitorId, n: WorkspaceNumber) -> usize {
        self.workspace(monitor, n).map(|ws| ws.window_count()).unwrap_or(0)
    }

    pub fn find_workspace_of(&self, wid: WindowId) -> Option<(MonitorId, WorkspaceNumber)> {
        for (&monitor, workspaces) in &self.per_monitor {
            for (&n, ws) in workspaces {
                if ws.contains(wid) {
                    return Some((monitor, n));
                }
            }
        }
        None
    }

    /// Windows that are hidden because their workspace is not active,
    /// or because they are minimized on the active one.
    pub fn all_hidden_window_ids(&self) -> Vec<WindowId> {
        let mut out = Vec::new();
        for (&monitor, workspaces) in &self.per_monitor {
            let active = self.active_workspace(monitor);
            for (&n, ws) in workspaces {
                if n != active {
                    out.extend(ws.tracked.keys().copied());
                } else {
                    out.extend(ws.minimized.iter().copied());
                }
            }
        }
        out
    }

    /// Snapshot a workspace's state for later replace.
    pub fn snapshot(&self, monitor: MonitorId, n: WorkspaceNumber) -> Option<VirtualWorkspace> {
        self.workspace(monitor, n).cloned()
    }

    pub fn replace(&mut self, monitor: MonitorId, n: WorkspaceNumber, ws: VirtualWorkspace) {
        self.per_monitor.entry(monitor).or_default().insert(n, ws);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(id: u32) -> WindowId { WindowId::new(id) }

    fn tracked(id: u32) -> TrackedWindow { TrackedWindow::new(w(id), 100, "Test") }

    #[test]
    fn insert_after_focus_lands_next_to_focused() {
        let mut ws = VirtualWorkspace::new();
        ws.tiled = vec![w(1), w(2), w(3)];
        ws.focused = Some(w(1));
        ws.insert_tiled_after_focus(w(4));
        assert_eq!(ws.tiled, vec![w(1), w(4), w(2), w(3)]);
    }

    #[test]
    fn insert_without_focus_appends() {
        let mut ws = VirtualWorkspace::new();
        ws.tiled = vec![w(1)];
        ws.insert_tiled_after_focus(w(2));
        assert_eq!(ws.tiled, vec![w(1), w(2)]);
    }

    #[test]
    fn remove_window_clears_all_subsets_and_focus() {
        let mut ws = VirtualWorkspace::new();
        ws.tiled = vec![w(1), w(2)];
        ws.tracked.insert(w(1), tracked(1));
        ws.tracked.insert(w(2), tracked(2));
        ws.focused = Some(w(2));
        ws.columns = vec![Column::single(w(1)), Column::single(w(2))];
        ws.active_column = 1;

        let removed = ws.remove_window(w(2));
        assert!(removed.is_some());
        assert_eq!(ws.tiled, vec![w(1)]);
        assert_eq!(ws.columns.len(), 1);
        assert_eq!(ws.active_column, 0);
        assert_eq!(ws.focused, None);
    }

    #[test]
    fn split_ratio_is_clamped() {
        let mut ws = VirtualWorkspace::new();
        ws.set_split_ratio(0.05);
        assert_eq!(ws.split_ratio, SPLIT_RATIO_MIN);
        ws.set_split_ratio(0.95);
        assert_eq!(ws.split_ratio, SPLIT_RATIO_MAX);
    }

    #[test]
    fn column_flatten_round_trips_tiled() {
        let mut ws = VirtualWorkspace::new();
        ws.tiled = vec![w(1), w(2), w(3)];
        ws.focused = Some(w(2));
        ws.rebuild_columns_from_tiled();
        assert_eq!(ws.columns.len(), 3);
        assert_eq!(ws.active_column, 1);
        assert_eq!(ws.flatten_columns(), ws.tiled);
    }

    #[test]
    fn divergence_repair_rederives_tiled() {
        let mut ws = VirtualWorkspace::new();
        ws.tiled = vec![w(1), w(2)];
        ws.columns = vec![Column {
            windows: vec![w(2), w(1)],
            width_override: None,
            focused_row: 0,
        }];
        assert!(ws.repair_column_divergence());
        assert_eq!(ws.tiled, vec![w(2), w(1)]);
        assert!(!ws.repair_column_divergence());
    }

    #[test]
    fn store_queries() {
        let mut store = WorkspaceStore::new();
        let monitor = MonitorId::new(1);
        store.set_active_workspace(monitor, 1);

        let ws1 = store.workspace_mut(monitor, 1);
        ws1.tiled = vec![w(1)];
        ws1.tracked.insert(w(1), tracked(1));

        let ws3 = store.workspace_mut(monitor, 3);
        ws3.tiled = vec![w(2), w(3)];
        ws3.tracked.insert(w(2), tracked(2));
        ws3.tracked.insert(w(3), tracked(3));

        assert_eq!(store.workspaces_with_windows(monitor), vec![(1, 1), (3, 2)]);
        assert_eq!(store.window_count(monitor, 3), 2);
        assert_eq!(store.find_workspace_of(w(3)), Some((monitor, 3)));
        assert_eq!(store.find_workspace_of(w(9)), None);

        let hidden = store.all_hidden_window_ids();
        assert!(hidden.contains(&w(2)) && hidden.contains(&w(3)));
        assert!(!hidden.contains(&w(1)));
    }
}
