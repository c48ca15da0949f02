//! The core state machine.
//!
//! The reactor owns the authoritative window model. Observer events and
//! user actions arrive on one sequential queue; the reactor mutates the
//! workspace store, asks the layout engine for geometry, and issues
//! commands to the animator and the compositor bridge. Nothing else
//! writes workspace state.

pub mod animation;
pub mod error;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actor::drag::{ratio_for_cursor, DragMode, DragState};
use crate::actor::interceptor::Cloak;
use crate::actor::reactor::animation::Animator;
use crate::common::collections::HashMap;
use crate::common::config::{
    config_file, AppPlacement, Config, TilingMode, WindowRules, WorkspaceNumber, MAX_WORKSPACE,
    MIN_WORKSPACE,
};
use crate::layout_engine::engine::{
    self, Direction, Gaps, OrderTarget,
};
use crate::model::restore::{RestoreEntry, RestoreSnapshot};
use crate::model::workspace::{
    Column, LayoutVariant, TrackedWindow, WindowSubset, WorkspaceStore, COLUMN_WIDTH_MAX,
    COLUMN_WIDTH_MIN,
};
use crate::sys::bridge::{pid_t, CompositorBridge, NativeTile, WindowId};
use crate::sys::geometry::{Point, Rect};
use crate::sys::observer::{ObserverHandle, WindowEvent};
use crate::sys::process::{self, ProcessQuery};
use crate::sys::screen::{hidden_frame, is_at_hidden_position, Monitor, MonitorId};
use crate::ui::border::BorderRenderer;
use crate::ui::dimmer::Dimmer;

pub use error::ReactorError;

/// Windows this close to fully off-screen at startup are treated as
/// orphans from a crashed session.
const ORPHAN_SLACK_PX: f64 = 3.0;

/// Dialog auto-float size cutoff: anything strictly smaller floats.
const AUTO_FLOAT_MAX_WIDTH: f64 = 500.0;
const AUTO_FLOAT_MAX_HEIGHT: f64 = 400.0;

/// Same-app secondary windows float below this share of the region.
const SECONDARY_FLOAT_FRACTION: f64 = 0.7;

/// Focus-follows-mouse refresh cap (10 Hz).
const MOUSE_FOCUS_INTERVAL: Duration = Duration::from_millis(100);

const GAP_STEP: f64 = 2.0;
const SPLIT_STEP: f64 = 0.05;
const COLUMN_WIDTH_STEP: f64 = 0.1;

/// Every user-triggerable operation. Key bindings, menu items and the
/// CLI all funnel into `Reactor::handle_action`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    FocusLeft,
    FocusRight,
    FocusUp,
    FocusDown,
    FocusNext,
    FocusPrev,
    SwapMaster,
    RotateNext,
    RotatePrev,
    CycleLayout,
    ToggleFloat,
    ToggleFullscreen,
    Close,
    Retile,
    ReloadConfig,
    FocusMonitorLeft,
    FocusMonitorRight,
    MoveToMonitorLeft,
    MoveToMonitorRight,
    PositionLeft,
    PositionRight,
    PositionUp,
    PositionDown,
    PositionFill,
    PositionCenter,
    IncreaseGap,
    DecreaseGap,
    GrowFocused,
    ShrinkFocused,
    SwitchWorkspace(WorkspaceNumber),
    MoveToWorkspace(WorkspaceNumber),
    Minimize,
    SetMark(String),
    JumpMark(String),
    NiriConsume,
    NiriExpel,
}

impl Action {
    /// Parse a `action [arg]` binding value. Unknown actions and
    /// out-of-range workspace numbers yield `None`.
    pub fn parse(spec: &str) -> Option<Action> {
        let mut parts = spec.split_whitespace();
        let name = parts.next()?;
        let arg = parts.next();
        let action = match (name, arg) {
            ("focus_left", None) => Action::FocusLeft,
            ("focus_right", None) => Action::FocusRight,
            ("focus_up", None) => Action::FocusUp,
            ("focus_down", None) => Action::FocusDown,
            ("focus_next", None) => Action::FocusNext,
            ("focus_prev", None) => Action::FocusPrev,
            ("swap_master", None) => Action::SwapMaster,
            ("rotate_next", None) => Action::RotateNext,
            ("rotate_prev", None) => Action::RotatePrev,
            ("cycle_layout", None) => Action::CycleLayout,
            ("toggle_float", None) => Action::ToggleFloat,
            ("toggle_fullscreen", None) => Action::ToggleFullscreen,
            ("close", None) => Action::Close,
            ("retile", None) => Action::Retile,
            ("reload_config", None) => Action::ReloadConfig,
            ("focus_monitor", Some("left")) => Action::FocusMonitorLeft,
            ("focus_monitor", Some("right")) => Action::FocusMonitorRight,
            ("move_to_monitor", Some("left")) => Action::MoveToMonitorLeft,
            ("move_to_monitor", Some("right")) => Action::MoveToMonitorRight,
            ("position_left", None) => Action::PositionLeft,
            ("position_right", None) => Action::PositionRight,
            ("position_up", None) => Action::PositionUp,
            ("position_down", None) => Action::PositionDown,
            ("position_fill", None) => Action::PositionFill,
            ("position_center", None) => Action::PositionCenter,
            ("increase_gap", None) => Action::IncreaseGap,
            ("decrease_gap", None) => Action::DecreaseGap,
            ("grow_focused", None) => Action::GrowFocused,
            ("shrink_focused", None) => Action::ShrinkFocused,
            ("switch_workspace", Some(n)) => {
                let n = n.parse::<WorkspaceNumber>().ok()?;
                if !(MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n) {
                    return None;
                }
                Action::SwitchWorkspace(n)
            }
            ("move_to_workspace", Some(n)) => {
                let n = n.parse::<WorkspaceNumber>().ok()?;
                if !(MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n) {
                    return None;
                }
                Action::MoveToWorkspace(n)
            }
            ("minimize", None) => Action::Minimize,
            ("set_mark", Some(k)) => Action::SetMark(k.to_string()),
            ("jump_mark", Some(k)) => Action::JumpMark(k.to_string()),
            ("niri_consume", None) => Action::NiriConsume,
            ("niri_expel", None) => Action::NiriExpel,
            _ => return None,
        };
        Some(action)
    }
}

/// Everything that can arrive on the reactor's queue.
#[derive(Debug)]
pub enum Event {
    Window(WindowEvent),
    Command(Action),
    ScreensChanged(Vec<Monitor>),
    ConfigUpdated(Config),
    /// Control-drag gesture, already filtered by the event router.
    DragStarted(Point),
    DragMoved(Point),
    DragEnded(Point),
}

pub struct Reactor {
    pub config: Config,
    pub store: WorkspaceStore,
    monitors: Vec<Monitor>,
    focused_monitor: MonitorId,
    marks: HashMap<String, WindowId>,
    bridge: Arc<dyn CompositorBridge>,
    process: Arc<dyn ProcessQuery>,
    pub observer: ObserverHandle,
    animator: Animator,
    border: BorderRenderer,
    dimmer: Dimmer,
    pub cloak: Cloak,
    drag: DragState,
    /// Guards against focus-follows-app re-entering a workspace switch.
    in_auto_switch: bool,
    last_mouse_focus: Option<Instant>,
    restore_path: Option<PathBuf>,
}

impl Reactor {
    pub fn new(
        config: Config,
        bridge: Arc<dyn CompositorBridge>,
        process: Arc<dyn ProcessQuery>,
        monitors: Vec<Monitor>,
    ) -> Self {
        let mut monitors = monitors;
        monitors.sort_by(|a, b| {
            a.frame.origin.x.partial_cmp(&b.frame.origin.x).unwrap_or(std::cmp::Ordering::Equal)
        });
        let focused_monitor = monitors.first().map(|m| m.id).unwrap_or(MonitorId::new(0));
        let animator = Animator::new(bridge.clone(), config.layout.animations);
        let dimmer = Dimmer::new(bridge.clone(), config.layout.dim_unfocused);
        let border = BorderRenderer::new(config.border.clone());
        Reactor {
            store: WorkspaceStore::new(),
            monitors,
            focused_monitor,
            marks: HashMap::default(),
            bridge,
            process,
            observer: ObserverHandle::new(),
            animator,
            border,
            dimmer,
            cloak: Cloak::new(),
            drag: DragState::new(),
            in_auto_switch: false,
            last_mouse_focus: None,
            restore_path: None,
            config,
        }
    }

    pub fn with_restore_path(mut self, path: PathBuf) -> Self {
        self.restore_path = Some(path);
        self
    }

    /// Consume the event queue. Runs until every sender is dropped.
    pub async fn run(mut self, mut rx: crate::actor::Receiver<Event>) {
        while let Some((span, event)) = rx.recv().await {
            let _enter = span.enter();
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Window(window_event) => self.handle_window_event(window_event),
            Event::Command(action) => self.handle_action(action),
            Event::ScreensChanged(monitors) => self.set_monitors(monitors),
            Event::ConfigUpdated(config) => self.apply_config(config),
            Event::DragStarted(point) => self.on_drag_started(point),
            Event::DragMoved(point) => self.on_drag_moved(point),
            Event::DragEnded(point) => self.on_drag_ended(point),
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Created {
                window_id,
                pid,
                app_name,
                bundle_id,
            } => self.on_window_created(window_id, pid, app_name, bundle_id),
            WindowEvent::Destroyed(wid) => self.on_window_destroyed(wid),
            WindowEvent::FocusChanged(wid) => self.on_focus_changed(wid),
            WindowEvent::AppActivated(pid) => self.on_app_activated(pid),
            WindowEvent::AppTerminated(pid) => self.on_app_terminated(pid),
            WindowEvent::MouseMoved(point) => self.on_mouse_moved(point),
        }
    }

    // ---- startup ------------------------------------------------------

    /// Adopt the windows already present in the compositor. Orphans from
    /// a crashed session (parked at the hidden position) are pulled back
    /// on screen first, then the restore snapshot assigns workspaces and
    /// whatever is left goes through normal classification.
    pub fn startup(&mut self) {
        let mut windows = self.bridge.list_windows();
        windows.sort_by_key(|info| info.id);

        self.animator.startup_reset(&windows.iter().map(|w| w.id).collect::<Vec<_>>());
        self.cloak.seed_known(windows.iter().map(|w| w.id));

        for info in &mut windows {
            let Some(monitor) = self.monitor_for_frame(info.frame).or(self.primary()) else {
                continue;
            };
            if is_at_hidden_position(info.frame, monitor.frame, ORPHAN_SLACK_PX) {
                let frame = monitor.frame;
                let restored = Rect::new(
                    frame.origin.x + frame.size.width / 4.0,
                    frame.origin.y + frame.size.height / 4.0,
                    frame.size.width / 2.0,
                    frame.size.height / 2.0,
                );
                info!(wid = ?info.id, "restoring orphaned window from hidden position");
                if let Err(e) = self.bridge.set_frame(info.id, restored) {
                    warn!(wid = ?info.id, %e, "orphan restore failed");
                    continue;
                }
                info.frame = restored;
            }
        }

        let mut snapshot = match &self.restore_path {
            Some(path) => RestoreSnapshot::load(path),
            None => RestoreSnapshot::default(),
        };
        for &(monitor_id, n) in &snapshot.active_workspaces {
            let monitor_id = MonitorId::new(monitor_id);
            if self.monitor(monitor_id).is_some() && (MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n)
            {
                self.store.set_active_workspace(monitor_id, n);
            }
        }

        for info in windows {
            let title = self.bridge.window_title(info.id);
            match snapshot.take_match(&info.app_name, info.bundle_id.as_deref(), title.as_deref())
            {
                Some(entry) => self.adopt_restored(&info, entry),
                None => self.on_window_created(
                    info.id,
                    info.pid,
                    info.app_name.clone(),
                    info.bundle_id.clone(),
                ),
            }
        }

        let monitors: Vec<MonitorId> = self.monitors.iter().map(|m| m.id).collect();
        for monitor in monitors {
            self.retile(monitor);
        }
    }

    fn adopt_restored(&mut self, info: &crate::sys::bridge::WindowInfo, entry: RestoreEntry) {
        let monitor_id = MonitorId::new(entry.monitor);
        let monitor = if self.monitor(monitor_id).is_some() {
            monitor_id
        } else {
            self.focused_monitor
        };
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let active = self.store.active_workspace(monitor);
        let niri = self.config.layout.tiling_mode == TilingMode::Niri;

        let mut tracked = TrackedWindow::new(info.id, info.pid, info.app_name.clone());
        tracked.bundle_id = info.bundle_id.clone();
        tracked.is_floating = entry.is_floating;
        tracked.last_frame = info.frame;

        let ws = self.store.workspace_mut(monitor, entry.workspace);
        ws.tracked.insert(info.id, tracked);
        if entry.is_fullscreen {
            ws.fullscreen.insert(info.id);
        } else if entry.is_floating {
            ws.floating.insert(info.id);
        } else if niri {
            ws.ensure_columns();
            ws.columns.push(Column::single(info.id));
            ws.sync_tiled_from_columns();
        } else {
            ws.tiled.push(info.id);
        }

        if entry.workspace != active {
            let hidden = hidden_frame(mon.frame, info.frame.size);
            if let Err(e) = self.bridge.set_frame(info.id, hidden) {
                debug!(wid = ?info.id, %e, "hiding restored window failed");
            }
        }
        debug!(wid = ?info.id, workspace = entry.workspace, "restored window placement");
    }

    // ---- window lifecycle --------------------------------------------

    fn on_window_created(
        &mut self,
        wid: WindowId,
        pid: pid_t,
        app_name: String,
        bundle_id: Option<String>,
    ) {
        let was_cloaked = self.cloak.acknowledge(wid);
        if self.store.find_workspace_of(wid).is_some() {
            debug!(?wid, "duplicate create event ignored");
            return;
        }

        // 1. Excluded apps are never managed; undo the cloak.
        if WindowRules::matches(&self.config.rules.exclude, &app_name, bundle_id.as_deref()) {
            if was_cloaked {
                _ = self.bridge.set_alpha(wid, 1.0);
            }
            return;
        }

        let monitor = self.focused_monitor;
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let region = mon.tiling_frame;
        let frame = self.bridge.window_frame(wid).unwrap_or(Rect::ZERO);
        let title = self.bridge.window_title(wid);

        // 2. Float decision.
        let mut floating =
            WindowRules::matches(&self.config.rules.float, &app_name, bundle_id.as_deref());
        if !floating && self.config.layout.auto_float_dialogs {
            let dialog_like =
                self.bridge.window_subrole(wid).is_some_and(|s| s.is_dialog_like());
            let tiny = frame.size.width < AUTO_FLOAT_MAX_WIDTH
                && frame.size.height < AUTO_FLOAT_MAX_HEIGHT;
            floating = dialog_like || tiny;
        }
        if !floating {
            let app_has_tiled = self
                .store
                .active_ref(monitor)
                .map(|ws| {
                    ws.tiled.iter().any(|w| {
                        ws.tracked.get(w).is_some_and(|t| t.owner_pid == pid)
                    })
                })
                .unwrap_or(false);
            if app_has_tiled {
                let untitled = title.as_deref().map_or(true, str::is_empty);
                let small = frame.size.width < SECONDARY_FLOAT_FRACTION * region.size.width
                    || frame.size.height < SECONDARY_FLOAT_FRACTION * region.size.height;
                floating = untitled || small;
            }
        }

        // 3. Sticky.
        let sticky =
            WindowRules::matches(&self.config.rules.sticky, &app_name, bundle_id.as_deref());

        let mut tracked = TrackedWindow::new(wid, pid, app_name.clone());
        tracked.bundle_id = bundle_id.clone();
        tracked.is_floating = floating;
        tracked.is_sticky = sticky;
        tracked.last_frame = frame;

        let niri = self.config.layout.tiling_mode == TilingMode::Niri;

        // 4. App → workspace pinning: insert hidden, never switch.
        if let Some(rule) = self.config.app_rule_for(&app_name, bundle_id.as_deref()) {
            if let AppPlacement::Workspace(n) = rule.placement {
                if n != self.store.active_workspace(monitor) {
                    let hidden = hidden_frame(mon.frame, frame.size);
                    _ = self.bridge.set_frame(wid, hidden);
                    if was_cloaked {
                        _ = self.bridge.set_alpha(wid, 1.0);
                    }
                    let ws = self.store.workspace_mut(monitor, n);
                    ws.tracked.insert(wid, tracked);
                    if floating {
                        ws.floating.insert(wid);
                    } else if niri {
                        ws.ensure_columns();
                        ws.columns.push(Column::single(wid));
                        ws.sync_tiled_from_columns();
                    } else {
                        ws.tiled.push(wid);
                    }
                    info!(?wid, workspace = n, "window pinned to workspace by app rule");
                    self.persist();
                    return;
                }
            }
        }

        // 5. Swallow: a tiled ancestor window gives up its slot.
        if !floating {
            if let Some((host, index)) = self.find_swallow_host(monitor, pid) {
                self.perform_swallow(monitor, host, index, tracked, was_cloaked);
                return;
            }
        }

        // 6. Plain insert on the active workspace.
        let placement = self
            .config
            .app_rule_for(&app_name, bundle_id.as_deref())
            .map(|r| r.placement);
        {
            let ws = self.store.active_mut(monitor);
            ws.tracked.insert(wid, tracked);
            if floating {
                ws.floating.insert(wid);
            } else if niri {
                // Columns are authoritative in scrolling mode, so the
                // left/right rule decides the column slot directly.
                ws.ensure_columns();
                let at = match placement {
                    Some(AppPlacement::Left) => 0,
                    Some(AppPlacement::Right) => ws.columns.len(),
                    _ => (ws.active_column + 1).min(ws.columns.len()),
                };
                ws.columns.insert(at, Column::single(wid));
                ws.active_column = at;
                ws.sync_tiled_from_columns();
            } else {
                ws.insert_tiled_after_focus(wid);
                match placement {
                    Some(AppPlacement::Left) => {
                        engine::move_position(&mut ws.tiled, wid, OrderTarget::First)
                    }
                    Some(AppPlacement::Right) => {
                        engine::move_position(&mut ws.tiled, wid, OrderTarget::Last)
                    }
                    _ => {}
                }
            }
            ws.focused = Some(wid);
        }

        if floating {
            if was_cloaked {
                _ = self.bridge.set_alpha(wid, 1.0);
            }
            self.focus_window(wid);
        } else {
            // Keep the window invisible until it lands on its frame.
            _ = self.bridge.set_alpha(wid, 0.0);
            self.retile_with_popin(monitor, wid);
            self.focus_window(wid);
        }
        self.persist();
    }

    /// Walk the creating process's ancestry looking for a tiled window
    /// on the active workspace whose app is on the swallow list.
    fn find_swallow_host(&self, monitor: MonitorId, pid: pid_t) -> Option<(WindowId, usize)> {
        let rules = &self.config.rules;
        if rules.swallow.is_empty() && !rules.swallow_all {
            return None;
        }
        let ws = self.store.active_ref(monitor)?;
        for ancestor in process::ancestors(self.process.as_ref(), pid) {
            for (index, &candidate) in ws.tiled.iter().enumerate() {
                let Some(tracked) = ws.tracked.get(&candidate) else {
                    continue;
                };
                if tracked.owner_pid != ancestor || tracked.swallowed_by.is_some() {
                    continue;
                }
                if rules.swallow_all
                    || WindowRules::matches(
                        &rules.swallow,
                        &tracked.app_name,
                        tracked.bundle_id.as_deref(),
                    )
                {
                    return Some((candidate, index));
                }
            }
        }
        None
    }

    fn perform_swallow(
        &mut self,
        monitor: MonitorId,
        host: WindowId,
        index: usize,
        mut tracked: TrackedWindow,
        _was_cloaked: bool,
    ) {
        let wid = tracked.window_id;
        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        let host_size;
        {
            let ws = self.store.active_mut(monitor);
            tracked.swallowed_from = Some(host);
            let Some(host_entry) = ws.tracked.get_mut(&host) else {
                return;
            };
            host_entry.swallowed_by = Some(wid);
            host_size = host_entry.last_frame.size;

            ws.tiled.retain(|&w| w != host);
            ws.tiled.insert(index.min(ws.tiled.len()), wid);
            ws.tracked.insert(wid, tracked);
            if niri {
                for column in &mut ws.columns {
                    for slot in &mut column.windows {
                        if *slot == host {
                            *slot = wid;
                        }
                    }
                }
                ws.sync_tiled_from_columns();
            }
            ws.focused = Some(wid);
        }

        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        info!(?wid, ?host, "swallowing terminal window");
        _ = self.bridge.set_alpha(host, 0.0);
        _ = self.bridge.set_frame(host, hidden_frame(mon.frame, host_size));
        _ = self.bridge.set_alpha(wid, 0.0);
        self.retile_with_popin(monitor, wid);
        self.focus_window(wid);
        self.persist();
    }

    fn on_window_destroyed(&mut self, wid: WindowId) {
        self.cloak.forget(wid);
        self.marks.retain(|_, &mut marked| marked != wid);

        let Some((monitor, n)) = self.store.find_workspace_of(wid) else {
            return;
        };
        let was_active = n == self.store.active_workspace(monitor);

        let (removed, former_index, unswallowed) = {
            let ws = self.store.workspace_mut(monitor, n);
            let former_index = ws.tiled.iter().position(|&w| w == wid);
            let removed = ws.remove_window(wid);

            // Un-swallow: the hidden terminal gets its slot back.
            let mut unswallowed = None;
            if let Some(host) = removed.as_ref().and_then(|t| t.swallowed_from) {
                if let Some(host_entry) = ws.tracked.get_mut(&host) {
                    host_entry.swallowed_by = None;
                    let at = former_index.unwrap_or(ws.tiled.len()).min(ws.tiled.len());
                    ws.tiled.insert(at, host);
                    if !ws.columns.is_empty() {
                        ws.columns.insert(
                            at.min(ws.columns.len()),
                            Column::single(host),
                        );
                        ws.sync_tiled_from_columns();
                    }
                    ws.focused = Some(host);
                    unswallowed = Some(host);
                }
            }
            (removed, former_index, unswallowed)
        };

        if removed.is_none() {
            return;
        }

        if let Some(host) = unswallowed {
            _ = self.bridge.set_alpha(host, 1.0);
            if was_active {
                self.retile(monitor);
                self.focus_window(host);
            }
            self.persist();
            return;
        }

        // Clear the dangling link on the swallowed terminal when its
        // replacement app window goes first.
        if let Some(swallower) = removed.as_ref().and_then(|t| t.swallowed_by) {
            let ws = self.store.workspace_mut(monitor, n);
            if let Some(entry) = ws.tracked.get_mut(&swallower) {
                entry.swallowed_from = None;
            }
        }

        if was_active {
            let next_focus = {
                let ws = self.store.active_mut(monitor);
                if ws.focused.is_none() {
                    ws.focused = former_index
                        .map(|i| i.min(ws.tiled.len().saturating_sub(1)))
                        .and_then(|i| ws.tiled.get(i).copied())
                        .or_else(|| ws.tiled.first().copied());
                }
                ws.focused
            };
            self.retile(monitor);
            match next_focus {
                Some(next) => self.focus_window(next),
                None => {
                    if self.store.active_ref(monitor).map_or(true, |ws| ws.is_empty()) {
                        self.bridge.focus_desktop();
                    }
                }
            }
        }
        self.persist();
    }

    fn on_app_terminated(&mut self, pid: pid_t) {
        let mut victims = Vec::new();
        for monitor in self.store.monitors().collect::<Vec<_>>() {
            for n in MIN_WORKSPACE..=MAX_WORKSPACE {
                if let Some(ws) = self.store.workspace(monitor, n) {
                    victims.extend(
                        ws.tracked
                            .values()
                            .filter(|t| t.owner_pid == pid)
                            .map(|t| t.window_id),
                    );
                }
            }
        }
        debug!(pid, count = victims.len(), "app terminated, destroying its windows");
        for wid in victims {
            self.on_window_destroyed(wid);
        }
    }

    fn on_focus_changed(&mut self, wid: WindowId) {
        let Some((monitor, n)) = self.store.find_workspace_of(wid) else {
            return;
        };
        if n != self.store.active_workspace(monitor) {
            return;
        }
        self.focused_monitor = monitor;
        {
            let ws = self.store.active_mut(monitor);
            ws.focused = Some(wid);
            if !ws.columns.is_empty() {
                if let Some((ci, ri)) = ws
                    .columns
                    .iter()
                    .enumerate()
                    .find_map(|(ci, c)| {
                        c.windows.iter().position(|&w| w == wid).map(|ri| (ci, ri))
                    })
                {
                    ws.active_column = ci;
                    ws.columns[ci].focused_row = ri;
                }
            }
        }
        self.update_decorations(monitor);
    }

    /// Focus-follows-app: when an app activates without a window on the
    /// active workspace, switch to the workspace holding one. The
    /// non-empty guard stops the bounce that happens when closing the
    /// last window makes the OS activate some unrelated app.
    fn on_app_activated(&mut self, pid: pid_t) {
        if !self.config.layout.focus_follows_app || self.in_auto_switch {
            return;
        }
        let monitor = self.focused_monitor;
        let Some(active) = self.store.active_ref(monitor) else {
            return;
        };
        if active.is_empty() {
            return;
        }
        if active.tracked.values().any(|t| t.owner_pid == pid) {
            return;
        }
        let target = (MIN_WORKSPACE..=MAX_WORKSPACE).find_map(|n| {
            let ws = self.store.workspace(monitor, n)?;
            let owned = ws.tracked.values().find(|t| t.owner_pid == pid)?;
            Some((n, owned.window_id))
        });
        if let Some((n, wid)) = target {
            debug!(pid, workspace = n, "following activated app to its workspace");
            self.in_auto_switch = true;
            self.switch_workspace(monitor, n);
            self.focus_window(wid);
            self.in_auto_switch = false;
        }
    }

    fn on_mouse_moved(&mut self, point: Point) {
        if !self.config.layout.focus_follows_mouse {
            return;
        }
        let now = Instant::now();
        if self
            .last_mouse_focus
            .is_some_and(|last| now.duration_since(last) < MOUSE_FOCUS_INTERVAL)
        {
            return;
        }
        self.last_mouse_focus = Some(now);

        let monitor = self.focused_monitor;
        let Some(ws) = self.store.active_ref(monitor) else {
            return;
        };
        let candidates: Vec<(WindowId, Rect)> = ws
            .tiled
            .iter()
            .filter_map(|&w| ws.tracked.get(&w).map(|t| (w, t.last_frame)))
            .collect();
        let hovered = engine::window_at_point(&candidates, point);
        if let Some(wid) = hovered {
            if ws.focused != Some(wid) {
                self.focus_window(wid);
            }
        }
    }

    // ---- actions ------------------------------------------------------

    pub fn handle_action(&mut self, action: Action) {
        let monitor = self.focused_monitor;
        match action {
            Action::FocusLeft => self.focus_direction(Direction::Left),
            Action::FocusRight => self.focus_direction(Direction::Right),
            Action::FocusUp => self.focus_direction(Direction::Up),
            Action::FocusDown => self.focus_direction(Direction::Down),
            Action::FocusNext => self.focus_cycle(1),
            Action::FocusPrev => self.focus_cycle(-1),
            Action::SwapMaster => {
                let focused = self.focused_window(monitor);
                if let Some(wid) = focused {
                    let ws = self.store.active_mut(monitor);
                    engine::swap_with_first(&mut ws.tiled, wid);
                    if !ws.columns.is_empty() {
                        ws.rebuild_columns_from_tiled();
                    }
                    self.retile(monitor);
                }
            }
            Action::RotateNext => {
                {
                    let ws = self.store.active_mut(monitor);
                    engine::rotate_next(&mut ws.tiled);
                    if !ws.columns.is_empty() {
                        ws.rebuild_columns_from_tiled();
                    }
                }
                self.retile(monitor);
            }
            Action::RotatePrev => {
                {
                    let ws = self.store.active_mut(monitor);
                    engine::rotate_prev(&mut ws.tiled);
                    if !ws.columns.is_empty() {
                        ws.rebuild_columns_from_tiled();
                    }
                }
                self.retile(monitor);
            }
            Action::CycleLayout => {
                {
                    let ws = self.store.active_mut(monitor);
                    ws.layout_variant = ws.layout_variant.next();
                }
                self.retile(monitor);
            }
            Action::ToggleFloat => self.toggle_float(),
            Action::ToggleFullscreen => self.toggle_fullscreen(),
            Action::Close => self.close_focused(),
            Action::Retile => self.retile(monitor),
            Action::ReloadConfig => self.reload_config(),
            Action::FocusMonitorLeft => self.focus_monitor_step(-1),
            Action::FocusMonitorRight => self.focus_monitor_step(1),
            Action::MoveToMonitorLeft => self.move_to_monitor_step(-1),
            Action::MoveToMonitorRight => self.move_to_monitor_step(1),
            Action::PositionLeft
            | Action::PositionRight
            | Action::PositionUp
            | Action::PositionDown
            | Action::PositionFill
            | Action::PositionCenter => self.position_floating(&action),
            Action::IncreaseGap => self.adjust_gap(GAP_STEP),
            Action::DecreaseGap => self.adjust_gap(-GAP_STEP),
            Action::GrowFocused => self.resize_focused(1.0),
            Action::ShrinkFocused => self.resize_focused(-1.0),
            Action::SwitchWorkspace(n) => self.switch_workspace(monitor, n),
            Action::MoveToWorkspace(n) => self.move_to_workspace(n),
            Action::Minimize => self.toggle_minimize(),
            Action::SetMark(key) => self.set_mark(key),
            Action::JumpMark(key) => self.jump_mark(&key),
            Action::NiriConsume => self.niri_consume(),
            Action::NiriExpel => self.niri_expel(),
        }
    }

    fn focused_window(&self, monitor: MonitorId) -> Option<WindowId> {
        self.store.active_ref(monitor).and_then(|ws| ws.focused)
    }

    fn focus_direction(&mut self, direction: Direction) {
        let monitor = self.focused_monitor;
        let niri = self
            .store
            .active_ref(monitor)
            .map(|ws| !ws.columns.is_empty())
            .unwrap_or(false)
            && self.config.layout.tiling_mode == TilingMode::Niri;

        if niri {
            match direction {
                Direction::Left => self.scroll_to_column(-1),
                Direction::Right => self.scroll_to_column(1),
                Direction::Up => self.focus_column_row(-1),
                Direction::Down => self.focus_column_row(1),
            }
            return;
        }

        let target = {
            let Some(ws) = self.store.active_ref(monitor) else {
                return;
            };
            let Some(focused) = ws.focused else {
                return;
            };
            let Some(current) = ws.tracked.get(&focused).map(|t| t.last_frame) else {
                return;
            };
            let candidates: Vec<(WindowId, Rect)> = ws
                .tiled
                .iter()
                .chain(ws.floating.iter())
                .filter(|&&w| w != focused)
                .filter_map(|&w| ws.tracked.get(&w).map(|t| (w, t.last_frame)))
                .collect();
            engine::neighbor_in_direction(current, &candidates, direction)
        };
        if let Some(wid) = target {
            self.focus_window(wid);
        }
    }

    fn focus_cycle(&mut self, step: isize) {
        let monitor = self.focused_monitor;
        let target = {
            let Some(ws) = self.store.active_ref(monitor) else {
                return;
            };
            if ws.tiled.is_empty() {
                return;
            }
            let len = ws.tiled.len() as isize;
            let current = ws
                .focused
                .and_then(|f| ws.tiled.iter().position(|&w| w == f))
                .map(|i| i as isize)
                .unwrap_or(0);
            let next = (current + step).rem_euclid(len) as usize;
            ws.tiled[next]
        };
        self.focus_window(target);
    }

    fn toggle_float(&mut self) {
        let monitor = self.focused_monitor;
        let Some(wid) = self.focused_window(monitor) else {
            return;
        };
        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        {
            let ws = self.store.active_mut(monitor);
            match ws.subset_of(wid) {
                Some(WindowSubset::Floating) => {
                    ws.floating.remove(&wid);
                    if let Some(t) = ws.tracked.get_mut(&wid) {
                        t.is_floating = false;
                    }
                    if niri {
                        ws.ensure_columns();
                        let at = (ws.active_column + 1).min(ws.columns.len());
                        ws.columns.insert(at, Column::single(wid));
                        ws.active_column = at;
                        ws.sync_tiled_from_columns();
                    } else {
                        ws.insert_tiled_after_focus(wid);
                    }
                }
                Some(WindowSubset::Tiled) => {
                    ws.tiled.retain(|&w| w != wid);
                    for column in &mut ws.columns {
                        column.windows.retain(|&w| w != wid);
                        column.clamp_focused_row();
                    }
                    ws.columns.retain(|c| !c.windows.is_empty());
                    ws.clamp_active_column();
                    if !ws.columns.is_empty() {
                        ws.sync_tiled_from_columns();
                    }
                    ws.floating.insert(wid);
                    if let Some(t) = ws.tracked.get_mut(&wid) {
                        t.is_floating = true;
                    }
                }
                _ => return,
            }
        }
        self.retile(monitor);
    }

    fn toggle_fullscreen(&mut self) {
        let monitor = self.focused_monitor;
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let Some(wid) = self.focused_window(monitor) else {
            return;
        };
        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        let restore_frame;
        {
            let ws = self.store.active_mut(monitor);
            if ws.fullscreen.contains(&wid) {
                ws.fullscreen.remove(&wid);
                let floating = ws.tracked.get(&wid).is_some_and(|t| t.is_floating);
                restore_frame = ws.tracked.get(&wid).map(|t| t.last_frame);
                if floating {
                    ws.floating.insert(wid);
                } else if niri {
                    ws.ensure_columns();
                    let at = (ws.active_column + 1).min(ws.columns.len());
                    ws.columns.insert(at, Column::single(wid));
                    ws.active_column = at;
                    ws.sync_tiled_from_columns();
                } else {
                    ws.insert_tiled_after_focus(wid);
                }
            } else {
                match ws.subset_of(wid) {
                    Some(WindowSubset::Tiled) => {
                        if let Ok(frame) = self.bridge.window_frame(wid) {
                            if let Some(t) = ws.tracked.get_mut(&wid) {
                                t.last_frame = frame;
                            }
                        }
                        ws.tiled.retain(|&w| w != wid);
                        for column in &mut ws.columns {
                            column.windows.retain(|&w| w != wid);
                            column.clamp_focused_row();
                        }
                        ws.columns.retain(|c| !c.windows.is_empty());
                        ws.clamp_active_column();
                        if !ws.columns.is_empty() {
                            ws.sync_tiled_from_columns();
                        }
                    }
                    Some(WindowSubset::Floating) => {
                        if let Ok(frame) = self.bridge.window_frame(wid) {
                            if let Some(t) = ws.tracked.get_mut(&wid) {
                                t.last_frame = frame;
                            }
                        }
                        ws.floating.remove(&wid);
                    }
                    _ => return,
                }
                ws.fullscreen.insert(wid);
                restore_frame = None;
            }
        }
        match restore_frame {
            // Leaving fullscreen: a floating window returns to its saved
            // frame, a tiled one is placed by the retile below.
            Some(frame) => {
                let floating = self
                    .store
                    .active_ref(monitor)
                    .is_some_and(|ws| ws.floating.contains(&wid));
                if floating {
                    _ = self.bridge.set_frame(wid, frame);
                }
            }
            None => {
                if self
                    .store
                    .active_ref(monitor)
                    .is_some_and(|ws| ws.fullscreen.contains(&wid))
                {
                    _ = self.bridge.set_frame(wid, mon.frame);
                }
            }
        }
        self.retile(monitor);
    }

    fn close_focused(&mut self) {
        let monitor = self.focused_monitor;
        let Some(wid) = self.focused_window(monitor) else {
            return;
        };
        let redistribution = {
            let Some(ws) = self.store.active_ref(monitor) else {
                return;
            };
            // In scrolling mode the post-destroy retile redistributes;
            // precomputing only makes sense for the master-stack frames.
            if ws.tiled.contains(&wid) && ws.columns.is_empty() {
                let remaining: Vec<WindowId> =
                    ws.tiled.iter().copied().filter(|&w| w != wid).collect();
                self.frames_for(monitor, &remaining)
            } else {
                Vec::new()
            }
        };

        let bridge = self.bridge.clone();
        let on_complete: Box<dyn FnOnce() + Send> = Box::new(move || {
            if let Err(e) = bridge.press_close_button(wid) {
                debug!(?wid, %e, "close button press failed");
                return;
            }
            // A "save changes?" sheet may keep the window alive; make
            // sure it is visible again if so.
            if bridge.window_frame(wid).is_ok() {
                _ = bridge.set_alpha(wid, 1.0);
            }
        });
        self.animator.popout(wid, &redistribution, on_complete);
    }

    fn reload_config(&mut self) {
        let path = config_file();
        match Config::read(&path) {
            Ok(config) => {
                info!("configuration reloaded");
                self.apply_config(config);
            }
            Err(e) => warn!(%e, "config reload failed, keeping current settings"),
        }
    }

    pub fn apply_config(&mut self, config: Config) {
        self.animator.animate = config.layout.animations;
        self.dimmer.set_strength(config.layout.dim_unfocused);
        self.border.update_settings(config.border.clone());
        self.config = config;
        let monitors: Vec<MonitorId> = self.monitors.iter().map(|m| m.id).collect();
        for monitor in monitors {
            self.retile(monitor);
        }
    }

    fn adjust_gap(&mut self, delta: f64) {
        self.config.layout.inner_gap = (self.config.layout.inner_gap + delta).max(0.0);
        let monitor = self.focused_monitor;
        self.retile(monitor);
    }

    fn resize_focused(&mut self, sign: f64) {
        let monitor = self.focused_monitor;
        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        let default_width = self.config.layout.niri_column_width;
        {
            let ws = self.store.active_mut(monitor);
            if niri && !ws.columns.is_empty() {
                let active = ws.active_column;
                if let Some(column) = ws.columns.get_mut(active) {
                    let current = column.width_override.unwrap_or(default_width);
                    column.width_override = Some(
                        (current + sign * COLUMN_WIDTH_STEP)
                            .clamp(COLUMN_WIDTH_MIN, COLUMN_WIDTH_MAX),
                    );
                }
            } else {
                let ratio = ws.split_ratio + sign * SPLIT_STEP;
                ws.set_split_ratio(ratio);
            }
        }
        self.retile(monitor);
    }

    fn focus_monitor_step(&mut self, step: isize) {
        let Some(target) = self.monitor_neighbor(step) else {
            return;
        };
        self.focused_monitor = target;
        let focus = self
            .store
            .active_ref(target)
            .and_then(|ws| ws.focused.or_else(|| ws.tiled.first().copied()));
        match focus {
            Some(wid) => self.focus_window(wid),
            None => self.bridge.focus_desktop(),
        }
    }

    fn move_to_monitor_step(&mut self, step: isize) {
        let source = self.focused_monitor;
        let Some(target) = self.monitor_neighbor(step) else {
            return;
        };
        let Some(wid) = self.focused_window(source) else {
            return;
        };
        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        let entry = {
            let ws = self.store.active_mut(source);
            let subset = ws.subset_of(wid);
            ws.remove_window(wid).map(|t| (t, subset))
        };
        let Some((tracked, subset)) = entry else {
            return;
        };
        {
            let n = self.store.active_workspace(target);
            let ws = self.store.workspace_mut(target, n);
            ws.tracked.insert(wid, tracked);
            match subset {
                Some(WindowSubset::Floating) => {
                    ws.floating.insert(wid);
                }
                Some(WindowSubset::Fullscreen) => {
                    ws.fullscreen.insert(wid);
                }
                _ if niri => {
                    ws.ensure_columns();
                    let at = (ws.active_column + 1).min(ws.columns.len());
                    ws.columns.insert(at, Column::single(wid));
                    ws.active_column = at;
                    ws.sync_tiled_from_columns();
                }
                _ => {
                    ws.insert_tiled_after_focus(wid);
                }
            }
            ws.focused = Some(wid);
        }
        self.retile(source);
        self.focused_monitor = target;
        self.retile(target);
        self.focus_window(wid);
        self.persist();
    }

    fn monitor_neighbor(&self, step: isize) -> Option<MonitorId> {
        let index = self.monitors.iter().position(|m| m.id == self.focused_monitor)?;
        let target = index as isize + step;
        if target < 0 || target as usize >= self.monitors.len() {
            return None;
        }
        Some(self.monitors[target as usize].id)
    }

    fn position_floating(&mut self, action: &Action) {
        let monitor = self.focused_monitor;
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let Some(wid) = self.focused_window(monitor) else {
            return;
        };
        let is_floating = self
            .store
            .active_ref(monitor)
            .is_some_and(|ws| ws.floating.contains(&wid));
        if !is_floating {
            return;
        }
        let region = mon.tiling_frame;
        let (x, y, w, h) = (
            region.origin.x,
            region.origin.y,
            region.size.width,
            region.size.height,
        );
        let frame = match action {
            Action::PositionLeft => Rect::new(x, y, w / 2.0, h),
            Action::PositionRight => Rect::new(x + w / 2.0, y, w / 2.0, h),
            Action::PositionUp => Rect::new(x, y, w, h / 2.0),
            Action::PositionDown => Rect::new(x, y + h / 2.0, w, h / 2.0),
            Action::PositionFill => region,
            Action::PositionCenter => Rect::new(x + w / 4.0, y + h / 4.0, w / 2.0, h / 2.0),
            _ => return,
        };
        if let Err(e) = self.bridge.set_frame(wid, frame) {
            warn!(?wid, %e, "positioning floating window failed");
            return;
        }
        if let Some(t) = self.store.active_mut(monitor).tracked.get_mut(&wid) {
            t.last_frame = frame;
        }
    }

    // ---- workspaces ---------------------------------------------------

    pub fn switch_workspace(&mut self, monitor: MonitorId, n: WorkspaceNumber) {
        if !(MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n) {
            return;
        }
        let previous = self.store.active_workspace(monitor);
        if n == previous {
            return;
        }
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };

        self.observer.pause();
        self.dimmer.clear();
        self.animator.cancel_all();

        // Capture live frames of floating/fullscreen windows so they
        // come back exactly where the user left them.
        {
            let captures: Vec<WindowId> = self
                .store
                .active_ref(monitor)
                .map(|ws| ws.floating.iter().chain(ws.fullscreen.iter()).copied().collect())
                .unwrap_or_default();
            for wid in captures {
                if let Ok(frame) = self.bridge.window_frame(wid) {
                    let ws = self.store.active_mut(monitor);
                    ws.saved_frames.insert(wid, frame);
                    if let Some(t) = ws.tracked.get_mut(&wid) {
                        t.last_frame = frame;
                    }
                }
            }
        }

        // Hide everything non-sticky in one batched update.
        let (hide_batch, sticky_ids) = {
            let Some(ws) = self.store.active_ref(monitor) else {
                self.observer.resume();
                return;
            };
            let mut batch = Vec::new();
            let mut sticky = Vec::new();
            for (wid, tracked) in &ws.tracked {
                if tracked.is_sticky {
                    sticky.push(*wid);
                } else {
                    batch.push((*wid, hidden_frame(mon.frame, tracked.last_frame.size)));
                }
            }
            (batch, sticky)
        };
        self.animator.batch_move(&hide_batch);

        // Sticky windows belong to every workspace; carry them over.
        let carried: Vec<(TrackedWindow, Option<WindowSubset>)> = {
            let ws = self.store.workspace_mut(monitor, previous);
            sticky_ids
                .iter()
                .filter_map(|&wid| {
                    let subset = ws.subset_of(wid);
                    ws.remove_window(wid).map(|t| (t, subset))
                })
                .collect()
        };

        self.store.set_active_workspace(monitor, n);

        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        {
            let ws = self.store.workspace_mut(monitor, n);
            for (tracked, subset) in carried {
                let wid = tracked.window_id;
                ws.tracked.insert(wid, tracked);
                match subset {
                    Some(WindowSubset::Floating) => {
                        ws.floating.insert(wid);
                    }
                    Some(WindowSubset::Fullscreen) => {
                        ws.fullscreen.insert(wid);
                    }
                    _ if niri => {
                        ws.ensure_columns();
                        ws.columns.push(Column::single(wid));
                        ws.sync_tiled_from_columns();
                    }
                    _ => {
                        ws.tiled.push(wid);
                    }
                }
            }
        }

        self.retile(monitor);

        // Retile only places tiled windows; restore the rest explicitly.
        let restores: Vec<(WindowId, Rect)> = {
            let ws = self.store.active_mut(monitor);
            let saved: Vec<(WindowId, Rect)> = ws
                .floating
                .iter()
                .chain(ws.fullscreen.iter())
                .filter_map(|&wid| {
                    ws.saved_frames
                        .get(&wid)
                        .copied()
                        .or_else(|| ws.tracked.get(&wid).map(|t| t.last_frame))
                        .map(|frame| (wid, frame))
                })
                .collect();
            saved
        };
        self.animator.batch_move(&restores);
        for &(wid, _) in &restores {
            _ = self.bridge.set_alpha(wid, 1.0);
        }

        // Focus policy: an empty workspace focuses the desktop so the OS
        // does not leave keyboard focus on some unrelated app.
        let focus = {
            let ws = self.store.active_mut(monitor);
            if ws.is_empty() {
                None
            } else {
                let focus = ws
                    .focused
                    .filter(|f| ws.contains(*f))
                    .or_else(|| ws.tiled.first().copied())
                    .or_else(|| ws.floating.iter().next().copied());
                ws.focused = focus;
                focus
            }
        };
        match focus {
            Some(wid) => self.focus_window(wid),
            None => self.bridge.focus_desktop(),
        }

        self.observer.resume();
        self.persist();
    }

    pub fn move_to_workspace(&mut self, n: WorkspaceNumber) {
        if !(MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n) {
            return;
        }
        let monitor = self.focused_monitor;
        if n == self.store.active_workspace(monitor) {
            return;
        }
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let Some(wid) = self.focused_window(monitor) else {
            return;
        };
        if self
            .store
            .active_ref(monitor)
            .and_then(|ws| ws.tracked.get(&wid))
            .is_some_and(|t| t.is_sticky)
        {
            debug!(?wid, "sticky windows cannot be moved between workspaces");
            return;
        }

        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        let (entry, next_focus) = {
            let ws = self.store.active_mut(monitor);
            let subset = ws.subset_of(wid);
            let entry = ws.remove_window(wid).map(|t| (t, subset));
            let next = ws.tiled.first().copied().or_else(|| ws.floating.iter().next().copied());
            ws.focused = next;
            (entry, next)
        };
        let Some((mut tracked, subset)) = entry else {
            return;
        };

        let hidden = hidden_frame(mon.frame, tracked.last_frame.size);
        if let Err(e) = self.bridge.set_frame(wid, hidden) {
            debug!(?wid, %e, "hiding moved window failed");
        }
        tracked.swallowed_by = None;
        tracked.swallowed_from = None;

        {
            let ws = self.store.workspace_mut(monitor, n);
            ws.tracked.insert(wid, tracked);
            match subset {
                Some(WindowSubset::Floating) => {
                    ws.floating.insert(wid);
                }
                Some(WindowSubset::Fullscreen) => {
                    ws.fullscreen.insert(wid);
                }
                _ if niri => {
                    ws.ensure_columns();
                    ws.columns.push(Column::single(wid));
                    ws.sync_tiled_from_columns();
                }
                _ => {
                    ws.tiled.push(wid);
                }
            }
            ws.focused = Some(wid);
        }

        self.retile(monitor);
        match next_focus {
            Some(next) => self.focus_window(next),
            None => self.bridge.focus_desktop(),
        }
        self.persist();
    }

    // ---- scrolling mode ----------------------------------------------

    /// Shift the active column by `step` and re-center the strip. The
    /// retile restores alpha on columns entering the viewport and parks
    /// the ones that left it at their strip coordinates with alpha 0.
    fn scroll_to_column(&mut self, step: isize) {
        let monitor = self.focused_monitor;
        let focus = {
            let ws = self.store.active_mut(monitor);
            if ws.columns.is_empty() {
                return;
            }
            let target = (ws.active_column as isize + step)
                .clamp(0, ws.columns.len() as isize - 1) as usize;
            if target == ws.active_column {
                return;
            }
            ws.active_column = target;
            let column = &ws.columns[target];
            column.windows.get(column.focused_row).copied()
        };
        self.retile(monitor);
        if let Some(wid) = focus {
            self.focus_window(wid);
        }
    }

    /// Move the focused row inside the active column.
    fn focus_column_row(&mut self, step: isize) {
        let monitor = self.focused_monitor;
        let focus = {
            let ws = self.store.active_mut(monitor);
            let active = ws.active_column;
            let Some(column) = ws.columns.get_mut(active) else {
                return;
            };
            if column.windows.is_empty() {
                return;
            }
            let target = (column.focused_row as isize + step)
                .clamp(0, column.windows.len() as isize - 1) as usize;
            column.focused_row = target;
            column.windows.get(target).copied()
        };
        if let Some(wid) = focus {
            self.focus_window(wid);
        }
    }

    /// Pull the first window of the column to the right into the active
    /// column.
    fn niri_consume(&mut self) {
        let monitor = self.focused_monitor;
        self.ensure_columns(monitor);
        let focus = {
            let ws = self.store.active_mut(monitor);
            let active = ws.active_column;
            if active + 1 >= ws.columns.len() {
                return;
            }
            let donor = &mut ws.columns[active + 1];
            if donor.windows.is_empty() {
                return;
            }
            let consumed = donor.windows.remove(0);
            donor.clamp_focused_row();
            let donor_empty = donor.windows.is_empty();
            if donor_empty {
                ws.columns.remove(active + 1);
            }
            let column = &mut ws.columns[active];
            column.windows.push(consumed);
            column.focused_row = column.windows.len() - 1;
            ws.clamp_active_column();
            ws.sync_tiled_from_columns();
            consumed
        };
        self.retile(monitor);
        self.focus_window(focus);
    }

    /// Push the focused window out of a multi-window column into a new
    /// column immediately to the right.
    fn niri_expel(&mut self) {
        let monitor = self.focused_monitor;
        self.ensure_columns(monitor);
        let focus = {
            let ws = self.store.active_mut(monitor);
            let active = ws.active_column;
            let Some(column) = ws.columns.get_mut(active) else {
                return;
            };
            if column.windows.len() < 2 {
                return;
            }
            let row = column.focused_row.min(column.windows.len() - 1);
            let expelled = column.windows.remove(row);
            column.clamp_focused_row();
            ws.columns.insert(active + 1, Column::single(expelled));
            ws.active_column = active + 1;
            ws.sync_tiled_from_columns();
            expelled
        };
        self.retile(monitor);
        self.focus_window(focus);
    }

    fn ensure_columns(&mut self, monitor: MonitorId) {
        self.store.active_mut(monitor).ensure_columns();
    }

    // ---- marks --------------------------------------------------------

    fn set_mark(&mut self, key: String) {
        let monitor = self.focused_monitor;
        if let Some(wid) = self.focused_window(monitor) {
            debug!(%key, ?wid, "mark set");
            self.marks.insert(key, wid);
        }
    }

    fn jump_mark(&mut self, key: &str) {
        let Some(&wid) = self.marks.get(key) else {
            return;
        };
        let Some((monitor, n)) = self.store.find_workspace_of(wid) else {
            // The marked window is gone; drop the mark.
            self.marks.remove(key);
            return;
        };
        if n != self.store.active_workspace(monitor) {
            self.switch_workspace(monitor, n);
        }
        self.focused_monitor = monitor;
        self.focus_window(wid);
    }

    // ---- minimize -----------------------------------------------------

    fn toggle_minimize(&mut self) {
        let monitor = self.focused_monitor;
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        let focused = self.focused_window(monitor);

        if let Some(wid) = focused {
            let size = {
                let ws = self.store.active_mut(monitor);
                ws.tiled.retain(|&w| w != wid);
                for column in &mut ws.columns {
                    column.windows.retain(|&w| w != wid);
                    column.clamp_focused_row();
                }
                ws.columns.retain(|c| !c.windows.is_empty());
                ws.clamp_active_column();
                if !ws.columns.is_empty() {
                    ws.sync_tiled_from_columns();
                }
                ws.minimized.insert(wid);
                ws.focused = None;
                ws.tracked.get(&wid).map(|t| t.last_frame.size).unwrap_or_default()
            };
            if let Err(e) = self.bridge.set_frame(wid, hidden_frame(mon.frame, size)) {
                debug!(?wid, %e, "hiding minimized window failed");
            }
            self.retile(monitor);
            let next = {
                let ws = self.store.active_mut(monitor);
                let next = ws.tiled.first().copied();
                ws.focused = next;
                next
            };
            match next {
                Some(next) => self.focus_window(next),
                None => self.bridge.focus_desktop(),
            }
        } else {
            // Nothing focused: restore the lowest-id minimized window.
            let restored = {
                let ws = self.store.active_mut(monitor);
                let Some(&wid) = ws.minimized.iter().min() else {
                    return;
                };
                ws.minimized.remove(&wid);
                let floating = ws.tracked.get(&wid).is_some_and(|t| t.is_floating);
                if !floating {
                    if niri {
                        ws.ensure_columns();
                        let at = (ws.active_column + 1).min(ws.columns.len());
                        ws.columns.insert(at, Column::single(wid));
                        ws.active_column = at;
                        ws.sync_tiled_from_columns();
                    } else {
                        ws.insert_tiled_after_focus(wid);
                    }
                }
                ws.focused = Some(wid);
                wid
            };
            let frame = mon.tiling_frame;
            let restore_frame = Rect::new(
                frame.origin.x + frame.size.width / 4.0,
                frame.origin.y + frame.size.height / 4.0,
                frame.size.width / 2.0,
                frame.size.height / 2.0,
            );
            _ = self.bridge.set_frame(restored, restore_frame);
            self.retile(monitor);
            self.focus_window(restored);
        }
    }

    // ---- drag ---------------------------------------------------------

    fn on_drag_started(&mut self, point: Point) {
        let monitor = self.focused_monitor;
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let (divider, horizontal, source) = {
            let Some(ws) = self.store.active_ref(monitor) else {
                return;
            };
            let area = mon.tiling_frame;
            let horizontal = ws.layout_variant != LayoutVariant::Stacked;
            let divider = if horizontal {
                area.origin.x + area.size.width * ws.split_ratio
            } else {
                area.origin.y + area.size.height * ws.split_ratio
            };
            let candidates: Vec<(WindowId, Rect)> = ws
                .tiled
                .iter()
                .filter_map(|&w| ws.tracked.get(&w).map(|t| (w, t.last_frame)))
                .collect();
            (divider, horizontal, engine::window_at_point(&candidates, point))
        };
        self.drag.begin(point, divider, horizontal, source);
    }

    fn on_drag_moved(&mut self, point: Point) {
        if !self.drag.is_resizing() {
            return;
        }
        let monitor = self.focused_monitor;
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let horizontal = self
            .store
            .active_ref(monitor)
            .map(|ws| ws.layout_variant != LayoutVariant::Stacked)
            .unwrap_or(true);
        let ratio = ratio_for_cursor(mon.tiling_frame, point, horizontal);
        self.store.active_mut(monitor).set_split_ratio(ratio);
        // Frames snap without animation while the divider is dragged.
        self.retile(monitor);
    }

    fn on_drag_ended(&mut self, point: Point) {
        let monitor = self.focused_monitor;
        let Some(mode) = self.drag.end() else {
            return;
        };
        if let DragMode::SwapTiles { source } = mode {
            let target = {
                let Some(ws) = self.store.active_ref(monitor) else {
                    return;
                };
                let candidates: Vec<(WindowId, Rect)> = ws
                    .tiled
                    .iter()
                    .filter_map(|&w| ws.tracked.get(&w).map(|t| (w, t.last_frame)))
                    .collect();
                engine::window_at_point(&candidates, point)
            };
            if let Some(target) = target {
                if target != source {
                    let ws = self.store.active_mut(monitor);
                    let a = ws.tiled.iter().position(|&w| w == source);
                    let b = ws.tiled.iter().position(|&w| w == target);
                    if let (Some(a), Some(b)) = (a, b) {
                        ws.tiled.swap(a, b);
                        if !ws.columns.is_empty() {
                            ws.rebuild_columns_from_tiled();
                        }
                    }
                    self.retile(monitor);
                }
            }
        }
    }

    // ---- layout plumbing ---------------------------------------------

    fn gaps(&self) -> Gaps {
        Gaps {
            inner: self.config.layout.inner_gap,
            outer: self.config.layout.outer_gap,
            single_window_padding: self.config.layout.single_window_padding,
        }
    }

    /// Target frames for an explicit tile order, used to precompute the
    /// redistribution that accompanies a close animation.
    fn frames_for(&self, monitor: MonitorId, tiled: &[WindowId]) -> Vec<(WindowId, Rect)> {
        let Some(mon) = self.monitor(monitor) else {
            return Vec::new();
        };
        let Some(ws) = self.store.active_ref(monitor) else {
            return Vec::new();
        };
        let frames = engine::master_stack_frames(
            tiled.len(),
            mon.tiling_frame,
            &self.gaps(),
            ws.split_ratio,
            ws.layout_variant,
        );
        tiled.iter().copied().zip(frames).collect()
    }

    /// Recompute and apply the active workspace's layout.
    pub fn retile(&mut self, monitor: MonitorId) {
        self.retile_inner(monitor, None);
    }

    fn retile_with_popin(&mut self, monitor: MonitorId, new_window: WindowId) {
        self.retile_inner(monitor, Some(new_window));
    }

    fn retile_inner(&mut self, monitor: MonitorId, popin: Option<WindowId>) {
        let Some(mon) = self.monitor(monitor).cloned() else {
            return;
        };
        let niri = self.config.layout.tiling_mode == TilingMode::Niri;
        let gaps = self.gaps();
        let default_column_width = self.config.layout.niri_column_width;
        let dragged = self.drag.dragged_window();

        let (mut visible, offstrip, fullscreen) = {
            let ws = self.store.active_mut(monitor);
            if niri {
                ws.ensure_columns();
                if ws.repair_column_divergence() {
                    let err = ReactorError::InvariantViolated(
                        "column flattening diverged from tile order".into(),
                    );
                    warn!(%err, "repaired before retile");
                }
            }

            let mut visible: Vec<(WindowId, Rect)> = Vec::new();
            let mut offstrip: Vec<(WindowId, Rect)> = Vec::new();
            if niri && !ws.columns.is_empty() {
                let layout = engine::scrolling_frames(
                    &ws.columns,
                    ws.active_column,
                    mon.tiling_frame,
                    &gaps,
                    default_column_width,
                );
                for column in layout {
                    if column.is_visible {
                        visible.extend(column.frames);
                    } else {
                        offstrip.extend(column.frames);
                    }
                }
            } else {
                let frames = engine::master_stack_frames(
                    ws.tiled.len(),
                    mon.tiling_frame,
                    &gaps,
                    ws.split_ratio,
                    ws.layout_variant,
                );
                visible = ws.tiled.iter().copied().zip(frames).collect();
            }
            let fullscreen: Vec<(WindowId, Rect)> =
                ws.fullscreen.iter().map(|&w| (w, mon.frame)).collect();

            for &(wid, frame) in visible.iter().chain(&offstrip).chain(&fullscreen) {
                if let Some(t) = ws.tracked.get_mut(&wid) {
                    t.last_frame = frame;
                }
            }
            (visible, offstrip, fullscreen)
        };

        visible.extend(fullscreen);

        // When the layout degenerates to native halves/quarters, let the
        // desktop environment animate the moves itself.
        let use_native = self.config.layout.native_animation && !niri;
        let mut batch: Vec<(WindowId, Rect)> = Vec::with_capacity(visible.len());
        for &(wid, frame) in visible.iter().chain(&offstrip) {
            if Some(wid) == dragged || Some(wid) == popin {
                continue;
            }
            if use_native {
                if let Some(tile) = Self::native_tile(frame, mon.tiling_frame) {
                    if self.bridge.set_native_tile(wid, tile).is_ok() {
                        continue;
                    }
                }
            }
            batch.push((wid, frame));
        }
        self.animator.batch_move(&batch);

        // Off-strip columns are alpha-hidden at their strip coordinates;
        // everything visible gets its alpha back.
        for &(wid, _) in &offstrip {
            _ = self.bridge.set_alpha(wid, 0.0);
        }
        for &(wid, _) in &visible {
            if Some(wid) != popin {
                _ = self.bridge.set_alpha(wid, 1.0);
            }
        }

        if let Some(new_window) = popin {
            if let Some(&(_, frame)) =
                visible.iter().find(|&&(wid, _)| wid == new_window)
            {
                self.animator.popin(new_window, frame);
            }
        }

        self.update_decorations(monitor);
    }

    fn update_decorations(&mut self, monitor: MonitorId) {
        let (tiled, focused, focused_frame) = {
            let Some(ws) = self.store.active_ref(monitor) else {
                return;
            };
            let focused_frame =
                ws.focused.and_then(|f| ws.tracked.get(&f)).map(|t| t.last_frame);
            (ws.tiled.clone(), ws.focused, focused_frame)
        };
        self.dimmer.apply(&tiled, focused);
        self.border.update(focused.zip(focused_frame));
    }

    fn focus_window(&mut self, wid: WindowId) {
        if self.bridge.focus_window(wid).is_err() {
            // Identity-lost: stop tiling the window but keep tracking it
            // until the observer reports destruction.
            let err = ReactorError::IdentityLost(wid);
            warn!(%err, "demoting window from the tile order");
            if let Some((monitor, n)) = self.store.find_workspace_of(wid) {
                let ws = self.store.workspace_mut(monitor, n);
                ws.tiled.retain(|&w| w != wid);
                for column in &mut ws.columns {
                    column.windows.retain(|&w| w != wid);
                    column.clamp_focused_row();
                }
                ws.columns.retain(|c| !c.windows.is_empty());
                ws.clamp_active_column();
                if ws.focused == Some(wid) {
                    ws.focused = None;
                }
            }
            return;
        }
        if let Some((monitor, n)) = self.store.find_workspace_of(wid) {
            if n == self.store.active_workspace(monitor) {
                self.store.active_mut(monitor).focused = Some(wid);
                self.focused_monitor = monitor;
                self.update_decorations(monitor);
            }
        }
    }

    // ---- misc ---------------------------------------------------------

    fn set_monitors(&mut self, mut monitors: Vec<Monitor>) {
        monitors.sort_by(|a, b| {
            a.frame.origin.x.partial_cmp(&b.frame.origin.x).unwrap_or(std::cmp::Ordering::Equal)
        });
        self.monitors = monitors;
        if self.monitor(self.focused_monitor).is_none() {
            if let Some(first) = self.monitors.first() {
                self.focused_monitor = first.id;
            }
        }
        let monitors: Vec<MonitorId> = self.monitors.iter().map(|m| m.id).collect();
        for monitor in monitors {
            self.retile(monitor);
        }
    }

    fn monitor(&self, id: MonitorId) -> Option<&Monitor> {
        self.monitors.iter().find(|m| m.id == id)
    }

    /// The native tile position matching `frame`, if the frame is an
    /// exact half or quarter of the region.
    fn native_tile(frame: Rect, region: Rect) -> Option<NativeTile> {
        let half_w = region.size.width / 2.0;
        let half_h = region.size.height / 2.0;
        let left = region.origin.x;
        let right = region.origin.x + half_w;
        let top = region.origin.y;
        let bottom = region.origin.y + half_h;
        let tiles = [
            (Rect::new(left, top, half_w, region.size.height), NativeTile::LeftHalf),
            (Rect::new(right, top, half_w, region.size.height), NativeTile::RightHalf),
            (Rect::new(left, top, half_w, half_h), NativeTile::TopLeftQuarter),
            (Rect::new(right, top, half_w, half_h), NativeTile::TopRightQuarter),
            (Rect::new(left, bottom, half_w, half_h), NativeTile::BottomLeftQuarter),
            (Rect::new(right, bottom, half_w, half_h), NativeTile::BottomRightQuarter),
        ];
        tiles.iter().find(|&&(tile_frame, _)| frame.approx_eq(tile_frame)).map(|&(_, tile)| tile)
    }

    fn primary(&self) -> Option<&Monitor> { self.monitors.first() }

    fn monitor_for_frame(&self, frame: Rect) -> Option<&Monitor> {
        self.monitors
            .iter()
            .find(|m| m.frame.contains(frame.origin))
            .or_else(|| self.monitors.first())
    }

    /// `Workspace N (K windows)[ <- current]` lines for the CLI.
    pub fn list_workspaces_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for monitor in self.monitors.iter().map(|m| m.id) {
            let current = self.store.active_workspace(monitor);
            let mut seen_current = false;
            for (n, count) in self.store.workspaces_with_windows(monitor) {
                let marker = if n == current {
                    seen_current = true;
                    " <- current"
                } else {
                    ""
                };
                match self.config.workspace_names.get(&n) {
                    Some(name) => {
                        lines.push(format!("Workspace {n} [{name}] ({count} windows){marker}"))
                    }
                    None => lines.push(format!("Workspace {n} ({count} windows){marker}")),
                }
            }
            if !seen_current {
                lines.push(format!("Workspace {current} (0 windows) <- current"));
            }
        }
        lines
    }

    /// Serialize the store for the restore file and write it off the
    /// main queue.
    pub fn persist(&self) {
        let Some(path) = self.restore_path.clone() else {
            return;
        };
        let snapshot = self.build_snapshot();
        snapshot.save_in_background(path);
    }

    pub fn build_snapshot(&self) -> RestoreSnapshot {
        let mut entries = Vec::new();
        let mut active_workspaces = Vec::new();
        for monitor in self.store.monitors() {
            active_workspaces.push((monitor.0, self.store.active_workspace(monitor)));
            for n in MIN_WORKSPACE..=MAX_WORKSPACE {
                let Some(ws) = self.store.workspace(monitor, n) else {
                    continue;
                };
                for tracked in ws.tracked.values() {
                    entries.push(RestoreEntry {
                        app_name: tracked.app_name.clone(),
                        bundle_id: tracked.bundle_id.clone(),
                        window_title: self.bridge.window_title(tracked.window_id),
                        workspace: n,
                        monitor: monitor.0,
                        is_floating: tracked.is_floating,
                        is_fullscreen: ws.fullscreen.contains(&tracked.window_id),
                    });
                }
            }
        }
        RestoreSnapshot {
            timestamp: 0,
            active_workspaces,
            entries,
        }
        .stamp_now()
    }
}
