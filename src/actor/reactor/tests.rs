use std::sync::Arc;

use super::*;
use crate::model::workspace::VirtualWorkspace;
use crate::sys::bridge::{BridgeCall, RecordingBridge, WindowInfo, WindowSubrole};
use crate::sys::process::StaticProcessTable;

fn screen() -> Rect { Rect::new(0.0, 0.0, 1000.0, 1000.0) }

fn monitor() -> MonitorId { MonitorId::new(1) }

fn w(id: u32) -> WindowId { WindowId::new(id) }

fn test_config() -> Config {
    let mut config = Config::default();
    // Deterministic frames: no animation sleeps, no outer inset.
    config.layout.animations = false;
    config.layout.outer_gap = 0.0;
    config.layout.auto_float_dialogs = false;
    config
}

struct Harness {
    reactor: Reactor,
    bridge: RecordingBridge,
    process: StaticProcessTable,
}

impl Harness {
    fn new() -> Self { Self::with_config(test_config()) }

    fn with_config(config: Config) -> Self {
        let bridge = RecordingBridge::new();
        let process = StaticProcessTable::new();
        let reactor = Reactor::new(
            config,
            Arc::new(bridge.clone()),
            Arc::new(process.clone()),
            vec![Monitor::new(monitor(), screen())],
        );
        Harness {
            reactor,
            bridge,
            process,
        }
    }

    fn add_to_bridge(&self, id: u32, pid: pid_t, app: &str, frame: Rect, title: Option<&str>) {
        self.bridge.add_window(WindowInfo {
            id: w(id),
            pid,
            app_name: app.to_string(),
            bundle_id: None,
            title: title.map(str::to_string),
            frame,
            subrole: WindowSubrole::Standard,
        });
    }

    fn open(&mut self, id: u32, pid: pid_t, app: &str) {
        self.open_sized(id, pid, app, Rect::new(50.0, 50.0, 800.0, 800.0), Some("window"));
    }

    fn open_sized(&mut self, id: u32, pid: pid_t, app: &str, frame: Rect, title: Option<&str>) {
        self.add_to_bridge(id, pid, app, frame, title);
        self.reactor.handle_event(Event::Window(WindowEvent::Created {
            window_id: w(id),
            pid,
            app_name: app.to_string(),
            bundle_id: None,
        }));
    }

    fn destroy(&mut self, id: u32) {
        self.bridge.remove_window(w(id));
        self.reactor.handle_event(Event::Window(WindowEvent::Destroyed(w(id))));
    }

    fn focus(&mut self, id: u32) {
        self.reactor.handle_event(Event::Window(WindowEvent::FocusChanged(w(id))));
    }

    fn act(&mut self, action: Action) { self.reactor.handle_event(Event::Command(action)); }

    fn ws(&self) -> &VirtualWorkspace {
        self.reactor.store.active_ref(monitor()).expect("active workspace")
    }

    fn frame(&self, id: u32) -> Rect { self.bridge.frame_of(w(id)).expect("window frame") }

    fn hidden_origin(&self) -> Point { Point::new(999.0, 999.0) }
}

mod master_stack_scenarios {
    use super::*;
    use test_log::test;

    #[test]
    fn two_windows_tile_into_halves() {
        let mut h = Harness::new();
        h.open(1, 10, "Editor");
        assert_eq!(h.ws().tiled, vec![w(1)]);
        assert_eq!(h.frame(1), screen());

        h.open(2, 20, "Browser");
        assert_eq!(h.ws().tiled, vec![w(1), w(2)]);
        assert_eq!(h.frame(1), Rect::new(4.0, 4.0, 492.0, 992.0));
        assert_eq!(h.frame(2), Rect::new(504.0, 4.0, 492.0, 992.0));
    }

    #[test]
    fn new_window_is_inserted_after_focus_and_focused() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.focus(1);
        h.open(3, 30, "C");
        assert_eq!(h.ws().tiled, vec![w(1), w(3), w(2)]);
        assert_eq!(h.ws().focused, Some(w(3)));
    }

    #[test]
    fn close_redistributes_remaining_windows() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.open(3, 30, "C");
        h.focus(2);

        h.act(Action::Close);
        let calls = h.bridge.calls();
        assert!(calls.contains(&BridgeCall::PressCloseButton(w(2))));
        // The close target survived (dialog case): alpha came back.
        assert_eq!(h.bridge.alpha_of(w(2)), Some(1.0));

        h.destroy(2);
        assert_eq!(h.ws().tiled, vec![w(1), w(3)]);
        assert_eq!(h.frame(1), Rect::new(4.0, 4.0, 492.0, 992.0));
        assert_eq!(h.frame(3), Rect::new(504.0, 4.0, 492.0, 992.0));
        assert_eq!(h.ws().focused, Some(w(3)));
    }

    #[test]
    fn cycle_layout_advances_variant() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        assert_eq!(h.ws().layout_variant, LayoutVariant::SideBySide);
        h.act(Action::CycleLayout);
        h.act(Action::CycleLayout);
        assert_eq!(h.ws().layout_variant, LayoutVariant::Monocle);
        h.act(Action::CycleLayout);
        assert_eq!(h.ws().layout_variant, LayoutVariant::SideBySide);
    }

    #[test]
    fn swap_master_and_rotations() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.open(3, 30, "C");

        h.focus(3);
        h.act(Action::SwapMaster);
        assert_eq!(h.ws().tiled, vec![w(3), w(2), w(1)]);

        h.act(Action::RotateNext);
        assert_eq!(h.ws().tiled, vec![w(1), w(3), w(2)]);
        h.act(Action::RotatePrev);
        assert_eq!(h.ws().tiled, vec![w(3), w(2), w(1)]);
    }

    #[test]
    fn split_ratio_stays_clamped_under_repeated_resizes() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        for _ in 0..30 {
            h.act(Action::ShrinkFocused);
        }
        assert_eq!(h.ws().split_ratio, 0.2);
        for _ in 0..30 {
            h.act(Action::GrowFocused);
        }
        assert_eq!(h.ws().split_ratio, 0.8);
    }

    #[test]
    fn directional_focus_finds_the_neighbor() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.focus(1);
        h.act(Action::FocusRight);
        assert_eq!(h.ws().focused, Some(w(2)));
        h.act(Action::FocusLeft);
        assert_eq!(h.ws().focused, Some(w(1)));
        // No neighbor above: focus is unchanged.
        h.act(Action::FocusUp);
        assert_eq!(h.ws().focused, Some(w(1)));
    }

    #[test]
    fn gap_changes_retile_and_never_go_negative() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        for _ in 0..10 {
            h.act(Action::DecreaseGap);
        }
        assert_eq!(h.reactor.config.layout.inner_gap, 0.0);
        assert_eq!(h.frame(1), Rect::new(0.0, 0.0, 500.0, 1000.0));
        h.act(Action::IncreaseGap);
        assert_eq!(h.reactor.config.layout.inner_gap, 2.0);
    }
}

mod classification {
    use super::*;
    use test_log::test;

    #[test]
    fn excluded_apps_are_not_managed() {
        let mut config = test_config();
        config.rules.exclude = vec!["Screensaver".to_string()];
        let mut h = Harness::with_config(config);
        h.open(1, 10, "Screensaver");
        assert!(h.reactor.store.find_workspace_of(w(1)).is_none());
    }

    #[test]
    fn float_rule_puts_window_in_floating_set() {
        let mut config = test_config();
        config.rules.float = vec!["Calculator".to_string()];
        let mut h = Harness::with_config(config);
        h.open(1, 10, "Calculator");
        assert!(h.ws().floating.contains(&w(1)));
        assert!(h.ws().tiled.is_empty());
    }

    #[test]
    fn dialogs_auto_float_by_subrole_and_size() {
        let mut config = test_config();
        config.layout.auto_float_dialogs = true;
        let mut h = Harness::with_config(config);

        // Strictly smaller than 500x400 floats even as a Standard window.
        h.open_sized(1, 10, "App", Rect::new(0.0, 0.0, 300.0, 200.0), Some("small"));
        assert!(h.ws().floating.contains(&w(1)));

        h.bridge.add_window(WindowInfo {
            id: w(2),
            pid: 20,
            app_name: "Other".to_string(),
            bundle_id: None,
            title: Some("Save?".to_string()),
            frame: Rect::new(0.0, 0.0, 800.0, 800.0),
            subrole: WindowSubrole::Dialog,
        });
        h.reactor.handle_event(Event::Window(WindowEvent::Created {
            window_id: w(2),
            pid: 20,
            app_name: "Other".to_string(),
            bundle_id: None,
        }));
        assert!(h.ws().floating.contains(&w(2)));
    }

    #[test]
    fn secondary_small_window_of_tiled_app_floats() {
        let mut h = Harness::new();
        h.open(1, 10, "Editor");
        // Same app, under 70% of the region in width: floats.
        h.open_sized(2, 10, "Editor", Rect::new(0.0, 0.0, 600.0, 800.0), Some("palette"));
        assert!(h.ws().floating.contains(&w(2)));
        // Same app, big and titled: tiles.
        h.open_sized(3, 10, "Editor", Rect::new(0.0, 0.0, 800.0, 800.0), Some("doc"));
        assert!(h.ws().tiled.contains(&w(3)));
    }

    #[test]
    fn app_rule_pins_window_to_workspace_without_switching() {
        let mut config = test_config();
        config.app_rules.push(crate::common::config::AppRule {
            app: "Music".to_string(),
            placement: AppPlacement::Workspace(5),
        });
        let mut h = Harness::with_config(config);
        h.open(1, 10, "Music");

        assert_eq!(h.reactor.store.active_workspace(monitor()), 1);
        assert_eq!(h.reactor.store.find_workspace_of(w(1)), Some((monitor(), 5)));
        // Parked off-screen until its workspace activates.
        assert_eq!(h.frame(1).origin, h.hidden_origin());
    }

    #[test]
    fn toggle_float_twice_returns_to_original_subset() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        assert!(h.ws().tiled.contains(&w(1)));
        h.act(Action::ToggleFloat);
        assert!(h.ws().floating.contains(&w(1)));
        assert!(!h.ws().tiled.contains(&w(1)));
        h.act(Action::ToggleFloat);
        assert!(h.ws().tiled.contains(&w(1)));
        assert!(!h.ws().floating.contains(&w(1)));
    }

    #[test]
    fn toggle_fullscreen_round_trips() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.focus(1);
        h.act(Action::ToggleFullscreen);
        assert!(h.ws().fullscreen.contains(&w(1)));
        assert!(!h.ws().tiled.contains(&w(1)));
        assert_eq!(h.frame(1), screen());

        h.act(Action::ToggleFullscreen);
        assert!(h.ws().tiled.contains(&w(1)));
        assert!(h.ws().fullscreen.is_empty());
    }
}

mod workspaces {
    use super::*;
    use test_log::test;

    #[test]
    fn move_and_return_round_trip() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.focus(1);

        h.act(Action::MoveToWorkspace(3));
        assert_eq!(h.ws().tiled, vec![w(2)]);
        assert_eq!(h.ws().focused, Some(w(2)));
        assert_eq!(h.frame(2), screen());
        let ws3 = h.reactor.store.workspace(monitor(), 3).unwrap();
        assert_eq!(ws3.tiled, vec![w(1)]);
        assert_eq!(h.frame(1).origin, h.hidden_origin());

        h.act(Action::SwitchWorkspace(3));
        assert_eq!(h.reactor.store.active_workspace(monitor()), 3);
        assert_eq!(h.frame(1), screen());
        assert_eq!(h.frame(2).origin, h.hidden_origin());
        assert_eq!(h.ws().focused, Some(w(1)));
    }

    #[test]
    fn switch_to_same_workspace_is_a_no_op() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        let frame_before = h.frame(1);
        h.bridge.drain_calls();
        h.act(Action::SwitchWorkspace(1));
        assert!(h.bridge.calls().is_empty());
        assert_eq!(h.frame(1), frame_before);
    }

    #[test]
    fn out_of_range_workspace_numbers_are_ignored() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.act(Action::SwitchWorkspace(12));
        h.act(Action::MoveToWorkspace(0));
        assert_eq!(h.reactor.store.active_workspace(monitor()), 1);
        assert_eq!(h.ws().tiled, vec![w(1)]);
    }

    #[test]
    fn switch_and_back_restores_equivalent_state() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.focus(1);
        let tiled_before = h.ws().tiled.clone();

        h.act(Action::SwitchWorkspace(2));
        assert_eq!(h.frame(1).origin, h.hidden_origin());
        h.act(Action::SwitchWorkspace(1));

        assert_eq!(h.ws().tiled, tiled_before);
        assert_eq!(h.ws().focused, Some(w(1)));
        assert_eq!(h.frame(1), Rect::new(4.0, 4.0, 492.0, 992.0));
        assert_eq!(h.frame(2), Rect::new(504.0, 4.0, 492.0, 992.0));
    }

    #[test]
    fn empty_workspace_focuses_the_desktop() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.bridge.drain_calls();
        h.act(Action::SwitchWorkspace(4));
        assert!(h.bridge.calls().contains(&BridgeCall::FocusDesktop));
    }

    #[test]
    fn sticky_windows_follow_workspace_switches() {
        let mut config = test_config();
        config.rules.sticky = vec!["Pinned".to_string()];
        let mut h = Harness::with_config(config);
        h.open(1, 10, "Pinned");
        h.open(2, 20, "Editor");

        h.act(Action::SwitchWorkspace(2));
        assert!(h.ws().tracked.contains_key(&w(1)));
        assert!(h.ws().tiled.contains(&w(1)));
        // The non-sticky window stayed behind, hidden.
        assert!(!h.ws().tracked.contains_key(&w(2)));
        assert_eq!(h.frame(2).origin, h.hidden_origin());
    }

    #[test]
    fn sticky_windows_cannot_be_moved_to_another_workspace() {
        let mut config = test_config();
        config.rules.sticky = vec!["Pinned".to_string()];
        let mut h = Harness::with_config(config);
        h.open(1, 10, "Pinned");
        h.act(Action::MoveToWorkspace(3));
        assert_eq!(h.reactor.store.find_workspace_of(w(1)), Some((monitor(), 1)));
    }

    #[test]
    fn focus_follows_app_switches_to_its_workspace() {
        let mut config = test_config();
        config.layout.focus_follows_app = true;
        let mut h = Harness::with_config(config);
        h.open(1, 10, "Mail");
        h.act(Action::MoveToWorkspace(2));
        h.open(2, 20, "Editor");
        assert_eq!(h.reactor.store.active_workspace(monitor()), 1);

        h.reactor.handle_event(Event::Window(WindowEvent::AppActivated(10)));
        assert_eq!(h.reactor.store.active_workspace(monitor()), 2);
        assert_eq!(h.ws().focused, Some(w(1)));
    }

    #[test]
    fn focus_follows_app_respects_the_empty_workspace_guard() {
        let mut config = test_config();
        config.layout.focus_follows_app = true;
        let mut h = Harness::with_config(config);
        h.open(1, 10, "Mail");
        h.act(Action::MoveToWorkspace(2));
        // Active workspace is now empty: activation must not bounce.
        h.reactor.handle_event(Event::Window(WindowEvent::AppActivated(10)));
        assert_eq!(h.reactor.store.active_workspace(monitor()), 1);
    }
}

mod swallow {
    use super::*;
    use test_log::test;

    fn swallow_config() -> Config {
        let mut config = test_config();
        config.rules.swallow = vec!["Terminal".to_string()];
        config
    }

    #[test]
    fn grandchild_window_swallows_the_terminal() {
        let mut h = Harness::with_config(swallow_config());
        h.open(1, 100, "Terminal");
        assert_eq!(h.ws().tiled, vec![w(1)]);

        h.process.set_parent(300, 200);
        h.process.set_parent(200, 100);
        h.open(2, 300, "Viewer");

        let ws = h.ws();
        assert_eq!(ws.tiled, vec![w(2)]);
        assert_eq!(ws.tracked[&w(1)].swallowed_by, Some(w(2)));
        assert_eq!(ws.tracked[&w(2)].swallowed_from, Some(w(1)));
        assert_eq!(h.bridge.alpha_of(w(1)), Some(0.0));
        assert_eq!(h.frame(1).origin, h.hidden_origin());
        assert_eq!(h.ws().focused, Some(w(2)));
    }

    #[test]
    fn destroying_the_guest_restores_the_terminal() {
        let mut h = Harness::with_config(swallow_config());
        h.open(1, 100, "Terminal");
        h.process.set_parent(300, 100);
        h.open(2, 300, "Viewer");

        h.destroy(2);
        let ws = h.ws();
        assert_eq!(ws.tiled, vec![w(1)]);
        assert_eq!(ws.tracked[&w(1)].swallowed_by, None);
        assert_eq!(h.bridge.alpha_of(w(1)), Some(1.0));
        assert_eq!(h.frame(1), screen());
        assert_eq!(ws.focused, Some(w(1)));
    }

    #[test]
    fn already_swallowed_terminals_are_not_reused() {
        let mut h = Harness::with_config(swallow_config());
        h.open(1, 100, "Terminal");
        h.process.set_parent(300, 100);
        h.process.set_parent(301, 100);
        h.open(2, 300, "Viewer");
        h.open(3, 301, "Player");

        // The second child tiles normally next to the first guest.
        let ws = h.ws();
        assert_eq!(ws.tracked[&w(3)].swallowed_from, None);
        assert_eq!(ws.tiled.len(), 2);
    }
}

mod scrolling_mode {
    use super::*;
    use test_log::test;

    fn niri_config() -> Config {
        let mut config = test_config();
        config.layout.tiling_mode = TilingMode::Niri;
        config
    }

    fn columns_of(ws: &VirtualWorkspace) -> Vec<Vec<WindowId>> {
        ws.columns.iter().map(|c| c.windows.clone()).collect()
    }

    #[test]
    fn consume_then_expel_lands_right_of_source() {
        let mut h = Harness::with_config(niri_config());
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.open(3, 30, "C");
        // Walk back to the first column.
        h.act(Action::FocusLeft);
        h.act(Action::FocusLeft);
        assert_eq!(h.ws().active_column, 0);

        h.act(Action::NiriConsume);
        assert_eq!(columns_of(h.ws()), vec![vec![w(1), w(2)], vec![w(3)]]);
        assert_eq!(h.ws().active_column, 0);
        assert_eq!(h.ws().focused, Some(w(2)));

        h.act(Action::NiriExpel);
        assert_eq!(columns_of(h.ws()), vec![vec![w(1)], vec![w(2)], vec![w(3)]]);
        assert_eq!(h.ws().active_column, 1);
        assert_eq!(h.ws().focused, Some(w(2)));
    }

    #[test]
    fn flattened_columns_always_match_tiled() {
        let mut h = Harness::with_config(niri_config());
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.open(3, 30, "C");
        h.act(Action::FocusLeft);
        h.act(Action::NiriConsume);
        h.act(Action::NiriExpel);
        assert_eq!(h.ws().flatten_columns(), h.ws().tiled);
    }

    #[test]
    fn off_strip_columns_are_alpha_hidden() {
        let mut h = Harness::with_config(niri_config());
        for i in 1..=5 {
            h.open(i, 10 * i as pid_t, "App");
        }
        // Active is the last column; the first is far off strip.
        assert_eq!(h.ws().active_column, 4);
        assert_eq!(h.bridge.alpha_of(w(1)), Some(0.0));
        assert_eq!(h.bridge.alpha_of(w(5)), Some(1.0));

        // Scrolling back restores it.
        for _ in 0..4 {
            h.act(Action::FocusLeft);
        }
        assert_eq!(h.ws().active_column, 0);
        assert_eq!(h.bridge.alpha_of(w(1)), Some(1.0));
    }

    #[test]
    fn vertical_focus_moves_within_the_column() {
        let mut h = Harness::with_config(niri_config());
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.act(Action::FocusLeft);
        h.act(Action::NiriConsume);
        assert_eq!(columns_of(h.ws()), vec![vec![w(1), w(2)]]);
        assert_eq!(h.ws().focused, Some(w(2)));

        h.act(Action::FocusUp);
        assert_eq!(h.ws().focused, Some(w(1)));
        // Clamped at the top.
        h.act(Action::FocusUp);
        assert_eq!(h.ws().focused, Some(w(1)));
        h.act(Action::FocusDown);
        assert_eq!(h.ws().focused, Some(w(2)));
    }

    #[test]
    fn app_rule_left_lands_the_new_column_first() {
        let mut config = niri_config();
        config.app_rules.push(crate::common::config::AppRule {
            app: "Music".to_string(),
            placement: AppPlacement::Left,
        });
        let mut h = Harness::with_config(config);
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.open(3, 30, "Music");

        assert_eq!(columns_of(h.ws()), vec![vec![w(3)], vec![w(1)], vec![w(2)]]);
        assert_eq!(h.ws().active_column, 0);
        assert_eq!(h.ws().tiled, vec![w(3), w(1), w(2)]);
        assert_eq!(h.ws().focused, Some(w(3)));
    }

    #[test]
    fn app_rule_right_lands_the_new_column_last() {
        let mut config = niri_config();
        config.app_rules.push(crate::common::config::AppRule {
            app: "Music".to_string(),
            placement: AppPlacement::Right,
        });
        let mut h = Harness::with_config(config);
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        // Scroll back so the default insert slot differs from the rule's.
        h.act(Action::FocusLeft);
        h.open(3, 30, "Music");

        assert_eq!(columns_of(h.ws()), vec![vec![w(1)], vec![w(2)], vec![w(3)]]);
        assert_eq!(h.ws().active_column, 2);
        assert_eq!(h.ws().tiled, vec![w(1), w(2), w(3)]);
    }

    #[test]
    fn column_width_stays_clamped() {
        let mut h = Harness::with_config(niri_config());
        h.open(1, 10, "A");
        for _ in 0..40 {
            h.act(Action::GrowFocused);
        }
        let ws = h.ws();
        assert_eq!(ws.columns[ws.active_column].width_override, Some(3.0));
        for _ in 0..40 {
            h.act(Action::ShrinkFocused);
        }
        let ws = h.ws();
        assert_eq!(ws.columns[ws.active_column].width_override, Some(0.1));
    }
}

mod marks_and_minimize {
    use super::*;
    use test_log::test;

    #[test]
    fn set_and_jump_mark_returns_focus() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.act(Action::SetMark("a".to_string()));
        h.act(Action::SwitchWorkspace(2));
        h.act(Action::JumpMark("a".to_string()));
        assert_eq!(h.reactor.store.active_workspace(monitor()), 1);
        assert_eq!(h.ws().focused, Some(w(1)));
    }

    #[test]
    fn stale_marks_are_pruned() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.act(Action::SetMark("a".to_string()));
        h.destroy(1);
        h.act(Action::SwitchWorkspace(2));
        // Jumping a dead mark must not move workspaces.
        h.act(Action::JumpMark("a".to_string()));
        assert_eq!(h.reactor.store.active_workspace(monitor()), 2);
    }

    #[test]
    fn minimize_toggle_round_trips() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.act(Action::Minimize);
        assert!(h.ws().minimized.contains(&w(1)));
        assert!(h.ws().tiled.is_empty());
        assert_eq!(h.frame(1).origin, h.hidden_origin());

        h.act(Action::Minimize);
        assert!(h.ws().minimized.is_empty());
        assert_eq!(h.ws().tiled, vec![w(1)]);
        assert_eq!(h.ws().focused, Some(w(1)));
    }

    #[test]
    fn minimizing_passes_focus_to_the_next_tile() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.focus(2);
        h.act(Action::Minimize);
        assert!(h.ws().minimized.contains(&w(2)));
        assert_eq!(h.ws().focused, Some(w(1)));
        assert_eq!(h.frame(1), screen());
    }
}

mod drag {
    use super::*;
    use test_log::test;

    #[test]
    fn dragging_the_divider_updates_the_split_ratio() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        // Divider sits at x = 500 for the default ratio.
        h.reactor.handle_event(Event::DragStarted(Point::new(505.0, 500.0)));
        h.reactor.handle_event(Event::DragMoved(Point::new(300.0, 500.0)));
        h.reactor.handle_event(Event::DragEnded(Point::new(300.0, 500.0)));
        assert_eq!(h.ws().split_ratio, 0.3);
        assert_eq!(h.frame(1), Rect::new(4.0, 4.0, 292.0, 992.0));
    }

    #[test]
    fn divider_drag_cannot_escape_the_ratio_bounds() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.reactor.handle_event(Event::DragStarted(Point::new(495.0, 500.0)));
        h.reactor.handle_event(Event::DragMoved(Point::new(-400.0, 500.0)));
        h.reactor.handle_event(Event::DragEnded(Point::new(-400.0, 500.0)));
        assert_eq!(h.ws().split_ratio, 0.2);
    }

    #[test]
    fn control_drag_between_tiles_swaps_them() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.reactor.handle_event(Event::DragStarted(Point::new(100.0, 500.0)));
        h.reactor.handle_event(Event::DragEnded(Point::new(800.0, 500.0)));
        assert_eq!(h.ws().tiled, vec![w(2), w(1)]);
    }
}

mod startup {
    use super::*;
    use test_log::test;

    #[test]
    fn orphaned_windows_are_restored_to_a_centered_quarter() {
        let h = Harness::new();
        h.add_to_bridge(1, 10, "A", Rect::new(999.0, 999.0, 400.0, 300.0), Some("one"));
        h.add_to_bridge(2, 20, "B", Rect::new(999.0, 999.0, 600.0, 500.0), Some("two"));
        let mut h = h;
        h.reactor.startup();

        // Both were pulled back to the centered quarter frame before the
        // scan adopted them as normal candidates.
        let restored = Rect::new(250.0, 250.0, 500.0, 500.0);
        let calls = h.bridge.calls();
        assert!(calls.contains(&BridgeCall::SetFrame(w(1), restored)));
        assert!(calls.contains(&BridgeCall::SetFrame(w(2), restored)));
        assert_eq!(h.ws().tiled.len(), 2);
    }

    #[test]
    fn startup_adopts_existing_windows() {
        let h = Harness::new();
        h.add_to_bridge(1, 10, "Editor", Rect::new(0.0, 0.0, 800.0, 800.0), Some("doc"));
        let mut h = h;
        h.reactor.startup();
        assert_eq!(h.ws().tiled, vec![w(1)]);
        assert_eq!(h.frame(1), screen());
    }

    #[test]
    fn app_termination_cascades_to_every_window() {
        let mut h = Harness::new();
        h.open(1, 10, "A");
        h.open(2, 10, "A");
        h.open(3, 20, "B");
        h.reactor.handle_event(Event::Window(WindowEvent::AppTerminated(10)));
        assert!(h.reactor.store.find_workspace_of(w(1)).is_none());
        assert!(h.reactor.store.find_workspace_of(w(2)).is_none());
        assert_eq!(h.ws().tiled, vec![w(3)]);
    }
}

mod native_tiling {
    use super::*;
    use test_log::test;
    use crate::sys::bridge::NativeTile;

    #[test]
    fn gapless_halves_go_through_native_commands() {
        let mut config = test_config();
        config.layout.native_animation = true;
        config.layout.inner_gap = 0.0;
        let mut h = Harness::with_config(config);
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.bridge.drain_calls();

        h.act(Action::Retile);
        let calls = h.bridge.calls();
        assert!(calls.contains(&BridgeCall::SetNativeTile(w(1), NativeTile::LeftHalf)));
        assert!(calls.contains(&BridgeCall::SetNativeTile(w(2), NativeTile::RightHalf)));
    }

    #[test]
    fn gapped_layouts_fall_back_to_computed_frames() {
        let mut config = test_config();
        config.layout.native_animation = true;
        let mut h = Harness::with_config(config);
        h.open(1, 10, "A");
        h.open(2, 20, "B");
        h.bridge.drain_calls();

        h.act(Action::Retile);
        assert!(!h
            .bridge
            .calls()
            .iter()
            .any(|c| matches!(c, BridgeCall::SetNativeTile(..))));
    }
}

mod bindings {
    use super::*;
    use test_log::test;

    #[test]
    fn action_parse_covers_arguments() {
        assert_eq!(Action::parse("focus_left"), Some(Action::FocusLeft));
        assert_eq!(Action::parse("switch_workspace 4"), Some(Action::SwitchWorkspace(4)));
        assert_eq!(Action::parse("switch_workspace 12"), None);
        assert_eq!(Action::parse("focus_monitor left"), Some(Action::FocusMonitorLeft));
        assert_eq!(
            Action::parse("set_mark a"),
            Some(Action::SetMark("a".to_string()))
        );
        assert_eq!(Action::parse("niri_consume"), Some(Action::NiriConsume));
        assert_eq!(Action::parse("frobnicate"), None);
    }
}
