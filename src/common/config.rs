//! Configuration model and the INI-style config file parser.
//!
//! The file format is line-oriented: `[section]` headers followed by
//! `key = value` pairs. A malformed line is logged and skipped; the
//! rest of the file still applies, and defaults fill anything missing.

use std::path::{Path, PathBuf};

use anyhow::Context;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::actor::reactor::Action;
use crate::common::collections::{BTreeMap, HashMap};
use crate::sys::hotkey::{parse_hotkey, Hotkey, Modifiers};

pub type WorkspaceNumber = u8;

pub const MIN_WORKSPACE: WorkspaceNumber = 1;
pub const MAX_WORKSPACE: WorkspaceNumber = 9;

pub fn data_dir() -> PathBuf { dirs::home_dir().unwrap_or_default().join(".tatami") }

pub fn restore_file() -> PathBuf { data_dir().join("workspaces.json") }

pub fn config_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".config")
        .join("tatami")
        .join("tatami.conf")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TilingMode {
    /// Master-stack layouts.
    #[default]
    Hyprland,
    /// Scrolling columns.
    Niri,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSettings {
    pub inner_gap: f64,
    pub outer_gap: f64,
    pub single_window_padding: f64,
    pub animations: bool,
    pub native_animation: bool,
    pub focus_follows_mouse: bool,
    pub focus_follows_app: bool,
    pub auto_float_dialogs: bool,
    pub force_promotion: bool,
    pub dim_unfocused: f64,
    pub tiling_mode: TilingMode,
    pub niri_column_width: f64,
    pub hyperkey: Option<String>,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            inner_gap: 8.0,
            outer_gap: 8.0,
            single_window_padding: 0.0,
            animations: true,
            native_animation: false,
            focus_follows_mouse: false,
            focus_follows_app: false,
            auto_float_dialogs: true,
            force_promotion: false,
            dim_unfocused: 0.0,
            tiling_mode: TilingMode::Hyprland,
            niri_column_width: 0.5,
            hyperkey: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BorderSettings {
    pub enabled: bool,
    pub width: f64,
    pub radius: f64,
    pub active_color: u32,
    pub inactive_color: u32,
}

impl Default for BorderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 4.0,
            radius: 10.0,
            active_color: 0x7aa2f7,
            inactive_color: 0x3b4261,
        }
    }
}

/// App lists from `[rules]`. Matching is case-insensitive on app name
/// or bundle id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowRules {
    pub float: Vec<String>,
    pub exclude: Vec<String>,
    pub sticky: Vec<String>,
    pub swallow: Vec<String>,
    pub swallow_all: bool,
}

impl WindowRules {
    pub fn matches(list: &[String], app_name: &str, bundle_id: Option<&str>) -> bool {
        list.iter().any(|entry| {
            entry.eq_ignore_ascii_case(app_name)
                || bundle_id.is_some_and(|b| entry.eq_ignore_ascii_case(b))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPlacement {
    /// Always insert at the head of the tile order.
    Left,
    /// Always insert at the tail.
    Right,
    /// Pin new windows of the app to a workspace.
    Workspace(WorkspaceNumber),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppRule {
    pub app: String,
    pub placement: AppPlacement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub layout: LayoutSettings,
    pub border: BorderSettings,
    pub rules: WindowRules,
    pub app_rules: Vec<AppRule>,
    pub workspace_names: BTreeMap<WorkspaceNumber, String>,
    pub bindings: HashMap<Hotkey, Action>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: LayoutSettings::default(),
            border: BorderSettings::default(),
            rules: WindowRules::default(),
            app_rules: Vec::new(),
            workspace_names: BTreeMap::new(),
            bindings: default_bindings(),
        }
    }
}

/// The base modifier for stock bindings.
fn base_mods() -> Modifiers {
    Modifiers {
        cmd: true,
        ctrl: true,
        ..Default::default()
    }
}

static DEFAULT_BINDINGS: Lazy<HashMap<Hotkey, Action>> = Lazy::new(build_default_bindings);

fn default_bindings() -> HashMap<Hotkey, Action> { DEFAULT_BINDINGS.clone() }

fn build_default_bindings() -> HashMap<Hotkey, Action> {
    let m = base_mods();
    let ms = base_mods().with_shift();
    let mut bindings: HashMap<Hotkey, Action> = [
        (Hotkey::new(m, "h"), Action::FocusLeft),
        (Hotkey::new(m, "l"), Action::FocusRight),
        (Hotkey::new(m, "k"), Action::FocusUp),
        (Hotkey::new(m, "j"), Action::FocusDown),
        (Hotkey::new(m, "n"), Action::FocusNext),
        (Hotkey::new(m, "p"), Action::FocusPrev),
        (Hotkey::new(m, "return"), Action::SwapMaster),
        (Hotkey::new(m, "o"), Action::RotateNext),
        (Hotkey::new(m, "i"), Action::RotatePrev),
        (Hotkey::new(m, "space"), Action::CycleLayout),
        (Hotkey::new(m, "t"), Action::ToggleFloat),
        (Hotkey::new(m, "f"), Action::ToggleFullscreen),
        (Hotkey::new(m, "q"), Action::Close),
        (Hotkey::new(m, "r"), Action::Retile),
        (Hotkey::new(ms, "r"), Action::ReloadConfig),
        (Hotkey::new(m, "m"), Action::Minimize),
        (Hotkey::new(m, "equal"), Action::IncreaseGap),
        (Hotkey::new(m, "minus"), Action::DecreaseGap),
        (Hotkey::new(ms, "l"), Action::GrowFocused),
        (Hotkey::new(ms, "h"), Action::ShrinkFocused),
        (Hotkey::new(m, "comma"), Action::NiriConsume),
        (Hotkey::new(m, "period"), Action::NiriExpel),
        (Hotkey::new(m, "left"), Action::FocusMonitorLeft),
        (Hotkey::new(m, "right"), Action::FocusMonitorRight),
        (Hotkey::new(ms, "left"), Action::MoveToMonitorLeft),
        (Hotkey::new(ms, "right"), Action::MoveToMonitorRight),
    ]
    .into_iter()
    .collect();
    merge_workspace_bindings(&mut bindings);
    bindings
}

/// Workspace switch/move bindings are always present, even when the
/// config file defines its own `[bindings]` section.
fn merge_workspace_bindings(bindings: &mut HashMap<Hotkey, Action>) {
    for n in MIN_WORKSPACE..=MAX_WORKSPACE {
        bindings.insert(
            Hotkey::new(base_mods(), n.to_string()),
            Action::SwitchWorkspace(n),
        );
        bindings.insert(
            Hotkey::new(base_mods().with_shift(), n.to_string()),
            Action::MoveToWorkspace(n),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Layout,
    Border,
    Rules,
    AppRules,
    Menubar,
    Workspaces,
    Bindings,
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Ok(Config::parse(&text))
    }

    /// Parse config text. Never fails; bad lines are logged and skipped.
    pub fn parse(text: &str) -> Config {
        let mut config = Config::default();
        let mut section = Section::None;
        let mut saw_bindings_section = false;
        let mut user_bindings: HashMap<Hotkey, Action> = HashMap::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match name.trim().to_lowercase().as_str() {
                    "layout" => Section::Layout,
                    "border" => Section::Border,
                    "rules" => Section::Rules,
                    "app_rules" => Section::AppRules,
                    "menubar" => Section::Menubar,
                    "workspaces" => Section::Workspaces,
                    "bindings" => {
                        saw_bindings_section = true;
                        Section::Bindings
                    }
                    other => {
                        warn!(line = lineno + 1, "unknown config section [{other}], ignoring");
                        Section::None
                    }
                };
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line = lineno + 1, "config line has no '=', skipping: {line}");
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let ok = match section {
                Section::Layout => config.apply_layout_key(key, value),
                Section::Border => config.apply_border_key(key, value),
                Section::Rules => config.apply_rules_key(key, value),
                Section::AppRules => config.apply_app_rule(key, value),
                Section::Workspaces => config.apply_workspace_name(key, value),
                Section::Bindings => match parse_binding(key, value) {
                    Some((hotkey, action)) => {
                        user_bindings.insert(hotkey, action);
                        true
                    }
                    None => false,
                },
                // Menubar options belong to the menu bar UI; accepted and
                // ignored here so shared config files parse cleanly.
                Section::Menubar => true,
                Section::None => false,
            };

            if !ok {
                warn!(line = lineno + 1, "invalid config entry, skipping: {line}");
            }
        }

        if saw_bindings_section {
            // User entries win over defaults on the same hotkey.
            let mut bindings = default_bindings();
            bindings.extend(user_bindings);
            merge_workspace_bindings(&mut bindings);
            config.bindings = bindings;
        }

        config.clamp();
        config
    }

    fn apply_layout_key(&mut self, key: &str, value: &str) -> bool {
        let layout = &mut self.layout;
        match key {
            "inner_gap" => parse_f64(value).map(|v| layout.inner_gap = v).is_some(),
            "outer_gap" => parse_f64(value).map(|v| layout.outer_gap = v).is_some(),
            "single_window_padding" => {
                parse_f64(value).map(|v| layout.single_window_padding = v).is_some()
            }
            "animations" => parse_bool(value).map(|v| layout.animations = v).is_some(),
            "native_animation" => {
                parse_bool(value).map(|v| layout.native_animation = v).is_some()
            }
            "focus_follows_mouse" => {
                parse_bool(value).map(|v| layout.focus_follows_mouse = v).is_some()
            }
            "focus_follows_app" => {
                parse_bool(value).map(|v| layout.focus_follows_app = v).is_some()
            }
            "auto_float_dialogs" => {
                parse_bool(value).map(|v| layout.auto_float_dialogs = v).is_some()
            }
            "force_promotion" => {
                parse_bool(value).map(|v| layout.force_promotion = v).is_some()
            }
            "dim_unfocused" => parse_f64(value).map(|v| layout.dim_unfocused = v).is_some(),
            "tiling_mode" => match value.to_lowercase().as_str() {
                "hyprland" => {
                    layout.tiling_mode = TilingMode::Hyprland;
                    true
                }
                "niri" => {
                    layout.tiling_mode = TilingMode::Niri;
                    true
                }
                _ => false,
            },
            "niri_column_width" => {
                parse_f64(value).map(|v| layout.niri_column_width = v).is_some()
            }
            "hyperkey" => {
                layout.hyperkey = Some(value.to_lowercase());
                true
            }
            _ => false,
        }
    }

    fn apply_border_key(&mut self, key: &str, value: &str) -> bool {
        let border = &mut self.border;
        match key {
            "enabled" => parse_bool(value).map(|v| border.enabled = v).is_some(),
            "width" => parse_f64(value).map(|v| border.width = v).is_some(),
            "radius" => parse_f64(value).map(|v| border.radius = v).is_some(),
            "active_color" => parse_color(value).map(|v| border.active_color = v).is_some(),
            "inactive_color" => {
                parse_color(value).map(|v| border.inactive_color = v).is_some()
            }
            _ => false,
        }
    }

    fn apply_rules_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "float" => {
                self.rules.float = parse_list(value);
                true
            }
            "exclude" => {
                self.rules.exclude = parse_list(value);
                true
            }
            "sticky" => {
                self.rules.sticky = parse_list(value);
                true
            }
            "swallow" => {
                self.rules.swallow = parse_list(value);
                true
            }
            "swallow_all" => parse_bool(value).map(|v| self.rules.swallow_all = v).is_some(),
            _ => false,
        }
    }

    fn apply_app_rule(&mut self, app: &str, value: &str) -> bool {
        let placement = match value.to_lowercase().as_str() {
            "left" => AppPlacement::Left,
            "right" => AppPlacement::Right,
            other => match other.strip_prefix("workspace") {
                Some(n) => match n.trim().parse::<WorkspaceNumber>() {
                    Ok(n) if (MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n) => {
                        AppPlacement::Workspace(n)
                    }
                    _ => return false,
                },
                None => return false,
            },
        };
        self.app_rules.push(AppRule {
            app: app.to_string(),
            placement,
        });
        true
    }

    fn apply_workspace_name(&mut self, key: &str, value: &str) -> bool {
        match key.parse::<WorkspaceNumber>() {
            Ok(n) if (MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n) => {
                self.workspace_names.insert(n, value.to_string());
                true
            }
            _ => false,
        }
    }

    fn clamp(&mut self) {
        self.layout.inner_gap = self.layout.inner_gap.max(0.0);
        self.layout.outer_gap = self.layout.outer_gap.max(0.0);
        self.layout.single_window_padding = self.layout.single_window_padding.max(0.0);
        self.layout.dim_unfocused = self.layout.dim_unfocused.clamp(0.0, 1.0);
        self.layout.niri_column_width = self.layout.niri_column_width.clamp(0.1, 3.0);
    }

    /// App rule lookup by app name or bundle id.
    pub fn app_rule_for(&self, app_name: &str, bundle_id: Option<&str>) -> Option<&AppRule> {
        self.app_rules.iter().find(|rule| {
            rule.app.eq_ignore_ascii_case(app_name)
                || bundle_id.is_some_and(|b| rule.app.eq_ignore_ascii_case(b))
        })
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !(0.0..=1.0).contains(&self.layout.dim_unfocused) {
            issues.push("dim_unfocused must be within [0, 1]".to_string());
        }
        if !(0.1..=3.0).contains(&self.layout.niri_column_width) {
            issues.push("niri_column_width must be within [0.1, 3.0]".to_string());
        }
        for rule in &self.app_rules {
            if rule.app.is_empty() {
                issues.push("app rule with empty app name".to_string());
            }
        }
        issues
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_f64(value: &str) -> Option<f64> { value.parse::<f64>().ok() }

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_color(value: &str) -> Option<u32> {
    let hex = value.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn parse_binding(hotkey_spec: &str, action_spec: &str) -> Option<(Hotkey, Action)> {
    let hotkey = match parse_hotkey(hotkey_spec) {
        Ok(hk) => hk,
        Err(e) => {
            warn!("{e}");
            return None;
        }
    };
    let action = Action::parse(action_spec)?;
    Some((hotkey, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_empty_config() {
        let config = Config::parse("");
        assert_eq!(config.layout.inner_gap, 8.0);
        assert_eq!(config.layout.tiling_mode, TilingMode::Hyprland);
        assert!(!config.border.enabled);
        assert!(config.bindings.values().any(|a| *a == Action::SwitchWorkspace(3)));
    }

    #[test]
    fn parses_layout_and_rules() {
        let config = Config::parse(
            "[layout]\n\
             inner_gap = 12\n\
             tiling_mode = niri\n\
             niri_column_width = 0.6\n\
             dim_unfocused = 0.3\n\
             [rules]\n\
             float = Calculator, System Settings\n\
             swallow = Terminal\n\
             swallow_all = false\n",
        );
        assert_eq!(config.layout.inner_gap, 12.0);
        assert_eq!(config.layout.tiling_mode, TilingMode::Niri);
        assert_eq!(config.layout.niri_column_width, 0.6);
        assert_eq!(config.rules.float, vec!["Calculator", "System Settings"]);
        assert_eq!(config.rules.swallow, vec!["Terminal"]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let config = Config::parse(
            "[layout]\n\
             inner_gap = twelve\n\
             outer_gap = 4\n\
             not a key value line\n",
        );
        // Bad value falls back to default; the good line still applies.
        assert_eq!(config.layout.inner_gap, 8.0);
        assert_eq!(config.layout.outer_gap, 4.0);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = Config::parse(
            "[layout]\ndim_unfocused = 7\nniri_column_width = 99\n",
        );
        assert_eq!(config.layout.dim_unfocused, 1.0);
        assert_eq!(config.layout.niri_column_width, 3.0);
    }

    #[test]
    fn app_rules_parse_positions_and_workspaces() {
        let config = Config::parse(
            "[app_rules]\n\
             Safari = left\n\
             Music = workspace 5\n\
             Mail = workspace 99\n",
        );
        assert_eq!(config.app_rules.len(), 2);
        assert_eq!(config.app_rules[0].placement, AppPlacement::Left);
        assert_eq!(config.app_rules[1].placement, AppPlacement::Workspace(5));
    }

    #[test]
    fn workspace_names_parse() {
        let config = Config::parse("[workspaces]\n1 = web\n4 = chat\n12 = nope\n");
        assert_eq!(config.workspace_names.get(&1).map(String::as_str), Some("web"));
        assert_eq!(config.workspace_names.get(&4).map(String::as_str), Some("chat"));
        assert!(!config.workspace_names.contains_key(&12));
    }

    #[test]
    fn custom_bindings_override_defaults_but_keep_workspace_keys() {
        let config = Config::parse("[bindings]\ncmd+ctrl, h = focus_down\n");
        let hk = Hotkey::new(base_mods(), "h");
        assert_eq!(config.bindings.get(&hk), Some(&Action::FocusDown));
        // Workspace bindings survive a custom bindings section.
        let ws = Hotkey::new(base_mods(), "7");
        assert_eq!(config.bindings.get(&ws), Some(&Action::SwitchWorkspace(7)));
        let mv = Hotkey::new(base_mods().with_shift(), "7");
        assert_eq!(config.bindings.get(&mv), Some(&Action::MoveToWorkspace(7)));
    }

    #[test]
    fn binding_actions_with_arguments() {
        let config = Config::parse(
            "[bindings]\n\
             cmd, g = set_mark a\n\
             cmd+shift, g = jump_mark a\n\
             cmd, 0 = switch_workspace 12\n",
        );
        assert_eq!(
            config.bindings.get(&Hotkey::new(
                Modifiers { cmd: true, ..Default::default() },
                "g"
            )),
            Some(&Action::SetMark("a".to_string()))
        );
        // Workspace numbers outside 1..=9 are rejected.
        assert!(!config
            .bindings
            .contains_key(&Hotkey::new(Modifiers { cmd: true, ..Default::default() }, "0")));
    }
}
