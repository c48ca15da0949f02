//! Brightness dimming of unfocused tiled windows.
//!
//! Offsets are additive in compositor space; a negative value darkens.
//! Every window we dim must be reset to 0 on teardown and whenever the
//! config reloads with dimming disabled.

use std::sync::Arc;

use tracing::debug;

use crate::common::collections::HashSet;
use crate::sys::bridge::{CompositorBridge, WindowId};

pub struct Dimmer {
    bridge: Arc<dyn CompositorBridge>,
    /// 0.0 disables dimming entirely.
    strength: f64,
    dimmed: HashSet<WindowId>,
}

impl Dimmer {
    pub fn new(bridge: Arc<dyn CompositorBridge>, strength: f64) -> Self {
        Dimmer {
            bridge,
            strength: strength.clamp(0.0, 1.0),
            dimmed: HashSet::default(),
        }
    }

    pub fn set_strength(&mut self, strength: f64) {
        let strength = strength.clamp(0.0, 1.0);
        if strength == 0.0 {
            self.clear();
        }
        self.strength = strength;
    }

    /// Dim every tiled window except the focused one; restore any window
    /// that left the dim set.
    pub fn apply(&mut self, tiled: &[WindowId], focused: Option<WindowId>) {
        if self.strength == 0.0 {
            return;
        }
        let target: HashSet<WindowId> =
            tiled.iter().copied().filter(|&w| Some(w) != focused).collect();

        for &wid in self.dimmed.difference(&target) {
            if let Err(e) = self.bridge.set_brightness(wid, 0.0) {
                debug!(?wid, %e, "brightness reset failed");
            }
        }
        for &wid in &target {
            if let Err(e) = self.bridge.set_brightness(wid, -self.strength) {
                debug!(?wid, %e, "brightness set failed");
            }
        }
        self.dimmed = target;
    }

    /// Reset every dimmed window to neutral.
    pub fn clear(&mut self) {
        for wid in self.dimmed.drain() {
            if let Err(e) = self.bridge.set_brightness(wid, 0.0) {
                debug!(?wid, %e, "brightness reset failed");
            }
        }
    }
}

impl Drop for Dimmer {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::bridge::{BridgeCall, RecordingBridge, WindowInfo, WindowSubrole};
    use crate::sys::geometry::Rect;

    fn bridge_with(ids: &[u32]) -> RecordingBridge {
        let bridge = RecordingBridge::new();
        for &id in ids {
            bridge.add_window(WindowInfo {
                id: WindowId::new(id),
                pid: 1,
                app_name: "Test".into(),
                bundle_id: None,
                title: None,
                frame: Rect::new(0.0, 0.0, 400.0, 300.0),
                subrole: WindowSubrole::Standard,
            });
        }
        bridge
    }

    #[test]
    fn dims_everything_but_focus() {
        let bridge = bridge_with(&[1, 2, 3]);
        let mut dimmer = Dimmer::new(Arc::new(bridge.clone()), 0.3);
        dimmer.apply(
            &[WindowId::new(1), WindowId::new(2), WindowId::new(3)],
            Some(WindowId::new(2)),
        );
        let calls = bridge.calls();
        assert!(calls.contains(&BridgeCall::SetBrightness(WindowId::new(1), -0.3)));
        assert!(calls.contains(&BridgeCall::SetBrightness(WindowId::new(3), -0.3)));
        assert!(!calls.iter().any(
            |c| matches!(c, BridgeCall::SetBrightness(w, s) if *w == WindowId::new(2) && *s != 0.0)
        ));
    }

    #[test]
    fn focus_change_restores_previously_dimmed() {
        let bridge = bridge_with(&[1, 2]);
        let mut dimmer = Dimmer::new(Arc::new(bridge.clone()), 0.5);
        let tiled = [WindowId::new(1), WindowId::new(2)];
        dimmer.apply(&tiled, Some(WindowId::new(1)));
        bridge.drain_calls();

        dimmer.apply(&tiled, Some(WindowId::new(2)));
        let calls = bridge.calls();
        assert!(calls.contains(&BridgeCall::SetBrightness(WindowId::new(2), 0.0)));
        assert!(calls.contains(&BridgeCall::SetBrightness(WindowId::new(1), -0.5)));
    }

    #[test]
    fn zero_strength_is_inert_and_clears() {
        let bridge = bridge_with(&[1]);
        let mut dimmer = Dimmer::new(Arc::new(bridge.clone()), 0.4);
        dimmer.apply(&[WindowId::new(1)], None);
        bridge.drain_calls();

        dimmer.set_strength(0.0);
        assert_eq!(
            bridge.calls(),
            vec![BridgeCall::SetBrightness(WindowId::new(1), 0.0)]
        );
        bridge.drain_calls();
        dimmer.apply(&[WindowId::new(1)], None);
        assert!(bridge.calls().is_empty());
    }
}
