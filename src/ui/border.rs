//! Focus border overlay state.
//!
//! The actual overlay window is drawn by platform code; the core keeps
//! at most one overlay descriptor in sync with the focused window's
//! frame and hands it to the renderer.

use crate::common::config::BorderSettings;
use crate::sys::bridge::WindowId;
use crate::sys::geometry::Rect;

#[derive(Debug, Clone, PartialEq)]
pub struct BorderOverlay {
    pub window: WindowId,
    /// The focused frame outset by the border width.
    pub frame: Rect,
    pub width: f64,
    pub radius: f64,
    pub color: u32,
}

#[derive(Debug, Default)]
pub struct BorderRenderer {
    settings: BorderSettings,
    current: Option<BorderOverlay>,
}

impl BorderRenderer {
    pub fn new(settings: BorderSettings) -> Self {
        BorderRenderer {
            settings,
            current: None,
        }
    }

    pub fn update_settings(&mut self, settings: BorderSettings) {
        self.settings = settings;
        if !self.settings.enabled {
            self.current = None;
        }
    }

    /// Track the focused window. Passing `None` clears the overlay.
    pub fn update(&mut self, focused: Option<(WindowId, Rect)>) {
        if !self.settings.enabled {
            self.current = None;
            return;
        }
        self.current = focused.map(|(window, frame)| {
            let outset = self.settings.width;
            BorderOverlay {
                window,
                frame: Rect::new(
                    frame.origin.x - outset,
                    frame.origin.y - outset,
                    frame.size.width + 2.0 * outset,
                    frame.size.height + 2.0 * outset,
                ),
                width: self.settings.width,
                radius: self.settings.radius,
                color: self.settings.active_color,
            }
        });
    }

    pub fn clear(&mut self) { self.current = None; }

    pub fn current_overlay(&self) -> Option<&BorderOverlay> { self.current.as_ref() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_settings() -> BorderSettings {
        BorderSettings {
            enabled: true,
            width: 4.0,
            ..Default::default()
        }
    }

    #[test]
    fn disabled_renderer_is_a_no_op() {
        let mut border = BorderRenderer::new(BorderSettings::default());
        border.update(Some((WindowId::new(1), Rect::new(0.0, 0.0, 100.0, 100.0))));
        assert!(border.current_overlay().is_none());
    }

    #[test]
    fn overlay_outsets_focused_frame() {
        let mut border = BorderRenderer::new(enabled_settings());
        border.update(Some((WindowId::new(1), Rect::new(100.0, 100.0, 200.0, 200.0))));
        let overlay = border.current_overlay().unwrap();
        assert_eq!(overlay.frame, Rect::new(96.0, 96.0, 208.0, 208.0));
    }

    #[test]
    fn disabling_settings_drops_the_overlay() {
        let mut border = BorderRenderer::new(enabled_settings());
        border.update(Some((WindowId::new(1), Rect::new(0.0, 0.0, 10.0, 10.0))));
        assert!(border.current_overlay().is_some());
        border.update_settings(BorderSettings::default());
        assert!(border.current_overlay().is_none());
    }
}
