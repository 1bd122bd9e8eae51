// Overlay mode state machine
// Couples window touchability, window-level alpha and gesture listener
// attachment. Locked is the guide mode: the window is non-touchable and its
// alpha is capped so the compositor grants full click-through. Editing makes
// the same surface touchable at the true requested opacity.

use anyhow::Result;
use log::{debug, info, warn};

/// Window alpha ceiling while locked. Compositors only grant click-through
/// below this threshold, so locked mode caps the window even when the user
/// asked for more; the content itself still renders at the requested opacity.
pub const LOCKED_ALPHA_CAP: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Guide mode: semi-transparent, touches pass through
    Locked,
    /// Manipulation mode: opaque-capable, fully touchable
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlsVisibility {
    Hidden,
    Visible,
}

/// The full attribute set the host needs for the overlay window. Applied via
/// an idempotent update; every transition re-derives and re-sends the whole
/// thing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAttributes {
    pub touchable: bool,
    pub alpha: f32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Host-side application of window attributes. Failures are non-fatal: the
/// controller logs and proceeds, and the next transition re-sends full state.
pub trait AttributeSink {
    fn apply(&mut self, attrs: &WindowAttributes) -> Result<()>;
}

pub struct OverlayModeController {
    mode: OverlayMode,
    controls: ControlsVisibility,
    /// User-chosen base opacity in [0, 1], independent of mode
    opacity: f32,
    /// Whether the image gesture listener is currently installed. Attached
    /// only while Editing; in Locked the interpreter is never even offered
    /// events, which is how true passthrough is achieved.
    gesture_listener_attached: bool,
    /// Placement of the overlay window, echoed back on every update
    position: (i32, i32),
    size: (u32, u32),
}

impl OverlayModeController {
    pub fn new(opacity: f32) -> Self {
        Self {
            mode: OverlayMode::Locked,
            controls: ControlsVisibility::Hidden,
            opacity: opacity.clamp(0.0, 1.0),
            gesture_listener_attached: false,
            position: (0, 0),
            size: (0, 0),
        }
    }

    pub fn mode(&self) -> OverlayMode {
        self.mode
    }

    pub fn controls(&self) -> ControlsVisibility {
        self.controls
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn gesture_listener_attached(&self) -> bool {
        self.gesture_listener_attached
    }

    /// Window-level alpha after mode-dependent capping
    pub fn effective_alpha(&self) -> f32 {
        match self.mode {
            OverlayMode::Locked => self.opacity.min(LOCKED_ALPHA_CAP),
            OverlayMode::Editing => self.opacity,
        }
    }

    pub fn window_touchable(&self) -> bool {
        self.mode == OverlayMode::Editing
    }

    pub fn attributes(&self) -> WindowAttributes {
        WindowAttributes {
            touchable: self.window_touchable(),
            alpha: self.effective_alpha(),
            x: self.position.0,
            y: self.position.1,
            width: self.size.0,
            height: self.size.1,
        }
    }

    /// Record the host-assigned window geometry and re-push attributes
    pub fn set_geometry(&mut self, x: i32, y: i32, width: u32, height: u32, sink: &mut dyn AttributeSink) {
        self.position = (x, y);
        self.size = (width, height);
        self.push(sink);
    }

    /// Explicit lock-switch toggle: flips the mode in place, visibility axis
    /// unchanged
    pub fn set_locked(&mut self, locked: bool, sink: &mut dyn AttributeSink) {
        let target = if locked {
            OverlayMode::Locked
        } else {
            OverlayMode::Editing
        };
        if self.mode == target {
            return;
        }
        self.mode = target;
        self.sync_listener();
        info!(
            "overlay mode -> {:?} (touchable={}, alpha={:.2})",
            self.mode,
            self.window_touchable(),
            self.effective_alpha()
        );
        self.push(sink);
    }

    /// User moved the opacity control; mode is unchanged but the window alpha
    /// must be re-derived and re-sent
    pub fn set_opacity(&mut self, opacity: f32, sink: &mut dyn AttributeSink) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.push(sink);
    }

    pub fn open_controls(&mut self, sink: &mut dyn AttributeSink) {
        if self.controls == ControlsVisibility::Visible {
            return;
        }
        self.controls = ControlsVisibility::Visible;
        debug!("controls panel opened");
        self.push(sink);
    }

    /// Closing the panel always returns the overlay to guide mode, even if
    /// the lock switch was last set to editing: the user must never be left
    /// in a touch-blocking state with no visible way back to the controls.
    pub fn close_controls(&mut self, sink: &mut dyn AttributeSink) {
        if self.controls == ControlsVisibility::Hidden {
            return;
        }
        self.controls = ControlsVisibility::Hidden;
        if self.mode == OverlayMode::Editing {
            self.mode = OverlayMode::Locked;
            self.sync_listener();
            info!("controls closed: forcing overlay back to Locked");
        }
        self.push(sink);
    }

    fn sync_listener(&mut self) {
        self.gesture_listener_attached = self.mode == OverlayMode::Editing;
    }

    /// Synchronously apply the derived attribute set. A failed update is
    /// logged and swallowed; the overlay stays functional and the next
    /// transition re-sends everything.
    pub fn push(&self, sink: &mut dyn AttributeSink) {
        let attrs = self.attributes();
        if let Err(e) = sink.apply(&attrs) {
            warn!("overlay window update failed (will retry on next transition): {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[derive(Default)]
    struct RecordingSink {
        applied: Vec<WindowAttributes>,
        fail: bool,
    }

    impl AttributeSink for RecordingSink {
        fn apply(&mut self, attrs: &WindowAttributes) -> Result<()> {
            if self.fail {
                bail!("compositor rejected update");
            }
            self.applied.push(*attrs);
            Ok(())
        }
    }

    #[test]
    fn initial_state_is_locked_and_hidden() {
        let c = OverlayModeController::new(0.6);
        assert_eq!(c.mode(), OverlayMode::Locked);
        assert_eq!(c.controls(), ControlsVisibility::Hidden);
        assert!(!c.window_touchable());
        assert!(!c.gesture_listener_attached());
    }

    #[test]
    fn locked_alpha_is_capped_editing_alpha_is_exact() {
        let mut sink = RecordingSink::default();
        let mut c = OverlayModeController::new(0.95);
        assert!((c.effective_alpha() - 0.8).abs() < 1e-6);
        c.set_locked(false, &mut sink);
        assert!((c.effective_alpha() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn opacity_scenario_across_modes() {
        let mut sink = RecordingSink::default();
        // opacity=60% in Locked: below the cap, passes through unchanged
        let mut c = OverlayModeController::new(0.6);
        assert!((c.effective_alpha() - 0.6).abs() < 1e-6);
        // raising to 95% while Locked hits the cap
        c.set_opacity(0.95, &mut sink);
        assert!((c.effective_alpha() - 0.8).abs() < 1e-6);
        // switching to Editing releases it
        c.set_locked(false, &mut sink);
        assert!((c.effective_alpha() - 0.95).abs() < 1e-6);
        assert!(c.window_touchable());
    }

    #[test]
    fn locked_alpha_never_exceeds_cap() {
        for pct in 0..=100 {
            let c = OverlayModeController::new(pct as f32 / 100.0);
            assert!(c.effective_alpha() <= LOCKED_ALPHA_CAP + 1e-6);
        }
    }

    #[test]
    fn toggling_lock_attaches_and_detaches_the_listener() {
        let mut sink = RecordingSink::default();
        let mut c = OverlayModeController::new(0.6);
        c.set_locked(false, &mut sink);
        assert!(c.gesture_listener_attached());
        c.set_locked(true, &mut sink);
        assert!(!c.gesture_listener_attached());
    }

    #[test]
    fn closing_panel_while_editing_forces_locked_hidden() {
        let mut sink = RecordingSink::default();
        let mut c = OverlayModeController::new(0.6);
        c.open_controls(&mut sink);
        c.set_locked(false, &mut sink);
        assert_eq!(c.mode(), OverlayMode::Editing);
        c.close_controls(&mut sink);
        assert_eq!(c.mode(), OverlayMode::Locked);
        assert_eq!(c.controls(), ControlsVisibility::Hidden);
        assert!(!c.gesture_listener_attached());
    }

    #[test]
    fn closing_panel_while_locked_only_hides_it() {
        let mut sink = RecordingSink::default();
        let mut c = OverlayModeController::new(0.6);
        c.open_controls(&mut sink);
        c.close_controls(&mut sink);
        assert_eq!(c.mode(), OverlayMode::Locked);
        assert_eq!(c.controls(), ControlsVisibility::Hidden);
    }

    #[test]
    fn every_transition_pushes_full_attributes() {
        let mut sink = RecordingSink::default();
        let mut c = OverlayModeController::new(0.6);
        c.set_geometry(0, 0, 1920, 1080, &mut sink);
        c.set_locked(false, &mut sink);
        c.set_opacity(0.3, &mut sink);
        c.open_controls(&mut sink);
        c.close_controls(&mut sink);
        assert_eq!(sink.applied.len(), 5);
        let last = sink.applied.last().unwrap();
        assert!(!last.touchable);
        assert_eq!((last.width, last.height), (1920, 1080));
        assert!((last.alpha - 0.3).abs() < 1e-6);
    }

    #[test]
    fn sink_failure_is_swallowed_and_state_advances() {
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut c = OverlayModeController::new(0.6);
        c.set_locked(false, &mut sink);
        assert_eq!(c.mode(), OverlayMode::Editing);
        // Recovery: a later transition against a healthy sink re-sends state
        let mut ok = RecordingSink::default();
        c.set_locked(true, &mut ok);
        assert_eq!(ok.applied.len(), 1);
        assert!(!ok.applied[0].touchable);
    }
}
