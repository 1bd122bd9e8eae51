// Overlay session
// The explicit handle for one running overlay: owns the mode state machine,
// the image pose, the gesture interpreter and the FAB controller, and routes
// host input between them. The controlling UI holds this handle and consumes
// it to stop the overlay; there is no global "is running" flag.

use crate::fab::{FabDragController, FabGesture};
use crate::geometry::Point;
use crate::gesture::{GestureInterpreter, PointerEvent};
use crate::hit_test::HitTester;
use crate::mode::{AttributeSink, ControlsVisibility, OverlayModeController};
use log::{debug, info};
use thiserror::Error;

/// Opacity used when the caller does not pick one
pub const DEFAULT_OPACITY_PERCENT: i32 = 60;
/// Side length of the floating control, in pixels
pub const FAB_SIZE: u32 = 48;
/// Default anchored position of the floating control
pub const DEFAULT_FAB_POSITION: (i32, i32) = (16, 16);

/// Parameters for starting (or re-targeting) an overlay session
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub image_uri: String,
    /// User opacity as an integer percent, clamped into 0..=100 before use
    pub opacity_percent: i32,
}

impl SessionParams {
    pub fn opacity(&self) -> f32 {
        self.opacity_percent.clamp(0, 100) as f32 / 100.0
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no image selected for the overlay")]
    MissingImage,
}

/// Commands arriving from the control panel UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    /// true = guide/passthrough, false = edit
    SetLocked(bool),
    /// Integer percent from the opacity control
    OpacityChanged(i32),
    /// Close the panel, keep the overlay running
    Back,
    /// Tear down the whole overlay
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOutcome {
    Continue,
    CloseOverlay,
}

pub struct OverlaySession {
    mode: OverlayModeController,
    transform: crate::transform::TransformState,
    gesture: GestureInterpreter,
    fab: FabDragController,
    hit: HitTester,
    image_uri: String,
    image_visible: bool,
    /// Where the panel was opened; it takes the FAB's place on screen
    panel_position: (i32, i32),
}

impl OverlaySession {
    /// Start a session. The image must already be chosen; a missing image is
    /// surfaced to the caller before any overlay window exists.
    pub fn start(params: &SessionParams, fab_position: (i32, i32)) -> Result<Self, SessionError> {
        if params.image_uri.is_empty() {
            return Err(SessionError::MissingImage);
        }
        info!(
            "overlay session started: image={:?}, opacity={}%",
            params.image_uri,
            params.opacity_percent.clamp(0, 100)
        );
        Ok(Self {
            mode: OverlayModeController::new(params.opacity()),
            transform: crate::transform::TransformState::default(),
            gesture: GestureInterpreter::new(),
            fab: FabDragController::new(fab_position),
            hit: HitTester::new((0.0, 0.0), (0.0, 0.0)),
            image_uri: params.image_uri.clone(),
            image_visible: true,
            panel_position: fab_position,
        })
    }

    /// Re-target a live session with a new image or opacity. The current
    /// transform survives; only the content and the base opacity change.
    pub fn restart(
        &mut self,
        params: &SessionParams,
        sink: &mut dyn AttributeSink,
    ) -> Result<(), SessionError> {
        if params.image_uri.is_empty() {
            return Err(SessionError::MissingImage);
        }
        info!("overlay session re-targeted: image={:?}", params.image_uri);
        self.image_uri = params.image_uri.clone();
        self.image_visible = true;
        self.mode.set_opacity(params.opacity(), sink);
        Ok(())
    }

    /// Record the overlay surface and image content dimensions, updating the
    /// hit-test layout and the window geometry echoed to the host.
    pub fn set_layout(
        &mut self,
        surface: (u32, u32),
        content: (u32, u32),
        position: (i32, i32),
        sink: &mut dyn AttributeSink,
    ) {
        self.hit = HitTester::new(
            (surface.0 as f32, surface.1 as f32),
            (content.0 as f32, content.1 as f32),
        );
        self.mode
            .set_geometry(position.0, position.1, surface.0, surface.1, sink);
    }

    pub fn mode(&self) -> &OverlayModeController {
        &self.mode
    }

    pub fn transform(&self) -> &crate::transform::TransformState {
        &self.transform
    }

    pub fn image_uri(&self) -> &str {
        &self.image_uri
    }

    pub fn image_visible(&self) -> bool {
        self.image_visible
    }

    pub fn fab_position(&self) -> (i32, i32) {
        self.fab.position()
    }

    pub fn fab_visible(&self) -> bool {
        self.mode.controls() == ControlsVisibility::Hidden
    }

    pub fn panel_visible(&self) -> bool {
        self.mode.controls() == ControlsVisibility::Visible
    }

    pub fn panel_position(&self) -> (i32, i32) {
        self.panel_position
    }

    /// Pointer events landing on the image layer. Only consumed while the
    /// gesture listener is attached (Editing); in Locked the host should not
    /// even deliver them here, and if it does they fall through.
    pub fn handle_image_event(&mut self, event: &PointerEvent) -> bool {
        if !self.mode.gesture_listener_attached() || !self.image_visible {
            return false;
        }
        self.gesture.handle(event, &mut self.transform, &self.hit)
    }

    pub fn fab_down(&mut self, time_ms: u32, raw: Point) {
        self.fab.on_down(time_ms, raw);
    }

    pub fn fab_move(
        &mut self,
        time_ms: u32,
        raw: Point,
        sink: &mut dyn AttributeSink,
    ) -> Option<FabGesture> {
        let fired = self.fab.on_move(time_ms, raw);
        if let Some(gesture) = fired {
            self.apply_fab_gesture(gesture, sink);
        }
        fired
    }

    pub fn fab_up(&mut self, time_ms: u32, sink: &mut dyn AttributeSink) -> Option<FabGesture> {
        let fired = self.fab.on_up(time_ms);
        if let Some(gesture) = fired {
            self.apply_fab_gesture(gesture, sink);
        }
        fired
    }

    pub fn fab_cancel(&mut self) {
        self.fab.on_cancel();
    }

    /// Host-driven check for a stationary long-press on the FAB
    pub fn fab_poll(&mut self, time_ms: u32, sink: &mut dyn AttributeSink) -> Option<FabGesture> {
        let fired = self.fab.poll(time_ms);
        if let Some(gesture) = fired {
            self.apply_fab_gesture(gesture, sink);
        }
        fired
    }

    fn apply_fab_gesture(&mut self, gesture: FabGesture, sink: &mut dyn AttributeSink) {
        match gesture {
            FabGesture::Tap => {
                self.image_visible = !self.image_visible;
                debug!("fab tap: image visible -> {}", self.image_visible);
            }
            FabGesture::LongPress => {
                if self.panel_visible() {
                    self.close_panel(sink);
                } else {
                    self.open_panel(sink);
                }
            }
        }
    }

    fn open_panel(&mut self, sink: &mut dyn AttributeSink) {
        // The panel opens exactly where the FAB sits; the FAB hides while the
        // panel is up (exactly one of the two is ever shown).
        self.panel_position = self.fab.position();
        self.mode.open_controls(sink);
    }

    fn close_panel(&mut self, sink: &mut dyn AttributeSink) {
        self.mode.close_controls(sink);
    }

    /// A command from the control panel, applied synchronously
    pub fn panel_command(
        &mut self,
        command: PanelCommand,
        sink: &mut dyn AttributeSink,
    ) -> PanelOutcome {
        match command {
            PanelCommand::SetLocked(locked) => {
                self.mode.set_locked(locked, sink);
                PanelOutcome::Continue
            }
            PanelCommand::OpacityChanged(percent) => {
                self.mode
                    .set_opacity(percent.clamp(0, 100) as f32 / 100.0, sink);
                PanelOutcome::Continue
            }
            PanelCommand::Back => {
                self.close_panel(sink);
                PanelOutcome::Continue
            }
            PanelCommand::Close => PanelOutcome::CloseOverlay,
        }
    }

    /// Tear the session down, releasing the handle
    pub fn stop(self) {
        info!("overlay session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{PointerPhase, PointerSample};
    use crate::mode::{OverlayMode, WindowAttributes};
    use anyhow::Result;

    #[derive(Default)]
    struct RecordingSink {
        applied: Vec<WindowAttributes>,
    }

    impl AttributeSink for RecordingSink {
        fn apply(&mut self, attrs: &WindowAttributes) -> Result<()> {
            self.applied.push(*attrs);
            Ok(())
        }
    }

    fn params() -> SessionParams {
        SessionParams {
            image_uri: "file:///tmp/guide.png".into(),
            opacity_percent: 60,
        }
    }

    fn session() -> (OverlaySession, RecordingSink) {
        let mut sink = RecordingSink::default();
        let mut s = OverlaySession::start(&params(), DEFAULT_FAB_POSITION).unwrap();
        // 400x400 surface showing a 200x100 image
        s.set_layout((400, 400), (200, 100), (0, 0), &mut sink);
        (s, sink)
    }

    fn pointer_event(phase: PointerPhase, pointers: &[(i32, f32, f32)]) -> PointerEvent {
        PointerEvent {
            phase,
            time_ms: 0,
            pointers: pointers
                .iter()
                .map(|&(id, x, y)| PointerSample { id, x, y })
                .collect(),
        }
    }

    #[test]
    fn starting_without_an_image_fails_before_any_window_exists() {
        let p = SessionParams {
            image_uri: String::new(),
            opacity_percent: 60,
        };
        assert!(matches!(
            OverlaySession::start(&p, DEFAULT_FAB_POSITION),
            Err(SessionError::MissingImage)
        ));
    }

    #[test]
    fn session_starts_locked_with_the_fab_shown() {
        let (s, _) = session();
        assert_eq!(s.mode().mode(), OverlayMode::Locked);
        assert!(s.fab_visible());
        assert!(!s.panel_visible());
        assert!(s.image_visible());
    }

    #[test]
    fn fab_tap_toggles_image_visibility_without_touching_the_mode() {
        let (mut s, mut sink) = session();
        let pushes_before = sink.applied.len();

        s.fab_down(1000, crate::geometry::Point::new(20.0, 20.0));
        assert_eq!(s.fab_up(1100, &mut sink), Some(FabGesture::Tap));
        assert!(!s.image_visible());
        assert_eq!(s.mode().mode(), OverlayMode::Locked);
        // Visibility is a render-side toggle, not a window attribute change
        assert_eq!(sink.applied.len(), pushes_before);

        s.fab_down(2000, crate::geometry::Point::new(20.0, 20.0));
        s.fab_up(2100, &mut sink);
        assert!(s.image_visible());
    }

    #[test]
    fn long_press_opens_the_panel_where_the_fab_was_dragged() {
        let (mut s, mut sink) = session();

        // Drag the control somewhere else first
        s.fab_down(0, crate::geometry::Point::new(0.0, 0.0));
        s.fab_move(50, crate::geometry::Point::new(120.0, 200.0), &mut sink);
        s.fab_up(100, &mut sink);
        let dragged_to = s.fab_position();
        assert_ne!(dragged_to, DEFAULT_FAB_POSITION);

        // Stationary hold opens the panel in the control's place
        s.fab_down(1000, crate::geometry::Point::new(130.0, 230.0));
        assert_eq!(s.fab_poll(1500, &mut sink), Some(FabGesture::LongPress));
        s.fab_up(1600, &mut sink);
        assert!(s.panel_visible());
        assert!(!s.fab_visible());
        assert_eq!(s.panel_position(), dragged_to);
    }

    #[test]
    fn closing_the_panel_from_editing_relocks_the_overlay() {
        let (mut s, mut sink) = session();
        s.fab_down(0, crate::geometry::Point::new(20.0, 20.0));
        s.fab_poll(600, &mut sink);
        s.fab_up(700, &mut sink);
        assert!(s.panel_visible());

        s.panel_command(PanelCommand::SetLocked(false), &mut sink);
        assert_eq!(s.mode().mode(), OverlayMode::Editing);

        let outcome = s.panel_command(PanelCommand::Back, &mut sink);
        assert_eq!(outcome, PanelOutcome::Continue);
        assert!(!s.panel_visible());
        assert!(s.fab_visible());
        assert_eq!(s.mode().mode(), OverlayMode::Locked);
        let last = sink.applied.last().unwrap();
        assert!(!last.touchable);
    }

    #[test]
    fn close_command_ends_the_overlay() {
        let (mut s, mut sink) = session();
        let outcome = s.panel_command(PanelCommand::Close, &mut sink);
        assert_eq!(outcome, PanelOutcome::CloseOverlay);
        s.stop();
    }

    #[test]
    fn gestures_only_land_while_editing() {
        let (mut s, mut sink) = session();
        let down = pointer_event(PointerPhase::Down, &[(0, 200.0, 200.0)]);

        // Locked: the event falls through untouched
        assert!(!s.handle_image_event(&down));

        s.panel_command(PanelCommand::SetLocked(false), &mut sink);
        assert!(s.handle_image_event(&down));
        let moved = pointer_event(PointerPhase::Move, &[(0, 230.0, 210.0)]);
        assert!(s.handle_image_event(&moved));
        assert_eq!(s.transform().translation, (30.0, 10.0));

        // Re-locking detaches the listener mid-flight
        s.panel_command(PanelCommand::SetLocked(true), &mut sink);
        let moved = pointer_event(PointerPhase::Move, &[(0, 300.0, 300.0)]);
        assert!(!s.handle_image_event(&moved));
        assert_eq!(s.transform().translation, (30.0, 10.0));
    }

    #[test]
    fn hidden_image_ignores_gestures_even_while_editing() {
        let (mut s, mut sink) = session();
        s.panel_command(PanelCommand::SetLocked(false), &mut sink);
        s.fab_down(1000, crate::geometry::Point::new(20.0, 20.0));
        s.fab_up(1100, &mut sink);
        assert!(!s.image_visible());

        let down = pointer_event(PointerPhase::Down, &[(0, 200.0, 200.0)]);
        assert!(!s.handle_image_event(&down));
    }

    #[test]
    fn opacity_commands_clamp_and_respect_the_locked_cap() {
        let (mut s, mut sink) = session();
        s.panel_command(PanelCommand::OpacityChanged(150), &mut sink);
        assert!((s.mode().opacity() - 1.0).abs() < 1e-6);
        // Locked: the pushed window alpha stays capped
        let last = sink.applied.last().unwrap();
        assert!((last.alpha - 0.8).abs() < 1e-6);

        s.panel_command(PanelCommand::OpacityChanged(-20), &mut sink);
        assert!(s.mode().opacity().abs() < 1e-6);
    }

    #[test]
    fn restart_keeps_the_transform_but_takes_the_new_opacity() {
        let (mut s, mut sink) = session();
        s.panel_command(PanelCommand::SetLocked(false), &mut sink);
        s.handle_image_event(&pointer_event(PointerPhase::Down, &[(0, 200.0, 200.0)]));
        s.handle_image_event(&pointer_event(PointerPhase::Move, &[(0, 250.0, 200.0)]));
        s.handle_image_event(&pointer_event(PointerPhase::Up, &[]));
        let pose = *s.transform();

        // Hide the image, then re-target the session
        s.fab_down(1000, crate::geometry::Point::new(20.0, 20.0));
        s.fab_up(1100, &mut sink);
        let new_params = SessionParams {
            image_uri: "file:///tmp/other.png".into(),
            opacity_percent: 30,
        };
        s.restart(&new_params, &mut sink).unwrap();

        assert_eq!(*s.transform(), pose);
        assert_eq!(s.image_uri(), "file:///tmp/other.png");
        assert!(s.image_visible());
        assert!((s.mode().opacity() - 0.3).abs() < 1e-6);

        let empty = SessionParams {
            image_uri: String::new(),
            opacity_percent: 30,
        };
        assert!(s.restart(&empty, &mut sink).is_err());
    }
}
