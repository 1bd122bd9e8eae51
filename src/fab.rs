// Floating control (FAB) input handling
// Drag-to-reposition runs concurrently with a tap/long-press recognizer over
// the same raw stream: the drag only reacts to moves, the recognizer only
// classifies down/up timing and slop, so the two never fight over events.

use crate::geometry::Point;

/// Hold duration before a stationary press counts as a long-press
pub const LONG_PRESS_MS: u32 = 500;
/// Movement past this distance disqualifies both tap and long-press
pub const TAP_SLOP: f32 = 10.0;

/// Discrete command recognized on the FAB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabGesture {
    /// Toggle image visibility
    Tap,
    /// Open or close the control panel
    LongPress,
}

/// Timing + slop classifier over DOWN/MOVE/UP. Fires long-press at most once
/// per press; movement past the slop cancels both outcomes.
#[derive(Debug, Default)]
pub struct TapLongPressRecognizer {
    down: Option<(u32, Point)>,
    moved_past_slop: bool,
    long_press_fired: bool,
}

impl TapLongPressRecognizer {
    pub fn on_down(&mut self, time_ms: u32, at: Point) {
        self.down = Some((time_ms, at));
        self.moved_past_slop = false;
        self.long_press_fired = false;
    }

    pub fn on_move(&mut self, time_ms: u32, at: Point) -> Option<FabGesture> {
        let (down_time, origin) = self.down?;
        if !self.moved_past_slop {
            let dx = at.x - origin.x;
            let dy = at.y - origin.y;
            if (dx * dx + dy * dy).sqrt() > TAP_SLOP {
                self.moved_past_slop = true;
            }
        }
        if self.moved_past_slop {
            return None;
        }
        self.fire_if_due(time_ms.wrapping_sub(down_time))
    }

    /// Host-driven time check for a stationary press
    pub fn poll(&mut self, time_ms: u32) -> Option<FabGesture> {
        let (down_time, _) = self.down?;
        if self.moved_past_slop {
            return None;
        }
        self.fire_if_due(time_ms.wrapping_sub(down_time))
    }

    pub fn on_up(&mut self, time_ms: u32) -> Option<FabGesture> {
        let (down_time, _) = self.down.take()?;
        if self.moved_past_slop || self.long_press_fired {
            return None;
        }
        if time_ms.wrapping_sub(down_time) < LONG_PRESS_MS {
            Some(FabGesture::Tap)
        } else {
            // Held past the threshold but never polled: fire the long-press
            // on release rather than dropping it.
            Some(FabGesture::LongPress)
        }
    }

    pub fn on_cancel(&mut self) {
        self.down = None;
    }

    fn fire_if_due(&mut self, held_ms: u32) -> Option<FabGesture> {
        if !self.long_press_fired && held_ms >= LONG_PRESS_MS {
            self.long_press_fired = true;
            Some(FabGesture::LongPress)
        } else {
            None
        }
    }
}

/// Single-pointer drag for the floating control. The new anchored position is
/// the down-time position plus the raw pointer delta, applied immediately.
#[derive(Debug)]
pub struct FabDragController {
    position: (i32, i32),
    drag_start: (i32, i32),
    origin_raw: Point,
    pressed: bool,
    recognizer: TapLongPressRecognizer,
}

impl FabDragController {
    pub fn new(position: (i32, i32)) -> Self {
        Self {
            position,
            drag_start: position,
            origin_raw: Point::default(),
            pressed: false,
            recognizer: TapLongPressRecognizer::default(),
        }
    }

    /// Current anchored position of the control
    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn on_down(&mut self, time_ms: u32, raw: Point) {
        self.pressed = true;
        self.drag_start = self.position;
        self.origin_raw = raw;
        self.recognizer.on_down(time_ms, raw);
    }

    pub fn on_move(&mut self, time_ms: u32, raw: Point) -> Option<FabGesture> {
        if self.pressed {
            self.position = (
                self.drag_start.0 + (raw.x - self.origin_raw.x).round() as i32,
                self.drag_start.1 + (raw.y - self.origin_raw.y).round() as i32,
            );
        }
        self.recognizer.on_move(time_ms, raw)
    }

    pub fn on_up(&mut self, time_ms: u32) -> Option<FabGesture> {
        self.pressed = false;
        self.recognizer.on_up(time_ms)
    }

    pub fn on_cancel(&mut self) {
        self.pressed = false;
        self.recognizer.on_cancel();
    }

    /// Stationary long-press check between events
    pub fn poll(&mut self, time_ms: u32) -> Option<FabGesture> {
        if !self.pressed {
            return None;
        }
        self.recognizer.poll(time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_release_without_movement_is_a_tap() {
        let mut fab = FabDragController::new((16, 16));
        fab.on_down(1000, Point::new(20.0, 20.0));
        assert_eq!(fab.on_up(1100), Some(FabGesture::Tap));
        assert_eq!(fab.position(), (16, 16));
    }

    #[test]
    fn small_jitter_within_slop_still_taps() {
        let mut fab = FabDragController::new((16, 16));
        fab.on_down(1000, Point::new(20.0, 20.0));
        assert_eq!(fab.on_move(1050, Point::new(23.0, 22.0)), None);
        assert_eq!(fab.on_up(1100), Some(FabGesture::Tap));
        // The drag tracked the jitter regardless
        assert_eq!(fab.position(), (19, 18));
    }

    #[test]
    fn movement_past_slop_is_a_completed_drag_not_a_tap() {
        let mut fab = FabDragController::new((16, 16));
        fab.on_down(1000, Point::new(20.0, 20.0));
        assert_eq!(fab.on_move(1050, Point::new(80.0, 120.0)), None);
        assert_eq!(fab.position(), (76, 116));
        assert_eq!(fab.on_up(1200), None);
    }

    #[test]
    fn drag_is_start_relative_with_no_smoothing() {
        let mut fab = FabDragController::new((100, 100));
        fab.on_down(0, Point::new(0.0, 0.0));
        fab.on_move(10, Point::new(50.0, 0.0));
        fab.on_move(20, Point::new(30.0, 40.0));
        assert_eq!(fab.position(), (130, 140));
    }

    #[test]
    fn stationary_hold_fires_long_press_once() {
        let mut fab = FabDragController::new((16, 16));
        fab.on_down(1000, Point::new(20.0, 20.0));
        assert_eq!(fab.poll(1400), None);
        assert_eq!(fab.poll(1500), Some(FabGesture::LongPress));
        assert_eq!(fab.poll(1600), None);
        // Release after a fired long-press is not also a tap
        assert_eq!(fab.on_up(1700), None);
    }

    #[test]
    fn long_hold_release_without_poll_fires_on_up() {
        let mut fab = FabDragController::new((16, 16));
        fab.on_down(1000, Point::new(20.0, 20.0));
        assert_eq!(fab.on_up(1700), Some(FabGesture::LongPress));
    }

    #[test]
    fn movement_past_slop_cancels_long_press() {
        let mut fab = FabDragController::new((16, 16));
        fab.on_down(1000, Point::new(20.0, 20.0));
        fab.on_move(1100, Point::new(60.0, 60.0));
        assert_eq!(fab.poll(1600), None);
        assert_eq!(fab.on_up(1700), None);
    }

    #[test]
    fn cancel_resets_the_press() {
        let mut fab = FabDragController::new((16, 16));
        fab.on_down(1000, Point::new(20.0, 20.0));
        fab.on_cancel();
        assert_eq!(fab.poll(1600), None);
        assert_eq!(fab.on_up(1700), None);
    }
}
