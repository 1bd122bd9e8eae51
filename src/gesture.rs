// Gesture interpretation for the overlay image
// Consumes the host pointer stream while the overlay is editable and turns it
// into pan or pinch updates on the image pose. All deltas are computed from
// the baseline captured when the gesture session started, so the pose cannot
// drift over many small move events.

use crate::geometry::{self, Point};
use crate::hit_test::HitTester;
use crate::transform::{TransformSnapshot, TransformState};
use log::debug;

/// One active pointer in an event frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub id: i32,
    pub x: f32,
    pub y: f32,
}

impl PointerSample {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// What happened in this frame of the pointer stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// First pointer went down
    Down,
    /// An additional pointer went down
    PointerDown,
    Move,
    /// A non-final pointer lifted
    PointerUp,
    /// The last pointer lifted
    Up,
    /// The host reclaimed the gesture
    Cancel,
}

/// A host-delivered pointer event: the phase plus every still-active pointer,
/// ordered by pointer index
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub time_ms: u32,
    pub pointers: Vec<PointerSample>,
}

/// Interpreter state across one touch sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    /// One pointer down, not yet classified as tap or drag
    SinglePointerDown,
    Panning,
    Pinching,
}

/// Per-session pinch baseline: two-point distance and angle at the moment the
/// second pointer landed
#[derive(Debug, Clone, Copy)]
struct PinchBaseline {
    distance: f32,
    angle: f32,
}

pub struct GestureInterpreter {
    phase: GesturePhase,
    /// Pose at session start, baseline for all deltas and the rollback target
    /// when the host cancels mid-gesture
    start: TransformSnapshot,
    /// Raw position of the primary pointer at session start
    down_raw: Point,
    pinch: Option<PinchBaseline>,
}

impl Default for GestureInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureInterpreter {
    pub fn new() -> Self {
        Self {
            phase: GesturePhase::Idle,
            start: TransformSnapshot::default(),
            down_raw: Point::default(),
            pinch: None,
        }
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Feed one pointer event. Returns true when the event was consumed by an
    /// active (or newly started) gesture session; a Down that misses the image
    /// is not consumed so the host can let it fall through.
    pub fn handle(
        &mut self,
        event: &PointerEvent,
        transform: &mut TransformState,
        hit: &HitTester,
    ) -> bool {
        match event.phase {
            PointerPhase::Down => self.on_down(event, transform, hit),
            PointerPhase::PointerDown => self.on_pointer_down(event, transform),
            PointerPhase::Move => self.on_move(event, transform),
            PointerPhase::PointerUp => {
                // Lifting a finger mid-pinch ends the session rather than
                // falling back to one-finger panning; the pose keeps its
                // last value and a fresh Down starts a new session.
                if self.phase != GesturePhase::Idle {
                    debug!("gesture session ended by pointer-up in {:?}", self.phase);
                    self.phase = GesturePhase::Idle;
                    self.pinch = None;
                    return true;
                }
                false
            }
            PointerPhase::Up => {
                let active = self.phase != GesturePhase::Idle;
                self.phase = GesturePhase::Idle;
                self.pinch = None;
                active
            }
            PointerPhase::Cancel => {
                // Roll back to the session baseline so a reclaimed gesture
                // leaves no partial deltas behind.
                let active = self.phase != GesturePhase::Idle;
                if active {
                    transform.restore(self.start);
                }
                self.phase = GesturePhase::Idle;
                self.pinch = None;
                active
            }
        }
    }

    fn on_down(
        &mut self,
        event: &PointerEvent,
        transform: &TransformState,
        hit: &HitTester,
    ) -> bool {
        let Some(primary) = event.pointers.first() else {
            return false;
        };
        if !hit.hit(primary.point(), transform.scale) {
            return false;
        }
        self.phase = GesturePhase::SinglePointerDown;
        self.start = transform.snapshot();
        self.down_raw = primary.point();
        self.pinch = None;
        true
    }

    fn on_pointer_down(&mut self, event: &PointerEvent, transform: &TransformState) -> bool {
        if self.phase == GesturePhase::Idle {
            return false;
        }
        if let Some((p0, p1)) = two_lowest(&event.pointers) {
            self.phase = GesturePhase::Pinching;
            // Re-snapshot: the pinch measures from here, not from the
            // original single-finger down.
            self.start = transform.snapshot();
            self.pinch = Some(PinchBaseline {
                distance: geometry::distance(p0.point(), p1.point()),
                angle: geometry::angle(p0.point(), p1.point()),
            });
        }
        true
    }

    fn on_move(&mut self, event: &PointerEvent, transform: &mut TransformState) -> bool {
        match self.phase {
            GesturePhase::Idle => false,
            GesturePhase::SinglePointerDown | GesturePhase::Panning => {
                let Some(primary) = event.pointers.first() else {
                    return false;
                };
                // First move commits the ambiguous down to a pan
                self.phase = GesturePhase::Panning;
                let delta = (primary.x - self.down_raw.x, primary.y - self.down_raw.y);
                transform.apply_pan(&self.start, delta);
                true
            }
            GesturePhase::Pinching => {
                let (Some(baseline), Some((p0, p1))) = (self.pinch, two_lowest(&event.pointers))
                else {
                    return true;
                };
                let dist = geometry::distance(p0.point(), p1.point());
                let ang = geometry::angle(p0.point(), p1.point());
                transform.apply_pinch(&self.start, dist / baseline.distance, ang - baseline.angle);
                true
            }
        }
    }
}

/// The two lowest-indexed active pointers; anything beyond them is ignored
fn two_lowest(pointers: &[PointerSample]) -> Option<(&PointerSample, &PointerSample)> {
    match pointers {
        [p0, p1, ..] => Some((p0, p1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{MAX_SCALE, MIN_SCALE};

    fn tester() -> HitTester {
        // 400x400 surface showing a 200x100 image: content band y in [100, 300]
        HitTester::new((400.0, 400.0), (200.0, 100.0))
    }

    fn event(phase: PointerPhase, pointers: &[(i32, f32, f32)]) -> PointerEvent {
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
    fn down_outside_padded_box_stays_idle() {
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        let consumed = g.handle(
            &event(PointerPhase::Down, &[(0, 200.0, 10.0)]),
            &mut t,
            &tester(),
        );
        assert!(!consumed);
        assert_eq!(g.phase(), GesturePhase::Idle);
        // A following move must not start panning either
        g.handle(
            &event(PointerPhase::Move, &[(0, 250.0, 20.0)]),
            &mut t,
            &tester(),
        );
        assert_eq!(g.phase(), GesturePhase::Idle);
        assert_eq!(t, TransformState::default());
    }

    #[test]
    fn first_move_commits_to_panning() {
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        assert!(g.handle(
            &event(PointerPhase::Down, &[(0, 200.0, 200.0)]),
            &mut t,
            &tester(),
        ));
        assert_eq!(g.phase(), GesturePhase::SinglePointerDown);
        g.handle(
            &event(PointerPhase::Move, &[(0, 201.0, 200.0)]),
            &mut t,
            &tester(),
        );
        assert_eq!(g.phase(), GesturePhase::Panning);
        assert_eq!(t.translation, (1.0, 0.0));
    }

    #[test]
    fn pan_deltas_are_down_relative() {
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        g.handle(
            &event(PointerPhase::Down, &[(0, 200.0, 200.0)]),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(PointerPhase::Move, &[(0, 230.0, 190.0)]),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(PointerPhase::Move, &[(0, 260.0, 180.0)]),
            &mut t,
            &tester(),
        );
        assert_eq!(t.translation, (60.0, -20.0));
    }

    #[test]
    fn pinch_scenario_from_identity() {
        // Session starts at distance 100, angle 0; next frame 150 at 30 deg
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        g.handle(
            &event(PointerPhase::Down, &[(0, 150.0, 200.0)]),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(
                PointerPhase::PointerDown,
                &[(0, 150.0, 200.0), (1, 250.0, 200.0)],
            ),
            &mut t,
            &tester(),
        );
        assert_eq!(g.phase(), GesturePhase::Pinching);

        // 150 * (cos30, sin30) away from the first finger
        let (x1, y1) = (150.0 + 150.0 * 0.8660254, 200.0 + 150.0 * 0.5);
        g.handle(
            &event(PointerPhase::Move, &[(0, 150.0, 200.0), (1, x1, y1)]),
            &mut t,
            &tester(),
        );
        assert!((t.scale - 1.5).abs() < 1e-3, "scale was {}", t.scale);
        assert!(
            (t.rotation_deg - 30.0).abs() < 1e-2,
            "rotation was {}",
            t.rotation_deg
        );
    }

    #[test]
    fn pinch_scale_clamped_from_degenerate_start() {
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        g.handle(
            &event(PointerPhase::Down, &[(0, 200.0, 200.0)]),
            &mut t,
            &tester(),
        );
        // Both fingers at nearly the same point: baseline distance floors at 1
        g.handle(
            &event(
                PointerPhase::PointerDown,
                &[(0, 200.0, 200.0), (1, 200.3, 200.0)],
            ),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(PointerPhase::Move, &[(0, 0.0, 0.0), (1, 400.0, 400.0)]),
            &mut t,
            &tester(),
        );
        assert_eq!(t.scale, MAX_SCALE);

        // And collapsing a wide pinch floors at the minimum
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        g.handle(
            &event(PointerPhase::Down, &[(0, 0.0, 200.0)]),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(
                PointerPhase::PointerDown,
                &[(0, 0.0, 200.0), (1, 400.0, 200.0)],
            ),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(PointerPhase::Move, &[(0, 200.0, 200.0), (1, 200.1, 200.0)]),
            &mut t,
            &tester(),
        );
        assert_eq!(t.scale, MIN_SCALE);
    }

    #[test]
    fn third_pointer_is_ignored_for_pinch_math() {
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        g.handle(
            &event(PointerPhase::Down, &[(0, 100.0, 200.0)]),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(
                PointerPhase::PointerDown,
                &[(0, 100.0, 200.0), (1, 200.0, 200.0)],
            ),
            &mut t,
            &tester(),
        );
        // A third finger lands far away; scale must follow only the first two
        g.handle(
            &event(
                PointerPhase::Move,
                &[(0, 100.0, 200.0), (1, 300.0, 200.0), (2, 399.0, 399.0)],
            ),
            &mut t,
            &tester(),
        );
        assert!((t.scale - 2.0).abs() < 1e-3);
    }

    #[test]
    fn lifting_one_finger_ends_the_session_instead_of_resuming_pan() {
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        g.handle(
            &event(PointerPhase::Down, &[(0, 150.0, 200.0)]),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(
                PointerPhase::PointerDown,
                &[(0, 150.0, 200.0), (1, 250.0, 200.0)],
            ),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(PointerPhase::Move, &[(0, 150.0, 200.0), (1, 350.0, 200.0)]),
            &mut t,
            &tester(),
        );
        let pose_after_pinch = t;

        g.handle(
            &event(PointerPhase::PointerUp, &[(0, 150.0, 200.0)]),
            &mut t,
            &tester(),
        );
        assert_eq!(g.phase(), GesturePhase::Idle);
        assert_eq!(t, pose_after_pinch);

        // The remaining finger moving does nothing until a fresh down
        g.handle(
            &event(PointerPhase::Move, &[(0, 180.0, 200.0)]),
            &mut t,
            &tester(),
        );
        assert_eq!(t, pose_after_pinch);
    }

    #[test]
    fn cancel_rolls_back_to_session_start() {
        let mut g = GestureInterpreter::new();
        let mut t = TransformState::default();
        g.handle(
            &event(PointerPhase::Down, &[(0, 200.0, 200.0)]),
            &mut t,
            &tester(),
        );
        g.handle(
            &event(PointerPhase::Move, &[(0, 300.0, 300.0)]),
            &mut t,
            &tester(),
        );
        assert_ne!(t, TransformState::default());
        g.handle(&event(PointerPhase::Cancel, &[]), &mut t, &tester());
        assert_eq!(g.phase(), GesturePhase::Idle);
        assert_eq!(t, TransformState::default());
    }
}
