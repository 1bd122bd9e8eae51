// Overlay image pose
// Translation, uniform scale and rotation applied on top of the fit-to-screen
// layout. Updates are computed relative to a gesture-session snapshot rather
// than the previous frame, so repeated small deltas cannot drift.

use crate::geometry::normalize_degrees;

/// Minimum user scale factor
pub const MIN_SCALE: f32 = 0.1;
/// Maximum user scale factor
pub const MAX_SCALE: f32 = 6.0;

/// The mutable pose of the overlay image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    /// Offset of the image center from its default position, in surface pixels
    pub translation: (f32, f32),
    /// Uniform scale factor, kept within [MIN_SCALE, MAX_SCALE]
    pub scale: f32,
    /// Clockwise rotation in degrees, normalized to [0, 360)
    pub rotation_deg: f32,
}

/// Session-start copy of the pose, taken on pointer-down and used as the
/// baseline for all deltas until the gesture ends
pub type TransformSnapshot = TransformState;

impl Default for TransformState {
    fn default() -> Self {
        Self {
            translation: (0.0, 0.0),
            scale: 1.0,
            rotation_deg: 0.0,
        }
    }
}

impl TransformState {
    pub fn snapshot(&self) -> TransformSnapshot {
        *self
    }

    pub fn restore(&mut self, snapshot: TransformSnapshot) {
        *self = snapshot;
    }

    /// Pan relative to the session start: `delta` is the raw pointer movement
    /// since pointer-down, not since the last frame.
    pub fn apply_pan(&mut self, start: &TransformSnapshot, delta: (f32, f32)) {
        self.translation = (start.translation.0 + delta.0, start.translation.1 + delta.1);
    }

    /// Pinch relative to the session start: `scale_ratio` is current distance
    /// over start distance, `delta_rotation` is current angle minus start
    /// angle. Scale is clamped, rotation normalized.
    pub fn apply_pinch(&mut self, start: &TransformSnapshot, scale_ratio: f32, delta_rotation: f32) {
        self.scale = (start.scale * scale_ratio).clamp(MIN_SCALE, MAX_SCALE);
        self.rotation_deg = normalize_degrees(start.rotation_deg + delta_rotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_is_start_relative() {
        let mut t = TransformState::default();
        let start = t.snapshot();
        t.apply_pan(&start, (10.0, -5.0));
        t.apply_pan(&start, (12.0, -6.0));
        assert_eq!(t.translation, (12.0, -6.0));
    }

    #[test]
    fn pan_may_leave_the_screen() {
        let mut t = TransformState::default();
        let start = t.snapshot();
        t.apply_pan(&start, (-99999.0, 99999.0));
        assert_eq!(t.translation, (-99999.0, 99999.0));
    }

    #[test]
    fn pinch_scales_and_rotates_from_session_start() {
        // distance 100 -> 150, angle 0 -> 30 from identity
        let mut t = TransformState::default();
        let start = t.snapshot();
        t.apply_pinch(&start, 150.0 / 100.0, 30.0);
        assert!((t.scale - 1.5).abs() < 1e-6);
        assert!((t.rotation_deg - 30.0).abs() < 1e-4);
    }

    #[test]
    fn scale_stays_clamped_for_extreme_ratios() {
        let mut t = TransformState {
            scale: 2.0,
            ..Default::default()
        };
        let start = t.snapshot();
        t.apply_pinch(&start, 1.0e6, 0.0);
        assert_eq!(t.scale, MAX_SCALE);
        t.apply_pinch(&start, 1.0e-6, 0.0);
        assert_eq!(t.scale, MIN_SCALE);
        t.apply_pinch(&start, 0.0, 0.0);
        assert_eq!(t.scale, MIN_SCALE);
    }

    #[test]
    fn rotation_is_normalized() {
        let mut t = TransformState {
            rotation_deg: 350.0,
            ..Default::default()
        };
        let start = t.snapshot();
        t.apply_pinch(&start, 1.0, 20.0);
        assert!((t.rotation_deg - 10.0).abs() < 1e-4);
        t.apply_pinch(&start, 1.0, -360.0);
        assert!((t.rotation_deg - 350.0).abs() < 1e-4);
    }

    #[test]
    fn restore_rolls_back_to_snapshot() {
        let mut t = TransformState::default();
        let start = t.snapshot();
        t.apply_pan(&start, (40.0, 40.0));
        t.apply_pinch(&start, 3.0, 90.0);
        t.restore(start);
        assert_eq!(t, TransformState::default());
    }
}
