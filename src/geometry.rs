// Geometry helpers for gesture math
// Stateless vector/angle utilities shared by the gesture and hit-test code

/// A point in surface-local pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in surface-local pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Inclusive containment test, expanded by `padding` on all sides
    pub fn contains_with_padding(&self, point: Point, padding: f32) -> bool {
        point.x >= self.left - padding
            && point.x <= self.right + padding
            && point.y >= self.top - padding
            && point.y <= self.bottom + padding
    }
}

/// Euclidean distance between two touch points, used as the pinch baseline.
/// Returns 1.0 when the points coincide closely enough that a downstream
/// division would blow up.
pub fn distance(p0: Point, p1: Point) -> f32 {
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    let d = (dx * dx + dy * dy).sqrt();
    if d < 1.0 {
        1.0
    } else {
        d
    }
}

/// Angle in degrees of the vector `p1 - p0`, range (-180, 180]
pub fn angle(p0: Point, p1: Point) -> f32 {
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    dy.atan2(dx).to_degrees()
}

/// Reduce any finite value into [0, 360)
pub fn normalize_degrees(deg: f32) -> f32 {
    let r = deg % 360.0;
    if r < 0.0 {
        r + 360.0
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let d = distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn distance_degenerate_input_defaults_to_one() {
        let p = Point::new(10.0, 10.0);
        assert_eq!(distance(p, p), 1.0);
        assert_eq!(distance(p, Point::new(10.2, 10.1)), 1.0);
    }

    #[test]
    fn angle_of_axis_vectors() {
        let o = Point::new(0.0, 0.0);
        assert!((angle(o, Point::new(1.0, 0.0)) - 0.0).abs() < 1e-4);
        assert!((angle(o, Point::new(0.0, 1.0)) - 90.0).abs() < 1e-4);
        assert!((angle(o, Point::new(-1.0, 0.0)) - 180.0).abs() < 1e-4);
        assert!((angle(o, Point::new(0.0, -1.0)) + 90.0).abs() < 1e-4);
    }

    #[test]
    fn normalize_degrees_reduces_into_range() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert_eq!(normalize_degrees(-1080.0), 0.0);
    }

    #[test]
    fn normalize_degrees_is_idempotent() {
        for d in [-7200.5, -360.0, -0.1, 0.0, 17.3, 359.999, 14400.25] {
            let once = normalize_degrees(d);
            assert!((0.0..360.0).contains(&once), "out of range for {}", d);
            assert_eq!(normalize_degrees(once), once);
        }
    }

    #[test]
    fn contains_with_padding_expands_bounds() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(r.contains_with_padding(Point::new(15.0, 15.0), 0.0));
        assert!(!r.contains_with_padding(Point::new(25.0, 15.0), 0.0));
        assert!(r.contains_with_padding(Point::new(25.0, 15.0), 5.0));
        assert!(r.contains_with_padding(Point::new(5.0, 5.0), 5.0));
        assert!(!r.contains_with_padding(Point::new(4.9, 15.0), 5.0));
    }
}
