// Hit testing against the visible extent of the displayed image
// The image content is laid out fit-within-container preserving aspect ratio,
// multiplied by the user scale and centered. Touches outside that padded box
// must not start an edit-mode drag, otherwise tapping the transparent margin
// around a non-square image would grab the whole canvas.

use crate::geometry::{Point, Rect};

/// Extra margin around the content box so the image is easier to grab
pub const TOUCH_PADDING: f32 = 20.0;

/// Computes whether a touch lands on the displayed image content
#[derive(Debug, Clone, Copy)]
pub struct HitTester {
    /// Size of the surface the image is laid out in
    pub container: (f32, f32),
    /// Intrinsic pixel size of the decoded image
    pub content: (f32, f32),
}

impl HitTester {
    pub fn new(container: (f32, f32), content: (f32, f32)) -> Self {
        Self { container, content }
    }

    /// On-screen bounding box of the content under fit-center layout and the
    /// current user scale, centered in the container. Returns None for empty
    /// container or content dimensions.
    pub fn content_box(&self, user_scale: f32) -> Option<Rect> {
        let (cw, ch) = self.container;
        let (iw, ih) = self.content;
        if cw <= 0.0 || ch <= 0.0 || iw <= 0.0 || ih <= 0.0 {
            return None;
        }

        let fit = (cw / iw).min(ch / ih);
        let w = iw * fit * user_scale;
        let h = ih * fit * user_scale;
        let left = (cw - w) / 2.0;
        let top = (ch - h) / 2.0;
        Some(Rect::new(left, top, left + w, top + h))
    }

    /// Whether `point` falls on the padded content box at `user_scale`
    pub fn hit(&self, point: Point, user_scale: f32) -> bool {
        match self.content_box(user_scale) {
            Some(rect) => rect.contains_with_padding(point, TOUCH_PADDING),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_in_square_container_is_letterboxed() {
        // 200x100 image in a 400x400 container fits to 400x200, centered
        let tester = HitTester::new((400.0, 400.0), (200.0, 100.0));
        let rect = tester.content_box(1.0).unwrap();
        assert_eq!(rect, Rect::new(0.0, 100.0, 400.0, 300.0));
    }

    #[test]
    fn user_scale_grows_the_box_around_the_center() {
        let tester = HitTester::new((400.0, 400.0), (200.0, 100.0));
        let rect = tester.content_box(0.5).unwrap();
        assert_eq!(rect, Rect::new(100.0, 150.0, 300.0, 250.0));
    }

    #[test]
    fn touch_on_letterbox_margin_misses() {
        let tester = HitTester::new((400.0, 400.0), (200.0, 100.0));
        // Well above the content band, beyond the 20px padding
        assert!(!tester.hit(Point::new(200.0, 40.0), 1.0));
        // Inside the content band
        assert!(tester.hit(Point::new(200.0, 200.0), 1.0));
        // Within padding of the band edge
        assert!(tester.hit(Point::new(200.0, 85.0), 1.0));
    }

    #[test]
    fn empty_content_never_hits() {
        let tester = HitTester::new((400.0, 400.0), (0.0, 0.0));
        assert!(!tester.hit(Point::new(200.0, 200.0), 1.0));
        assert!(tester.content_box(1.0).is_none());
    }
}
