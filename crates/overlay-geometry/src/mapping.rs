//! Pixel-space → UI-space mapping.
//!
//! Detector pixels have their origin at the top-left with y growing downwards;
//! the UI rect grows upwards, so the vertical axis is flipped. With
//! [`Anchor::Center`] the rect's origin sits at its middle.

use crate::{Point2, Size};

/// Where the destination rect keeps its local origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Anchor {
    /// Origin at the rect center (pivot-centered layout).
    #[default]
    Center,
    /// Origin at the bottom-left corner.
    BottomLeft,
}

/// Outline loop and center of one detection, already in UI space.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedPolygon {
    /// Corners in detector order with the first corner repeated at the end.
    pub closed_loop: Vec<Point2>,
    pub center: Point2,
}

/// Map one pixel coordinate into the destination rect.
///
/// `frame` must have non-zero sides; callers guard that before mapping.
pub fn to_ui_space(pixel: Point2, frame: Size, dest: Size, anchor: Anchor) -> Point2 {
    let norm_x = pixel.x / frame.width;
    let norm_y = 1.0 - pixel.y / frame.height;

    let local_x = norm_x * dest.width;
    let local_y = norm_y * dest.height;

    match anchor {
        Anchor::Center => Point2::new(local_x - dest.width / 2.0, local_y - dest.height / 2.0),
        Anchor::BottomLeft => Point2::new(local_x, local_y),
    }
}

/// Inverse of [`to_ui_space`]; `dest` must have non-zero sides.
pub fn to_pixel_space(ui: Point2, frame: Size, dest: Size, anchor: Anchor) -> Point2 {
    let (local_x, local_y) = match anchor {
        Anchor::Center => (ui.x + dest.width / 2.0, ui.y + dest.height / 2.0),
        Anchor::BottomLeft => (ui.x, ui.y),
    };
    let norm_x = local_x / dest.width;
    let norm_y = 1.0 - local_y / dest.height;
    Point2::new(norm_x * frame.width, norm_y * frame.height)
}

/// Map a detection's corners and center, closing the loop.
///
/// Returns an empty loop for an empty corner list.
pub fn map_polygon(
    corners: &[Point2],
    center: Point2,
    frame: Size,
    dest: Size,
    anchor: Anchor,
) -> MappedPolygon {
    let mut closed_loop = Vec::with_capacity(corners.len() + 1);
    closed_loop.extend(
        corners
            .iter()
            .map(|&corner| to_ui_space(corner, frame, dest, anchor)),
    );
    if let Some(&first) = closed_loop.first() {
        closed_loop.push(first);
    }

    MappedPolygon {
        closed_loop,
        center: to_ui_space(center, frame, dest, anchor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn assert_close(actual: Point2, expected: Point2) {
        assert!(
            (actual.x - expected.x).abs() < EPS && (actual.y - expected.y).abs() < EPS,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn repeated_mapping_is_stable() {
        let frame = Size::new(640.0, 480.0);
        let dest = Size::new(1280.0, 720.0);
        let pixel = Point2::new(123.5, 77.25);
        let first = to_ui_space(pixel, frame, dest, Anchor::Center);
        let second = to_ui_space(pixel, frame, dest, Anchor::Center);
        assert_eq!(first, second);
    }

    #[test]
    fn top_left_and_bottom_left_pixels_land_on_opposite_edges() {
        let frame = Size::new(320.0, 240.0);
        let dest = Size::new(400.0, 300.0);

        let top = to_ui_space(Point2::new(0.0, 0.0), frame, dest, Anchor::Center);
        let bottom = to_ui_space(Point2::new(0.0, 240.0), frame, dest, Anchor::Center);

        assert_close(top, Point2::new(-200.0, 150.0));
        assert_close(bottom, Point2::new(-200.0, -150.0));
        assert_eq!(top.x, bottom.x);
        assert_eq!(top.y, -bottom.y);
    }

    #[test]
    fn bottom_left_anchor_keeps_positive_quadrant() {
        let frame = Size::new(100.0, 100.0);
        let dest = Size::new(200.0, 200.0);
        let mapped = to_ui_space(Point2::new(25.0, 75.0), frame, dest, Anchor::BottomLeft);
        assert_close(mapped, Point2::new(50.0, 50.0));
    }

    #[test]
    fn pixel_space_round_trips() {
        let frame = Size::new(640.0, 480.0);
        let dest = Size::new(300.0, 200.0);
        for anchor in [Anchor::Center, Anchor::BottomLeft] {
            let pixel = Point2::new(211.0, 403.0);
            let ui = to_ui_space(pixel, frame, dest, anchor);
            let back = to_pixel_space(ui, frame, dest, anchor);
            assert!((back.x - pixel.x).abs() < 1e-2 && (back.y - pixel.y).abs() < 1e-2);
        }
    }

    #[test]
    fn square_tag_maps_to_centered_square() {
        let corners = [
            Point2::new(10.0, 10.0),
            Point2::new(90.0, 10.0),
            Point2::new(90.0, 90.0),
            Point2::new(10.0, 90.0),
        ];
        let polygon = map_polygon(
            &corners,
            Point2::new(50.0, 50.0),
            Size::new(100.0, 100.0),
            Size::new(200.0, 200.0),
            Anchor::Center,
        );

        assert_eq!(polygon.closed_loop.len(), corners.len() + 1);
        assert_eq!(polygon.closed_loop.first(), polygon.closed_loop.last());
        assert_close(polygon.center, Point2::ORIGIN);
        assert_close(polygon.closed_loop[0], Point2::new(-80.0, 80.0));
        assert_close(polygon.closed_loop[1], Point2::new(80.0, 80.0));
        assert_close(polygon.closed_loop[2], Point2::new(80.0, -80.0));
        assert_close(polygon.closed_loop[3], Point2::new(-80.0, -80.0));

        let side = polygon.closed_loop[0].distance(polygon.closed_loop[1]);
        assert!((side - 160.0).abs() < EPS);
    }

    #[test]
    fn empty_corner_list_yields_empty_loop() {
        let polygon = map_polygon(
            &[],
            Point2::new(5.0, 5.0),
            Size::new(10.0, 10.0),
            Size::new(10.0, 10.0),
            Anchor::Center,
        );
        assert!(polygon.closed_loop.is_empty());
    }
}
