//! Pure geometry for the tag overlay: points, the pixel → UI mapping and the
//! stamped-circle outline tessellator.
//!
//! Nothing in this crate performs I/O or keeps state between calls.

pub mod mapping;
pub mod stroke;

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

pub use mapping::{Anchor, MappedPolygon, map_polygon, to_pixel_space, to_ui_space};
pub use stroke::{MAX_STROKE_VERTICES, StrokeMesh, StrokeStyle, tessellate, tessellate_into};

/// 2D point. Pixel space or UI space depending on where it came from.
///
/// Serialises as `{"x": .., "y": ..}`, which is also the detection service's
/// wire format for centers and corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point2) -> f32 {
        (other - self).length()
    }
}

impl Add<Vector2> for Point2 {
    type Output = Point2;

    fn add(self, rhs: Vector2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Vector2;

    fn sub(self, rhs: Point2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Displacement or extent in UI units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction, or zero for a zero-length input.
    pub fn normalized(self) -> Vector2 {
        let len = self.length();
        if len > f32::EPSILON {
            Vector2::new(self.x / len, self.y / len)
        } else {
            Vector2::ZERO
        }
    }
}

impl Mul<f32> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f32) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

/// Width/height of a frame or destination rect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }

    /// True when both sides are finite and strictly positive.
    pub fn is_valid(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}
