//! Stamped-circle outline tessellation.
//!
//! Each segment of the loop is walked in `spacing` steps and a filled circle
//! fan is emitted at every step. The result is a beaded stroke: no miter or
//! join logic, sharp corners just overlap. Vertex count is capped per mesh.

use crate::{Point2, Vector2};

/// Default vertex cap for a single mesh.
pub const MAX_STROKE_VERTICES: usize = 60_000;

const MIN_RADIUS: f32 = 0.1;
const MIN_SPACING: f32 = 0.1;
const MIN_SEGMENTS: u32 = 3;

/// Appearance and budget of an outline stroke.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeStyle {
    /// Stroke width in UI units; circles have radius `thickness / 2`.
    pub thickness: f32,
    /// Distance between consecutive circle centers along a segment.
    pub spacing: f32,
    /// Boundary vertices per circle.
    pub segments: u32,
    /// RGBA color applied to every vertex.
    pub color: [u8; 4],
    /// Hard cap on the number of vertices in a mesh.
    pub max_vertices: usize,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            thickness: 5.0,
            spacing: 5.0,
            segments: 12,
            color: [0, 255, 0, 255],
            max_vertices: MAX_STROKE_VERTICES,
        }
    }
}

impl StrokeStyle {
    fn radius(&self) -> f32 {
        (self.thickness / 2.0).max(MIN_RADIUS)
    }

    fn step(&self) -> f32 {
        self.spacing.max(MIN_SPACING)
    }

    fn segments(&self) -> u32 {
        self.segments.max(MIN_SEGMENTS)
    }

    /// Vertices used by one stamped circle: boundary plus center.
    pub fn vertices_per_stamp(&self) -> usize {
        self.segments() as usize + 1
    }
}

/// Triangle mesh of a stroke in UI space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrokeMesh {
    pub positions: Vec<Point2>,
    pub colors: Vec<[u8; 4]>,
    pub triangles: Vec<[u32; 3]>,
    /// Set when emission stopped early because of the vertex cap.
    pub truncated: bool,
}

impl StrokeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.triangles.clear();
        self.truncated = false;
    }

    /// Iterate triangles as resolved vertex positions.
    pub fn triangle_positions(&self) -> impl Iterator<Item = [Point2; 3]> + '_ {
        self.triangles.iter().map(|tri| {
            [
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            ]
        })
    }

    fn push_circle(&mut self, center: Point2, radius: f32, segments: u32, color: [u8; 4]) {
        let base = self.positions.len() as u32;
        self.positions.push(center);
        self.colors.push(color);

        let angle_step = std::f32::consts::TAU / segments as f32;
        for i in 0..segments {
            let angle = i as f32 * angle_step;
            let offset = Vector2::new(angle.cos(), angle.sin()) * radius;
            self.positions.push(center + offset);
            self.colors.push(color);
        }
        for i in 0..segments {
            let current = base + 1 + i;
            let next = base + 1 + (i + 1) % segments;
            self.triangles.push([base, current, next]);
        }
    }
}

/// Tessellate a closed loop into a fresh mesh.
///
/// Loops with fewer than two points produce an empty mesh.
pub fn tessellate(closed_loop: &[Point2], style: &StrokeStyle) -> StrokeMesh {
    let mut mesh = StrokeMesh::new();
    tessellate_into(&mut mesh, closed_loop, style);
    mesh
}

/// Append the stroke for `closed_loop` to `mesh`, sharing its vertex budget.
///
/// Returns `false` once the budget stopped emission; the mesh keeps whatever
/// was built up to that point.
pub fn tessellate_into(mesh: &mut StrokeMesh, closed_loop: &[Point2], style: &StrokeStyle) -> bool {
    if closed_loop.len() < 2 || mesh.truncated {
        return !mesh.truncated;
    }

    let radius = style.radius();
    let step = style.step();
    let segments = style.segments();
    let per_stamp = style.vertices_per_stamp();

    for pair in closed_loop.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let distance = start.distance(end);
        let direction = (end - start).normalized();

        let mut index: usize = 0;
        loop {
            let travelled = index as f32 * step;
            if travelled >= distance {
                break;
            }
            if mesh.vertex_count() + per_stamp > style.max_vertices {
                mesh.truncated = true;
                return false;
            }
            mesh.push_circle(start + direction * travelled, radius, segments, style.color);
            index = match index.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f32) -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
            Point2::new(0.0, 0.0),
        ]
    }

    #[test]
    fn huge_segment_stops_at_the_budget() {
        let style = StrokeStyle {
            max_vertices: 1300,
            ..StrokeStyle::default()
        };
        let far = [Point2::new(0.0, 0.0), Point2::new(1.0e12, 0.0)];
        let mut mesh = StrokeMesh::new();

        assert!(!tessellate_into(&mut mesh, &far, &style));
        assert!(mesh.truncated);
        assert_eq!(mesh.vertex_count(), 1300);
        assert!(mesh.positions.iter().all(|p| p.x.is_finite() && p.x < 600.0));
    }

    #[test]
    fn short_loops_produce_nothing() {
        let style = StrokeStyle::default();
        assert!(tessellate(&[], &style).is_empty());
        assert!(tessellate(&[Point2::new(3.0, 4.0)], &style).is_empty());
    }

    #[test]
    fn square_emits_fans_at_every_step() {
        let style = StrokeStyle {
            thickness: 2.0,
            spacing: 5.0,
            segments: 8,
            ..StrokeStyle::default()
        };
        let mesh = tessellate(&square(10.0), &style);

        // two stamps per side (at 0 and 5), four sides
        let stamps = 8;
        assert_eq!(mesh.vertex_count(), stamps * 9);
        assert_eq!(mesh.triangles.len(), stamps * 8);
        assert_eq!(mesh.colors.len(), mesh.vertex_count());
        assert!(!mesh.truncated);

        let max_index = mesh.vertex_count() as u32;
        assert!(mesh.triangles.iter().flatten().all(|&idx| idx < max_index));
    }

    #[test]
    fn boundary_vertices_sit_on_the_radius() {
        let style = StrokeStyle {
            thickness: 6.0,
            segments: 16,
            ..StrokeStyle::default()
        };
        let mesh = tessellate(&[Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)], &style);
        let center = mesh.positions[0];
        for vertex in &mesh.positions[1..17] {
            assert!((center.distance(*vertex) - 3.0).abs() < 1e-4);
        }
    }

    #[test]
    fn vertex_budget_is_never_exceeded() {
        let style = StrokeStyle {
            spacing: 0.5,
            max_vertices: 500,
            ..StrokeStyle::default()
        };
        let mesh = tessellate(&square(200.0), &style);
        assert!(mesh.vertex_count() <= 500);
        assert!(mesh.truncated);
        assert_eq!(mesh.vertex_count() % style.vertices_per_stamp(), 0);
    }

    #[test]
    fn appended_loops_share_one_budget() {
        let style = StrokeStyle {
            spacing: 1.0,
            max_vertices: 3_000,
            ..StrokeStyle::default()
        };
        let mut mesh = StrokeMesh::new();
        let mut completed = 0;
        for _ in 0..10 {
            if tessellate_into(&mut mesh, &square(20.0), &style) {
                completed += 1;
            }
        }
        // 80 stamps of 13 vertices per square
        assert_eq!(completed, 2);
        assert!(mesh.truncated);
        assert!(mesh.vertex_count() <= 3_000);
    }

    #[test]
    fn degenerate_style_values_are_floored() {
        let style = StrokeStyle {
            thickness: 0.0,
            spacing: 0.0,
            segments: 1,
            ..StrokeStyle::default()
        };
        let mesh = tessellate(&[Point2::new(0.0, 0.0), Point2::new(0.25, 0.0)], &style);
        // spacing floors to 0.1 and segments to 3: stamps at 0.0, 0.1, 0.2
        assert_eq!(mesh.vertex_count(), 3 * 4);
        assert_eq!(mesh.triangles.len(), 3 * 3);
    }

    #[test]
    fn coincident_points_emit_no_stamps() {
        let p = Point2::new(4.0, 4.0);
        let mesh = tessellate(&[p, p, p], &StrokeStyle::default());
        assert!(mesh.is_empty());
    }
}
