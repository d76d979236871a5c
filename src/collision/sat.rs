//! Oriented rectangle overlap using the Separating Axis Theorem.
//!
//! Every edge normal of both rectangles is a candidate axis. If the
//! projections of the two shapes are disjoint on any of them the shapes do
//! not touch; otherwise the axis with the smallest overlap gives the
//! minimum translation vector.

use crate::tiles::geometry::{tile_rect, Tile};
use bevy::math::{Rect, Vec2};

pub type Corners = [Vec2; 4];

/// A rectangle rotated about its center.
///
/// Angles are in degrees. With y growing down, positive angles turn the
/// rectangle clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRect {
    pub center: Vec2,
    pub half_extents: Vec2,
    pub angle_deg: f32,
}

impl OrientedRect {
    pub fn new(center: Vec2, half_extents: Vec2, angle_deg: f32) -> Self {
        Self {
            center,
            half_extents,
            angle_deg,
        }
    }

    pub fn from_rect(rect: Rect, angle_deg: f32) -> Self {
        Self::new(rect.center(), rect.half_size(), angle_deg)
    }

    pub fn corners(&self) -> Corners {
        const SIGNS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        let (sin, cos) = self.angle_deg.to_radians().sin_cos();
        SIGNS.map(|(sx, sy)| {
            let lx = sx * self.half_extents.x;
            let ly = sy * self.half_extents.y;
            self.center + Vec2::new(lx * cos - ly * sin, lx * sin + ly * cos)
        })
    }

    /// Unit normals of the four edges; zero-length edges give no axis
    pub fn axes(&self) -> Vec<Vec2> {
        edge_normals(&self.corners())
    }
}

fn edge_normals(corners: &Corners) -> Vec<Vec2> {
    (0..4)
        .filter_map(|i| {
            let edge = corners[(i + 1) % 4] - corners[i];
            Vec2::new(-edge.y, edge.x).try_normalize()
        })
        .collect()
}

fn project(corners: &Corners, axis: Vec2) -> (f32, f32) {
    corners.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), corner| {
        let dot = corner.dot(axis);
        (lo.min(dot), hi.max(dot))
    })
}

/// Outcome of an overlap test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatResult {
    pub intersects: bool,
    /// Overlap along `axis`; zero when the shapes are apart
    pub depth: f32,
    /// Axis of least overlap, pointing from the second shape towards the first
    pub axis: Option<Vec2>,
}

impl SatResult {
    pub const DISJOINT: SatResult = SatResult {
        intersects: false,
        depth: 0.0,
        axis: None,
    };

    /// Translation that moves the first shape out of the second
    pub fn resolution(&self) -> Vec2 {
        self.axis.map_or(Vec2::ZERO, |axis| axis * self.depth)
    }
}

/// Test two oriented rectangles for overlap.
///
/// Touching edges count as intersecting with zero depth. Ties between axes
/// keep the first axis found (edges of `a` before edges of `b`). When both
/// rectangles are degenerate there is nothing to test against and the
/// result is [`SatResult::DISJOINT`].
pub fn intersect(a: &OrientedRect, b: &OrientedRect) -> SatResult {
    let corners_a = a.corners();
    let corners_b = b.corners();

    let mut best: Option<(f32, Vec2)> = None;
    for axis in edge_normals(&corners_a).into_iter().chain(edge_normals(&corners_b)) {
        let (min_a, max_a) = project(&corners_a, axis);
        let (min_b, max_b) = project(&corners_b, axis);
        if !(min_a <= max_b && min_b <= max_a) {
            return SatResult::DISJOINT;
        }
        let overlap = max_a.min(max_b) - min_a.max(min_b);
        if best.map_or(true, |(depth, _)| overlap < depth) {
            best = Some((overlap, axis));
        }
    }

    let Some((depth, axis)) = best else {
        return SatResult::DISJOINT;
    };
    let axis = if (a.center - b.center).dot(axis) < 0.0 {
        -axis
    } else {
        axis
    };
    SatResult {
        intersects: true,
        depth,
        axis: Some(axis),
    }
}

/// Unrotated rectangle covering a tile's bounding box
pub fn tile_obb(tile: &Tile, tile_size: u32) -> OrientedRect {
    OrientedRect::from_rect(tile_rect(tile, tile_size), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::geometry::{Elevation, Orientation};
    use bevy::math::IVec2;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_far_apart_rects_are_disjoint() {
        let a = OrientedRect::new(Vec2::ZERO, Vec2::splat(5.0), 0.0);
        let b = OrientedRect::new(Vec2::new(100.0, 100.0), Vec2::splat(5.0), 0.0);
        let result = intersect(&a, &b);
        assert!(!result.intersects);
        assert_eq!(result.depth, 0.0);
        assert_eq!(result.axis, None);
        assert_eq!(result.resolution(), Vec2::ZERO);
    }

    #[test]
    fn test_identical_rects_pick_short_axis() {
        let a = OrientedRect::new(Vec2::ZERO, Vec2::new(10.0, 5.0), 0.0);
        let result = intersect(&a, &a);
        assert!(result.intersects);
        assert_eq!(result.depth, 10.0);
        let axis = result.axis.expect("axis");
        assert!(close(axis.x, 0.0));
        assert!(close(axis.y.abs(), 1.0));
    }

    #[test]
    fn test_rotated_corners_clockwise() {
        let rect = OrientedRect::new(Vec2::ZERO, Vec2::new(2.0, 1.0), 90.0);
        let corners = rect.corners();
        // Top-left corner (-2, -1) turns to (1, -2)
        assert!(close(corners[0].x, 1.0));
        assert!(close(corners[0].y, -2.0));
    }

    #[test]
    fn test_rotation_separates_overlapping_bounds() {
        let a = OrientedRect::new(Vec2::ZERO, Vec2::ONE, 0.0);
        // Axis-aligned bounds of the diamond overlap `a`, the diamond does not
        let b = OrientedRect::new(Vec2::new(2.2, 2.2), Vec2::ONE, 45.0);
        assert!(!intersect(&a, &b).intersects);
    }

    #[test]
    fn test_rotated_overlap_uses_diagonal_axis() {
        let a = OrientedRect::new(Vec2::ZERO, Vec2::ONE, 0.0);
        let b = OrientedRect::new(Vec2::new(1.5, 1.5), Vec2::ONE, 45.0);
        let result = intersect(&a, &b);
        assert!(result.intersects);

        let expected = 2.0_f32.sqrt() - (3.0 - 2.0_f32.sqrt()) / 2.0_f32.sqrt();
        assert!(close(result.depth, expected), "depth {}", result.depth);

        // Points from b back towards a
        let axis = result.axis.expect("axis");
        assert!(close(axis.x, -std::f32::consts::FRAC_1_SQRT_2));
        assert!(close(axis.y, -std::f32::consts::FRAC_1_SQRT_2));
    }

    #[test]
    fn test_resolution_pushes_apart() {
        let a = OrientedRect::new(Vec2::new(-4.0, 0.0), Vec2::splat(5.0), 0.0);
        let b = OrientedRect::new(Vec2::new(4.0, 0.0), Vec2::splat(5.0), 0.0);
        let result = intersect(&a, &b);
        assert!(result.intersects);
        assert_eq!(result.depth, 2.0);
        assert_eq!(result.resolution(), Vec2::new(-2.0, 0.0));
    }

    #[test]
    fn test_touching_edges_intersect_with_zero_depth() {
        let a = OrientedRect::new(Vec2::ZERO, Vec2::splat(1.0), 0.0);
        let b = OrientedRect::new(Vec2::new(2.0, 0.0), Vec2::splat(1.0), 0.0);
        let result = intersect(&a, &b);
        assert!(result.intersects);
        assert_eq!(result.depth, 0.0);
    }

    #[test]
    fn test_degenerate_rect_skips_axes() {
        let line = OrientedRect::new(Vec2::ZERO, Vec2::new(5.0, 0.0), 0.0);
        // Only the two non-zero edges produce an axis
        assert_eq!(line.axes().len(), 2);

        let point = OrientedRect::new(Vec2::ZERO, Vec2::ZERO, 0.0);
        assert!(point.axes().is_empty());
        assert_eq!(intersect(&point, &point), SatResult::DISJOINT);

        let box_ = OrientedRect::new(Vec2::ZERO, Vec2::splat(2.0), 30.0);
        assert!(intersect(&point, &box_).intersects);
    }

    #[test]
    fn test_tile_obb_matches_tile_rect() {
        let tile = Tile::ramp(IVec2::new(3, 4), 1, Orientation::RisingLeft, Elevation::Double);
        let obb = tile_obb(&tile, 16);
        assert_eq!(obb.center, Vec2::new(56.0, 64.0));
        assert_eq!(obb.half_extents, Vec2::new(8.0, 16.0));
        assert_eq!(obb.angle_deg, 0.0);
    }
}
