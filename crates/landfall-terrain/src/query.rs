//! Point location: which triangle of the mesh lies under a position.

use glam::{DVec2, DVec3};

use crate::grid::GridLayout;
use crate::mesh::TerrainMesh;

/// Best triangle found for a query position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub triangle: usize,
    /// Interpolated height.
    pub z: f64,
    /// Barycentric weights of the triangle's vertices.
    pub weights: DVec3,
    /// Zero when the point lies inside or on the triangle.
    pub penalty: f64,
}

/// Squared distance of each weight from [0, 1], summed.
pub fn outside_penalty(weights: DVec3) -> f64 {
    weights
        .to_array()
        .iter()
        .map(|&b| {
            if b < 0.0 {
                b * b
            } else if b > 1.0 {
                (b - 1.0) * (b - 1.0)
            } else {
                0.0
            }
        })
        .sum()
}

/// Barycentric weights of `p` in triangle `t`, or None if it is degenerate.
pub fn barycentric(mesh: &TerrainMesh, t: usize, p: DVec2) -> Option<DVec3> {
    let [a, b, c] = mesh.triangle(t);
    let v1 = mesh.vertex_xy(a);
    let v12 = mesh.vertex_xy(b) - v1;
    let v13 = mesh.vertex_xy(c) - v1;
    let v1p = p - v1;
    let d00 = v12.dot(v12);
    let d01 = v12.dot(v13);
    let d11 = v13.dot(v13);
    let d20 = v1p.dot(v12);
    let d21 = v1p.dot(v13);
    let den = d00 * d11 - d01 * d01;
    if den == 0.0 {
        return None;
    }
    let b2 = (d11 * d20 - d01 * d21) / den;
    let b3 = (d00 * d21 - d01 * d20) / den;
    Some(DVec3::new(1.0 - b2 - b3, b2, b3))
}

/// Find the triangle of `p`'s quad that contains it, or the one it lies
/// least outside of. None outside the grid.
pub fn locate(layout: &GridLayout, mesh: &TerrainMesh, p: DVec2) -> Option<TriangleHit> {
    let q = layout.quad_index_for_xy(p)?;
    let mut best: Option<TriangleHit> = None;
    for t in mesh.quad_triangles(q) {
        let hit = match barycentric(mesh, t, p) {
            Some(weights) => {
                let [a, b, c] = mesh.triangle(t);
                let z = weights.dot(DVec3::new(mesh.zs[a], mesh.zs[b], mesh.zs[c]));
                TriangleHit {
                    triangle: t,
                    z,
                    weights,
                    penalty: outside_penalty(weights),
                }
            }
            None => TriangleHit {
                triangle: t,
                z: mesh.zs[mesh.triangle(t)[0]],
                weights: DVec3::X,
                penalty: 1.0,
            },
        };
        if best.map_or(true, |b| hit.penalty < b.penalty) {
            best = Some(hit);
            if hit.penalty == 0.0 {
                break;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One quad split along its diagonal, corners at heights 0, 10, 20, 10.
    fn single_quad() -> (GridLayout, TerrainMesh) {
        let layout = GridLayout::with_quads(2.0, 2.0, 1, 1);
        let mut mesh = TerrainMesh::default();
        for (i, j, z) in [(0, 0, 0.0), (0, 1, 10.0), (1, 0, 10.0), (1, 1, 20.0)] {
            mesh.push_vertex(layout.corner_position(i, j).extend(z));
        }
        mesh.push_triangle([0, 2, 3], 0);
        mesh.push_triangle([0, 3, 1], 0);
        mesh.quadmap = vec![[0, 2]];
        mesh.compute_max_heights();
        (layout, mesh)
    }

    #[test]
    fn test_penalty_zero_inside() {
        assert_eq!(outside_penalty(DVec3::new(0.2, 0.3, 0.5)), 0.0);
        assert_eq!(outside_penalty(DVec3::new(0.0, 1.0, 0.0)), 0.0);
        let p = outside_penalty(DVec3::new(-0.1, 0.6, 0.5));
        assert!((p - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_locate_interpolates_plane() {
        let (layout, mesh) = single_quad();
        // Plane z = 5x + 5y + 10 over [-1, 1]².
        for p in [DVec2::new(0.3, -0.4), DVec2::new(-0.7, 0.6), DVec2::new(0.0, 0.0)] {
            let hit = locate(&layout, &mesh, p).unwrap();
            assert_eq!(hit.penalty, 0.0);
            let expected = 5.0 * p.x + 5.0 * p.y + 10.0;
            assert!((hit.z - expected).abs() < 1e-9, "height at {p}: {}", hit.z);
        }
    }

    #[test]
    fn test_locate_picks_containing_triangle() {
        let (layout, mesh) = single_quad();
        assert_eq!(locate(&layout, &mesh, DVec2::new(0.5, -0.5)).unwrap().triangle, 0);
        assert_eq!(locate(&layout, &mesh, DVec2::new(-0.5, 0.5)).unwrap().triangle, 1);
    }

    #[test]
    fn test_locate_outside_grid() {
        let (layout, mesh) = single_quad();
        assert!(locate(&layout, &mesh, DVec2::new(1.5, 0.0)).is_none());
        assert!(locate(&layout, &mesh, DVec2::new(0.0, -1.01)).is_none());
    }

    #[test]
    fn test_degenerate_triangle_is_penalized() {
        let (layout, mut mesh) = single_quad();
        // Collapse the first triangle onto a line.
        mesh.tri_b[0] = 0;
        let hit = locate(&layout, &mesh, DVec2::new(0.5, -0.5)).unwrap();
        assert_eq!(hit.triangle, 1, "degenerate triangle never beats a real one");
        assert!(hit.penalty > 0.0);
    }
}
