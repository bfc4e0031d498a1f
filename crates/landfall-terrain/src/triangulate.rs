//! Quad triangulation: plain quads by a checkerboard split, interface
//! quads by ear clipping the polygons on either side of the boundary curve.

use glam::DVec2;

use crate::chain::InterfaceChain;
use crate::curve::InterfaceCurve;
use crate::cutmap::CutMap;
use crate::error::{Side, TerrainError, TerrainResult};
use crate::grid::GridLayout;
use crate::mesh::TerrainMesh;
use crate::polygon::{signed_area, triangulate_ring};

/// Where one boundary curve's vertices live in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveSpan {
    pub first_vertex: usize,
    pub len: usize,
    pub closed: bool,
    pub dominant: u32,
    pub recessive: u32,
}

impl CurveSpan {
    pub fn vertices(&self) -> std::ops::Range<usize> {
        self.first_vertex..self.first_vertex + self.len
    }
}

/// Polygon of one side of the boundary inside an interface quad.
#[derive(Debug, Clone, PartialEq)]
pub struct SideRing {
    pub side: Side,
    pub cut: u32,
    /// Mesh vertex indices in counter-clockwise order.
    pub vertices: Vec<usize>,
    /// Vertex positions matching `vertices`.
    pub points: Vec<DVec2>,
}

/// Output of [`triangulate`].
#[derive(Debug, Clone)]
pub struct Triangulation {
    pub mesh: TerrainMesh,
    pub spans: Vec<CurveSpan>,
}

/// Build the global mesh with all vertex heights at zero.
///
/// Grid corners come first, then every curve's points. Plain quad
/// triangles come first in quad order, then interface triangles chain by
/// chain.
pub fn triangulate(
    layout: &GridLayout,
    map: &CutMap,
    chains: &[InterfaceChain],
    curves: &[InterfaceCurve],
    subdivision: usize,
) -> TerrainResult<Triangulation> {
    let (nqx, nqy) = (layout.num_quads_x, layout.num_quads_y);
    let mut mesh = TerrainMesh::default();

    for i in 0..=nqx {
        for j in 0..=nqy {
            mesh.push_vertex(layout.corner_position(i, j).extend(0.0));
        }
    }

    let mut spans = Vec::with_capacity(curves.len());
    for (chain, curve) in chains.iter().zip(curves) {
        let first_vertex = mesh.num_vertices();
        for p in &curve.points {
            mesh.push_vertex(p.pos.extend(0.0));
        }
        spans.push(CurveSpan {
            first_vertex,
            len: curve.points.len(),
            closed: curve.closed,
            dominant: chain.dominant,
            recessive: chain.recessive,
        });
    }

    let mut interface = vec![false; layout.num_quads()];
    for chain in chains {
        for link in &chain.links {
            interface[layout.quad_index(link.i, link.j)] = true;
        }
    }

    mesh.quadmap = vec![[0, 0]; layout.num_quads()];
    for i in 0..nqx {
        for j in 0..nqy {
            let q = layout.quad_index(i, j);
            if interface[q] {
                continue;
            }
            let start = mesh.num_triangles() as u32;
            let cut = map.get(i, j);
            let k1 = layout.corner_index(i, j);
            let k2 = layout.corner_index(i + 1, j);
            let k3 = layout.corner_index(i + 1, j + 1);
            let k4 = layout.corner_index(i, j + 1);
            if (i % 2 + j) % 2 == 1 {
                mesh.push_triangle([k1, k2, k3], cut);
                mesh.push_triangle([k1, k3, k4], cut);
            } else {
                mesh.push_triangle([k2, k3, k4], cut);
                mesh.push_triangle([k2, k4, k1], cut);
            }
            mesh.quadmap[q] = [start, mesh.num_triangles() as u32];
        }
    }

    for ((chain, curve), span) in chains.iter().zip(curves).zip(&spans) {
        for (kq, link) in chain.links.iter().enumerate() {
            let start = mesh.num_triangles() as u32;
            for ring in side_rings(layout, chain, curve, span, kq, subdivision)? {
                emit_ring(&mut mesh, &ring, link.i, link.j)?;
            }
            mesh.quadmap[layout.quad_index(link.i, link.j)] = [start, mesh.num_triangles() as u32];
        }
    }

    tracing::debug!(
        vertices = mesh.num_vertices(),
        triangles = mesh.num_triangles(),
        chains = chains.len(),
        "quads triangulated"
    );
    Ok(Triangulation { mesh, spans })
}

/// Dominant and recessive polygons of the `kq`-th quad of a chain.
///
/// Each ring is the quad's stretch of curve closed off by the quad corners
/// of its side, wound counter-clockwise.
pub fn side_rings(
    layout: &GridLayout,
    chain: &InterfaceChain,
    curve: &InterfaceCurve,
    span: &CurveSpan,
    kq: usize,
    subdivision: usize,
) -> TerrainResult<[SideRing; 2]> {
    let link = chain.links[kq];
    let n = curve.points.len();
    let kc = kq * subdivision;
    let kcm = kc + subdivision / 2;
    let kc2 = (kc + subdivision) % n;

    let along: Vec<usize> = (0..=subdivision).map(|lc| (kc + lc) % n).collect();

    let missing = |side| TerrainError::WindingViolation {
        i: link.i,
        j: link.j,
        side,
    };
    let dominant_corner = |k: usize| curve.points[k].corner_a.ok_or_else(|| missing(Side::Dominant));
    let recessive_corner = |k: usize| curve.points[k].corner_b.ok_or_else(|| missing(Side::Recessive));

    let (left, right) = match link.dominant_corners {
        1 => (
            vec![dominant_corner(kc)?],
            vec![recessive_corner(kc2)?, recessive_corner(kcm)?, recessive_corner(kc)?],
        ),
        2 => (
            vec![dominant_corner(kc2)?, dominant_corner(kc)?],
            vec![recessive_corner(kc2)?, recessive_corner(kc)?],
        ),
        _ => (
            vec![dominant_corner(kc2)?, dominant_corner(kcm)?, dominant_corner(kc)?],
            vec![recessive_corner(kc)?],
        ),
    };

    let assemble = |side: Side, cut: u32, corners: Vec<(usize, usize)>| {
        let mut vertices: Vec<usize> = along.iter().map(|&k| span.first_vertex + k).collect();
        let mut points: Vec<DVec2> = along.iter().map(|&k| curve.points[k].pos).collect();
        for (ci, cj) in corners {
            vertices.push(layout.corner_index(ci, cj));
            points.push(layout.corner_position(ci, cj));
        }
        if side == Side::Recessive {
            vertices.reverse();
            points.reverse();
        }
        SideRing {
            side,
            cut,
            vertices,
            points,
        }
    };

    Ok([
        assemble(Side::Dominant, chain.dominant, left),
        assemble(Side::Recessive, chain.recessive, right),
    ])
}

/// Check winding, clip ears and append the triangles of one side ring.
fn emit_ring(mesh: &mut TerrainMesh, ring: &SideRing, i: usize, j: usize) -> TerrainResult<()> {
    let n = ring.points.len();
    let mean = ring.points.iter().copied().sum::<DVec2>() / n as f64;
    let local: Vec<DVec2> = ring.points.iter().map(|&p| p - mean).collect();
    if signed_area(&local) <= 0.0 {
        return Err(TerrainError::WindingViolation {
            i,
            j,
            side: ring.side,
        });
    }
    let tris = triangulate_ring(&local);
    if tris.len() != n - 2 {
        return Err(TerrainError::TriangulationFailed {
            i,
            j,
            expected: n - 2,
            got: tris.len(),
        });
    }
    for [a, b, c] in tris {
        mesh.push_triangle(
            [ring.vertices[a], ring.vertices[b], ring.vertices[c]],
            ring.cut,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::extract_chains;
    use crate::curve::build_curves;
    use crate::params::SmoothingParams;
    use crate::polygon::is_self_intersecting;

    fn run(map: &CutMap) -> (GridLayout, Vec<InterfaceChain>, Vec<InterfaceCurve>, Triangulation) {
        let layout = GridLayout::with_quads(
            10.0 * map.num_quads_x() as f64,
            10.0 * map.num_quads_y() as f64,
            map.num_quads_x(),
            map.num_quads_y(),
        );
        let params = SmoothingParams::default();
        let chains = extract_chains(map).unwrap();
        let curves = build_curves(&layout, map, &chains, &params);
        let tri = triangulate(&layout, map, &chains, &curves, params.even_subdivision()).unwrap();
        (layout, chains, curves, tri)
    }

    fn island() -> CutMap {
        CutMap::from_fn(8, 8, |i, j| u32::from((2..=5).contains(&i) && (3..=5).contains(&j)))
    }

    #[test]
    fn test_flat_map_counts() {
        let (layout, chains, _, tri) = run(&CutMap::uniform(5, 4));
        assert!(chains.is_empty());
        assert_eq!(tri.mesh.num_vertices(), layout.num_corners());
        assert_eq!(tri.mesh.num_triangles(), 2 * 5 * 4);
        for q in 0..layout.num_quads() {
            assert_eq!(tri.mesh.quad_triangles(q).len(), 2, "quad {q} should split in two");
        }
    }

    #[test]
    fn test_plain_quads_are_ccw() {
        let (_, _, _, tri) = run(&CutMap::uniform(3, 3));
        for t in 0..tri.mesh.num_triangles() {
            assert!(tri.mesh.face_cross(t).z > 0.0, "triangle {t} winds clockwise");
        }
    }

    #[test]
    fn test_quadmap_partitions_triangles() {
        let (_, _, _, tri) = run(&island());
        let mut covered = vec![0u32; tri.mesh.num_triangles()];
        for q in 0..tri.mesh.num_quads() {
            for t in tri.mesh.quad_triangles(q) {
                covered[t] += 1;
            }
        }
        assert!(covered.iter().all(|&c| c == 1), "every triangle belongs to exactly one quad");
    }

    #[test]
    fn test_interface_rings_are_simple() {
        let map = island();
        let (layout, chains, curves, tri) = run(&map);
        assert_eq!(chains.len(), 1);
        for kq in 0..chains[0].links.len() {
            let rings = side_rings(&layout, &chains[0], &curves[0], &tri.spans[0], kq, 2).unwrap();
            for ring in &rings {
                assert!(signed_area(&ring.points) > 0.0, "ring {kq} {} is clockwise", ring.side);
                assert!(!is_self_intersecting(&ring.points), "ring {kq} {} crosses itself", ring.side);
            }
        }
    }

    #[test]
    fn test_interface_triangles_carry_side_cuts() {
        let map = island();
        let (layout, chains, _, tri) = run(&map);
        let chain = &chains[0];
        for link in &chain.links {
            let q = layout.quad_index(link.i, link.j);
            let cuts: Vec<u32> = tri.mesh.quad_triangles(q).map(|t| tri.mesh.triangle_cut(t)).collect();
            assert!(cuts.contains(&chain.dominant));
            assert!(cuts.contains(&chain.recessive));
        }
        let total: f64 = (0..tri.mesh.num_triangles())
            .map(|t| 0.5 * tri.mesh.face_cross(t).z)
            .sum();
        let expected = layout.size.x * layout.size.y;
        assert!((total - expected).abs() < 1e-6 * expected, "mesh area {total} vs {expected}");
    }

    #[test]
    fn test_curve_span_bookkeeping() {
        let (layout, _, curves, tri) = run(&island());
        let span = tri.spans[0];
        assert_eq!(span.first_vertex, layout.num_corners());
        assert_eq!(span.len, curves[0].points.len());
        assert!(span.closed);
        assert_eq!(tri.mesh.num_vertices(), span.vertices().end);
    }
}
