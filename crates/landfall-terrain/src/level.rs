//! Flatten heights along boundaries whose cut must be level.

use glam::DVec2;
use landfall_core::constants::{LEVEL_PROBE_DIAGONALS, LEVEL_PROBE_STEP};

use crate::grid::GridLayout;
use crate::mesh::TerrainMesh;
use crate::query::locate;
use crate::triangulate::CurveSpan;

/// Level every boundary that touches a level cut. Returns the number of
/// curve vertices moved.
pub fn level_boundaries(layout: &GridLayout, mesh: &mut TerrainMesh, spans: &[CurveSpan]) -> usize {
    let mut leveled = 0;
    for span in spans {
        let (cut, to_left) = if layout.is_level(span.dominant) {
            (span.dominant, true)
        } else if layout.is_level(span.recessive) {
            (span.recessive, false)
        } else {
            continue;
        };
        leveled += level_curve(layout, mesh, span, cut, to_left);
    }
    tracing::debug!(leveled, "boundary vertices leveled");
    leveled
}

/// Probe along the curve normal into `cut` and drop each curve vertex,
/// together with the probed triangles' vertices, to the lowest height seen.
fn level_curve(
    layout: &GridLayout,
    mesh: &mut TerrainMesh,
    span: &CurveSpan,
    cut: u32,
    to_left: bool,
) -> usize {
    let reach = LEVEL_PROBE_DIAGONALS * layout.quad_size().length();
    let step = LEVEL_PROBE_STEP * reach;
    let n = span.len;
    let mut moved = 0;
    let mut touched: Vec<usize> = Vec::new();

    for k in 0..n {
        if !span.closed && (k == 0 || k + 1 == n) {
            continue;
        }
        let l = span.first_vertex + k;
        let lm = span.first_vertex + if k > 0 { k - 1 } else { n - 1 };
        let lp = span.first_vertex + if k + 1 < n { k + 1 } else { 0 };
        let Some(normal) = vertex_normal(
            mesh.vertex_xy(lm),
            mesh.vertex_xy(l),
            mesh.vertex_xy(lp),
        ) else {
            continue;
        };
        let normal = if to_left { normal } else { -normal };
        let v = mesh.vertex_xy(l);

        touched.clear();
        let mut zmin: Option<f64> = None;
        let mut d = reach;
        while d > 0.0 {
            if let Some(hit) = locate(layout, mesh, v + normal * d) {
                if mesh.triangle_cut(hit.triangle) == cut {
                    touched.extend(mesh.triangle(hit.triangle));
                    zmin = Some(zmin.map_or(hit.z, |z| z.min(hit.z)));
                }
            }
            d -= step;
        }
        if let Some(z) = zmin {
            mesh.zs[l] = z;
            for &t in &touched {
                mesh.zs[t] = z;
            }
            moved += 1;
        }
    }
    moved
}

/// Left-hand normal at `v`, averaging the two adjacent segment normals
/// weighted by the opposite segment's length.
fn vertex_normal(vm: DVec2, v: DVec2, vp: DVec2) -> Option<DVec2> {
    let dm = v - vm;
    let dp = vp - v;
    let (lenm, lenp) = (dm.length(), dp.length());
    if lenm + lenp == 0.0 {
        return None;
    }
    let nm = dm.perp();
    let np = dp.perp();
    ((nm * lenp + np * lenm) / (lenm + lenp)).try_normalize()
}
