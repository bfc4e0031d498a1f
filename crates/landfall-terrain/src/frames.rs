//! Per-vertex normals and tangents, one pass per cut.
//!
//! Boundary vertices are shared by both sides of an interface, so each cut
//! gets its own frame set. A pass over cut `c` takes the triangles of `c`
//! plus, when neither side must be level, the triangles of other cuts, so
//! unleveled boundaries shade smoothly across the seam.

use glam::DVec3;

use crate::grid::GridLayout;
use crate::mesh::TerrainMesh;

/// Unit normal and tangent per mesh vertex for one cut.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexFrames {
    pub normals: Vec<DVec3>,
    pub tangents: Vec<DVec3>,
}

impl VertexFrames {
    pub fn normal(&self, k: usize) -> DVec3 {
        self.normals[k]
    }

    pub fn tangent(&self, k: usize) -> DVec3 {
        self.tangents[k]
    }
}

/// Whether triangle `t` contributes to the frames of `cut`.
fn contributes(layout: &GridLayout, mesh: &TerrainMesh, t: usize, cut: u32) -> bool {
    let tcut = mesh.triangle_cut(t);
    tcut == cut || !(layout.is_level(cut) || layout.is_level(tcut))
}

/// Area-weighted accumulation of face normals and steepest-ascent
/// tangents. Vertices no contributing triangle touches stay zero.
pub fn compute_frames(layout: &GridLayout, mesh: &TerrainMesh, cut: u32) -> VertexFrames {
    let nv = mesh.num_vertices();
    let mut normals = vec![DVec3::ZERO; nv];
    let mut tangents = vec![DVec3::ZERO; nv];

    for t in 0..mesh.num_triangles() {
        if !contributes(layout, mesh, t, cut) {
            continue;
        }
        let cross = mesh.face_cross(t);
        let Some(n) = cross.try_normalize() else {
            continue;
        };
        let area = 0.5 * cross.length();
        let tangent = n.cross(DVec3::X).cross(n).try_normalize().unwrap_or(DVec3::ZERO);
        for v in mesh.triangle(t) {
            normals[v] += n * area;
            tangents[v] += tangent * area;
        }
    }

    for v in normals.iter_mut().chain(tangents.iter_mut()) {
        if let Some(u) = v.try_normalize() {
            *v = u;
        }
    }
    VertexFrames { normals, tangents }
}

/// Frames for every cut, indexed by cut.
pub fn compute_all_frames(layout: &GridLayout, mesh: &TerrainMesh) -> Vec<VertexFrames> {
    (0..layout.num_cuts as u32)
        .map(|cut| compute_frames(layout, mesh, cut))
        .collect()
}
