//! Global terrain mesh in structure-of-arrays layout.

use std::ops::Range;

use glam::{DVec2, DVec3};
use landfall_core::constants::MAX_HEIGHT_FLOOR;

/// Vertices, cut-tagged triangles and the per-quad triangle ranges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TerrainMesh {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub zs: Vec<f64>,
    pub tri_a: Vec<u32>,
    pub tri_b: Vec<u32>,
    pub tri_c: Vec<u32>,
    pub tri_cut: Vec<u32>,
    /// Half-open triangle range `[start, end)` of every quad.
    pub quadmap: Vec<[u32; 2]>,
    /// Highest vertex of each quad's triangles.
    pub quad_max_z: Vec<f64>,
    pub max_z: f64,
}

impl TerrainMesh {
    pub fn num_vertices(&self) -> usize {
        self.xs.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.tri_cut.len()
    }

    pub fn num_quads(&self) -> usize {
        self.quadmap.len()
    }

    pub fn push_vertex(&mut self, p: DVec3) -> usize {
        self.xs.push(p.x);
        self.ys.push(p.y);
        self.zs.push(p.z);
        self.xs.len() - 1
    }

    pub fn push_triangle(&mut self, v: [usize; 3], cut: u32) {
        self.tri_a.push(v[0] as u32);
        self.tri_b.push(v[1] as u32);
        self.tri_c.push(v[2] as u32);
        self.tri_cut.push(cut);
    }

    pub fn vertex(&self, k: usize) -> DVec3 {
        DVec3::new(self.xs[k], self.ys[k], self.zs[k])
    }

    pub fn vertex_xy(&self, k: usize) -> DVec2 {
        DVec2::new(self.xs[k], self.ys[k])
    }

    pub fn triangle(&self, t: usize) -> [usize; 3] {
        [
            self.tri_a[t] as usize,
            self.tri_b[t] as usize,
            self.tri_c[t] as usize,
        ]
    }

    pub fn triangle_cut(&self, t: usize) -> u32 {
        self.tri_cut[t]
    }

    pub fn quad_triangles(&self, q: usize) -> Range<usize> {
        let [start, end] = self.quadmap[q];
        start as usize..end as usize
    }

    /// Unnormalized face normal `(v2 - v1) × (v3 - v1)`.
    pub fn face_cross(&self, t: usize) -> DVec3 {
        let [a, b, c] = self.triangle(t);
        let v1 = self.vertex(a);
        (self.vertex(b) - v1).cross(self.vertex(c) - v1)
    }

    /// Unit face normal; straight up for degenerate triangles.
    pub fn face_normal(&self, t: usize) -> DVec3 {
        self.face_cross(t).try_normalize().unwrap_or(DVec3::Z)
    }

    /// Recompute per-quad and global maximum heights from vertex heights.
    pub fn compute_max_heights(&mut self) {
        let mut quad_max_z = Vec::with_capacity(self.quadmap.len());
        let mut max_z = MAX_HEIGHT_FLOOR;
        for q in 0..self.quadmap.len() {
            let mut qmax = MAX_HEIGHT_FLOOR;
            for t in self.quad_triangles(q) {
                for v in self.triangle(t) {
                    qmax = qmax.max(self.zs[v]);
                }
            }
            max_z = max_z.max(qmax);
            quad_max_z.push(qmax);
        }
        self.quad_max_z = quad_max_z;
        self.max_z = max_z;
    }
}
