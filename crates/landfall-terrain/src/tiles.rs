//! Tile meshes: per-cut vertex and index buffers in tile-local coordinates,
//! with skirts along the tile border and an LOD switch range.

use std::collections::HashMap;

use glam::{DQuat, DVec2, DVec3};
use landfall_core::constants::{
    LOD_OUT_HALF_DIAGONALS, SKIRT_DEPTH_FACTOR, SKIRT_EDGE_EPSILON, SKIRT_TILT_DEG,
};
use serde::{Deserialize, Serialize};

use crate::frames::VertexFrames;
use crate::grid::GridLayout;
use crate::mesh::TerrainMesh;

/// GPU-ready tile vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileVertex {
    /// Position relative to the tile center.
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub color: [f32; 4],
    /// World-normalized texture coordinates.
    pub uv: [f32; 2],
}

/// Distance range in which a tile is shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodRange {
    pub far: f64,
    pub near: f64,
}

/// Geometry of one cut within one tile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TileMesh {
    pub cut: u32,
    pub vertices: Vec<TileVertex>,
    pub indices: Vec<u32>,
    /// Index count of the surface proper; skirt triangles follow.
    pub surface_indices: usize,
}

impl TileMesh {
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn num_skirt_triangles(&self) -> usize {
        (self.indices.len() - self.surface_indices) / 3
    }
}

/// One tile with a mesh per cut present in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub it: usize,
    pub jt: usize,
    /// World position of the tile center.
    pub center: DVec2,
    pub lod: LodRange,
    pub meshes: Vec<TileMesh>,
}

impl Tile {
    pub fn mesh_for_cut(&self, cut: u32) -> Option<&TileMesh> {
        self.meshes.iter().find(|m| m.cut == cut)
    }
}

/// All tiles of a terrain, `it`-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TileSet {
    pub num_tiles_x: usize,
    pub num_tiles_y: usize,
    pub tiles: Vec<Tile>,
}

impl TileSet {
    pub fn tile(&self, it: usize, jt: usize) -> Option<&Tile> {
        if it >= self.num_tiles_x || jt >= self.num_tiles_y {
            return None;
        }
        self.tiles.get(it * self.num_tiles_y + jt)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// LOD switch placeholder for a tile of the given size.
pub fn lod_range(tile_size: DVec2) -> LodRange {
    LodRange {
        far: LOD_OUT_HALF_DIAGONALS * 0.5 * tile_size.length(),
        near: 0.0,
    }
}

/// Cut every tile out of the global mesh.
pub fn build_tiles(layout: &GridLayout, mesh: &TerrainMesh, frames: &[VertexFrames]) -> TileSet {
    let mut tiles = Vec::with_capacity(layout.num_tiles_x * layout.num_tiles_y);
    for it in 0..layout.num_tiles_x {
        for jt in 0..layout.num_tiles_y {
            tiles.push(build_tile(layout, mesh, frames, it, jt));
        }
    }
    let triangles: usize = tiles
        .iter()
        .flat_map(|t| &t.meshes)
        .map(TileMesh::num_triangles)
        .sum();
    tracing::debug!(tiles = tiles.len(), triangles, "tiles built");
    TileSet {
        num_tiles_x: layout.num_tiles_x,
        num_tiles_y: layout.num_tiles_y,
        tiles,
    }
}

/// Build tile `(it, jt)`. `frames` holds one entry per cut.
pub fn build_tile(
    layout: &GridLayout,
    mesh: &TerrainMesh,
    frames: &[VertexFrames],
    it: usize,
    jt: usize,
) -> Tile {
    let center = layout.tile_center(it, jt);
    let (qi, qj) = layout.tile_quads(it, jt);
    let mut by_cut: Vec<Vec<usize>> = vec![Vec::new(); frames.len()];
    for i in qi {
        for j in qj.clone() {
            for t in mesh.quad_triangles(layout.quad_index(i, j)) {
                by_cut[mesh.triangle_cut(t) as usize].push(t);
            }
        }
    }

    let bounds = TileBounds::new(layout, it, jt);
    let meshes = by_cut
        .iter()
        .enumerate()
        .filter(|(_, tris)| !tris.is_empty())
        .map(|(cut, tris)| {
            let builder = CutMeshBuilder {
                layout,
                mesh,
                frames: &frames[cut],
                center,
            };
            builder.build(cut as u32, tris, &bounds)
        })
        .collect();

    Tile {
        it,
        jt,
        center,
        lod: lod_range(layout.tile_size),
        meshes,
    }
}

/// World rectangle of a tile and the tolerance for "on the edge".
struct TileBounds {
    min: DVec2,
    max: DVec2,
    eps: f64,
}

impl TileBounds {
    fn new(layout: &GridLayout, it: usize, jt: usize) -> Self {
        let min = layout.offset + DVec2::new(it as f64, jt as f64) * layout.tile_size;
        let q = layout.quad_size();
        Self {
            min,
            max: min + layout.tile_size,
            eps: 0.5 * (q.x + q.y) * SKIRT_EDGE_EPSILON,
        }
    }

    /// Whether the segment `a`–`b` lies on one of the four tile edges.
    fn on_edge(&self, a: DVec2, b: DVec2) -> bool {
        let near = |u: f64, v: f64| (u - v).abs() <= self.eps;
        (near(a.x, self.min.x) && near(b.x, self.min.x))
            || (near(a.x, self.max.x) && near(b.x, self.max.x))
            || (near(a.y, self.min.y) && near(b.y, self.min.y))
            || (near(a.y, self.max.y) && near(b.y, self.max.y))
    }
}

struct CutMeshBuilder<'a> {
    layout: &'a GridLayout,
    mesh: &'a TerrainMesh,
    frames: &'a VertexFrames,
    center: DVec2,
}

impl CutMeshBuilder<'_> {
    fn vertex_at(&self, k: usize, p: DVec3) -> TileVertex {
        let n = self.frames.normal(k);
        let t = self.frames.tangent(k);
        let b = n.cross(t).normalize_or_zero();
        let uv = ((p.truncate() - self.layout.offset) / self.layout.size).clamp(DVec2::ZERO, DVec2::ONE);
        let local = p - self.center.extend(0.0);
        TileVertex {
            position: local.as_vec3().to_array(),
            normal: n.as_vec3().to_array(),
            tangent: t.as_vec3().to_array(),
            bitangent: b.as_vec3().to_array(),
            color: [1.0; 4],
            uv: uv.as_vec2().to_array(),
        }
    }

    fn build(&self, cut: u32, tris: &[usize], bounds: &TileBounds) -> TileMesh {
        let mut globals: Vec<usize> = tris.iter().flat_map(|&t| self.mesh.triangle(t)).collect();
        globals.sort_unstable();
        globals.dedup();
        let local: HashMap<usize, u32> = globals
            .iter()
            .enumerate()
            .map(|(l, &g)| (g, l as u32))
            .collect();

        let mut vertices: Vec<TileVertex> = globals
            .iter()
            .map(|&g| self.vertex_at(g, self.mesh.vertex(g)))
            .collect();
        let mut indices = Vec::with_capacity(tris.len() * 3);
        for &t in tris {
            indices.extend(self.mesh.triangle(t).map(|g| local[&g]));
        }
        let surface_indices = indices.len();

        let q = self.layout.quad_size();
        let depth = SKIRT_DEPTH_FACTOR * 0.5 * (q.x + q.y);
        let down = DVec3::new(0.0, 0.0, -depth);
        let tilt = SKIRT_TILT_DEG.to_radians();
        for &t in tris {
            let [a, b, c] = self.mesh.triangle(t);
            for (ga, gb) in [(a, b), (b, c), (c, a)] {
                let pa = self.mesh.vertex(ga);
                let pb = self.mesh.vertex(gb);
                if !bounds.on_edge(pa.truncate(), pb.truncate()) {
                    continue;
                }
                let Some(axis) = (pa - pb).try_normalize() else {
                    continue;
                };
                let incv = DQuat::from_axis_angle(axis, tilt) * down;
                let lta = local[&ga];
                let ltb = local[&gb];
                let ltc = vertices.len() as u32;
                vertices.push(self.vertex_at(ga, pa + incv));
                let ltd = vertices.len() as u32;
                vertices.push(self.vertex_at(gb, pb + incv));
                indices.extend([ltb, lta, ltc, ltb, ltc, ltd]);
            }
        }

        TileMesh {
            cut,
            vertices,
            indices,
            surface_indices,
        }
    }
}
