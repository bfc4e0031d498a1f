//! GridLayout: quad grid geometry and tiling (the persisted cell data).

use std::ops::Range;

use glam::DVec2;
use landfall_core::types::WorldExtents;
use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};
use crate::params::{GenerationInputs, GenerationParams};
use crate::projection::TrapezoidProjection;
use crate::sampler::GridSampler;

/// Quad grid, tile partition and raster mapping of one terrain.
///
/// Corners are indexed `i * (num_quads_y + 1) + j` and quads
/// `i * num_quads_y + j`, with `i` running west to east and `j` south
/// to north.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    /// World size (meters).
    pub size: DVec2,
    /// World position of the south-west grid corner.
    pub offset: DVec2,
    pub num_quads_x: usize,
    pub num_quads_y: usize,
    pub num_tiles_x: usize,
    pub num_tiles_y: usize,
    /// Quads along one tile edge.
    pub tile_quads_x: usize,
    pub tile_quads_y: usize,
    pub tile_size: DVec2,
    /// Number of cuts including the base cut.
    pub num_cuts: usize,
    /// Per-cut "must be level" flags.
    pub level_cuts: Vec<bool>,
    pub projection: TrapezoidProjection,
    /// Heightmap samples spanning the terrain along each axis.
    pub heightmap_resolution: DVec2,
}

/// Tile count for `size`, a positive multiple of `divisor`.
pub fn tile_count(size: f64, span: f64, divisor: usize) -> usize {
    let divisor = divisor.max(1);
    let n = (size / span - 0.5) as i64 + 1;
    let n = (n.max(0) as usize / divisor) * divisor;
    n.max(divisor)
}

/// Quads per tile and tile size along one axis.
fn cell_axis(size: f64, samples: f64, num_tiles: usize, cell_density: f64) -> (usize, f64) {
    let tile_size = size / num_tiles as f64;
    let quad_size = (size / samples) / cell_density.sqrt();
    let tile_quads = (tile_size / quad_size - 1e-9).ceil().max(1.0) as usize;
    (tile_quads, tile_size)
}

impl GridLayout {
    /// Derive the layout from parameters, sidecar metadata and raster size.
    pub fn derive(params: &GenerationParams, inputs: &GenerationInputs) -> TerrainResult<Self> {
        params.validate()?;
        if inputs.masks.len() != params.cuts.len() {
            return Err(TerrainError::InvalidInput(format!(
                "{} cuts declared but {} masks supplied",
                params.cuts.len(),
                inputs.masks.len()
            )));
        }

        let md = inputs.metadata.as_ref();
        let size = DVec2::new(params.size_x, params.size_y);
        let offset = -0.5 * size;
        let projection = TrapezoidProjection {
            size,
            offset,
            max_size_x_south: params
                .max_size_x_south
                .or(md.map(|m| m.max_size_x_south))
                .unwrap_or(size.x),
            max_size_x_north: params
                .max_size_x_north
                .or(params.max_size_x_south)
                .or(md.map(|m| m.max_size_x_north))
                .unwrap_or(size.x),
            max_size_y: params.max_size_y.or(md.map(|m| m.max_size_y)).unwrap_or(size.y),
            center: DVec2::new(
                params.center_x.unwrap_or(0.0),
                params.center_y.unwrap_or(0.0),
            ),
        };

        let (nx, ny) = inputs.heightmap.resolution();
        let heightmap_resolution = DVec2::new(
            nx as f64 * (size.x / projection.mean_max_size_x()),
            ny as f64 * (size.y / projection.max_size_y),
        );

        let num_tiles_x = tile_count(size.x, params.tile_span, params.tile_divisor_x);
        let num_tiles_y = tile_count(size.y, params.tile_span, params.tile_divisor_y);
        let (tile_quads_x, tsx) =
            cell_axis(size.x, heightmap_resolution.x, num_tiles_x, params.cell_density);
        let (tile_quads_y, tsy) =
            cell_axis(size.y, heightmap_resolution.y, num_tiles_y, params.cell_density);

        Ok(Self {
            size,
            offset,
            num_quads_x: num_tiles_x * tile_quads_x,
            num_quads_y: num_tiles_y * tile_quads_y,
            num_tiles_x,
            num_tiles_y,
            tile_quads_x,
            tile_quads_y,
            tile_size: DVec2::new(tsx, tsy),
            num_cuts: params.num_cuts(),
            level_cuts: params.level_flags(),
            projection,
            heightmap_resolution,
        })
    }

    /// Single-tile layout with an explicit quad count, centered at the origin.
    pub fn with_quads(size_x: f64, size_y: f64, num_quads_x: usize, num_quads_y: usize) -> Self {
        let size = DVec2::new(size_x, size_y);
        Self {
            size,
            offset: -0.5 * size,
            num_quads_x,
            num_quads_y,
            num_tiles_x: 1,
            num_tiles_y: 1,
            tile_quads_x: num_quads_x,
            tile_quads_y: num_quads_y,
            tile_size: size,
            num_cuts: 1,
            level_cuts: vec![false],
            projection: TrapezoidProjection::covering(size_x, size_y),
            heightmap_resolution: DVec2::new(num_quads_x as f64, num_quads_y as f64),
        }
    }

    /// Register extra cuts on a hand-built layout.
    pub fn with_cuts(mut self, level_cuts: Vec<bool>) -> Self {
        self.num_cuts = level_cuts.len();
        self.level_cuts = level_cuts;
        self
    }

    pub fn quad_size(&self) -> DVec2 {
        DVec2::new(
            self.size.x / self.num_quads_x as f64,
            self.size.y / self.num_quads_y as f64,
        )
    }

    pub fn num_quads(&self) -> usize {
        self.num_quads_x * self.num_quads_y
    }

    pub fn num_corners(&self) -> usize {
        (self.num_quads_x + 1) * (self.num_quads_y + 1)
    }

    pub fn corner_index(&self, i: usize, j: usize) -> usize {
        i * (self.num_quads_y + 1) + j
    }

    pub fn quad_index(&self, i: usize, j: usize) -> usize {
        i * self.num_quads_y + j
    }

    /// Inverse of [`GridLayout::quad_index`].
    pub fn quad_coords(&self, q: usize) -> (usize, usize) {
        (q / self.num_quads_y, q % self.num_quads_y)
    }

    pub fn corner_position(&self, i: usize, j: usize) -> DVec2 {
        self.offset + DVec2::new(i as f64, j as f64) * self.quad_size()
    }

    pub fn is_level(&self, cut: u32) -> bool {
        self.level_cuts.get(cut as usize).copied().unwrap_or(false)
    }

    pub fn extents(&self) -> WorldExtents {
        WorldExtents::new(self.offset, self.offset + self.size)
    }

    /// Fractional quad coordinates of a world position.
    fn quad_coords_f(&self, p: DVec2) -> DVec2 {
        (p - self.offset) / self.quad_size()
    }

    /// Quad containing `p`, or None outside the grid.
    ///
    /// The northern and eastern grid edges belong to the last quad row/column.
    pub fn quad_index_for_xy(&self, p: DVec2) -> Option<usize> {
        let f = self.quad_coords_f(p);
        let i = Self::axis_cell(f.x, self.num_quads_x)?;
        let j = Self::axis_cell(f.y, self.num_quads_y)?;
        Some(self.quad_index(i, j))
    }

    fn axis_cell(f: f64, n: usize) -> Option<usize> {
        const EDGE_TOLERANCE: f64 = 1e-9;
        if !(f >= 0.0) || f > n as f64 + EDGE_TOLERANCE {
            return None;
        }
        Some((f.floor() as usize).min(n - 1))
    }

    /// Quad index ranges overlapped by a world rectangle, clipped to the grid.
    pub fn quad_span(&self, ext: &WorldExtents) -> Option<(Range<usize>, Range<usize>)> {
        let lo = self.quad_coords_f(ext.min);
        let hi = self.quad_coords_f(ext.max);
        let span = |a: f64, b: f64, n: usize| -> Option<Range<usize>> {
            if b < 0.0 || a > n as f64 {
                return None;
            }
            let start = (a.floor().max(0.0) as usize).min(n - 1);
            let end = (b.floor().max(0.0) as usize).min(n - 1) + 1;
            Some(start..end)
        };
        Some((
            span(lo.x, hi.x, self.num_quads_x)?,
            span(lo.y, hi.y, self.num_quads_y)?,
        ))
    }

    /// Quad ranges of tile `(it, jt)`.
    pub fn tile_quads(&self, it: usize, jt: usize) -> (Range<usize>, Range<usize>) {
        let i0 = it * self.tile_quads_x;
        let j0 = jt * self.tile_quads_y;
        (i0..i0 + self.tile_quads_x, j0..j0 + self.tile_quads_y)
    }

    /// World center of tile `(it, jt)`.
    pub fn tile_center(&self, it: usize, jt: usize) -> DVec2 {
        self.offset + (DVec2::new(it as f64, jt as f64) + 0.5) * self.tile_size
    }

    /// Normalized raster coordinates of a world position.
    pub fn to_unit(&self, p: DVec2) -> DVec2 {
        self.projection.to_unit(p)
    }
}
