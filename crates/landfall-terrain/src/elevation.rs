//! Vertex elevation from the heightmap and flat override regions.

use glam::DVec2;
use landfall_core::constants::{GRAY_LEVELS, SAMPLER_TOLERANCE};

use crate::grid::GridLayout;
use crate::metadata::{FlatRegion, HeightmapMetadata};
use crate::mesh::TerrainMesh;
use crate::params::GenerationParams;
use crate::sampler::GridSampler;

/// Linear map from normalized gray to meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightScale {
    pub min_gray: f64,
    pub max_gray: f64,
    pub min_height: f64,
    pub max_height: f64,
}

impl Default for HeightScale {
    fn default() -> Self {
        Self {
            min_gray: 0.0,
            max_gray: GRAY_LEVELS,
            min_height: 0.0,
            max_height: 0.0,
        }
    }
}

impl HeightScale {
    /// Resolve the scale: explicit parameters, then sidecar, then defaults.
    ///
    /// When only one height bound is known the other takes the same value.
    pub fn resolve(params: &GenerationParams, meta: Option<&HeightmapMetadata>) -> Self {
        let pick = |explicit: Option<f64>, sidecar: Option<f64>| explicit.or(sidecar);
        let min_gray = pick(params.min_gray, meta.map(|m| m.min_gray)).unwrap_or(0.0);
        let max_gray = pick(params.max_gray, meta.map(|m| m.max_gray)).unwrap_or(GRAY_LEVELS);
        let min_height = pick(params.min_height, meta.map(|m| m.min_height));
        let max_height = pick(params.max_height, meta.map(|m| m.max_height));
        let (min_height, max_height) = match (min_height, max_height) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(z), None) | (None, Some(z)) => (z, z),
            (None, None) => (0.0, 0.0),
        };
        Self {
            min_gray,
            max_gray,
            min_height,
            max_height,
        }
    }

    /// Height of a normalized sample. A zero gray range maps everything to
    /// `min_height`.
    pub fn apply(&self, g: f64) -> f64 {
        let range = (self.max_gray - self.min_gray) / GRAY_LEVELS;
        let scale = if range == 0.0 {
            0.0
        } else {
            (self.max_height - self.min_height) / range
        };
        self.min_height + (g - self.min_gray / GRAY_LEVELS) * scale
    }
}

/// Sidecar flats, with parameter flats replacing same-named ones.
pub fn merge_flats(params: &GenerationParams, meta: Option<&HeightmapMetadata>) -> Vec<FlatRegion> {
    let mut flats: Vec<FlatRegion> = meta.map(|m| m.flats.clone()).unwrap_or_default();
    for flat in &params.flats {
        match flats.iter_mut().find(|f| f.name == flat.name) {
            Some(existing) => *existing = flat.clone(),
            None => flats.push(flat.clone()),
        }
    }
    flats
}

/// Elevation function over world positions.
pub struct HeightField<'a, S: GridSampler> {
    layout: &'a GridLayout,
    heightmap: &'a S,
    scale: HeightScale,
    periodic: bool,
    /// Flats with their center height resolved.
    flats: Vec<(FlatRegion, f64)>,
}

impl<'a, S: GridSampler> HeightField<'a, S> {
    pub fn new(
        layout: &'a GridLayout,
        heightmap: &'a S,
        scale: HeightScale,
        periodic: bool,
        flats: Vec<FlatRegion>,
    ) -> Self {
        let mut field = Self {
            layout,
            heightmap,
            scale,
            periodic,
            flats: Vec::with_capacity(flats.len()),
        };
        field.flats = flats
            .into_iter()
            .map(|f| {
                let cz = f.center_z.unwrap_or_else(|| field.natural(f.center));
                (f, cz)
            })
            .collect();
        field
    }

    /// Heightmap elevation before flats.
    pub fn natural(&self, p: DVec2) -> f64 {
        let uv = self.layout.to_unit(p);
        let g = self
            .heightmap
            .sample(uv.x, uv.y, SAMPLER_TOLERANCE, self.periodic);
        self.scale.apply(g)
    }

    /// Elevation with the first flat containing `p` applied.
    pub fn height(&self, p: DVec2) -> f64 {
        let natural = self.natural(p);
        for (flat, cz) in &self.flats {
            let d = p.distance(flat.center);
            let outer = flat.outer_radius();
            if d <= flat.radius {
                return *cz;
            }
            if d < outer {
                let t = (d - flat.radius) / (outer - flat.radius);
                return cz * (1.0 - t) + natural * t;
            }
        }
        natural
    }
}

/// Set every mesh vertex height from the field.
pub fn assign_heights<S: GridSampler>(mesh: &mut TerrainMesh, field: &HeightField<'_, S>) {
    for k in 0..mesh.num_vertices() {
        mesh.zs[k] = field.height(mesh.vertex_xy(k));
    }
}
