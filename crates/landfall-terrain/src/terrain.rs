//! Terrain instance: the generated mesh plus everything runtime queries
//! need. Each instance owns its state; nothing is shared between them.

use glam::DVec2;
use landfall_core::constants::BELOW_GRID_FLOOR;
use landfall_core::types::{GroundType, SurfacePoint, WorldExtents};

use crate::cache::{CacheKey, TerrainCache};
use crate::error::TerrainResult;
use crate::grid::GridLayout;
use crate::mesh::TerrainMesh;
use crate::params::{GenerationInputs, GenerationParams};
use crate::pipeline::generate;
use crate::query::locate;
use crate::surface::{SurfaceId, SurfaceRegistry, VirtualSurface};
use crate::tiles::TileSet;

/// A loaded terrain.
#[derive(Debug)]
pub struct Terrain {
    name: String,
    layout: GridLayout,
    mesh: TerrainMesh,
    tiles: TileSet,
    ground_by_cut: Vec<GroundType>,
    surfaces: SurfaceRegistry,
}

impl Terrain {
    /// Load from the cache when it holds a result for exactly these
    /// inputs, otherwise generate and refresh the cache.
    pub fn load(name: &str, params: &GenerationParams, cache: Option<&TerrainCache>) -> TerrainResult<Self> {
        params.validate()?;
        let ground = params.ground_types();
        let Some(cache) = cache else {
            let inputs = GenerationInputs::load(params)?;
            return Self::generate(name, params, &inputs);
        };

        let key = CacheKey::compute(params)?;
        if let Some(hit) = cache.load(name, &key) {
            return Ok(Self::from_parts(name, hit.layout, hit.mesh, hit.tiles, ground));
        }

        let inputs = GenerationInputs::load(params)?;
        let terrain = Self::generate(name, params, &inputs)?;
        if let Err(e) = cache.store(name, &key, &terrain.layout, &terrain.mesh, &terrain.tiles) {
            tracing::warn!(name, error = %e, "could not write terrain cache");
        }
        Ok(terrain)
    }

    /// Run the pipeline on already loaded inputs.
    pub fn generate(name: &str, params: &GenerationParams, inputs: &GenerationInputs) -> TerrainResult<Self> {
        let generated = generate(params, inputs)?;
        Ok(Self::from_parts(
            name,
            generated.layout,
            generated.mesh,
            generated.tiles,
            params.ground_types(),
        ))
    }

    /// Assemble an instance from generated or restored parts.
    pub fn from_parts(
        name: &str,
        layout: GridLayout,
        mesh: TerrainMesh,
        tiles: TileSet,
        ground_by_cut: Vec<GroundType>,
    ) -> Self {
        Self {
            name: name.to_string(),
            layout,
            mesh,
            tiles,
            ground_by_cut,
            surfaces: SurfaceRegistry::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn mesh(&self) -> &TerrainMesh {
        &self.mesh
    }

    pub fn tiles(&self) -> &TileSet {
        &self.tiles
    }

    pub fn extents(&self) -> WorldExtents {
        self.layout.extents()
    }

    /// Height and ground type at `(x, y)`. None outside the grid.
    pub fn height(&self, x: f64, y: f64) -> Option<(f64, GroundType)> {
        self.height_with_normal(x, y).map(|s| (s.z, s.ground))
    }

    /// Height, face normal and ground type at `(x, y)`, virtual surfaces
    /// included. None outside the grid.
    pub fn height_with_normal(&self, x: f64, y: f64) -> Option<SurfacePoint> {
        let p = DVec2::new(x, y);
        let q = self.layout.quad_index_for_xy(p)?;
        let hit = locate(&self.layout, &self.mesh, p)?;
        let cut = self.mesh.triangle_cut(hit.triangle);
        let terrain = SurfacePoint::new(hit.z, self.mesh.face_normal(hit.triangle), self.ground_type_for_cut(cut));
        Some(self.surfaces.resolve(q, p, terrain))
    }

    /// Whether `(x, y, z)` lies under the surface. Cheap bound checks run
    /// before the full query.
    pub fn below_surface(&self, x: f64, y: f64, z: f64) -> bool {
        if z >= self.mesh.max_z {
            return false;
        }
        match self.layout.quad_index_for_xy(DVec2::new(x, y)) {
            Some(q) => z < self.mesh.quad_max_z[q] && self.height(x, y).is_some_and(|(h, _)| z < h),
            None => z < BELOW_GRID_FLOOR,
        }
    }

    /// Upper bound of every height the terrain can report.
    pub fn max_height(&self) -> f64 {
        self.mesh.max_z
    }

    /// Upper bound of heights within quad `q`.
    pub fn quad_max_height(&self, q: usize) -> Option<f64> {
        self.mesh.quad_max_z.get(q).copied()
    }

    pub fn set_ground_type_for_cut(&mut self, cut: u32, ground: GroundType) {
        let c = cut as usize;
        while self.ground_by_cut.len() <= c {
            let next = self.ground_by_cut.len();
            self.ground_by_cut.push(GroundType::default_for_cut(next));
        }
        self.ground_by_cut[c] = ground;
    }

    pub fn ground_type_for_cut(&self, cut: u32) -> GroundType {
        self.ground_by_cut
            .get(cut as usize)
            .copied()
            .unwrap_or_else(|| GroundType::default_for_cut(cut as usize))
    }

    /// Add a height override. Non-flush surfaces raise the height bounds
    /// of the quads they cover.
    pub fn register_virtual_surface(&mut self, surface: impl VirtualSurface + 'static) -> SurfaceId {
        let flush = surface.flush();
        let top = surface.max_height();
        let id = self.surfaces.register(&self.layout, Box::new(surface));
        if !flush {
            self.mesh.max_z = self.mesh.max_z.max(top);
            for &q in self.surfaces.quads(id) {
                self.mesh.quad_max_z[q] = self.mesh.quad_max_z[q].max(top);
            }
        }
        id
    }

    /// Remove a height override. Height bounds stay as they are.
    pub fn unregister_virtual_surface(&mut self, id: SurfaceId) -> bool {
        self.surfaces.unregister(id).is_some()
    }

    pub fn num_virtual_surfaces(&self) -> usize {
        self.surfaces.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{HorizontalDisc, HorizontalPolygon};
    use crate::sampler::UnitGrid;
    use glam::DVec3;

    /// 1 km square rising 100 m from west to east.
    fn slope() -> Terrain {
        let mut params = GenerationParams::new(1000.0, 1000.0);
        params.min_height = Some(0.0);
        params.max_height = Some(100.0);
        let inputs = GenerationInputs {
            heightmap: UnitGrid::from_fn(8, 8, |u, _| u),
            metadata: None,
            masks: Vec::new(),
        };
        Terrain::generate("slope", &params, &inputs).unwrap()
    }

    #[test]
    fn test_height_inside_and_outside() {
        let t = slope();
        let (z, ground) = t.height(0.0, 0.0).unwrap();
        assert!((z - 50.0).abs() < 1.0, "mid height {z}");
        assert_eq!(ground, GroundType::Dirt);
        assert!(t.height(600.0, 0.0).is_none());
    }

    #[test]
    fn test_normal_leans_downhill() {
        let t = slope();
        let s = t.height_with_normal(100.0, 100.0).unwrap();
        assert!(s.normal.x < 0.0 && s.normal.z > 0.0, "normal {}", s.normal);
        assert!((s.normal.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_below_surface() {
        let t = slope();
        let (z, _) = t.height(0.0, 0.0).unwrap();
        assert!(t.below_surface(0.0, 0.0, z - 1.0));
        assert!(!t.below_surface(0.0, 0.0, z + 1.0));
        assert!(!t.below_surface(0.0, 0.0, t.max_height() + 1.0));
        assert!(t.below_surface(5000.0, 0.0, -2000.0));
        assert!(!t.below_surface(5000.0, 0.0, -10.0));
    }

    #[test]
    fn test_surface_raises_bounds() {
        let mut t = slope();
        let before = t.max_height();
        let q = t.layout().quad_index_for_xy(DVec2::ZERO).unwrap();
        let id = t.register_virtual_surface(HorizontalDisc::new(DVec2::ZERO, 10.0, 500.0, GroundType::Runway));
        assert_eq!(t.max_height(), 500.0);
        assert_eq!(t.quad_max_height(q), Some(500.0));
        assert!(t.below_surface(0.0, 0.0, 400.0), "under the deck");

        assert!(t.unregister_virtual_surface(id));
        assert!(!t.unregister_virtual_surface(id));
        assert_eq!(t.max_height(), 500.0, "bounds stay conservative");
        assert!(before < 500.0);
        assert!(!t.below_surface(0.0, 0.0, 400.0));
    }

    #[test]
    fn test_flush_surface_keeps_bounds() {
        let mut t = slope();
        let before = t.max_height();
        let deck = HorizontalPolygon::new(
            vec![DVec2::new(-5.0, -5.0), DVec2::new(5.0, -5.0), DVec2::new(0.0, 5.0)],
            300.0,
            GroundType::Runway,
        )
        .with_flush(true);
        t.register_virtual_surface(deck);
        assert_eq!(t.max_height(), before);
        let s = t.height_with_normal(0.0, 0.0).unwrap();
        assert_eq!(s.z, 300.0);
        assert_eq!(s.normal, DVec3::Z);
        assert_eq!(t.num_virtual_surfaces(), 1);
    }

    #[test]
    fn test_ground_type_override() {
        let mut t = slope();
        assert_eq!(t.ground_type_for_cut(1), GroundType::Water);
        t.set_ground_type_for_cut(0, GroundType::Grass);
        assert_eq!(t.height(0.0, 0.0).unwrap().1, GroundType::Grass);
    }
}
