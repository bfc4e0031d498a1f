//! Terrain generation and runtime queries for LANDFALL.
//!
//! A grayscale heightmap and a set of cut masks (water, runway, ...)
//! become a tiled mesh whose cut boundaries follow smoothed curves:
//!
//! 1. [`cutmap`] rasterizes the masks onto the quad grid corners.
//! 2. [`chain`] traces chains of quads along each two-cut boundary.
//! 3. [`curve`] turns chains into smoothed curves bounded to their quads.
//! 4. [`triangulate`] splits plain and boundary quads into cut-tagged triangles.
//! 5. [`elevation`] and [`level`] assign vertex heights and flatten level boundaries.
//! 6. [`frames`] and [`tiles`] bake per-cut normals and tile buffers.
//!
//! [`cache`] persists the result keyed by a hash of every input, and
//! [`Terrain`] serves height queries with [`surface`] overrides on top.

pub use landfall_core as core;

pub mod cache;
pub mod chain;
pub mod curve;
pub mod cutmap;
pub mod elevation;
pub mod error;
pub mod frames;
pub mod grid;
pub mod level;
pub mod los;
pub mod mesh;
pub mod metadata;
pub mod params;
pub mod pipeline;
pub mod polygon;
pub mod projection;
pub mod query;
pub mod sampler;
pub mod surface;
pub mod terrain;
pub mod tiles;
pub mod triangulate;

// Re-export key types for convenience.
pub use cache::{CacheKey, TerrainCache};
pub use error::{TerrainError, TerrainResult};
pub use grid::GridLayout;
pub use los::has_line_of_sight;
pub use params::{CutSpec, GenerationInputs, GenerationParams, SmoothingParams};
pub use pipeline::{generate, GeneratedTerrain};
pub use sampler::{GridSampler, UnitGrid};
pub use surface::{HorizontalDisc, HorizontalPolygon, SurfaceId, VirtualSurface};
pub use terrain::Terrain;
