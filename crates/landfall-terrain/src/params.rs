//! Generation parameters and the raster inputs they reference.

use std::path::{Path, PathBuf};

use landfall_core::constants::{
    CURVE_BLEND, CURVE_SUBDIVISION, TAUBIN_ITERATIONS, TAUBIN_LAMBDA, TAUBIN_MU, TILE_SPAN,
};
use landfall_core::types::GroundType;
use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};
use crate::metadata::{default_sidecar_path, load_metadata, FlatRegion, HeightmapMetadata};
use crate::sampler::UnitGrid;

/// One masked terrain region. Cut 0 is the implicit base and has no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutSpec {
    pub name: String,
    /// Mask raster; samples above 0.5 belong to this cut.
    pub mask: PathBuf,
    /// Boundaries of this cut are leveled to a flat edge.
    #[serde(default = "default_true")]
    pub level: bool,
    /// Ground type reported by height queries. Defaults by cut index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground: Option<GroundType>,
}

/// Boundary curve synthesis and Taubin smoothing settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Curve points per interface quad (rounded up to even).
    pub subdivision: usize,
    /// Blend between the two anchors of a fresh curve point.
    pub blend: f64,
    pub lambda: f64,
    pub mu: f64,
    pub iterations: usize,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            subdivision: CURVE_SUBDIVISION,
            blend: CURVE_BLEND,
            lambda: TAUBIN_LAMBDA,
            mu: TAUBIN_MU,
            iterations: TAUBIN_ITERATIONS,
        }
    }
}

impl SmoothingParams {
    /// Subdivision rounded up to the next even count, at least 2.
    pub fn even_subdivision(&self) -> usize {
        let s = self.subdivision.max(2);
        s + s % 2
    }
}

/// Everything that determines a generated terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// World size east-west (meters).
    pub size_x: f64,
    /// World size north-south (meters).
    pub size_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heightmap: Option<PathBuf>,
    /// Sidecar metadata. Defaults to `<heightmap stem>.meta.toml` if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_x_south: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_x_north: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_gray: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gray: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<f64>,
    /// Quads per heightmap sample, squared.
    #[serde(default = "default_cell_density")]
    pub cell_density: f64,
    #[serde(default)]
    pub periodic: bool,
    /// Desired tile span (meters).
    #[serde(default = "default_tile_span")]
    pub tile_span: f64,
    /// Tile counts are kept multiples of these.
    #[serde(default = "default_divisor")]
    pub tile_divisor_x: usize,
    #[serde(default = "default_divisor")]
    pub tile_divisor_y: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cuts: Vec<CutSpec>,
    /// Flat regions added to (or replacing by name) the sidecar's.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flats: Vec<FlatRegion>,
    #[serde(default)]
    pub smoothing: SmoothingParams,
}

fn default_true() -> bool {
    true
}

fn default_cell_density() -> f64 {
    1.0
}

fn default_tile_span() -> f64 {
    TILE_SPAN
}

fn default_divisor() -> usize {
    1
}

impl GenerationParams {
    /// Flat terrain of the given size with defaults everywhere else.
    pub fn new(size_x: f64, size_y: f64) -> Self {
        Self {
            size_x,
            size_y,
            heightmap: None,
            metadata: None,
            max_size_x_south: None,
            max_size_x_north: None,
            max_size_y: None,
            center_x: None,
            center_y: None,
            min_gray: None,
            max_gray: None,
            min_height: None,
            max_height: None,
            cell_density: default_cell_density(),
            periodic: false,
            tile_span: TILE_SPAN,
            tile_divisor_x: 1,
            tile_divisor_y: 1,
            cuts: Vec::new(),
            flats: Vec::new(),
            smoothing: SmoothingParams::default(),
        }
    }

    /// Load parameters from a TOML file. Relative raster paths resolve
    /// against the file's directory.
    pub fn load(path: &Path) -> TerrainResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TerrainError::io(path, e))?;
        let mut params: Self = toml::from_str(&text).map_err(|source| TerrainError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(dir) = path.parent() {
            params.resolve_relative_to(dir);
        }
        Ok(params)
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        if let Some(p) = self.heightmap.as_mut() {
            fix(p);
        }
        if let Some(p) = self.metadata.as_mut() {
            fix(p);
        }
        for cut in &mut self.cuts {
            fix(&mut cut.mask);
        }
    }

    /// Reject parameters no terrain can be built from.
    pub fn validate(&self) -> TerrainResult<()> {
        if !(self.size_x > 0.0 && self.size_y > 0.0) {
            return Err(TerrainError::InvalidInput(format!(
                "terrain size must be positive, got {} x {}",
                self.size_x, self.size_y
            )));
        }
        if !(self.cell_density > 0.0) {
            return Err(TerrainError::InvalidInput(format!(
                "cell density must be positive, got {}",
                self.cell_density
            )));
        }
        if !(self.tile_span > 0.0) {
            return Err(TerrainError::InvalidInput(format!(
                "tile span must be positive, got {}",
                self.tile_span
            )));
        }
        let s = &self.smoothing;
        if !(s.blend > 0.0 && s.blend < 1.0) {
            return Err(TerrainError::InvalidInput(format!(
                "curve blend must lie strictly between 0 and 1, got {}",
                s.blend
            )));
        }
        Ok(())
    }

    /// Number of cuts including the base cut.
    pub fn num_cuts(&self) -> usize {
        self.cuts.len() + 1
    }

    /// Per-cut "must be level" flags; the base cut is never leveled.
    pub fn level_flags(&self) -> Vec<bool> {
        std::iter::once(false)
            .chain(self.cuts.iter().map(|c| c.level))
            .collect()
    }

    /// Ground types by cut index.
    pub fn ground_types(&self) -> Vec<GroundType> {
        (0..self.num_cuts())
            .map(|c| match c {
                0 => GroundType::default_for_cut(0),
                _ => self.cuts[c - 1]
                    .ground
                    .unwrap_or_else(|| GroundType::default_for_cut(c)),
            })
            .collect()
    }

    /// Sidecar path in effect: explicit, or the default one if it exists.
    pub fn sidecar_path(&self) -> Option<PathBuf> {
        if let Some(p) = &self.metadata {
            return Some(p.clone());
        }
        let candidate = default_sidecar_path(self.heightmap.as_ref()?);
        candidate.is_file().then_some(candidate)
    }

    /// Every file the generated terrain depends on, sorted.
    pub fn input_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .heightmap
            .iter()
            .cloned()
            .chain(self.sidecar_path())
            .chain(self.cuts.iter().map(|c| c.mask.clone()))
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

/// Rasters and metadata a generation run reads.
#[derive(Debug, Clone)]
pub struct GenerationInputs {
    pub heightmap: UnitGrid,
    pub metadata: Option<HeightmapMetadata>,
    /// One mask per non-base cut, in declaration order.
    pub masks: Vec<UnitGrid>,
}

impl GenerationInputs {
    /// Read every input file named by `params`.
    pub fn load(params: &GenerationParams) -> TerrainResult<Self> {
        let heightmap = match &params.heightmap {
            Some(path) => UnitGrid::open(path)?,
            None => UnitGrid::uniform(1, 1, 0.0),
        };
        let metadata = match params.sidecar_path() {
            Some(path) => Some(load_metadata(&path)?),
            None => None,
        };
        let masks = params
            .cuts
            .iter()
            .map(|c| UnitGrid::open(&c.mask))
            .collect::<TerrainResult<Vec<_>>>()?;
        Ok(Self {
            heightmap,
            metadata,
            masks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &str = r#"
size_x = 40000.0
size_y = 30000.0
heightmap = "hormuz.png"
cell_density = 4.0
tile_divisor_x = 2

[[cuts]]
name = "water"
mask = "masks/water.png"

[[cuts]]
name = "runway"
mask = "/abs/runway.png"
level = false
ground = "runway"

[[flats]]
name = "pad"
center = [100.0, -50.0]
radius = 30.0

[smoothing]
iterations = 4
"#;

    #[test]
    fn test_parse_toml_params() {
        let mut p: GenerationParams = toml::from_str(PARAMS).unwrap();
        p.resolve_relative_to(Path::new("/data/terrain"));

        assert_eq!(p.heightmap, Some(PathBuf::from("/data/terrain/hormuz.png")));
        assert_eq!(p.cuts[0].mask, PathBuf::from("/data/terrain/masks/water.png"));
        assert_eq!(p.cuts[1].mask, PathBuf::from("/abs/runway.png"));
        assert_eq!(p.tile_span, TILE_SPAN);
        assert_eq!(p.tile_divisor_x, 2);
        assert_eq!(p.tile_divisor_y, 1);
        assert_eq!(p.smoothing.iterations, 4);
        assert_eq!(p.smoothing.lambda, TAUBIN_LAMBDA, "unset fields keep defaults");
        assert_eq!(p.flats[0].radius_out, None);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_level_flags_and_ground_types() {
        let p: GenerationParams = toml::from_str(PARAMS).unwrap();
        assert_eq!(p.num_cuts(), 3);
        assert_eq!(p.level_flags(), vec![false, true, false]);
        assert_eq!(
            p.ground_types(),
            vec![GroundType::Dirt, GroundType::Water, GroundType::Runway]
        );
    }

    #[test]
    fn test_even_subdivision() {
        let mut s = SmoothingParams::default();
        for (given, even) in [(0, 2), (1, 2), (2, 2), (3, 4), (6, 6)] {
            s.subdivision = given;
            assert_eq!(s.even_subdivision(), even);
        }
    }

    #[test]
    fn test_validate_rejects_nonsense() {
        let mut p = GenerationParams::new(0.0, 100.0);
        assert!(p.validate().is_err());
        p.size_x = 100.0;
        assert!(p.validate().is_ok());
        p.smoothing.blend = 1.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_input_files_sorted() {
        let mut p = GenerationParams::new(10.0, 10.0);
        p.heightmap = Some(PathBuf::from("/z/height.png"));
        p.metadata = Some(PathBuf::from("/a/meta.toml"));
        p.cuts.push(CutSpec {
            name: "water".into(),
            mask: PathBuf::from("/m/water.png"),
            level: true,
            ground: None,
        });
        assert_eq!(
            p.input_files(),
            vec![
                PathBuf::from("/a/meta.toml"),
                PathBuf::from("/m/water.png"),
                PathBuf::from("/z/height.png"),
            ]
        );
    }
}
