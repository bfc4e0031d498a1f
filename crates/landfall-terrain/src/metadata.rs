//! Heightmap sidecar metadata.
//!
//! A heightmap may ship with a TOML sidecar declaring the real-world
//! extents it covers, its elevation range and named flat regions:
//!
//! ```toml
//! [extents]
//! sizexs = 42.0     # km, southern edge (or `sizex` for a rectangle)
//! sizexn = 38.0     # km, northern edge
//! sizey = 40.0      # km
//! minz = -20.0      # m
//! maxz = 1450.0     # m
//! ming = 0          # optional, default 0
//! maxg = 255        # optional, default 255
//!
//! [flat-airfield]
//! centerx = 3.2     # km
//! centery = -1.5    # km
//! centerz = 12.0    # optional, m
//! radius = 0.8      # km
//! radiusout = 1.2   # optional, km
//! ```

use std::path::{Path, PathBuf};

use glam::DVec2;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::error::{TerrainError, TerrainResult};

/// Horizontal sidecar values are kilometres.
const KM: f64 = 1000.0;

/// Prefix of flat region section names.
const FLAT_PREFIX: &str = "flat-";

/// Named circular area forced to a fixed elevation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRegion {
    pub name: String,
    /// World center (meters).
    pub center: DVec2,
    /// Elevation inside the inner radius. Terrain height at the center when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_z: Option<f64>,
    /// Radius of the fully flat disc (meters).
    pub radius: f64,
    /// Radius where the blend back to natural terrain ends (meters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_out: Option<f64>,
}

impl FlatRegion {
    /// Outer blend radius, never below the inner radius.
    pub fn outer_radius(&self) -> f64 {
        self.radius_out.unwrap_or(self.radius).max(self.radius)
    }
}

/// Parsed sidecar contents.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightmapMetadata {
    /// Raster east-west width at its southern edge (meters).
    pub max_size_x_south: f64,
    /// Raster east-west width at its northern edge (meters).
    pub max_size_x_north: f64,
    /// Raster north-south height (meters).
    pub max_size_y: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub min_gray: f64,
    pub max_gray: f64,
    pub flats: Vec<FlatRegion>,
}

/// Sidecar path used when none is given explicitly: `<stem>.meta.toml`.
pub fn default_sidecar_path(heightmap: &Path) -> PathBuf {
    let stem = heightmap
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    heightmap.with_file_name(format!("{stem}.meta.toml"))
}

/// Load and parse a sidecar file.
pub fn load_metadata(path: &Path) -> TerrainResult<HeightmapMetadata> {
    let text = std::fs::read_to_string(path).map_err(|e| TerrainError::io(path, e))?;
    parse_metadata(&text, path)
}

/// Parse sidecar text. `path` is only used in error messages.
pub fn parse_metadata(text: &str, path: &Path) -> TerrainResult<HeightmapMetadata> {
    let doc: Table = text.parse().map_err(|source| TerrainError::Metadata {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = SectionReader { doc: &doc, path };

    let (max_size_x_south, max_size_x_north) = match reader.optional("extents", "sizex")? {
        Some(sx) => (sx * KM, sx * KM),
        None => (
            reader.required("extents", "sizexs")? * KM,
            reader.required("extents", "sizexn")? * KM,
        ),
    };
    let max_size_y = reader.required("extents", "sizey")? * KM;
    let min_height = reader.required("extents", "minz")?;
    let max_height = reader.required("extents", "maxz")?;
    let min_gray = reader.optional("extents", "ming")?.unwrap_or(0.0);
    let max_gray = reader.optional("extents", "maxg")?.unwrap_or(255.0);

    let mut flats = Vec::new();
    for section in doc.keys().filter(|k| k.starts_with(FLAT_PREFIX)) {
        let name = section[FLAT_PREFIX.len()..].to_string();
        let center = DVec2::new(
            reader.required(section, "centerx")? * KM,
            reader.required(section, "centery")? * KM,
        );
        let radius = reader.required(section, "radius")? * KM;
        flats.push(FlatRegion {
            name,
            center,
            center_z: reader.optional(section, "centerz")?,
            radius,
            radius_out: reader.optional(section, "radiusout")?.map(|r| r * KM),
        });
    }

    Ok(HeightmapMetadata {
        max_size_x_south,
        max_size_x_north,
        max_size_y,
        min_height,
        max_height,
        min_gray,
        max_gray,
        flats,
    })
}

struct SectionReader<'a> {
    doc: &'a Table,
    path: &'a Path,
}

impl SectionReader<'_> {
    fn optional(&self, section: &str, field: &str) -> TerrainResult<Option<f64>> {
        let Some(value) = self
            .doc
            .get(section)
            .and_then(Value::as_table)
            .and_then(|t| t.get(field))
        else {
            return Ok(None);
        };
        match value {
            Value::Float(f) => Ok(Some(*f)),
            Value::Integer(i) => Ok(Some(*i as f64)),
            other => Err(TerrainError::InvalidInput(format!(
                "{}: [{section}] {field} must be a number, got {}",
                self.path.display(),
                other.type_str()
            ))),
        }
    }

    fn required(&self, section: &str, field: &str) -> TerrainResult<f64> {
        self.optional(section, field)?
            .ok_or_else(|| TerrainError::MissingField {
                path: self.path.to_path_buf(),
                section: section.to_string(),
                field: field.to_string(),
            })
    }
}
