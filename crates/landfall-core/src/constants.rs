//! Algorithm constants and tuning parameters.

/// Version token mixed into every terrain cache key.
///
/// Bump whenever generated geometry would change for identical inputs.
pub const ALGORITHM_VERSION: u32 = 3;

// --- Grid & tiling ---

/// Desired world span of one tile (meters).
pub const TILE_SPAN: f64 = 20_000.0;

/// Tolerance when mapping world positions into unit raster space.
pub const SAMPLER_TOLERANCE: f64 = 1e-4;

/// Mask samples above this value claim the corner for the mask's cut.
pub const MASK_THRESHOLD: f64 = 0.5;

/// Gray level range of 8-bit rasters.
pub const GRAY_LEVELS: f64 = 255.0;

// --- Boundary curves ---

/// Curve points generated per interface quad (rounded up to even).
pub const CURVE_SUBDIVISION: usize = 2;

/// Blend fraction between the two anchors of a fresh curve point.
pub const CURVE_BLEND: f64 = 0.5;

/// Taubin shrink factor.
pub const TAUBIN_LAMBDA: f64 = 0.8;

/// Taubin inflate factor.
pub const TAUBIN_MU: f64 = -0.2;

/// Taubin iteration count.
pub const TAUBIN_ITERATIONS: usize = 10;

/// Smoothed points never move closer to an anchor than this fraction.
pub const CURVE_MIN_FRACTION: f64 = 0.05;

/// Smoothed points never move past this fraction towards the far anchor.
pub const CURVE_MAX_FRACTION: f64 = 0.95;

// --- Leveling ---

/// Probe reach along the boundary normal, in quad diagonals.
pub const LEVEL_PROBE_DIAGONALS: f64 = 2.0;

/// Probe step as a fraction of the full reach.
pub const LEVEL_PROBE_STEP: f64 = 0.11;

// --- Skirts ---

/// Skirt depth as a fraction of the mean quad size.
pub const SKIRT_DEPTH_FACTOR: f64 = 0.1;

/// Outward tilt of skirt strips (degrees).
pub const SKIRT_TILT_DEG: f64 = 10.0;

/// Edge detection tolerance as a fraction of the quad size.
pub const SKIRT_EDGE_EPSILON: f64 = 1e-5;

/// Tile LOD out-distance in tile half-diagonals.
pub const LOD_OUT_HALF_DIAGONALS: f64 = 4.0;

// --- Queries ---

/// Any point outside the grid is considered below the surface under this height.
pub const BELOW_GRID_FLOOR: f64 = -1000.0;

/// Initial value for running maximum heights.
pub const MAX_HEIGHT_FLOOR: f64 = -1e30;
