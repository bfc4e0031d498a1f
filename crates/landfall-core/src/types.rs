//! Fundamental terrain query types.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// Surface classification reported by height queries.
///
/// Each cut of a terrain maps to one ground type; virtual surfaces carry
/// their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundType {
    /// No classification assigned.
    #[default]
    Unknown,
    Runway,
    Dirt,
    Grass,
    Ice,
    Water,
}

impl GroundType {
    /// Default ground type for a cut index.
    pub fn default_for_cut(cut: usize) -> Self {
        match cut {
            0 => GroundType::Dirt,
            1 => GroundType::Water,
            _ => GroundType::Unknown,
        }
    }

    /// Whether wheeled vehicles can roll on this surface.
    pub fn is_landable(self) -> bool {
        matches!(
            self,
            GroundType::Runway | GroundType::Dirt | GroundType::Grass | GroundType::Ice
        )
    }
}

/// Result of a terrain height query at one horizontal position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoint {
    /// Surface height (meters).
    pub z: f64,
    /// Unit surface normal.
    pub normal: DVec3,
    pub ground: GroundType,
}

impl SurfacePoint {
    pub fn new(z: f64, normal: DVec3, ground: GroundType) -> Self {
        Self { z, normal, ground }
    }

    /// Horizontal surface at height `z`.
    pub fn level(z: f64, ground: GroundType) -> Self {
        Self {
            z,
            normal: DVec3::Z,
            ground,
        }
    }

    /// Slope angle from horizontal (radians).
    pub fn slope(&self) -> f64 {
        self.normal.z.clamp(-1.0, 1.0).acos()
    }
}

/// Axis-aligned horizontal world rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldExtents {
    pub min: DVec2,
    pub max: DVec2,
}

impl WorldExtents {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// Rectangle of the given size centered at the origin.
    pub fn centered(size_x: f64, size_y: f64) -> Self {
        let half = DVec2::new(size_x, size_y) * 0.5;
        Self {
            min: -half,
            max: half,
        }
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Smallest rectangle holding all points. None for an empty input.
    pub fn enclosing(points: impl IntoIterator<Item = DVec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }
}
