//! Trapezoid projection: maps world positions into unit raster space.
//!
//! A heightmap may cover a larger area than the generated terrain, and its
//! east-west width may vary linearly from the southern to the northern edge.
//! The terrain rectangle sits inside that trapezoid at a given center.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// World-to-unit mapping for heightmaps and cut masks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrapezoidProjection {
    /// Terrain size (meters).
    pub size: DVec2,
    /// World position of the terrain's south-west corner.
    pub offset: DVec2,
    /// Raster east-west width at its southern edge (meters).
    pub max_size_x_south: f64,
    /// Raster east-west width at its northern edge (meters).
    pub max_size_x_north: f64,
    /// Raster north-south height (meters).
    pub max_size_y: f64,
    /// Terrain center relative to the raster center (meters).
    pub center: DVec2,
}

impl TrapezoidProjection {
    /// Raster covering exactly the terrain rectangle centered at the origin.
    pub fn covering(size_x: f64, size_y: f64) -> Self {
        Self {
            size: DVec2::new(size_x, size_y),
            offset: DVec2::new(-size_x * 0.5, -size_y * 0.5),
            max_size_x_south: size_x,
            max_size_x_north: size_x,
            max_size_y: size_y,
            center: DVec2::ZERO,
        }
    }

    /// Mean raster east-west width.
    pub fn mean_max_size_x(&self) -> f64 {
        0.5 * (self.max_size_x_south + self.max_size_x_north)
    }

    /// Raster width at normalized north-south coordinate `v`.
    fn width_at(&self, v: f64) -> f64 {
        self.max_size_x_south + (self.max_size_x_north - self.max_size_x_south) * v
    }

    /// Convert a world position to normalized raster coordinates.
    pub fn to_unit(&self, p: DVec2) -> DVec2 {
        let x1 = (p.x - self.offset.x) + self.center.x;
        let y1 = (p.y - self.offset.y) + self.center.y;
        let v = y1 / self.max_size_y + 0.5 * (1.0 - self.size.y / self.max_size_y);
        let w = self.width_at(v);
        let u = x1 / w + 0.5 * (1.0 - self.size.x / w);
        DVec2::new(u, v)
    }

    /// Convert normalized raster coordinates back to a world position.
    pub fn to_world(&self, uv: DVec2) -> DVec2 {
        let y1 = (uv.y - 0.5 * (1.0 - self.size.y / self.max_size_y)) * self.max_size_y;
        let w = self.width_at(uv.y);
        let x1 = (uv.x - 0.5 * (1.0 - self.size.x / w)) * w;
        DVec2::new(
            x1 - self.center.x + self.offset.x,
            y1 - self.center.y + self.offset.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covering_maps_corners() {
        let proj = TrapezoidProjection::covering(1000.0, 500.0);
        let sw = proj.to_unit(DVec2::new(-500.0, -250.0));
        assert!(sw.abs_diff_eq(DVec2::ZERO, 1e-12), "south-west → (0,0), got {sw}");
        let ne = proj.to_unit(DVec2::new(500.0, 250.0));
        assert!(ne.abs_diff_eq(DVec2::ONE, 1e-12), "north-east → (1,1), got {ne}");
        let c = proj.to_unit(DVec2::ZERO);
        assert!(c.abs_diff_eq(DVec2::splat(0.5), 1e-12));
    }

    #[test]
    fn test_subregion_of_larger_raster() {
        // Terrain is a quarter of the raster width, shifted east.
        let mut proj = TrapezoidProjection::covering(1000.0, 1000.0);
        proj.max_size_x_south = 4000.0;
        proj.max_size_x_north = 4000.0;
        proj.max_size_y = 1000.0;
        proj.center = DVec2::new(1000.0, 0.0);
        let c = proj.to_unit(DVec2::ZERO);
        // Raster center is u = 0.5; 1000 m east of it is u = 0.75.
        assert!((c.x - 0.75).abs() < 1e-12, "got {}", c.x);
        assert!((c.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_trapezoid_narrows_north() {
        let mut proj = TrapezoidProjection::covering(1000.0, 1000.0);
        proj.max_size_x_south = 2000.0;
        proj.max_size_x_north = 1000.0;
        let east = DVec2::new(500.0, 0.0);
        let south = proj.to_unit(DVec2::new(east.x, -500.0));
        let north = proj.to_unit(DVec2::new(east.x, 500.0));
        assert!(north.x > south.x, "same easting is further east in a narrower row");
        assert!((north.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse() {
        let proj = TrapezoidProjection {
            size: DVec2::new(800.0, 600.0),
            offset: DVec2::new(-400.0, -300.0),
            max_size_x_south: 1500.0,
            max_size_x_north: 1100.0,
            max_size_y: 900.0,
            center: DVec2::new(30.0, -20.0),
        };
        for p in [DVec2::new(-400.0, -300.0), DVec2::new(123.0, 45.0), DVec2::new(399.0, 299.0)] {
            let back = proj.to_world(proj.to_unit(p));
            assert!(back.abs_diff_eq(p, 1e-9), "{p} → {back}");
        }
    }
}
