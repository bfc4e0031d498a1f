//! Line-of-sight checks against the terrain surface.
//!
//! Steps along the straight ray and compares its height with the terrain
//! height query, with Earth curvature and standard refraction (4/3 Earth
//! radius model) lowering the ground away from the endpoints.

use glam::DVec3;

use crate::terrain::Terrain;

/// Effective Earth radius with standard atmospheric refraction.
const EFFECTIVE_EARTH_RADIUS: f64 = 6_371_000.0 * 4.0 / 3.0;

/// Ray samples per quad edge length.
const SAMPLES_PER_QUAD: f64 = 2.0;

/// Whether the straight segment from `from` to `to` clears the terrain.
///
/// Virtual surfaces count as obstacles. Points outside the grid never block.
pub fn has_line_of_sight(terrain: &Terrain, from: DVec3, to: DVec3) -> bool {
    let delta = to - from;
    let horiz_dist = delta.truncate().length();
    let q = terrain.layout().quad_size();
    let interval = q.x.min(q.y) / SAMPLES_PER_QUAD;

    if horiz_dist < interval {
        return true;
    }

    let num_samples = ((horiz_dist / interval).ceil() as usize).max(2);
    for i in 1..num_samples {
        let t = i as f64 / num_samples as f64;
        let sample = from + delta * t;

        let earth_drop = (horiz_dist * t) * (horiz_dist * (1.0 - t)) / (2.0 * EFFECTIVE_EARTH_RADIUS);
        let Some((ground, _)) = terrain.height(sample.x, sample.y) else {
            continue;
        };
        if ground - earth_drop > sample.z {
            return false;
        }
    }
    true
}
