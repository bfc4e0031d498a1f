//! Cut map: one cut label per grid corner, rasterized from cut masks.

use landfall_core::constants::{MASK_THRESHOLD, SAMPLER_TOLERANCE};

use crate::grid::GridLayout;
use crate::sampler::GridSampler;

/// Corner offsets of a quad in counter-clockwise order from south-west.
pub const QUAD_CORNERS: [(usize, usize); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];

/// Cut labels over the `(num_quads_x + 1) × (num_quads_y + 1)` corners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutMap {
    num_quads_x: usize,
    num_quads_y: usize,
    labels: Vec<u32>,
}

impl CutMap {
    /// Every corner in the base cut.
    pub fn uniform(num_quads_x: usize, num_quads_y: usize) -> Self {
        Self {
            num_quads_x,
            num_quads_y,
            labels: vec![0; (num_quads_x + 1) * (num_quads_y + 1)],
        }
    }

    /// Build from a label function over corner coordinates.
    pub fn from_fn(num_quads_x: usize, num_quads_y: usize, f: impl Fn(usize, usize) -> u32) -> Self {
        let mut map = Self::uniform(num_quads_x, num_quads_y);
        for i in 0..=num_quads_x {
            for j in 0..=num_quads_y {
                map.set(i, j, f(i, j));
            }
        }
        map
    }

    /// Rasterize masks onto the grid corners and repair thin diagonals.
    ///
    /// Mask `k` labels a corner `k + 1` where it samples above the
    /// threshold; later masks win.
    pub fn build<S: GridSampler>(layout: &GridLayout, masks: &[S], periodic: bool) -> Self {
        let mut map = Self::uniform(layout.num_quads_x, layout.num_quads_y);
        if masks.is_empty() {
            return map;
        }
        for i in 0..=layout.num_quads_x {
            for j in 0..=layout.num_quads_y {
                let uv = layout.to_unit(layout.corner_position(i, j));
                for (k, mask) in masks.iter().enumerate() {
                    if mask.sample(uv.x, uv.y, SAMPLER_TOLERANCE, periodic) > MASK_THRESHOLD {
                        map.set(i, j, k as u32 + 1);
                    }
                }
            }
        }
        let flips = map.repair_thin_diagonals();
        tracing::debug!(flips, "cut map rasterized");
        map
    }

    pub fn num_quads_x(&self) -> usize {
        self.num_quads_x
    }

    pub fn num_quads_y(&self) -> usize {
        self.num_quads_y
    }

    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.labels[i * (self.num_quads_y + 1) + j]
    }

    pub fn set(&mut self, i: usize, j: usize, label: u32) {
        self.labels[i * (self.num_quads_y + 1) + j] = label;
    }

    /// Labels of quad `(i, j)` in [`QUAD_CORNERS`] order.
    pub fn quad_labels(&self, i: usize, j: usize) -> [u32; 4] {
        QUAD_CORNERS.map(|(di, dj)| self.get(i + di, j + dj))
    }

    /// Distinct labels of quad `(i, j)`, ascending.
    pub fn distinct_labels(&self, i: usize, j: usize) -> Vec<u32> {
        let mut labels = self.quad_labels(i, j).to_vec();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Whether corner `(i, j)` lies on the grid boundary.
    pub fn is_boundary_corner(&self, i: usize, j: usize) -> bool {
        i == 0 || j == 0 || i == self.num_quads_x || j == self.num_quads_y
    }

    /// Resolve quads whose diagonal corners pair up into two labels by
    /// raising one corner to the higher label. Returns the number of flips.
    pub fn repair_thin_diagonals(&mut self) -> usize {
        let mut flips = 0;
        loop {
            let mut changed = false;
            for i in 0..self.num_quads_x {
                for j in 0..self.num_quads_y {
                    let [c1, c2, c3, c4] = self.quad_labels(i, j);
                    if c1 == c3 && c2 == c4 && c1 != c2 {
                        if c1 > c2 {
                            self.set(i, j + 1, c1);
                        } else {
                            self.set(i, j, c2);
                        }
                        changed = true;
                        flips += 1;
                    }
                }
            }
            if !changed {
                return flips;
            }
        }
    }
}
