//! Raster sampling over the unit square.
//!
//! Heightmaps and cut masks are scalar fields in [0,1] addressed by
//! normalized coordinates: u grows west to east, v grows south to north.

use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};

use crate::error::{TerrainError, TerrainResult};

/// Bilinear lookup over a scalar field in the unit square.
pub trait GridSampler {
    /// Sample the field at normalized `(u, v)`.
    ///
    /// Non-periodic samplers accept coordinates up to `tolerance` outside
    /// the unit square (clamped to the edge) and return 0 beyond that.
    /// Periodic samplers wrap.
    fn sample(&self, u: f64, v: f64, tolerance: f64, periodic: bool) -> f64;

    /// Number of samples along u and v.
    fn resolution(&self) -> (usize, usize);
}

/// In-memory raster normalized to [0,1], stored south row first.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitGrid {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl UnitGrid {
    /// Build from row-major values, row 0 at the southern edge.
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> TerrainResult<Self> {
        if width == 0 || height == 0 {
            return Err(TerrainError::InvalidInput(format!(
                "raster must not be empty ({width}x{height})"
            )));
        }
        if values.len() != width * height {
            return Err(TerrainError::InvalidInput(format!(
                "raster of {width}x{height} needs {} values, got {}",
                width * height,
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Raster with every sample set to `value`.
    pub fn uniform(width: usize, height: usize, value: f64) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            values: vec![value.clamp(0.0, 1.0) as f32; width * height],
        }
    }

    /// Raster filled by evaluating `f(u, v)` at every pixel center.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(f64, f64) -> f64) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut values = Vec::with_capacity(width * height);
        for j in 0..height {
            let v = (j as f64 + 0.5) / height as f64;
            for i in 0..width {
                let u = (i as f64 + 0.5) / width as f64;
                values.push(f(u, v).clamp(0.0, 1.0) as f32);
            }
        }
        Self {
            width,
            height,
            values,
        }
    }

    /// Load an image file as luminance.
    pub fn open(path: &Path) -> TerrainResult<Self> {
        let img = image::open(path).map_err(|source| TerrainError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(img))
    }

    /// Convert a decoded image. The top image row is the northern edge.
    pub fn from_image(img: DynamicImage) -> Self {
        let luma = img.into_luma16();
        let (w, h) = luma.dimensions();
        let (width, height) = (w as usize, h as usize);
        let mut values = vec![0.0f32; width * height];
        for (x, y, px) in luma.enumerate_pixels() {
            let j = height - 1 - y as usize;
            values[j * width + x as usize] = px.0[0] as f32 / u16::MAX as f32;
        }
        Self {
            width,
            height,
            values,
        }
    }

    /// 8-bit grayscale image, top row north.
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let j = self.height - 1 - y as usize;
            let v = self.values[j * self.width + x as usize];
            Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }

    /// Raw value at integer raster coordinates (south row 0).
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.values[j * self.width + i] as f64
    }

    /// Map a normalized coordinate to a pixel-center offset along one axis.
    /// Returns None when a non-periodic coordinate is out of tolerance.
    fn axis(t: f64, n: usize, tolerance: f64, periodic: bool) -> Option<(usize, usize, f64)> {
        let t = if periodic {
            t - t.floor()
        } else if (-tolerance..=1.0 + tolerance).contains(&t) {
            t.clamp(0.0, 1.0)
        } else {
            return None;
        };
        let f = t * n as f64 - 0.5;
        let k0 = f.floor();
        let frac = f - k0;
        let k0 = k0 as i64;
        let (a, b) = if periodic {
            let n = n as i64;
            (k0.rem_euclid(n) as usize, (k0 + 1).rem_euclid(n) as usize)
        } else {
            let last = n as i64 - 1;
            (k0.clamp(0, last) as usize, (k0 + 1).clamp(0, last) as usize)
        };
        Some((a, b, frac))
    }
}

impl GridSampler for UnitGrid {
    fn sample(&self, u: f64, v: f64, tolerance: f64, periodic: bool) -> f64 {
        let Some((i0, i1, fu)) = Self::axis(u, self.width, tolerance, periodic) else {
            return 0.0;
        };
        let Some((j0, j1, fv)) = Self::axis(v, self.height, tolerance, periodic) else {
            return 0.0;
        };

        let e00 = self.value(i0, j0);
        let e10 = self.value(i1, j0);
        let e01 = self.value(i0, j1);
        let e11 = self.value(i1, j1);

        let south = e00 * (1.0 - fu) + e10 * fu;
        let north = e01 * (1.0 - fu) + e11 * fu;
        south * (1.0 - fv) + north * fv
    }

    fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}
