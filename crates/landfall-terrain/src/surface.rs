//! Virtual surfaces: runtime height overrides such as pads and decks.
//!
//! Surfaces are bucketed by the quads their extents overlap. A query
//! consults only the surfaces of its quad, and a surface result replaces
//! the current one when it is at least as high.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use glam::DVec2;
use landfall_core::types::{GroundType, SurfacePoint, WorldExtents};

use crate::grid::GridLayout;
use crate::polygon::{contains_point, convex_contains_point};

/// A region with its own height function.
pub trait VirtualSurface: fmt::Debug + Send + Sync {
    /// Horizontal bounding rectangle.
    fn extents(&self) -> WorldExtents;

    /// Highest point of the surface.
    fn max_height(&self) -> f64;

    /// Flush surfaces never raise the terrain's cached height bounds.
    fn flush(&self) -> bool {
        false
    }

    /// Surface at `p`, or None where the surface does not reach.
    fn sample(&self, p: DVec2) -> Option<SurfacePoint>;
}

/// Horizontal polygon at a fixed elevation.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizontalPolygon {
    ring: Vec<DVec2>,
    elevation: f64,
    ground: GroundType,
    flush: bool,
    convex: bool,
}

impl HorizontalPolygon {
    pub fn new(ring: Vec<DVec2>, elevation: f64, ground: GroundType) -> Self {
        Self {
            ring,
            elevation,
            ground,
            flush: false,
            convex: false,
        }
    }

    pub fn with_flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    /// Use the convex containment test.
    pub fn with_convex(mut self, convex: bool) -> Self {
        self.convex = convex;
        self
    }
}

impl VirtualSurface for HorizontalPolygon {
    fn extents(&self) -> WorldExtents {
        WorldExtents::enclosing(self.ring.iter().copied())
            .unwrap_or_else(|| WorldExtents::new(DVec2::ZERO, DVec2::ZERO))
    }

    fn max_height(&self) -> f64 {
        self.elevation
    }

    fn flush(&self) -> bool {
        self.flush
    }

    fn sample(&self, p: DVec2) -> Option<SurfacePoint> {
        let inside = if self.convex {
            convex_contains_point(&self.ring, p)
        } else {
            contains_point(&self.ring, p)
        };
        inside.then(|| SurfacePoint::level(self.elevation, self.ground))
    }
}

/// Horizontal disc at a fixed elevation.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizontalDisc {
    center: DVec2,
    radius: f64,
    elevation: f64,
    ground: GroundType,
    flush: bool,
}

impl HorizontalDisc {
    pub fn new(center: DVec2, radius: f64, elevation: f64, ground: GroundType) -> Self {
        Self {
            center,
            radius,
            elevation,
            ground,
            flush: false,
        }
    }

    pub fn with_flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }
}

impl VirtualSurface for HorizontalDisc {
    fn extents(&self) -> WorldExtents {
        let r = DVec2::splat(self.radius);
        WorldExtents::new(self.center - r, self.center + r)
    }

    fn max_height(&self) -> f64 {
        self.elevation
    }

    fn flush(&self) -> bool {
        self.flush
    }

    fn sample(&self, p: DVec2) -> Option<SurfacePoint> {
        (p.distance_squared(self.center) <= self.radius * self.radius)
            .then(|| SurfacePoint::level(self.elevation, self.ground))
    }
}

/// Handle of a registered surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

#[derive(Debug)]
struct Entry {
    surface: Box<dyn VirtualSurface>,
    quads: Vec<usize>,
}

/// Registered surfaces and their per-quad buckets.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    next_id: u64,
    entries: BTreeMap<SurfaceId, Entry>,
    per_quad: HashMap<usize, Vec<SurfaceId>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a surface under every quad its extents overlap.
    pub fn register(&mut self, layout: &GridLayout, surface: Box<dyn VirtualSurface>) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        let mut quads = Vec::new();
        if let Some((is, js)) = layout.quad_span(&surface.extents()) {
            for i in is {
                for j in js.clone() {
                    quads.push(layout.quad_index(i, j));
                }
            }
        }
        for &q in &quads {
            self.per_quad.entry(q).or_default().push(id);
        }
        tracing::debug!(%id, quads = quads.len(), flush = surface.flush(), "virtual surface registered");
        self.entries.insert(id, Entry { surface, quads });
        id
    }

    /// Remove a surface. Returns it, or None for an unknown id.
    pub fn unregister(&mut self, id: SurfaceId) -> Option<Box<dyn VirtualSurface>> {
        let entry = self.entries.remove(&id)?;
        for q in &entry.quads {
            if let Some(bucket) = self.per_quad.get_mut(q) {
                bucket.retain(|&other| other != id);
                if bucket.is_empty() {
                    self.per_quad.remove(q);
                }
            }
        }
        tracing::debug!(%id, "virtual surface unregistered");
        Some(entry.surface)
    }

    pub fn get(&self, id: SurfaceId) -> Option<&dyn VirtualSurface> {
        self.entries.get(&id).map(|e| e.surface.as_ref())
    }

    /// Quads a surface was registered under.
    pub fn quads(&self, id: SurfaceId) -> &[usize] {
        self.entries.get(&id).map_or(&[], |e| e.quads.as_slice())
    }

    /// Apply the surfaces of quad `q` at `p` on top of `terrain`.
    pub fn resolve(&self, q: usize, p: DVec2, terrain: SurfacePoint) -> SurfacePoint {
        let Some(bucket) = self.per_quad.get(&q) else {
            return terrain;
        };
        let mut best = terrain;
        for id in bucket {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            if let Some(candidate) = entry.surface.sample(p) {
                if candidate.z >= best.z {
                    best = candidate;
                }
            }
        }
        best
    }
}
