//! Boundary curves: synthesis from chains and Taubin smoothing.
//!
//! Each interface quad contributes an even number of curve points, every
//! point lying on the segment between two anchors (a dominant-side and a
//! recessive-side point on the quad outline). Smoothing keeps each point on
//! its own segment, so the curve cannot cross quad corners or itself.

use glam::DVec2;
use landfall_core::constants::{CURVE_MAX_FRACTION, CURVE_MIN_FRACTION};

use crate::chain::{ChainLink, InterfaceChain};
use crate::cutmap::CutMap;
use crate::grid::GridLayout;
use crate::params::SmoothingParams;

/// One point of a boundary curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub pos: DVec2,
    /// Anchor on the dominant side.
    pub anchor_a: DVec2,
    /// Anchor on the recessive side.
    pub anchor_b: DVec2,
    /// Grid corner at `anchor_a`, if it is one.
    pub corner_a: Option<(usize, usize)>,
    /// Grid corner at `anchor_b`, if it is one.
    pub corner_b: Option<(usize, usize)>,
}

impl CurvePoint {
    /// Position of `p` along the anchor segment, as a fraction of its length.
    pub fn fraction(&self, p: DVec2) -> f64 {
        let ab = self.anchor_b - self.anchor_a;
        let len2 = ab.length_squared();
        if len2 == 0.0 {
            return 0.0;
        }
        (p - self.anchor_a).dot(ab) / len2
    }

    /// Project `p` onto the anchor segment, clamped away from both anchors.
    pub fn reproject(&self, p: DVec2) -> DVec2 {
        let ab = self.anchor_b - self.anchor_a;
        let t = self.fraction(p).clamp(CURVE_MIN_FRACTION, CURVE_MAX_FRACTION);
        self.anchor_a + ab * t
    }
}

/// Polyline tracing one boundary chain.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceCurve {
    pub points: Vec<CurvePoint>,
    pub closed: bool,
}

/// Appends points for one quad in local `[0,1]²` coordinates.
struct QuadPoints<'a> {
    link: ChainLink,
    origin: DVec2,
    quad: DVec2,
    blend: f64,
    out: &'a mut Vec<CurvePoint>,
}

impl QuadPoints<'_> {
    fn corner(&self, local: (f64, f64)) -> Option<(usize, usize)> {
        let on_grid = |t: f64| t == 0.0 || t == 1.0;
        (on_grid(local.0) && on_grid(local.1))
            .then(|| (self.link.i + local.0 as usize, self.link.j + local.1 as usize))
    }

    fn push(&mut self, a: (f64, f64), b: (f64, f64)) {
        let anchor_a = self.origin + DVec2::new(a.0, a.1) * self.quad;
        let anchor_b = self.origin + DVec2::new(b.0, b.1) * self.quad;
        let point = CurvePoint {
            pos: anchor_a * (1.0 - self.blend) + anchor_b * self.blend,
            anchor_a,
            anchor_b,
            corner_a: self.corner(a),
            corner_b: self.corner(b),
        };
        self.out.push(point);
    }
}

/// Synthesize the unsmoothed curve of a chain.
///
/// Every quad emits `subdivision` points starting on the edge the curve
/// enters through; the last quad of an open chain also emits the exit point.
pub fn build_curve(
    layout: &GridLayout,
    map: &CutMap,
    chain: &InterfaceChain,
    params: &SmoothingParams,
) -> InterfaceCurve {
    let sub = params.even_subdivision();
    let half = sub / 2;
    let quad = layout.quad_size();
    let (cl, cr) = (chain.dominant, chain.recessive);
    let mut points = Vec::with_capacity(chain.links.len() * sub + 1);

    for (k, &link) in chain.links.iter().enumerate() {
        let extra = usize::from(!chain.closed && k + 1 == chain.links.len());
        let [c1, c2, c3, c4] = map.quad_labels(link.i, link.j);
        let mut q = QuadPoints {
            link,
            origin: layout.corner_position(link.i, link.j),
            quad,
            blend: params.blend,
            out: &mut points,
        };

        match link.dominant_corners {
            1 => {
                for s in 0..half {
                    let t = s as f64 / half as f64;
                    if c1 == cl {
                        q.push((0.0, 0.0), (1.0, t));
                    } else if c2 == cl {
                        q.push((1.0, 0.0), (1.0 - t, 1.0));
                    } else if c3 == cl {
                        q.push((1.0, 1.0), (0.0, 1.0 - t));
                    } else {
                        q.push((0.0, 1.0), (t, 0.0));
                    }
                }
                for s in 0..half + extra {
                    let t = s as f64 / half as f64;
                    if c1 == cl {
                        q.push((0.0, 0.0), (1.0 - t, 1.0));
                    } else if c2 == cl {
                        q.push((1.0, 0.0), (0.0, 1.0 - t));
                    } else if c3 == cl {
                        q.push((1.0, 1.0), (t, 0.0));
                    } else {
                        q.push((0.0, 1.0), (1.0, t));
                    }
                }
            }
            2 => {
                for s in 0..sub + extra {
                    let u = s as f64 / sub as f64;
                    if c1 == cl && c2 == cl {
                        q.push((1.0 - u, 0.0), (1.0 - u, 1.0));
                    } else if c2 == cl && c3 == cl {
                        q.push((1.0, 1.0 - u), (0.0, 1.0 - u));
                    } else if c3 == cl && c4 == cl {
                        q.push((u, 1.0), (u, 0.0));
                    } else {
                        q.push((0.0, u), (1.0, u));
                    }
                }
            }
            _ => {
                for s in 0..half {
                    let t = s as f64 / half as f64;
                    if c1 == cr {
                        q.push((t, 1.0), (0.0, 0.0));
                    } else if c2 == cr {
                        q.push((0.0, t), (1.0, 0.0));
                    } else if c3 == cr {
                        q.push((1.0 - t, 0.0), (1.0, 1.0));
                    } else {
                        q.push((1.0, 1.0 - t), (0.0, 1.0));
                    }
                }
                for s in 0..half + extra {
                    let t = s as f64 / half as f64;
                    if c1 == cr {
                        q.push((1.0, 1.0 - t), (0.0, 0.0));
                    } else if c2 == cr {
                        q.push((t, 1.0), (1.0, 0.0));
                    } else if c3 == cr {
                        q.push((0.0, t), (1.0, 1.0));
                    } else {
                        q.push((1.0 - t, 0.0), (0.0, 1.0));
                    }
                }
            }
        }
    }

    InterfaceCurve {
        points,
        closed: chain.closed,
    }
}

/// Taubin smoothing in Gauss-Seidel order.
///
/// Open curves keep their end points. Every moved point is reprojected onto
/// its anchor segment within `[CURVE_MIN_FRACTION, CURVE_MAX_FRACTION]`.
pub fn smooth_curve(curve: &mut InterfaceCurve, params: &SmoothingParams) {
    let n = curve.points.len();
    if n < 3 {
        return;
    }
    let closed = curve.closed;
    for _ in 0..params.iterations {
        for factor in [params.lambda, params.mu] {
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                if !closed && (k == 0 || k + 1 == n) {
                    continue;
                }
                let prev = curve.points[if k > 0 { k - 1 } else { n - 1 }].pos;
                let next = curve.points[if k + 1 < n { k + 1 } else { 0 }].pos;
                let point = &mut curve.points[k];
                let pc = point.pos;
                let moved = pc + ((prev - pc) + (next - pc)) * (0.5 * factor);
                point.pos = point.reproject(moved);
            }
        }
    }
}

/// Build and smooth the curves of all chains.
pub fn build_curves(
    layout: &GridLayout,
    map: &CutMap,
    chains: &[InterfaceChain],
    params: &SmoothingParams,
) -> Vec<InterfaceCurve> {
    chains
        .iter()
        .map(|chain| {
            let mut curve = build_curve(layout, map, chain, params);
            smooth_curve(&mut curve, params);
            curve
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::extract_chains;

    fn setup(map: &CutMap) -> (GridLayout, Vec<InterfaceChain>) {
        let layout = GridLayout::with_quads(
            10.0 * map.num_quads_x() as f64,
            10.0 * map.num_quads_y() as f64,
            map.num_quads_x(),
            map.num_quads_y(),
        );
        let chains = extract_chains(map).unwrap();
        (layout, chains)
    }

    fn island() -> CutMap {
        CutMap::from_fn(6, 6, |i, j| u32::from((2..=3).contains(&i) && (2..=3).contains(&j)))
    }

    #[test]
    fn test_point_counts() {
        let params = SmoothingParams::default();
        let (layout, chains) = setup(&island());
        let curve = build_curve(&layout, &island(), &chains[0], &params);
        assert_eq!(curve.points.len(), 8 * 2, "closed: subdivision points per quad");

        let open = CutMap::from_fn(4, 4, |i, _| u32::from(i >= 2));
        let (layout, chains) = setup(&open);
        let curve = build_curve(&layout, &open, &chains[0], &params);
        assert_eq!(curve.points.len(), 4 * 2 + 1, "open: one extra exit point");
    }

    #[test]
    fn test_fresh_points_at_blend_and_continuous() {
        let params = SmoothingParams::default();
        let map = island();
        let (layout, chains) = setup(&map);
        let curve = build_curve(&layout, &map, &chains[0], &params);
        for p in &curve.points {
            assert!((p.fraction(p.pos) - 0.5).abs() < 1e-12);
        }
        // Consecutive points never jump more than one quad diagonal.
        let diag = layout.quad_size().length();
        for w in curve.points.windows(2) {
            assert!((w[1].pos - w[0].pos).length() <= diag + 1e-9);
        }
    }

    #[test]
    fn test_dominant_anchor_holds_dominant_cut() {
        let params = SmoothingParams::default();
        let map = island();
        let (layout, chains) = setup(&map);
        let curve = build_curve(&layout, &map, &chains[0], &params);
        for p in &curve.points {
            if let Some((i, j)) = p.corner_a {
                assert_eq!(map.get(i, j), 1, "anchor a is on the dominant side");
            }
            if let Some((i, j)) = p.corner_b {
                assert_eq!(map.get(i, j), 0, "anchor b is on the recessive side");
            }
        }
    }

    #[test]
    fn test_smoothing_stays_within_bounds() {
        let mut params = SmoothingParams::default();
        params.iterations = 200;
        params.lambda = 0.95;
        params.mu = -0.9;
        let map = CutMap::from_fn(10, 10, |i, j| u32::from(i * 2 + j > 12));
        let (layout, chains) = setup(&map);
        for chain in &chains {
            let mut curve = build_curve(&layout, &map, chain, &params);
            smooth_curve(&mut curve, &params);
            for p in &curve.points {
                let f = p.fraction(p.pos);
                assert!(
                    (CURVE_MIN_FRACTION - 1e-12..=CURVE_MAX_FRACTION + 1e-12).contains(&f),
                    "fraction {f} out of range"
                );
                // Still on the anchor segment.
                let off = p.reproject(p.pos) - p.pos;
                assert!(off.length() < 1e-9);
            }
        }
    }

    #[test]
    fn test_open_curve_keeps_end_points() {
        let params = SmoothingParams::default();
        let map = CutMap::from_fn(6, 6, |i, j| u32::from(i + j > 6));
        let (layout, chains) = setup(&map);
        let mut curve = build_curve(&layout, &map, &chains[0], &params);
        let first = curve.points[0].pos;
        let last = curve.points.last().unwrap().pos;
        smooth_curve(&mut curve, &params);
        assert_eq!(curve.points[0].pos, first);
        assert_eq!(curve.points.last().unwrap().pos, last);
    }

    #[test]
    fn test_straight_boundary_unchanged_by_smoothing() {
        // A straight vertical boundary is already smooth.
        let params = SmoothingParams::default();
        let map = CutMap::from_fn(4, 4, |i, _| u32::from(i >= 2));
        let (layout, chains) = setup(&map);
        let mut curve = build_curve(&layout, &map, &chains[0], &params);
        let before: Vec<DVec2> = curve.points.iter().map(|p| p.pos).collect();
        smooth_curve(&mut curve, &params);
        for (p, b) in curve.points.iter().zip(&before) {
            assert!((p.pos - *b).length() < 1e-9);
        }
    }
}
