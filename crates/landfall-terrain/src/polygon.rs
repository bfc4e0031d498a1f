//! Planar polygon helpers: winding, point containment and ear clipping.

use glam::DVec2;

/// Signed area of a ring, positive when counter-clockwise.
pub fn signed_area(ring: &[DVec2]) -> f64 {
    let n = ring.len();
    let mut area = 0.0;
    for k in 0..n {
        area += ring[k].perp_dot(ring[(k + 1) % n]);
    }
    area * 0.5
}

pub fn is_counter_clockwise(ring: &[DVec2]) -> bool {
    signed_area(ring) > 0.0
}

/// Whether any two non-adjacent edges of the ring intersect.
pub fn is_self_intersecting(ring: &[DVec2]) -> bool {
    let n = ring.len();
    for a in 0..n {
        for b in a + 1..n {
            if b == a + 1 || (a == 0 && b == n - 1) {
                continue;
            }
            if segments_cross(ring[a], ring[(a + 1) % n], ring[b], ring[(b + 1) % n]) {
                return true;
            }
        }
    }
    false
}

fn segments_cross(p1: DVec2, p2: DVec2, q1: DVec2, q2: DVec2) -> bool {
    let d1 = (p2 - p1).perp_dot(q1 - p1);
    let d2 = (p2 - p1).perp_dot(q2 - p1);
    let d3 = (q2 - q1).perp_dot(p1 - q1);
    let d4 = (q2 - q1).perp_dot(p2 - q1);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// How strictly a candidate ear is tested.
#[derive(Clone, Copy, PartialEq)]
enum EarRule {
    /// Strictly convex, no other vertex inside or on it.
    Strict,
    /// Strictly convex, no other vertex strictly inside.
    Open,
    /// Collinear corners accepted.
    Degenerate,
}

/// Triangulate a counter-clockwise simple ring.
///
/// Returns index triples into `ring`, each counter-clockwise. A ring of `n`
/// vertices yields `n - 2` triangles unless clipping gets stuck.
pub fn triangulate_ring(ring: &[DVec2]) -> Vec<[usize; 3]> {
    let n = ring.len();
    if n < 3 {
        return Vec::new();
    }
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let ear = [EarRule::Strict, EarRule::Open, EarRule::Degenerate]
            .into_iter()
            .find_map(|rule| find_ear(ring, &remaining, rule));
        let Some(k) = ear else {
            break;
        };
        let len = remaining.len();
        triangles.push([
            remaining[(k + len - 1) % len],
            remaining[k],
            remaining[(k + 1) % len],
        ]);
        remaining.remove(k);
    }
    if remaining.len() == 3 {
        triangles.push([remaining[0], remaining[1], remaining[2]]);
    }
    triangles
}

fn find_ear(ring: &[DVec2], remaining: &[usize], rule: EarRule) -> Option<usize> {
    let len = remaining.len();
    (0..len).find(|&k| {
        let prev = remaining[(k + len - 1) % len];
        let curr = remaining[k];
        let next = remaining[(k + 1) % len];
        let (a, b, c) = (ring[prev], ring[curr], ring[next]);
        let cross = (b - a).perp_dot(c - a);
        match rule {
            EarRule::Degenerate => cross >= 0.0,
            EarRule::Strict | EarRule::Open => {
                cross > 0.0
                    && !remaining.iter().any(|&idx| {
                        if idx == prev || idx == curr || idx == next {
                            return false;
                        }
                        let p = ring[idx];
                        if p == a || p == b || p == c {
                            return false;
                        }
                        point_in_triangle(p, a, b, c, rule == EarRule::Strict)
                    })
            }
        }
    })
}

fn point_in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2, inclusive: bool) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    if inclusive {
        d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
    } else {
        d1 > 0.0 && d2 > 0.0 && d3 > 0.0
    }
}

/// Even-odd point-in-polygon test by ray casting.
pub fn contains_point(ring: &[DVec2], p: DVec2) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.y > p.y) != (pj.y > p.y) && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Point-in-polygon for convex rings of either winding; boundary counts
/// as inside.
pub fn convex_contains_point(ring: &[DVec2], p: DVec2) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let (mut pos, mut neg) = (false, false);
    for k in 0..n {
        let d = (ring[(k + 1) % n] - ring[k]).perp_dot(p - ring[k]);
        pos |= d > 0.0;
        neg |= d < 0.0;
        if pos && neg {
            return false;
        }
    }
    true
}
