//! Boundary chain extraction.
//!
//! Walks the quad grid along quads whose corners carry exactly two cut
//! labels and links them into chains, each oriented so that the higher
//! (dominant) cut lies to the left of the direction of travel.

use crate::cutmap::CutMap;
use crate::error::{TerrainError, TerrainResult};

/// Quad steps with the two corners of the edge crossed by each step.
const STEPS: [((i64, i64), (usize, usize), (usize, usize)); 4] = [
    ((1, 0), (1, 0), (1, 1)),
    ((0, 1), (1, 1), (0, 1)),
    ((-1, 0), (0, 1), (0, 0)),
    ((0, -1), (0, 0), (1, 0)),
];

/// Forward-left and forward-right corner offsets of the edge crossed by a step.
pub fn step_edge_corners(step: (i64, i64)) -> Option<((usize, usize), (usize, usize))> {
    match step {
        (1, 0) => Some(((1, 1), (1, 0))),
        (0, 1) => Some(((0, 1), (1, 1))),
        (-1, 0) => Some(((0, 0), (0, 1))),
        (0, -1) => Some(((1, 0), (0, 0))),
        _ => None,
    }
}

/// One quad of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    pub i: usize,
    pub j: usize,
    /// Corners of the quad carrying the dominant cut (1, 2 or 3).
    pub dominant_corners: usize,
}

/// Ordered quads along the boundary between two cuts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceChain {
    pub links: Vec<ChainLink>,
    /// The chain returns to its first quad instead of ending at the grid edge.
    pub closed: bool,
    /// Higher cut, to the left of the chain.
    pub dominant: u32,
    /// Lower cut, to the right of the chain.
    pub recessive: u32,
}

/// Trace every boundary chain of a cut map.
///
/// Fails if any quad carries more than two distinct labels.
pub fn extract_chains(map: &CutMap) -> TerrainResult<Vec<InterfaceChain>> {
    let (nqx, nqy) = (map.num_quads_x(), map.num_quads_y());
    for i in 0..nqx {
        for j in 0..nqy {
            let labels = map.distinct_labels(i, j);
            if labels.len() > 2 {
                return Err(TerrainError::AmbiguousBoundary { i, j, labels });
            }
        }
    }

    let mut free = vec![true; nqx * nqy];
    let mut chains = Vec::new();
    for i in 0..nqx {
        for j in 0..nqy {
            if !free[i * nqy + j] {
                continue;
            }
            let labels = map.distinct_labels(i, j);
            if labels.len() != 2 {
                continue;
            }
            let (recessive, dominant) = (labels[0], labels[1]);

            let first = walk(map, (i, j), dominant, &mut free);
            let second = walk(map, (i, j), dominant, &mut free);
            let mut links: Vec<ChainLink> = first.into_iter().rev().collect();
            links.extend(second.into_iter().skip(1));

            if links.len() > 1 && left_label(map, &links[0], &links[1]) != dominant {
                links.reverse();
            }
            let closed = loops_back(map, &links);
            chains.push(InterfaceChain {
                links,
                closed,
                dominant,
                recessive,
            });
        }
    }
    Ok(chains)
}

/// Follow the boundary from `start` until no free neighbor continues it.
fn walk(map: &CutMap, start: (usize, usize), dominant: u32, free: &mut [bool]) -> Vec<ChainLink> {
    let (nqx, nqy) = (map.num_quads_x() as i64, map.num_quads_y() as i64);
    let mut links = Vec::new();
    let (mut i, mut j) = start;
    loop {
        free[i * nqy as usize + j] = false;
        let dominant_corners = map
            .quad_labels(i, j)
            .iter()
            .filter(|&&c| c == dominant)
            .count();
        links.push(ChainLink {
            i,
            j,
            dominant_corners,
        });

        let next = STEPS.iter().find_map(|&((di, dj), a, b)| {
            let (ni, nj) = (i as i64 + di, j as i64 + dj);
            if ni < 0 || nj < 0 || ni >= nqx || nj >= nqy {
                return None;
            }
            let (ni, nj) = (ni as usize, nj as usize);
            if !free[ni * nqy as usize + nj] {
                return None;
            }
            let c1 = map.get(i + a.0, j + a.1);
            let c2 = map.get(i + b.0, j + b.1);
            ((c1 == dominant || c2 == dominant) && c1 != c2).then_some((ni, nj))
        });
        match next {
            Some((ni, nj)) => (i, j) = (ni, nj),
            None => return links,
        }
    }
}

fn step_between(from: &ChainLink, to: &ChainLink) -> (i64, i64) {
    (to.i as i64 - from.i as i64, to.j as i64 - from.j as i64)
}

/// Label at the forward-left corner of the edge crossed going `from` → `to`.
fn left_label(map: &CutMap, from: &ChainLink, to: &ChainLink) -> u32 {
    match step_edge_corners(step_between(from, to)) {
        Some(((li, lj), _)) => map.get(from.i + li, from.j + lj),
        None => u32::MAX,
    }
}

/// Whether the last link continues into the first across a boundary edge.
fn loops_back(map: &CutMap, links: &[ChainLink]) -> bool {
    let (Some(first), Some(last)) = (links.first(), links.last()) else {
        return false;
    };
    if links.len() < 4 {
        return false;
    }
    match step_edge_corners(step_between(last, first)) {
        Some(((li, lj), (ri, rj))) => {
            map.get(last.i + li, last.j + lj) != map.get(last.i + ri, last.j + rj)
        }
        None => false,
    }
}

/// Labels on the left and right of a chain as seen from its first step.
///
/// A single-quad chain sits in a grid corner and is read across the grid
/// edge the boundary leaves through.
pub fn interface_cut_levels(map: &CutMap, chain: &InterfaceChain) -> (u32, u32) {
    let first = &chain.links[0];
    let read = |step: (i64, i64)| {
        step_edge_corners(step).map(|((li, lj), (ri, rj))| {
            (
                map.get(first.i + li, first.j + lj),
                map.get(first.i + ri, first.j + rj),
            )
        })
    };
    if let Some(second) = chain.links.get(1) {
        if let Some(levels) = read(step_between(first, second)) {
            return levels;
        }
    }
    let (nqx, nqy) = (map.num_quads_x() as i64, map.num_quads_y() as i64);
    STEPS
        .iter()
        .filter_map(|&(step, _, _)| {
            let (ni, nj) = (first.i as i64 + step.0, first.j as i64 + step.1);
            let outside = ni < 0 || nj < 0 || ni >= nqx || nj >= nqy;
            if outside {
                read(step)
            } else {
                None
            }
        })
        .find(|&(l, r)| l == chain.dominant && r == chain.recessive)
        .unwrap_or((chain.dominant, chain.recessive))
}
