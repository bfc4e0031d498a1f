//! End-to-end generation scenarios on in-memory rasters.

use std::path::PathBuf;

use glam::DVec2;
use landfall_core::types::GroundType;
use landfall_terrain::chain::extract_chains;
use landfall_terrain::curve::build_curves;
use landfall_terrain::polygon::{is_self_intersecting, signed_area};
use landfall_terrain::triangulate::side_rings;
use landfall_terrain::{
    generate, CutSpec, GeneratedTerrain, GenerationInputs, GenerationParams, HorizontalDisc,
    HorizontalPolygon, Terrain, UnitGrid,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Uniform mid-gray terrain of `n × n` quads, 100 m each, 0..200 m range.
fn flat_params(n: usize) -> (GenerationParams, GenerationInputs) {
    let w = 100.0 * n as f64;
    let mut params = GenerationParams::new(w, w);
    params.min_height = Some(0.0);
    params.max_height = Some(200.0);
    let inputs = GenerationInputs {
        heightmap: UnitGrid::uniform(n, n, 0.5),
        metadata: None,
        masks: Vec::new(),
    };
    (params, inputs)
}

/// 1600 m square of 16 × 16 quads, water to the south-east of the main
/// diagonal, ground falling 100 m from west to east.
fn diagonal_params(level: bool) -> (GenerationParams, GenerationInputs) {
    let n = 16.0;
    let mut params = GenerationParams::new(1600.0, 1600.0);
    params.min_height = Some(0.0);
    params.max_height = Some(100.0);
    params.cell_density = 0.0625;
    params.cuts.push(CutSpec {
        name: "water".into(),
        mask: PathBuf::from("water.png"),
        level,
        ground: None,
    });
    let inputs = GenerationInputs {
        heightmap: UnitGrid::from_fn(64, 64, |u, _| 1.0 - u),
        metadata: None,
        masks: vec![UnitGrid::from_fn(64, 64, move |u, v| 0.5 + u - v - 0.1 / n)],
    };
    (params, inputs)
}

fn diagonal(level: bool) -> GeneratedTerrain {
    let (params, inputs) = diagonal_params(level);
    generate(&params, &inputs).unwrap()
}

/// 1600 m square of 16 × 16 quads with a round level lake in a bowl.
fn lake(level: bool) -> GeneratedTerrain {
    let mut params = GenerationParams::new(1600.0, 1600.0);
    params.min_height = Some(0.0);
    params.max_height = Some(200.0);
    params.cell_density = 0.0625;
    params.cuts.push(CutSpec {
        name: "water".into(),
        mask: PathBuf::from("water.png"),
        level,
        ground: None,
    });
    let radius = |u: f64, v: f64| ((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt();
    let inputs = GenerationInputs {
        heightmap: UnitGrid::from_fn(64, 64, move |u, v| radius(u, v)),
        metadata: None,
        masks: vec![UnitGrid::from_fn(64, 64, move |u, v| 0.5 + 4.0 * (0.27 - radius(u, v)))],
    };
    generate(&params, &inputs).unwrap()
}

fn random_points(terrain: &GeneratedTerrain, count: usize, seed: u64) -> Vec<DVec2> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let ext = terrain.layout.extents();
    (0..count)
        .map(|_| {
            DVec2::new(
                rng.gen_range(ext.min.x..ext.max.x),
                rng.gen_range(ext.min.y..ext.max.y),
            )
        })
        .collect()
}

// ---- Flat terrain ----

#[test]
fn test_flat_terrain_counts_and_height() {
    let n = 6;
    let (params, inputs) = flat_params(n);
    let generated = generate(&params, &inputs).unwrap();
    assert_eq!(generated.layout.num_quads_x, n);
    assert_eq!(generated.layout.num_quads_y, n);
    assert_eq!(generated.mesh.num_vertices(), (n + 1) * (n + 1));
    assert_eq!(generated.mesh.num_triangles(), 2 * n * n);
    assert!(generated.spans.is_empty());

    let points = random_points(&generated, 200, 7);
    let terrain = Terrain::generate("flat", &params, &inputs).unwrap();
    for p in points {
        let (z, ground) = terrain.height(p.x, p.y).unwrap();
        assert!((z - 100.0).abs() < 1e-9, "height at {p} is {z}");
        assert_eq!(ground, GroundType::Dirt);
    }
}

// ---- Diagonal split ----

#[test]
fn test_diagonal_split_single_open_chain() {
    let generated = diagonal(true);
    assert_eq!(generated.spans.len(), 1, "exactly one boundary");
    let span = generated.spans[0];
    assert!(!span.closed, "the boundary ends at the grid edge");
    assert_eq!((span.dominant, span.recessive), (1, 0));
}

#[test]
fn test_diagonal_split_side_polygons_are_simple() {
    let (params, _) = diagonal_params(true);
    let generated = diagonal(true);
    let chains = extract_chains(&generated.cut_map).unwrap();
    let curves = build_curves(&generated.layout, &generated.cut_map, &chains, &params.smoothing);
    let sub = params.smoothing.even_subdivision();
    for kq in 0..chains[0].links.len() {
        let rings = side_rings(
            &generated.layout,
            &chains[0],
            &curves[0],
            &generated.spans[0],
            kq,
            sub,
        )
        .unwrap();
        for ring in &rings {
            assert!(signed_area(&ring.points) > 0.0, "quad {kq}: {} ring not CCW", ring.side);
            assert!(!is_self_intersecting(&ring.points), "quad {kq}: {} ring crosses itself", ring.side);
        }
    }
}

#[test]
fn test_diagonal_split_ground_types() {
    let (params, inputs) = diagonal_params(true);
    let terrain = Terrain::generate("diag", &params, &inputs).unwrap();
    assert_eq!(terrain.height(400.0, -400.0).unwrap().1, GroundType::Water);
    assert_eq!(terrain.height(-400.0, 400.0).unwrap().1, GroundType::Dirt);
}

// ---- Mesh structure ----

fn assert_quadmap_partition(generated: &GeneratedTerrain) {
    let mesh = &generated.mesh;
    let mut next = 0usize;
    let mut ranges: Vec<_> = (0..mesh.num_quads()).map(|q| mesh.quad_triangles(q)).collect();
    ranges.sort_by_key(|r| r.start);
    for r in ranges {
        assert_eq!(r.start, next, "ranges must be contiguous and disjoint");
        assert!(r.end > r.start, "every quad has triangles");
        next = r.end;
    }
    assert_eq!(next, mesh.num_triangles());
}

fn assert_triangles_in_quads(generated: &GeneratedTerrain) {
    let layout = &generated.layout;
    let mesh = &generated.mesh;
    let eps = 1e-9 * layout.size.x;
    let quad_area = layout.quad_size().x * layout.quad_size().y;
    for q in 0..mesh.num_quads() {
        let (i, j) = layout.quad_coords(q);
        let lo = layout.corner_position(i, j);
        let hi = layout.corner_position(i + 1, j + 1);
        for t in mesh.quad_triangles(q) {
            assert!(
                mesh.face_cross(t).z > -1e-9 * quad_area,
                "triangle {t} in quad ({i}, {j}) winds clockwise"
            );
            for v in mesh.triangle(t) {
                let p = mesh.vertex_xy(v);
                assert!(
                    p.x >= lo.x - eps && p.x <= hi.x + eps && p.y >= lo.y - eps && p.y <= hi.y + eps,
                    "triangle {t} vertex {p} outside quad ({i}, {j})"
                );
            }
        }
    }
}

fn mesh_area(generated: &GeneratedTerrain) -> f64 {
    (0..generated.mesh.num_triangles())
        .map(|t| 0.5 * generated.mesh.face_cross(t).z)
        .sum()
}

#[test]
fn test_quadmap_partitions_triangles() {
    assert_quadmap_partition(&diagonal(true));
}

#[test]
fn test_triangles_stay_in_their_quad() {
    assert_triangles_in_quads(&diagonal(true));
}

// ---- Closed level boundary ----

#[test]
fn test_lake_is_one_closed_chain() {
    let generated = lake(true);
    assert_eq!(generated.spans.len(), 1, "one shoreline");
    let span = generated.spans[0];
    assert!(span.closed, "the shoreline loops back on itself");
    assert_eq!((span.dominant, span.recessive), (1, 0));
}

#[test]
fn test_lake_mesh_structure() {
    let generated = lake(true);
    assert_quadmap_partition(&generated);
    assert_triangles_in_quads(&generated);
    let area = mesh_area(&generated);
    let world = generated.layout.size.x * generated.layout.size.y;
    assert!((area - world).abs() < 1e-6 * world, "mesh covers {area} of {world}");
}

#[test]
fn test_lake_shoreline_lowered_all_around() {
    let plain = lake(false);
    let leveled = lake(true);
    let span = leveled.spans[0];
    assert_eq!(span, plain.spans[0]);
    for k in span.vertices() {
        let (zl, zp) = (leveled.mesh.zs[k], plain.mesh.zs[k]);
        assert!(zl < zp, "shoreline vertex {k} not lowered: {zl} vs {zp}");
    }
}

#[test]
fn test_triangles_tagged_with_quad_cuts() {
    let generated = diagonal(true);
    let layout = &generated.layout;
    for q in 0..generated.mesh.num_quads() {
        let (i, j) = layout.quad_coords(q);
        let labels = generated.cut_map.distinct_labels(i, j);
        for t in generated.mesh.quad_triangles(q) {
            let cut = generated.mesh.triangle_cut(t);
            assert!(labels.contains(&cut), "quad ({i}, {j}) triangle cut {cut} not in {labels:?}");
        }
    }
}

#[test]
fn test_smoothing_stays_within_anchor_segments() {
    let (mut params, _) = diagonal_params(true);
    params.smoothing.iterations = 200;
    let generated = diagonal(true);
    let chains = extract_chains(&generated.cut_map).unwrap();
    let curves = build_curves(&generated.layout, &generated.cut_map, &chains, &params.smoothing);
    for point in &curves[0].points {
        let f = point.fraction(point.pos);
        assert!((0.05 - 1e-9..=0.95 + 1e-9).contains(&f), "fraction {f}");
        let off = (point.pos - point.anchor_a).perp_dot(point.anchor_b - point.anchor_a);
        assert!(off.abs() < 1e-6, "point left its anchor segment");
    }
}

// ---- Leveling ----

#[test]
fn test_leveling_lowers_shoreline() {
    let plain = diagonal(false);
    let leveled = diagonal(true);
    let span = leveled.spans[0];
    assert_eq!(span, plain.spans[0]);

    let mut lowered = 0;
    for k in span.vertices() {
        let p = leveled.mesh.vertex_xy(k);
        assert_eq!(p, plain.mesh.vertex_xy(k));
        // Away from the grid edges the ground is exactly linear.
        let u = (p.x - leveled.layout.offset.x) / leveled.layout.size.x;
        if !(0.25..=0.75).contains(&u) {
            continue;
        }
        let (zl, zp) = (leveled.mesh.zs[k], plain.mesh.zs[k]);
        assert!(zl < zp, "shoreline vertex {k} not lowered: {zl} vs {zp}");
        lowered += 1;
    }
    assert!(lowered > 0);
}

#[test]
fn test_leveled_copies_agree_across_cuts() {
    let leveled = diagonal(true);
    let center_of = |it, jt| leveled.layout.tile_center(it, jt);
    let span = leveled.spans[0];
    for tile in &leveled.tiles.tiles {
        let (Some(land), Some(water)) = (tile.mesh_for_cut(0), tile.mesh_for_cut(1)) else {
            continue;
        };
        let c = center_of(tile.it, tile.jt);
        for k in span.vertices() {
            let p = leveled.mesh.vertex_xy(k) - c;
            let find = |m: &landfall_terrain::tiles::TileMesh| {
                m.indices[..m.surface_indices]
                    .iter()
                    .map(|&i| &m.vertices[i as usize])
                    .find(|v| {
                        (v.position[0] as f64 - p.x).abs() < 1e-3 && (v.position[1] as f64 - p.y).abs() < 1e-3
                    })
                    .map(|v| v.position[2])
            };
            if let (Some(zl), Some(zw)) = (find(land), find(water)) {
                let scale = zl.abs().max(1.0);
                assert!((zl - zw).abs() <= 1e-6 * scale, "copies of vertex {k}: {zl} vs {zw}");
            }
        }
    }
}

// ---- Queries ----

#[test]
fn test_height_query_is_deterministic() {
    let (params, inputs) = diagonal_params(true);
    let terrain = Terrain::generate("diag", &params, &inputs).unwrap();
    let again = generate(&params, &inputs).unwrap();
    assert_eq!(terrain.mesh(), &again.mesh, "generation is deterministic");

    for p in random_points(&again, 500, 42) {
        let a = terrain.height_with_normal(p.x, p.y).unwrap();
        let b = terrain.height_with_normal(p.x, p.y).unwrap();
        assert_eq!(a.z.to_bits(), b.z.to_bits());
        assert_eq!(a, b);
    }
}

#[test]
fn test_override_precedence() {
    let (params, inputs) = flat_params(6);
    let mut terrain = Terrain::generate("flat", &params, &inputs).unwrap();
    let p = DVec2::new(30.0, -40.0);
    let bare = terrain.height_with_normal(p.x, p.y).unwrap();

    terrain.register_virtual_surface(HorizontalDisc::new(p, 20.0, 50.0, GroundType::Runway));
    assert_eq!(terrain.height_with_normal(p.x, p.y).unwrap(), bare, "buried pad ignored");

    terrain.register_virtual_surface(
        HorizontalPolygon::new(
            vec![
                p + DVec2::new(-10.0, -10.0),
                p + DVec2::new(10.0, -10.0),
                p + DVec2::new(10.0, 10.0),
                p + DVec2::new(-10.0, 10.0),
            ],
            150.0,
            GroundType::Runway,
        )
        .with_convex(true),
    );
    let top = terrain.height_with_normal(p.x, p.y).unwrap();
    assert_eq!(top.z, 150.0);
    assert_eq!(top.normal, glam::DVec3::Z);
    assert_eq!(top.ground, GroundType::Runway);

    let outside = terrain.height_with_normal(p.x + 15.0, p.y).unwrap();
    assert!((outside.z - bare.z).abs() < 1e-9, "pad does not reach");
}
