//! Load-time generation: cut map to tiled mesh, strictly in sequence.

use std::time::Instant;

use crate::chain::extract_chains;
use crate::curve::build_curves;
use crate::cutmap::CutMap;
use crate::elevation::{assign_heights, merge_flats, HeightField, HeightScale};
use crate::error::TerrainResult;
use crate::frames::compute_all_frames;
use crate::grid::GridLayout;
use crate::level::level_boundaries;
use crate::mesh::TerrainMesh;
use crate::params::{GenerationInputs, GenerationParams};
use crate::tiles::{build_tiles, TileSet};
use crate::triangulate::{triangulate, CurveSpan};

/// Output of a full generation run.
#[derive(Debug, Clone)]
pub struct GeneratedTerrain {
    pub layout: GridLayout,
    pub cut_map: CutMap,
    pub mesh: TerrainMesh,
    /// Boundary curves as stored in the mesh.
    pub spans: Vec<CurveSpan>,
    pub tiles: TileSet,
}

/// Run the whole pipeline on a layout derived from the inputs.
pub fn generate(params: &GenerationParams, inputs: &GenerationInputs) -> TerrainResult<GeneratedTerrain> {
    let layout = GridLayout::derive(params, inputs)?;
    generate_on(layout, params, inputs)
}

/// Run the whole pipeline on a given layout.
pub fn generate_on(
    layout: GridLayout,
    params: &GenerationParams,
    inputs: &GenerationInputs,
) -> TerrainResult<GeneratedTerrain> {
    let started = Instant::now();
    let mut stage = Instant::now();
    let mut lap = |name: &str| {
        tracing::debug!(stage = name, elapsed_ms = stage.elapsed().as_millis() as u64, "generation stage done");
        stage = Instant::now();
    };

    let cut_map = CutMap::build(&layout, &inputs.masks, params.periodic);
    lap("cut map");

    let chains = extract_chains(&cut_map)?;
    lap("boundary chains");

    let curves = build_curves(&layout, &cut_map, &chains, &params.smoothing);
    lap("boundary curves");

    let tri = triangulate(
        &layout,
        &cut_map,
        &chains,
        &curves,
        params.smoothing.even_subdivision(),
    )?;
    let (mut mesh, spans) = (tri.mesh, tri.spans);
    lap("triangulation");

    let meta = inputs.metadata.as_ref();
    let field = HeightField::new(
        &layout,
        &inputs.heightmap,
        HeightScale::resolve(params, meta),
        params.periodic,
        merge_flats(params, meta),
    );
    assign_heights(&mut mesh, &field);
    lap("heights");

    level_boundaries(&layout, &mut mesh, &spans);
    mesh.compute_max_heights();
    lap("leveling");

    let frames = compute_all_frames(&layout, &mesh);
    lap("normals");

    let tiles = build_tiles(&layout, &mesh, &frames);
    lap("tiles");

    tracing::info!(
        quads = layout.num_quads(),
        vertices = mesh.num_vertices(),
        triangles = mesh.num_triangles(),
        chains = chains.len(),
        tiles = tiles.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "terrain generated"
    );

    Ok(GeneratedTerrain {
        layout,
        cut_map,
        mesh,
        spans,
        tiles,
    })
}
