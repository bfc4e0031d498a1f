//! terrain-bake: generate, cache and probe terrains from the command line.
//!
//! Usage:
//!   terrain-bake synthetic --out demo/ --size 256 --seed 7
//!   terrain-bake bake demo/terrain.toml --cache cache/ --name demo
//!   terrain-bake probe demo/terrain.toml --cache cache/ --name demo --at 1200,-300

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use landfall_core::types::GroundType;
use landfall_terrain::{CutSpec, GenerationParams, Terrain, TerrainCache, UnitGrid};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "terrain-bake", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a terrain and store it in the cache.
    Bake(TerrainArgs),
    /// Write a synthetic heightmap, water mask, sidecar and parameter file.
    Synthetic(SyntheticArgs),
    /// Print height, normal and ground type at points of a terrain.
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct TerrainArgs {
    /// Generation parameters (TOML).
    params: PathBuf,
    /// Cache root directory.
    #[arg(short, long, default_value = "terrain-cache")]
    cache: PathBuf,
    /// Terrain name; defaults to the parameter file stem.
    #[arg(short, long)]
    name: Option<String>,
    /// Skip the cache and always run the pipeline.
    #[arg(long, default_value_t = false)]
    no_cache: bool,
}

#[derive(Args, Debug)]
struct SyntheticArgs {
    /// Output directory.
    #[arg(short, long, default_value = "synthetic")]
    out: PathBuf,
    /// Raster resolution in pixels per side.
    #[arg(short, long, default_value_t = 256)]
    size: u32,
    /// World size in kilometres per side.
    #[arg(long, default_value_t = 40.0)]
    extent_km: f64,
    /// Shift the coastline and islands with a seeded RNG.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    #[command(flatten)]
    terrain: TerrainArgs,
    /// Probe point as `x,y` in meters (repeatable).
    #[arg(long = "at", value_parser = parse_point)]
    points: Vec<(f64, f64)>,
    /// Number of additional uniformly random probe points.
    #[arg(long, default_value_t = 0)]
    random: usize,
    /// Seed for the random probe points.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Bake(args) => cmd_bake(&args),
        Command::Synthetic(args) => cmd_synthetic(&args),
        Command::Probe(args) => cmd_probe(&args),
    }
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {s:?}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in {s:?}: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y in {s:?}: {e}"))?;
    Ok((x, y))
}

fn load_terrain(args: &TerrainArgs) -> Result<Terrain> {
    let params = GenerationParams::load(&args.params)
        .with_context(|| format!("reading parameters {}", args.params.display()))?;
    let name = match &args.name {
        Some(n) => n.clone(),
        None => args
            .params
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("parameter file has no stem; pass --name")?,
    };
    let cache = (!args.no_cache).then(|| TerrainCache::new(&args.cache));
    Terrain::load(&name, &params, cache.as_ref()).with_context(|| format!("loading terrain {name}"))
}

// --- Bake command ---

fn cmd_bake(args: &TerrainArgs) -> Result<()> {
    let start = Instant::now();
    let terrain = load_terrain(args)?;
    let layout = terrain.layout();
    let mesh = terrain.mesh();
    let ext = terrain.extents();

    println!("terrain:   {}", terrain.name());
    println!(
        "extents:   ({:.1}, {:.1}) .. ({:.1}, {:.1}) m",
        ext.min.x, ext.min.y, ext.max.x, ext.max.y
    );
    println!(
        "quads:     {} x {} ({:.2} x {:.2} m)",
        layout.num_quads_x,
        layout.num_quads_y,
        layout.quad_size().x,
        layout.quad_size().y
    );
    println!("tiles:     {} x {}", layout.num_tiles_x, layout.num_tiles_y);
    println!("cuts:      {}", layout.num_cuts);
    println!("vertices:  {}", mesh.num_vertices());
    println!("triangles: {}", mesh.num_triangles());
    println!("max z:     {:.2} m", terrain.max_height());
    println!("elapsed:   {:.2?}", start.elapsed());
    Ok(())
}

// --- Probe command ---

fn cmd_probe(args: &ProbeArgs) -> Result<()> {
    let terrain = load_terrain(&args.terrain)?;
    let mut points = args.points.clone();
    if args.random > 0 {
        let ext = terrain.extents();
        let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
        points.extend((0..args.random).map(|_| {
            (
                rng.gen_range(ext.min.x..ext.max.x),
                rng.gen_range(ext.min.y..ext.max.y),
            )
        }));
    }
    if points.is_empty() {
        bail!("no probe points; pass --at x,y or --random N");
    }

    for (x, y) in points {
        match terrain.height_with_normal(x, y) {
            Some(s) => println!(
                "{x:>12.2} {y:>12.2}  z={:<10.3} n=({:.4}, {:.4}, {:.4})  {:?}",
                s.z, s.normal.x, s.normal.y, s.normal.z, s.ground
            ),
            None => println!("{x:>12.2} {y:>12.2}  outside terrain"),
        }
    }
    Ok(())
}

// --- Synthetic terrain command ---

/// Randomized placement of the synthetic features.
struct Features {
    phase: f64,
    islands: [(f64, f64); 3],
}

impl Features {
    fn fixed() -> Self {
        Self {
            phase: 0.0,
            islands: [(0.5, 0.48), (0.35, 0.42), (0.65, 0.52)],
        }
    }

    fn seeded(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut jitter = |(x, y): (f64, f64)| (x + rng.gen_range(-0.05..0.05), y + rng.gen_range(-0.03..0.03));
        let base = Self::fixed();
        let islands = base.islands.map(&mut jitter);
        Self {
            phase: rng.gen_range(0.0..std::f64::consts::TAU),
            islands,
        }
    }
}

fn cmd_synthetic(args: &SyntheticArgs) -> Result<()> {
    if args.size < 2 {
        bail!("raster size must be at least 2, got {}", args.size);
    }
    if !(args.extent_km > 0.0) {
        bail!("extent must be positive, got {} km", args.extent_km);
    }
    fs::create_dir_all(&args.out).with_context(|| format!("creating {}", args.out.display()))?;

    let features = args.seed.map(Features::seeded).unwrap_or_else(Features::fixed);
    let n = args.size as usize;
    let mut elevations = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let nx = (i as f64 + 0.5) / n as f64;
            let ny = (j as f64 + 0.5) / n as f64;
            elevations.push(synthetic_elevation(nx, ny, &features));
        }
    }
    let min_z = elevations.iter().copied().fold(f64::INFINITY, f64::min);
    let max_z = elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = (max_z - min_z).max(1.0);

    let height = UnitGrid::from_values(
        n,
        n,
        elevations.iter().map(|&z| ((z - min_z) / range) as f32).collect(),
    )?;
    let water = UnitGrid::from_values(
        n,
        n,
        elevations.iter().map(|&z| if z < 1.0 { 1.0 } else { 0.0 }).collect(),
    )?;

    let height_path = args.out.join("height.png");
    let water_path = args.out.join("water.png");
    height
        .to_luma8()
        .save(&height_path)
        .with_context(|| format!("writing {}", height_path.display()))?;
    water
        .to_luma8()
        .save(&water_path)
        .with_context(|| format!("writing {}", water_path.display()))?;

    let sidecar = args.out.join("height.meta.toml");
    write_text(&sidecar, &sidecar_text(args.extent_km, min_z, min_z + range))?;

    let size = args.extent_km * 1000.0;
    let mut params = GenerationParams::new(size, size);
    params.heightmap = Some(PathBuf::from("height.png"));
    params.cuts.push(CutSpec {
        name: "water".into(),
        mask: PathBuf::from("water.png"),
        level: true,
        ground: Some(GroundType::Water),
    });
    let params_path = args.out.join("terrain.toml");
    let text = toml::to_string_pretty(&params).context("encoding parameters")?;
    write_text(&params_path, &text)?;

    tracing::info!(
        size = n,
        min_z,
        max_z,
        params = %params_path.display(),
        "synthetic terrain written"
    );
    Ok(())
}

fn sidecar_text(extent_km: f64, min_z: f64, max_z: f64) -> String {
    format!(
        "[extents]\nsizex = {extent_km:?}\nsizey = {extent_km:?}\nminz = {min_z:?}\nmaxz = {max_z:?}\n\n\
         [flat-harbor]\ncenterx = {:?}\ncentery = {:?}\nradius = {:?}\nradiusout = {:?}\n",
        0.0,
        0.3 * extent_km,
        0.01 * extent_km,
        0.02 * extent_km,
    )
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Synthetic elevation at normalized coordinates (`nx` east, `ny` north):
/// a mountainous northern coast, a lower southern coast with an eastern
/// hook, open water between them and a few islands.
fn synthetic_elevation(nx: f64, ny: f64, features: &Features) -> f64 {
    let ph = features.phase;
    let north_shore = 0.55 + 0.05 * (nx * 8.0 + ph).sin() + 0.03 * (nx * 15.0).sin();
    let north_land = if ny > north_shore {
        let depth = (ny - north_shore) / (1.0 - north_shore);
        let ridge = 400.0 * ((nx * 12.0 + ph).sin() * 0.5 + 0.5);
        let noise = 150.0 * ((nx * 30.0 + ny * 20.0).sin() * (ny * 25.0).cos());
        depth * 1200.0 + ridge + noise
    } else {
        0.0
    };

    let south_shore = 0.3 - 0.04 * (nx * 6.0 + ph).sin() + 0.02 * (nx * 20.0).cos()
        + 0.15 * smooth_step(nx, 0.6, 0.8);
    let south_land = if ny < south_shore {
        let depth = (south_shore - ny) / south_shore;
        depth * 400.0 + 100.0 * ((nx * 10.0).sin() * (ny * 15.0).cos())
    } else {
        0.0
    };

    let [(x1, y1), (x2, y2), (x3, y3)] = features.islands;
    let elev = north_land
        .max(south_land)
        .max(island_elevation(nx, ny, x1, y1, 0.12, 0.03, 200.0))
        .max(island_elevation(nx, ny, x2, y2, 0.04, 0.02, 80.0))
        .max(island_elevation(nx, ny, x3, y3, 0.03, 0.02, 120.0));

    if elev < 1.0 {
        -20.0 - 30.0 * (nx * 5.0 + ny * 3.0).sin().abs() - 10.0 * (nx * 12.0 + ny * 8.0).sin()
    } else {
        elev
    }
}

/// Elliptical island at (cx, cy) with semi-axes (rx, ry).
fn island_elevation(nx: f64, ny: f64, cx: f64, cy: f64, rx: f64, ry: f64, peak: f64) -> f64 {
    let dx = (nx - cx) / rx;
    let dy = (ny - cy) / ry;
    let dist_sq = dx * dx + dy * dy;
    if dist_sq > 1.0 {
        return 0.0;
    }
    let t = 1.0 - dist_sq;
    peak * t * t
}

fn smooth_step(x: f64, edge0: f64, edge1: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("12.5,-3").unwrap(), (12.5, -3.0));
        assert_eq!(parse_point(" 1 , 2 ").unwrap(), (1.0, 2.0));
        assert!(parse_point("12.5").is_err());
        assert!(parse_point("a,1").is_err());
    }

    #[test]
    fn test_synthetic_has_land_and_water() {
        let features = Features::fixed();
        assert!(synthetic_elevation(0.5, 0.95, &features) > 100.0, "northern mountains");
        assert!(synthetic_elevation(0.1, 0.45, &features) < 0.0, "open strait");
    }

    #[test]
    fn test_seeded_layout_is_reproducible() {
        let a = Features::seeded(3);
        let b = Features::seeded(3);
        assert_eq!(a.phase, b.phase);
        assert_eq!(a.islands, b.islands);
    }

    #[test]
    fn test_sidecar_parses() {
        let text = sidecar_text(40.0, -60.0, 1800.0);
        let meta = landfall_terrain::metadata::parse_metadata(&text, Path::new("height.meta.toml")).unwrap();
        assert_eq!(meta.max_size_x_south, 40_000.0);
        assert_eq!(meta.min_height, -60.0);
        assert_eq!(meta.flats.len(), 1);
        assert_eq!(meta.flats[0].name, "harbor");
    }

    #[test]
    fn test_synthetic_writes_loadable_params() {
        let dir = tempfile::tempdir().unwrap();
        let args = SyntheticArgs {
            out: dir.path().to_path_buf(),
            size: 16,
            extent_km: 4.0,
            seed: Some(1),
        };
        cmd_synthetic(&args).unwrap();
        let params = GenerationParams::load(&dir.path().join("terrain.toml")).unwrap();
        assert_eq!(params.size_x, 4000.0);
        assert_eq!(params.cuts.len(), 1);
        assert!(params.heightmap.as_ref().unwrap().is_file());
        assert!(params.cuts[0].mask.is_file());
        assert!(params.sidecar_path().is_some(), "sidecar found next to the heightmap");
    }
}
