//! Content-addressed terrain cache.
//!
//! Each named terrain owns a directory:
//!
//! ```text
//! <root>/<name>/terrain.key     hex SHA-256 of everything generation reads
//! <root>/<name>/celldata.json   grid layout
//! <root>/<name>/elevdata.bin    global mesh ("LFEL")
//! <root>/<name>/geomdata.bin    baked tiles ("LFTM")
//! ```
//!
//! The key file is written last, so a directory whose key matches is
//! complete. Any problem while loading is a miss, never an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glam::DVec2;
use landfall_core::constants::ALGORITHM_VERSION;
use sha2::{Digest, Sha256};

use crate::error::{TerrainError, TerrainResult};
use crate::grid::GridLayout;
use crate::mesh::TerrainMesh;
use crate::params::GenerationParams;
use crate::tiles::{LodRange, Tile, TileMesh, TileSet, TileVertex};

pub const KEY_FILE: &str = "terrain.key";
pub const CELL_FILE: &str = "celldata.json";
pub const ELEV_FILE: &str = "elevdata.bin";
pub const GEOM_FILE: &str = "geomdata.bin";

const ELEV_MAGIC: [u8; 4] = *b"LFEL";
const GEOM_MAGIC: [u8; 4] = *b"LFTM";
const BLOB_VERSION: u16 = 1;

/// Floats per [`TileVertex`].
const VERTEX_FLOATS: usize = std::mem::size_of::<TileVertex>() / 4;
/// Smallest encoded tile: indices, center, LOD range and mesh count.
const TILE_RECORD_MIN: usize = 2 * 4 + 4 * 8 + 4;
/// Smallest encoded tile mesh: cut, vertex count, index count, surface count.
const MESH_RECORD_MIN: usize = 4 * 4;

/// Hash identifying one generation result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash the algorithm version, the parameters and every input file.
    pub fn compute(params: &GenerationParams) -> TerrainResult<Self> {
        let mut hasher = Sha256::new();
        hasher.update(ALGORITHM_VERSION.to_le_bytes());
        // serde_json maps are sorted, which makes the encoding canonical.
        let value = serde_json::to_value(params)
            .map_err(|e| TerrainError::InvalidInput(format!("unencodable parameters: {e}")))?;
        hasher.update(value.to_string().as_bytes());
        for path in params.input_files() {
            let data = fs::read(&path).map_err(|e| TerrainError::io(&path, e))?;
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update((data.len() as u64).to_le_bytes());
            hasher.update(&data);
        }
        let hex = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        Ok(Self(hex))
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Everything restored on a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTerrain {
    pub layout: GridLayout,
    pub mesh: TerrainMesh,
    pub tiles: TileSet,
}

/// Cache directory root.
#[derive(Debug, Clone)]
pub struct TerrainCache {
    root: PathBuf,
}

impl TerrainCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of terrain `name`.
    pub fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Replace the cached data of `name`.
    pub fn store(
        &self,
        name: &str,
        key: &CacheKey,
        layout: &GridLayout,
        mesh: &TerrainMesh,
        tiles: &TileSet,
    ) -> TerrainResult<()> {
        let dir = self.dir(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(TerrainError::io(&dir, e)),
        }
        fs::create_dir_all(&dir).map_err(|e| TerrainError::io(&dir, e))?;

        write_file(&dir.join(GEOM_FILE), &encode_tiles(tiles))?;
        write_file(&dir.join(ELEV_FILE), &encode_mesh(mesh))?;
        let cell = serde_json::to_vec_pretty(layout)
            .map_err(|e| TerrainError::Format(format!("cell data: {e}")))?;
        write_file(&dir.join(CELL_FILE), &cell)?;
        write_file(&dir.join(KEY_FILE), key.as_str().as_bytes())?;

        tracing::info!(name, dir = %dir.display(), "terrain cached");
        Ok(())
    }

    /// Cached data of `name` if its key matches.
    pub fn load(&self, name: &str, key: &CacheKey) -> Option<CachedTerrain> {
        let dir = self.dir(name);
        let stored = match fs::read_to_string(dir.join(KEY_FILE)) {
            Ok(s) => s,
            Err(_) => {
                tracing::info!(name, "terrain cache miss: no key");
                return None;
            }
        };
        if stored.trim() != key.as_str() {
            tracing::info!(name, "terrain cache miss: key changed");
            return None;
        }
        match read_entry(&dir) {
            Ok(cached) => {
                tracing::info!(name, "terrain cache hit");
                Some(cached)
            }
            Err(e) => {
                tracing::warn!(name, error = %e, "terrain cache unreadable, regenerating");
                None
            }
        }
    }
}

fn write_file(path: &Path, data: &[u8]) -> TerrainResult<()> {
    fs::write(path, data).map_err(|e| TerrainError::io(path, e))
}

fn read_file(path: &Path) -> TerrainResult<Vec<u8>> {
    fs::read(path).map_err(|e| TerrainError::io(path, e))
}

fn read_entry(dir: &Path) -> TerrainResult<CachedTerrain> {
    let layout: GridLayout = serde_json::from_slice(&read_file(&dir.join(CELL_FILE))?)
        .map_err(|e| TerrainError::Format(format!("cell data: {e}")))?;
    let mesh = decode_mesh(&read_file(&dir.join(ELEV_FILE))?)?;
    let tiles = decode_tiles(&read_file(&dir.join(GEOM_FILE))?)?;
    if mesh.num_quads() != layout.num_quads() {
        return Err(TerrainError::Format(format!(
            "quadmap has {} quads, layout {}",
            mesh.num_quads(),
            layout.num_quads()
        )));
    }
    Ok(CachedTerrain {
        layout,
        mesh,
        tiles,
    })
}

// --- Blob encoding ---

#[derive(Default)]
struct BlobWriter {
    buf: Vec<u8>,
}

impl BlobWriter {
    fn header(magic: [u8; 4]) -> Self {
        let mut w = Self::default();
        w.buf.extend_from_slice(&magic);
        w.buf.extend_from_slice(&BLOB_VERSION.to_le_bytes());
        w
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn len(&mut self, n: usize) {
        self.u32(n as u32);
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32s(&mut self, vs: &[u32]) {
        self.len(vs.len());
        vs.iter().for_each(|&v| self.u32(v));
    }

    fn f64s(&mut self, vs: &[f64]) {
        self.len(vs.len());
        vs.iter().for_each(|&v| self.f64(v));
    }
}

struct BlobReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    fn open(data: &'a [u8], magic: [u8; 4]) -> TerrainResult<Self> {
        let mut r = Self { data, pos: 0 };
        if r.take(4)? != magic {
            return Err(TerrainError::Format("bad magic bytes".into()));
        }
        let version = u16::from_le_bytes(r.array()?);
        if version != BLOB_VERSION {
            return Err(TerrainError::Format(format!("unsupported version {version}")));
        }
        Ok(r)
    }

    fn take(&mut self, n: usize) -> TerrainResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| TerrainError::Format(format!("truncated at byte {}", self.pos)))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> TerrainResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> TerrainResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn len(&mut self) -> TerrainResult<usize> {
        Ok(self.u32()? as usize)
    }

    /// Element count of a sequence whose records take at least
    /// `record_size` bytes each. Counts the remaining bytes cannot hold
    /// are rejected before anything is allocated.
    fn count(&mut self, record_size: usize) -> TerrainResult<usize> {
        let n = self.len()?;
        let remaining = self.data.len() - self.pos;
        match n.checked_mul(record_size) {
            Some(bytes) if bytes <= remaining => Ok(n),
            _ => Err(TerrainError::Format(format!(
                "count {n} at byte {} exceeds the {remaining} bytes left",
                self.pos
            ))),
        }
    }

    fn f32(&mut self) -> TerrainResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> TerrainResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn u32s(&mut self) -> TerrainResult<Vec<u32>> {
        let n = self.count(4)?;
        (0..n).map(|_| self.u32()).collect()
    }

    fn f64s(&mut self) -> TerrainResult<Vec<f64>> {
        let n = self.count(8)?;
        (0..n).map(|_| self.f64()).collect()
    }

    fn finish(self) -> TerrainResult<()> {
        if self.pos != self.data.len() {
            return Err(TerrainError::Format(format!(
                "{} trailing bytes",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}

/// Serialize the global mesh.
pub fn encode_mesh(mesh: &TerrainMesh) -> Vec<u8> {
    let mut w = BlobWriter::header(ELEV_MAGIC);
    w.f64s(&mesh.xs);
    w.f64s(&mesh.ys);
    w.f64s(&mesh.zs);
    w.u32s(&mesh.tri_a);
    w.u32s(&mesh.tri_b);
    w.u32s(&mesh.tri_c);
    w.u32s(&mesh.tri_cut);
    w.len(mesh.quadmap.len());
    for &[start, end] in &mesh.quadmap {
        w.u32(start);
        w.u32(end);
    }
    w.f64s(&mesh.quad_max_z);
    w.f64(mesh.max_z);
    w.buf
}

/// Parse a blob written by [`encode_mesh`].
pub fn decode_mesh(data: &[u8]) -> TerrainResult<TerrainMesh> {
    let mut r = BlobReader::open(data, ELEV_MAGIC)?;
    let xs = r.f64s()?;
    let ys = r.f64s()?;
    let zs = r.f64s()?;
    let tri_a = r.u32s()?;
    let tri_b = r.u32s()?;
    let tri_c = r.u32s()?;
    let tri_cut = r.u32s()?;
    let nq = r.count(8)?;
    let quadmap = (0..nq)
        .map(|_| -> TerrainResult<[u32; 2]> { Ok([r.u32()?, r.u32()?]) })
        .collect::<TerrainResult<Vec<_>>>()?;
    let quad_max_z = r.f64s()?;
    let max_z = r.f64()?;
    r.finish()?;

    let nv = xs.len();
    let nt = tri_cut.len();
    if ys.len() != nv || zs.len() != nv {
        return Err(TerrainError::Format("vertex arrays differ in length".into()));
    }
    if tri_a.len() != nt || tri_b.len() != nt || tri_c.len() != nt {
        return Err(TerrainError::Format("triangle arrays differ in length".into()));
    }
    if [&tri_a, &tri_b, &tri_c].iter().any(|t| t.iter().any(|&v| v as usize >= nv)) {
        return Err(TerrainError::Format("triangle index out of range".into()));
    }
    if quadmap.iter().any(|&[s, e]| s > e || e as usize > nt) || quad_max_z.len() != nq {
        return Err(TerrainError::Format("quadmap out of range".into()));
    }
    Ok(TerrainMesh {
        xs,
        ys,
        zs,
        tri_a,
        tri_b,
        tri_c,
        tri_cut,
        quadmap,
        quad_max_z,
        max_z,
    })
}

/// Serialize baked tiles.
pub fn encode_tiles(tiles: &TileSet) -> Vec<u8> {
    let mut w = BlobWriter::header(GEOM_MAGIC);
    w.len(tiles.num_tiles_x);
    w.len(tiles.num_tiles_y);
    w.len(tiles.tiles.len());
    for tile in &tiles.tiles {
        w.len(tile.it);
        w.len(tile.jt);
        w.f64(tile.center.x);
        w.f64(tile.center.y);
        w.f64(tile.lod.far);
        w.f64(tile.lod.near);
        w.len(tile.meshes.len());
        for m in &tile.meshes {
            w.u32(m.cut);
            let floats: &[f32] = bytemuck::cast_slice(&m.vertices);
            w.len(m.vertices.len());
            floats.iter().for_each(|&f| w.f32(f));
            w.u32s(&m.indices);
            w.len(m.surface_indices);
        }
    }
    w.buf
}

/// Parse a blob written by [`encode_tiles`].
pub fn decode_tiles(data: &[u8]) -> TerrainResult<TileSet> {
    let mut r = BlobReader::open(data, GEOM_MAGIC)?;
    let num_tiles_x = r.len()?;
    let num_tiles_y = r.len()?;
    let count = r.count(TILE_RECORD_MIN)?;
    if num_tiles_x.checked_mul(num_tiles_y) != Some(count) {
        return Err(TerrainError::Format(format!(
            "{count} tiles in a {num_tiles_x} x {num_tiles_y} grid"
        )));
    }
    let mut tiles = Vec::with_capacity(count);
    for _ in 0..count {
        let it = r.len()?;
        let jt = r.len()?;
        let center = DVec2::new(r.f64()?, r.f64()?);
        let lod = LodRange {
            far: r.f64()?,
            near: r.f64()?,
        };
        let nm = r.count(MESH_RECORD_MIN)?;
        let mut meshes = Vec::with_capacity(nm);
        for _ in 0..nm {
            let cut = r.u32()?;
            let nv = r.count(VERTEX_FLOATS * 4)?;
            let floats = (0..nv * VERTEX_FLOATS)
                .map(|_| r.f32())
                .collect::<TerrainResult<Vec<f32>>>()?;
            let vertices: Vec<TileVertex> = bytemuck::cast_slice(&floats).to_vec();
            let indices = r.u32s()?;
            let surface_indices = r.len()?;
            if surface_indices > indices.len() || indices.iter().any(|&i| i as usize >= nv) {
                return Err(TerrainError::Format(format!("bad index buffer in tile ({it}, {jt})")));
            }
            meshes.push(TileMesh {
                cut,
                vertices,
                indices,
                surface_indices,
            });
        }
        tiles.push(Tile {
            it,
            jt,
            center,
            lod,
            meshes,
        });
    }
    r.finish()?;
    Ok(TileSet {
        num_tiles_x,
        num_tiles_y,
        tiles,
    })
}
