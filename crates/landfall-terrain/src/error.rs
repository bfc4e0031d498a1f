//! Error type shared by the terrain pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Side of a boundary chain inside an interface quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The higher cut, to the left of the boundary curve.
    Dominant,
    /// The lower cut, to the right of the boundary curve.
    Recessive,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Dominant => f.write_str("dominant"),
            Side::Recessive => f.write_str("recessive"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("ambiguous boundary: cuts {labels:?} meet at quad ({i}, {j})")]
    AmbiguousBoundary { i: usize, j: usize, labels: Vec<u32> },

    #[error("{side} side polygon of quad ({i}, {j}) is not counter-clockwise")]
    WindingViolation { i: usize, j: usize, side: Side },

    #[error("triangulating quad ({i}, {j}) gave {got} triangles, expected {expected}")]
    TriangulationFailed {
        i: usize,
        j: usize,
        expected: usize,
        got: usize,
    },

    #[error("{}: missing field '{field}' in section [{section}]", path.display())]
    MissingField {
        path: PathBuf,
        section: String,
        field: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("malformed cache data: {0}")]
    Format(String),
}

pub type TerrainResult<T> = Result<T, TerrainError>;

impl TerrainError {
    /// Wrap an I/O error with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TerrainError::Io {
            path: path.into(),
            source,
        }
    }
}
