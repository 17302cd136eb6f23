use zarrs::{
    array::{ArrayCreateError, ArrayError},
    storage::StorageError,
};

use crate::{dtype::Dtype, tile::TileIndex};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    BlockShape(#[from] BlockShapeError),
    /// An error raised by a [`BlockSource`](crate::source::BlockSource),
    /// passed through untouched.
    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    ArrayCreate(#[from] ArrayCreateError),
    #[error(transparent)]
    Array(#[from] ArrayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    pub(crate) fn source_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Source(Box::new(error))
    }

    /// Recover the original block source error, if this is one.
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Source(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Invalid or conflicting sizing parameters.
///
/// Always raised while constructing a planner or iterator, before any data is read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("maxshape must have at least one axis")]
    EmptyMaxshape,
    #[error("maxshape has a zero extent on axis {axis}: {maxshape:?}")]
    ZeroExtent { axis: usize, maxshape: Vec<u64> },
    #[error("element size must be at least one byte")]
    ZeroItemsize,
    #[error("only one of chunk_mb and chunk_shape may be given")]
    ConflictingChunkSpec,
    #[error("only one of buffer_gb and buffer_shape may be given")]
    ConflictingBufferSpec,
    #[error("{what} has rank {actual}, but maxshape has rank {expected}")]
    RankMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{what} has a zero extent on axis {axis}: {shape:?}")]
    ZeroShapeEntry {
        what: &'static str,
        axis: usize,
        shape: Vec<u64>,
    },
    #[error("{what} must be finite and positive, got {value}")]
    InvalidBudget { what: &'static str, value: f64 },
    #[error(
        "buffer_shape {buffer_shape:?} is not a multiple of chunk_shape {chunk_shape:?} on axis {axis} \
         (and does not span the full extent {extent})"
    )]
    BufferNotChunkMultiple {
        axis: usize,
        buffer_shape: Vec<u64>,
        chunk_shape: Vec<u64>,
        extent: u64,
    },
}

/// A fetched block that does not match the tile it was requested for.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockShapeError {
    #[error("block for tile {tile} has shape {actual:?}, expected {expected:?}")]
    Shape {
        tile: TileIndex,
        expected: Vec<u64>,
        actual: Vec<u64>,
    },
    #[error("block for tile {tile} has dtype {actual}, expected {expected}")]
    Dtype {
        tile: TileIndex,
        expected: Dtype,
        actual: Dtype,
    },
    #[error("block for tile {tile} holds {actual} bytes, expected {expected}")]
    ByteLength {
        tile: TileIndex,
        expected: usize,
        actual: usize,
    },
}
