//! Chunk and buffer shape planning.
//!
//! A logical array is written in *chunks* (the unit of on-disk compression)
//! and read in *buffers* (the unit of one in-memory transfer).
//! Every buffer is a whole number of chunks along each axis,
//! except where it is clamped to the full extent of the array.
use serde::{Deserialize, Serialize};

use crate::{error::ConfigurationError, tile::TileGrid};

/// Bytes in one mebibyte, the unit of `chunk_mb`.
pub const MIB: u64 = 1 << 20;
/// Bytes in one gibibyte, the unit of `buffer_gb`.
pub const GIB: u64 = 1 << 30;

pub const DEFAULT_CHUNK_MB: f64 = 1.0;
pub const DEFAULT_BUFFER_GB: f64 = 1.0;

/// How to size the chunk and buffer grids.
///
/// For each grid, at most one of the byte budget and the explicit shape may be given.
/// If neither is given, the default budget is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizingOptions {
    /// Upper bound on the size of one chunk, in MiB. Default 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_mb: Option<f64>,
    /// Explicit chunk shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_shape: Option<Vec<u64>>,
    /// Upper bound on the size of one buffer, in GiB. Default 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_gb: Option<f64>,
    /// Explicit buffer shape; must be a multiple of the chunk shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_shape: Option<Vec<u64>>,
}

impl SizingOptions {
    pub fn with_chunk_mb(mut self, chunk_mb: f64) -> Self {
        self.chunk_mb = Some(chunk_mb);
        self
    }

    pub fn with_chunk_shape(mut self, chunk_shape: impl Into<Vec<u64>>) -> Self {
        self.chunk_shape = Some(chunk_shape.into());
        self
    }

    pub fn with_buffer_gb(mut self, buffer_gb: f64) -> Self {
        self.buffer_gb = Some(buffer_gb);
        self
    }

    pub fn with_buffer_shape(mut self, buffer_shape: impl Into<Vec<u64>>) -> Self {
        self.buffer_shape = Some(buffer_shape.into());
        self
    }

    pub fn from_json(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Resolved chunk and buffer shapes for one logical array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlanner {
    maxshape: Vec<u64>,
    itemsize: usize,
    chunk_shape: Vec<u64>,
    buffer_shape: Vec<u64>,
}

impl ChunkPlanner {
    /// Resolve shapes for an array of the given maximum shape and element size.
    pub fn new(
        maxshape: &[u64],
        itemsize: usize,
        options: &SizingOptions,
    ) -> Result<Self, ConfigurationError> {
        if maxshape.is_empty() {
            return Err(ConfigurationError::EmptyMaxshape);
        }
        if let Some(axis) = maxshape.iter().position(|&n| n == 0) {
            return Err(ConfigurationError::ZeroExtent {
                axis,
                maxshape: maxshape.to_vec(),
            });
        }
        if itemsize == 0 {
            return Err(ConfigurationError::ZeroItemsize);
        }

        let chunk_shape = match (options.chunk_mb, &options.chunk_shape) {
            (Some(_), Some(_)) => return Err(ConfigurationError::ConflictingChunkSpec),
            (_, Some(shape)) => {
                check_manual_shape("chunk_shape", shape, maxshape)?;
                clamp(shape, maxshape)
            }
            (chunk_mb, None) => {
                let chunk_mb = chunk_mb.unwrap_or(DEFAULT_CHUNK_MB);
                let budget = budget_bytes("chunk_mb", chunk_mb, MIB)?;
                auto_chunk_shape(maxshape, itemsize, budget)
            }
        };

        let buffer_shape = match (options.buffer_gb, &options.buffer_shape) {
            (Some(_), Some(_)) => return Err(ConfigurationError::ConflictingBufferSpec),
            (_, Some(shape)) => {
                check_manual_shape("buffer_shape", shape, maxshape)?;
                let shape = clamp(shape, maxshape);
                check_buffer_multiple(&shape, &chunk_shape, maxshape)?;
                shape
            }
            (buffer_gb, None) => {
                let buffer_gb = buffer_gb.unwrap_or(DEFAULT_BUFFER_GB);
                let budget = budget_bytes("buffer_gb", buffer_gb, GIB)?;
                auto_buffer_shape(maxshape, &chunk_shape, itemsize, budget)
            }
        };

        log::debug!(
            "planned maxshape {maxshape:?} ({itemsize} B/element): chunk_shape {chunk_shape:?}, buffer_shape {buffer_shape:?}"
        );

        Ok(Self {
            maxshape: maxshape.to_vec(),
            itemsize,
            chunk_shape,
            buffer_shape,
        })
    }

    pub fn maxshape(&self) -> &[u64] {
        &self.maxshape
    }

    pub fn itemsize(&self) -> usize {
        self.itemsize
    }

    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    pub fn buffer_shape(&self) -> &[u64] {
        &self.buffer_shape
    }

    pub fn chunk_nbytes(&self) -> u64 {
        nbytes(&self.chunk_shape, self.itemsize)
    }

    pub fn buffer_nbytes(&self) -> u64 {
        nbytes(&self.buffer_shape, self.itemsize)
    }

    /// Number of buffers along each axis.
    pub fn buffer_grid_shape(&self) -> Vec<u64> {
        self.tile_grid().grid_shape().to_vec()
    }

    pub fn num_buffers(&self) -> u64 {
        self.tile_grid().num_tiles()
    }

    pub(crate) fn tile_grid(&self) -> TileGrid {
        TileGrid::new(&self.maxshape, &self.buffer_shape)
    }
}

/// Saturating size in bytes of an array of this shape.
fn nbytes(shape: &[u64], itemsize: usize) -> u64 {
    shape
        .iter()
        .fold(itemsize as u64, |acc, &n| acc.saturating_mul(n))
}

fn budget_bytes(what: &'static str, value: f64, unit: u64) -> Result<u64, ConfigurationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigurationError::InvalidBudget { what, value });
    }
    // float-to-int casts saturate
    Ok((value * unit as f64) as u64)
}

fn check_manual_shape(
    what: &'static str,
    shape: &[u64],
    maxshape: &[u64],
) -> Result<(), ConfigurationError> {
    if shape.len() != maxshape.len() {
        return Err(ConfigurationError::RankMismatch {
            what,
            expected: maxshape.len(),
            actual: shape.len(),
        });
    }
    if let Some(axis) = shape.iter().position(|&n| n == 0) {
        return Err(ConfigurationError::ZeroShapeEntry {
            what,
            axis,
            shape: shape.to_vec(),
        });
    }
    Ok(())
}

fn clamp(shape: &[u64], maxshape: &[u64]) -> Vec<u64> {
    shape.iter().zip(maxshape).map(|(s, m)| *s.min(m)).collect()
}

fn check_buffer_multiple(
    buffer_shape: &[u64],
    chunk_shape: &[u64],
    maxshape: &[u64],
) -> Result<(), ConfigurationError> {
    for (axis, ((b, c), m)) in buffer_shape.iter().zip(chunk_shape).zip(maxshape).enumerate() {
        if b % c != 0 && b != m {
            return Err(ConfigurationError::BufferNotChunkMultiple {
                axis,
                buffer_shape: buffer_shape.to_vec(),
                chunk_shape: chunk_shape.to_vec(),
                extent: *m,
            });
        }
    }
    Ok(())
}

/// Largest chunk shape within `budget` bytes, grown by doubling from all ones.
///
/// The trailing (fastest-varying) axis is grown first, so chunks are contiguous in memory.
/// If even a single element exceeds the budget, the result is all ones.
pub fn auto_chunk_shape(maxshape: &[u64], itemsize: usize, budget: u64) -> Vec<u64> {
    let mut shape = vec![1; maxshape.len()];
    for axis in (0..maxshape.len()).rev() {
        while shape[axis] < maxshape[axis] {
            let previous = shape[axis];
            shape[axis] = previous.saturating_mul(2).min(maxshape[axis]);
            if nbytes(&shape, itemsize) > budget {
                shape[axis] = previous;
                break;
            }
        }
    }
    shape
}

/// Largest buffer shape within `budget` bytes, grown in whole chunks.
///
/// The leading (slowest-varying) axis is filled first.
/// An axis whose chunk multiple would reach past the array is set to the full extent.
/// A chunk which alone exceeds the budget is returned unchanged.
pub fn auto_buffer_shape(
    maxshape: &[u64],
    chunk_shape: &[u64],
    itemsize: usize,
    budget: u64,
) -> Vec<u64> {
    let mut shape = chunk_shape.to_vec();
    for axis in 0..maxshape.len() {
        let chunk = chunk_shape[axis];
        let mut others = shape.clone();
        others[axis] = 1;
        let per_index = nbytes(&others, itemsize);
        let multiples = budget / per_index / chunk;
        if multiples <= 1 {
            continue;
        }
        let extent = multiples.saturating_mul(chunk);
        shape[axis] = if extent >= maxshape[axis] {
            maxshape[axis]
        } else {
            extent
        };
    }
    shape
}
