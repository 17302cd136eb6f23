//! Lazy, bounded-memory traversal of a logical array.
use std::iter::FusedIterator;

use crate::{
    block::DataBlock,
    dtype::Dtype,
    error::BlockShapeError,
    planner::{ChunkPlanner, SizingOptions},
    progress::{ProgressOptions, ProgressReporter},
    source::BlockSource,
    tile::{TileGrid, TileIndex},
};

/// One buffer's worth of data and the region of the logical array it belongs in.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub data: DataBlock,
    pub index: TileIndex,
}

impl Tile {
    pub fn into_parts(self) -> (DataBlock, TileIndex) {
        (self.data, self.index)
    }
}

/// Where a [ChunkedArraySource] is in its traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationState {
    /// Shapes are resolved; nothing has been fetched.
    Created,
    /// `cursor` is the row-major position of the next tile in the buffer grid.
    Iterating { cursor: u64 },
    /// Every tile has been yielded.
    Exhausted,
    /// A fetch failed or returned a malformed block; no further tiles will be produced.
    Failed,
}

/// Walks a logical array in buffer-sized tiles,
/// fetching each from a [BlockSource].
///
/// Tiles are yielded in row-major order over the buffer grid,
/// cover the array exactly once, and are truncated at the array's trailing edges.
/// The iterator is single-pass: once finished (or failed) it only yields `None`.
#[derive(Debug)]
pub struct ChunkedArraySource<S> {
    source: S,
    planner: ChunkPlanner,
    dtype: Dtype,
    grid: TileGrid,
    state: IterationState,
    progress: Option<ProgressReporter>,
}

impl<S: BlockSource> ChunkedArraySource<S> {
    /// Resolve shape and dtype from the source, and plan with the given sizing.
    pub fn new(source: S, sizing: SizingOptions) -> crate::Result<Self> {
        Self::builder(source).sizing(sizing).build()
    }

    pub fn builder(source: S) -> ChunkedArraySourceBuilder<S> {
        ChunkedArraySourceBuilder::new(source)
    }

    pub fn maxshape(&self) -> &[u64] {
        self.planner.maxshape()
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn chunk_shape(&self) -> &[u64] {
        self.planner.chunk_shape()
    }

    pub fn buffer_shape(&self) -> &[u64] {
        self.planner.buffer_shape()
    }

    pub fn planner(&self) -> &ChunkPlanner {
        &self.planner
    }

    pub fn state(&self) -> IterationState {
        self.state
    }

    pub fn tiles_total(&self) -> u64 {
        self.grid.num_tiles()
    }

    pub fn tiles_remaining(&self) -> u64 {
        match self.state {
            IterationState::Created => self.grid.num_tiles(),
            IterationState::Iterating { cursor } => self.grid.num_tiles() - cursor,
            IterationState::Exhausted | IterationState::Failed => 0,
        }
    }

    /// The bar drawn when progress display is enabled.
    #[cfg(feature = "progress")]
    pub fn progress_bar(&self) -> Option<&indicatif::ProgressBar> {
        self.progress.as_ref().map(ProgressReporter::bar)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    fn check_block(&self, tile: &TileIndex, block: &DataBlock) -> Result<(), BlockShapeError> {
        let expected = tile.shape();
        if block.shape() != expected.as_slice() {
            return Err(BlockShapeError::Shape {
                tile: tile.clone(),
                expected,
                actual: block.shape().to_vec(),
            });
        }
        if block.dtype() != self.dtype {
            return Err(BlockShapeError::Dtype {
                tile: tile.clone(),
                expected: self.dtype,
                actual: block.dtype(),
            });
        }
        let expected_bytes = tile.num_elements() as usize * self.dtype.itemsize();
        if block.as_bytes().len() != expected_bytes {
            return Err(BlockShapeError::ByteLength {
                tile: tile.clone(),
                expected: expected_bytes,
                actual: block.as_bytes().len(),
            });
        }
        Ok(())
    }

    fn fetch(&mut self, cursor: u64) -> Option<crate::Result<Tile>> {
        let Some(index) = self.grid.tile(cursor) else {
            log::debug!("traversal of {:?} complete", self.maxshape());
            self.state = IterationState::Exhausted;
            return None;
        };
        log::trace!("fetching tile {} of {}: {index}", cursor + 1, self.tiles_total());

        let data = match self.source.fetch_block(&index) {
            Ok(data) => data,
            Err(e) => {
                self.fail();
                return Some(Err(crate::Error::source_error(e)));
            }
        };
        if let Err(e) = self.check_block(&index, &data) {
            self.fail();
            return Some(Err(e.into()));
        }

        let done = cursor + 1;
        self.state = if done < self.grid.num_tiles() {
            IterationState::Iterating { cursor: done }
        } else {
            IterationState::Exhausted
        };
        if let Some(progress) = self.progress.as_mut() {
            progress.advance();
            if self.state == IterationState::Exhausted {
                progress.finish();
            }
        }
        Some(Ok(Tile { data, index }))
    }

    fn fail(&mut self) {
        self.state = IterationState::Failed;
        if let Some(progress) = &self.progress {
            progress.abandon();
        }
    }
}

impl<S: BlockSource> Iterator for ChunkedArraySource<S> {
    type Item = crate::Result<Tile>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            IterationState::Created => self.fetch(0),
            IterationState::Iterating { cursor } => self.fetch(cursor),
            IterationState::Exhausted | IterationState::Failed => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // a failure can end iteration early
        (0, usize::try_from(self.tiles_remaining()).ok())
    }
}

impl<S: BlockSource> FusedIterator for ChunkedArraySource<S> {}

/// Configures a [ChunkedArraySource].
///
/// Shape and dtype default to those reported by the source.
#[derive(Debug)]
pub struct ChunkedArraySourceBuilder<S> {
    source: S,
    sizing: SizingOptions,
    maxshape: Option<Vec<u64>>,
    dtype: Option<Dtype>,
    display_progress: bool,
    progress_options: ProgressOptions,
}

impl<S: BlockSource> ChunkedArraySourceBuilder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            sizing: SizingOptions::default(),
            maxshape: None,
            dtype: None,
            display_progress: false,
            progress_options: ProgressOptions::default(),
        }
    }

    pub fn sizing(mut self, sizing: SizingOptions) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn chunk_mb(mut self, chunk_mb: f64) -> Self {
        self.sizing.chunk_mb = Some(chunk_mb);
        self
    }

    pub fn chunk_shape(mut self, chunk_shape: impl Into<Vec<u64>>) -> Self {
        self.sizing.chunk_shape = Some(chunk_shape.into());
        self
    }

    pub fn buffer_gb(mut self, buffer_gb: f64) -> Self {
        self.sizing.buffer_gb = Some(buffer_gb);
        self
    }

    pub fn buffer_shape(mut self, buffer_shape: impl Into<Vec<u64>>) -> Self {
        self.sizing.buffer_shape = Some(buffer_shape.into());
        self
    }

    /// Use this shape instead of asking the source.
    pub fn maxshape(mut self, maxshape: impl Into<Vec<u64>>) -> Self {
        self.maxshape = Some(maxshape.into());
        self
    }

    /// Use this dtype instead of asking the source.
    pub fn dtype(mut self, dtype: Dtype) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Report each completed tile.
    ///
    /// Draws a progress bar with the `progress` feature, otherwise logs at info level.
    pub fn display_progress(mut self, display_progress: bool) -> Self {
        self.display_progress = display_progress;
        self
    }

    pub fn progress_options(mut self, progress_options: ProgressOptions) -> Self {
        self.progress_options = progress_options;
        self
    }

    /// Resolve whatever was not supplied, then plan the traversal.
    ///
    /// Without a chunk size or chunk shape, the source's
    /// [default chunk shape](BlockSource::default_chunk_shape) is used if it has one.
    pub fn build(mut self) -> crate::Result<ChunkedArraySource<S>> {
        let dtype = match self.dtype {
            Some(d) => d,
            None => self
                .source
                .resolve_dtype()
                .map_err(crate::Error::source_error)?,
        };
        let maxshape = match self.maxshape {
            Some(m) => m,
            None => self
                .source
                .resolve_maxshape()
                .map_err(crate::Error::source_error)?,
        };
        if self.sizing.chunk_mb.is_none() && self.sizing.chunk_shape.is_none() {
            self.sizing.chunk_shape = self.source.default_chunk_shape();
        }
        let planner = ChunkPlanner::new(&maxshape, dtype.itemsize(), &self.sizing)?;
        let grid = planner.tile_grid();
        let progress = if self.display_progress {
            Some(ProgressReporter::new(grid.num_tiles(), &self.progress_options)?)
        } else {
            None
        };
        log::debug!(
            "iterating {dtype} array {maxshape:?} in {} tiles of {:?}",
            grid.num_tiles(),
            planner.buffer_shape()
        );
        Ok(ChunkedArraySource {
            source: self.source,
            planner,
            dtype,
            grid,
            state: IterationState::Created,
            progress,
        })
    }
}
