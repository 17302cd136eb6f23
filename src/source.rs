use crate::{block::DataBlock, dtype::Dtype, tile::TileIndex};

/// A format-specific provider of array data.
///
/// Implementors read from some already-open resource (a file handle, a decoder, a buffer in memory)
/// and return rectangular blocks of a logical array on request.
/// They should release that resource when dropped.
pub trait BlockSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Element type of the logical array.
    fn resolve_dtype(&self) -> Result<Dtype, Self::Error>;

    /// Full shape of the logical array.
    fn resolve_maxshape(&self) -> Result<Vec<u64>, Self::Error>;

    /// Read the region of the logical array described by `tile`.
    ///
    /// The returned block must have shape [TileIndex::shape] and the resolved dtype.
    fn fetch_block(&mut self, tile: &TileIndex) -> Result<DataBlock, Self::Error>;

    /// Chunk shape to use when the caller gives neither a chunk size nor a chunk shape.
    ///
    /// `None` means the shape is derived from the default chunk budget.
    fn default_chunk_shape(&self) -> Option<Vec<u64>> {
        None
    }
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    type Error = S::Error;

    fn resolve_dtype(&self) -> Result<Dtype, Self::Error> {
        (**self).resolve_dtype()
    }

    fn resolve_maxshape(&self) -> Result<Vec<u64>, Self::Error> {
        (**self).resolve_maxshape()
    }

    fn fetch_block(&mut self, tile: &TileIndex) -> Result<DataBlock, Self::Error> {
        (**self).fetch_block(tile)
    }

    fn default_chunk_shape(&self) -> Option<Vec<u64>> {
        (**self).default_chunk_shape()
    }
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    type Error = S::Error;

    fn resolve_dtype(&self) -> Result<Dtype, Self::Error> {
        (**self).resolve_dtype()
    }

    fn resolve_maxshape(&self) -> Result<Vec<u64>, Self::Error> {
        (**self).resolve_maxshape()
    }

    fn fetch_block(&mut self, tile: &TileIndex) -> Result<DataBlock, Self::Error> {
        (**self).fetch_block(tile)
    }

    fn default_chunk_shape(&self) -> Option<Vec<u64>> {
        (**self).default_chunk_shape()
    }
}
