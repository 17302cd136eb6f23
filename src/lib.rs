pub mod block;
pub mod dtype;
mod error;
pub mod iterator;
pub mod planner;
pub mod progress;
pub mod source;
pub mod sources;
pub mod tile;
pub mod writer;

pub use zarrs;

pub use block::DataBlock;
pub use dtype::{BlockElement, Dtype};
pub use error::{BlockShapeError, ConfigurationError, Error, Result};
pub use iterator::{ChunkedArraySource, ChunkedArraySourceBuilder, IterationState, Tile};
pub use planner::{ChunkPlanner, SizingOptions};
pub use progress::ProgressOptions;
pub use source::BlockSource;
pub use tile::TileIndex;
pub use writer::{ArrayWriter, Compression, WriteOptions};
