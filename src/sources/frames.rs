use std::{convert::Infallible, ops::Range};

use crate::{
    block::DataBlock,
    dtype::{BlockElement, Dtype},
    source::BlockSource,
    tile::TileIndex,
};

/// A decoder which can only step forward one frame at a time, or start again from the beginning.
pub trait FrameReader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Total number of frames in the stream.
    fn frame_count(&self) -> Result<u64, Self::Error>;

    /// Decode the frame under the cursor and advance, or `None` at the end of the stream.
    fn read_next_frame(&mut self) -> Result<Option<DataBlock>, Self::Error>;

    /// Move the cursor back to the first frame.
    fn rewind(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum FrameSourceError<E> {
    #[error(transparent)]
    Reader(E),
    #[error("stream ended at frame {frame} of {frame_count}")]
    EndOfStream { frame: u64, frame_count: u64 },
    #[error("stream has no frames")]
    Empty,
    #[error("frame {frame} has shape {actual:?} and dtype {actual_dtype}, expected {expected:?} and {expected_dtype}")]
    FrameMismatch {
        frame: u64,
        expected: Vec<u64>,
        actual: Vec<u64>,
        expected_dtype: Dtype,
        actual_dtype: Dtype,
    },
    #[error("stub frame count must be in 1..={frame_count}, got {requested}")]
    StubFrameCount { requested: u64, frame_count: u64 },
    #[error("frame tiles have {expected} axes, got {actual}")]
    Rank { expected: usize, actual: usize },
}

/// Adapts a sequential [FrameReader] into a [BlockSource] of shape `(frames, *frame_shape)`.
///
/// The reader's cursor belongs to this source:
/// a tile starting behind the cursor rewinds the reader, one starting ahead skips frames.
/// Frame count, frame shape and dtype are read once, on construction.
#[derive(Debug)]
pub struct FrameSource<R> {
    reader: R,
    position: u64,
    frame_count: u64,
    frame_shape: Vec<u64>,
    dtype: Dtype,
}

impl<R: FrameReader> FrameSource<R> {
    pub fn new(mut reader: R) -> Result<Self, FrameSourceError<R::Error>> {
        let frame_count = reader.frame_count().map_err(FrameSourceError::Reader)?;
        let first = reader
            .read_next_frame()
            .map_err(FrameSourceError::Reader)?
            .ok_or(FrameSourceError::Empty)?;
        reader.rewind().map_err(FrameSourceError::Reader)?;
        log::debug!(
            "frame stream of {frame_count} {} frames shaped {:?}",
            first.dtype(),
            first.shape()
        );
        Ok(Self {
            reader,
            position: 0,
            frame_count,
            frame_shape: first.shape().to_vec(),
            dtype: first.dtype(),
        })
    }

    /// Expose only the first `frame_count` frames, e.g. for a quick test conversion.
    pub fn with_stub_frames(
        mut self,
        frame_count: u64,
    ) -> Result<Self, FrameSourceError<R::Error>> {
        if frame_count == 0 || frame_count > self.frame_count {
            return Err(FrameSourceError::StubFrameCount {
                requested: frame_count,
                frame_count: self.frame_count,
            });
        }
        self.frame_count = frame_count;
        Ok(self)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn frame_shape(&self) -> &[u64] {
        &self.frame_shape
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn into_reader(self) -> R {
        self.reader
    }

    fn next_frame(&mut self) -> Result<DataBlock, FrameSourceError<R::Error>> {
        let frame = self
            .reader
            .read_next_frame()
            .map_err(FrameSourceError::Reader)?
            .ok_or(FrameSourceError::EndOfStream {
                frame: self.position,
                frame_count: self.frame_count,
            })?;
        if frame.shape() != self.frame_shape.as_slice() || frame.dtype() != self.dtype {
            return Err(FrameSourceError::FrameMismatch {
                frame: self.position,
                expected: self.frame_shape.clone(),
                actual: frame.shape().to_vec(),
                expected_dtype: self.dtype,
                actual_dtype: frame.dtype(),
            });
        }
        self.position += 1;
        Ok(frame)
    }

    fn seek(&mut self, frame: u64) -> Result<(), FrameSourceError<R::Error>> {
        if frame < self.position {
            log::trace!("rewinding from frame {} to {frame}", self.position);
            self.reader.rewind().map_err(FrameSourceError::Reader)?;
            self.position = 0;
        }
        while self.position < frame {
            self.next_frame()?;
        }
        Ok(())
    }
}

impl<R: FrameReader> BlockSource for FrameSource<R> {
    type Error = FrameSourceError<R::Error>;

    fn resolve_dtype(&self) -> Result<Dtype, Self::Error> {
        Ok(self.dtype)
    }

    fn resolve_maxshape(&self) -> Result<Vec<u64>, Self::Error> {
        let mut shape = Vec::with_capacity(self.frame_shape.len() + 1);
        shape.push(self.frame_count);
        shape.extend_from_slice(&self.frame_shape);
        Ok(shape)
    }

    fn fetch_block(&mut self, tile: &TileIndex) -> Result<DataBlock, Self::Error> {
        let expected = self.frame_shape.len() + 1;
        if tile.rank() != expected {
            return Err(FrameSourceError::Rank {
                expected,
                actual: tile.rank(),
            });
        }
        let frames = &tile.ranges()[0];
        let spatial = &tile.ranges()[1..];
        if frames.end > self.frame_count {
            return Err(FrameSourceError::EndOfStream {
                frame: frames.end - 1,
                frame_count: self.frame_count,
            });
        }
        self.seek(frames.start)?;

        let itemsize = self.dtype.itemsize();
        let mut out = Vec::with_capacity(tile.num_elements() as usize * itemsize);
        for _ in frames.clone() {
            let frame = self.next_frame()?;
            crop_into(frame.as_bytes(), &self.frame_shape, spatial, itemsize, &mut out);
        }
        Ok(DataBlock::from_bytes(tile.shape(), self.dtype, out))
    }

    /// One whole frame per chunk.
    fn default_chunk_shape(&self) -> Option<Vec<u64>> {
        let mut shape = Vec::with_capacity(self.frame_shape.len() + 1);
        shape.push(1);
        shape.extend_from_slice(&self.frame_shape);
        Some(shape)
    }
}

/// Append the C-order region `ranges` of an array of `shape` to `out`.
fn crop_into(
    bytes: &[u8],
    shape: &[u64],
    ranges: &[Range<u64>],
    itemsize: usize,
    out: &mut Vec<u8>,
) {
    let Some((last, outer)) = ranges.split_last() else {
        out.extend_from_slice(&bytes[..itemsize]);
        return;
    };
    if ranges.iter().any(|r| r.is_empty()) {
        return;
    }
    let mut coord: Vec<u64> = outer.iter().map(|r| r.start).collect();
    loop {
        let mut offset = 0;
        for (c, n) in coord.iter().zip(shape) {
            offset = offset * n + c;
        }
        let row = (offset * shape[shape.len() - 1]) as usize;
        out.extend_from_slice(
            &bytes[(row + last.start as usize) * itemsize..(row + last.end as usize) * itemsize],
        );

        let mut axis = outer.len();
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            coord[axis] += 1;
            if coord[axis] < outer[axis].end {
                break;
            }
            coord[axis] = outer[axis].start;
        }
    }
}

/// Frames held in memory, read through the sequential [FrameReader] interface.
#[derive(Debug, Clone)]
pub struct InMemoryFrames<T> {
    frames: Vec<Vec<T>>,
    frame_shape: Vec<u64>,
    cursor: usize,
    rewinds: usize,
}

impl<T: BlockElement> InMemoryFrames<T> {
    /// Every frame must hold `frame_shape` elements in C order.
    pub fn new(frames: Vec<Vec<T>>, frame_shape: Vec<u64>) -> crate::Result<Self> {
        let n: u64 = frame_shape.iter().product();
        if let Some(idx) = frames.iter().position(|f| f.len() as u64 != n) {
            return Err(crate::Error::general(format!(
                "frame {idx} does not have shape {frame_shape:?}"
            )));
        }
        Ok(Self {
            frames,
            frame_shape,
            cursor: 0,
            rewinds: 0,
        })
    }

    /// How many times the reader has been rewound.
    pub fn rewinds(&self) -> usize {
        self.rewinds
    }
}

impl<T: BlockElement> FrameReader for InMemoryFrames<T> {
    type Error = Infallible;

    fn frame_count(&self) -> Result<u64, Self::Error> {
        Ok(self.frames.len() as u64)
    }

    fn read_next_frame(&mut self) -> Result<Option<DataBlock>, Self::Error> {
        let Some(frame) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let mut bytes = Vec::with_capacity(frame.len() * T::DTYPE.itemsize());
        T::write_ne_bytes(frame, &mut bytes);
        Ok(Some(DataBlock::from_bytes(
            self.frame_shape.clone(),
            T::DTYPE,
            bytes,
        )))
    }

    fn rewind(&mut self) -> Result<(), Self::Error> {
        self.cursor = 0;
        self.rewinds += 1;
        Ok(())
    }
}
