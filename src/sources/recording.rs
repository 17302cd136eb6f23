use std::ops::Range;

use crate::{
    block::DataBlock,
    dtype::{BlockElement, Dtype},
    source::BlockSource,
    tile::TileIndex,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordingError {
    #[error("{len} samples cannot be split evenly into {num_channels} channels")]
    Ragged { len: usize, num_channels: usize },
    #[error("{num_ids} channel ids given for {num_channels} channels")]
    ChannelIds { num_ids: usize, num_channels: usize },
    #[error("recording tiles have 2 axes, got {0}")]
    Rank(usize),
    #[error("tile {tile} is outside the recording of shape {maxshape:?}")]
    OutOfBounds { tile: TileIndex, maxshape: [u64; 2] },
}

/// A multi-channel recording held as a time-major `samples × channels` matrix.
///
/// Any rectangle of samples and channels can be read directly.
#[derive(Debug, Clone)]
pub struct RecordingSource<T> {
    traces: Vec<T>,
    num_samples: u64,
    num_channels: u64,
    channel_ids: Vec<u64>,
}

impl<T: BlockElement> RecordingSource<T> {
    /// `traces` holds all channels of sample 0, then all channels of sample 1, and so on.
    pub fn new(traces: Vec<T>, num_channels: usize) -> Result<Self, RecordingError> {
        if num_channels == 0 || traces.len() % num_channels != 0 {
            return Err(RecordingError::Ragged {
                len: traces.len(),
                num_channels,
            });
        }
        Ok(Self {
            num_samples: (traces.len() / num_channels) as u64,
            num_channels: num_channels as u64,
            channel_ids: (0..num_channels as u64).collect(),
            traces,
        })
    }

    /// `traces` holds all samples of channel 0, then all samples of channel 1, and so on.
    pub fn from_channel_major(traces: &[T], num_channels: usize) -> Result<Self, RecordingError> {
        if num_channels == 0 || traces.len() % num_channels != 0 {
            return Err(RecordingError::Ragged {
                len: traces.len(),
                num_channels,
            });
        }
        let num_samples = traces.len() / num_channels;
        let mut transposed = Vec::with_capacity(traces.len());
        for sample in 0..num_samples {
            for channel in 0..num_channels {
                transposed.push(traces[channel * num_samples + sample]);
            }
        }
        Self::new(transposed, num_channels)
    }

    pub fn with_channel_ids(mut self, channel_ids: Vec<u64>) -> Result<Self, RecordingError> {
        if channel_ids.len() as u64 != self.num_channels {
            return Err(RecordingError::ChannelIds {
                num_ids: channel_ids.len(),
                num_channels: self.num_channels as usize,
            });
        }
        self.channel_ids = channel_ids;
        Ok(self)
    }

    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    pub fn num_channels(&self) -> u64 {
        self.num_channels
    }

    pub fn channel_ids(&self) -> &[u64] {
        &self.channel_ids
    }

    /// Samples `samples` of channels `channels`, time-major.
    ///
    /// Empty or inverted ranges give no values.
    pub fn traces(
        &self,
        samples: Range<u64>,
        channels: Range<u64>,
    ) -> Result<Vec<T>, RecordingError> {
        if samples.end > self.num_samples || channels.end > self.num_channels {
            return Err(RecordingError::OutOfBounds {
                tile: TileIndex::new(vec![samples, channels]),
                maxshape: [self.num_samples, self.num_channels],
            });
        }
        if samples.is_empty() || channels.is_empty() {
            return Ok(Vec::new());
        }
        let width = (channels.end - channels.start) as usize;
        let mut out = Vec::with_capacity((samples.end - samples.start) as usize * width);
        for sample in samples {
            let row = (sample * self.num_channels) as usize;
            out.extend_from_slice(
                &self.traces[row + channels.start as usize..row + channels.end as usize],
            );
        }
        Ok(out)
    }
}

impl<T: BlockElement> BlockSource for RecordingSource<T> {
    type Error = RecordingError;

    fn resolve_dtype(&self) -> Result<Dtype, Self::Error> {
        Ok(T::DTYPE)
    }

    fn resolve_maxshape(&self) -> Result<Vec<u64>, Self::Error> {
        Ok(vec![self.num_samples, self.num_channels])
    }

    fn fetch_block(&mut self, tile: &TileIndex) -> Result<DataBlock, Self::Error> {
        let [samples, channels] = tile.ranges() else {
            return Err(RecordingError::Rank(tile.rank()));
        };
        let values = self.traces(samples.clone(), channels.clone())?;
        Ok(DataBlock::from_bytes(
            tile.shape(),
            T::DTYPE,
            to_ne_bytes(&values),
        ))
    }
}

fn to_ne_bytes<T: BlockElement>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::new();
    T::write_ne_bytes(values, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{iterator::ChunkedArraySource, planner::SizingOptions};

    #[test]
    fn slices_rectangles() {
        // 3 samples x 2 channels
        let mut rec = RecordingSource::new(vec![1i32, 2, 3, 4, 5, 6], 2).unwrap();
        let block = rec
            .fetch_block(&TileIndex::new(vec![1..3, 1..2]))
            .unwrap();
        assert_eq!(block.shape(), &[2, 1]);
        assert_eq!(block.to_elements::<i32>().unwrap(), vec![4, 6]);
    }

    #[test]
    fn channel_major_is_transposed() {
        // 2 channels x 3 samples
        let rec = RecordingSource::from_channel_major(&[1u16, 2, 3, 10, 20, 30], 2).unwrap();
        assert_eq!(rec.num_samples(), 3);
        assert_eq!(rec.traces(0..3, 0..2).unwrap(), vec![1, 10, 2, 20, 3, 30]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(RecordingSource::new(vec![0u8; 5], 2).is_err());
        assert!(RecordingSource::new(vec![0u8; 4], 0).is_err());
        let rec = RecordingSource::new(vec![0u8; 4], 2).unwrap();
        assert!(rec.clone().with_channel_ids(vec![7]).is_err());
        assert_eq!(
            rec.with_channel_ids(vec![7, 9]).unwrap().channel_ids(),
            &[7, 9]
        );
        let mut rec = RecordingSource::new(vec![0u8; 4], 2).unwrap();
        assert_eq!(
            rec.fetch_block(&TileIndex::new(vec![0..1])),
            Err(RecordingError::Rank(1))
        );
        assert!(matches!(
            rec.fetch_block(&TileIndex::new(vec![0..3, 0..2])),
            Err(RecordingError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn iterates_whole_recording() {
        let num_samples = 1000;
        let num_channels = 4;
        let traces: Vec<f64> = (0..num_samples * num_channels).map(|v| v as f64).collect();
        let rec = RecordingSource::new(traces.clone(), num_channels).unwrap();
        let iter = ChunkedArraySource::new(
            rec,
            SizingOptions::default()
                .with_chunk_shape([100, 4])
                .with_buffer_shape([300, 4]),
        )
        .unwrap();
        assert_eq!(iter.maxshape(), &[1000, 4]);
        let mut out = Vec::new();
        for tile in iter {
            out.extend(tile.unwrap().data.to_elements::<f64>().unwrap());
        }
        assert_eq!(out, traces);
    }

    #[test]
    fn traces_are_bounds_checked() {
        // 3 samples x 2 channels
        let rec = RecordingSource::new(vec![1u8, 2, 3, 4, 5, 6], 2).unwrap();
        assert_eq!(rec.traces(0..1, 0..2).unwrap(), vec![1, 2]);
        assert_eq!(
            rec.traces(0..1, 0..3),
            Err(RecordingError::OutOfBounds {
                tile: TileIndex::new(vec![0..1, 0..3]),
                maxshape: [3, 2],
            })
        );
        assert!(matches!(
            rec.traces(2..4, 0..1),
            Err(RecordingError::OutOfBounds { .. })
        ));
        assert_eq!(rec.traces(2..2, 0..2).unwrap(), Vec::<u8>::new());
    }
}
