use std::{fmt, ops::Range};

use zarrs::array::ArraySubset;

/// Per-axis `start..stop` ranges of one rectangular region of the logical array.
///
/// A range with `start > stop` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileIndex {
    ranges: Vec<Range<u64>>,
}

impl TileIndex {
    pub fn new(ranges: Vec<Range<u64>>) -> Self {
        Self { ranges }
    }

    pub fn ranges(&self) -> &[Range<u64>] {
        &self.ranges
    }

    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    pub fn start(&self) -> Vec<u64> {
        self.ranges.iter().map(|r| r.start).collect()
    }

    /// `stop - start` on each axis.
    pub fn shape(&self) -> Vec<u64> {
        self.ranges
            .iter()
            .map(|r| r.end.saturating_sub(r.start))
            .collect()
    }

    pub fn num_elements(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| r.end.saturating_sub(r.start))
            .product()
    }

    /// Whether the coordinate lies inside this tile.
    pub fn contains(&self, coord: &[u64]) -> bool {
        coord.len() == self.ranges.len()
            && coord.iter().zip(&self.ranges).all(|(c, r)| r.contains(c))
    }

    pub fn to_array_subset(&self) -> ArraySubset {
        ArraySubset::new_with_ranges(&self.ranges)
    }

    pub fn into_ranges(self) -> Vec<Range<u64>> {
        self.ranges
    }
}

impl From<Vec<Range<u64>>> for TileIndex {
    fn from(value: Vec<Range<u64>>) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, r) in self.ranges.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}..{}", r.start, r.end)?;
        }
        f.write_str("]")
    }
}

/// The buffer grid laid over a logical array.
///
/// Cells are numbered in row-major order (last axis fastest).
/// Cells on the trailing edge of an axis are truncated to the array extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TileGrid {
    maxshape: Vec<u64>,
    tile_shape: Vec<u64>,
    grid_shape: Vec<u64>,
}

impl TileGrid {
    /// All entries of both shapes must be non-zero.
    pub(crate) fn new(maxshape: &[u64], tile_shape: &[u64]) -> Self {
        let grid_shape = maxshape
            .iter()
            .zip(tile_shape)
            .map(|(m, t)| m.div_ceil(*t))
            .collect();
        Self {
            maxshape: maxshape.to_vec(),
            tile_shape: tile_shape.to_vec(),
            grid_shape,
        }
    }

    pub(crate) fn grid_shape(&self) -> &[u64] {
        &self.grid_shape
    }

    pub(crate) fn num_tiles(&self) -> u64 {
        self.grid_shape.iter().product()
    }

    /// Tile at a row-major position in the grid, or `None` past the end.
    pub(crate) fn tile(&self, position: u64) -> Option<TileIndex> {
        if position >= self.num_tiles() {
            return None;
        }
        let mut ranges = vec![0..0; self.grid_shape.len()];
        let mut remainder = position;
        for axis in (0..self.grid_shape.len()).rev() {
            let cell = remainder % self.grid_shape[axis];
            remainder /= self.grid_shape[axis];
            let start = cell * self.tile_shape[axis];
            let stop = (start + self.tile_shape[axis]).min(self.maxshape[axis]);
            ranges[axis] = start..stop;
        }
        Some(TileIndex::new(ranges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_row_major_and_truncated() {
        let grid = TileGrid::new(&[5, 4], &[2, 3]);
        assert_eq!(grid.grid_shape(), &[3, 2]);
        assert_eq!(grid.num_tiles(), 6);
        let tiles: Vec<_> = (0..grid.num_tiles())
            .map(|i| grid.tile(i).unwrap().into_ranges())
            .collect();
        assert_eq!(
            tiles,
            vec![
                vec![0..2, 0..3],
                vec![0..2, 3..4],
                vec![2..4, 0..3],
                vec![2..4, 3..4],
                vec![4..5, 0..3],
                vec![4..5, 3..4],
            ]
        );
        assert!(grid.tile(6).is_none());
    }

    #[test]
    fn display_and_shape() {
        let tile = TileIndex::new(vec![10..20, 0..4]);
        assert_eq!(tile.to_string(), "[10..20, 0..4]");
        assert_eq!(tile.shape(), vec![10, 4]);
        assert_eq!(tile.start(), vec![10, 0]);
        assert_eq!(tile.num_elements(), 40);
        assert!(tile.contains(&[19, 3]));
        assert!(!tile.contains(&[20, 3]));
    }

    #[test]
    #[allow(clippy::reversed_empty_ranges)]
    fn inverted_ranges_are_empty() {
        let tile = TileIndex::new(vec![5..2, 0..3]);
        assert_eq!(tile.shape(), vec![0, 3]);
        assert_eq!(tile.num_elements(), 0);
        assert!(!tile.contains(&[3, 1]));
    }
}
