use bytes::Bytes;

use crate::dtype::{BlockElement, Dtype};

/// An owned, C-order, native-endian block of array data.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    shape: Vec<u64>,
    dtype: Dtype,
    bytes: Bytes,
}

impl DataBlock {
    /// Create a block from typed elements.
    ///
    /// Fails if the number of elements does not match the shape.
    pub fn from_elements<T: BlockElement>(shape: Vec<u64>, elements: &[T]) -> crate::Result<Self> {
        let expected: u64 = shape.iter().product();
        if elements.len() as u64 != expected {
            return Err(crate::Error::general(format!(
                "{} elements cannot fill a block of shape {shape:?}",
                elements.len()
            )));
        }
        let mut out = Vec::new();
        T::write_ne_bytes(elements, &mut out);
        Ok(Self {
            shape,
            dtype: T::DTYPE,
            bytes: Bytes::from(out),
        })
    }

    /// Create a block from raw native-endian bytes.
    ///
    /// Nothing is checked here;
    /// blocks yielded by a [ChunkedArraySource](crate::iterator::ChunkedArraySource)
    /// are validated against their tile before being handed out.
    pub fn from_bytes(shape: Vec<u64>, dtype: Dtype, bytes: impl Into<Bytes>) -> Self {
        Self {
            shape,
            dtype,
            bytes: bytes.into(),
        }
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Copy out the elements, which must be of type `T`.
    pub fn to_elements<T: BlockElement>(&self) -> crate::Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(crate::Error::general(format!(
                "cannot read {} block as {}",
                self.dtype,
                T::DTYPE
            )));
        }
        if self.bytes.len() % self.dtype.itemsize() != 0 {
            return Err(crate::Error::general(format!(
                "block of {} bytes is not a whole number of {} elements",
                self.bytes.len(),
                self.dtype
            )));
        }
        Ok(T::read_ne_bytes(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_round_trip() {
        let block = DataBlock::from_elements(vec![2, 3], &[1i16, -2, 3, -4, 5, -6]).unwrap();
        assert_eq!(block.shape(), &[2, 3]);
        assert_eq!(block.dtype(), Dtype::Int16);
        assert_eq!(block.as_bytes().len(), 12);
        assert_eq!(
            block.to_elements::<i16>().unwrap(),
            vec![1, -2, 3, -4, 5, -6]
        );
        assert!(block.to_elements::<u16>().is_err());
    }

    #[test]
    fn wrong_element_count() {
        assert!(DataBlock::from_elements(vec![2, 2], &[1.0f32, 2.0, 3.0]).is_err());
    }

    #[test]
    fn raw_bytes_are_unchecked() {
        let block = DataBlock::from_bytes(vec![4], Dtype::Uint32, vec![0u8; 3]);
        assert_eq!(block.num_elements(), 4);
        assert_eq!(block.as_bytes().len(), 3);
        assert!(block.to_elements::<u32>().is_err());
    }
}
