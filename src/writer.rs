//! Writing a [ChunkedArraySource] into a chunked, compressed Zarr array.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zarrs::{
    array::{
        Array, ArrayBuilder, ArrayBytes,
        codec::{Bz2Codec, Bz2CompressionLevel, GzipCodec, ZstdCodec},
    },
    storage::ReadableWritableStorageTraits,
};
use zarrs_codec::BytesToBytesCodecTraits;

use crate::{iterator::ChunkedArraySource, source::BlockSource};

/// Chunk compression for the written array.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Copy)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Compression {
    /// Uncompressed.
    #[default]
    Raw,
    Bzip2 {
        /// Default 9. Must be in the range 1..=9.
        #[serde(default = "default_bzip2_block_size", rename = "blockSize")]
        block_size: u8,
    },
    Gzip {
        /// Default 6. Must be in the range 0..=9.
        #[serde(default = "default_gzip_level")]
        level: u32,
    },
    Zstd {
        /// Default 3.
        #[serde(default = "default_zstd_level")]
        level: i32,
        #[serde(default)]
        checksum: bool,
    },
}

fn default_bzip2_block_size() -> u8 {
    9
}

fn default_gzip_level() -> u32 {
    6
}

fn default_zstd_level() -> i32 {
    3
}

impl Compression {
    /// Convert to a bytes-to-bytes codec if compressed.
    pub fn to_bytes_to_bytes_codec(
        &self,
    ) -> crate::Result<Option<Arc<dyn BytesToBytesCodecTraits>>> {
        match self {
            Compression::Raw => Ok(None),
            Compression::Bzip2 { block_size } => Ok(Some(Arc::new(Bz2Codec::new(
                Bz2CompressionLevel::new(*block_size as u32)
                    .map_err(|n| crate::Error::general(format!("invalid bz2 block size {n}")))?,
            )))),
            Compression::Gzip { level } => Ok(Some(Arc::new(
                GzipCodec::new(*level).map_err(crate::Error::wrap)?,
            ))),
            Compression::Zstd { level, checksum } => {
                Ok(Some(Arc::new(ZstdCodec::new(*level, *checksum))))
            }
        }
    }
}

/// How the destination array is laid out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub compression: Compression,
    /// One name per axis, e.g. `["time", "channel"]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_names: Option<Vec<String>>,
    /// Unstructured attributes stored with the array.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl WriteOptions {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_dimension_names<I, D>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        self.dimension_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attributes(
        mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn from_json(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Creates a Zarr array shaped after a [ChunkedArraySource] and fills it tile by tile.
pub struct ArrayWriter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    path: String,
    options: WriteOptions,
}

impl<TStorage: ?Sized + ReadableWritableStorageTraits + 'static> ArrayWriter<TStorage> {
    pub fn new(storage: Arc<TStorage>, path: impl Into<String>, options: WriteOptions) -> Self {
        Self {
            storage,
            path: path.into(),
            options,
        }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Create the array and store its metadata, without writing any data.
    ///
    /// Its shape, chunk grid and data type come from the source's accessors.
    pub fn create_array<S: BlockSource>(
        &self,
        source: &ChunkedArraySource<S>,
    ) -> crate::Result<Array<TStorage>> {
        let dtype = source.dtype();
        let mut builder = ArrayBuilder::new(
            source.maxshape().to_vec(),
            source.chunk_shape().to_vec(),
            dtype.to_data_type(),
            vec![0u8; dtype.itemsize()],
        );
        builder.bytes_to_bytes_codecs(
            self.options
                .compression
                .to_bytes_to_bytes_codec()?
                .into_iter()
                .collect(),
        );
        if let Some(names) = &self.options.dimension_names {
            if names.len() != source.maxshape().len() {
                return Err(crate::Error::general(format!(
                    "{} dimension names given for an array of rank {}",
                    names.len(),
                    source.maxshape().len()
                )));
            }
            builder.dimension_names(Some(names.iter().map(String::as_str)));
        }
        if !self.options.attributes.is_empty() {
            builder.attributes(self.options.attributes.clone());
        }
        let array = builder.build(self.storage.clone(), &self.path)?;
        array.store_metadata()?;
        log::debug!(
            "created {dtype} array at {} with shape {:?} and chunk shape {:?}",
            self.path,
            source.maxshape(),
            source.chunk_shape()
        );
        Ok(array)
    }

    /// Create the array and write every tile of the source into it, in order.
    ///
    /// Stops at the first error; tiles already written stay in the store.
    pub fn write<S: BlockSource>(
        &self,
        mut source: ChunkedArraySource<S>,
    ) -> crate::Result<Array<TStorage>> {
        let array = self.create_array(&source)?;
        let total = source.tiles_total();
        let mut written = 0u64;
        for tile in source.by_ref() {
            let (data, index) = tile?.into_parts();
            array.store_array_subset(&index.to_array_subset(), ArrayBytes::from(data.as_bytes()))?;
            written += 1;
            log::trace!("stored tile {written}/{total} at {index}");
        }
        log::info!("wrote {written} tiles to {}", self.path);
        Ok(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_from_json() {
        let c: Compression = serde_json::from_str(r#"{"type": "gzip", "level": 5}"#).unwrap();
        assert_eq!(c, Compression::Gzip { level: 5 });
        let c: Compression = serde_json::from_str(r#"{"type": "bzip2"}"#).unwrap();
        assert_eq!(c, Compression::Bzip2 { block_size: 9 });
        let c: Compression = serde_json::from_str(r#"{"type": "zstd", "level": 7}"#).unwrap();
        assert_eq!(
            c,
            Compression::Zstd {
                level: 7,
                checksum: false
            }
        );
        let c: Compression = serde_json::from_str(r#"{"type": "raw"}"#).unwrap();
        assert_eq!(c, Compression::Raw);
    }

    #[test]
    fn codecs() {
        assert!(Compression::Raw.to_bytes_to_bytes_codec().unwrap().is_none());
        assert!(
            Compression::Gzip { level: 5 }
                .to_bytes_to_bytes_codec()
                .unwrap()
                .is_some()
        );
        assert!(
            Compression::Gzip { level: 42 }
                .to_bytes_to_bytes_codec()
                .is_err()
        );
        assert!(
            Compression::Bzip2 { block_size: 0 }
                .to_bytes_to_bytes_codec()
                .is_err()
        );
    }

    #[test]
    fn options_from_json() {
        let opts = WriteOptions::from_json(
            r#"{
                "compression": {"type": "zstd", "level": 1, "checksum": true},
                "dimension_names": ["time", "channel"],
                "attributes": {"unit": "uV"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            opts.compression,
            Compression::Zstd {
                level: 1,
                checksum: true
            }
        );
        assert_eq!(
            opts.dimension_names,
            Some(vec!["time".to_string(), "channel".to_string()])
        );
        assert_eq!(opts.attributes["unit"], "uV");
        assert_eq!(WriteOptions::from_json("{}").unwrap(), WriteOptions::default());
    }
}
