use std::fmt;

use serde::{Deserialize, Serialize};
use zarrs::array::{DataType, data_type};

/// Fixed-width numeric element type of a logical array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float32,
    Float64,
}

/// Numeric kind of a [Dtype].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtypeKind {
    Unsigned,
    Signed,
    Float,
}

impl Dtype {
    /// Bytes per element.
    pub fn itemsize(&self) -> usize {
        match self {
            Dtype::Uint8 | Dtype::Int8 => 1,
            Dtype::Uint16 | Dtype::Int16 => 2,
            Dtype::Uint32 | Dtype::Int32 | Dtype::Float32 => 4,
            Dtype::Uint64 | Dtype::Int64 | Dtype::Float64 => 8,
        }
    }

    pub fn kind(&self) -> DtypeKind {
        match self {
            Dtype::Uint8 | Dtype::Uint16 | Dtype::Uint32 | Dtype::Uint64 => DtypeKind::Unsigned,
            Dtype::Int8 | Dtype::Int16 | Dtype::Int32 | Dtype::Int64 => DtypeKind::Signed,
            Dtype::Float32 | Dtype::Float64 => DtypeKind::Float,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dtype::Uint8 => "uint8",
            Dtype::Int8 => "int8",
            Dtype::Uint16 => "uint16",
            Dtype::Int16 => "int16",
            Dtype::Uint32 => "uint32",
            Dtype::Int32 => "int32",
            Dtype::Uint64 => "uint64",
            Dtype::Int64 => "int64",
            Dtype::Float32 => "float32",
            Dtype::Float64 => "float64",
        }
    }

    /// Parse the lowercase name used in configuration.
    pub fn from_name(name: &str) -> crate::Result<Self> {
        let dtype = match name {
            "uint8" => Dtype::Uint8,
            "int8" => Dtype::Int8,
            "uint16" => Dtype::Uint16,
            "int16" => Dtype::Int16,
            "uint32" => Dtype::Uint32,
            "int32" => Dtype::Int32,
            "uint64" => Dtype::Uint64,
            "int64" => Dtype::Int64,
            "float32" => Dtype::Float32,
            "float64" => Dtype::Float64,
            s => return Err(crate::Error::general(format!("unsupported data type: {s}"))),
        };
        Ok(dtype)
    }

    /// The equivalent zarrs data type.
    pub fn to_data_type(&self) -> DataType {
        match self {
            Dtype::Uint8 => data_type::uint8(),
            Dtype::Int8 => data_type::int8(),
            Dtype::Uint16 => data_type::uint16(),
            Dtype::Int16 => data_type::int16(),
            Dtype::Uint32 => data_type::uint32(),
            Dtype::Int32 => data_type::int32(),
            Dtype::Uint64 => data_type::uint64(),
            Dtype::Int64 => data_type::int64(),
            Dtype::Float32 => data_type::float32(),
            Dtype::Float64 => data_type::float64(),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A native element type which can be stored in a [DataBlock](crate::block::DataBlock).
pub trait BlockElement: Copy + Send + Sync + 'static {
    const DTYPE: Dtype;

    fn write_ne_bytes(values: &[Self], out: &mut Vec<u8>);

    /// `bytes.len()` must be a multiple of the element size.
    fn read_ne_bytes(bytes: &[u8]) -> Vec<Self>;
}

macro_rules! impl_block_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl BlockElement for $t {
                const DTYPE: Dtype = Dtype::$dtype;

                fn write_ne_bytes(values: &[Self], out: &mut Vec<u8>) {
                    out.reserve(values.len() * size_of::<$t>());
                    for v in values {
                        out.extend_from_slice(&v.to_ne_bytes());
                    }
                }

                fn read_ne_bytes(bytes: &[u8]) -> Vec<Self> {
                    bytes
                        .chunks_exact(size_of::<$t>())
                        .map(|c| {
                            let mut buf = [0u8; size_of::<$t>()];
                            buf.copy_from_slice(c);
                            <$t>::from_ne_bytes(buf)
                        })
                        .collect()
                }
            }
        )*
    };
}

impl_block_element!(
    u8 => Uint8,
    i8 => Int8,
    u16 => Uint16,
    i16 => Int16,
    u32 => Uint32,
    i32 => Int32,
    u64 => Uint64,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);
