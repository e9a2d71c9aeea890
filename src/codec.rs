//! Data-type tags and the point marshalling codec registry

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::point::{DataPoint, PointId, ELEMENT_WIDTH};

/// Kind of payload a handle marshals.
///
/// Only `Vector` has a registered codec; `String` is a recognized tag whose
/// operations fail with [`Error::UnsupportedType`] rather than falling back
/// to vector decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Vector,
    String,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Vector => "VECTOR",
            DataType::String => "STRING",
        }
    }
}

/// Numeric type of distance values produced by the space.
///
/// This crate is vector/float-optimized: `Int` is rejected at handle
/// construction, not coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistType {
    Float,
    Int,
}

impl DistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistType::Float => "FLOAT",
            DistType::Int => "INT",
        }
    }
}

/// Decode an external flat vector into an owned point.
pub type ReaderFn = fn(&[f32], PointId) -> Result<DataPoint>;

/// Reconstruct the external flat vector from a point's payload.
pub type WriterFn = fn(&DataPoint) -> Vec<f32>;

/// A reader/writer pair for one data type.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub reader: ReaderFn,
    pub writer: WriterFn,
}

static CODECS: OnceLock<FxHashMap<DataType, Codec>> = OnceLock::new();

fn codecs() -> &'static FxHashMap<DataType, Codec> {
    CODECS.get_or_init(|| {
        let mut map = FxHashMap::default();
        map.insert(
            DataType::Vector,
            Codec {
                reader: read_vector,
                writer: write_vector,
            },
        );
        map
    })
}

/// Look up the codec for a data type, failing for tags without one.
pub fn codec_for(data_type: DataType) -> Result<Codec> {
    codecs().get(&data_type).copied().ok_or_else(|| {
        Error::UnsupportedType(format!(
            "no codec registered for data type {}: only VECTOR is supported",
            data_type.as_str()
        ))
    })
}

/// Vector reader: validates shape and every element before constructing the
/// point, so a failure never yields a partial point.
fn read_vector(values: &[f32], id: PointId) -> Result<DataPoint> {
    if values.is_empty() {
        return Err(Error::DataFormat(
            "vector must contain at least one element".to_string(),
        ));
    }
    for (i, v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(Error::DataFormat(format!(
                "vector element at position {i} is not a finite number: {v}"
            )));
        }
    }
    Ok(DataPoint::new(id, values))
}

/// Vector writer: element count is recovered from the payload byte length.
fn write_vector(point: &DataPoint) -> Vec<f32> {
    debug_assert_eq!(point.byte_len() % ELEMENT_WIDTH, 0);
    point.vector().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_round_trip() {
        let codec = codec_for(DataType::Vector).unwrap();
        let original = [0.5f32, -1.25, 3.0];
        let point = (codec.reader)(&original, 42).unwrap();
        assert_eq!(point.id(), 42);
        assert_eq!((codec.writer)(&point), original.to_vec());
    }

    #[test]
    fn test_empty_vector_rejected() {
        let codec = codec_for(DataType::Vector).unwrap();
        let err = (codec.reader)(&[], 0).unwrap_err();
        assert!(matches!(err, Error::DataFormat(_)));
    }

    #[test]
    fn test_non_finite_element_rejected() {
        let codec = codec_for(DataType::Vector).unwrap();
        let err = (codec.reader)(&[1.0, f32::NAN, 2.0], 0).unwrap_err();
        assert!(err.to_string().contains("position 1"));
        let err = (codec.reader)(&[f32::INFINITY], 0).unwrap_err();
        assert!(matches!(err, Error::DataFormat(_)));
    }

    #[test]
    fn test_string_codec_absent() {
        let err = codec_for(DataType::String).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }
}
