// rust/textds-core/src/tfrecord/example.rs

//! `tf.train.Example` messages and their conversion to tensors.
//!
//! The message definitions mirror `tensorflow/core/example/example.proto`
//! and `feature.proto`; field numbers must not change.

use std::collections::HashMap;
use std::path::Path;

use prost::Message;

use crate::error::{Result, TextDsError};
use crate::schema::{FeatureSpec, Schema};
use crate::tensor::{DType, Tensor, TensorData, TensorMap};

#[derive(Clone, PartialEq, Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),
        #[prost(message, tag = "2")]
        FloatList(super::FloatList),
        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Features {
    #[prost(map = "string, message", tag = "1")]
    pub feature: HashMap<String, Feature>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

impl From<Vec<Vec<u8>>> for Feature {
    fn from(value: Vec<Vec<u8>>) -> Self {
        Self {
            kind: Some(feature::Kind::BytesList(BytesList { value })),
        }
    }
}

impl From<Vec<f32>> for Feature {
    fn from(value: Vec<f32>) -> Self {
        Self {
            kind: Some(feature::Kind::FloatList(FloatList { value })),
        }
    }
}

impl From<Vec<i64>> for Feature {
    fn from(value: Vec<i64>) -> Self {
        Self {
            kind: Some(feature::Kind::Int64List(Int64List { value })),
        }
    }
}

/// Decodes a serialized `tf.train.Example` into tensors shaped by `schema`.
///
/// Features present in the example but not declared are ignored. `path` is
/// only used in error messages.
pub fn decode_example(payload: &[u8], schema: &Schema, path: &Path) -> Result<TensorMap> {
    let example = Example::decode(payload)
        .map_err(|e| TextDsError::record(path, format!("invalid tf.train.Example: {e}")))?;
    let mut features = example.features.map(|f| f.feature).unwrap_or_default();

    let mut tensors = TensorMap::new();
    for spec in schema.features() {
        let feature = features.remove(&spec.name).ok_or_else(|| {
            TextDsError::record(path, format!("example has no feature '{}'", spec.name))
        })?;
        let data = convert_kind(spec, feature.kind, path)?;
        let shape = spec.resolve_shape(data.len()).ok_or_else(|| {
            TextDsError::record(
                path,
                format!(
                    "feature '{}' has {} values, which does not fit {}",
                    spec.name,
                    data.len(),
                    spec
                ),
            )
        })?;
        tensors.insert(spec.name.clone(), Tensor::new(shape, data)?);
    }
    Ok(tensors)
}

fn convert_kind(spec: &FeatureSpec, kind: Option<feature::Kind>, path: &Path) -> Result<TensorData> {
    let mismatch = |found: &str| {
        TextDsError::record(
            path,
            format!(
                "feature '{}' is stored as {}, declared {}",
                spec.name, found, spec.dtype
            ),
        )
    };
    let out_of_range = || {
        TextDsError::record(
            path,
            format!("feature '{}' has values outside {}", spec.name, spec.dtype),
        )
    };

    let data = match (spec.dtype, kind) {
        (dtype, None) => empty_data(dtype),
        (DType::String, Some(feature::Kind::BytesList(list))) => TensorData::Bytes(list.value),
        (DType::Float32, Some(feature::Kind::FloatList(list))) => TensorData::Float32(list.value),
        (DType::Float64, Some(feature::Kind::FloatList(list))) => {
            TensorData::Float64(list.value.into_iter().map(f64::from).collect())
        }
        (DType::Int64, Some(feature::Kind::Int64List(list))) => TensorData::Int64(list.value),
        (DType::Int32, Some(feature::Kind::Int64List(list))) => TensorData::Int32(
            list.value
                .into_iter()
                .map(i32::try_from)
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| out_of_range())?,
        ),
        (DType::UInt8, Some(feature::Kind::Int64List(list))) => TensorData::UInt8(
            list.value
                .into_iter()
                .map(u8::try_from)
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| out_of_range())?,
        ),
        (DType::Bool, Some(feature::Kind::Int64List(list))) => {
            TensorData::Bool(list.value.into_iter().map(|v| v != 0).collect())
        }
        (_, Some(feature::Kind::BytesList(_))) => return Err(mismatch("bytes_list")),
        (_, Some(feature::Kind::FloatList(_))) => return Err(mismatch("float_list")),
        (_, Some(feature::Kind::Int64List(_))) => return Err(mismatch("int64_list")),
    };
    Ok(data)
}

fn empty_data(dtype: DType) -> TensorData {
    match dtype {
        DType::String => TensorData::Bytes(Vec::new()),
        DType::Bool => TensorData::Bool(Vec::new()),
        DType::UInt8 => TensorData::UInt8(Vec::new()),
        DType::Int32 => TensorData::Int32(Vec::new()),
        DType::Int64 => TensorData::Int64(Vec::new()),
        DType::Float32 => TensorData::Float32(Vec::new()),
        DType::Float64 => TensorData::Float64(Vec::new()),
    }
}

/// Serializes tensors as a `tf.train.Example`, flattening shapes.
///
/// Integer and boolean tensors become `int64_list`, floating point tensors
/// `float_list` (float64 values are narrowed to f32, as TensorFlow does).
pub fn encode_example(tensors: &TensorMap) -> Vec<u8> {
    let feature = tensors
        .iter()
        .map(|(name, tensor)| {
            let feature = match tensor.data() {
                TensorData::Bytes(v) => Feature::from(v.clone()),
                TensorData::Bool(v) => Feature::from(v.iter().map(|&b| i64::from(b)).collect::<Vec<_>>()),
                TensorData::UInt8(v) => Feature::from(v.iter().map(|&x| i64::from(x)).collect::<Vec<_>>()),
                TensorData::Int32(v) => Feature::from(v.iter().map(|&x| i64::from(x)).collect::<Vec<_>>()),
                TensorData::Int64(v) => Feature::from(v.clone()),
                TensorData::Float32(v) => Feature::from(v.clone()),
                TensorData::Float64(v) => Feature::from(v.iter().map(|&x| x as f32).collect::<Vec<_>>()),
            };
            (name.clone(), feature)
        })
        .collect();

    Example {
        features: Some(Features { feature }),
    }
    .encode_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Dim;

    fn toxicity_schema() -> Schema {
        Schema::new(vec![
            FeatureSpec::text("text"),
            FeatureSpec::scalar("toxicity", DType::Float32),
        ])
    }

    #[test]
    fn test_decode_encoded_example() {
        let mut tensors = TensorMap::new();
        tensors.insert("text".into(), Tensor::bytes("hello world"));
        tensors.insert("toxicity".into(), Tensor::float32(0.25));

        let payload = encode_example(&tensors);
        let decoded = decode_example(&payload, &toxicity_schema(), Path::new("mem")).unwrap();
        assert_eq!(decoded, tensors);
    }

    #[test]
    fn test_decode_casts_to_declared_dtype() {
        let mut feature = HashMap::new();
        feature.insert("label".to_string(), Feature::from(vec![3i64]));
        feature.insert("mask".to_string(), Feature::from(vec![1i64, 0, 1]));
        let payload = Example {
            features: Some(Features { feature }),
        }
        .encode_to_vec();

        let schema = Schema::new(vec![
            FeatureSpec::scalar("label", DType::Int32),
            FeatureSpec::new("mask", DType::Bool, vec![Dim::Unknown]),
        ]);
        let decoded = decode_example(&payload, &schema, Path::new("mem")).unwrap();

        assert_eq!(decoded["label"].data(), &TensorData::Int32(vec![3]));
        assert_eq!(decoded["mask"].shape(), &[3]);
        assert_eq!(
            decoded["mask"].data(),
            &TensorData::Bool(vec![true, false, true])
        );
    }

    #[test]
    fn test_decode_missing_feature() {
        let mut tensors = TensorMap::new();
        tensors.insert("text".into(), Tensor::bytes("only text"));
        let payload = encode_example(&tensors);

        let err = decode_example(&payload, &toxicity_schema(), Path::new("shard-0")).unwrap_err();
        assert!(matches!(err, TextDsError::Record { .. }));
        assert!(err.to_string().contains("toxicity"));
    }

    #[test]
    fn test_decode_kind_mismatch() {
        let mut tensors = TensorMap::new();
        tensors.insert("text".into(), Tensor::int64(5));
        tensors.insert("toxicity".into(), Tensor::float32(0.0));
        let payload = encode_example(&tensors);

        let err = decode_example(&payload, &toxicity_schema(), Path::new("mem")).unwrap_err();
        assert!(err.to_string().contains("stored as int64_list, declared string"));
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let mut tensors = TensorMap::new();
        tensors.insert(
            "text".into(),
            Tensor::new(vec![2], TensorData::Bytes(vec![b"a".to_vec(), b"b".to_vec()])).unwrap(),
        );
        tensors.insert("toxicity".into(), Tensor::float32(0.0));
        let payload = encode_example(&tensors);

        assert!(decode_example(&payload, &toxicity_schema(), Path::new("mem")).is_err());
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode_example(&[0xff, 0xff, 0xff], &toxicity_schema(), Path::new("mem"));
        assert!(result.is_err());
    }

    #[test]
    fn test_int32_out_of_range() {
        let mut feature = HashMap::new();
        feature.insert("label".to_string(), Feature::from(vec![i64::MAX]));
        let payload = Example {
            features: Some(Features { feature }),
        }
        .encode_to_vec();
        let schema = Schema::new(vec![FeatureSpec::scalar("label", DType::Int32)]);

        let err = decode_example(&payload, &schema, Path::new("mem")).unwrap_err();
        assert!(err.to_string().contains("outside int32"));
    }
}
