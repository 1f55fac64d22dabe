// rust/textds-core/src/tensor.rs

//! Raw tensors as delivered by a dataset provider.
//!
//! A [`Tensor`] is a flat, row-major buffer with a shape. Byte-string tensors
//! carry one `Vec<u8>` per element; everything else is a native numeric
//! buffer. Providers hand tensors over by value inside a [`TensorMap`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TextDsError};

/// One example or batch: feature name to tensor, ordered by name.
pub type TensorMap = BTreeMap<String, Tensor>;

/// Declared element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Opaque byte strings (TensorFlow `tf.string`).
    String,
    Bool,
    UInt8,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    /// Returns true for the opaque object type that holds byte strings.
    pub fn is_object(self) -> bool {
        matches!(self, DType::String)
    }

    /// Canonical lowercase name, as used in `features.json`.
    pub fn name(self) -> &'static str {
        match self {
            DType::String => "string",
            DType::Bool => "bool",
            DType::UInt8 => "uint8",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = TextDsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" | "object" | "bytes" => Ok(DType::String),
            "bool" => Ok(DType::Bool),
            "uint8" => Ok(DType::UInt8),
            "int32" => Ok(DType::Int32),
            "int64" => Ok(DType::Int64),
            "float32" => Ok(DType::Float32),
            "float64" => Ok(DType::Float64),
            other => Err(TextDsError::schema(format!("unsupported dtype '{other}'"))),
        }
    }
}

/// Typed, row-major element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Bytes(Vec<Vec<u8>>),
    Bool(Vec<bool>),
    UInt8(Vec<u8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::Bytes(_) => DType::String,
            TensorData::Bool(_) => DType::Bool,
            TensorData::UInt8(_) => DType::UInt8,
            TensorData::Int32(_) => DType::Int32,
            TensorData::Int64(_) => DType::Int64,
            TensorData::Float32(_) => DType::Float32,
            TensorData::Float64(_) => DType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::Bytes(v) => v.len(),
            TensorData::Bool(v) => v.len(),
            TensorData::UInt8(v) => v.len(),
            TensorData::Int32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
            TensorData::Float32(v) => v.len(),
            TensorData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `other` to `self`. Both must share a dtype.
    fn append(&mut self, other: TensorData) -> std::result::Result<(), DType> {
        match (self, other) {
            (TensorData::Bytes(a), TensorData::Bytes(b)) => a.extend(b),
            (TensorData::Bool(a), TensorData::Bool(b)) => a.extend(b),
            (TensorData::UInt8(a), TensorData::UInt8(b)) => a.extend(b),
            (TensorData::Int32(a), TensorData::Int32(b)) => a.extend(b),
            (TensorData::Int64(a), TensorData::Int64(b)) => a.extend(b),
            (TensorData::Float32(a), TensorData::Float32(b)) => a.extend(b),
            (TensorData::Float64(a), TensorData::Float64(b)) => a.extend(b),
            (_, other) => return Err(other.dtype()),
        }
        Ok(())
    }
}

/// A shaped tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Creates a tensor, checking that the element count matches the shape.
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TextDsError::schema(format!(
                "shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// A scalar byte string.
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self {
            shape: Vec::new(),
            data: TensorData::Bytes(vec![value.into()]),
        }
    }

    /// A scalar int64.
    pub fn int64(value: i64) -> Self {
        Self {
            shape: Vec::new(),
            data: TensorData::Int64(vec![value]),
        }
    }

    /// A scalar float32.
    pub fn float32(value: f32) -> Self {
        Self {
            shape: Vec::new(),
            data: TensorData::Float32(vec![value]),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn into_parts(self) -> (Vec<usize>, TensorData) {
        (self.shape, self.data)
    }

    /// Stacks tensors of identical shape and dtype along a new leading axis.
    ///
    /// `name` is used in error messages only.
    pub fn stack(name: &str, tensors: Vec<Tensor>) -> Result<Tensor> {
        let count = tensors.len();
        let mut iter = tensors.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| TextDsError::schema(format!("cannot stack zero tensors for '{name}'")))?;

        let dtype = first.dtype();
        let element_shape = first.shape;
        let mut data = first.data;

        for tensor in iter {
            if tensor.shape != element_shape {
                return Err(TextDsError::schema(format!(
                    "cannot batch '{}': shape {:?} differs from {:?}",
                    name, tensor.shape, element_shape
                )));
            }
            data.append(tensor.data).map_err(|found| {
                TextDsError::schema(format!(
                    "cannot batch '{name}': dtype {found} differs from {dtype}"
                ))
            })?;
        }

        let mut shape = Vec::with_capacity(element_shape.len() + 1);
        shape.push(count);
        shape.extend(element_shape);
        Ok(Tensor { shape, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_element_count() {
        assert!(Tensor::new(vec![2, 3], TensorData::Int64(vec![0; 6])).is_ok());
        assert!(Tensor::new(vec![2, 3], TensorData::Int64(vec![0; 5])).is_err());
        // A scalar holds exactly one element
        assert!(Tensor::new(vec![], TensorData::Float32(vec![1.0])).is_ok());
    }

    #[test]
    fn test_dtype_parsing() {
        assert_eq!("int64".parse::<DType>().unwrap(), DType::Int64);
        assert_eq!("object".parse::<DType>().unwrap(), DType::String);
        assert!(DType::String.is_object());
        assert!(!DType::Float32.is_object());
        assert!("complex64".parse::<DType>().is_err());
    }

    #[test]
    fn test_stack_adds_leading_axis() {
        let batch = Tensor::stack(
            "text",
            vec![Tensor::bytes("a"), Tensor::bytes("b"), Tensor::bytes("c")],
        )
        .unwrap();
        assert_eq!(batch.shape(), &[3]);
        assert_eq!(
            batch.data(),
            &TensorData::Bytes(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
        );

        let vectors = vec![
            Tensor::new(vec![2], TensorData::Float32(vec![1.0, 2.0])).unwrap(),
            Tensor::new(vec![2], TensorData::Float32(vec![3.0, 4.0])).unwrap(),
        ];
        let batch = Tensor::stack("x", vectors).unwrap();
        assert_eq!(batch.shape(), &[2, 2]);
    }

    #[test]
    fn test_stack_single_scalar() {
        let batch = Tensor::stack("toxicity", vec![Tensor::int64(1)]).unwrap();
        assert_eq!(batch.shape(), &[1]);
        assert_eq!(batch.data(), &TensorData::Int64(vec![1]));
    }

    #[test]
    fn test_stack_rejects_mismatches() {
        let ragged = vec![
            Tensor::new(vec![2], TensorData::Int64(vec![1, 2])).unwrap(),
            Tensor::new(vec![3], TensorData::Int64(vec![1, 2, 3])).unwrap(),
        ];
        assert!(Tensor::stack("ids", ragged).is_err());

        let mixed = vec![Tensor::int64(1), Tensor::float32(1.0)];
        let err = Tensor::stack("label", mixed).unwrap_err();
        assert!(err.to_string().contains("dtype float32 differs from int64"));

        assert!(Tensor::stack("empty", vec![]).is_err());
    }
}
