// rust/textds-core/src/dataset/record.rs

//! Converted records handed to consumers.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, IxDyn};

use crate::error::{Result, TextDsError};
use crate::tensor::{DType, TensorData};

/// An owned n-dimensional numeric array.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    Bool(ArrayD<bool>),
    UInt8(ArrayD<u8>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

macro_rules! dispatch {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            NumericArray::Bool($array) => $body,
            NumericArray::UInt8($array) => $body,
            NumericArray::Int32($array) => $body,
            NumericArray::Int64($array) => $body,
            NumericArray::Float32($array) => $body,
            NumericArray::Float64($array) => $body,
        }
    };
}

impl NumericArray {
    /// Moves a numeric buffer into an array of the given shape.
    ///
    /// Byte-string data is rejected; `field` names it in the error.
    pub fn from_parts(field: &str, shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let dim = IxDyn(&shape);
        let bad_shape = |e: ndarray::ShapeError| {
            TextDsError::schema(format!("field '{field}' does not fit shape {shape:?}: {e}"))
        };
        Ok(match data {
            TensorData::Bool(v) => NumericArray::Bool(ArrayD::from_shape_vec(dim, v).map_err(bad_shape)?),
            TensorData::UInt8(v) => NumericArray::UInt8(ArrayD::from_shape_vec(dim, v).map_err(bad_shape)?),
            TensorData::Int32(v) => NumericArray::Int32(ArrayD::from_shape_vec(dim, v).map_err(bad_shape)?),
            TensorData::Int64(v) => NumericArray::Int64(ArrayD::from_shape_vec(dim, v).map_err(bad_shape)?),
            TensorData::Float32(v) => {
                NumericArray::Float32(ArrayD::from_shape_vec(dim, v).map_err(bad_shape)?)
            }
            TensorData::Float64(v) => {
                NumericArray::Float64(ArrayD::from_shape_vec(dim, v).map_err(bad_shape)?)
            }
            TensorData::Bytes(_) => {
                return Err(TextDsError::field_type(field, "numeric", DType::String.name()))
            }
        })
    }

    pub fn dtype(&self) -> DType {
        match self {
            NumericArray::Bool(_) => DType::Bool,
            NumericArray::UInt8(_) => DType::UInt8,
            NumericArray::Int32(_) => DType::Int32,
            NumericArray::Int64(_) => DType::Int64,
            NumericArray::Float32(_) => DType::Float32,
            NumericArray::Float64(_) => DType::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements in row-major order, widened to f64.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            NumericArray::Bool(a) => a.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect(),
            NumericArray::UInt8(a) => a.iter().map(|&v| f64::from(v)).collect(),
            NumericArray::Int32(a) => a.iter().map(|&v| f64::from(v)).collect(),
            NumericArray::Int64(a) => a.iter().map(|&v| v as f64).collect(),
            NumericArray::Float32(a) => a.iter().map(|&v| f64::from(v)).collect(),
            NumericArray::Float64(a) => a.iter().copied().collect(),
        }
    }

    pub fn as_int64(&self) -> Option<&ArrayD<i64>> {
        match self {
            NumericArray::Int64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_float32(&self) -> Option<&ArrayD<f32>> {
        match self {
            NumericArray::Float32(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for NumericArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, a => write!(f, "{a}"))
    }
}

/// One converted field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Decoded text, one string per element.
    Text(Vec<String>),
    Numeric(NumericArray),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            FieldValue::Text(values) => Some(values),
            FieldValue::Numeric(_) => None,
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            FieldValue::Numeric(array) => Some(array),
            FieldValue::Text(_) => None,
        }
    }

    /// Short type description, e.g. `text` or `int64[1]`.
    pub fn type_name(&self) -> String {
        match self {
            FieldValue::Text(_) => "text".to_string(),
            FieldValue::Numeric(array) => format!("{}{:?}", array.dtype(), array.shape()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(values) => write!(f, "{values:?}"),
            FieldValue::Numeric(array) => write!(f, "{array}"),
        }
    }
}

/// A converted record: field name to value, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Looks up a field, failing with the available names if it is absent.
    pub fn field(&self, name: &str) -> Result<&FieldValue> {
        self.fields
            .get(name)
            .ok_or_else(|| TextDsError::missing_field(name, self.names()))
    }

    /// Removes and returns a field, failing like [`field`](Self::field).
    pub fn take(&mut self, name: &str) -> Result<FieldValue> {
        match self.fields.remove(name) {
            Some(value) => Ok(value),
            None => Err(TextDsError::missing_field(name, self.names())),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_keeps_shape_and_values() {
        let array = NumericArray::from_parts(
            "m",
            vec![1, 2, 3],
            TensorData::Float32(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
        )
        .unwrap();
        assert_eq!(array.shape(), &[1, 2, 3]);
        assert_eq!(array.dtype(), DType::Float32);
        assert_eq!(array.as_float32().unwrap()[[0, 1, 2]], 5.0);
        assert_eq!(array.to_f64_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_numeric_rejects_bytes_and_bad_shapes() {
        let err = NumericArray::from_parts("text", vec![1], TensorData::Bytes(vec![b"x".to_vec()]))
            .unwrap_err();
        assert!(matches!(err, TextDsError::FieldType { .. }));

        assert!(NumericArray::from_parts("ids", vec![3], TensorData::Int64(vec![1, 2])).is_err());
    }

    #[test]
    fn test_display() {
        let label = NumericArray::from_parts("toxicity", vec![1], TensorData::Int64(vec![1])).unwrap();
        assert_eq!(label.to_string(), "[1]");

        let mut record = Record::new();
        record.insert("text", FieldValue::Text(vec!["hi".into()]));
        record.insert("toxicity", FieldValue::Numeric(label));
        assert_eq!(record.to_string(), "{text: [\"hi\"], toxicity: [1]}");
        assert_eq!(record.get("toxicity").unwrap().type_name(), "int64[1]");
    }

    #[test]
    fn test_field_lookup_errors_list_names() {
        let mut record: Record = vec![("text".to_string(), FieldValue::Text(vec!["a".into()]))]
            .into_iter()
            .collect();
        let err = record.field("label").unwrap_err();
        assert!(err.is_missing_field());
        assert!(err.to_string().contains("fields: text"));

        assert!(record.take("text").is_ok());
        assert!(record.take("text").is_err());
        assert!(record.is_empty());
    }
}
