// rust/textds-core/src/schema.rs

//! Declared feature schemas and the text/numeric field decision.

use std::fmt;

use crate::tensor::DType;

/// A declared dimension: fixed, or unknown until an example is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Fixed(usize),
    Unknown,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Unknown => f.write_str("None"),
        }
    }
}

/// One declared feature of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    pub name: String,
    pub dtype: DType,
    /// Per-example shape; empty for scalars.
    pub shape: Vec<Dim>,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, dtype: DType, shape: Vec<Dim>) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
        }
    }

    /// A scalar feature.
    pub fn scalar(name: impl Into<String>, dtype: DType) -> Self {
        Self::new(name, dtype, Vec::new())
    }

    /// A scalar text feature.
    pub fn text(name: impl Into<String>) -> Self {
        Self::scalar(name, DType::String)
    }

    /// Resolves the declared shape against an element count, inferring at
    /// most one unknown dimension.
    pub fn resolve_shape(&self, elements: usize) -> Option<Vec<usize>> {
        let known: usize = self
            .shape
            .iter()
            .filter_map(|d| match d {
                Dim::Fixed(n) => Some(*n),
                Dim::Unknown => None,
            })
            .product();
        let unknown = self.shape.iter().filter(|d| **d == Dim::Unknown).count();

        match unknown {
            0 if known == elements => Some(self.fixed_dims(0)),
            1 if known > 0 && elements % known == 0 => Some(self.fixed_dims(elements / known)),
            1 if known == 0 && elements == 0 => Some(self.fixed_dims(0)),
            _ => None,
        }
    }

    fn fixed_dims(&self, inferred: usize) -> Vec<usize> {
        self.shape
            .iter()
            .map(|d| match d {
                Dim::Fixed(n) => *n,
                Dim::Unknown => inferred,
            })
            .collect()
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.shape.iter().map(Dim::to_string).collect();
        write!(f, "{}: {}[{}] ({})", self.name, self.dtype, dims.join(", "), self.kind())
    }
}

/// How a field is converted for the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Byte strings decoded to UTF-8 text.
    Text,
    /// Native numbers moved into an owned array.
    Numeric(DType),
}

impl FieldKind {
    /// The text/numeric decision for an element type.
    pub fn for_dtype(dtype: DType) -> Self {
        if dtype.is_object() {
            FieldKind::Text
        } else {
            FieldKind::Numeric(dtype)
        }
    }

    /// Returns true if a tensor of `dtype` can be converted as this kind.
    pub fn accepts(self, dtype: DType) -> bool {
        Self::for_dtype(dtype) == self
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => f.write_str("text"),
            FieldKind::Numeric(dtype) => write!(f, "numeric {dtype}"),
        }
    }
}

impl FeatureSpec {
    pub fn kind(&self) -> FieldKind {
        FieldKind::for_dtype(self.dtype)
    }
}

/// The ordered feature declarations of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    features: Vec<FeatureSpec>,
}

impl Schema {
    /// Creates a schema, ordered by feature name.
    pub fn new(mut features: Vec<FeatureSpec>) -> Self {
        features.sort_by(|a, b| a.name.cmp(&b.name));
        Self { features }
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features
            .binary_search_by(|f| f.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.features[i])
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
