// rust/python-bindings/src/lib.rs

//! Python bindings for textds.
//!
//! This module exposes the dataset adapters to Python using PyO3. Both
//! classes allow subclassing; the `textds` package mixes them into
//! `torch.utils.data.IterableDataset` so a `DataLoader` iterates them.

use pyo3::exceptions::{PyIOError, PyKeyError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use textds_core::TextDsError;

mod convert;
mod dataset;

pub use dataset::{PyTextClassificationDataset, PyTextIterDataset};

/// Wrapper for TextDsError to enable conversion to PyErr.
///
/// This newtype pattern allows us to implement the conversion trait
/// since both TextDsError and PyErr are foreign types.
pub struct WrappedError(pub TextDsError);

impl From<TextDsError> for WrappedError {
    fn from(err: TextDsError) -> Self {
        WrappedError(err)
    }
}

impl From<WrappedError> for PyErr {
    fn from(err: WrappedError) -> PyErr {
        let message = err.0.to_string();
        match &err.0 {
            TextDsError::Storage { .. } => PyIOError::new_err(message),
            TextDsError::MissingField { field, .. } => PyKeyError::new_err(field.clone()),
            TextDsError::FieldType { .. } => PyTypeError::new_err(message),
            TextDsError::DatasetNotFound { .. }
            | TextDsError::Split { .. }
            | TextDsError::Schema { .. }
            | TextDsError::Decode { .. }
            | TextDsError::Config { .. } => PyValueError::new_err(message),
            TextDsError::Record { .. }
            | TextDsError::Unsupported { .. }
            | TextDsError::Serialization { .. }
            | TextDsError::Prefetch { .. } => PyRuntimeError::new_err(message),
        }
    }
}

/// The native module behind the `textds` Python package.
///
/// This module provides:
/// - `TextIterDataset`: yields dicts of field name to list of str or numpy
///   array
/// - `TextClassificationDataset`: yields `(text, label)` tuples
#[pymodule]
fn _textds_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_class::<PyTextIterDataset>()?;
    m.add_class::<PyTextClassificationDataset>()?;
    Ok(())
}
