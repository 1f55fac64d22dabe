// rust/python-bindings/src/convert.rs

//! Conversion of records into Python objects.
//!
//! Text fields become `list[str]`. Numeric arrays are handed to numpy
//! without copying, so `torch.from_numpy` can share the buffer.

use numpy::IntoPyArray;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList, PyTuple};
use textds_core::{FieldValue, NumericArray, Record};

pub fn numeric_to_py(py: Python<'_>, array: NumericArray) -> PyObject {
    match array {
        NumericArray::Bool(a) => a.into_pyarray_bound(py).into_any().unbind(),
        NumericArray::UInt8(a) => a.into_pyarray_bound(py).into_any().unbind(),
        NumericArray::Int32(a) => a.into_pyarray_bound(py).into_any().unbind(),
        NumericArray::Int64(a) => a.into_pyarray_bound(py).into_any().unbind(),
        NumericArray::Float32(a) => a.into_pyarray_bound(py).into_any().unbind(),
        NumericArray::Float64(a) => a.into_pyarray_bound(py).into_any().unbind(),
    }
}

pub fn value_to_py(py: Python<'_>, value: FieldValue) -> PyObject {
    match value {
        FieldValue::Text(values) => PyList::new_bound(py, values).into_any().unbind(),
        FieldValue::Numeric(array) => numeric_to_py(py, array),
    }
}

pub fn record_to_py(py: Python<'_>, record: Record) -> PyResult<PyObject> {
    let dict = PyDict::new_bound(py);
    for (name, value) in record {
        dict.set_item(name, value_to_py(py, value))?;
    }
    Ok(dict.into_any().unbind())
}

pub fn pair_to_py(py: Python<'_>, text: String, label: FieldValue) -> PyObject {
    let items = [text.into_py(py), value_to_py(py, label)];
    PyTuple::new_bound(py, items).into_any().unbind()
}
