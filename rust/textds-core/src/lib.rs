// rust/textds-core/src/lib.rs

//! textds - Core Library
//!
//! Iterable text datasets over catalogs prepared in the TensorFlow Datasets
//! layout. A provider resolves a dataset and split into a stream of
//! examples; the adapters in [`dataset`] batch, prefetch and convert that
//! stream into records of decoded text and owned numeric arrays, or into
//! `(text, label)` pairs for classification.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{ClassificationFields, LoaderConfig, SourceConfig, StorageConfig, TextDsConfig};
pub use error::{Result, TextDsError};
pub use storage::{LocalStorage, ObjectMeta, StorageBackend, StorageReader, StorageWriter};

pub mod schema;
pub mod tensor;
pub use schema::{Dim, FeatureSpec, FieldKind, Schema};
pub use tensor::{DType, Tensor, TensorData, TensorMap};

pub mod tfrecord;

pub mod stream;
pub use stream::{BoxStream, PrefetchPolicy, RecordStream, StreamExt};

pub mod catalog;
pub use catalog::{
    DatasetProvider, DatasetSummary, DatasetWriter, LoadOptions, LoadedDataset, MemoryProvider,
    TfdsProvider,
};

pub mod dataset;
pub use dataset::{
    ClassificationPair, FieldValue, NumericArray, Record, TextClassificationDataset,
    TextIterDataset,
};
