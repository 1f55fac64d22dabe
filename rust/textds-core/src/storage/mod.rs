// rust/textds-core/src/storage/mod.rs

//! Storage access for prepared datasets.
//!
//! # Example
//!
//! ```no_run
//! use textds_core::config::StorageConfig;
//! use textds_core::storage::{LocalStorage, StorageBackend};
//! use std::io::Read;
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default());
//! let mut reader = storage
//!     .open_read(Path::new("imdb_reviews/1.0.0/dataset_info.json"))
//!     .unwrap();
//! let mut content = String::new();
//! reader.read_to_string(&mut content).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};
