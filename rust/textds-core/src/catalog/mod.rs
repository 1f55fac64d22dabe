// rust/textds-core/src/catalog/mod.rs

//! Dataset providers.
//!
//! A [`DatasetProvider`] resolves a catalog identifier and a split selection
//! into a schema plus a stream of single examples. Two providers ship with
//! the crate:
//!
//! - [`TfdsProvider`] reads datasets prepared on disk in the TensorFlow
//!   Datasets layout (`dataset_info.json`, `features.json` and TFRecord
//!   shards).
//! - [`MemoryProvider`] serves examples registered in memory.
//!
//! [`DatasetWriter`] produces the on-disk layout read by `TfdsProvider`.

mod info;
mod memory;
mod split;
mod tfds;
mod writer;

pub use info::{parse_features, render_features, DatasetInfo, SplitInfo};
pub use memory::MemoryProvider;
pub use split::{ReadInstruction, SplitBound, SplitSpec};
pub use tfds::{DatasetId, TfdsProvider};
pub use writer::DatasetWriter;

use std::fmt;

use crate::error::Result;
use crate::schema::Schema;
use crate::stream::BoxStream;

/// Options passed to [`DatasetProvider::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Split selection, e.g. "train" or "train[:10%]+test".
    pub split: String,
    /// Whether the read order of files (or records) is shuffled.
    pub shuffle_files: bool,
    /// Seed for the shuffle; entropy when `None`.
    pub seed: Option<u64>,
}

impl LoadOptions {
    pub fn new(split: impl Into<String>) -> Self {
        Self {
            split: split.into(),
            shuffle_files: false,
            seed: None,
        }
    }

    pub fn with_shuffle_files(mut self, shuffle_files: bool) -> Self {
        self.shuffle_files = shuffle_files;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Descriptive facts about a loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub name: String,
    pub version: Option<String>,
    pub split: String,
    /// Number of examples selected by the split, when known up front.
    pub num_examples: Option<u64>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        write!(f, " [{}]", self.split)?;
        if let Some(n) = self.num_examples {
            write!(f, " ({n} examples)")?;
        }
        Ok(())
    }
}

/// A resolved dataset: its schema and an unbatched example stream.
pub struct LoadedDataset {
    pub summary: DatasetSummary,
    pub schema: Schema,
    pub stream: BoxStream,
}

/// Resolves dataset identifiers into example streams.
pub trait DatasetProvider: Send + Sync {
    /// Opens `name` for reading. Nothing is read from the stream yet.
    fn load(&self, name: &str, options: &LoadOptions) -> Result<LoadedDataset>;

    /// Short description used in logs.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let summary = DatasetSummary {
            name: "imdb_reviews".into(),
            version: Some("1.0.0".into()),
            split: "train[:10%]".into(),
            num_examples: Some(2500),
        };
        assert_eq!(summary.to_string(), "imdb_reviews:1.0.0 [train[:10%]] (2500 examples)");

        let bare = DatasetSummary {
            name: "synthetic".into(),
            version: None,
            split: "train".into(),
            num_examples: None,
        };
        assert_eq!(bare.to_string(), "synthetic [train]");
    }

    #[test]
    fn test_load_options_builder() {
        let options = LoadOptions::new("test").with_shuffle_files(true).with_seed(Some(7));
        assert_eq!(options.split, "test");
        assert!(options.shuffle_files);
        assert_eq!(options.seed, Some(7));
    }
}
