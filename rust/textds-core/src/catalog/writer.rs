// rust/textds-core/src/catalog/writer.rs

//! Writes datasets in the prepared TFDS layout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::info::{render_features, DatasetInfo, SplitInfo};
use super::tfds::{shard_file_name, FEATURES_FILE, INFO_FILE};
use crate::error::{Result, TextDsError};
use crate::schema::Schema;
use crate::storage::StorageBackend;
use crate::tensor::TensorMap;
use crate::tfrecord::{encode_example, TfRecordWriter, FOOTER_LEN, HEADER_LEN};

/// Default number of examples per shard file.
pub const DEFAULT_RECORDS_PER_SHARD: usize = 10_000;

/// Builds a prepared dataset directory readable by
/// [`TfdsProvider`](super::TfdsProvider).
///
/// Shards are written as each split is added; `dataset_info.json` and
/// `features.json` are written by [`finish`](Self::finish), so a dataset
/// only becomes visible to readers once it is complete.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use textds_core::catalog::DatasetWriter;
/// # use textds_core::config::StorageConfig;
/// # use textds_core::schema::{FeatureSpec, Schema};
/// # use textds_core::storage::LocalStorage;
/// # use textds_core::tensor::DType;
/// # fn main() -> textds_core::Result<()> {
/// let storage = Arc::new(LocalStorage::new(&StorageConfig::default()));
/// let schema = Schema::new(vec![
///     FeatureSpec::text("text"),
///     FeatureSpec::scalar("toxicity", DType::Float32),
/// ]);
/// let mut writer = DatasetWriter::new(storage, "my_comments", "1.0.0", schema);
/// writer.write_split("train", Vec::new())?;
/// writer.finish()?;
/// # Ok(())
/// # }
/// ```
pub struct DatasetWriter {
    storage: Arc<dyn StorageBackend>,
    info: DatasetInfo,
    schema: Schema,
    records_per_shard: usize,
}

impl DatasetWriter {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        name: impl Into<String>,
        version: impl Into<String>,
        schema: Schema,
    ) -> Self {
        Self {
            storage,
            info: DatasetInfo::new(name, version),
            schema,
            records_per_shard: DEFAULT_RECORDS_PER_SHARD,
        }
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.info.config_name = Some(config.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    /// Sets the shard size. Zero is treated as one.
    pub fn with_records_per_shard(mut self, records_per_shard: usize) -> Self {
        self.records_per_shard = records_per_shard.max(1);
        self
    }

    /// Directory of this dataset version, relative to the storage root.
    pub fn dataset_dir(&self) -> PathBuf {
        let mut dir = PathBuf::from(&self.info.name);
        if let Some(config) = &self.info.config_name {
            dir.push(config);
        }
        dir.join(&self.info.version)
    }

    /// Encodes `examples` into the shards of one split.
    pub fn write_split(
        &mut self,
        split: &str,
        examples: impl IntoIterator<Item = TensorMap>,
    ) -> Result<&SplitInfo> {
        if self.info.split(split).is_some() {
            return Err(TextDsError::split(
                split,
                "split was already written",
                self.info.split_names(),
            ));
        }

        let payloads = examples
            .into_iter()
            .enumerate()
            .map(|(index, example)| {
                self.check_example(index, &example)?;
                Ok(encode_example(&example))
            })
            .collect::<Result<Vec<_>>>()?;

        let dir = self.dataset_dir();
        let shard_count = payloads.len().div_ceil(self.records_per_shard);
        let mut shard_lengths = Vec::with_capacity(shard_count);
        let mut num_bytes = 0u64;

        for (index, chunk) in payloads.chunks(self.records_per_shard).enumerate() {
            let path = dir.join(shard_file_name(&self.info.name, split, index, shard_count));
            num_bytes += self.write_shard(&path, chunk)?;
            shard_lengths.push(chunk.len() as u64);
        }

        tracing::debug!(
            "wrote {} examples of {} '{}' into {} shards",
            payloads.len(),
            self.info.name,
            split,
            shard_count
        );
        self.info.splits.push(SplitInfo {
            name: split.to_string(),
            shard_lengths,
            num_bytes,
        });
        Ok(&self.info.splits[self.info.splits.len() - 1])
    }

    fn check_example(&self, index: usize, example: &TensorMap) -> Result<()> {
        if !example.keys().eq(self.schema.names().iter()) {
            return Err(TextDsError::schema(format!(
                "example {} has fields {:?}, schema declares {:?}",
                index,
                example.keys().collect::<Vec<_>>(),
                self.schema.names()
            )));
        }
        for spec in self.schema.features() {
            let found = example[&spec.name].dtype();
            if found.is_object() != spec.dtype.is_object() {
                return Err(TextDsError::schema(format!(
                    "example {} field '{}' is {}, schema declares {}",
                    index, spec.name, found, spec.dtype
                )));
            }
        }
        Ok(())
    }

    fn write_shard(&self, path: &Path, payloads: &[Vec<u8>]) -> Result<u64> {
        let mut writer = TfRecordWriter::new(self.storage.open_write(path)?);
        let mut bytes = 0u64;
        for payload in payloads {
            writer.write_record(payload)?;
            bytes += (payload.len() + HEADER_LEN + FOOTER_LEN) as u64;
        }
        writer.into_inner().finish()?;
        Ok(bytes)
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let mut writer = self.storage.open_write(&tmp)?;
        writer
            .write_all(contents.as_bytes())
            .map_err(|e| TextDsError::storage_with_source(&tmp, "failed to write file", e))?;
        writer.finish()?;
        self.storage.rename(&tmp, path)
    }

    /// Writes the metadata files and returns the final dataset info.
    pub fn finish(self) -> Result<DatasetInfo> {
        let dir = self.dataset_dir();
        self.storage.create_dir_all(&dir)?;
        self.write_atomic(&dir.join(FEATURES_FILE), &render_features(&self.schema)?)?;
        self.write_atomic(&dir.join(INFO_FILE), &self.info.to_json()?)?;
        tracing::debug!("finished dataset {} in {}", self.info.name, dir.display());
        Ok(self.info)
    }
}
