// rust/textds-core/src/catalog/tfds.rs

//! Provider for datasets prepared on disk in the TensorFlow Datasets layout.
//!
//! ```text
//! <data_dir>/<name>[/<config>]/<version>/
//!     dataset_info.json
//!     features.json
//!     <name>-<split>.tfrecord-00000-of-00002
//!     <name>-<split>.tfrecord-00001-of-00002
//! ```

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::info::{parse_features, DatasetInfo};
use super::split::SplitSpec;
use super::{DatasetProvider, DatasetSummary, LoadOptions, LoadedDataset};
use crate::config::TextDsConfig;
use crate::error::{Result, TextDsError};
use crate::schema::Schema;
use crate::storage::{LocalStorage, StorageBackend, StorageReader};
use crate::stream::RecordStream;
use crate::tensor::TensorMap;
use crate::tfrecord::{decode_example, TfRecordReader};

pub(crate) const INFO_FILE: &str = "dataset_info.json";
pub(crate) const FEATURES_FILE: &str = "features.json";

/// File name of shard `index` out of `count` for one split.
pub(crate) fn shard_file_name(dataset: &str, split: &str, index: usize, count: usize) -> String {
    format!("{dataset}-{split}.tfrecord-{index:05}-of-{count:05}")
}

/// A catalog identifier, `name[/config][:version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetId {
    pub name: String,
    pub config: Option<String>,
    pub version: Option<String>,
}

impl DatasetId {
    /// Directory holding every version of the dataset, relative to the data dir.
    pub fn base_dir(&self) -> PathBuf {
        let mut dir = PathBuf::from(&self.name);
        if let Some(config) = &self.config {
            dir.push(config);
        }
        dir
    }
}

fn valid_component(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && s != "."
        && s != ".."
}

impl FromStr for DatasetId {
    type Err = TextDsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| TextDsError::config(format!("invalid dataset identifier '{s}': {why}"));

        let (path, version) = match s.trim().split_once(':') {
            Some((path, version)) => (path, Some(version.to_string())),
            None => (s.trim(), None),
        };
        let (name, config) = match path.split_once('/') {
            Some((name, config)) => (name, Some(config.to_string())),
            None => (path, None),
        };

        if !valid_component(name) {
            return Err(invalid("bad dataset name"));
        }
        if config.as_deref().is_some_and(|c| !valid_component(c)) {
            return Err(invalid("bad config name"));
        }
        if version.as_deref().is_some_and(|v| parse_version(v).is_none()) {
            return Err(invalid("version must look like 1.2.3"));
        }

        Ok(Self {
            name: name.to_string(),
            config,
            version,
        })
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(config) = &self.config {
            write!(f, "/{config}")?;
        }
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

fn parse_version(text: &str) -> Option<Vec<u64>> {
    text.split('.').map(|part| part.parse().ok()).collect()
}

/// Reads prepared TFDS datasets through a [`StorageBackend`].
pub struct TfdsProvider {
    storage: Arc<dyn StorageBackend>,
    data_dir: PathBuf,
    verify_checksums: bool,
}

impl TfdsProvider {
    /// Creates a provider. `data_dir` is the storage root, used in messages.
    pub fn new(storage: Arc<dyn StorageBackend>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            data_dir: data_dir.into(),
            verify_checksums: true,
        }
    }

    /// Creates a provider over local storage as configured.
    pub fn from_config(config: &TextDsConfig) -> Self {
        let storage = LocalStorage::new(&config.storage);
        Self::new(Arc::new(storage), &config.storage.data_dir)
            .with_verify_checksums(config.loader.verify_checksums)
    }

    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Finds the directory of the requested (or newest) prepared version.
    pub fn dataset_dir(&self, id: &DatasetId) -> Result<PathBuf> {
        let base = id.base_dir();
        let not_found = || TextDsError::dataset_not_found(id.to_string(), &self.data_dir);

        if let Some(version) = &id.version {
            let dir = base.join(version);
            return if self.storage.exists(&dir.join(INFO_FILE))? {
                Ok(dir)
            } else {
                Err(not_found())
            };
        }

        let mut best: Option<(Vec<u64>, String)> = None;
        for entry in self.storage.list(&base)? {
            let Some(version) = parse_version(&entry) else {
                continue;
            };
            if !self.storage.exists(&base.join(&entry).join(INFO_FILE))? {
                continue;
            }
            if best.as_ref().map_or(true, |(current, _)| version > *current) {
                best = Some((version, entry));
            }
        }

        best.map(|(_, entry)| base.join(entry)).ok_or_else(not_found)
    }

    /// Reads `dataset_info.json` and `features.json` of a dataset.
    pub fn read_metadata(&self, id: &DatasetId) -> Result<(PathBuf, DatasetInfo, Schema)> {
        let dir = self.dataset_dir(id)?;
        let info = DatasetInfo::from_json(&self.read_text(&dir.join(INFO_FILE))?)?;
        let schema = parse_features(&self.read_text(&dir.join(FEATURES_FILE))?)?;
        Ok((dir, info, schema))
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        let mut reader = self.storage.open_read(path)?;
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| TextDsError::storage_with_source(path, "failed to read file", e))?;
        Ok(text)
    }

    /// Shard files of a split whose lengths are not recorded.
    fn listed_shards(&self, dir: &Path, dataset: &str, split: &str) -> Result<Vec<PathBuf>> {
        let prefix = format!("{dataset}-{split}.tfrecord");
        Ok(self
            .storage
            .list(dir)?
            .into_iter()
            .filter(|entry| entry.starts_with(&prefix))
            .map(|entry| dir.join(entry))
            .collect())
    }

    fn plan_reads(&self, dir: &Path, info: &DatasetInfo, spec: &SplitSpec) -> Result<Vec<ShardRead>> {
        let ranges = spec.resolve(&info.split_sizes())?;
        let mut reads = Vec::new();

        for (instruction, (split, range)) in spec.instructions().iter().zip(ranges) {
            let lengths = info
                .split(&split)
                .map(|s| s.shard_lengths.as_slice())
                .unwrap_or_default();

            if lengths.is_empty() {
                if instruction.is_sliced() {
                    return Err(TextDsError::split(
                        spec.to_string(),
                        format!("split '{split}' records no shard lengths, so it cannot be sliced"),
                        info.split_names(),
                    ));
                }
                reads.extend(
                    self.listed_shards(dir, &info.name, &split)?
                        .into_iter()
                        .map(|path| ShardRead { path, skip: 0, take: None }),
                );
                continue;
            }

            let mut offset = 0u64;
            for (index, &len) in lengths.iter().enumerate() {
                let start = range.start.max(offset);
                let end = range.end.min(offset + len);
                if start < end {
                    reads.push(ShardRead {
                        path: dir.join(shard_file_name(&info.name, &split, index, lengths.len())),
                        skip: start - offset,
                        take: Some(end - start),
                    });
                }
                offset += len;
            }
        }
        Ok(reads)
    }
}

impl DatasetProvider for TfdsProvider {
    fn load(&self, name: &str, options: &LoadOptions) -> Result<LoadedDataset> {
        let id: DatasetId = name.parse()?;
        let (dir, info, schema) = self.read_metadata(&id)?;
        if info.file_format != "tfrecord" {
            return Err(TextDsError::unsupported(format!(
                "file format '{}' of {}",
                info.file_format, id
            )));
        }

        let spec: SplitSpec = options.split.parse()?;
        let reads = self.plan_reads(&dir, &info, &spec)?;
        let num_examples = reads
            .iter()
            .map(|r| r.take)
            .sum::<Option<u64>>();

        tracing::debug!(
            "{} split '{}' resolves to {} shard reads in {}",
            id,
            spec,
            reads.len(),
            dir.display()
        );

        let rng = options.shuffle_files.then(|| match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        });
        let stream = ShardStream::new(
            self.storage.clone(),
            schema.clone(),
            reads,
            rng,
            self.verify_checksums,
            format!("{id} [{spec}]"),
        );

        Ok(LoadedDataset {
            summary: DatasetSummary {
                name: id.name.clone(),
                version: Some(info.version.clone()),
                split: spec.to_string(),
                num_examples,
            },
            schema,
            stream: Box::new(stream),
        })
    }

    fn describe(&self) -> String {
        format!("tfds catalog at {}", self.data_dir.display())
    }
}

/// A contiguous run of records inside one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ShardRead {
    path: PathBuf,
    skip: u64,
    /// Records to read after skipping; the rest of the shard when `None`.
    take: Option<u64>,
}

struct OpenShard {
    reader: TfRecordReader<Box<dyn StorageReader>>,
    remaining: Option<u64>,
}

/// Streams decoded examples from a sequence of shard reads.
struct ShardStream {
    storage: Arc<dyn StorageBackend>,
    schema: Schema,
    reads: Vec<ShardRead>,
    order: Vec<usize>,
    next_read: usize,
    current: Option<OpenShard>,
    rng: Option<StdRng>,
    verify_checksums: bool,
    label: String,
}

impl ShardStream {
    fn new(
        storage: Arc<dyn StorageBackend>,
        schema: Schema,
        reads: Vec<ShardRead>,
        rng: Option<StdRng>,
        verify_checksums: bool,
        label: String,
    ) -> Self {
        let mut stream = Self {
            storage,
            schema,
            order: (0..reads.len()).collect(),
            reads,
            next_read: 0,
            current: None,
            rng,
            verify_checksums,
            label,
        };
        stream.shuffle();
        stream
    }

    fn shuffle(&mut self) {
        if let Some(rng) = &mut self.rng {
            self.order.shuffle(rng);
        }
    }

    fn open(&self, read: &ShardRead) -> Result<OpenShard> {
        let inner = self.storage.open_read(&read.path)?;
        let mut reader = TfRecordReader::new(inner, &read.path, self.verify_checksums);
        if read.skip > 0 {
            let skipped = reader.skip_records(read.skip)?;
            if skipped < read.skip {
                return Err(TextDsError::record(
                    &read.path,
                    format!("shard ends after {skipped} records, expected at least {}", read.skip),
                ));
            }
        }
        tracing::debug!("reading shard {} (skip {})", read.path.display(), read.skip);
        Ok(OpenShard {
            reader,
            remaining: read.take,
        })
    }
}

impl RecordStream for ShardStream {
    fn next_batch(&mut self) -> Result<Option<TensorMap>> {
        loop {
            if let Some(shard) = &mut self.current {
                if shard.remaining != Some(0) {
                    // A framing error leaves the reader mid-record; the shard is abandoned
                    let next = match shard.reader.next_record() {
                        Ok(next) => next,
                        Err(e) => {
                            self.current = None;
                            return Err(e);
                        }
                    };
                    if let Some(payload) = next {
                        if let Some(remaining) = &mut shard.remaining {
                            *remaining -= 1;
                        }
                        let example = decode_example(&payload, &self.schema, shard.reader.path())?;
                        return Ok(Some(example));
                    }
                    if let Some(missing) = shard.remaining {
                        let err = TextDsError::record(
                            shard.reader.path(),
                            format!("shard ended {missing} records early"),
                        );
                        self.current = None;
                        return Err(err);
                    }
                }
                self.current = None;
            }

            let Some(&index) = self.order.get(self.next_read) else {
                return Ok(None);
            };
            self.next_read += 1;
            let shard = self.open(&self.reads[index])?;
            self.current = Some(shard);
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.current = None;
        self.next_read = 0;
        self.shuffle();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("tfrecord shards of {}", self.label)
    }
}
