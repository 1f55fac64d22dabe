// rust/textds-core/src/dataset/text.rs

use std::collections::BTreeMap;

use super::record::{FieldValue, NumericArray, Record};
use crate::catalog::{DatasetProvider, DatasetSummary, LoadOptions, LoadedDataset};
use crate::config::{LoaderConfig, SourceConfig};
use crate::error::{Result, TextDsError};
use crate::schema::{FieldKind, Schema};
use crate::stream::{BoxStream, StreamExt};
use crate::tensor::{TensorData, TensorMap};

/// Iterates a dataset as converted records.
///
/// The underlying stream is unit-batched and prefetched, so every text field
/// converts to a one-element `Vec<String>` and every numeric field to an
/// array with a leading axis of length one. Nothing is read until the first
/// record is requested.
///
/// Iteration continues from wherever the previous pass stopped; call
/// [`reset`](Self::reset) to start over.
pub struct TextIterDataset {
    summary: DatasetSummary,
    schema: Schema,
    kinds: BTreeMap<String, FieldKind>,
    stream: BoxStream,
    epoch_size: Option<usize>,
    records_read: u64,
}

impl TextIterDataset {
    /// Opens `source` through `provider`.
    ///
    /// Resolution failures (unknown dataset, malformed split, unreadable
    /// metadata) are returned as the provider reports them.
    pub fn new(
        provider: &dyn DatasetProvider,
        source: &SourceConfig,
        loader: &LoaderConfig,
    ) -> Result<Self> {
        source.validate()?;
        loader.validate()?;

        let options = LoadOptions::new(&source.split)
            .with_shuffle_files(source.shuffle_files)
            .with_seed(loader.seed);
        let loaded = provider.load(&source.name, &options)?;
        tracing::info!(
            "loaded {} from {} ({} features, prefetch {})",
            loaded.summary,
            provider.describe(),
            loaded.schema.len(),
            loader.prefetch
        );
        Ok(Self::from_loaded(loaded, loader))
    }

    /// Wraps an already loaded dataset.
    pub fn from_loaded(loaded: LoadedDataset, loader: &LoaderConfig) -> Self {
        let LoadedDataset {
            summary,
            schema,
            stream,
        } = loaded;

        let stream = match loader.take {
            Some(count) => stream.take(count).boxed(),
            None => stream,
        };
        let stream = stream.batch(1).prefetch(loader.prefetch).boxed();
        let kinds = schema
            .features()
            .iter()
            .map(|spec| (spec.name.clone(), spec.kind()))
            .collect();

        Self {
            summary,
            schema,
            kinds,
            stream,
            epoch_size: loader.epoch_size,
            records_read: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.summary.name
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The conversion chosen for a declared field.
    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.kinds.get(name).copied()
    }

    /// Maximum records per [`iter`](Self::iter) pass, if limited.
    pub fn epoch_size(&self) -> Option<usize> {
        self.epoch_size
    }

    /// Records converted since construction or the last reset.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Pulls one batch and converts it. `Ok(None)` once the split is exhausted.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(batch) = self.stream.next_batch()? else {
            return Ok(None);
        };
        self.records_read += 1;
        convert_batch(batch, &self.kinds).map(Some)
    }

    /// Iterates records, at most `epoch_size` of them when configured.
    pub fn iter(&mut self) -> Records<'_> {
        Records {
            dataset: self,
            yielded: 0,
            finished: false,
        }
    }

    /// Restarts the underlying stream from its first record.
    pub fn reset(&mut self) -> Result<()> {
        self.stream.reset()?;
        self.records_read = 0;
        tracing::debug!("reset {}", self.summary);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a mut TextIterDataset {
    type Item = Result<Record>;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`TextIterDataset`].
pub struct Records<'a> {
    dataset: &'a mut TextIterDataset,
    yielded: usize,
    finished: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(limit) = self.dataset.epoch_size {
            if self.yielded >= limit {
                return None;
            }
        }

        match self.dataset.next_record() {
            Ok(Some(record)) => {
                self.yielded += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Converts one raw batch.
///
/// Declared fields use their schema kind and must carry a matching dtype.
/// Fields the schema does not declare are classified by their dtype.
pub(crate) fn convert_batch(batch: TensorMap, kinds: &BTreeMap<String, FieldKind>) -> Result<Record> {
    batch
        .into_iter()
        .map(|(name, tensor)| {
            let dtype = tensor.dtype();
            let kind = match kinds.get(&name) {
                Some(kind) if !kind.accepts(dtype) => {
                    return Err(TextDsError::schema(format!(
                        "field '{name}' is declared {kind} but the batch carries {dtype}"
                    )));
                }
                Some(kind) => *kind,
                None => FieldKind::for_dtype(dtype),
            };

            let (shape, data) = tensor.into_parts();
            let value = match (kind, data) {
                (FieldKind::Text, TensorData::Bytes(values)) => FieldValue::Text(
                    values
                        .into_iter()
                        .map(|bytes| String::from_utf8(bytes).map_err(|e| TextDsError::decode(&name, e)))
                        .collect::<Result<_>>()?,
                ),
                (_, data) => FieldValue::Numeric(NumericArray::from_parts(&name, shape, data)?),
            };
            Ok((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryProvider;
    use crate::schema::FeatureSpec;
    use crate::stream::test_support::{numbered, CountingStream};
    use crate::stream::PrefetchPolicy;
    use crate::tensor::{DType, Tensor};
    use std::sync::atomic::Ordering;

    fn numbered_schema() -> Schema {
        Schema::new(vec![
            FeatureSpec::scalar("id", DType::Int64),
            FeatureSpec::text("text"),
        ])
    }

    fn numbered_dataset(count: usize, loader: &LoaderConfig) -> TextIterDataset {
        let provider = MemoryProvider::new()
            .with_dataset("numbers", numbered_schema(), "train", numbered(count))
            .unwrap();
        let source = SourceConfig::new("numbers").with_shuffle_files(false);
        TextIterDataset::new(&provider, &source, loader).unwrap()
    }

    fn id_of(record: &Record) -> i64 {
        record.field("id").unwrap().as_numeric().unwrap().as_int64().unwrap()[[0]]
    }

    #[test]
    fn test_converts_text_and_numeric_fields() {
        let mut dataset = numbered_dataset(3, &LoaderConfig::default());
        assert_eq!(dataset.name(), "numbers");
        assert_eq!(dataset.field_kind("text"), Some(FieldKind::Text));

        let record = dataset.next_record().unwrap().unwrap();
        assert_eq!(record.names(), vec!["id", "text"]);
        assert_eq!(
            record.field("text").unwrap(),
            &FieldValue::Text(vec!["record 0".to_string()])
        );
        let id = record.field("id").unwrap().as_numeric().unwrap();
        assert_eq!(id.shape(), &[1]);
        assert_eq!(id.dtype(), DType::Int64);
        assert_eq!(id_of(&record), 0);
    }

    #[test]
    fn test_exhaustion_ends_iteration() {
        let mut dataset = numbered_dataset(4, &LoaderConfig::default());
        let ids: Vec<i64> = dataset.iter().map(|r| id_of(&r.unwrap())).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(dataset.records_read(), 4);

        // A second pass continues from the exhausted cursor
        assert_eq!(dataset.iter().count(), 0);
    }

    #[test]
    fn test_epoch_size_resumes_between_passes() {
        let loader = LoaderConfig {
            epoch_size: Some(2),
            ..Default::default()
        };
        let mut dataset = numbered_dataset(5, &loader);
        let pass = |d: &mut TextIterDataset| d.iter().map(|r| id_of(&r.unwrap())).collect::<Vec<_>>();

        assert_eq!(pass(&mut dataset), vec![0, 1]);
        assert_eq!(pass(&mut dataset), vec![2, 3]);
        assert_eq!(pass(&mut dataset), vec![4]);
        assert!(pass(&mut dataset).is_empty());
    }

    #[test]
    fn test_take_and_reset() {
        let loader = LoaderConfig {
            take: Some(2),
            prefetch: PrefetchPolicy::Fixed(1),
            ..Default::default()
        };
        let mut dataset = numbered_dataset(10, &loader);
        assert_eq!(dataset.iter().count(), 2);

        dataset.reset().unwrap();
        assert_eq!(dataset.records_read(), 0);
        let ids: Vec<i64> = (&mut dataset).into_iter().map(|r| id_of(&r.unwrap())).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_construction_pulls_nothing() {
        let (counting, pulls) = CountingStream::new(3);
        let loaded = LoadedDataset {
            summary: DatasetSummary {
                name: "counting".into(),
                version: None,
                split: "train".into(),
                num_examples: Some(3),
            },
            schema: numbered_schema(),
            stream: counting.boxed(),
        };
        let mut dataset = TextIterDataset::from_loaded(loaded, &LoaderConfig::default());
        assert_eq!(pulls.load(Ordering::SeqCst), 0);

        assert!(dataset.next_record().unwrap().is_some());
        assert!(pulls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_undeclared_fields_use_dtype() {
        let mut kinds = BTreeMap::new();
        kinds.insert("text".to_string(), FieldKind::Text);

        let mut batch = TensorMap::new();
        batch.insert("text".into(), Tensor::stack("text", vec![Tensor::bytes("hi")]).unwrap());
        batch.insert("score".into(), Tensor::stack("score", vec![Tensor::float32(0.5)]).unwrap());
        batch.insert("note".into(), Tensor::stack("note", vec![Tensor::bytes("extra")]).unwrap());

        let record = convert_batch(batch, &kinds).unwrap();
        assert_eq!(record.field("note").unwrap().as_text().unwrap(), ["extra"]);
        assert_eq!(
            record.field("score").unwrap().as_numeric().unwrap().dtype(),
            DType::Float32
        );
    }

    #[test]
    fn test_declared_kind_mismatch_is_schema_error() {
        let mut kinds = BTreeMap::new();
        kinds.insert("label".to_string(), FieldKind::Numeric(DType::Int64));
        let mut batch = TensorMap::new();
        batch.insert("label".into(), Tensor::bytes("positive"));

        let err = convert_batch(batch, &kinds).unwrap_err();
        assert!(matches!(err, TextDsError::Schema { .. }));
        assert!(err.to_string().contains("declared numeric int64"));
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let mut kinds = BTreeMap::new();
        kinds.insert("text".to_string(), FieldKind::Text);
        let mut batch = TensorMap::new();
        batch.insert("text".into(), Tensor::bytes(vec![0x66, 0xff, 0x6f]));

        let err = convert_batch(batch, &kinds).unwrap_err();
        assert!(matches!(err, TextDsError::Decode { ref field, .. } if field == "text"));
    }

    #[test]
    fn test_unknown_dataset_propagates() {
        let provider = MemoryProvider::new();
        let result = TextIterDataset::new(
            &provider,
            &SourceConfig::new("wikipedia_toxicity_subtypes"),
            &LoaderConfig::default(),
        );
        assert!(matches!(result.err(), Some(TextDsError::DatasetNotFound { .. })));
    }
}
