// rust/textds-core/src/catalog/memory.rs

//! In-memory dataset provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::split::SplitSpec;
use super::{DatasetProvider, DatasetSummary, LoadOptions, LoadedDataset};
use crate::error::{Result, TextDsError};
use crate::schema::Schema;
use crate::stream::RecordStream;
use crate::tensor::TensorMap;

const MEMORY_ROOT: &str = "<memory>";

struct MemoryDataset {
    schema: Schema,
    splits: BTreeMap<String, Arc<Vec<TensorMap>>>,
}

/// Serves examples registered in memory.
///
/// Split selections work as they do on disk. With `shuffle_files` the
/// record order is permuted, since there are no files to shuffle.
#[derive(Default)]
pub struct MemoryProvider {
    datasets: BTreeMap<String, MemoryDataset>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a dataset with no splits.
    pub fn register(&mut self, name: impl Into<String>, schema: Schema) {
        self.datasets.insert(
            name.into(),
            MemoryDataset {
                schema,
                splits: BTreeMap::new(),
            },
        );
    }

    /// Adds a split to a registered dataset.
    ///
    /// Every example must carry exactly the schema's features.
    pub fn add_split(
        &mut self,
        name: &str,
        split: impl Into<String>,
        examples: Vec<TensorMap>,
    ) -> Result<()> {
        let dataset = self
            .datasets
            .get_mut(name)
            .ok_or_else(|| TextDsError::dataset_not_found(name, MEMORY_ROOT))?;

        let expected = dataset.schema.names();
        for (index, example) in examples.iter().enumerate() {
            if !example.keys().eq(expected.iter()) {
                return Err(TextDsError::schema(format!(
                    "example {} of '{}' has fields {:?}, schema declares {:?}",
                    index,
                    name,
                    example.keys().collect::<Vec<_>>(),
                    expected
                )));
            }
        }

        dataset.splits.insert(split.into(), Arc::new(examples));
        Ok(())
    }

    /// Registers a dataset with a single split in one call.
    pub fn with_dataset(
        mut self,
        name: &str,
        schema: Schema,
        split: &str,
        examples: Vec<TensorMap>,
    ) -> Result<Self> {
        self.register(name, schema);
        self.add_split(name, split, examples)?;
        Ok(self)
    }
}

impl DatasetProvider for MemoryProvider {
    fn load(&self, name: &str, options: &LoadOptions) -> Result<LoadedDataset> {
        let dataset = self
            .datasets
            .get(name)
            .ok_or_else(|| TextDsError::dataset_not_found(name, MEMORY_ROOT))?;

        let spec: SplitSpec = options.split.parse()?;
        let sizes: BTreeMap<String, u64> = dataset
            .splits
            .iter()
            .map(|(split, examples)| (split.clone(), examples.len() as u64))
            .collect();

        let mut selected = Vec::new();
        for (split, range) in spec.resolve(&sizes)? {
            let examples = &dataset.splits[&split];
            selected.extend((range.start as usize..range.end as usize).map(|i| (examples.clone(), i)));
        }

        let rng = options.shuffle_files.then(|| match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        });
        let summary = DatasetSummary {
            name: name.to_string(),
            version: None,
            split: spec.to_string(),
            num_examples: Some(selected.len() as u64),
        };
        let stream = MemoryStream::new(selected, rng, format!("{name} [{spec}]"));

        Ok(LoadedDataset {
            summary,
            schema: dataset.schema.clone(),
            stream: Box::new(stream),
        })
    }

    fn describe(&self) -> String {
        format!("in-memory catalog of {} datasets", self.datasets.len())
    }
}

struct MemoryStream {
    selected: Vec<(Arc<Vec<TensorMap>>, usize)>,
    position: usize,
    rng: Option<StdRng>,
    label: String,
}

impl MemoryStream {
    fn new(selected: Vec<(Arc<Vec<TensorMap>>, usize)>, rng: Option<StdRng>, label: String) -> Self {
        let mut stream = Self {
            selected,
            position: 0,
            rng,
            label,
        };
        stream.shuffle();
        stream
    }

    fn shuffle(&mut self) {
        if let Some(rng) = &mut self.rng {
            self.selected.shuffle(rng);
        }
    }
}

impl RecordStream for MemoryStream {
    fn next_batch(&mut self) -> Result<Option<TensorMap>> {
        let item = self
            .selected
            .get(self.position)
            .map(|(examples, index)| examples[*index].clone());
        if item.is_some() {
            self.position += 1;
        }
        Ok(item)
    }

    fn reset(&mut self) -> Result<()> {
        self.position = 0;
        self.shuffle();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("in-memory examples of {}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FeatureSpec;
    use crate::stream::test_support::{ids, numbered};
    use crate::tensor::DType;

    fn schema() -> Schema {
        Schema::new(vec![
            FeatureSpec::scalar("id", DType::Int64),
            FeatureSpec::text("text"),
        ])
    }

    fn provider() -> MemoryProvider {
        let mut provider = MemoryProvider::new();
        provider.register("numbers", schema());
        provider.add_split("numbers", "train", numbered(20)).unwrap();
        provider.add_split("numbers", "test", numbered(5)).unwrap();
        provider
    }

    fn drain(loaded: &mut LoadedDataset) -> Vec<i64> {
        let mut seen = Vec::new();
        while let Some(item) = loaded.stream.next_batch().unwrap() {
            seen.extend(ids(&item));
        }
        seen
    }

    #[test]
    fn test_load_whole_and_sliced_splits() {
        let provider = provider();
        let mut loaded = provider.load("numbers", &LoadOptions::new("train")).unwrap();
        assert_eq!(loaded.summary.num_examples, Some(20));
        assert_eq!(drain(&mut loaded), (0..20).collect::<Vec<_>>());

        let mut loaded = provider
            .load("numbers", &LoadOptions::new("train[-2:]+test[:10%]"))
            .unwrap();
        assert_eq!(drain(&mut loaded), vec![18, 19, 0]);
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let provider = provider();
        let options = LoadOptions::new("train").with_shuffle_files(true).with_seed(Some(3));
        let a = drain(&mut provider.load("numbers", &options).unwrap());
        let b = drain(&mut provider.load("numbers", &options).unwrap());
        assert_eq!(a, b);
        assert_ne!(a, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_unknown_dataset_and_split() {
        let provider = provider();
        assert!(matches!(
            provider.load("letters", &LoadOptions::new("train")).err(),
            Some(TextDsError::DatasetNotFound { .. })
        ));
        assert!(matches!(
            provider.load("numbers", &LoadOptions::new("validation")).err(),
            Some(TextDsError::Split { .. })
        ));
    }

    #[test]
    fn test_add_split_checks_fields() {
        let mut provider = MemoryProvider::new();
        provider.register("numbers", schema());
        let mut examples = numbered(2);
        examples[1].remove("text");
        assert!(matches!(
            provider.add_split("numbers", "train", examples),
            Err(TextDsError::Schema { .. })
        ));
        assert!(provider.add_split("missing", "train", numbered(1)).is_err());
    }
}
