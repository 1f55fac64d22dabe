// rust/python-bindings/src/dataset.rs

//! Python bindings for TextIterDataset and TextClassificationDataset.

// Allow useless_conversion - clippy has false positives with our error conversion pattern
#![allow(clippy::useless_conversion)]

use std::path::PathBuf;

use pyo3::prelude::*;
use textds_core::{
    ClassificationFields, PrefetchPolicy, SourceConfig, TextClassificationDataset, TextDsConfig,
    TextDsError, TextIterDataset, TfdsProvider,
};

use crate::convert::{pair_to_py, record_to_py};
use crate::WrappedError;

/// Prefetch argument: a policy name, a buffer size, or a bool.
#[derive(Debug, Clone)]
pub enum PyPrefetchOption {
    Bool(bool),
    Int(usize),
    Name(String),
}

impl<'py> FromPyObject<'py> for PyPrefetchOption {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        // bool first, since Python bools are ints
        if let Ok(b) = ob.extract::<bool>() {
            return Ok(PyPrefetchOption::Bool(b));
        }
        if let Ok(i) = ob.extract::<usize>() {
            return Ok(PyPrefetchOption::Int(i));
        }
        if let Ok(s) = ob.extract::<String>() {
            return Ok(PyPrefetchOption::Name(s));
        }
        Err(pyo3::exceptions::PyTypeError::new_err(
            "prefetch must be 'autotune', 'disabled', a bool or an int",
        ))
    }
}

impl PyPrefetchOption {
    fn policy(&self) -> Result<PrefetchPolicy, TextDsError> {
        match self {
            PyPrefetchOption::Bool(true) => Ok(PrefetchPolicy::Autotune),
            PyPrefetchOption::Bool(false) | PyPrefetchOption::Int(0) => Ok(PrefetchPolicy::Disabled),
            PyPrefetchOption::Int(n) => Ok(PrefetchPolicy::Fixed(*n)),
            PyPrefetchOption::Name(name) => name.parse(),
        }
    }
}

/// Loader arguments shared by both dataset classes.
struct LoadArgs {
    data_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    prefetch: Option<PyPrefetchOption>,
    epoch_size: Option<usize>,
    take: Option<usize>,
    seed: Option<u64>,
}

impl LoadArgs {
    /// Builds the configuration: file (or defaults), environment, then
    /// explicit arguments.
    fn config(&self) -> Result<TextDsConfig, TextDsError> {
        let mut config = match &self.config {
            Some(path) => TextDsConfig::from_file(path)?,
            None => TextDsConfig::default(),
        }
        .with_env_overrides();

        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if let Some(prefetch) = &self.prefetch {
            config.loader.prefetch = prefetch.policy()?;
        }
        if self.epoch_size.is_some() {
            config.loader.epoch_size = self.epoch_size;
        }
        if self.take.is_some() {
            config.loader.take = self.take;
        }
        if self.seed.is_some() {
            config.loader.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

/// An iterable over a prepared dataset, yielding one dict per record.
///
/// Text fields map to a list holding one str; numeric fields map to numpy
/// arrays with a leading dimension of one.
///
/// Parameters
/// ----------
/// name : str
///     Catalog identifier, ``name[/config][:version]``.
/// split : str, optional
///     Split selection such as ``"train"`` or ``"test[:10%]"``.
/// shuffle_files : bool, optional
///     Read shard files in shuffled order. Defaults to True.
/// data_dir : str, optional
///     Root of the prepared datasets. Defaults to ``$TFDS_DATA_DIR`` or
///     ``./tensorflow_datasets``.
/// config : str, optional
///     Path to a TOML configuration file.
/// prefetch : str, int or bool, optional
///     ``"autotune"`` (default), ``"disabled"`` or a buffer size.
/// epoch_size : int, optional
///     Maximum records per pass; the next pass resumes where this one stopped.
/// take : int, optional
///     Total number of records to draw from the split.
/// seed : int, optional
///     Seed for file shuffling.
///
/// Examples
/// --------
/// >>> ds = TextIterDataset("imdb_reviews", split="test[:5]")
/// >>> for record in ds:
/// ...     print(record["text"][0], record["label"])
#[pyclass(name = "TextIterDataset", module = "textds._textds_core", subclass)]
pub struct PyTextIterDataset {
    inner: TextIterDataset,
    yielded: usize,
}

#[pymethods]
impl PyTextIterDataset {
    #[new]
    #[pyo3(signature = (
        name,
        split = "train",
        shuffle_files = true,
        data_dir = None,
        config = None,
        prefetch = None,
        epoch_size = None,
        take = None,
        seed = None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        py: Python<'_>,
        name: &str,
        split: &str,
        shuffle_files: bool,
        data_dir: Option<PathBuf>,
        config: Option<PathBuf>,
        prefetch: Option<PyPrefetchOption>,
        epoch_size: Option<usize>,
        take: Option<usize>,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let args = LoadArgs {
            data_dir,
            config,
            prefetch,
            epoch_size,
            take,
            seed,
        };
        let source = SourceConfig::new(name)
            .with_split(split)
            .with_shuffle_files(shuffle_files);

        let inner = py
            .allow_threads(|| -> Result<TextIterDataset, TextDsError> {
                let config = args.config()?;
                let provider = TfdsProvider::from_config(&config);
                TextIterDataset::new(&provider, &source, &config.loader)
            })
            .map_err(WrappedError)?;
        Ok(Self { inner, yielded: 0 })
    }

    /// Starts a pass. Passes share one cursor.
    fn __iter__(mut slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        slf.yielded = 0;
        slf
    }

    fn __next__(&mut self, py: Python<'_>) -> PyResult<Option<PyObject>> {
        if self.inner.epoch_size().is_some_and(|limit| self.yielded >= limit) {
            return Ok(None);
        }
        let inner = &mut self.inner;
        let record = py
            .allow_threads(|| inner.next_record())
            .map_err(WrappedError)?;

        match record {
            Some(record) => {
                self.yielded += 1;
                Ok(Some(record_to_py(py, record)?))
            }
            None => Ok(None),
        }
    }

    /// Restart from the first record of the split.
    fn reset(&mut self, py: Python<'_>) -> PyResult<()> {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.reset()).map_err(WrappedError)?;
        self.yielded = 0;
        Ok(())
    }

    /// Declared features as ``(name, dtype, kind)`` tuples.
    #[getter]
    fn features(&self) -> Vec<(String, String, String)> {
        self.inner
            .schema()
            .features()
            .iter()
            .map(|f| (f.name.clone(), f.dtype.to_string(), f.kind().to_string()))
            .collect()
    }

    #[getter]
    fn name(&self) -> String {
        self.inner.name().to_string()
    }

    /// Records read since construction or the last reset.
    #[getter]
    fn records_read(&self) -> u64 {
        self.inner.records_read()
    }

    fn __repr__(&self) -> String {
        format!("TextIterDataset({})", self.inner.summary())
    }
}

/// An iterable of ``(text, label)`` tuples for supervised classification.
///
/// Takes the same arguments as ``TextIterDataset`` plus the two field names.
/// A field name missing from the dataset raises ``KeyError`` on the first
/// step, not at construction.
///
/// Examples
/// --------
/// >>> ds = TextClassificationDataset(
/// ...     "wikipedia_toxicity_subtypes",
/// ...     supervised_text="text",
/// ...     supervised_label="toxicity",
/// ... )
/// >>> text, label = next(iter(ds))
#[pyclass(name = "TextClassificationDataset", module = "textds._textds_core", subclass)]
pub struct PyTextClassificationDataset {
    inner: TextClassificationDataset,
    yielded: usize,
}

#[pymethods]
impl PyTextClassificationDataset {
    #[new]
    #[pyo3(signature = (
        name,
        split = "train",
        shuffle_files = true,
        supervised_text = "text",
        supervised_label = "toxicity",
        data_dir = None,
        config = None,
        prefetch = None,
        epoch_size = None,
        take = None,
        seed = None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        py: Python<'_>,
        name: &str,
        split: &str,
        shuffle_files: bool,
        supervised_text: &str,
        supervised_label: &str,
        data_dir: Option<PathBuf>,
        config: Option<PathBuf>,
        prefetch: Option<PyPrefetchOption>,
        epoch_size: Option<usize>,
        take: Option<usize>,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let args = LoadArgs {
            data_dir,
            config,
            prefetch,
            epoch_size,
            take,
            seed,
        };
        let source = SourceConfig::new(name)
            .with_split(split)
            .with_shuffle_files(shuffle_files);
        let fields = ClassificationFields::new(supervised_text, supervised_label);

        let inner = py
            .allow_threads(|| -> Result<TextClassificationDataset, TextDsError> {
                let config = args.config()?;
                let provider = TfdsProvider::from_config(&config);
                TextClassificationDataset::new(&provider, &source, &config.loader, fields)
            })
            .map_err(WrappedError)?;
        Ok(Self { inner, yielded: 0 })
    }

    fn __iter__(mut slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        slf.yielded = 0;
        slf
    }

    fn __next__(&mut self, py: Python<'_>) -> PyResult<Option<PyObject>> {
        if self
            .inner
            .base()
            .epoch_size()
            .is_some_and(|limit| self.yielded >= limit)
        {
            return Ok(None);
        }
        let inner = &mut self.inner;
        let pair = py
            .allow_threads(|| inner.next_pair())
            .map_err(WrappedError)?;

        match pair {
            Some((text, label)) => {
                self.yielded += 1;
                Ok(Some(pair_to_py(py, text, label)))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self, py: Python<'_>) -> PyResult<()> {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.reset()).map_err(WrappedError)?;
        self.yielded = 0;
        Ok(())
    }

    /// The ``(text, label)`` field names.
    #[getter]
    fn fields(&self) -> (String, String) {
        let fields = self.inner.fields();
        (fields.text.clone(), fields.label.clone())
    }

    fn __repr__(&self) -> String {
        let fields = self.inner.fields();
        format!(
            "TextClassificationDataset({}, text='{}', label='{}')",
            self.inner.base().summary(),
            fields.text,
            fields.label
        )
    }
}
