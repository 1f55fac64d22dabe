// rust/textds-core/src/config.rs

//! Configuration management for textds.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values. Dataset
//! selection is never defaulted here: callers describe the source they want
//! with a [`SourceConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, TextDsError};
use crate::stream::PrefetchPolicy;

// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDsConfig {
    pub storage: StorageConfig,
    pub loader: LoaderConfig,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Root directory holding prepared datasets (`<data_dir>/<name>/<version>`).
    pub data_dir: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// Options controlling how records are pulled from a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Prefetch policy: "autotune", "disabled", or a buffer size.
    pub prefetch: PrefetchPolicy,
    /// Maximum number of records per iteration pass. Later passes resume
    /// where the previous one stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch_size: Option<usize>,
    /// Total number of records to draw from the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<usize>,
    /// Seed for reproducible file shuffling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Whether to verify TFRecord CRC32C checksums.
    pub verify_checksums: bool,
}

/// Describes which dataset to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Catalog identifier, `name[/config][:version]`.
    pub name: String,
    /// Split selection, e.g. "train", "test[:10%]" or "train+test".
    #[serde(default = "default_split")]
    pub split: String,
    /// Whether shard files are read in shuffled order.
    #[serde(default = "default_shuffle_files")]
    pub shuffle_files: bool,
}

/// Field tags projected by the classification dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationFields {
    /// Field holding the input text.
    pub text: String,
    /// Field holding the label.
    pub label: String,
}

fn default_split() -> String {
    "train".to_string()
}

fn default_shuffle_files() -> bool {
    true
}

impl SourceConfig {
    /// Creates a source reading the "train" split with shuffled files.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            split: default_split(),
            shuffle_files: default_shuffle_files(),
        }
    }

    #[must_use]
    pub fn with_split(mut self, split: impl Into<String>) -> Self {
        self.split = split.into();
        self
    }

    #[must_use]
    pub fn with_shuffle_files(mut self, shuffle_files: bool) -> Self {
        self.shuffle_files = shuffle_files;
        self
    }

    /// Validate the source description.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TextDsError::config("source.name must not be empty"));
        }
        if self.split.trim().is_empty() {
            return Err(TextDsError::config("source.split must not be empty"));
        }
        Ok(())
    }
}

impl ClassificationFields {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

impl Default for ClassificationFields {
    fn default() -> Self {
        Self::new("text", "toxicity")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tensorflow_datasets"),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            prefetch: PrefetchPolicy::Autotune,
            epoch_size: None,
            take: None,
            seed: None,
            verify_checksums: true,
        }
    }
}

impl FromStr for TextDsConfig {
    type Err = TextDsError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| TextDsError::config_with_source("failed to parse TOML config", e))
    }
}

impl TextDsConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TextDsError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `TEXTDS_` and use underscores
    // to separate nested fields. For example:
    // - `TEXTDS_STORAGE_DATA_DIR` overrides `storage.data_dir`
    // - `TEXTDS_LOADER_PREFETCH` overrides `loader.prefetch`
    // - `TEXTDS_LOADER_SEED` overrides `loader.seed`
    //
    // `TFDS_DATA_DIR` is honoured as well; `TEXTDS_STORAGE_DATA_DIR` wins
    // when both are set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("TFDS_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TEXTDS_STORAGE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TEXTDS_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("TEXTDS_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("TEXTDS_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        // Loader overrides
        if let Ok(val) = std::env::var("TEXTDS_LOADER_PREFETCH") {
            match val.parse() {
                Ok(policy) => self.loader.prefetch = policy,
                Err(_) => tracing::warn!("ignoring invalid TEXTDS_LOADER_PREFETCH value '{}'", val),
            }
        }
        if let Ok(val) = std::env::var("TEXTDS_LOADER_EPOCH_SIZE") {
            if let Ok(v) = val.parse() {
                self.loader.epoch_size = Some(v);
            }
        }
        if let Ok(val) = std::env::var("TEXTDS_LOADER_TAKE") {
            if let Ok(v) = val.parse() {
                self.loader.take = Some(v);
            }
        }
        if let Ok(val) = std::env::var("TEXTDS_LOADER_SEED") {
            if let Ok(v) = val.parse() {
                self.loader.seed = Some(v);
            }
        }
        if let Ok(val) = std::env::var("TEXTDS_LOADER_VERIFY_CHECKSUMS") {
            if let Ok(v) = val.parse() {
                self.loader.verify_checksums = v;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.buffer_size == 0 {
            return Err(TextDsError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(TextDsError::config("storage.data_dir must not be empty"));
        }
        self.loader.validate()
    }
}

impl LoaderConfig {
    /// Validate loader options.
    pub fn validate(&self) -> Result<()> {
        if self.epoch_size == Some(0) {
            return Err(TextDsError::config(
                "loader.epoch_size must be greater than 0",
            ));
        }
        if self.prefetch == PrefetchPolicy::Fixed(0) {
            return Err(TextDsError::config(
                "loader.prefetch buffer must be greater than 0 (use \"disabled\")",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = TextDsConfig::default();

        assert_eq!(config.storage.data_dir, PathBuf::from("./tensorflow_datasets"));
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert!(config.storage.use_mmap);

        assert_eq!(config.loader.prefetch, PrefetchPolicy::Autotune);
        assert!(config.loader.epoch_size.is_none());
        assert!(config.loader.take.is_none());
        assert!(config.loader.seed.is_none());
        assert!(config.loader.verify_checksums);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_empty() {
        let config: TextDsConfig = "".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [storage]
            data_dir = "/data/tfds"
            buffer_size = 131072
            use_mmap = false
            mmap_threshold = 2097152

            [loader]
            prefetch = 8
            epoch_size = 4096
            take = 100000
            seed = 42
            verify_checksums = false
        "#;

        let config: TextDsConfig = toml.parse().unwrap();

        assert_eq!(config.storage.data_dir, PathBuf::from("/data/tfds"));
        assert_eq!(config.storage.buffer_size, 131072);
        assert!(!config.storage.use_mmap);
        assert_eq!(config.storage.mmap_threshold, 2097152);

        assert_eq!(config.loader.prefetch, PrefetchPolicy::Fixed(8));
        assert_eq!(config.loader.epoch_size, Some(4096));
        assert_eq!(config.loader.take, Some(100000));
        assert_eq!(config.loader.seed, Some(42));
        assert!(!config.loader.verify_checksums);
    }

    #[test]
    fn test_prefetch_named_policies() {
        let config: TextDsConfig = "[loader]\nprefetch = \"disabled\"".parse().unwrap();
        assert_eq!(config.loader.prefetch, PrefetchPolicy::Disabled);

        let config: TextDsConfig = "[loader]\nprefetch = \"autotune\"".parse().unwrap();
        assert_eq!(config.loader.prefetch, PrefetchPolicy::Autotune);

        let result: Result<TextDsConfig> = "[loader]\nprefetch = \"sometimes\"".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<TextDsConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [storage]
            data_dir = "/tmp/tfds"
            "#
        )
        .unwrap();

        let config = TextDsConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/tfds"));
    }

    #[test]
    fn test_from_file_not_found() {
        let result = TextDsConfig::from_file("/nonexistent/textds.toml");
        assert!(matches!(result, Err(TextDsError::Storage { .. })));
    }

    #[test]
    fn test_validate_invalid_buffer_size() {
        let mut config = TextDsConfig::default();
        config.storage.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_epoch_size() {
        let mut config = TextDsConfig::default();
        config.loader.epoch_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_prefetch_buffer() {
        let mut config = TextDsConfig::default();
        config.loader.prefetch = PrefetchPolicy::Fixed(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("TEXTDS_STORAGE_DATA_DIR", "/mnt/datasets");
        std::env::set_var("TEXTDS_LOADER_PREFETCH", "disabled");
        std::env::set_var("TEXTDS_LOADER_SEED", "9");
        std::env::set_var("TEXTDS_LOADER_EPOCH_SIZE", "many");

        let config = TextDsConfig::default().with_env_overrides();

        std::env::remove_var("TEXTDS_STORAGE_DATA_DIR");
        std::env::remove_var("TEXTDS_LOADER_PREFETCH");
        std::env::remove_var("TEXTDS_LOADER_SEED");
        std::env::remove_var("TEXTDS_LOADER_EPOCH_SIZE");

        assert_eq!(config.storage.data_dir, PathBuf::from("/mnt/datasets"));
        assert_eq!(config.loader.prefetch, PrefetchPolicy::Disabled);
        assert_eq!(config.loader.seed, Some(9));
        // Unparseable values leave the field untouched
        assert!(config.loader.epoch_size.is_none());
    }

    #[test]
    fn test_source_config_builder() {
        let source = SourceConfig::new("wikipedia/20190301.en")
            .with_split("train[:1%]")
            .with_shuffle_files(false);
        assert_eq!(source.name, "wikipedia/20190301.en");
        assert_eq!(source.split, "train[:1%]");
        assert!(!source.shuffle_files);
        assert!(source.validate().is_ok());

        assert!(SourceConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_source_config_from_toml_defaults() {
        let source: SourceConfig = toml::from_str("name = \"imdb_reviews\"").unwrap();
        assert_eq!(source.split, "train");
        assert!(source.shuffle_files);
    }

    #[test]
    fn test_classification_fields_default() {
        let fields = ClassificationFields::default();
        assert_eq!(fields.text, "text");
        assert_eq!(fields.label, "toxicity");
    }

    // Helper to clear all TEXTDS_ environment variables for test isolation
    fn clear_textds_env_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("TEXTDS_") || key == "TFDS_DATA_DIR" {
                std::env::remove_var(&key);
            }
        }
    }

    // Environment variable tests are combined into a single test to avoid
    // race conditions when tests run in parallel, since env vars are global state.
    #[test]
    fn test_env_overrides_combined() {
        clear_textds_env_vars();

        std::env::set_var("TFDS_DATA_DIR", "/tfds/path");
        std::env::set_var("TEXTDS_LOADER_PREFETCH", "disabled");
        std::env::set_var("TEXTDS_LOADER_SEED", "12345");
        std::env::set_var("TEXTDS_LOADER_EPOCH_SIZE", "32768");

        let config = TextDsConfig::default().with_env_overrides();

        assert_eq!(config.storage.data_dir, PathBuf::from("/tfds/path"));
        assert_eq!(config.loader.prefetch, PrefetchPolicy::Disabled);
        assert_eq!(config.loader.seed, Some(12345));
        assert_eq!(config.loader.epoch_size, Some(32768));

        // The textds-specific variable wins over TFDS_DATA_DIR
        std::env::set_var("TEXTDS_STORAGE_DATA_DIR", "/textds/path");
        let config = TextDsConfig::default().with_env_overrides();
        assert_eq!(config.storage.data_dir, PathBuf::from("/textds/path"));

        clear_textds_env_vars();

        // Invalid values should be ignored (keep defaults)
        std::env::set_var("TEXTDS_STORAGE_BUFFER_SIZE", "not_a_number");
        std::env::set_var("TEXTDS_LOADER_PREFETCH", "sometimes");

        let config = TextDsConfig::default().with_env_overrides();
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert_eq!(config.loader.prefetch, PrefetchPolicy::Autotune);

        clear_textds_env_vars();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut original = TextDsConfig::default();
        original.loader.prefetch = PrefetchPolicy::Fixed(3);
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: TextDsConfig = toml_str.parse().unwrap();

        assert_eq!(original.storage.data_dir, parsed.storage.data_dir);
        assert_eq!(parsed.loader.prefetch, PrefetchPolicy::Fixed(3));
        assert_eq!(original.loader.verify_checksums, parsed.loader.verify_checksums);
    }
}
