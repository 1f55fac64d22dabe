// rust/textds-core/src/error.rs

use std::path::PathBuf;
use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextDsError {

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Dataset '{name}' not found in {data_dir}")]
    DatasetNotFound {
        name: String,
        data_dir: PathBuf,
    },

    #[error("Invalid split '{split}': {message} (available: {})", .available.join(", "))]
    Split {
        split: String,
        message: String,
        available: Vec<String>,
    },

    #[error("Schema error: {message}")]
    Schema {
        message: String,
    },

    #[error("Corrupt record in '{path}': {message}")]
    Record {
        path: PathBuf,
        message: String,
    },

    #[error("Field '{field}' is not valid UTF-8")]
    Decode {
        field: String,
        #[source]
        source: FromUtf8Error,
    },

    #[error("Field '{field}' not found in record (fields: {})", .available.join(", "))]
    MissingField {
        field: String,
        available: Vec<String>,
    },

    #[error("Field '{field}' has type {found}, expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation not supported: {operation}")]
    Unsupported {
        operation: String,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },

    #[error("Prefetch worker failed: {message}")]
    Prefetch {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, TextDsError>;

// Convenience constructors
impl TextDsError {

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn dataset_not_found(name: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self::DatasetNotFound {
            name: name.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn split(
        split: impl Into<String>,
        message: impl Into<String>,
        available: Vec<String>,
    ) -> Self {
        Self::Split {
            split: split.into(),
            message: message.into(),
            available,
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn record(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Record {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn decode(field: impl Into<String>, source: FromUtf8Error) -> Self {
        Self::Decode {
            field: field.into(),
            source,
        }
    }

    pub fn missing_field(field: impl Into<String>, available: Vec<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            available,
        }
    }

    pub fn field_type(
        field: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self::FieldType {
            field: field.into(),
            expected,
            found: found.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn prefetch(message: impl Into<String>) -> Self {
        Self::Prefetch {
            message: message.into(),
        }
    }

    /// Returns true if this error is a failed field lookup.
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingField { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message_lists_available() {
        let err = TextDsError::missing_field("label", vec!["text".into(), "toxicity".into()]);
        assert!(err.is_missing_field());
        assert_eq!(
            err.to_string(),
            "Field 'label' not found in record (fields: text, toxicity)"
        );
    }

    #[test]
    fn test_split_message() {
        let err = TextDsError::split("validation", "unknown split", vec!["train".into()]);
        assert_eq!(
            err.to_string(),
            "Invalid split 'validation': unknown split (available: train)"
        );
    }

    #[test]
    fn test_decode_keeps_source() {
        let bad = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        let err = TextDsError::decode("text", bad);
        assert!(std::error::Error::source(&err).is_some());
    }
}
