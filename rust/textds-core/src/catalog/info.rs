// rust/textds-core/src/catalog/info.rs

//! `dataset_info.json` and `features.json` metadata.
//!
//! Both files are protobuf messages rendered as JSON, so field names are
//! camelCase and 64-bit integers may appear either as numbers or as
//! strings.

use std::collections::BTreeMap;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

use crate::error::{Result, TextDsError};
use crate::schema::{Dim, FeatureSpec, Schema};
use crate::tensor::DType;

/// Contents of `dataset_info.json`. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Record container format; absent in older datasets, which are TFRecord.
    #[serde(default = "default_file_format")]
    pub file_format: String,
    #[serde(default)]
    pub splits: Vec<SplitInfo>,
}

fn default_file_format() -> String {
    "tfrecord".to_string()
}

/// One split of a prepared dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitInfo {
    pub name: String,
    /// Examples per shard, in shard order.
    #[serde(
        default,
        deserialize_with = "de_u64_vec",
        serialize_with = "ser_u64_vec"
    )]
    pub shard_lengths: Vec<u64>,
    #[serde(default, deserialize_with = "de_u64", serialize_with = "ser_u64")]
    pub num_bytes: u64,
}

impl SplitInfo {
    pub fn num_examples(&self) -> u64 {
        self.shard_lengths.iter().sum()
    }

    pub fn num_shards(&self) -> usize {
        self.shard_lengths.len()
    }
}

impl DatasetInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_name: None,
            version: version.into(),
            description: String::new(),
            file_format: default_file_format(),
            splits: Vec::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| TextDsError::serialization(format!("invalid dataset_info.json: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TextDsError::serialization(format!("cannot render dataset_info.json: {e}")))
    }

    pub fn split(&self, name: &str) -> Option<&SplitInfo> {
        self.splits.iter().find(|s| s.name == name)
    }

    pub fn split_names(&self) -> Vec<String> {
        self.splits.iter().map(|s| s.name.clone()).collect()
    }

    /// Split name to example count.
    pub fn split_sizes(&self) -> BTreeMap<String, u64> {
        self.splits
            .iter()
            .map(|s| (s.name.clone(), s.num_examples()))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonInt {
    Number(i64),
    Text(String),
}

impl JsonInt {
    fn value<E: de::Error>(self) -> std::result::Result<i64, E> {
        match self {
            JsonInt::Number(n) => Ok(n),
            JsonInt::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid integer '{s}'"))),
        }
    }

    fn unsigned<E: de::Error>(self) -> std::result::Result<u64, E> {
        let value = self.value::<E>()?;
        u64::try_from(value).map_err(|_| E::custom(format!("negative count {value}")))
    }
}

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    JsonInt::deserialize(deserializer)?.unsigned()
}

fn de_u64_vec<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error> {
    Vec::<JsonInt>::deserialize(deserializer)?
        .into_iter()
        .map(JsonInt::unsigned)
        .collect()
}

fn ser_u64<S: Serializer>(value: &u64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

fn ser_u64_vec<S: Serializer>(values: &[u64], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(u64::to_string))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeaturesFile {
    features_dict: FeaturesDictRepr,
}

#[derive(Deserialize)]
struct FeaturesDictRepr {
    #[serde(default)]
    features: BTreeMap<String, FeatureRepr>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureRepr {
    #[serde(default)]
    python_class_name: String,
    text: Option<serde_json::Value>,
    class_label: Option<serde_json::Value>,
    tensor: Option<TensorRepr>,
}

#[derive(Deserialize)]
struct TensorRepr {
    #[serde(default)]
    shape: ShapeRepr,
    dtype: String,
}

#[derive(Default, Deserialize)]
struct ShapeRepr {
    #[serde(default)]
    dimensions: Vec<JsonInt>,
}

/// Parses a `features.json` document into a schema.
///
/// Supported feature types are `Text` (scalar byte string), `ClassLabel`
/// (scalar int64) and `Tensor`. Anything else, including nested
/// dictionaries, is a schema error.
pub fn parse_features(text: &str) -> Result<Schema> {
    let file: FeaturesFile = serde_json::from_str(text)
        .map_err(|e| TextDsError::serialization(format!("invalid features.json: {e}")))?;

    let features = file
        .features_dict
        .features
        .into_iter()
        .map(|(name, repr)| {
            if repr.text.is_some() {
                Ok(FeatureSpec::text(name))
            } else if repr.class_label.is_some() {
                Ok(FeatureSpec::scalar(name, DType::Int64))
            } else if let Some(tensor) = repr.tensor {
                let dtype: DType = tensor.dtype.parse()?;
                let shape = tensor
                    .shape
                    .dimensions
                    .into_iter()
                    .map(|d| match d.value::<serde_json::Error>() {
                        Ok(n) if n < 0 => Ok(Dim::Unknown),
                        Ok(n) => Ok(Dim::Fixed(n as usize)),
                        Err(e) => Err(TextDsError::schema(format!("feature '{name}': {e}"))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(FeatureSpec::new(name, dtype, shape))
            } else {
                Err(TextDsError::schema(format!(
                    "feature '{}' has unsupported type '{}'",
                    name, repr.python_class_name
                )))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Schema::new(features))
}

/// Renders a schema as a `features.json` document.
///
/// Scalar strings become `Text` features; everything else is a `Tensor`.
pub fn render_features(schema: &Schema) -> Result<String> {
    let features: serde_json::Map<String, serde_json::Value> = schema
        .features()
        .iter()
        .map(|spec| {
            let value = if spec.dtype == DType::String && spec.shape.is_empty() {
                json!({
                    "pythonClassName": "tensorflow_datasets.core.features.text_feature.Text",
                    "text": {},
                })
            } else {
                let dimensions: Vec<String> = spec
                    .shape
                    .iter()
                    .map(|d| match d {
                        Dim::Fixed(n) => n.to_string(),
                        Dim::Unknown => "-1".to_string(),
                    })
                    .collect();
                json!({
                    "pythonClassName": "tensorflow_datasets.core.features.tensor_feature.Tensor",
                    "tensor": {
                        "shape": { "dimensions": dimensions },
                        "dtype": spec.dtype.name(),
                        "encoding": "none",
                    },
                })
            };
            (spec.name.clone(), value)
        })
        .collect();

    let document = json!({
        "pythonClassName": "tensorflow_datasets.core.features.features_dict.FeaturesDict",
        "featuresDict": { "features": features },
    });
    serde_json::to_string_pretty(&document)
        .map_err(|e| TextDsError::serialization(format!("cannot render features.json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    const TOXICITY_INFO: &str = r#"{
        "citation": "@inproceedings{...}",
        "description": "Wikipedia talk page comments.",
        "fileFormat": "tfrecord",
        "name": "wikipedia_toxicity_subtypes",
        "splits": [
            {
                "filepathTemplate": "{DATASET}-{SPLIT}.{FILEFORMAT}-{SHARD_X_OF_Y}",
                "name": "train",
                "numBytes": "54396288",
                "shardLengths": ["79643", "79643"]
            },
            { "name": "test", "numBytes": 16000000, "shardLengths": [63978] }
        ],
        "version": "0.3.1"
    }"#;

    const TOXICITY_FEATURES: &str = r#"{
        "featuresDict": {
            "features": {
                "id": {
                    "pythonClassName": "tensorflow_datasets.core.features.text_feature.Text",
                    "text": {}
                },
                "language": {
                    "pythonClassName": "tensorflow_datasets.core.features.class_label_feature.ClassLabel",
                    "classLabel": { "numClasses": "3" }
                },
                "text": {
                    "pythonClassName": "tensorflow_datasets.core.features.text_feature.Text",
                    "text": {}
                },
                "toxicity": {
                    "pythonClassName": "tensorflow_datasets.core.features.tensor_feature.Tensor",
                    "tensor": { "shape": {}, "dtype": "float32", "encoding": "none" }
                },
                "embedding": {
                    "pythonClassName": "tensorflow_datasets.core.features.tensor_feature.Tensor",
                    "tensor": { "shape": { "dimensions": ["-1", "4"] }, "dtype": "float32" }
                }
            }
        },
        "pythonClassName": "tensorflow_datasets.core.features.features_dict.FeaturesDict"
    }"#;

    #[test]
    fn test_parse_dataset_info() {
        let info = DatasetInfo::from_json(TOXICITY_INFO).unwrap();
        assert_eq!(info.name, "wikipedia_toxicity_subtypes");
        assert_eq!(info.version, "0.3.1");
        assert_eq!(info.file_format, "tfrecord");
        assert_eq!(info.split_names(), vec!["train", "test"]);

        let train = info.split("train").unwrap();
        assert_eq!(train.num_examples(), 159286);
        assert_eq!(train.num_shards(), 2);
        assert_eq!(train.num_bytes, 54396288);
        assert_eq!(info.split_sizes()["test"], 63978);
    }

    #[test]
    fn test_missing_file_format_defaults_to_tfrecord() {
        let info = DatasetInfo::from_json(r#"{"name": "old", "version": "1.0.0"}"#).unwrap();
        assert_eq!(info.file_format, "tfrecord");
        assert!(info.splits.is_empty());
    }

    #[test]
    fn test_info_rejects_bad_counts() {
        let text = r#"{"name": "x", "splits": [{"name": "train", "shardLengths": ["ten"]}]}"#;
        assert!(matches!(
            DatasetInfo::from_json(text),
            Err(TextDsError::Serialization { .. })
        ));
    }

    #[test]
    fn test_info_json_round_trip() {
        let mut info = DatasetInfo::new("synthetic", "1.0.0");
        info.splits.push(SplitInfo {
            name: "train".into(),
            shard_lengths: vec![3, 2],
            num_bytes: 512,
        });
        let text = info.to_json().unwrap();
        assert!(text.contains("\"shardLengths\""));
        assert!(text.contains("\"512\""));
        assert_eq!(DatasetInfo::from_json(&text).unwrap(), info);
    }

    #[test]
    fn test_parse_features() {
        let schema = parse_features(TOXICITY_FEATURES).unwrap();
        assert_eq!(
            schema.names(),
            vec!["embedding", "id", "language", "text", "toxicity"]
        );
        assert_eq!(schema.get("text").unwrap().kind(), FieldKind::Text);
        assert_eq!(schema.get("language").unwrap().dtype, DType::Int64);
        assert_eq!(
            schema.get("toxicity").unwrap().kind(),
            FieldKind::Numeric(DType::Float32)
        );
        assert_eq!(
            schema.get("embedding").unwrap().shape,
            vec![Dim::Unknown, Dim::Fixed(4)]
        );
    }

    #[test]
    fn test_unsupported_feature_type() {
        let text = r#"{"featuresDict": {"features": {"image": {
            "pythonClassName": "tensorflow_datasets.core.features.image_feature.Image",
            "image": {"shape": {"dimensions": ["-1", "-1", "3"]}}
        }}}}"#;
        let err = parse_features(text).unwrap_err();
        assert!(err.to_string().contains("image_feature.Image"));
    }

    #[test]
    fn test_render_features_is_parseable() {
        let schema = Schema::new(vec![
            FeatureSpec::text("text"),
            FeatureSpec::scalar("toxicity", DType::Float32),
            FeatureSpec::new("tokens", DType::Int64, vec![Dim::Unknown]),
        ]);
        let rendered = render_features(&schema).unwrap();
        assert_eq!(parse_features(&rendered).unwrap(), schema);
    }
}
