// rust/textds-core/src/dataset/mod.rs

//! Iterable adapters over provider streams.
//!
//! [`TextIterDataset`] turns each unit batch into a [`Record`] of decoded
//! text and owned numeric arrays. [`TextClassificationDataset`] projects
//! those records onto `(text, label)` pairs.
//!
//! # Example
//!
//! ```no_run
//! use textds_core::catalog::TfdsProvider;
//! use textds_core::config::{ClassificationFields, SourceConfig, TextDsConfig};
//! use textds_core::dataset::TextClassificationDataset;
//!
//! # fn main() -> textds_core::Result<()> {
//! let config = TextDsConfig::default().with_env_overrides();
//! let provider = TfdsProvider::from_config(&config);
//! let source = SourceConfig::new("wikipedia_toxicity_subtypes").with_split("train[:1%]");
//!
//! let mut dataset = TextClassificationDataset::new(
//!     &provider,
//!     &source,
//!     &config.loader,
//!     ClassificationFields::new("text", "toxicity"),
//! )?;
//! for pair in &mut dataset {
//!     let (text, label) = pair?;
//!     println!("{label}\t{text}");
//! }
//! # Ok(())
//! # }
//! ```

mod classification;
mod record;
mod text;

pub use classification::{ClassificationPair, Pairs, TextClassificationDataset};
pub use record::{FieldValue, NumericArray, Record};
pub use text::{Records, TextIterDataset};
