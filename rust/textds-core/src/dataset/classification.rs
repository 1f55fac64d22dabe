// rust/textds-core/src/dataset/classification.rs

use super::record::{FieldValue, Record};
use super::text::{Records, TextIterDataset};
use crate::catalog::DatasetProvider;
use crate::config::{ClassificationFields, LoaderConfig, SourceConfig};
use crate::error::{Result, TextDsError};

/// A `(text, label)` pair for supervised classification.
pub type ClassificationPair = (String, FieldValue);

/// Projects each record of a [`TextIterDataset`] onto `(text, label)`.
///
/// The text is the first decoded string of the text field. The label is
/// passed through as converted. Field names are not checked against the
/// schema: a missing field fails the first step, not construction.
pub struct TextClassificationDataset {
    base: TextIterDataset,
    fields: ClassificationFields,
}

impl TextClassificationDataset {
    pub fn new(
        provider: &dyn DatasetProvider,
        source: &SourceConfig,
        loader: &LoaderConfig,
        fields: ClassificationFields,
    ) -> Result<Self> {
        let base = TextIterDataset::new(provider, source, loader)?;
        Ok(Self::from_base(base, fields))
    }

    pub fn from_base(base: TextIterDataset, fields: ClassificationFields) -> Self {
        Self { base, fields }
    }

    pub fn fields(&self) -> &ClassificationFields {
        &self.fields
    }

    pub fn base(&self) -> &TextIterDataset {
        &self.base
    }

    pub fn into_base(self) -> TextIterDataset {
        self.base
    }

    pub fn next_pair(&mut self) -> Result<Option<ClassificationPair>> {
        match self.base.next_record()? {
            Some(record) => project(record, &self.fields).map(Some),
            None => Ok(None),
        }
    }

    pub fn iter(&mut self) -> Pairs<'_> {
        Pairs {
            records: self.base.iter(),
            fields: &self.fields,
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        self.base.reset()
    }
}

impl<'a> IntoIterator for &'a mut TextClassificationDataset {
    type Item = Result<ClassificationPair>;
    type IntoIter = Pairs<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`TextClassificationDataset`].
pub struct Pairs<'a> {
    records: Records<'a>,
    fields: &'a ClassificationFields,
}

impl Iterator for Pairs<'_> {
    type Item = Result<ClassificationPair>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.and_then(|record| project(record, self.fields)))
    }
}

fn project(mut record: Record, fields: &ClassificationFields) -> Result<ClassificationPair> {
    record.field(&fields.text)?;
    record.field(&fields.label)?;

    let text_value = record.take(&fields.text)?;
    let label = if fields.label == fields.text {
        text_value.clone()
    } else {
        record.take(&fields.label)?
    };

    let text = match text_value {
        FieldValue::Text(values) => values.into_iter().next().ok_or_else(|| {
            TextDsError::field_type(&fields.text, "text with one element", "empty text")
        })?,
        numeric @ FieldValue::Numeric(_) => {
            return Err(TextDsError::field_type(&fields.text, "text", numeric.type_name()))
        }
    };
    Ok((text, label))
}
