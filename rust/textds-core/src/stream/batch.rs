// rust/textds-core/src/stream/batch.rs

use std::collections::BTreeMap;

use super::RecordStream;
use crate::error::{Result, TextDsError};
use crate::tensor::{Tensor, TensorMap};

/// Groups consecutive items along a new leading axis.
///
/// The final batch may be smaller than `batch_size`; it is never dropped.
pub struct Batched<S> {
    inner: S,
    batch_size: usize,
}

impl<S: RecordStream> Batched<S> {
    /// Creates a batching stream. A batch size of zero is treated as one.
    pub fn new(inner: S, batch_size: usize) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: RecordStream> RecordStream for Batched<S> {
    fn next_batch(&mut self) -> Result<Option<TensorMap>> {
        let mut items = Vec::with_capacity(self.batch_size);
        while items.len() < self.batch_size {
            match self.inner.next_batch()? {
                Some(item) => items.push(item),
                None => break,
            }
        }

        if items.is_empty() {
            return Ok(None);
        }
        stack_items(items).map(Some)
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    fn describe(&self) -> String {
        format!("batch({}) of {}", self.batch_size, self.inner.describe())
    }
}

fn stack_items(items: Vec<TensorMap>) -> Result<TensorMap> {
    let mut columns: BTreeMap<String, Vec<Tensor>> = BTreeMap::new();
    let keys: Vec<String> = items[0].keys().cloned().collect();

    for (index, item) in items.into_iter().enumerate() {
        if item.len() != keys.len() || !item.keys().zip(&keys).all(|(a, b)| a == b) {
            return Err(TextDsError::schema(format!(
                "cannot batch item {}: fields {:?} differ from {:?}",
                index,
                item.keys().collect::<Vec<_>>(),
                keys
            )));
        }
        for (name, tensor) in item {
            columns.entry(name).or_default().push(tensor);
        }
    }

    columns
        .into_iter()
        .map(|(name, tensors)| {
            let stacked = Tensor::stack(&name, tensors)?;
            Ok((name, stacked))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::test_support::{ids, numbered};
    use crate::stream::{StreamExt, VecStream};
    use crate::tensor::TensorData;

    #[test]
    fn test_unit_batches_add_leading_axis() {
        let mut stream = VecStream::new(numbered(2)).batch(1);
        let batch = stream.next_batch().unwrap().unwrap();

        assert_eq!(batch["id"].shape(), &[1]);
        assert_eq!(batch["text"].shape(), &[1]);
        assert_eq!(
            batch["text"].data(),
            &TensorData::Bytes(vec![b"record 0".to_vec()])
        );
    }

    #[test]
    fn test_partial_final_batch() {
        let mut stream = VecStream::new(numbered(5)).batch(2);
        assert_eq!(ids(&stream.next_batch().unwrap().unwrap()), vec![0, 1]);
        assert_eq!(ids(&stream.next_batch().unwrap().unwrap()), vec![2, 3]);
        assert_eq!(ids(&stream.next_batch().unwrap().unwrap()), vec![4]);
        assert!(stream.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_zero_batch_size_means_one() {
        let stream = VecStream::new(numbered(1)).batch(0);
        assert_eq!(stream.batch_size(), 1);
    }

    #[test]
    fn test_mismatched_fields_rejected() {
        let mut items = numbered(2);
        items[1].remove("text");
        let mut stream = VecStream::new(items).batch(2);
        assert!(matches!(
            stream.next_batch(),
            Err(TextDsError::Schema { .. })
        ));
    }

    #[test]
    fn test_reset_passes_through() {
        let mut stream = VecStream::new(numbered(3)).batch(2);
        stream.next_batch().unwrap();
        stream.reset().unwrap();
        assert_eq!(ids(&stream.next_batch().unwrap().unwrap()), vec![0, 1]);
        assert_eq!(stream.describe(), "batch(2) of in-memory stream of 3 items");
    }
}
