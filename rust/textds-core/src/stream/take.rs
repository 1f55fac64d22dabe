// rust/textds-core/src/stream/take.rs

use super::RecordStream;
use crate::error::Result;
use crate::tensor::TensorMap;

/// Ends after a fixed number of items.
pub struct Take<S> {
    inner: S,
    count: usize,
    remaining: usize,
}

impl<S: RecordStream> Take<S> {
    pub fn new(inner: S, count: usize) -> Self {
        Self {
            inner,
            count,
            remaining: count,
        }
    }

    /// Items still allowed through.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<S: RecordStream> RecordStream for Take<S> {
    fn next_batch(&mut self) -> Result<Option<TensorMap>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let item = self.inner.next_batch()?;
        if item.is_some() {
            self.remaining -= 1;
        }
        Ok(item)
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()?;
        self.remaining = self.count;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("take({}) of {}", self.count, self.inner.describe())
    }
}
