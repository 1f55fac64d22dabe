// rust/textds-core/src/stream/mod.rs

//! Pull-based record streams and their combinators.
//!
//! A provider hands out a [`RecordStream`] of single examples; the adapters
//! shape it the way a `tf.data` pipeline would:
//!
//! ```ignore
//! use textds_core::stream::{PrefetchPolicy, StreamExt};
//!
//! let stream = loaded.stream.take(10_000).batch(1).prefetch(PrefetchPolicy::Autotune);
//! ```

mod batch;
mod prefetch;
mod take;

pub use batch::Batched;
pub use prefetch::{Prefetch, PrefetchPolicy};
pub use take::Take;

use crate::error::{Result, TextDsError};
use crate::tensor::TensorMap;

/// A source of examples or batches.
///
/// `next_batch` blocks until an item is available. `Ok(None)` marks the end
/// of the stream; calling it again keeps returning `Ok(None)` unless the
/// stream is reset.
pub trait RecordStream: Send {
    /// Pulls the next item.
    fn next_batch(&mut self) -> Result<Option<TensorMap>>;

    /// Rewinds the stream to its first item.
    ///
    /// Streams that cannot restart keep this default.
    fn reset(&mut self) -> Result<()> {
        Err(TextDsError::unsupported(format!("reset of {}", self.describe())))
    }

    /// Short description used in logs and errors.
    fn describe(&self) -> String {
        "record stream".to_string()
    }
}

/// An owned, type-erased stream.
pub type BoxStream = Box<dyn RecordStream>;

impl<S: RecordStream + ?Sized> RecordStream for Box<S> {
    fn next_batch(&mut self) -> Result<Option<TensorMap>> {
        (**self).next_batch()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Pipeline combinators available on every stream.
pub trait StreamExt: RecordStream + Sized {
    /// Groups `batch_size` consecutive items along a new leading axis.
    fn batch(self, batch_size: usize) -> Batched<Self> {
        Batched::new(self, batch_size)
    }

    /// Ends the stream after `count` items.
    fn take(self, count: usize) -> Take<Self> {
        Take::new(self, count)
    }

    /// Pulls ahead on a background thread.
    fn prefetch(self, policy: PrefetchPolicy) -> Prefetch<Self>
    where
        Self: 'static,
    {
        Prefetch::new(self, policy)
    }

    /// Erases the stream type.
    fn boxed(self) -> BoxStream
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<S: RecordStream> StreamExt for S {}

/// A restartable stream over examples held in memory.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct VecStream {
    items: Vec<TensorMap>,
    position: usize,
}

#[cfg(test)]
impl VecStream {
    pub fn new(items: Vec<TensorMap>) -> Self {
        Self { items, position: 0 }
    }

    /// Items not yet pulled.
    pub fn remaining(&self) -> usize {
        self.items.len() - self.position
    }
}

#[cfg(test)]
impl RecordStream for VecStream {
    fn next_batch(&mut self) -> Result<Option<TensorMap>> {
        let item = self.items.get(self.position).cloned();
        if item.is_some() {
            self.position += 1;
        }
        Ok(item)
    }

    fn reset(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("in-memory stream of {} items", self.items.len())
    }
}
