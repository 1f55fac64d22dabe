// rust/textds-core/src/stream/prefetch.rs

//! Background prefetching for record streams.
//!
//! A [`Prefetch`] moves its upstream onto a worker thread that fills a
//! bounded channel while the consumer drains it. The worker is spawned on
//! the first pull, so building a pipeline never reads anything. When the
//! upstream ends or fails, the worker hands the stream back and exits; the
//! next pull spawns a fresh worker that resumes where the old one stopped.

use std::fmt;
use std::mem;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::RecordStream;
use crate::error::{Result, TextDsError};
use crate::tensor::TensorMap;

/// How far ahead a pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefetchPolicy {
    /// Buffer sized from the available parallelism, at least 2.
    #[default]
    Autotune,
    /// Buffer of a fixed number of items.
    Fixed(usize),
    /// Pull inline on the consumer's thread.
    Disabled,
}

impl PrefetchPolicy {
    /// Number of items buffered ahead of the consumer; 0 means inline.
    pub fn buffer_size(self) -> usize {
        match self {
            PrefetchPolicy::Autotune => thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
                .max(2),
            PrefetchPolicy::Fixed(n) => n,
            PrefetchPolicy::Disabled => 0,
        }
    }
}

impl fmt::Display for PrefetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefetchPolicy::Autotune => f.write_str("autotune"),
            PrefetchPolicy::Fixed(n) => write!(f, "{n}"),
            PrefetchPolicy::Disabled => f.write_str("disabled"),
        }
    }
}

impl FromStr for PrefetchPolicy {
    type Err = TextDsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "autotune" | "auto" => Ok(PrefetchPolicy::Autotune),
            "disabled" | "off" | "none" => Ok(PrefetchPolicy::Disabled),
            other => other.parse::<usize>().map(PrefetchPolicy::Fixed).map_err(|_| {
                TextDsError::config(format!(
                    "invalid prefetch policy '{other}' (expected \"autotune\", \"disabled\" or a buffer size)"
                ))
            }),
        }
    }
}

impl Serialize for PrefetchPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PrefetchPolicy::Fixed(n) => serializer.serialize_u64(*n as u64),
            named => serializer.serialize_str(&named.to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyRepr {
    Size(usize),
    Name(String),
}

impl<'de> Deserialize<'de> for PrefetchPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match PolicyRepr::deserialize(deserializer)? {
            PolicyRepr::Size(n) => Ok(PrefetchPolicy::Fixed(n)),
            PolicyRepr::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

type Message = Result<Option<TensorMap>>;

struct Worker<S> {
    rx: Receiver<Message>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<S>,
}

enum State<S> {
    Idle(S),
    Running(Worker<S>),
    /// The worker panicked and took the upstream with it.
    Poisoned,
}

/// A stream that reads ahead on a background thread.
pub struct Prefetch<S> {
    state: State<S>,
    buffer_size: usize,
    description: String,
}

impl<S: RecordStream + 'static> Prefetch<S> {
    pub fn new(inner: S, policy: PrefetchPolicy) -> Self {
        let buffer_size = policy.buffer_size();
        let description = format!("prefetch({}) of {}", policy, inner.describe());
        Self {
            state: State::Idle(inner),
            buffer_size,
            description,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns true while a worker thread is reading ahead.
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    fn spawn(&mut self) -> Result<()> {
        let inner = match mem::replace(&mut self.state, State::Poisoned) {
            State::Idle(inner) => inner,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        let (tx, rx) = channel::bounded(self.buffer_size);
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("textds-prefetch".to_string())
            .spawn(move || run_worker(inner, tx, worker_stop))
            .map_err(|e| TextDsError::prefetch(format!("failed to spawn worker: {e}")))?;

        tracing::debug!(
            "started prefetch worker for {} (buffer {})",
            self.description,
            self.buffer_size
        );
        self.state = State::Running(Worker { rx, stop, handle });
        Ok(())
    }

    /// Stops the worker, if any, and takes the upstream back.
    fn join(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, State::Poisoned) {
            State::Running(Worker { rx, stop, handle }) => {
                stop.store(true, Ordering::Release);
                // Unblocks a worker waiting on a full channel
                drop(rx);
                let inner = handle
                    .join()
                    .map_err(|_| TextDsError::prefetch(format!("worker for {} panicked", self.description)))?;
                tracing::debug!("stopped prefetch worker for {}", self.description);
                self.state = State::Idle(inner);
                Ok(())
            }
            State::Idle(inner) => {
                self.state = State::Idle(inner);
                Ok(())
            }
            State::Poisoned => Err(self.poisoned()),
        }
    }

    fn poisoned(&self) -> TextDsError {
        TextDsError::prefetch(format!("{} is unusable after a worker panic", self.description))
    }
}

fn run_worker<S: RecordStream>(mut inner: S, tx: Sender<Message>, stop: Arc<AtomicBool>) -> S {
    while !stop.load(Ordering::Acquire) {
        let item = inner.next_batch();
        let last = !matches!(item, Ok(Some(_)));
        if tx.send(item).is_err() || last {
            break;
        }
    }
    inner
}

impl<S: RecordStream + 'static> RecordStream for Prefetch<S> {
    fn next_batch(&mut self) -> Result<Option<TensorMap>> {
        if self.buffer_size == 0 {
            if let State::Idle(inner) = &mut self.state {
                return inner.next_batch();
            }
            return Err(self.poisoned());
        }

        if matches!(self.state, State::Idle(_)) {
            self.spawn()?;
        }
        let received = match &self.state {
            State::Running(worker) => worker.rx.recv(),
            _ => return Err(self.poisoned()),
        };

        match received {
            Ok(Ok(Some(item))) => Ok(Some(item)),
            Ok(end_or_error) => {
                self.join()?;
                end_or_error
            }
            Err(_) => {
                // Sender gone without an end marker
                self.join()?;
                Err(TextDsError::prefetch(format!(
                    "worker for {} exited early",
                    self.description
                )))
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.join()?;
        if let State::Idle(inner) = &mut self.state {
            return inner.reset();
        }
        Err(self.poisoned())
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl<S> Drop for Prefetch<S> {
    fn drop(&mut self) {
        if let State::Running(Worker { rx, stop, handle }) = mem::replace(&mut self.state, State::Poisoned) {
            stop.store(true, Ordering::Release);
            drop(rx);
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::test_support::{ids, numbered, CountingStream, FailingStream};
    use crate::stream::{StreamExt, VecStream};
    use std::sync::atomic::Ordering;

    fn drain(stream: &mut impl RecordStream) -> Vec<i64> {
        let mut seen = Vec::new();
        while let Some(item) = stream.next_batch().unwrap() {
            seen.extend(ids(&item));
        }
        seen
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("autotune".parse::<PrefetchPolicy>().unwrap(), PrefetchPolicy::Autotune);
        assert_eq!("off".parse::<PrefetchPolicy>().unwrap(), PrefetchPolicy::Disabled);
        assert_eq!("16".parse::<PrefetchPolicy>().unwrap(), PrefetchPolicy::Fixed(16));
        assert!("sometimes".parse::<PrefetchPolicy>().is_err());
    }

    #[test]
    fn test_buffer_sizes() {
        assert!(PrefetchPolicy::Autotune.buffer_size() >= 2);
        assert_eq!(PrefetchPolicy::Fixed(3).buffer_size(), 3);
        assert_eq!(PrefetchPolicy::Disabled.buffer_size(), 0);
    }

    #[test]
    fn test_nothing_pulled_before_first_item() {
        let (counting, pulls) = CountingStream::new(10);
        let mut stream = counting.prefetch(PrefetchPolicy::Fixed(4));
        assert!(!stream.is_running());
        assert_eq!(pulls.load(Ordering::SeqCst), 0);

        assert_eq!(ids(&stream.next_batch().unwrap().unwrap()), vec![0]);
        assert!(pulls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_preserves_order() {
        let mut stream = VecStream::new(numbered(50)).prefetch(PrefetchPolicy::Fixed(3));
        assert_eq!(drain(&mut stream), (0..50).collect::<Vec<_>>());
        assert!(!stream.is_running());
        assert!(stream.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_disabled_pulls_inline() {
        let (counting, pulls) = CountingStream::new(5);
        let mut stream = counting.prefetch(PrefetchPolicy::Disabled);
        stream.next_batch().unwrap();
        stream.next_batch().unwrap();
        assert_eq!(pulls.load(Ordering::SeqCst), 2);
        assert!(!stream.is_running());
    }

    #[test]
    fn test_upstream_error_is_delivered_in_order() {
        let failing = FailingStream {
            inner: VecStream::new(numbered(5)),
            fail_at: 3,
            pulled: 0,
        };
        let mut stream = failing.prefetch(PrefetchPolicy::Fixed(8));
        assert_eq!(ids(&stream.next_batch().unwrap().unwrap()), vec![0]);
        assert_eq!(ids(&stream.next_batch().unwrap().unwrap()), vec![1]);
        assert!(matches!(stream.next_batch(), Err(TextDsError::Record { .. })));
        // A new worker resumes after the failure
        assert_eq!(ids(&stream.next_batch().unwrap().unwrap()), vec![2]);
    }

    #[test]
    fn test_reset_restarts_upstream() {
        let mut stream = VecStream::new(numbered(20)).prefetch(PrefetchPolicy::Fixed(2));
        stream.next_batch().unwrap();
        stream.next_batch().unwrap();
        stream.reset().unwrap();
        assert!(!stream.is_running());
        assert_eq!(drain(&mut stream), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_stops_running_worker() {
        let mut stream = VecStream::new(numbered(1_000)).prefetch(PrefetchPolicy::Fixed(1));
        stream.next_batch().unwrap();
        assert!(stream.is_running());
        drop(stream);
    }

    struct PanickingStream;

    impl RecordStream for PanickingStream {
        fn next_batch(&mut self) -> Result<Option<TensorMap>> {
            panic!("upstream exploded");
        }
    }

    #[test]
    fn test_worker_panic_poisons_stream() {
        let mut stream = PanickingStream.prefetch(PrefetchPolicy::Fixed(1));
        assert!(matches!(stream.next_batch(), Err(TextDsError::Prefetch { .. })));
        assert!(matches!(stream.next_batch(), Err(TextDsError::Prefetch { .. })));
        assert!(stream.reset().is_err());
    }

    #[test]
    fn test_policy_serde() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            prefetch: PrefetchPolicy,
        }

        let holder: Holder = toml::from_str("prefetch = 6").unwrap();
        assert_eq!(holder.prefetch, PrefetchPolicy::Fixed(6));
        let holder: Holder = toml::from_str("prefetch = \"disabled\"").unwrap();
        assert_eq!(holder.prefetch, PrefetchPolicy::Disabled);

        let text = toml::to_string(&Holder { prefetch: PrefetchPolicy::Autotune }).unwrap();
        assert!(text.contains("\"autotune\""));
    }
}
