// rust/textds-core/src/tfrecord/reader.rs

//! Sequential TFRecord reader.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use super::crc::masked_crc32c;
use super::{FOOTER_LEN, HEADER_LEN};
use crate::error::{Result, TextDsError};

/// Upper bound on the buffer reserved before a payload is read.
const MAX_PREALLOC: u64 = 1 << 20;

/// Reads framed records one at a time from any byte source.
pub struct TfRecordReader<R> {
    inner: R,
    path: PathBuf,
    verify_checksums: bool,
    records_read: u64,
}

impl<R: Read> TfRecordReader<R> {
    /// Creates a reader. `path` is only used in error messages.
    pub fn new(inner: R, path: impl Into<PathBuf>, verify_checksums: bool) -> Self {
        Self {
            inner,
            path: path.into(),
            verify_checksums,
            records_read: 0,
        }
    }

    /// Reads the next record payload.
    ///
    /// Returns `Ok(None)` at a clean end of file. A file that ends inside a
    /// record, or a checksum mismatch, is an error.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; HEADER_LEN];
        if !self.fill(&mut header)? {
            return Ok(None);
        }

        let (len_bytes, len_crc) = header.split_at(8);
        if self.verify_checksums {
            self.check(len_bytes, len_crc, "length")?;
        }

        let length = u64::from_le_bytes(len_bytes.try_into().unwrap_or_default());
        let data = self.read_payload(length)?;
        let mut footer = [0u8; FOOTER_LEN];
        if !self.fill(&mut footer)? {
            return Err(self.truncated());
        }

        if self.verify_checksums {
            self.check(&data, &footer, "data")?;
        }

        self.records_read += 1;
        Ok(Some(data))
    }

    /// Skips `count` records without returning their payloads.
    ///
    /// Returns the number of records actually skipped.
    pub fn skip_records(&mut self, count: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < count {
            if self.next_record()?.is_none() {
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Number of records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a payload of `length` bytes. The buffer grows with the bytes
    /// actually read, so an unverified length cannot force a huge allocation.
    fn read_payload(&mut self, length: u64) -> Result<Vec<u8>> {
        let capacity = usize::try_from(length.min(MAX_PREALLOC)).unwrap_or(0);
        let mut data = Vec::with_capacity(capacity);
        let read = (&mut self.inner)
            .take(length)
            .read_to_end(&mut data)
            .map_err(|e| TextDsError::storage_with_source(&self.path, "failed to read record", e))?;
        if (read as u64) < length {
            return Err(self.truncated());
        }
        Ok(data)
    }

    /// Fills `buf` completely. Returns false if the source was already at
    /// EOF; a partial fill is a truncation error.
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(TextDsError::storage_with_source(
                        &self.path,
                        "failed to read record",
                        e,
                    ))
                }
            }
        }

        match filled {
            0 if !buf.is_empty() => Ok(false),
            n if n == buf.len() => Ok(true),
            _ => Err(self.truncated()),
        }
    }

    fn check(&self, data: &[u8], stored: &[u8], what: &str) -> Result<()> {
        let stored = u32::from_le_bytes(stored.try_into().unwrap_or_default());
        let computed = masked_crc32c(data);
        if stored != computed {
            return Err(TextDsError::record(
                &self.path,
                format!(
                    "{} checksum mismatch in record {}: stored {:#010x}, computed {:#010x}",
                    what, self.records_read, stored, computed
                ),
            ));
        }
        Ok(())
    }

    fn truncated(&self) -> TextDsError {
        TextDsError::record(
            &self.path,
            format!("truncated record after {} records", self.records_read),
        )
    }
}

impl<R: Read> Iterator for TfRecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
