// rust/textds-core/src/tfrecord/writer.rs

//! TFRecord writer.

use std::io::Write;

use super::crc::masked_crc32c;
use crate::error::{Result, TextDsError};

/// Frames payloads into TFRecord records.
pub struct TfRecordWriter<W> {
    inner: W,
    records_written: u64,
}

impl<W: Write> TfRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            records_written: 0,
        }
    }

    /// Writes one framed record.
    pub fn write_record(&mut self, data: &[u8]) -> Result<()> {
        let length = (data.len() as u64).to_le_bytes();
        let mut frame = Vec::with_capacity(data.len() + super::HEADER_LEN + super::FOOTER_LEN);
        frame.extend_from_slice(&length);
        frame.extend_from_slice(&masked_crc32c(&length).to_le_bytes());
        frame.extend_from_slice(data);
        frame.extend_from_slice(&masked_crc32c(data).to_le_bytes());

        self.inner.write_all(&frame).map_err(|e| {
            TextDsError::serialization(format!(
                "failed to write record {}: {e}",
                self.records_written
            ))
        })?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
