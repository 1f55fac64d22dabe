// rust/textds-core/src/tfrecord/mod.rs

//! TFRecord framing and `tf.train.Example` payloads.
//!
//! The on-disk record format is:
//! ```text
//! +--------------------------+
//! | length      u64 LE       |
//! | length_crc  u32 LE       |  <- masked CRC32C of the 8 length bytes
//! +--------------------------+
//! | data        [u8; length] |
//! | data_crc    u32 LE       |  <- masked CRC32C of data
//! +--------------------------+
//! ```

mod crc;
mod example;
mod reader;
mod writer;

pub use crc::masked_crc32c;
pub use example::{
    decode_example, encode_example, feature, BytesList, Example, Feature, Features, FloatList,
    Int64List,
};
pub use reader::TfRecordReader;
pub use writer::TfRecordWriter;

/// Size of the length header plus its checksum.
pub const HEADER_LEN: usize = 12;

/// Size of the trailing payload checksum.
pub const FOOTER_LEN: usize = 4;
