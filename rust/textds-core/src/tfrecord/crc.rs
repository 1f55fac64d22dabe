// rust/textds-core/src/tfrecord/crc.rs

//! Masked CRC32C as stored in TFRecord frames.

const MASK_DELTA: u32 = 0xa282_ead8;

/// The masked form stored in TFRecord files.
pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}
