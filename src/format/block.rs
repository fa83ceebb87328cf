//! Compressed sample blocks
//!
//! A block is self-delimiting: a fixed header followed by a delta-encoded, LZ4-compressed
//! payload of 32-bit samples.
//!
//! Layout (little-endian):
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (32 bytes)                       │
//! │   block_crc: u32   (CRC32 of [4, end))  │
//! │   block_bytes: u32 (header + payload)   │
//! │   number_of_samples: u32                │
//! │   flags: u32                            │
//! │   start_time: i64 (stored)              │
//! │   reserved: [u8; 8]                     │
//! ├─────────────────────────────────────────┤
//! │ PAYLOAD                                 │
//! │   lz4(size-prepended)(deltas as i32 LE) │
//! └─────────────────────────────────────────┘
//! ```

use crate::error::{BlockFault, ReadError, ReadResult};
use crate::format::header::read_array;

/// Size of a block header in bytes
pub const BLOCK_HEADER_BYTES: usize = 32;

/// Bytes at the start of the header occupied by the checksum
pub const CRC_BYTES: usize = 4;

/// Sample value reserved to mean "no data here"
pub const RED_NAN: i32 = i32::MIN;

/// Decoded block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_crc: u32,
    pub block_bytes: u32,
    pub number_of_samples: u32,
    pub flags: u32,
    /// Start time as stored; remove the recording-time offset before use
    pub start_time: i64,
}

impl BlockHeader {
    /// Parse a header from the front of `buf`, if enough bytes are present
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < BLOCK_HEADER_BYTES {
            return None;
        }
        Some(Self {
            block_crc: u32::from_le_bytes(read_array(buf, 0)),
            block_bytes: u32::from_le_bytes(read_array(buf, 4)),
            number_of_samples: u32::from_le_bytes(read_array(buf, 8)),
            flags: u32::from_le_bytes(read_array(buf, 12)),
            start_time: i64::from_le_bytes(read_array(buf, 16)),
        })
    }
}

/// Largest number of bytes a block holding `max_samples` samples can occupy
pub fn max_block_bytes(max_samples: u32) -> usize {
    let raw = max_samples as usize * 4;
    BLOCK_HEADER_BYTES + 4 + lz4_flex::block::get_maximum_output_size(raw)
}

/// Validation gate run before every decode.
///
/// `remaining` starts at the candidate block header and runs to the end of the fetched
/// buffer. On success the returned header's `block_bytes` is known to fit in `remaining`.
pub fn validate_block(remaining: &[u8], max_samples: u32) -> Result<BlockHeader, BlockFault> {
    let header = BlockHeader::parse(remaining).ok_or(BlockFault::TruncatedHeader {
        remaining: remaining.len(),
    })?;

    let declared = header.block_bytes;
    if (declared as usize) < BLOCK_HEADER_BYTES {
        return Err(BlockFault::TooSmall { declared });
    }
    if declared as usize > remaining.len() {
        return Err(BlockFault::Overrun {
            declared,
            remaining: remaining.len(),
        });
    }
    let maximum = max_block_bytes(max_samples);
    if declared as usize > maximum {
        return Err(BlockFault::ExceedsMaximum { declared, maximum });
    }

    let computed = crc32fast::hash(&remaining[CRC_BYTES..declared as usize]);
    if computed != header.block_crc {
        return Err(BlockFault::ChecksumMismatch {
            stored: header.block_crc,
            computed,
        });
    }

    Ok(header)
}

/// Decode a validated block into `out`, returning the number of samples written
pub fn decode_block(block: &[u8], out: &mut [i32]) -> ReadResult<usize> {
    let header = BlockHeader::parse(block)
        .ok_or_else(|| ReadError::Decode("block shorter than its header".into()))?;
    let count = header.number_of_samples as usize;
    if count > out.len() {
        return Err(ReadError::Decode(format!(
            "block holds {} samples but only {} fit in the destination",
            count,
            out.len()
        )));
    }

    let end = header.block_bytes as usize;
    if end < BLOCK_HEADER_BYTES + 4 || end > block.len() {
        return Err(ReadError::Decode(format!(
            "block declares {} bytes but {} are available",
            end,
            block.len()
        )));
    }
    let payload = &block[BLOCK_HEADER_BYTES..end];

    // Checked before decompressing so a damaged size never drives the allocation
    let prepended = u32::from_le_bytes(read_array(payload, 0)) as usize;
    if prepended != count * 4 {
        return Err(ReadError::Decode(format!(
            "block declares {} samples but its payload expands to {} bytes",
            count, prepended
        )));
    }
    let raw = lz4_flex::decompress_size_prepended(payload)
        .map_err(|e| ReadError::Decode(format!("LZ4 decompression failed: {}", e)))?;
    if raw.len() != count * 4 {
        return Err(ReadError::Decode(format!(
            "block declares {} samples but payload holds {} bytes",
            count,
            raw.len()
        )));
    }

    let mut current = 0i32;
    for (slot, delta) in out.iter_mut().zip(raw.chunks_exact(4)) {
        current = current.wrapping_add(i32::from_le_bytes(read_array(delta, 0)));
        *slot = current;
    }

    Ok(count)
}

/// Encode samples into a block whose header carries `stored_start_time`
pub fn encode_block(samples: &[i32], stored_start_time: i64) -> Vec<u8> {
    let mut raw = Vec::with_capacity(samples.len() * 4);
    let mut previous = 0i32;
    for &sample in samples {
        raw.extend_from_slice(&sample.wrapping_sub(previous).to_le_bytes());
        previous = sample;
    }
    let payload = lz4_flex::compress_prepend_size(&raw);

    let block_bytes = BLOCK_HEADER_BYTES + payload.len();
    let mut block = Vec::with_capacity(block_bytes);
    block.extend_from_slice(&[0u8; CRC_BYTES]);
    block.extend_from_slice(&(block_bytes as u32).to_le_bytes());
    block.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    block.extend_from_slice(&0u32.to_le_bytes());
    block.extend_from_slice(&stored_start_time.to_le_bytes());
    block.extend_from_slice(&[0u8; 8]);
    block.extend_from_slice(&payload);

    let checksum = crc32fast::hash(&block[CRC_BYTES..]);
    block[..CRC_BYTES].copy_from_slice(&checksum.to_le_bytes());
    block
}
