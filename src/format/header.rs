//! Segment data file header
//!
//! Every segment data file starts with a fixed universal header region. Compressed blocks
//! follow immediately after it.
//!
//! Layout (little-endian):
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (1024 bytes)                     │
//! │   magic: [u8; 4] = "TDAT"               │   0
//! │   version: u16                          │   4
//! │   flags: u16                            │   6
//! │   start_time: i64 (stored)              │   8
//! │   end_time: i64 (stored)                │  16
//! │   start_sample: i64                     │  24
//! │   number_of_samples: i64                │  32
//! │   sampling_frequency: f64               │  40
//! │   maximum_block_samples: u32            │  48
//! │   number_of_blocks: u32                 │  52
//! │   recording_time_offset: i64            │  56
//! │   reserved                              │  64
//! │   header_crc: u32                       │ 1020
//! ├─────────────────────────────────────────┤
//! │ BLOCKS (variable)                       │
//! └─────────────────────────────────────────┘
//! ```

use crate::error::{ReadError, ReadResult};

/// Size of the universal header at the start of every segment file
pub const UNIVERSAL_HEADER_BYTES: usize = 1024;

/// Magic bytes for segment data files
pub const DATA_MAGIC: [u8; 4] = *b"TDAT";

/// Current data file format version
pub const DATA_VERSION: u16 = 1;

/// Flag bit set when the block payloads are encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;

const CRC_OFFSET: usize = UNIVERSAL_HEADER_BYTES - 4;

/// Segment data file header
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentHeader {
    pub version: u16,
    pub flags: u16,
    /// First sample time as stored (may carry the recording-time offset)
    pub start_time: i64,
    /// End time as stored (may carry the recording-time offset)
    pub end_time: i64,
    /// Index of this segment's first sample within the channel
    pub start_sample: i64,
    pub number_of_samples: i64,
    pub sampling_frequency: f64,
    pub maximum_block_samples: u32,
    pub number_of_blocks: u32,
    pub recording_time_offset: i64,
}

impl SegmentHeader {
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; UNIVERSAL_HEADER_BYTES] {
        let mut buf = [0u8; UNIVERSAL_HEADER_BYTES];

        buf[0..4].copy_from_slice(&DATA_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..16].copy_from_slice(&self.start_time.to_le_bytes());
        buf[16..24].copy_from_slice(&self.end_time.to_le_bytes());
        buf[24..32].copy_from_slice(&self.start_sample.to_le_bytes());
        buf[32..40].copy_from_slice(&self.number_of_samples.to_le_bytes());
        buf[40..48].copy_from_slice(&self.sampling_frequency.to_le_bytes());
        buf[48..52].copy_from_slice(&self.maximum_block_samples.to_le_bytes());
        buf[52..56].copy_from_slice(&self.number_of_blocks.to_le_bytes());
        buf[56..64].copy_from_slice(&self.recording_time_offset.to_le_bytes());

        let checksum = crc32fast::hash(&buf[..CRC_OFFSET]);
        buf[CRC_OFFSET..].copy_from_slice(&checksum.to_le_bytes());

        buf
    }

    /// Parse header from bytes
    pub fn from_bytes(buf: &[u8; UNIVERSAL_HEADER_BYTES]) -> ReadResult<Self> {
        // Verify checksum first
        let stored_checksum = u32::from_le_bytes(read_array(buf, CRC_OFFSET));
        let computed_checksum = crc32fast::hash(&buf[..CRC_OFFSET]);
        if stored_checksum != computed_checksum {
            return Err(ReadError::InvalidFormat(format!(
                "Segment header checksum mismatch: stored={}, computed={}",
                stored_checksum, computed_checksum
            )));
        }

        let magic: [u8; 4] = read_array(buf, 0);
        if magic != DATA_MAGIC {
            return Err(ReadError::InvalidFormat(format!(
                "Invalid data file magic: {:?}",
                magic
            )));
        }

        let version = u16::from_le_bytes(read_array(buf, 4));
        if version > DATA_VERSION {
            return Err(ReadError::InvalidFormat(format!(
                "Unsupported data file version: {}",
                version
            )));
        }

        let header = Self {
            version,
            flags: u16::from_le_bytes(read_array(buf, 6)),
            start_time: i64::from_le_bytes(read_array(buf, 8)),
            end_time: i64::from_le_bytes(read_array(buf, 16)),
            start_sample: i64::from_le_bytes(read_array(buf, 24)),
            number_of_samples: i64::from_le_bytes(read_array(buf, 32)),
            sampling_frequency: f64::from_le_bytes(read_array(buf, 40)),
            maximum_block_samples: u32::from_le_bytes(read_array(buf, 48)),
            number_of_blocks: u32::from_le_bytes(read_array(buf, 52)),
            recording_time_offset: i64::from_le_bytes(read_array(buf, 56)),
        };

        if !(header.sampling_frequency.is_finite() && header.sampling_frequency > 0.0) {
            return Err(ReadError::InvalidFormat(format!(
                "Invalid sampling frequency: {}",
                header.sampling_frequency
            )));
        }
        if header.start_sample < 0 || header.number_of_samples < 0 {
            return Err(ReadError::InvalidFormat(format!(
                "Invalid sample range: start={}, count={}",
                header.start_sample, header.number_of_samples
            )));
        }

        Ok(header)
    }
}

/// Copy `N` bytes starting at `at` into a fixed array
pub(crate) fn read_array<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}
