//! Segment block index files
//!
//! The index maps each compressed block of a segment to its start time, start sample and
//! byte offset in the data file, in ascending order.
//!
//! Layout (little-endian):
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (1024 bytes)                     │
//! │   magic: [u8; 4] = "TIDX"               │
//! │   version: u16                          │
//! │   reserved: u16                         │
//! │   record_count: u64                     │
//! │   records_crc: u32                      │
//! │   reserved                              │
//! │   header_crc: u32                       │
//! ├─────────────────────────────────────────┤
//! │ RECORDS (24 bytes each)                 │
//! │   file_offset: u64                      │
//! │   start_time: i64 (stored)              │
//! │   start_sample: i64 (segment-relative)  │
//! └─────────────────────────────────────────┘
//! ```

use crate::error::{ReadError, ReadResult};
use crate::format::header::{read_array, UNIVERSAL_HEADER_BYTES};
use crate::format::time::RecordingTimeOffset;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Magic bytes for index files
pub const INDEX_MAGIC: [u8; 4] = *b"TIDX";

/// Current index file format version
pub const INDEX_VERSION: u16 = 1;

/// Size of one serialized index record
pub const INDEX_RECORD_BYTES: usize = 24;

const CRC_OFFSET: usize = UNIVERSAL_HEADER_BYTES - 4;

/// Location of one compressed block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIndexRecord {
    /// Absolute start time of the block (recording-time offset removed)
    pub start_time: i64,
    /// Start sample relative to the segment's first sample
    pub start_sample: i64,
    /// Byte offset of the block header in the segment data file
    pub file_offset: u64,
}

impl BlockIndexRecord {
    pub fn new(start_time: i64, start_sample: i64, file_offset: u64) -> Self {
        Self {
            start_time,
            start_sample,
            file_offset,
        }
    }

    /// Serialize with the start time in its stored form
    pub fn to_bytes(&self, offset: RecordingTimeOffset) -> [u8; INDEX_RECORD_BYTES] {
        let mut buf = [0u8; INDEX_RECORD_BYTES];
        buf[0..8].copy_from_slice(&self.file_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&offset.apply(self.start_time).to_le_bytes());
        buf[16..24].copy_from_slice(&self.start_sample.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8], offset: RecordingTimeOffset) -> Self {
        Self {
            file_offset: u64::from_le_bytes(read_array(buf, 0)),
            start_time: offset.remove(i64::from_le_bytes(read_array(buf, 8))),
            start_sample: i64::from_le_bytes(read_array(buf, 16)),
        }
    }
}

/// Build the index header for an already-serialized record area
pub fn index_header_bytes(record_area: &[u8]) -> [u8; UNIVERSAL_HEADER_BYTES] {
    let mut buf = [0u8; UNIVERSAL_HEADER_BYTES];
    let record_count = (record_area.len() / INDEX_RECORD_BYTES) as u64;

    buf[0..4].copy_from_slice(&INDEX_MAGIC);
    buf[4..6].copy_from_slice(&INDEX_VERSION.to_le_bytes());
    buf[8..16].copy_from_slice(&record_count.to_le_bytes());
    buf[16..20].copy_from_slice(&crc32fast::hash(record_area).to_le_bytes());

    let checksum = crc32fast::hash(&buf[..CRC_OFFSET]);
    buf[CRC_OFFSET..].copy_from_slice(&checksum.to_le_bytes());
    buf
}

/// Read and verify an index file, removing the recording-time offset from every record
pub fn read_index(path: &Path, offset: RecordingTimeOffset) -> ReadResult<Vec<BlockIndexRecord>> {
    let mut file = BufReader::new(File::open(path)?);

    let mut header = [0u8; UNIVERSAL_HEADER_BYTES];
    file.read_exact(&mut header)?;

    let stored_checksum = u32::from_le_bytes(read_array(&header, CRC_OFFSET));
    let computed_checksum = crc32fast::hash(&header[..CRC_OFFSET]);
    if stored_checksum != computed_checksum {
        return Err(ReadError::InvalidFormat(format!(
            "Index header checksum mismatch in {:?}",
            path
        )));
    }

    let magic: [u8; 4] = read_array(&header, 0);
    if magic != INDEX_MAGIC {
        return Err(ReadError::InvalidFormat(format!(
            "Invalid index magic in {:?}: {:?}",
            path, magic
        )));
    }

    let version = u16::from_le_bytes(read_array(&header, 4));
    if version > INDEX_VERSION {
        return Err(ReadError::InvalidFormat(format!(
            "Unsupported index version: {}",
            version
        )));
    }

    let record_count = u64::from_le_bytes(read_array(&header, 8));
    let records_crc = u32::from_le_bytes(read_array(&header, 16));
    let expected_bytes = usize::try_from(record_count)
        .ok()
        .and_then(|count| count.checked_mul(INDEX_RECORD_BYTES))
        .ok_or_else(|| {
            ReadError::InvalidFormat(format!(
                "Index {:?} declares an impossible record count {}",
                path, record_count
            ))
        })?;

    let mut record_area = Vec::new();
    file.read_to_end(&mut record_area)?;
    if record_area.len() != expected_bytes {
        return Err(ReadError::InvalidFormat(format!(
            "Index {:?} declares {} records but holds {} bytes of records",
            path,
            record_count,
            record_area.len()
        )));
    }
    if crc32fast::hash(&record_area) != records_crc {
        return Err(ReadError::InvalidFormat(format!(
            "Index record checksum mismatch in {:?}",
            path
        )));
    }

    let records: Vec<BlockIndexRecord> = record_area
        .chunks_exact(INDEX_RECORD_BYTES)
        .map(|chunk| BlockIndexRecord::from_bytes(chunk, offset))
        .collect();

    for (i, pair) in records.windows(2).enumerate() {
        if pair[1].start_time < pair[0].start_time || pair[1].start_sample < pair[0].start_sample
        {
            return Err(ReadError::InvalidFormat(format!(
                "Index {:?} is out of order at record {}",
                path,
                i + 1
            )));
        }
    }

    Ok(records)
}
