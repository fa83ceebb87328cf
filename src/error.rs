//! Read path error types
//!
//! Every failure a range read can hit, grouped the way callers usually react to them:
//! usage mistakes, requests outside the stored range, corrupt indices or blocks, and I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Why a compressed block failed the validation gate
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFault {
    /// Fewer bytes remain in the fetched buffer than one block header
    #[error("only {remaining} bytes left, header does not fit")]
    TruncatedHeader { remaining: usize },

    /// Header declares fewer bytes than the header itself (includes zero-length blocks)
    #[error("declared size {declared} is smaller than a block header")]
    TooSmall { declared: u32 },

    /// Header declares more bytes than remain in the fetched buffer
    #[error("declared size {declared} exceeds the {remaining} bytes remaining")]
    Overrun { declared: u32, remaining: usize },

    /// Header declares more bytes than any block of this channel can occupy
    #[error("declared size {declared} exceeds maximum block size {maximum}")]
    ExceedsMaximum { declared: u32, maximum: usize },

    /// Stored checksum does not match the block contents
    #[error("checksum mismatch: stored={stored:#010x}, computed={computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Errors that can occur while opening a channel or reading a range from it
#[derive(Error, Debug)]
pub enum ReadError {
    /// Query bounds are not a half-open interval with start < end
    #[error("Invalid range: start {start} must be less than end {end}")]
    InvalidRange { start: i64, end: i64 },

    /// Output buffer cannot hold the requested number of samples
    #[error("Output buffer holds {actual} samples but {required} are required")]
    OutputTooSmall { required: usize, actual: usize },

    /// Requested interval does not intersect the stored data at all
    #[error("Range [{start}, {end}) lies outside the stored range [{first}, {last}]")]
    OutsideFile {
        start: i64,
        end: i64,
        first: i64,
        last: i64,
    },

    /// An index record points inside the segment header region or past the data file
    #[error("Index corruption in segment {segment}, block {block}: {reason}")]
    IndexCorruption {
        segment: usize,
        block: usize,
        reason: String,
    },

    /// A boundary segment has no blocks to read
    #[error("Segment {segment} contains no blocks")]
    EmptySegment { segment: usize },

    /// A channel was built or opened with no segments
    #[error("Channel {0:?} contains no segments")]
    EmptyChannel(PathBuf),

    /// Header, index, or directory layout is not a valid channel
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Channel data is encrypted; decryption is not supported
    #[error("Channel segment {0:?} is encrypted")]
    Encrypted(PathBuf),

    /// A segment file returned fewer bytes than planned
    #[error("Short read from segment {segment}: expected {expected} bytes, got {actual}")]
    ShortRead {
        segment: usize,
        expected: u64,
        actual: u64,
    },

    /// A block failed the validation gate
    #[error("Block {block} of segment {segment} is corrupt: {fault}")]
    BlockIntegrity {
        segment: usize,
        block: usize,
        fault: BlockFault,
    },

    /// A block passed validation but its payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    /// True for errors that indicate damaged on-disk data rather than a bad request
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ReadError::IndexCorruption { .. }
                | ReadError::EmptySegment { .. }
                | ReadError::InvalidFormat(_)
                | ReadError::BlockIntegrity { .. }
                | ReadError::Decode(_)
        )
    }
}

/// Result type alias for read operations
pub type ReadResult<T> = Result<T, ReadError>;
