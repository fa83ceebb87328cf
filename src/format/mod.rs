//! On-disk channel format
//!
//! - **header**: segment data file universal header
//! - **index**: per-segment block index files
//! - **block**: compressed block header, validation gate, and codec
//! - **time**: recording-time offset removal
//! - **channel**: in-memory channel/segment model and directory loading

pub mod block;
pub mod channel;
pub mod header;
pub mod index;
pub mod time;

pub use block::{
    decode_block, encode_block, max_block_bytes, validate_block, BlockHeader, BLOCK_HEADER_BYTES,
    RED_NAN,
};
pub use channel::{Channel, Segment, SegmentFile};
pub use header::{SegmentHeader, UNIVERSAL_HEADER_BYTES};
pub use index::BlockIndexRecord;
pub use time::{RecordingTimeOffset, UUTC_NO_ENTRY};
