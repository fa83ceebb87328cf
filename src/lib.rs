//! # mefts
//!
//! Range reads over multi-segment, block-indexed, compressed time-series channels.
//!
//! A channel is split across segment files, each carrying a sorted index of compressed
//! blocks. A read resolves a time or sample interval to the blocks covering it, fetches them
//! with one contiguous read per segment, validates and decodes each block, and stitches the
//! samples into the caller's buffer. Time regions with no stored data read as a sentinel.
//!
//! ## Modules
//!
//! - [`format`]: on-disk channel layout and the block codec
//! - [`reader`]: the range read path
//! - [`config`]: TOML configuration for the command-line tool
//! - [`error`]: read path errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mefts::format::Channel;
//! use mefts::reader::{read_by_sample, read_by_time, ChannelSource};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One-shot read: the channel is opened and released inside the call
//!     let mut out = vec![0i32; 200];
//!     let n = read_by_sample(ChannelSource::path(Path::new("eeg-c3.timd")), 900, 1100, &mut out)?;
//!     println!("Read {} samples", n);
//!
//!     // Repeated reads: keep the channel so segment handles are reused
//!     let mut channel = Channel::open("eeg-c3.timd", None)?;
//!     let start = channel.earliest_start_time;
//!     let mut window = vec![0i32; 2500];
//!     read_by_time((&mut channel).into(), start, start + 10_000_000, &mut window)?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod reader;

#[cfg(test)]
mod testutil;

// Re-export top-level types for convenience
pub use error::{BlockFault, ReadError, ReadResult};

pub use format::{Channel, RecordingTimeOffset, Segment, RED_NAN};

pub use reader::{
    read_by_sample, read_by_time, sample_for_time, time_for_sample, ChannelSource, FailBehavior,
    Query, ReadOptions, TimeSeriesReader,
};

pub use config::{Config, ConfigError, LoggingConfig, ReaderConfig};
