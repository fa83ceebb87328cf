//! Channels and their segments
//!
//! A channel directory holds one `*.segd` directory per segment. Each segment directory holds a
//! `*.tdat` data file and a `*.tidx` index file.
//!
//! ```text
//! eeg-c3.timd/
//!   eeg-c3-000000.segd/
//!     eeg-c3-000000.tdat
//!     eeg-c3-000000.tidx
//!   eeg-c3-000001.segd/
//!     ...
//! ```

use crate::error::{ReadError, ReadResult};
use crate::format::header::{SegmentHeader, UNIVERSAL_HEADER_BYTES};
use crate::format::index::{read_index, BlockIndexRecord};
use crate::format::time::RecordingTimeOffset;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Extension of segment directories
pub const SEGMENT_DIR_EXTENSION: &str = "segd";
/// Extension of segment data files
pub const DATA_FILE_EXTENSION: &str = "tdat";
/// Extension of segment index files
pub const INDEX_FILE_EXTENSION: &str = "tidx";

/// Backing data file of a segment, opened on first use
#[derive(Debug)]
pub struct SegmentFile {
    path: PathBuf,
    length: u64,
    handle: Option<File>,
}

impl SegmentFile {
    pub fn new(path: impl Into<PathBuf>, length: u64) -> Self {
        Self {
            path: path.into(),
            length,
            handle: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File length recorded when the segment was opened
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Close the handle if open; the next read reopens it
    pub fn close(&mut self) {
        self.handle = None;
    }

    /// Read up to `buf.len()` bytes starting at `offset`, returning how many were read.
    ///
    /// Stops early only at end of file.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        let file = match self.handle.take() {
            Some(file) => file,
            None => File::open(&self.path)?,
        };
        let file = self.handle.insert(file);
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// One physical unit of a channel covering a contiguous sample range
#[derive(Debug)]
pub struct Segment {
    /// Index of this segment's first sample within the channel
    pub start_sample: i64,
    pub number_of_samples: i64,
    /// Absolute start time (offset removed)
    pub start_time: i64,
    /// Absolute end time (offset removed)
    pub end_time: i64,
    pub maximum_block_samples: u32,
    /// Block index, ascending in time and sample
    pub index: Vec<BlockIndexRecord>,
    pub data: SegmentFile,
}

impl Segment {
    /// Absolute (channel-level) start sample of block `idx`
    pub fn block_start_sample(&self, idx: usize) -> i64 {
        self.start_sample + self.index[idx].start_sample
    }

    /// One past the last sample of this segment
    pub fn end_sample(&self) -> i64 {
        self.start_sample + self.number_of_samples
    }

    /// Load a segment from its `*.segd` directory
    pub fn open(dir: &Path) -> ReadResult<(Self, SegmentHeader)> {
        let data_path = find_with_extension(dir, DATA_FILE_EXTENSION)?;
        let index_path = find_with_extension(dir, INDEX_FILE_EXTENSION)?;

        let mut file = File::open(&data_path)?;
        let length = file.metadata()?.len();
        let mut header_buf = [0u8; UNIVERSAL_HEADER_BYTES];
        file.read_exact(&mut header_buf)?;
        let header = SegmentHeader::from_bytes(&header_buf)?;

        if header.is_encrypted() {
            return Err(ReadError::Encrypted(data_path));
        }

        let offset = RecordingTimeOffset::new(header.recording_time_offset);
        let index = read_index(&index_path, offset)?;
        if index.len() != header.number_of_blocks as usize {
            return Err(ReadError::InvalidFormat(format!(
                "Segment {:?} declares {} blocks but its index holds {}",
                dir,
                header.number_of_blocks,
                index.len()
            )));
        }

        let segment = Self {
            start_sample: header.start_sample,
            number_of_samples: header.number_of_samples,
            start_time: offset.remove(header.start_time),
            end_time: offset.remove(header.end_time),
            maximum_block_samples: header.maximum_block_samples,
            index,
            data: SegmentFile::new(data_path, length),
        };
        Ok((segment, header))
    }
}

/// A time-series channel: ordered segments sharing one sampling frequency
#[derive(Debug)]
pub struct Channel {
    pub path: PathBuf,
    pub sampling_frequency: f64,
    pub segments: Vec<Segment>,
    pub earliest_start_time: i64,
    pub latest_end_time: i64,
    pub number_of_samples: i64,
    /// Largest block sample count of any segment
    pub maximum_block_samples: u32,
    pub time_offset: RecordingTimeOffset,
}

impl Channel {
    /// Assemble a channel from already-loaded segments
    pub fn new(
        path: impl Into<PathBuf>,
        sampling_frequency: f64,
        mut segments: Vec<Segment>,
        time_offset: RecordingTimeOffset,
    ) -> ReadResult<Self> {
        let path = path.into();
        if segments.is_empty() {
            return Err(ReadError::EmptyChannel(path));
        }
        if !(sampling_frequency.is_finite() && sampling_frequency > 0.0) {
            return Err(ReadError::InvalidFormat(format!(
                "Invalid sampling frequency: {}",
                sampling_frequency
            )));
        }

        segments.sort_by_key(|s| s.start_sample);

        let earliest_start_time = segments.iter().map(|s| s.start_time).min().unwrap_or(0);
        let latest_end_time = segments.iter().map(|s| s.end_time).max().unwrap_or(0);
        let number_of_samples = segments.iter().map(|s| s.end_sample()).max().unwrap_or(0);
        let maximum_block_samples = segments
            .iter()
            .map(|s| s.maximum_block_samples)
            .max()
            .unwrap_or(0);

        Ok(Self {
            path,
            sampling_frequency,
            segments,
            earliest_start_time,
            latest_end_time,
            number_of_samples,
            maximum_block_samples,
            time_offset,
        })
    }

    /// Open a channel directory.
    ///
    /// Encrypted channels are rejected, so `password` is only recorded in the log.
    pub fn open(path: impl AsRef<Path>, password: Option<&str>) -> ReadResult<Self> {
        let path = path.as_ref();
        if password.is_some() {
            tracing::debug!("Password supplied for {:?}; channel data is read unencrypted", path);
        }

        let mut segment_dirs = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_dir()
                && entry_path.extension().and_then(|e| e.to_str()) == Some(SEGMENT_DIR_EXTENSION)
            {
                segment_dirs.push(entry_path);
            }
        }
        segment_dirs.sort();

        let mut segments = Vec::with_capacity(segment_dirs.len());
        let mut frequency: Option<f64> = None;
        let mut time_offset = RecordingTimeOffset::none();

        for dir in &segment_dirs {
            let (segment, header) = Segment::open(dir)?;
            match frequency {
                None => {
                    frequency = Some(header.sampling_frequency);
                    time_offset = RecordingTimeOffset::new(header.recording_time_offset);
                }
                Some(f) => {
                    let tolerance = f.abs() * 1e-9;
                    if (header.sampling_frequency - f).abs() > tolerance {
                        return Err(ReadError::InvalidFormat(format!(
                            "Segment {:?} samples at {} Hz, channel at {} Hz",
                            dir, header.sampling_frequency, f
                        )));
                    }
                    // Block headers are read with the channel's offset, so it must be shared
                    if header.recording_time_offset != time_offset.value() {
                        return Err(ReadError::InvalidFormat(format!(
                            "Segment {:?} has recording time offset {}, channel has {}",
                            dir,
                            header.recording_time_offset,
                            time_offset.value()
                        )));
                    }
                }
            }
            segments.push(segment);
        }

        let frequency = frequency.ok_or_else(|| ReadError::EmptyChannel(path.to_path_buf()))?;
        let channel = Self::new(path, frequency, segments, time_offset)?;

        tracing::debug!(
            "Opened channel {:?}: {} segments, {} samples at {} Hz",
            path,
            channel.segments.len(),
            channel.number_of_samples,
            channel.sampling_frequency
        );
        Ok(channel)
    }

    /// Total number of block index records across all segments
    pub fn block_count(&self) -> usize {
        self.segments.iter().map(|s| s.index.len()).sum()
    }

    /// Number of segment data files currently holding an open handle
    pub fn open_handles(&self) -> usize {
        self.segments.iter().filter(|s| s.data.is_open()).count()
    }

    /// Close every open segment handle
    pub fn close_all(&mut self) {
        for segment in &mut self.segments {
            segment.data.close();
        }
    }
}

fn find_with_extension(dir: &Path, extension: &str) -> ReadResult<PathBuf> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            return Ok(path);
        }
    }
    Err(ReadError::InvalidFormat(format!(
        "No .{} file in segment directory {:?}",
        extension, dir
    )))
}
