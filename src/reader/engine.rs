//! Range reader
//!
//! Ties the read path together:
//! - Query → resolve against the channel
//! - Locate boundary segments and blocks
//! - Plan byte ranges → fetch into one buffer
//! - Validate, decode and stitch into the caller's output
//!
//! A channel is either borrowed from the caller, who keeps it (and its lazily opened handles)
//! for later reads, or opened from a path for the duration of one call and dropped before
//! returning on every path out.

use crate::error::{ReadError, ReadResult};
use crate::format::{Channel, RED_NAN};
use crate::reader::fetch::{fetch, HandlePolicy};
use crate::reader::locate::locate;
use crate::reader::plan::FetchPlan;
use crate::reader::query::Query;
use crate::reader::stitch::stitch;
use std::path::Path;

/// How a failed read is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailBehavior {
    /// Log the failure with `tracing::error!` before returning it
    #[default]
    Report,
    /// Return the failure without logging
    Silent,
}

/// Per-reader options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Value written to time-mode output positions with no stored data
    pub sentinel: i32,
    pub on_fail: FailBehavior,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            sentinel: RED_NAN,
            on_fail: FailBehavior::Report,
        }
    }
}

/// Where the channel for a read comes from
#[derive(Debug)]
pub enum ChannelSource<'a> {
    /// Open the channel directory for this call only
    Path {
        path: &'a Path,
        password: Option<&'a str>,
    },
    /// Caller-owned channel; handles opened during the read stay open
    Channel(&'a mut Channel),
}

impl<'a> ChannelSource<'a> {
    pub fn path(path: &'a Path) -> Self {
        ChannelSource::Path {
            path,
            password: None,
        }
    }
}

impl<'a> From<&'a mut Channel> for ChannelSource<'a> {
    fn from(channel: &'a mut Channel) -> Self {
        ChannelSource::Channel(channel)
    }
}

enum ChannelHandle<'a> {
    Borrowed(&'a mut Channel),
    Owned(Channel),
}

impl ChannelHandle<'_> {
    fn channel(&mut self) -> &mut Channel {
        match self {
            ChannelHandle::Borrowed(channel) => &mut **channel,
            ChannelHandle::Owned(channel) => channel,
        }
    }

    fn policy(&self) -> HandlePolicy {
        match self {
            ChannelHandle::Borrowed(_) => HandlePolicy::Keep,
            ChannelHandle::Owned(_) => HandlePolicy::CloseAfterRead,
        }
    }
}

/// Reads time or sample ranges from channels
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesReader {
    options: ReadOptions,
}

impl TimeSeriesReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ReadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Read `query` into `out`, returning the number of samples written.
    ///
    /// `out` must hold at least the query's sample count: `round((end - start) / 1e6 * freq)`
    /// for time queries and `end - start` (after clamping to the channel) for sample queries.
    /// Only that many leading positions are written.
    pub fn read(
        &self,
        source: ChannelSource<'_>,
        query: Query,
        out: &mut [i32],
    ) -> ReadResult<usize> {
        let result = self.read_inner(source, query, out);

        if let Err(e) = &result {
            if self.options.on_fail == FailBehavior::Report {
                if e.is_corruption() {
                    tracing::error!("Read of {:?} failed, data is likely corrupt: {}", query, e);
                } else {
                    tracing::error!("Read of {:?} failed: {}", query, e);
                }
            }
        }
        result
    }

    /// Read samples in `[start, end)` µs
    pub fn read_by_time(
        &self,
        source: ChannelSource<'_>,
        start: i64,
        end: i64,
        out: &mut [i32],
    ) -> ReadResult<usize> {
        self.read(source, Query::ByTime { start, end }, out)
    }

    /// Read sample numbers `[start, end)`
    pub fn read_by_sample(
        &self,
        source: ChannelSource<'_>,
        start: i64,
        end: i64,
        out: &mut [i32],
    ) -> ReadResult<usize> {
        self.read(source, Query::BySample { start, end }, out)
    }

    fn read_inner(
        &self,
        source: ChannelSource<'_>,
        query: Query,
        out: &mut [i32],
    ) -> ReadResult<usize> {
        query.validate()?;

        let mut handle = match source {
            ChannelSource::Path { path, password } => {
                ChannelHandle::Owned(Channel::open(path, password)?)
            }
            ChannelSource::Channel(channel) => ChannelHandle::Borrowed(channel),
        };
        let policy = handle.policy();
        let channel = handle.channel();

        let resolved = query.resolve(channel)?;
        let count = resolved.num_samples;
        if out.len() < count {
            return Err(ReadError::OutputTooSmall {
                required: count,
                actual: out.len(),
            });
        }
        if count == 0 {
            tracing::debug!("Query {:?} covers no samples", query);
            return Ok(0);
        }

        let span = locate(channel, &resolved)?;
        let plan = FetchPlan::build(channel, &span)?;
        let data = fetch(channel, &plan, policy)?;
        let written = stitch(
            &data,
            &plan,
            channel,
            &resolved,
            self.options.sentinel,
            &mut out[..count],
        )?;

        tracing::debug!(
            "Read {} samples from {:?} ({} blocks, {} bytes)",
            written,
            channel.path,
            plan.total_blocks,
            plan.total_bytes
        );
        Ok(written)
    }
}

/// Read `[start, end)` µs with default options
pub fn read_by_time(
    source: ChannelSource<'_>,
    start: i64,
    end: i64,
    out: &mut [i32],
) -> ReadResult<usize> {
    TimeSeriesReader::new().read_by_time(source, start, end, out)
}

/// Read sample numbers `[start, end)` with default options
pub fn read_by_sample(
    source: ChannelSource<'_>,
    start: i64,
    end: i64,
    out: &mut [i32],
) -> ReadResult<usize> {
    TimeSeriesReader::new().read_by_sample(source, start, end, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockFault;
    use crate::testutil::{ChannelFixture, WrittenChannel, T0};
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::{tempdir, TempDir};

    fn two_segments() -> (TempDir, WrittenChannel) {
        let dir = tempdir().unwrap();
        let fixture = ChannelFixture::contiguous(250.0, 2, 10, 100).write(dir.path());
        (dir, fixture)
    }

    fn by_time(channel: &mut Channel, start: i64, end: i64) -> ReadResult<Vec<i32>> {
        let mut out = vec![0; 4096];
        let n = read_by_time(channel.into(), start, end, &mut out)?;
        out.truncate(n);
        Ok(out)
    }

    #[test]
    fn test_sample_read_across_segments() {
        let (_dir, fixture) = two_segments();
        let mut out = vec![0; 200];

        let n = read_by_sample(ChannelSource::path(&fixture.path), 900, 1100, &mut out).unwrap();
        assert_eq!(n, 200);
        let expected: Vec<i32> = (900..1100).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_time_read_inside_one_segment() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let out = by_time(&mut channel, T0 + 1_000_000, T0 + 2_000_000).unwrap();
        assert_eq!(out.len(), 250);
        let expected: Vec<i32> = (250..500).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_middle_block_ending_at_query_end_is_included() {
        // Block 4 covers [T0+1.6s, T0+2.0s) and ends exactly at the query end
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let out = by_time(&mut channel, T0 + 1_000_000, T0 + 2_000_000).unwrap();
        assert_eq!(out[150], 400);
        assert_eq!(out[249], 499);
        assert!(!out.contains(&RED_NAN));
    }

    #[test]
    fn test_full_range_time_read_has_no_sentinel() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let out = by_time(&mut channel, T0, T0 + 8_000_000).unwrap();
        assert_eq!(out.len(), 2000);
        let expected: Vec<i32> = (0..2000).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_gap_between_segments_reads_as_sentinel() {
        let dir = tempdir().unwrap();
        let fixture = ChannelFixture::contiguous(250.0, 2, 10, 100)
            .with_segment_gap(2_000_000)
            .write(dir.path());
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        // Segment 0 ends at T0+4s, segment 1 starts at T0+6s
        let out = by_time(&mut channel, T0 + 3_000_000, T0 + 7_000_000).unwrap();
        assert_eq!(out.len(), 1000);
        assert_eq!(out[..250], (750..1000).collect::<Vec<i32>>()[..]);
        assert!(out[250..750].iter().all(|&v| v == RED_NAN));
        assert_eq!(out[750..], (1000..1250).collect::<Vec<i32>>()[..]);
    }

    #[test]
    fn test_query_starting_before_file_is_padded() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let out = by_time(&mut channel, T0 - 1_000_000, T0 + 1_000_000).unwrap();
        assert_eq!(out.len(), 500);
        assert!(out[..250].iter().all(|&v| v == RED_NAN));
        assert_eq!(out[250..], (0..250).collect::<Vec<i32>>()[..]);
    }

    #[test]
    fn test_query_running_past_file_end_is_padded() {
        // The channel ends at T0+8s
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let out = by_time(&mut channel, T0 + 7_000_000, T0 + 9_000_000).unwrap();
        assert_eq!(out.len(), 500);
        assert_eq!(out[..250], (1750..2000).collect::<Vec<i32>>()[..]);
        assert!(out[250..].iter().all(|&v| v == RED_NAN));
    }

    #[test]
    fn test_unbounded_start_time_is_an_error() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let err = by_time(&mut channel, i64::MIN, T0 + 1_000_000).unwrap_err();
        assert!(matches!(err, ReadError::InvalidRange { .. }));
        assert_eq!(channel.open_handles(), 0);
    }

    #[test]
    fn test_custom_sentinel() {
        let (_dir, fixture) = two_segments();
        let reader = TimeSeriesReader::with_options(ReadOptions {
            sentinel: -1,
            ..ReadOptions::default()
        });
        let mut out = vec![0; 500];

        reader
            .read_by_time(
                ChannelSource::path(&fixture.path),
                T0 - 1_000_000,
                T0 + 1_000_000,
                &mut out,
            )
            .unwrap();
        assert_eq!(out[0], -1);
        assert_eq!(out[249], -1);
        assert_eq!(out[250], 0);
    }

    #[test]
    fn test_single_block_read() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let out = by_time(&mut channel, T0 + 100_000, T0 + 200_000).unwrap();
        assert_eq!(out, (25..50).collect::<Vec<i32>>());
    }

    #[test]
    fn test_sample_read_is_clamped_to_channel() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();
        let mut out = vec![0; 200];

        let n = read_by_sample((&mut channel).into(), 1900, 2100, &mut out).unwrap();
        assert_eq!(n, 100);
        assert_eq!(out[..100], (1900..2000).collect::<Vec<i32>>()[..]);
        assert!(out[100..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_recording_time_offset_is_removed() {
        let dir = tempdir().unwrap();
        let fixture = ChannelFixture::contiguous(250.0, 2, 10, 100)
            .with_time_offset(T0 - 1_000_000)
            .write(dir.path());
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let out = by_time(&mut channel, T0 + 1_000_000, T0 + 2_000_000).unwrap();
        assert_eq!(out, (250..500).collect::<Vec<i32>>());
    }

    #[test]
    fn test_reads_on_borrowed_channel_are_idempotent() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        let first = by_time(&mut channel, T0 + 3_000_000, T0 + 5_000_000).unwrap();
        assert_eq!(channel.open_handles(), 2);
        let second = by_time(&mut channel, T0 + 3_000_000, T0 + 5_000_000).unwrap();
        assert_eq!(first, second);
        assert_eq!(channel.open_handles(), 2);
    }

    #[test]
    fn test_handle_policy_follows_ownership() {
        let mut handle = ChannelHandle::Owned(
            ChannelFixture::contiguous(250.0, 1, 2, 100).in_memory(),
        );
        assert_eq!(handle.policy(), HandlePolicy::CloseAfterRead);
        assert_eq!(handle.channel().open_handles(), 0);

        let mut channel = ChannelFixture::contiguous(250.0, 1, 2, 100).in_memory();
        assert_eq!(ChannelHandle::Borrowed(&mut channel).policy(), HandlePolicy::Keep);
    }

    #[test]
    fn test_checksum_mismatch_fails_whole_read() {
        let (_dir, fixture) = two_segments();
        let segment = &fixture.segments[0];
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&segment.data_path)
            .unwrap();
        file.seek(SeekFrom::Start(segment.block_offsets[4] + 34))
            .unwrap();
        file.write_all(&[0xAB]).unwrap();
        drop(file);

        let mut channel = Channel::open(&fixture.path, None).unwrap();
        let err = by_time(&mut channel, T0 + 1_000_000, T0 + 2_000_000).unwrap_err();
        assert!(matches!(
            err,
            ReadError::BlockIntegrity {
                segment: 0,
                block: 4,
                fault: BlockFault::ChecksumMismatch { .. },
            }
        ));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_truncated_segment_is_a_short_read() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();

        std::fs::OpenOptions::new()
            .write(true)
            .open(&fixture.segments[0].data_path)
            .unwrap()
            .set_len(fixture.segments[0].block_offsets[3])
            .unwrap();

        let err = by_time(&mut channel, T0 + 1_000_000, T0 + 2_000_000).unwrap_err();
        assert!(matches!(err, ReadError::ShortRead { segment: 0, .. }));
    }

    #[test]
    fn test_index_offset_inside_header_is_corruption() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();
        channel.segments[0].index[2].file_offset = 10;

        let err = by_time(&mut channel, T0 + 1_000_000, T0 + 2_000_000).unwrap_err();
        assert!(matches!(
            err,
            ReadError::IndexCorruption {
                segment: 0,
                block: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_range_fails_before_opening() {
        let mut out = vec![0; 10];
        let err = read_by_time(
            ChannelSource::path(Path::new("/does/not/exist")),
            T0 + 10,
            T0,
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, ReadError::InvalidRange { .. }));
    }

    #[test]
    fn test_output_too_small() {
        let (_dir, fixture) = two_segments();
        let mut out = vec![0; 199];
        let err = read_by_sample(ChannelSource::path(&fixture.path), 900, 1100, &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            ReadError::OutputTooSmall {
                required: 200,
                actual: 199,
            }
        ));
    }

    #[test]
    fn test_query_outside_file() {
        let (_dir, fixture) = two_segments();
        let reader = TimeSeriesReader::with_options(ReadOptions {
            on_fail: FailBehavior::Silent,
            ..ReadOptions::default()
        });
        let mut out = vec![0; 2500];

        let err = reader
            .read_by_time(
                ChannelSource::path(&fixture.path),
                T0 + 20_000_000,
                T0 + 30_000_000,
                &mut out,
            )
            .unwrap_err();
        assert!(matches!(err, ReadError::OutsideFile { .. }));
    }

    #[test]
    fn test_encrypted_channel_is_rejected() {
        let dir = tempdir().unwrap();
        let fixture = ChannelFixture::contiguous(250.0, 1, 2, 100)
            .encrypted()
            .write(dir.path());
        let mut out = vec![0; 10];

        let err = read_by_sample(
            ChannelSource::Path {
                path: &fixture.path,
                password: Some("secret"),
            },
            0,
            10,
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, ReadError::Encrypted(_)));
    }

    #[test]
    fn test_sub_sample_time_query_returns_nothing() {
        let (_dir, fixture) = two_segments();
        let mut channel = Channel::open(&fixture.path, None).unwrap();
        assert_eq!(by_time(&mut channel, T0, T0 + 1).unwrap(), Vec::<i32>::new());
    }
}
