//! Segment and block location
//!
//! Finds the boundary segments of a resolved query and, within each, the block holding the
//! boundary. Block search always runs in the time domain because the stored index is
//! time-ordered; sample queries use their converted time bounds.

use crate::error::{ReadError, ReadResult};
use crate::format::{BlockIndexRecord, Channel};
use crate::reader::query::{QueryMode, ResolvedQuery};

/// First and last block touched by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub start_segment: usize,
    pub start_block: usize,
    pub end_segment: usize,
    pub end_block: usize,
}

impl BlockSpan {
    pub fn is_single_segment(&self) -> bool {
        self.start_segment == self.end_segment
    }
}

/// Index of the last record starting at or before `time`, or 0 if every record starts later
pub fn block_at_or_before(index: &[BlockIndexRecord], time: i64) -> usize {
    index
        .partition_point(|record| record.start_time <= time)
        .saturating_sub(1)
}

/// Locate the block span covering `query`
pub fn locate(channel: &Channel, query: &ResolvedQuery) -> ReadResult<BlockSpan> {
    let (start_segment, end_segment) = match query.mode {
        QueryMode::Time => segments_by_time(channel, query.start_time, query.end_time),
        QueryMode::Sample => segments_by_sample(channel, query.start_sample, query.end_sample),
    };

    let outside = || match query.mode {
        QueryMode::Time => ReadError::OutsideFile {
            start: query.start_time,
            end: query.end_time,
            first: channel.earliest_start_time,
            last: channel.latest_end_time,
        },
        QueryMode::Sample => ReadError::OutsideFile {
            start: query.start_sample,
            end: query.end_sample,
            first: 0,
            last: channel.number_of_samples,
        },
    };

    let (start_segment, end_segment) = match (start_segment, end_segment) {
        (Some(start), Some(end)) if start <= end => (start, end),
        _ => return Err(outside()),
    };

    let start_index = &channel.segments[start_segment].index;
    if start_index.is_empty() {
        return Err(ReadError::EmptySegment {
            segment: start_segment,
        });
    }
    let end_index = &channel.segments[end_segment].index;
    if end_index.is_empty() {
        return Err(ReadError::EmptySegment {
            segment: end_segment,
        });
    }

    let span = BlockSpan {
        start_segment,
        start_block: block_at_or_before(start_index, query.start_time),
        end_segment,
        end_block: block_at_or_before(end_index, query.end_time),
    };

    if span.is_single_segment() && span.end_block < span.start_block {
        return Err(outside());
    }

    tracing::debug!(?span, "Located query blocks");
    Ok(span)
}

/// Start segment: first whose end reaches `start`. End segment: extends forward while
/// segments begin at or before `end`.
fn segments_by_time(channel: &Channel, start: i64, end: i64) -> (Option<usize>, Option<usize>) {
    let mut start_segment = None;
    let mut end_segment = None;

    for (i, segment) in channel.segments.iter().enumerate() {
        if start_segment.is_none() && segment.end_time >= start {
            start_segment = Some(i);
            end_segment = Some(i);
        }
        if end_segment.is_some() && segment.start_time <= end {
            end_segment = Some(i);
        }
    }

    (start_segment, end_segment)
}

/// A segment qualifies when the sample falls in its inclusive sample range; later segments
/// win ties at shared boundaries.
fn segments_by_sample(channel: &Channel, start: i64, end: i64) -> (Option<usize>, Option<usize>) {
    let contains = |i: &usize, sample: i64| {
        let segment = &channel.segments[*i];
        sample >= segment.start_sample && sample <= segment.end_sample()
    };

    let indices = 0..channel.segments.len();
    (
        indices.clone().rev().find(|i| contains(i, start)),
        indices.rev().find(|i| contains(i, end)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::query::Query;
    use crate::testutil::{ChannelFixture, T0};

    fn span_for(channel: &Channel, query: Query) -> ReadResult<BlockSpan> {
        locate(channel, &query.resolve(channel)?)
    }

    #[test]
    fn test_block_at_or_before() {
        let index: Vec<BlockIndexRecord> = (0..4)
            .map(|i| BlockIndexRecord::new(1000 * i, 100 * i, 1024 + 400 * i as u64))
            .collect();

        assert_eq!(block_at_or_before(&index, -5), 0);
        assert_eq!(block_at_or_before(&index, 0), 0);
        assert_eq!(block_at_or_before(&index, 1999), 1);
        assert_eq!(block_at_or_before(&index, 2000), 2);
        assert_eq!(block_at_or_before(&index, 99_999), 3);
    }

    #[test]
    fn test_time_query_within_one_segment() {
        let channel = ChannelFixture::contiguous(250.0, 2, 10, 100).in_memory();
        let span = span_for(
            &channel,
            Query::ByTime {
                start: T0 + 1_000_000,
                end: T0 + 2_000_000,
            },
        )
        .unwrap();

        assert_eq!(
            span,
            BlockSpan {
                start_segment: 0,
                start_block: 2,
                end_segment: 0,
                end_block: 5,
            }
        );
    }

    #[test]
    fn test_sample_query_across_segments() {
        let channel = ChannelFixture::contiguous(250.0, 2, 10, 100).in_memory();
        let span = span_for(
            &channel,
            Query::BySample {
                start: 900,
                end: 1100,
            },
        )
        .unwrap();

        assert_eq!(
            span,
            BlockSpan {
                start_segment: 0,
                start_block: 9,
                end_segment: 1,
                end_block: 1,
            }
        );
        assert!(!span.is_single_segment());
    }

    #[test]
    fn test_time_query_spanning_three_segments() {
        let channel = ChannelFixture::contiguous(250.0, 3, 10, 100).in_memory();
        let span = span_for(
            &channel,
            Query::ByTime {
                start: T0 + 3_000_000,
                end: T0 + 9_000_000,
            },
        )
        .unwrap();

        assert_eq!((span.start_segment, span.start_block), (0, 7));
        assert_eq!((span.end_segment, span.end_block), (2, 2));
    }

    #[test]
    fn test_time_query_starting_in_gap_begins_at_next_segment() {
        let channel = ChannelFixture::contiguous(250.0, 2, 10, 100)
            .with_segment_gap(2_000_000)
            .in_memory();
        let span = span_for(
            &channel,
            Query::ByTime {
                start: T0 + 5_000_000,
                end: T0 + 7_000_000,
            },
        )
        .unwrap();

        assert_eq!((span.start_segment, span.start_block), (1, 0));
        assert_eq!((span.end_segment, span.end_block), (1, 2));
    }

    #[test]
    fn test_query_past_end_extends_to_last_block() {
        let channel = ChannelFixture::contiguous(250.0, 2, 10, 100).in_memory();
        let span = span_for(
            &channel,
            Query::ByTime {
                start: T0 + 7_000_000,
                end: T0 + 20_000_000,
            },
        )
        .unwrap();

        assert_eq!((span.start_segment, span.start_block), (1, 7));
        assert_eq!((span.end_segment, span.end_block), (1, 9));
    }

    #[test]
    fn test_block_less_boundary_segment_is_an_error() {
        let mut channel = ChannelFixture::contiguous(250.0, 2, 10, 100).in_memory();
        channel.segments[1].index.clear();

        let err = span_for(
            &channel,
            Query::BySample {
                start: 900,
                end: 1100,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ReadError::EmptySegment { segment: 1 }));
    }
}
