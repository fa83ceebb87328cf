//! Fetch planning
//!
//! Turns a block span into the byte ranges to read from each segment data file. Ranges are
//! contiguous per segment and concatenate, in order, into one compressed buffer whose blocks
//! are walked by the stitch engine.

use crate::error::{ReadError, ReadResult};
use crate::format::{Channel, UNIVERSAL_HEADER_BYTES};
use crate::reader::locate::BlockSpan;

/// Bytes to read from one segment data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub segment: usize,
    pub offset: u64,
    pub len: u64,
    /// Index of the first block covered
    pub first_block: usize,
    pub block_count: usize,
}

/// Everything the reader and stitch engine need to know about a query's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub ranges: Vec<ByteRange>,
    pub total_bytes: u64,
    /// Upper bound on the samples held by the planned blocks
    pub total_samples: i64,
    pub total_blocks: usize,
    /// Absolute sample number of the first planned block
    pub first_block_sample: i64,
}

impl FetchPlan {
    /// Plan the reads for `span`
    pub fn build(channel: &Channel, span: &BlockSpan) -> ReadResult<Self> {
        let mut plan = Self {
            ranges: Vec::new(),
            total_bytes: 0,
            total_samples: 0,
            total_blocks: 0,
            first_block_sample: channel.segments[span.start_segment]
                .block_start_sample(span.start_block),
        };

        if span.is_single_segment() {
            plan.push(channel, span.start_segment, span.start_block, span.end_block)?;
        } else {
            let first = &channel.segments[span.start_segment];
            plan.push(
                channel,
                span.start_segment,
                span.start_block,
                first.index.len() - 1,
            )?;

            for segment in (span.start_segment + 1)..span.end_segment {
                let blocks = channel.segments[segment].index.len();
                if blocks == 0 {
                    tracing::debug!("Segment {} holds no blocks; nothing to fetch", segment);
                    continue;
                }
                plan.push(channel, segment, 0, blocks - 1)?;
            }

            plan.push(channel, span.end_segment, 0, span.end_block)?;
        }

        tracing::debug!(
            ranges = plan.ranges.len(),
            total_bytes = plan.total_bytes,
            total_samples = plan.total_samples,
            total_blocks = plan.total_blocks,
            "Planned fetch"
        );
        Ok(plan)
    }

    /// Plan blocks `first..=last` of `segment`
    fn push(
        &mut self,
        channel: &Channel,
        segment_idx: usize,
        first: usize,
        last: usize,
    ) -> ReadResult<()> {
        let segment = &channel.segments[segment_idx];
        let index = &segment.index;
        if index.is_empty() {
            return Err(ReadError::EmptySegment {
                segment: segment_idx,
            });
        }

        let corrupt = |block: usize, reason: String| ReadError::IndexCorruption {
            segment: segment_idx,
            block,
            reason,
        };

        for (block, record) in index.iter().enumerate().take(last + 1).skip(first) {
            if record.file_offset < UNIVERSAL_HEADER_BYTES as u64 {
                return Err(corrupt(
                    block,
                    format!(
                        "file offset {} lies inside the {}-byte header",
                        record.file_offset, UNIVERSAL_HEADER_BYTES
                    ),
                ));
            }
        }

        let start = index[first];
        let (end_offset, end_sample) = match index.get(last + 1) {
            Some(next) => (next.file_offset, next.start_sample),
            None => (segment.data.len(), segment.number_of_samples),
        };

        if end_offset < start.file_offset || end_offset > segment.data.len() {
            return Err(corrupt(
                last,
                format!(
                    "block data [{}, {}) does not fit in a {}-byte file",
                    start.file_offset,
                    end_offset,
                    segment.data.len()
                ),
            ));
        }

        let range = ByteRange {
            segment: segment_idx,
            offset: start.file_offset,
            len: end_offset - start.file_offset,
            first_block: first,
            block_count: last - first + 1,
        };
        self.total_bytes += range.len;
        self.total_samples += end_sample - start.start_sample;
        self.total_blocks += range.block_count;
        self.ranges.push(range);
        Ok(())
    }

    /// Map the `ordinal`-th planned block to its `(segment, block index)`
    pub fn block_location(&self, ordinal: usize) -> (usize, usize) {
        let mut remaining = ordinal;
        for range in &self.ranges {
            if remaining < range.block_count {
                return (range.segment, range.first_block + remaining);
            }
            remaining -= range.block_count;
        }
        match self.ranges.last() {
            Some(range) => (range.segment, range.first_block + range.block_count + remaining),
            None => (0, ordinal),
        }
    }
}
