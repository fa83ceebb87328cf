//! Block decode and stitch
//!
//! Walks the fetched buffer block by block, validating each block before it is decoded, and
//! places the decoded samples at their position in the caller's output.
//!
//! The first and last planned blocks may straddle the query window, so they are decoded into
//! a scratch buffer and clipped on copy. Middle blocks normally decode straight into the
//! output. In time mode every block's position comes from its own header start time, which
//! is what lets gaps between segments stay filled with the sentinel.

use crate::error::{BlockFault, ReadError, ReadResult};
use crate::format::{decode_block, validate_block, BlockHeader, Channel};
use crate::reader::convert::{duration_of, samples_in};
use crate::reader::plan::FetchPlan;
use crate::reader::query::{QueryMode, ResolvedQuery};

/// Position within the fetched buffer
#[derive(Debug)]
pub struct BlockCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    max_samples: u32,
}

/// A block that passed validation
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    pub header: BlockHeader,
    pub bytes: &'a [u8],
}

impl<'a> BlockCursor<'a> {
    pub fn new(buf: &'a [u8], max_samples: u32) -> Self {
        Self {
            buf,
            pos: 0,
            max_samples,
        }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Validate the block at the cursor and step past it
    pub fn next_block(&mut self) -> Result<BlockView<'a>, BlockFault> {
        let rest = &self.buf[self.pos..];
        let header = validate_block(rest, self.max_samples)?;
        let len = header.block_bytes as usize;
        self.pos += len;
        Ok(BlockView {
            header,
            bytes: &rest[..len],
        })
    }
}

impl BlockView<'_> {
    pub fn number_of_samples(&self) -> usize {
        self.header.number_of_samples as usize
    }

    pub fn decode_into(&self, out: &mut [i32]) -> ReadResult<usize> {
        decode_block(self.bytes, out)
    }
}

/// Copy `samples` into `out` as if the first sample sat at output index `start`, dropping
/// whatever falls outside `out`. Returns the index one past the last sample.
pub fn copy_clipped(samples: &[i32], start: i64, out: &mut [i32]) -> i64 {
    let end = start + samples.len() as i64;
    let from = start.max(0).min(out.len() as i64);
    let to = end.max(0).min(out.len() as i64);
    if from < to {
        let skip = (from - start) as usize;
        let count = (to - from) as usize;
        out[from as usize..to as usize].copy_from_slice(&samples[skip..skip + count]);
    }
    end
}

/// Which of the planned blocks is being placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    First,
    Middle,
    Last,
}

/// Decode every planned block from `data` into `out`, which must hold exactly the query's
/// sample count. Returns the number of samples in `out`.
pub fn stitch(
    data: &[u8],
    plan: &FetchPlan,
    channel: &Channel,
    query: &ResolvedQuery,
    sentinel: i32,
    out: &mut [i32],
) -> ReadResult<usize> {
    if query.mode == QueryMode::Time {
        out.fill(sentinel);
    }

    let mut cursor = BlockCursor::new(data, channel.maximum_block_samples);
    let mut scratch = vec![0i32; channel.maximum_block_samples as usize];
    let mut running = plan.first_block_sample - query.start_sample;
    let mut skipped = 0usize;

    for ordinal in 0..plan.total_blocks {
        let role = match ordinal {
            0 => Role::First,
            n if n + 1 == plan.total_blocks => Role::Last,
            _ => Role::Middle,
        };

        let block = cursor.next_block().map_err(|fault| {
            let (segment, block) = plan.block_location(ordinal);
            ReadError::BlockIntegrity {
                segment,
                block,
                fault,
            }
        })?;
        let count = block.number_of_samples();

        let offset = match query.mode {
            QueryMode::Sample => running,
            QueryMode::Time => {
                let block_time = channel.time_offset.remove(block.header.start_time);
                if role == Role::Middle {
                    let block_end =
                        block_time + duration_of(count as i64, channel.sampling_frequency);
                    if block_time < query.start_time || block_end > query.end_time {
                        skipped += 1;
                        running += count as i64;
                        continue;
                    }
                }
                samples_in(block_time - query.start_time, channel.sampling_frequency)
            }
        };

        let fits = offset >= 0 && offset + count as i64 <= out.len() as i64;
        if role == Role::Middle && fits {
            let start = offset as usize;
            block.decode_into(&mut out[start..start + count])?;
        } else {
            let decoded = block.decode_into(&mut scratch)?;
            copy_clipped(&scratch[..decoded], offset, out);
        }
        running += count as i64;
    }

    if skipped > 0 {
        tracing::debug!(
            "Left {} middle blocks outside the query window as sentinel",
            skipped
        );
    }
    tracing::trace!(
        "Stitched {} blocks ({} compressed bytes) into {} samples",
        plan.total_blocks,
        cursor.offset(),
        out.len()
    );

    Ok(out.len())
}
