//! Planned reads
//!
//! Reads every range of a [`FetchPlan`] into one contiguous buffer. Segment handles are opened
//! lazily on first use.

use crate::error::{ReadError, ReadResult};
use crate::format::Channel;
use crate::reader::plan::FetchPlan;

/// What to do with a segment's data file handle after reading from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlePolicy {
    /// Leave handles open for later reads on the same channel
    Keep,
    /// Close each handle once its range has been read
    CloseAfterRead,
}

/// Read the planned byte ranges, in order, into a single buffer
pub fn fetch(channel: &mut Channel, plan: &FetchPlan, policy: HandlePolicy) -> ReadResult<Vec<u8>> {
    let mut buf = vec![0u8; plan.total_bytes as usize];
    let mut filled = 0usize;

    for range in &plan.ranges {
        let len = range.len as usize;
        let data = &mut channel.segments[range.segment].data;
        let read = data.read_at(range.offset, &mut buf[filled..filled + len]);
        if policy == HandlePolicy::CloseAfterRead {
            data.close();
        }

        let read = read?;
        if read != len {
            return Err(ReadError::ShortRead {
                segment: range.segment,
                expected: range.len,
                actual: read as u64,
            });
        }

        tracing::trace!(
            "Read {} bytes at offset {} of segment {}",
            len,
            range.offset,
            range.segment
        );
        filled += len;
    }

    Ok(buf)
}
