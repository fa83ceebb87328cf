//! Range queries
//!
//! A query names its interval either in time or in samples. It is resolved once against the
//! channel into a [`ResolvedQuery`] carrying both representations, so later stages never
//! branch on which one the caller used except where placement rules differ.

use crate::error::{ReadError, ReadResult};
use crate::format::Channel;
use crate::reader::convert::{sample_for_time, samples_in, time_for_sample};

/// Half-open interval to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// `[start, end)` in absolute µs
    ByTime { start: i64, end: i64 },
    /// `[start, end)` in absolute sample numbers
    BySample { start: i64, end: i64 },
}

/// Which representation the caller specified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Time,
    Sample,
}

/// A query with both representations filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub mode: QueryMode,
    pub start_time: i64,
    pub end_time: i64,
    pub start_sample: i64,
    pub end_sample: i64,
    /// Number of output samples the caller receives
    pub num_samples: usize,
}

impl Query {
    pub fn mode(&self) -> QueryMode {
        match self {
            Query::ByTime { .. } => QueryMode::Time,
            Query::BySample { .. } => QueryMode::Sample,
        }
    }

    fn bounds(&self) -> (i64, i64) {
        match *self {
            Query::ByTime { start, end } | Query::BySample { start, end } => (start, end),
        }
    }

    /// Reject intervals that are empty or reversed
    pub fn validate(&self) -> ReadResult<()> {
        let (start, end) = self.bounds();
        if start >= end {
            return Err(ReadError::InvalidRange { start, end });
        }
        Ok(())
    }

    /// Resolve against `channel`.
    ///
    /// Intervals entirely outside the stored data fail. Partial overlap is allowed: time
    /// queries keep their bounds (the uncovered part reads as the sentinel), sample queries
    /// are clamped to the stored samples.
    pub fn resolve(&self, channel: &Channel) -> ReadResult<ResolvedQuery> {
        self.validate()?;

        match *self {
            Query::ByTime { start, end } => {
                let first = channel.earliest_start_time;
                let last = channel.latest_end_time;
                if (start < first && end < first) || (start > last && end > last) {
                    return Err(ReadError::OutsideFile {
                        start,
                        end,
                        first,
                        last,
                    });
                }
                if end > last {
                    tracing::warn!(
                        "End time {} is later than the latest end time {}; gap will read as sentinel",
                        end,
                        last
                    );
                }
                if start < first {
                    tracing::warn!(
                        "Start time {} is earlier than the earliest start time {}; gap will read as sentinel",
                        start,
                        first
                    );
                }

                // Bounds far enough apart to overflow the span cannot name a readable range
                let span = end
                    .checked_sub(start)
                    .ok_or(ReadError::InvalidRange { start, end })?;
                let num_samples = samples_in(span, channel.sampling_frequency).max(0);
                Ok(ResolvedQuery {
                    mode: QueryMode::Time,
                    start_time: start,
                    end_time: end,
                    start_sample: sample_for_time(channel, start),
                    end_sample: sample_for_time(channel, end),
                    num_samples: num_samples as usize,
                })
            }
            Query::BySample { start, end } => {
                let total = channel.number_of_samples;
                if (start < 0 && end < 0) || (start > total && end > total) {
                    return Err(ReadError::OutsideFile {
                        start,
                        end,
                        first: 0,
                        last: total,
                    });
                }

                let mut start_sample = start;
                let mut end_sample = end;
                if end_sample > total {
                    tracing::warn!(
                        "End sample {} is past the {} samples in the channel; clamping",
                        end_sample,
                        total
                    );
                    end_sample = total;
                }
                if start_sample < 0 {
                    tracing::warn!("Start sample {} is negative; clamping to 0", start_sample);
                    start_sample = 0;
                }
                if start_sample >= end_sample {
                    return Err(ReadError::OutsideFile {
                        start,
                        end,
                        first: 0,
                        last: total,
                    });
                }

                Ok(ResolvedQuery {
                    mode: QueryMode::Sample,
                    start_time: time_for_sample(channel, start_sample),
                    end_time: time_for_sample(channel, end_sample),
                    start_sample,
                    end_sample,
                    num_samples: (end_sample - start_sample) as usize,
                })
            }
        }
    }
}
