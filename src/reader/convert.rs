//! Time/sample conversion
//!
//! Maps absolute timestamps to absolute sample numbers and back by anchoring on the nearest
//! preceding block index record and extrapolating at the channel's nominal frequency. Never
//! fails: values outside the stored range are extrapolated from the closest anchor, saturating
//! at the `i64` limits.

use crate::format::Channel;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Number of samples spanned by `duration_us` at `frequency`, rounded to nearest
pub fn samples_in(duration_us: i64, frequency: f64) -> i64 {
    (duration_us as f64 / MICROS_PER_SECOND * frequency).round() as i64
}

/// Duration in µs of `samples` samples at `frequency`, rounded to nearest
pub fn duration_of(samples: i64, frequency: f64) -> i64 {
    (samples as f64 / frequency * MICROS_PER_SECOND).round() as i64
}

/// Absolute sample number at `time`
pub fn sample_for_time(channel: &Channel, time: i64) -> i64 {
    let (anchor_sample, anchor_time) = find_anchor(channel, |_, record_time| record_time > time);
    anchor_sample.saturating_add(samples_in(
        time.saturating_sub(anchor_time),
        channel.sampling_frequency,
    ))
}

/// Absolute time (µs) of sample number `sample`
pub fn time_for_sample(channel: &Channel, sample: i64) -> i64 {
    let (anchor_sample, anchor_time) =
        find_anchor(channel, |record_sample, _| record_sample > sample);
    anchor_time.saturating_add(duration_of(
        sample.saturating_sub(anchor_sample),
        channel.sampling_frequency,
    ))
}

/// Walk index records in channel order and return the last `(absolute sample, time)` pair
/// seen before `is_past` first holds.
fn find_anchor(channel: &Channel, is_past: impl Fn(i64, i64) -> bool) -> (i64, i64) {
    let mut anchor = match channel.segments.first() {
        Some(first) => (
            first.start_sample,
            first.index.first().map_or(first.start_time, |r| r.start_time),
        ),
        None => (0, channel.earliest_start_time),
    };

    for segment in &channel.segments {
        for record in &segment.index {
            let sample = segment.start_sample + record.start_sample;
            if is_past(sample, record.start_time) {
                return anchor;
            }
            anchor = (sample, record.start_time);
        }
    }
    anchor
}

impl Channel {
    /// See [`sample_for_time`]
    pub fn sample_for_time(&self, time: i64) -> i64 {
        sample_for_time(self, time)
    }

    /// See [`time_for_sample`]
    pub fn time_for_sample(&self, sample: i64) -> i64 {
        time_for_sample(self, sample)
    }
}
