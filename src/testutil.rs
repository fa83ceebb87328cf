//! Channel fixtures for tests
//!
//! Writes small channels to disk in which every sample's value equals its absolute sample
//! index, so read results can be checked by value.

use crate::format::block::encode_block;
use crate::format::channel::{
    Channel, Segment, SegmentFile, DATA_FILE_EXTENSION, INDEX_FILE_EXTENSION,
    SEGMENT_DIR_EXTENSION,
};
use crate::format::header::{SegmentHeader, DATA_VERSION, FLAG_ENCRYPTED, UNIVERSAL_HEADER_BYTES};
use crate::format::index::{index_header_bytes, BlockIndexRecord};
use crate::format::time::RecordingTimeOffset;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Start time of the first segment in every fixture (µs)
pub const T0: i64 = 1_533_749_749_914_432;

pub struct ChannelFixture {
    frequency: f64,
    segments: usize,
    blocks_per_segment: usize,
    samples_per_block: usize,
    segment_gap_us: i64,
    time_offset: RecordingTimeOffset,
    flags: u16,
}

pub struct WrittenSegment {
    pub data_path: PathBuf,
    pub block_offsets: Vec<u64>,
}

pub struct WrittenChannel {
    pub path: PathBuf,
    pub segments: Vec<WrittenSegment>,
}

impl ChannelFixture {
    /// Segments back to back in time and sample number
    pub fn contiguous(
        frequency: f64,
        segments: usize,
        blocks_per_segment: usize,
        samples_per_block: usize,
    ) -> Self {
        Self {
            frequency,
            segments,
            blocks_per_segment,
            samples_per_block,
            segment_gap_us: 0,
            time_offset: RecordingTimeOffset::none(),
            flags: 0,
        }
    }

    /// Leave `gap_us` microseconds without data before every segment after the first
    pub fn with_segment_gap(mut self, gap_us: i64) -> Self {
        self.segment_gap_us = gap_us;
        self
    }

    pub fn with_time_offset(mut self, offset: i64) -> Self {
        self.time_offset = RecordingTimeOffset::new(offset);
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.flags |= FLAG_ENCRYPTED;
        self
    }

    fn block_duration_us(&self) -> i64 {
        (self.samples_per_block as f64 / self.frequency * 1e6).round() as i64
    }

    fn segment_start_time(&self, seg: usize) -> i64 {
        let segment_duration = self.block_duration_us() * self.blocks_per_segment as i64;
        T0 + seg as i64 * (segment_duration + self.segment_gap_us)
    }

    pub fn write(&self, root: &Path) -> WrittenChannel {
        let channel_path = root.join("fixture.timd");
        std::fs::create_dir_all(&channel_path).unwrap();

        let samples_per_segment = self.blocks_per_segment * self.samples_per_block;
        let mut written = Vec::with_capacity(self.segments);

        for seg in 0..self.segments {
            let name = format!("fixture-{:06}", seg);
            let seg_dir = channel_path.join(format!("{}.{}", name, SEGMENT_DIR_EXTENSION));
            std::fs::create_dir_all(&seg_dir).unwrap();

            let start_sample = (seg * samples_per_segment) as i64;
            let start_time = self.segment_start_time(seg);

            let mut body = Vec::new();
            let mut records = Vec::with_capacity(self.blocks_per_segment);
            for block in 0..self.blocks_per_segment {
                let rel_sample = (block * self.samples_per_block) as i64;
                let block_time = start_time + self.block_duration_us() * block as i64;
                let samples: Vec<i32> = (0..self.samples_per_block)
                    .map(|i| (start_sample + rel_sample + i as i64) as i32)
                    .collect();

                let offset = (UNIVERSAL_HEADER_BYTES + body.len()) as u64;
                records.push(BlockIndexRecord::new(block_time, rel_sample, offset));
                body.extend_from_slice(&encode_block(
                    &samples,
                    self.time_offset.apply(block_time),
                ));
            }

            let header = SegmentHeader {
                version: DATA_VERSION,
                flags: self.flags,
                start_time: self.time_offset.apply(start_time),
                end_time: self
                    .time_offset
                    .apply(start_time + self.block_duration_us() * self.blocks_per_segment as i64),
                start_sample,
                number_of_samples: samples_per_segment as i64,
                sampling_frequency: self.frequency,
                maximum_block_samples: self.samples_per_block as u32,
                number_of_blocks: self.blocks_per_segment as u32,
                recording_time_offset: self.time_offset.value(),
            };

            let data_path = seg_dir.join(format!("{}.{}", name, DATA_FILE_EXTENSION));
            let mut data = std::fs::File::create(&data_path).unwrap();
            data.write_all(&header.to_bytes()).unwrap();
            data.write_all(&body).unwrap();

            let area: Vec<u8> = records
                .iter()
                .flat_map(|r| r.to_bytes(self.time_offset))
                .collect();
            let index_path = seg_dir.join(format!("{}.{}", name, INDEX_FILE_EXTENSION));
            let mut index = std::fs::File::create(&index_path).unwrap();
            index.write_all(&index_header_bytes(&area)).unwrap();
            index.write_all(&area).unwrap();

            written.push(WrittenSegment {
                data_path,
                block_offsets: records.iter().map(|r| r.file_offset).collect(),
            });
        }

        WrittenChannel {
            path: channel_path,
            segments: written,
        }
    }

    /// Same layout as [`ChannelFixture::write`] but kept in memory with no backing files,
    /// for code that never touches the data.
    pub fn in_memory(&self) -> Channel {
        let samples_per_segment = (self.blocks_per_segment * self.samples_per_block) as i64;
        let segments = (0..self.segments)
            .map(|seg| {
                let start_time = self.segment_start_time(seg);
                let index = (0..self.blocks_per_segment)
                    .map(|block| {
                        BlockIndexRecord::new(
                            start_time + self.block_duration_us() * block as i64,
                            (block * self.samples_per_block) as i64,
                            (UNIVERSAL_HEADER_BYTES + block * 400) as u64,
                        )
                    })
                    .collect();
                Segment {
                    start_sample: seg as i64 * samples_per_segment,
                    number_of_samples: samples_per_segment,
                    start_time,
                    end_time: start_time
                        + self.block_duration_us() * self.blocks_per_segment as i64,
                    maximum_block_samples: self.samples_per_block as u32,
                    index,
                    data: SegmentFile::new(
                        format!("/nonexistent/seg{}.tdat", seg),
                        (UNIVERSAL_HEADER_BYTES + self.blocks_per_segment * 400) as u64,
                    ),
                }
            })
            .collect();

        Channel::new("/nonexistent", self.frequency, segments, self.time_offset).unwrap()
    }
}
