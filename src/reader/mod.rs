//! Range read path
//!
//! Resolves a time or sample interval against a channel and produces the decoded samples
//! covering exactly that interval.
//!
//! ## Stages
//!
//! - [`convert`]: time ↔ sample conversion anchored on the block index
//! - [`query`]: interval validation and resolution
//! - [`locate`]: boundary segments and blocks
//! - [`plan`]: byte ranges to fetch per segment
//! - [`fetch`]: reads planned ranges into one buffer
//! - [`stitch`]: block validation, decode and placement
//! - [`engine`]: the reader tying them together

pub mod convert;
pub mod engine;
pub mod fetch;
pub mod locate;
pub mod plan;
pub mod query;
pub mod stitch;

pub use convert::{sample_for_time, time_for_sample};
pub use engine::{
    read_by_sample, read_by_time, ChannelSource, FailBehavior, ReadOptions, TimeSeriesReader,
};
pub use locate::BlockSpan;
pub use plan::{ByteRange, FetchPlan};
pub use query::{Query, QueryMode, ResolvedQuery};
