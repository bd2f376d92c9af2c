//! Index construction: shard building, merging and block splitting.

pub mod indexer;
pub mod merger;
pub mod partial;
pub mod record;
pub mod splitter;

pub use indexer::{BuildSummary, IndexBuilder};
pub use merger::{MergeStats, ShardMerger};
pub use partial::{PartialIndexBuilder, ShardOutput, ShardStats};
pub use splitter::{IndexSplitter, SplitStats};
