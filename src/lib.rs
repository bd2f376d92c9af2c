//! # Blockdex
//!
//! A batch-built, disk-resident inverted index with compressed,
//! block-partitioned postings.
//!
//! ## Features
//!
//! - Parallel per-shard indexing on a bounded worker pool
//! - Fork/join external merge of partial indices
//! - Delta + variable-byte posting compression
//! - Bounded-size block files routed by their first term
//! - Term, phrase and conjunctive queries backed by LRU caches
//! - Ranking that blends term statistics with PageRank
//!
//! ## Example
//!
//! ```no_run
//! use blockdex::prelude::*;
//!
//! # fn main() -> blockdex::error::Result<()> {
//! let config = IndexConfig::new("/tmp/blockdex");
//! let documents = vec![
//!     Document::from_text(1, "http://example.com/a", "new york city"),
//!     Document::from_text(2, "http://example.com/b", "york new"),
//! ];
//! let page_ranks: PageRankTable = [(1u64, 0.6), (2, 0.4)].into_iter().collect();
//!
//! IndexBuilder::new(config.clone())?.build(documents, &page_ranks)?;
//!
//! let mut reader = QueryIndexReader::open(&config)?;
//! let phrase = reader.postings_for_phrase(&["new", "york"])?;
//! assert_eq!(phrase.doc_ids().collect::<Vec<_>>(), vec![1]);
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod build;
pub mod cache;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod corpus;
pub mod document;
pub mod error;
pub mod posting;
pub mod query;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::build::{BuildSummary, IndexBuilder};
    pub use crate::codec::{DeltaVByteCodec, PostingCodec};
    pub use crate::config::IndexConfig;
    pub use crate::document::{Document, DocumentId, DocumentIndexed, PageRankTable};
    pub use crate::error::{BlockdexError, Result};
    pub use crate::posting::{Posting, PostingList};
    pub use crate::query::{Query, QueryIndexReader, QueryRanker, ScoredDocument, SharedIndexReader};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
