//! Query parsing and evaluation against a built index.

pub mod parser;
pub mod phrase;
pub mod ranker;
pub mod reader;

pub use parser::Query;
pub use ranker::{QueryRanker, ScoredDocument};
pub use reader::{QueryIndexReader, ReaderStats, SharedIndexReader};
