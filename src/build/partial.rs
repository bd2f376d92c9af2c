//! Per-shard partial index construction.
//!
//! A [`PartialIndexBuilder`] owns the term table of exactly one shard. It is
//! fed the shard's documents in order and finally flushed to a term-sorted
//! text file that the merger consumes.

use std::io::Write;
use std::path::PathBuf;

use ahash::AHashMap;

use crate::build::record::write_record;
use crate::document::{Document, DocumentIndexed, PageRankTable};
use crate::error::{BlockdexError, Result};
use crate::posting::PostingList;
use crate::storage::IndexDirectory;

/// Counters for one shard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Documents added to the table.
    pub documents_indexed: usize,
    /// Documents rejected and left out of the index.
    pub documents_skipped: usize,
    /// Token occurrences recorded.
    pub tokens_indexed: u64,
    /// Distinct terms in the table.
    pub distinct_terms: usize,
}

/// What a flushed shard leaves behind.
#[derive(Debug)]
pub struct ShardOutput {
    /// Shard number.
    pub shard: usize,
    /// Path of the partial index file.
    pub path: PathBuf,
    /// Metadata of every indexed document.
    pub documents: Vec<DocumentIndexed>,
    /// Shard counters.
    pub stats: ShardStats,
}

/// Builds the in-memory term table of one shard.
#[derive(Debug)]
pub struct PartialIndexBuilder {
    shard: usize,
    table: AHashMap<String, PostingList>,
    documents: Vec<DocumentIndexed>,
    stats: ShardStats,
}

fn validate_tokens(doc: &Document) -> Result<()> {
    for (position, token) in doc.tokens.iter().enumerate() {
        if token.is_empty() {
            return Err(BlockdexError::index(format!(
                "document {} has an empty token at position {position}",
                doc.id
            )));
        }
        if token.chars().any(char::is_whitespace) {
            return Err(BlockdexError::index(format!(
                "document {} has token {token:?} containing whitespace at position {position}",
                doc.id
            )));
        }
    }
    Ok(())
}

impl PartialIndexBuilder {
    /// Create the builder for a shard.
    pub fn new(shard: usize) -> Self {
        PartialIndexBuilder {
            shard,
            table: AHashMap::new(),
            documents: Vec::new(),
            stats: ShardStats::default(),
        }
    }

    /// Add one document's tokens to the table.
    ///
    /// A rejected document leaves the table untouched.
    pub fn process_document(&mut self, doc: &Document, page_rank: f32) -> Result<()> {
        validate_tokens(doc)?;

        for (position, token) in doc.tokens.iter().enumerate() {
            match self.table.get_mut(token.as_str()) {
                Some(postings) => postings.add_occurrence(doc.id, position as u64),
                None => {
                    let mut postings = PostingList::new();
                    postings.add_occurrence(doc.id, position as u64);
                    self.table.insert(token.clone(), postings);
                }
            }
        }

        self.documents.push(DocumentIndexed {
            id: doc.id,
            url: doc.url.clone(),
            title: doc.title.clone(),
            size: doc.tokens.len() as u64,
            page_rank,
        });
        self.stats.documents_indexed += 1;
        self.stats.tokens_indexed += doc.tokens.len() as u64;
        Ok(())
    }

    /// Process every document of the shard, skipping the ones that fail.
    ///
    /// A document without a PageRank score aborts the shard: the score table
    /// is required to be complete before the build starts.
    pub fn index_documents(&mut self, docs: &[Document], page_ranks: &PageRankTable) -> Result<()> {
        for doc in docs {
            let page_rank = page_ranks.get(doc.id).ok_or_else(|| {
                BlockdexError::invalid_config(format!("missing PageRank score for document {}", doc.id))
            })?;

            if let Err(e) = self.process_document(doc, page_rank) {
                log::warn!(
                    "shard {}: skipping document {} ({}): {e}",
                    self.shard,
                    doc.id,
                    doc.url
                );
                self.stats.documents_skipped += 1;
            }
        }
        Ok(())
    }

    /// Number of distinct terms in the table.
    pub fn term_count(&self) -> usize {
        self.table.len()
    }

    /// Postings collected so far for a term.
    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.table.get(term)
    }

    /// Write the table sorted by term and release it.
    pub fn flush(self, directory: &IndexDirectory) -> Result<ShardOutput> {
        let path = directory.partial_path(self.shard);
        let mut out = directory.create_output(&path)?;

        let mut terms: Vec<(&String, &PostingList)> = self.table.iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));

        for (term, postings) in &terms {
            write_record(&mut out, term, &postings.to_flat())?;
        }
        out.flush()?;

        let mut stats = self.stats;
        stats.distinct_terms = terms.len();
        log::debug!(
            "shard {} flushed {} terms from {} documents to {}",
            self.shard,
            stats.distinct_terms,
            stats.documents_indexed,
            path.display()
        );

        Ok(ShardOutput {
            shard: self.shard,
            path,
            documents: self.documents,
            stats,
        })
    }
}
