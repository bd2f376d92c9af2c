//! The full build pipeline.
//!
//! ```text
//! documents -> PartialIndexBuilder (per shard, parallel) -> partial files
//!           -> ShardMerger (fork/join) -> merged file
//!           -> IndexSplitter -> blocks + dictionary + completion lists
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::build::merger::ShardMerger;
use crate::build::partial::{PartialIndexBuilder, ShardOutput};
use crate::build::splitter::IndexSplitter;
use crate::config::IndexConfig;
use crate::corpus::assign_document_ids;
use crate::document::{Document, DocumentMap, PageRankTable, RawDocument};
use crate::error::{BlockdexError, Result};
use crate::storage::IndexDirectory;

/// Result of a completed build.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    /// Documents present in the index.
    pub documents_indexed: usize,
    /// Documents rejected during shard building.
    pub documents_skipped: usize,
    /// Token occurrences across indexed documents.
    pub total_term_frequency: u64,
    /// Partial index files produced and merged.
    pub partial_files: usize,
    /// Block files written.
    pub blocks_written: usize,
    /// Distinct terms written.
    pub terms_written: usize,
    /// Wall-clock duration of the build.
    pub elapsed: Duration,
}

/// Builds a block index from a document corpus.
#[derive(Debug)]
pub struct IndexBuilder {
    config: IndexConfig,
    directory: IndexDirectory,
    thread_pool: Arc<ThreadPool>,
}

impl IndexBuilder {
    /// Create a builder, creating the index directory if needed.
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let directory = IndexDirectory::create(&config.index_dir)?;

        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("index-build-{i}"))
            .build()
            .map_err(|e| BlockdexError::internal(format!("Failed to create thread pool: {e}")))?;

        Ok(IndexBuilder {
            config,
            directory,
            thread_pool: Arc::new(thread_pool),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Get the index directory.
    pub fn directory(&self) -> &IndexDirectory {
        &self.directory
    }

    /// Assign document ids, then build.
    pub fn build_from_raw(
        &self,
        raw: Vec<RawDocument>,
        page_ranks: &PageRankTable,
    ) -> Result<BuildSummary> {
        let docs_per_shard = self.config.docs_per_shard;
        let documents = self
            .thread_pool
            .install(|| assign_document_ids(raw, docs_per_shard));
        self.build(documents, page_ranks)
    }

    /// Build the index for `documents`, replacing any previous index.
    ///
    /// Every document needs a positive, unique id and a PageRank score;
    /// otherwise nothing is written.
    pub fn build(
        &self,
        mut documents: Vec<Document>,
        page_ranks: &PageRankTable,
    ) -> Result<BuildSummary> {
        let start = Instant::now();

        documents.sort_by_key(|doc| doc.id);
        if documents.first().is_some_and(|doc| doc.id == 0) {
            return Err(BlockdexError::index("document id 0 is reserved"));
        }
        if let Some(pair) = documents.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(BlockdexError::index(format!(
                "document id {} is assigned twice",
                pair[0].id
            )));
        }
        page_ranks.ensure_covers(&documents)?;

        let partials_dir = self.directory.partials_dir();
        let stale = self.directory.clear_dir(&partials_dir)?;
        if stale > 0 {
            log::debug!("removed {stale} stale partial files");
        }

        log::info!(
            "indexing {} documents in shards of {} on {} threads",
            documents.len(),
            self.config.docs_per_shard,
            self.thread_pool.current_num_threads()
        );
        let outputs = self.build_shards(&documents, page_ranks)?;

        let mut summary = BuildSummary {
            partial_files: outputs.len(),
            ..Default::default()
        };
        let mut document_map = DocumentMap::new();
        let mut files: Vec<PathBuf> = Vec::with_capacity(outputs.len());
        for output in outputs {
            summary.documents_indexed += output.stats.documents_indexed;
            summary.documents_skipped += output.stats.documents_skipped;
            summary.total_term_frequency += output.stats.tokens_indexed;
            document_map.extend(output.documents);
            files.push(output.path);
        }

        let merger = ShardMerger::with_thread_pool(self.directory.clone(), Arc::clone(&self.thread_pool));
        let (merged, _) = merger.merge_all(files)?;

        let split = IndexSplitter::new(self.directory.clone(), &self.config).split(&merged)?;
        document_map.save(&self.directory.document_map_path())?;
        summary.blocks_written = split.blocks_written;
        summary.terms_written = split.terms_written;
        summary.elapsed = start.elapsed();

        log::info!(
            "built index of {} documents ({} skipped) in {:?}",
            summary.documents_indexed,
            summary.documents_skipped,
            summary.elapsed
        );
        Ok(summary)
    }

    fn build_shards(
        &self,
        documents: &[Document],
        page_ranks: &PageRankTable,
    ) -> Result<Vec<ShardOutput>> {
        let docs_per_shard = self.config.docs_per_shard;
        let directory = &self.directory;

        self.thread_pool.install(|| {
            documents
                .par_chunks(docs_per_shard)
                .enumerate()
                .map(|(shard, docs)| {
                    let mut builder = PartialIndexBuilder::new(shard);
                    builder.index_documents(docs, page_ranks)?;
                    builder.flush(directory)
                })
                .collect::<Result<Vec<_>>>()
        })
    }
}
