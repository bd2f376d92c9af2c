//! Configuration for index construction and serving.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BlockdexError, Result};

/// Tunables for building and reading a block index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Root directory holding every index artifact.
    pub index_dir: PathBuf,

    /// Compressed bytes written to a block before it is closed.
    pub block_bytes_threshold: usize,

    /// Number of documents handled by one build worker.
    pub docs_per_shard: usize,

    /// Worker pool size for the build and merge phases.
    /// If None, uses the number of CPU cores.
    pub worker_threads: Option<usize>,

    /// Capacity of the decoded term cache.
    pub token_cache_capacity: usize,

    /// Capacity of the phrase cache.
    pub phrase_cache_capacity: usize,

    /// Longest term written to the plain-term dictionary.
    pub dictionary_max_term_len: usize,

    /// Whether to write per-letter completion lists.
    pub write_completion_lists: bool,

    /// Number of ranked queries whose results are kept.
    pub query_cache_capacity: usize,

    /// Document share above which a query term is treated as a stop term
    /// when ranking. If None, no term is dropped.
    pub stop_term_ratio: Option<f64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            index_dir: PathBuf::from("index"),
            block_bytes_threshold: 1024 * 1024, // 1MB
            docs_per_shard: 1000,
            worker_threads: None,
            token_cache_capacity: 10,
            phrase_cache_capacity: 3,
            dictionary_max_term_len: 20,
            write_completion_lists: true,
            query_cache_capacity: 10,
            stop_term_ratio: Some(0.5),
        }
    }
}

impl IndexConfig {
    /// Create a configuration rooted at the given directory.
    pub fn new<P: Into<PathBuf>>(index_dir: P) -> Self {
        IndexConfig {
            index_dir: index_dir.into(),
            ..Default::default()
        }
    }

    /// Set the block byte threshold.
    pub fn with_block_bytes_threshold(mut self, bytes: usize) -> Self {
        self.block_bytes_threshold = bytes;
        self
    }

    /// Set the shard size.
    pub fn with_docs_per_shard(mut self, docs: usize) -> Self {
        self.docs_per_shard = docs;
        self
    }

    /// Set the worker pool size.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Set the term and phrase cache capacities.
    pub fn with_cache_capacities(mut self, tokens: usize, phrases: usize) -> Self {
        self.token_cache_capacity = tokens;
        self.phrase_cache_capacity = phrases;
        self
    }

    /// Set the ranked query cache capacity.
    pub fn with_query_cache_capacity(mut self, queries: usize) -> Self {
        self.query_cache_capacity = queries;
        self
    }

    /// Set the stop term ratio used when ranking; None keeps every term.
    pub fn with_stop_term_ratio(mut self, ratio: Option<f64>) -> Self {
        self.stop_term_ratio = ratio;
        self
    }

    /// Enable or disable completion lists.
    pub fn with_completion_lists(mut self, enabled: bool) -> Self {
        self.write_completion_lists = enabled;
        self
    }

    /// Effective worker pool size.
    pub fn worker_count(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Check that every tunable is usable.
    pub fn validate(&self) -> Result<()> {
        if self.block_bytes_threshold == 0 {
            return Err(BlockdexError::invalid_config(
                "block_bytes_threshold must be greater than zero",
            ));
        }
        if self.docs_per_shard == 0 {
            return Err(BlockdexError::invalid_config(
                "docs_per_shard must be greater than zero",
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(BlockdexError::invalid_config(
                "worker_threads must be greater than zero",
            ));
        }
        if self.token_cache_capacity == 0
            || self.phrase_cache_capacity == 0
            || self.query_cache_capacity == 0
        {
            return Err(BlockdexError::invalid_config(
                "cache capacities must be greater than zero",
            ));
        }
        if let Some(ratio) = self.stop_term_ratio {
            if ratio.is_nan() || ratio < 0.0 {
                return Err(BlockdexError::invalid_config(format!(
                    "stop_term_ratio must be a non-negative number, got {ratio}"
                )));
            }
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: IndexConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
