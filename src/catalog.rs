//! Routing from terms to block files.
//!
//! Blocks hold disjoint, contiguous term ranges keyed by their first term, so
//! the block that may hold a term is the one with the greatest first term not
//! exceeding it. The catalog is not persisted: it is rebuilt from the headers
//! of the files in the block directory.

use std::path::{Path, PathBuf};

use crate::block::BlockReader;
use crate::error::{BlockdexError, Result};
use crate::storage::{BLOCK_EXTENSION, IndexDirectory};

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// First term held by the block.
    pub first_term: String,
    /// Path of the block file.
    pub path: PathBuf,
}

/// Sorted routing table over block first terms.
#[derive(Debug, Clone, Default)]
pub struct BlockCatalog {
    entries: Vec<CatalogEntry>,
}

impl BlockCatalog {
    /// Build a catalog from entries in any order.
    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Result<Self> {
        entries.sort_by(|a, b| a.first_term.cmp(&b.first_term));
        if let Some(pair) = entries.windows(2).find(|w| w[0].first_term == w[1].first_term) {
            return Err(BlockdexError::index(format!(
                "two blocks start with term {:?}",
                pair[0].first_term
            )));
        }
        Ok(BlockCatalog { entries })
    }

    /// Rebuild the catalog from the block files of an index directory.
    pub fn load(directory: &IndexDirectory) -> Result<Self> {
        let blocks_dir = directory.blocks_dir();
        let mut entries = Vec::new();

        for name in directory.list_files(&blocks_dir)? {
            if !name.ends_with(&format!(".{BLOCK_EXTENSION}")) {
                continue;
            }
            let path = blocks_dir.join(&name);
            let first_term = BlockReader::open(directory, &path)?.first_term().to_string();
            entries.push(CatalogEntry { first_term, path });
        }

        log::debug!("loaded block catalog with {} blocks", entries.len());
        BlockCatalog::from_entries(entries)
    }

    /// The only block that can contain `term`, if any.
    pub fn route(&self, term: &str) -> Option<&Path> {
        let upper = self
            .entries
            .partition_point(|entry| entry.first_term.as_str() <= term);
        upper
            .checked_sub(1)
            .map(|index| self.entries[index].path.as_path())
    }

    /// Entries in ascending key order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog has no blocks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
