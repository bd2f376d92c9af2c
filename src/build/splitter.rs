//! Partitioning of the merged index into compressed blocks.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::block::{BlockInfo, BlockWriter};
use crate::build::record::{parse_payload, split_record};
use crate::codec::{DeltaVByteCodec, PostingCodec};
use crate::config::IndexConfig;
use crate::error::{BlockdexError, Result};
use crate::posting::PostingList;
use crate::storage::IndexDirectory;

/// Counters for one split run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitStats {
    /// Block files written.
    pub blocks_written: usize,
    /// Terms written across all blocks.
    pub terms_written: usize,
    /// Terms written to the plain-term dictionary.
    pub dictionary_terms: usize,
    /// Completion list files written.
    pub completion_lists: usize,
    /// Total compressed payload bytes.
    pub compressed_bytes: usize,
}

/// Whether a term belongs in the plain-term dictionary.
pub fn is_dictionary_term(term: &str, max_len: usize) -> bool {
    term.len() <= max_len && term.bytes().all(|b| b.is_ascii_alphabetic())
}

fn completion_key(term: &str) -> Option<char> {
    if term.len() > 1 && term.bytes().all(|b| b.is_ascii_lowercase()) {
        term.chars().next()
    } else {
        None
    }
}

/// Streams the merged index into block files.
#[derive(Debug)]
pub struct IndexSplitter<C: PostingCodec = DeltaVByteCodec> {
    directory: IndexDirectory,
    codec: C,
    block_bytes_threshold: usize,
    dictionary_max_term_len: usize,
    write_completion_lists: bool,
}

impl IndexSplitter<DeltaVByteCodec> {
    /// Create a splitter using the default codec.
    pub fn new(directory: IndexDirectory, config: &IndexConfig) -> Self {
        IndexSplitter::with_codec(directory, config, DeltaVByteCodec)
    }
}

impl<C: PostingCodec> IndexSplitter<C> {
    /// Create a splitter using a specific codec.
    pub fn with_codec(directory: IndexDirectory, config: &IndexConfig, codec: C) -> Self {
        IndexSplitter {
            directory,
            codec,
            block_bytes_threshold: config.block_bytes_threshold.max(1),
            dictionary_max_term_len: config.dictionary_max_term_len,
            write_completion_lists: config.write_completion_lists,
        }
    }

    /// Split `merged` into blocks, write the dictionary, then delete `merged`.
    ///
    /// Existing blocks and completion lists are replaced.
    pub fn split(&self, merged: &Path) -> Result<SplitStats> {
        let removed = self.directory.clear_dir(&self.directory.blocks_dir())?
            + self.directory.clear_dir(&self.directory.lookup_dir())?;
        if removed > 0 {
            log::debug!("removed {removed} files of a previous index");
        }

        let input = self.directory.open_input(merged)?;
        let mut dictionary = self
            .directory
            .create_output(&self.directory.dictionary_path())?;
        let mut completions: BTreeMap<char, Vec<String>> = BTreeMap::new();

        let mut stats = SplitStats::default();
        let mut block: Option<BlockWriter> = None;
        let mut previous: Option<String> = None;

        for (line_no, line) in input.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (term, payload) = split_record(&line)?;

            if previous.as_deref().is_some_and(|prev| prev >= term) {
                return Err(BlockdexError::index(format!(
                    "merged index is not sorted at line {}: {term:?}",
                    line_no + 1
                )));
            }

            let flat = parse_payload(payload)?;
            PostingList::from_flat(&flat).map_err(|e| {
                BlockdexError::index(format!("line {} ({term:?}): {e}", line_no + 1))
            })?;
            let compressed = self.codec.encode(&flat);

            let writer = match block.as_mut() {
                Some(writer) => writer,
                None => block.insert(BlockWriter::create(
                    &self.directory,
                    stats.blocks_written,
                    term,
                )?),
            };
            writer.write_record(term, &compressed)?;
            stats.terms_written += 1;

            if writer.compressed_bytes() >= self.block_bytes_threshold {
                if let Some(full) = block.take() {
                    self.close_block(full, &mut stats)?;
                }
            }

            if is_dictionary_term(term, self.dictionary_max_term_len) {
                writeln!(dictionary, "{term}")?;
                stats.dictionary_terms += 1;
            }
            if self.write_completion_lists {
                if let Some(key) = completion_key(term) {
                    completions.entry(key).or_default().push(term.to_string());
                }
            }

            previous = Some(term.to_string());
        }

        if let Some(last) = block.take() {
            self.close_block(last, &mut stats)?;
        }
        dictionary.flush()?;

        for (key, terms) in &completions {
            let path = self.directory.lookup_dir().join(format!("lookup_{key}_.json"));
            let mut out = self.directory.create_output(&path)?;
            serde_json::to_writer(&mut out, terms)?;
            out.flush()?;
            stats.completion_lists += 1;
        }

        self.directory.delete_file(merged)?;
        log::info!(
            "split {} terms into {} blocks ({} compressed bytes)",
            stats.terms_written,
            stats.blocks_written,
            stats.compressed_bytes
        );
        Ok(stats)
    }

    fn close_block(&self, writer: BlockWriter, stats: &mut SplitStats) -> Result<BlockInfo> {
        let info = writer.finish()?;
        log::debug!(
            "closed block {:?} with {} terms and {} bytes",
            info.first_term,
            info.records,
            info.compressed_bytes
        );
        stats.blocks_written += 1;
        stats.compressed_bytes += info.compressed_bytes;
        Ok(info)
    }
}
