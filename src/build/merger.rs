//! External merge of partial index files.
//!
//! Partial files are merged by recursive halving: both halves of the file
//! list are merged concurrently on the worker pool, then the two results are
//! combined by one streaming two-way merge. Every intermediate file is
//! written fresh and its inputs are deleted once consumed.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::build::record::{parse_payload, payload_doc_range, split_record, write_raw_record};
use crate::error::{BlockdexError, Result};
use crate::posting::PostingList;
use crate::storage::IndexDirectory;

/// Statistics about a merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Partial files consumed.
    pub inputs: usize,
    /// Two-way merges performed.
    pub pairwise_merges: u64,
    /// Terms present in both inputs of a two-way merge.
    pub terms_combined: u64,
    /// Combined terms whose document ranges interleaved.
    pub interleaved_terms: u64,
}

/// Merges sorted partial index files into the single merged index.
#[derive(Debug)]
pub struct ShardMerger {
    directory: IndexDirectory,
    thread_pool: Arc<ThreadPool>,
    sequence: AtomicU64,
    pairwise_merges: AtomicU64,
    terms_combined: AtomicU64,
    interleaved_terms: AtomicU64,
}

/// Line cursor over one sorted index file.
struct RecordCursor {
    lines: Lines<BufReader<File>>,
    current: Option<String>,
}

impl RecordCursor {
    fn open(directory: &IndexDirectory, path: &Path) -> Result<Self> {
        let mut cursor = RecordCursor {
            lines: directory.open_input(path)?.lines(),
            current: None,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lines.next().transpose()?;
        Ok(())
    }
}

impl ShardMerger {
    /// Create a merger with its own pool of `worker_threads` threads.
    pub fn new(directory: IndexDirectory, worker_threads: usize) -> Result<Self> {
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads.max(1))
            .thread_name(|i| format!("shard-merge-{i}"))
            .build()
            .map_err(|e| BlockdexError::internal(format!("Failed to create thread pool: {e}")))?;

        Ok(ShardMerger::with_thread_pool(directory, Arc::new(thread_pool)))
    }

    /// Create a merger sharing an existing pool.
    pub fn with_thread_pool(directory: IndexDirectory, thread_pool: Arc<ThreadPool>) -> Self {
        ShardMerger {
            directory,
            thread_pool,
            sequence: AtomicU64::new(0),
            pairwise_merges: AtomicU64::new(0),
            terms_combined: AtomicU64::new(0),
            interleaved_terms: AtomicU64::new(0),
        }
    }

    /// Merge every partial file into the merged index and return its path.
    ///
    /// Partial files must be ordered so that earlier files hold lower
    /// document ids. All inputs are deleted. The returned stats cover this
    /// call only.
    pub fn merge_all(&self, files: Vec<PathBuf>) -> Result<(PathBuf, MergeStats)> {
        let inputs = files.len();
        let target = self.directory.merged_index_path();
        for counter in [&self.pairwise_merges, &self.terms_combined, &self.interleaved_terms] {
            counter.store(0, Ordering::Relaxed);
        }

        if files.is_empty() {
            self.directory.create_output(&target)?.flush()?;
        } else {
            log::info!(
                "merging {inputs} partial indices on {} threads",
                self.thread_pool.current_num_threads()
            );
            let merged = self.thread_pool.install(|| self.merge_recursive(files))?;
            self.directory.rename_file(&merged, &target)?;
        }

        let stats = MergeStats {
            inputs,
            pairwise_merges: self.pairwise_merges.load(Ordering::Relaxed),
            terms_combined: self.terms_combined.load(Ordering::Relaxed),
            interleaved_terms: self.interleaved_terms.load(Ordering::Relaxed),
        };
        log::info!("merged index written to {} ({stats:?})", target.display());
        Ok((target, stats))
    }

    fn merge_recursive(&self, mut files: Vec<PathBuf>) -> Result<PathBuf> {
        if files.len() == 1 {
            return files
                .pop()
                .ok_or_else(|| BlockdexError::internal("merge of an empty file list"));
        }

        let right = files.split_off(files.len() / 2);
        let (left, right) = rayon::join(
            || self.merge_recursive(files),
            || self.merge_recursive(right),
        );

        self.merge_pair(&left?, &right?)
    }

    /// Stream-merge two sorted files into a new one and delete both inputs.
    pub fn merge_pair(&self, left: &Path, right: &Path) -> Result<PathBuf> {
        let output = self
            .directory
            .merge_path(self.sequence.fetch_add(1, Ordering::Relaxed));
        log::debug!(
            "merging {} and {} into {}",
            left.display(),
            right.display(),
            output.display()
        );

        let mut out = self.directory.create_output(&output)?;
        let mut lhs = RecordCursor::open(&self.directory, left)?;
        let mut rhs = RecordCursor::open(&self.directory, right)?;

        loop {
            match (lhs.current.as_deref(), rhs.current.as_deref()) {
                (None, None) => break,
                (Some(line), None) => {
                    writeln!(out, "{line}")?;
                    lhs.advance()?;
                }
                (None, Some(line)) => {
                    writeln!(out, "{line}")?;
                    rhs.advance()?;
                }
                (Some(l), Some(r)) => {
                    let (l_term, l_payload) = split_record(l)?;
                    let (r_term, r_payload) = split_record(r)?;

                    match l_term.cmp(r_term) {
                        std::cmp::Ordering::Less => {
                            writeln!(out, "{l}")?;
                            lhs.advance()?;
                        }
                        std::cmp::Ordering::Greater => {
                            writeln!(out, "{r}")?;
                            rhs.advance()?;
                        }
                        std::cmp::Ordering::Equal => {
                            let payload = self.combine_payloads(l_term, l_payload, r_payload)?;
                            write_raw_record(&mut out, l_term, &payload)?;
                            lhs.advance()?;
                            rhs.advance()?;
                        }
                    }
                }
            }
        }
        out.flush()?;

        self.directory.delete_file(left)?;
        self.directory.delete_file(right)?;
        self.pairwise_merges.fetch_add(1, Ordering::Relaxed);
        Ok(output)
    }

    /// Join the postings of one term found in both inputs.
    ///
    /// Shards own disjoint, ascending id ranges, so the payloads normally
    /// concatenate as they are. If the ranges interleave the postings are
    /// merged by document id instead; a document on both sides is an error.
    fn combine_payloads(&self, term: &str, left: &str, right: &str) -> Result<String> {
        self.terms_combined.fetch_add(1, Ordering::Relaxed);

        let (Some((l_first, l_last)), Some((r_first, r_last))) =
            (payload_doc_range(left)?, payload_doc_range(right)?)
        else {
            return Ok(format!("{left} {right}").trim().to_string());
        };

        if l_last < r_first {
            return Ok(format!("{left} {right}"));
        }
        if r_last < l_first {
            return Ok(format!("{right} {left}"));
        }

        self.interleaved_terms.fetch_add(1, Ordering::Relaxed);
        log::warn!("document ranges interleave for term {term:?}; merging by document id");

        let mut merged = PostingList::from_flat(&parse_payload(left)?)?;
        let other = PostingList::from_flat(&parse_payload(right)?)?;
        for (&doc_id, positions) in other.iter() {
            if merged.contains(doc_id) {
                return Err(BlockdexError::index(format!(
                    "document {doc_id} appears in two partial indices for term {term:?}"
                )));
            }
            merged.insert(crate::posting::Posting::with_positions(doc_id, positions.clone()));
        }

        let flat: Vec<String> = merged.to_flat().iter().map(u64::to_string).collect();
        Ok(flat.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_partial(directory: &IndexDirectory, shard: usize, content: &str) -> PathBuf {
        let path = directory.partial_path(shard);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_merge_pair_combines_equal_terms() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();
        let merger = ShardMerger::new(directory.clone(), 1).unwrap();

        let a = write_partial(&directory, 0, "apple 1 1 0\ncity 2 1 3\n");
        let b = write_partial(&directory, 1, "banana 5 1 0\ncity 6 2 1 4\nzoo 7 1 0\n");

        let merged = merger.merge_pair(&a, &b).unwrap();
        let content = std::fs::read_to_string(&merged).unwrap();
        assert_eq!(
            content,
            "apple 1 1 0\nbanana 5 1 0\ncity 2 1 3 6 2 1 4\nzoo 7 1 0\n"
        );
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_interleaved_ranges_are_merged_by_document() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();
        let merger = ShardMerger::new(directory.clone(), 1).unwrap();

        let a = write_partial(&directory, 0, "term 1 1 0 9 1 2\n");
        let b = write_partial(&directory, 1, "term 4 1 5\n");

        let merged = merger.merge_pair(&a, &b).unwrap();
        let content = std::fs::read_to_string(&merged).unwrap();
        assert_eq!(content, "term 1 1 0 4 1 5 9 1 2\n");
    }

    #[test]
    fn test_duplicate_document_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();
        let merger = ShardMerger::new(directory.clone(), 1).unwrap();

        let a = write_partial(&directory, 0, "term 3 1 0\n");
        let b = write_partial(&directory, 1, "term 3 1 5\n");
        assert!(merger.merge_pair(&a, &b).is_err());
    }

    #[test]
    fn test_merge_all_is_independent_of_pool_size() {
        let shards = [
            "ant 1 1 0\nbee 2 1 1\n",
            "bee 3 1 0\ncat 4 2 0 1\n",
            "ant 5 1 2\ndog 6 1 0\n",
            "cat 7 1 3\n",
            "bee 8 1 0\neel 9 1 1\n",
        ];

        let mut outputs = Vec::new();
        for threads in [1, 4] {
            let temp_dir = TempDir::new().unwrap();
            let directory = IndexDirectory::create(temp_dir.path()).unwrap();
            let files: Vec<PathBuf> = shards
                .iter()
                .enumerate()
                .map(|(i, content)| write_partial(&directory, i, content))
                .collect();

            let merger = ShardMerger::new(directory.clone(), threads).unwrap();
            let (merged, stats) = merger.merge_all(files).unwrap();
            assert_eq!(stats.inputs, 5);
            assert_eq!(stats.pairwise_merges, 4);
            assert_eq!(stats.interleaved_terms, 0);
            assert!(directory.list_files(&directory.partials_dir()).unwrap().is_empty());
            outputs.push(std::fs::read_to_string(merged).unwrap());
        }

        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(
            outputs[0],
            "ant 1 1 0 5 1 2\nbee 2 1 1 3 1 0 8 1 0\ncat 4 2 0 1 7 1 3\ndog 6 1 0\neel 9 1 1\n"
        );
    }

    #[test]
    fn test_merge_all_single_and_empty() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();
        let merger = ShardMerger::new(directory.clone(), 2).unwrap();

        let (merged, _) = merger.merge_all(Vec::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&merged).unwrap(), "");

        let only = write_partial(&directory, 0, "solo 1 1 0\n");
        let (merged, stats) = merger.merge_all(vec![only.clone()]).unwrap();
        assert_eq!(stats.pairwise_merges, 0);
        assert!(!only.exists());
        assert_eq!(std::fs::read_to_string(&merged).unwrap(), "solo 1 1 0\n");
    }

    #[test]
    fn test_stats_cover_one_merge_all_call() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();
        let merger = ShardMerger::new(directory.clone(), 2).unwrap();

        let files = vec![
            write_partial(&directory, 0, "x 1 1 0\n"),
            write_partial(&directory, 1, "x 2 1 0\n"),
            write_partial(&directory, 2, "y 3 1 0\n"),
        ];
        let (_, first) = merger.merge_all(files).unwrap();
        assert_eq!(first.pairwise_merges, 2);
        assert_eq!(first.terms_combined, 1);

        let files = vec![
            write_partial(&directory, 0, "p 4 1 0\n"),
            write_partial(&directory, 1, "q 5 1 0\n"),
        ];
        let (merged, second) = merger.merge_all(files).unwrap();
        assert_eq!(second.inputs, 2);
        assert_eq!(second.pairwise_merges, 1);
        assert_eq!(second.terms_combined, 0);
        assert_eq!(std::fs::read_to_string(merged).unwrap(), "p 4 1 0\nq 5 1 0\n");
    }
}
