//! Corpus loading and document id assignment.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashSet;
use rayon::prelude::*;

use crate::document::{Document, DocumentId, RawDocument};
use crate::error::Result;

/// Documents read from a corpus file.
#[derive(Debug, Clone, Default)]
pub struct CorpusLoad {
    /// Documents in file order.
    pub documents: Vec<RawDocument>,
    /// Lines that could not be parsed.
    pub skipped: usize,
}

/// Read a JSON Lines corpus, one `{"url", "title", "tokens"}` object per line.
///
/// Blank lines are ignored. A malformed line is logged and skipped.
pub fn read_jsonl(path: &Path) -> Result<CorpusLoad> {
    let reader = BufReader::new(File::open(path)?);
    let mut load = CorpusLoad::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawDocument>(&line) {
            Ok(doc) => load.documents.push(doc),
            Err(e) => {
                log::warn!("{}:{}: skipping malformed document: {e}", path.display(), line_no + 1);
                load.skipped += 1;
            }
        }
    }

    log::info!(
        "read {} documents from {} ({} skipped)",
        load.documents.len(),
        path.display(),
        load.skipped
    );
    Ok(load)
}

/// Assign ids to raw documents.
///
/// Documents are cut into shards of `docs_per_shard`; shard `i` owns the id
/// range starting at `1 + i * docs_per_shard`, so shards are numbered in
/// parallel without coordination. Within a shard a repeated URL is dropped.
/// Ids are unique and ascending in input order but may have gaps.
pub fn assign_document_ids(raw: Vec<RawDocument>, docs_per_shard: usize) -> Vec<Document> {
    let docs_per_shard = docs_per_shard.max(1);

    let mut shards: Vec<Vec<RawDocument>> = Vec::new();
    let mut iter = raw.into_iter().peekable();
    while iter.peek().is_some() {
        shards.push(iter.by_ref().take(docs_per_shard).collect());
    }

    let numbered: Vec<Vec<Document>> = shards
        .into_par_iter()
        .enumerate()
        .map(|(shard, docs)| {
            let mut next_id = 1 + (shard * docs_per_shard) as DocumentId;
            let mut seen = AHashSet::with_capacity(docs.len());
            let mut out = Vec::with_capacity(docs.len());

            for doc in docs {
                if !seen.insert(doc.url.clone()) {
                    log::debug!("shard {shard}: dropping repeated url {}", doc.url);
                    continue;
                }
                out.push(Document::new(next_id, doc.url, doc.title, doc.tokens));
                next_id += 1;
            }
            out
        })
        .collect();

    numbered.into_iter().flatten().collect()
}
