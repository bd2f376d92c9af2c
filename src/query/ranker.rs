//! Ranking of conjunctive query matches.
//!
//! Every document satisfying the query gets a relevance equal to the product,
//! over the query terms, of the term's occurrences in the document divided by
//! its occurrences in the whole corpus. The `k` most relevant documents are
//! kept, then their relevance and PageRank are each divided by their maximum
//! among those `k` and blended into the final score.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cache::LruCache;
use crate::codec::PostingCodec;
use crate::config::IndexConfig;
use crate::document::{DocumentId, DocumentIndexed};
use crate::error::Result;
use crate::query::parser::Query;
use crate::query::reader::QueryIndexReader;

/// Weight of the normalized term relevance in the final score.
pub const RELEVANCE_WEIGHT: f64 = 0.7;

/// Weight of the normalized PageRank in the final score.
pub const PAGE_RANK_WEIGHT: f64 = 0.3;

/// A ranked query match.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// The matching document.
    pub document: DocumentIndexed,
    /// Product of per-term document/corpus frequency ratios.
    pub relevance: f64,
    /// Blended score the results are ordered by.
    pub score: f64,
}

/// Heap entry ordered so that the least relevant match is on top.
#[derive(Debug)]
struct Candidate {
    doc_id: DocumentId,
    relevance: f64,
    document: DocumentIndexed,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.relevance == other.relevance && self.doc_id == other.doc_id
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on relevance; among ties the later document goes first.
        other
            .relevance
            .total_cmp(&self.relevance)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// Ranks query matches and keeps the results of recent queries.
#[derive(Debug)]
pub struct QueryRanker {
    results: LruCache<(String, usize), Vec<ScoredDocument>>,
    stop_term_ratio: Option<f64>,
    cache_hits: u64,
}

impl QueryRanker {
    /// Create a ranker with the query cache size and stop term ratio of `config`.
    pub fn new(config: &IndexConfig) -> Self {
        QueryRanker {
            results: LruCache::new(config.query_cache_capacity),
            stop_term_ratio: config.stop_term_ratio,
            cache_hits: 0,
        }
    }

    /// The `k` best matches of `query`, best first.
    pub fn rank<C: PostingCodec>(
        &mut self,
        reader: &mut QueryIndexReader<C>,
        query: &Query,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let key = (query.to_string(), k);
        if let Some(cached) = self.results.get(&key) {
            self.cache_hits += 1;
            return Ok(cached.clone());
        }

        let query = match self.stop_term_ratio {
            Some(ratio) => reader.filter_stop_terms(query, ratio)?,
            None => query.clone(),
        };

        let mut corpus_frequencies = Vec::with_capacity(query.len());
        for term in query.terms() {
            corpus_frequencies.push(reader.term_frequency(term)? as f64);
        }

        let mut heap = BinaryHeap::with_capacity(k.saturating_add(1).min(1024));
        let mut matches = 0usize;
        let mut after = 0;
        while let Some(document) = reader.next_document_satisfying(&query, after)? {
            after = document.id;
            matches += 1;
            if k == 0 {
                continue;
            }

            let mut relevance = 1.0;
            for (term, corpus_frequency) in query.terms().iter().zip(&corpus_frequencies) {
                let in_document = reader.document_term_frequency(term, document.id)? as f64;
                relevance *= in_document / corpus_frequency;
            }

            heap.push(Candidate {
                doc_id: document.id,
                relevance,
                document,
            });
            if heap.len() > k {
                heap.pop();
            }
        }

        let candidates = heap.into_vec();
        let max_relevance = candidates.iter().map(|c| c.relevance).fold(0.0, f64::max);
        let max_page_rank = candidates
            .iter()
            .map(|c| c.document.page_rank as f64)
            .fold(0.0, f64::max);

        let mut ranked: Vec<ScoredDocument> = candidates
            .into_iter()
            .map(|candidate| {
                let score = RELEVANCE_WEIGHT * normalize(candidate.relevance, max_relevance)
                    + PAGE_RANK_WEIGHT * normalize(candidate.document.page_rank as f64, max_page_rank);
                ScoredDocument {
                    document: candidate.document,
                    relevance: candidate.relevance,
                    score,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });

        log::debug!("ranked {matches} matches of {query}, kept {}", ranked.len());
        self.results.insert(key, ranked.clone());
        Ok(ranked)
    }

    /// Queries answered from the result cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Forget every cached result.
    pub fn clear_cache(&mut self) {
        self.results.clear();
    }
}

fn normalize(value: f64, max: f64) -> f64 {
    if max > 0.0 { value / max } else { 0.0 }
}
