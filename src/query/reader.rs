//! Query-time access to a block index.
//!
//! Term lookups are routed through the [`BlockCatalog`] to exactly one block,
//! which is scanned until the term or a larger one is found. Decoded posting
//! lists are kept in a small LRU cache, as are resolved phrases.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::block::BlockReader;
use crate::cache::LruCache;
use crate::catalog::BlockCatalog;
use crate::codec::{DeltaVByteCodec, PostingCodec};
use crate::config::IndexConfig;
use crate::document::{DocumentId, DocumentIndexed, DocumentMap};
use crate::error::{BlockdexError, Result};
use crate::posting::PostingList;
use crate::query::parser::{Query, is_phrase};
use crate::query::phrase::{intersect_doc_ids, match_phrase};
use crate::storage::IndexDirectory;

/// Counters describing how lookups were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Block files opened for a term lookup.
    pub block_reads: u64,
    /// Term lookups answered by the token cache.
    pub token_cache_hits: u64,
    /// Phrase lookups answered by the phrase cache.
    pub phrase_cache_hits: u64,
}

/// Reads postings and documents from a built index.
#[derive(Debug)]
pub struct QueryIndexReader<C: PostingCodec = DeltaVByteCodec> {
    directory: IndexDirectory,
    catalog: BlockCatalog,
    documents: DocumentMap,
    codec: C,
    token_cache: LruCache<String, Option<Arc<PostingList>>>,
    phrase_cache: LruCache<String, Arc<PostingList>>,
    stats: ReaderStats,
}

impl QueryIndexReader<DeltaVByteCodec> {
    /// Open the index described by `config`.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        QueryIndexReader::with_codec(config, DeltaVByteCodec)
    }
}

impl<C: PostingCodec> QueryIndexReader<C> {
    /// Open an index whose blocks were written with `codec`.
    pub fn with_codec(config: &IndexConfig, codec: C) -> Result<Self> {
        let directory = IndexDirectory::open(&config.index_dir)?;
        let catalog = BlockCatalog::load(&directory)?;
        let documents = DocumentMap::load(&directory.document_map_path())?;

        log::info!(
            "opened index at {} ({} blocks, {} documents)",
            directory.root().display(),
            catalog.len(),
            documents.len()
        );

        Ok(QueryIndexReader {
            directory,
            catalog,
            documents,
            codec,
            token_cache: LruCache::new(config.token_cache_capacity)
                .with_eviction_callback(|term: &String, _| log::trace!("token cache evicted {term:?}")),
            phrase_cache: LruCache::new(config.phrase_cache_capacity)
                .with_eviction_callback(|phrase: &String, _| log::trace!("phrase cache evicted {phrase:?}")),
            stats: ReaderStats::default(),
        })
    }

    /// Posting list of a term, or None if the index does not contain it.
    ///
    /// A term containing whitespace is resolved as a phrase.
    pub fn postings_for(&mut self, term: &str) -> Result<Option<Arc<PostingList>>> {
        if is_phrase(term) {
            let tokens: Vec<&str> = term.split_whitespace().collect();
            return self.postings_for_phrase(tokens.as_slice()).map(Some);
        }

        if let Some(cached) = self.token_cache.get(term) {
            self.stats.token_cache_hits += 1;
            return Ok(cached.clone());
        }

        let postings = self.load_postings(term)?.map(Arc::new);
        self.token_cache.insert(term.to_string(), postings.clone());
        Ok(postings)
    }

    fn load_postings(&mut self, term: &str) -> Result<Option<PostingList>> {
        let Some(path) = self.catalog.route(term).map(Path::to_path_buf) else {
            return Ok(None);
        };
        self.stats.block_reads += 1;

        let mut reader = BlockReader::open(&self.directory, &path)?;
        let Some(bytes) = reader.find(term)? else {
            return Ok(None);
        };

        let postings = PostingList::from_flat(&self.codec.decode(&bytes)).map_err(|e| {
            BlockdexError::index(format!("corrupt posting list for {term:?} in {}: {e}", path.display()))
        })?;
        Ok(Some(postings))
    }

    /// Total occurrences of a term across the corpus.
    pub fn term_frequency(&mut self, term: &str) -> Result<u64> {
        Ok(self
            .postings_for(term)?
            .map_or(0, |postings| postings.term_frequency()))
    }

    /// Number of documents containing a term.
    pub fn doc_frequency(&mut self, term: &str) -> Result<usize> {
        Ok(self
            .postings_for(term)?
            .map_or(0, |postings| postings.doc_frequency()))
    }

    /// Occurrences of a term in one document.
    pub fn document_term_frequency(&mut self, term: &str, doc_id: DocumentId) -> Result<usize> {
        Ok(self
            .postings_for(term)?
            .map_or(0, |postings| postings.document_term_frequency(doc_id)))
    }

    /// Occurrences of a term in the document at `url`; 0 for an unknown url.
    pub fn document_term_frequency_by_url(&mut self, term: &str, url: &str) -> Result<usize> {
        match self.documents.find_by_url(url).map(|doc| doc.id) {
            Some(doc_id) => self.document_term_frequency(term, doc_id),
            None => Ok(0),
        }
    }

    /// Documents containing the tokens consecutively, with the phrase start
    /// positions in each.
    ///
    /// The result is cached under the tokens joined by one space, in both the
    /// phrase cache and the token cache, and later lookups are served from
    /// either one.
    pub fn postings_for_phrase<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<Arc<PostingList>> {
        if tokens.is_empty() {
            return Ok(Arc::new(PostingList::new()));
        }

        let phrase = tokens
            .iter()
            .map(|token| token.as_ref())
            .collect::<Vec<&str>>()
            .join(" ");

        if let Some(cached) = self.phrase_cache.get(&phrase) {
            self.stats.phrase_cache_hits += 1;
            return Ok(Arc::clone(cached));
        }

        // A phrase pushed out of the phrase cache may still be in the token cache.
        if tokens.len() > 1 {
            if let Some(Some(cached)) = self.token_cache.get(&phrase) {
                self.stats.token_cache_hits += 1;
                let cached = Arc::clone(cached);
                self.phrase_cache.insert(phrase, Arc::clone(&cached));
                return Ok(cached);
            }
        }

        let result = if tokens.len() == 1 {
            self.postings_for(&phrase)?
                .unwrap_or_else(|| Arc::new(PostingList::new()))
        } else {
            let mut lists = Vec::with_capacity(tokens.len());
            for token in tokens {
                match self.postings_for(token.as_ref())? {
                    Some(postings) => lists.push(postings),
                    None => {
                        lists.clear();
                        break;
                    }
                }
            }

            let resolved = if lists.is_empty() {
                PostingList::new()
            } else {
                let refs: Vec<&PostingList> = lists.iter().map(Arc::as_ref).collect();
                match_phrase(&refs)
            };
            let resolved = Arc::new(resolved);
            self.token_cache
                .insert(phrase.clone(), Some(Arc::clone(&resolved)));
            resolved
        };

        self.phrase_cache.insert(phrase, Arc::clone(&result));
        Ok(result)
    }

    /// The first document after `after` that satisfies every query term.
    ///
    /// Returns None for an empty query or when a term is not indexed.
    pub fn next_document_satisfying(
        &mut self,
        query: &Query,
        after: DocumentId,
    ) -> Result<Option<DocumentIndexed>> {
        let Some(doc_id) = self.next_document_id_satisfying(query, after)? else {
            return Ok(None);
        };

        self.documents
            .get(doc_id)
            .cloned()
            .map(Some)
            .ok_or_else(|| BlockdexError::index(format!("document {doc_id} is indexed but has no metadata")))
    }

    /// Like [`Self::next_document_satisfying`] but returns only the id.
    pub fn next_document_id_satisfying(
        &mut self,
        query: &Query,
        after: DocumentId,
    ) -> Result<Option<DocumentId>> {
        if query.is_empty() {
            return Ok(None);
        }

        let mut lists = Vec::with_capacity(query.len());
        for term in query.terms() {
            match self.postings_for(term)? {
                Some(postings) => lists.push(postings),
                None => return Ok(None),
            }
        }

        let refs: Vec<&PostingList> = lists.iter().map(Arc::as_ref).collect();
        let candidates = intersect_doc_ids(&refs);
        let index = candidates.partition_point(|&doc_id| doc_id <= after);
        Ok(candidates.get(index).copied())
    }

    /// Drop a term or phrase from the caches. Returns whether anything was cached.
    pub fn remove_from_cache(&mut self, term: &str) -> bool {
        let token = self.token_cache.remove(term).is_some();
        let phrase = self.phrase_cache.remove(term).is_some();
        token || phrase
    }

    /// Remove the terms of `query` found in more than `ratio` of all documents.
    ///
    /// Stop terms are dropped from the caches. They are removed from the query
    /// only if at least one term survives; a query made of stop terms alone is
    /// returned unchanged.
    pub fn filter_stop_terms(&mut self, query: &Query, ratio: f64) -> Result<Query> {
        if ratio.is_nan() || ratio < 0.0 {
            return Err(BlockdexError::query(format!("invalid stop term ratio {ratio}")));
        }
        let threshold = ratio * self.documents.len() as f64;

        let mut stop_terms = Vec::new();
        for term in query.terms() {
            let doc_frequency = self.doc_frequency(term)?;
            if doc_frequency as f64 > threshold {
                log::debug!("stop term {term:?} (in {doc_frequency} documents)");
                stop_terms.push(term.clone());
            }
        }
        for term in &stop_terms {
            self.remove_from_cache(term);
        }

        let mut filtered = query.clone();
        if stop_terms.len() < query.len() {
            for term in &stop_terms {
                filtered.remove_term(term);
            }
        }
        Ok(filtered)
    }

    /// Metadata of a document.
    pub fn document(&self, doc_id: DocumentId) -> Option<&DocumentIndexed> {
        self.documents.get(doc_id)
    }

    /// Number of indexed documents.
    pub fn num_docs(&self) -> usize {
        self.documents.len()
    }

    /// Token occurrences across the whole corpus.
    pub fn total_term_frequency(&self) -> u64 {
        self.documents.total_term_frequency()
    }

    /// The block routing table.
    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    /// Whether a term or phrase is in the token cache.
    pub fn is_cached(&self, term: &str) -> bool {
        self.token_cache.contains(term)
    }

    /// Lookup counters.
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Entries evicted from the token and phrase caches.
    pub fn cache_evictions(&self) -> (u64, u64) {
        (self.token_cache.evictions(), self.phrase_cache.evictions())
    }
}

/// A reader shared between threads.
///
/// Lookups update the caches, so every call takes the lock.
#[derive(Debug, Clone)]
pub struct SharedIndexReader {
    inner: Arc<Mutex<QueryIndexReader>>,
}

impl SharedIndexReader {
    /// Share an open reader.
    pub fn new(reader: QueryIndexReader) -> Self {
        SharedIndexReader {
            inner: Arc::new(Mutex::new(reader)),
        }
    }

    /// Open the index described by `config`.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        Ok(SharedIndexReader::new(QueryIndexReader::open(config)?))
    }

    /// Run `f` with exclusive access to the reader.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut QueryIndexReader) -> R,
    {
        f(&mut self.inner.lock())
    }

    /// See [`QueryIndexReader::postings_for`].
    pub fn postings_for(&self, term: &str) -> Result<Option<Arc<PostingList>>> {
        self.with(|reader| reader.postings_for(term))
    }

    /// See [`QueryIndexReader::next_document_satisfying`].
    pub fn next_document_satisfying(
        &self,
        query: &Query,
        after: DocumentId,
    ) -> Result<Option<DocumentIndexed>> {
        self.with(|reader| reader.next_document_satisfying(query, after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::IndexBuilder;
    use crate::document::{Document, PageRankTable};
    use tempfile::TempDir;

    fn build_index(temp_dir: &TempDir, texts: &[&str]) -> IndexConfig {
        let config = IndexConfig::new(temp_dir.path())
            .with_docs_per_shard(3)
            .with_worker_threads(2)
            .with_block_bytes_threshold(16);

        let documents: Vec<Document> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Document::from_text(i as u64 + 1, format!("http://doc/{}", i + 1), text))
            .collect();
        let ranks: PageRankTable = documents.iter().map(|doc| (doc.id, 0.5)).collect();

        IndexBuilder::new(config.clone())
            .unwrap()
            .build(documents, &ranks)
            .unwrap();
        config
    }

    fn new_york_corpus() -> Vec<&'static str> {
        vec![
            "new york city",
            "york new city",
            "new york",
            "city lights",
            "lights of new york",
        ]
    }

    #[test]
    fn test_postings_and_frequencies() {
        let temp_dir = TempDir::new().unwrap();
        let config = build_index(&temp_dir, &new_york_corpus());
        let mut reader = QueryIndexReader::open(&config).unwrap();

        let york = reader.postings_for("york").unwrap().unwrap();
        assert_eq!(york.doc_ids().collect::<Vec<_>>(), vec![1, 2, 3, 5]);
        assert_eq!(york.positions(5), Some(&[3][..]));

        assert_eq!(reader.term_frequency("city").unwrap(), 3);
        assert_eq!(reader.doc_frequency("lights").unwrap(), 2);
        assert_eq!(reader.document_term_frequency("new", 1).unwrap(), 1);
        assert_eq!(reader.document_term_frequency("new", 4).unwrap(), 0);
        assert_eq!(reader.document_term_frequency_by_url("of", "http://doc/5").unwrap(), 1);
        assert_eq!(reader.document_term_frequency_by_url("of", "http://nowhere").unwrap(), 0);

        assert_eq!(reader.postings_for("aardvark").unwrap(), None);
        assert_eq!(reader.postings_for("newt").unwrap(), None);
        assert_eq!(reader.term_frequency("zebra").unwrap(), 0);

        assert_eq!(reader.num_docs(), 5);
        assert_eq!(reader.total_term_frequency(), 14);
    }

    #[test]
    fn test_phrase_resolution() {
        let temp_dir = TempDir::new().unwrap();
        let config = build_index(&temp_dir, &new_york_corpus());
        let mut reader = QueryIndexReader::open(&config).unwrap();

        let phrase = reader.postings_for_phrase(&["new", "york", "city"]).unwrap();
        assert_eq!(phrase.doc_ids().collect::<Vec<_>>(), vec![1]);
        assert_eq!(phrase.positions(1), Some(&[0][..]));

        assert!(reader.is_cached("new york city"));
        assert_eq!(reader.term_frequency("new york city").unwrap(), 1);

        let pair = reader.postings_for("new york").unwrap().unwrap();
        assert_eq!(pair.doc_ids().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(pair.positions(5), Some(&[2][..]));

        let before = reader.stats().phrase_cache_hits;
        reader.postings_for_phrase(&["new", "york"]).unwrap();
        assert_eq!(reader.stats().phrase_cache_hits, before + 1);

        assert!(reader.postings_for_phrase(&["york", "lights"]).unwrap().is_empty());
        assert!(reader.postings_for_phrase(&["new", "zebra"]).unwrap().is_empty());
        assert!(reader.postings_for_phrase::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_conjunctive_scan() {
        let texts: Vec<String> = (1..=10u64)
            .map(|id| {
                let mut text = String::from("filler");
                if [2, 3, 5, 7, 9].contains(&id) {
                    text.push_str(" alpha");
                }
                if [3, 4, 7, 9, 10].contains(&id) {
                    text.push_str(" beta");
                }
                text
            })
            .collect();
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

        let temp_dir = TempDir::new().unwrap();
        let config = build_index(&temp_dir, &texts);
        let mut reader = QueryIndexReader::open(&config).unwrap();
        let query = Query::parse("alpha beta");

        let next = |reader: &mut QueryIndexReader, after| {
            reader
                .next_document_satisfying(&query, after)
                .unwrap()
                .map(|doc| doc.id)
        };
        assert_eq!(next(&mut reader, 0), Some(3));
        assert_eq!(next(&mut reader, 3), Some(7));
        assert_eq!(next(&mut reader, 8), Some(9));
        assert_eq!(next(&mut reader, 9), None);

        let doc = reader.next_document_satisfying(&query, 0).unwrap().unwrap();
        assert_eq!(doc.url, "http://doc/3");
        assert_eq!(doc.size, 3);

        assert_eq!(
            reader
                .next_document_satisfying(&Query::parse("alpha missing"), 0)
                .unwrap(),
            None
        );
        assert_eq!(reader.next_document_satisfying(&Query::default(), 0).unwrap(), None);
    }

    #[test]
    fn test_cache_transparency() {
        let temp_dir = TempDir::new().unwrap();
        let config = build_index(&temp_dir, &new_york_corpus());
        let terms = ["new", "york", "city", "lights", "of", "missing", "new york"];

        let mut uncached = QueryIndexReader::open(&config.clone().with_cache_capacities(64, 64)).unwrap();
        let expected: Vec<_> = terms
            .iter()
            .map(|term| uncached.postings_for(term).unwrap())
            .collect();

        let mut reader = QueryIndexReader::open(&config.with_cache_capacities(2, 1)).unwrap();
        for _ in 0..3 {
            for (term, expected) in terms.iter().zip(&expected) {
                assert_eq!(&reader.postings_for(term).unwrap(), expected);
            }
        }
        assert!(reader.cache_evictions().0 > 0);
    }

    #[test]
    fn test_cache_hits_skip_block_reads() {
        let temp_dir = TempDir::new().unwrap();
        let config = build_index(&temp_dir, &new_york_corpus());
        let mut reader = QueryIndexReader::open(&config).unwrap();

        reader.postings_for("york").unwrap();
        reader.postings_for("york").unwrap();
        reader.postings_for("yoyo").unwrap();
        reader.postings_for("yoyo").unwrap();

        let stats = reader.stats();
        assert_eq!(stats.block_reads, 2);
        assert_eq!(stats.token_cache_hits, 2);
    }

    #[test]
    fn test_stop_term_invalidation() {
        let temp_dir = TempDir::new().unwrap();
        let config = build_index(
            &temp_dir,
            &["the new york", "the city", "the york", "lights of the city"],
        );
        let mut reader = QueryIndexReader::open(&config).unwrap();
        let york_before = reader.postings_for("york").unwrap();

        let filtered = reader
            .filter_stop_terms(&Query::parse("the york"), 0.5)
            .unwrap();
        assert_eq!(filtered.terms(), &["york"]);
        assert!(!reader.is_cached("the"));
        assert!(reader.is_cached("york"));
        assert_eq!(reader.postings_for("york").unwrap(), york_before);

        assert!(reader.filter_stop_terms(&filtered, -1.0).is_err());
        assert!(!reader.remove_from_cache("the"));
        assert!(reader.remove_from_cache("york"));
        assert_eq!(reader.postings_for("york").unwrap(), york_before);
    }

    #[test]
    fn test_query_of_stop_terms_only_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let config = build_index(&temp_dir, &["the york", "the york", "the city"]);
        let mut reader = QueryIndexReader::open(&config).unwrap();

        let query = Query::parse("the york");
        let filtered = reader.filter_stop_terms(&query, 0.5).unwrap();
        assert_eq!(filtered.terms(), &["the", "york"]);
        assert!(!reader.is_cached("the"));
        assert!(!reader.is_cached("york"));

        let doc = reader.next_document_satisfying(&filtered, 0).unwrap().unwrap();
        assert_eq!(doc.id, 1);
    }

    #[test]
    fn test_phrase_evicted_from_phrase_cache_is_served_by_token_cache() {
        let temp_dir = TempDir::new().unwrap();
        let config = build_index(&temp_dir, &new_york_corpus()).with_cache_capacities(10, 1);
        let mut reader = QueryIndexReader::open(&config).unwrap();

        let first = reader.postings_for("new york").unwrap().unwrap();
        reader.postings_for("york city").unwrap();
        let before = reader.stats();
        assert_eq!(before.token_cache_hits, 1);

        let again = reader.postings_for("new york").unwrap().unwrap();
        assert_eq!(again, first);
        let after = reader.stats();
        assert_eq!(after.token_cache_hits, before.token_cache_hits + 1);
        assert_eq!(after.block_reads, before.block_reads);
        assert_eq!(after.phrase_cache_hits, 0);

        reader.postings_for("new york").unwrap();
        assert_eq!(reader.stats().phrase_cache_hits, 1);
    }

    #[test]
    fn test_shared_reader() {
        let temp_dir = TempDir::new().unwrap();
        let config = build_index(&temp_dir, &new_york_corpus());
        let shared = SharedIndexReader::open(&config).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    shared
                        .postings_for("city")
                        .unwrap()
                        .map(|postings| postings.doc_frequency())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(3));
        }
        assert_eq!(shared.with(|reader| reader.num_docs()), 5);
    }
}
