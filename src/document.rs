//! Documents, their metadata and per-document scores.
//!
//! Parsing and normalization happen upstream: a [`Document`] arrives with its
//! token stream already cleaned. What the index keeps about each document
//! after the build is a [`DocumentIndexed`] entry in the [`DocumentMap`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{BlockdexError, Result};

/// Globally unique, positive document identifier.
pub type DocumentId = u64;

/// A document ready for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document ID.
    pub id: DocumentId,
    /// Location of the document.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Normalized tokens in document order.
    pub tokens: Vec<String>,
}

impl Document {
    /// Create a new document.
    pub fn new<U, T>(id: DocumentId, url: U, title: T, tokens: Vec<String>) -> Self
    where
        U: Into<String>,
        T: Into<String>,
    {
        Document {
            id,
            url: url.into(),
            title: title.into(),
            tokens,
        }
    }

    /// Create a document from whitespace-separated text.
    pub fn from_text<U: Into<String>>(id: DocumentId, url: U, text: &str) -> Self {
        let tokens = text.split_whitespace().map(str::to_string).collect();
        Document::new(id, url, "", tokens)
    }
}

/// A document before id assignment, as read from a corpus file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Location of the document.
    pub url: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Normalized tokens in document order.
    pub tokens: Vec<String>,
}

/// Metadata kept for every indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentIndexed {
    /// Document ID.
    pub id: DocumentId,
    /// Location of the document.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Number of tokens in the document.
    pub size: u64,
    /// Precomputed PageRank score.
    pub page_rank: f32,
}

/// Every indexed document keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMap {
    documents: BTreeMap<DocumentId, DocumentIndexed>,
}

impl DocumentMap {
    /// Create an empty map.
    pub fn new() -> Self {
        DocumentMap::default()
    }

    /// Add or replace a document entry.
    pub fn insert(&mut self, doc: DocumentIndexed) {
        self.documents.insert(doc.id, doc);
    }

    /// Look up a document by id.
    pub fn get(&self, id: DocumentId) -> Option<&DocumentIndexed> {
        self.documents.get(&id)
    }

    /// Look up a document by URL.
    pub fn find_by_url(&self, url: &str) -> Option<&DocumentIndexed> {
        self.documents.values().find(|doc| doc.url == url)
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if no document is indexed.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Sum of all document sizes.
    pub fn total_term_frequency(&self) -> u64 {
        self.documents.values().map(|doc| doc.size).sum()
    }

    /// Iterate in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentIndexed> {
        self.documents.values()
    }

    /// Persist the map with bincode.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a map written by [`DocumentMap::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

impl Extend<DocumentIndexed> for DocumentMap {
    fn extend<I: IntoIterator<Item = DocumentIndexed>>(&mut self, iter: I) {
        for doc in iter {
            self.insert(doc);
        }
    }
}

/// Precomputed PageRank scores for every document in the corpus.
#[derive(Debug, Clone, Default)]
pub struct PageRankTable {
    scores: AHashMap<DocumentId, f32>,
}

impl PageRankTable {
    /// Create an empty table.
    pub fn new() -> Self {
        PageRankTable::default()
    }

    /// Set the score of a document.
    pub fn set(&mut self, id: DocumentId, score: f32) {
        self.scores.insert(id, score);
    }

    /// Get the score of a document.
    pub fn get(&self, id: DocumentId) -> Option<f32> {
        self.scores.get(&id).copied()
    }

    /// Number of scored documents.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Load a JSON object mapping document ids to scores.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let raw: BTreeMap<String, f32> = serde_json::from_reader(reader)?;

        let mut table = PageRankTable::new();
        for (key, score) in raw {
            let id = key.parse::<DocumentId>().map_err(|e| {
                BlockdexError::invalid_config(format!("invalid document id {key:?} in PageRank table: {e}"))
            })?;
            table.set(id, score);
        }
        Ok(table)
    }

    /// Fail unless every given document has a score.
    pub fn ensure_covers<'a, I>(&self, documents: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let missing: Vec<DocumentId> = documents
            .into_iter()
            .filter(|doc| !self.scores.contains_key(&doc.id))
            .map(|doc| doc.id)
            .take(8)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BlockdexError::invalid_config(format!(
                "missing PageRank scores for documents {missing:?}"
            )))
        }
    }
}

impl FromIterator<(DocumentId, f32)> for PageRankTable {
    fn from_iter<I: IntoIterator<Item = (DocumentId, f32)>>(iter: I) -> Self {
        PageRankTable {
            scores: iter.into_iter().collect(),
        }
    }
}
