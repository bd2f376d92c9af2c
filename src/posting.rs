//! Postings and posting lists.
//!
//! A [`PostingList`] maps every document containing a term to the ordered
//! positions at which the term occurs. It converts to and from the flattened
//! `(doc_id, count, positions...)*` form consumed by [`crate::codec`].

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::document::DocumentId;
use crate::error::{BlockdexError, Result};

/// A single document's occurrence record for a term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocumentId,
    /// Zero-based token offsets of the term in the document, strictly increasing.
    pub positions: Vec<u64>,
}

impl Posting {
    /// Create a posting with positions.
    pub fn with_positions(doc_id: DocumentId, positions: Vec<u64>) -> Self {
        Posting { doc_id, positions }
    }

    /// Get the term frequency in this document.
    pub fn frequency(&self) -> usize {
        self.positions.len()
    }
}

/// All postings of one term, ordered by document id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    postings: BTreeMap<DocumentId, Vec<u64>>,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new() -> Self {
        PostingList {
            postings: BTreeMap::new(),
        }
    }

    /// Record one occurrence of the term.
    ///
    /// Positions for a document are expected to arrive in increasing order,
    /// which holds when a document's token stream is consumed front to back.
    pub fn add_occurrence(&mut self, doc_id: DocumentId, position: u64) {
        self.postings.entry(doc_id).or_default().push(position);
    }

    /// Add a posting, replacing any previous posting for the same document.
    pub fn insert(&mut self, posting: Posting) {
        self.postings.insert(posting.doc_id, posting.positions);
    }

    /// Rebuild a posting list from its flattened form.
    pub fn from_flat(flat: &[u64]) -> Result<Self> {
        let mut postings = BTreeMap::new();
        let mut previous: Option<DocumentId> = None;
        let mut index = 0;

        while index < flat.len() {
            let doc_id = flat[index];
            if previous.is_some_and(|prev| prev >= doc_id) {
                return Err(BlockdexError::index(format!(
                    "document ids out of order in posting list at document {doc_id}"
                )));
            }
            let count = *flat.get(index + 1).ok_or_else(|| {
                BlockdexError::index(format!("missing occurrence count for document {doc_id}"))
            })? as usize;
            let start = index + 2;
            let end = start
                .checked_add(count)
                .filter(|&end| end <= flat.len())
                .ok_or_else(|| {
                    BlockdexError::index(format!(
                        "document {doc_id} declares {count} occurrences but the list is shorter"
                    ))
                })?;

            postings.insert(doc_id, flat[start..end].to_vec());
            previous = Some(doc_id);
            index = end;
        }

        Ok(PostingList { postings })
    }

    /// Flatten into `(doc_id, count, positions...)*`.
    pub fn to_flat(&self) -> Vec<u64> {
        let mut flat = Vec::with_capacity(self.postings.len() * 3);
        for (&doc_id, positions) in &self.postings {
            flat.push(doc_id);
            flat.push(positions.len() as u64);
            flat.extend_from_slice(positions);
        }
        flat
    }

    /// Number of documents containing the term.
    pub fn doc_frequency(&self) -> usize {
        self.postings.len()
    }

    /// Number of occurrences across all documents.
    pub fn term_frequency(&self) -> u64 {
        self.postings.values().map(|p| p.len() as u64).sum()
    }

    /// Number of occurrences in one document.
    pub fn document_term_frequency(&self, doc_id: DocumentId) -> usize {
        self.postings.get(&doc_id).map_or(0, Vec::len)
    }

    /// Positions of the term in a document.
    pub fn positions(&self, doc_id: DocumentId) -> Option<&[u64]> {
        self.postings.get(&doc_id).map(Vec::as_slice)
    }

    /// Check whether a document contains the term.
    pub fn contains(&self, doc_id: DocumentId) -> bool {
        self.postings.contains_key(&doc_id)
    }

    /// Document ids in ascending order.
    pub fn doc_ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.postings.keys().copied()
    }

    /// Iterate over `(doc_id, positions)` in ascending document order.
    pub fn iter(&self) -> btree_map::Iter<'_, DocumentId, Vec<u64>> {
        self.postings.iter()
    }

    /// Get the number of postings.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

impl FromIterator<Posting> for PostingList {
    fn from_iter<I: IntoIterator<Item = Posting>>(iter: I) -> Self {
        let mut list = PostingList::new();
        for posting in iter {
            list.insert(posting);
        }
        list
    }
}
