//! Intersection of posting lists.

use crate::document::DocumentId;
use crate::posting::{Posting, PostingList};

/// Documents present in every list, ascending.
///
/// No lists means no documents.
pub fn intersect_doc_ids(lists: &[&PostingList]) -> Vec<DocumentId> {
    let Some(smallest) = lists.iter().min_by_key(|list| list.len()) else {
        return Vec::new();
    };

    smallest
        .doc_ids()
        .filter(|&doc_id| lists.iter().all(|list| list.contains(doc_id)))
        .collect()
}

/// Resolve a phrase from the posting lists of its tokens, in phrase order.
///
/// The result holds, for every document containing the whole phrase, the
/// start positions `p` such that token `i` occurs at `p + i`.
pub fn match_phrase(lists: &[&PostingList]) -> PostingList {
    match lists {
        [] => PostingList::new(),
        [single] => (*single).clone(),
        [first, rest @ ..] => intersect_doc_ids(lists)
            .into_iter()
            .filter_map(|doc_id| {
                let starts: Vec<u64> = first
                    .positions(doc_id)?
                    .iter()
                    .copied()
                    .filter(|&start| {
                        rest.iter().enumerate().all(|(i, list)| {
                            list.positions(doc_id)
                                .is_some_and(|p| p.binary_search(&(start + i as u64 + 1)).is_ok())
                        })
                    })
                    .collect();

                (!starts.is_empty()).then(|| Posting::with_positions(doc_id, starts))
            })
            .collect(),
    }
}
