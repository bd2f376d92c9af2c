//! Posting list compression.
//!
//! A posting list travels through the build pipeline in its *flattened* form:
//! for each document in ascending id order, the document id, the number of
//! occurrences, then that many occurrence positions.
//!
//! ```text
//! 3 2 0 9 | 7 1 4
//! ^ ^ ^^^   document 7, one occurrence at position 4
//! | | positions 0 and 9
//! | occurrence count
//! document id
//! ```
//!
//! Compression runs in two passes. The delta pass replaces every document id
//! with its distance from the previous document id and every position with
//! its distance from the previous position in the same document; counts are
//! left alone. The byte pass then writes every value with the
//! variable-length encoding from [`crate::util::varint`].
//!
//! Decoding is only defined for bytes produced by [`encode_posting_list`].
//! Malformed input never panics but yields an unspecified list.

use crate::util::varint::{TERMINATOR, encode_u64_into};

/// A strategy for turning flattened posting lists into bytes and back.
pub trait PostingCodec: Send + Sync + std::fmt::Debug {
    /// Compress a flattened posting list.
    fn encode(&self, flat: &[u64]) -> Vec<u8>;

    /// Restore a flattened posting list from bytes produced by [`Self::encode`].
    fn decode(&self, bytes: &[u8]) -> Vec<u64>;
}

/// Delta transform followed by variable-length byte encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaVByteCodec;

impl PostingCodec for DeltaVByteCodec {
    fn encode(&self, flat: &[u64]) -> Vec<u8> {
        encode_posting_list(flat)
    }

    fn decode(&self, bytes: &[u8]) -> Vec<u64> {
        decode_posting_list(bytes)
    }
}

/// Replace absolute document ids and positions by their gaps.
pub fn delta_encode(flat: &[u64]) -> Vec<u64> {
    let mut result = Vec::with_capacity(flat.len());
    let mut base_doc_id = 0u64;
    let mut index = 0;

    while index < flat.len() {
        let doc_id = flat[index];
        result.push(doc_id.wrapping_sub(base_doc_id));
        base_doc_id = doc_id;
        index += 1;

        let Some(&count) = flat.get(index) else {
            break;
        };
        result.push(count);
        index += 1;

        let mut base_position = 0u64;
        let end = index.saturating_add(count as usize).min(flat.len());
        for &position in &flat[index..end] {
            result.push(position.wrapping_sub(base_position));
            base_position = position;
        }
        index = end;
    }

    result
}

/// Undo [`delta_encode`] in a single forward pass.
pub fn delta_decode(deltas: &[u64]) -> Vec<u64> {
    let mut result = Vec::with_capacity(deltas.len());
    let mut base_doc_id = 0u64;
    let mut index = 0;

    while index < deltas.len() {
        base_doc_id = base_doc_id.wrapping_add(deltas[index]);
        result.push(base_doc_id);
        index += 1;

        let Some(&count) = deltas.get(index) else {
            break;
        };
        result.push(count);
        index += 1;

        let mut base_position = 0u64;
        let end = index.saturating_add(count as usize).min(deltas.len());
        for &gap in &deltas[index..end] {
            base_position = base_position.wrapping_add(gap);
            result.push(base_position);
        }
        index = end;
    }

    result
}

/// Compress a flattened posting list.
pub fn encode_posting_list(flat: &[u64]) -> Vec<u8> {
    let deltas = delta_encode(flat);
    let mut bytes = Vec::with_capacity(deltas.len() + deltas.len() / 2);
    for value in deltas {
        encode_u64_into(value, &mut bytes);
    }
    bytes
}

/// Decompress bytes produced by [`encode_posting_list`].
pub fn decode_posting_list(bytes: &[u8]) -> Vec<u64> {
    let mut values = Vec::with_capacity(bytes.len());
    let mut current = 0u64;

    for &byte in bytes {
        current = (current << 7) | (byte & !TERMINATOR) as u64;
        if byte & TERMINATOR != 0 {
            values.push(current);
            current = 0;
        }
    }

    delta_decode(&values)
}
