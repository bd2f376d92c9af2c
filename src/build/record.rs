//! Text records of partial and merged index files.
//!
//! Each line holds one term followed by its flattened posting list:
//!
//! ```text
//! york 1 1 1 4 2 10 31
//! ```
//!
//! reads as "york" in document 1 once at position 1, and in document 4 twice
//! at positions 10 and 31.

use std::io::Write;

use crate::document::DocumentId;
use crate::error::{BlockdexError, Result};

/// Write one record line.
pub fn write_record<W: Write>(out: &mut W, term: &str, flat: &[u64]) -> Result<()> {
    out.write_all(term.as_bytes())?;
    for value in flat {
        write!(out, " {value}")?;
    }
    out.write_all(b"\n")?;
    Ok(())
}

/// Write a record whose payload is already formatted.
pub fn write_raw_record<W: Write>(out: &mut W, term: &str, payload: &str) -> Result<()> {
    out.write_all(term.as_bytes())?;
    if !payload.is_empty() {
        out.write_all(b" ")?;
        out.write_all(payload.as_bytes())?;
    }
    out.write_all(b"\n")?;
    Ok(())
}

/// Split a record line into its term and payload.
pub fn split_record(line: &str) -> Result<(&str, &str)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (term, payload) = match line.split_once(' ') {
        Some((term, payload)) => (term, payload.trim()),
        None => (line, ""),
    };

    if term.is_empty() {
        return Err(BlockdexError::index(format!(
            "index record without a term: {line:?}"
        )));
    }
    Ok((term, payload))
}

/// Parse a payload into its flattened posting list.
pub fn parse_payload(payload: &str) -> Result<Vec<u64>> {
    payload
        .split_ascii_whitespace()
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|e| BlockdexError::index(format!("invalid posting value {value:?}: {e}")))
        })
        .collect()
}

/// First and last document ids of a payload, without materializing it.
pub fn payload_doc_range(payload: &str) -> Result<Option<(DocumentId, DocumentId)>> {
    let mut values = payload.split_ascii_whitespace();
    let mut range: Option<(DocumentId, DocumentId)> = None;

    let parse = |value: &str| {
        value
            .parse::<u64>()
            .map_err(|e| BlockdexError::index(format!("invalid posting value {value:?}: {e}")))
    };

    while let Some(doc) = values.next() {
        let doc_id = parse(doc)?;
        let count = values
            .next()
            .ok_or_else(|| BlockdexError::index(format!("missing occurrence count for document {doc_id}")))
            .and_then(parse)?;
        for _ in 0..count {
            values.next().ok_or_else(|| {
                BlockdexError::index(format!("document {doc_id} has fewer than {count} positions"))
            })?;
        }

        range = Some(match range {
            Some((first, _)) => (first, doc_id),
            None => (doc_id, doc_id),
        });
    }

    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_split() {
        let mut out = Vec::new();
        write_record(&mut out, "york", &[1, 1, 1, 4, 2, 10, 31]).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert_eq!(line, "york 1 1 1 4 2 10 31\n");

        let (term, payload) = split_record(&line).unwrap();
        assert_eq!(term, "york");
        assert_eq!(parse_payload(payload).unwrap(), vec![1, 1, 1, 4, 2, 10, 31]);
    }

    #[test]
    fn test_raw_record() {
        let mut out = Vec::new();
        write_raw_record(&mut out, "a", "1 1 0 2 1 5").unwrap();
        write_raw_record(&mut out, "b", "").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a 1 1 0 2 1 5\nb\n");
    }

    #[test]
    fn test_split_rejects_missing_term() {
        assert!(split_record(" 1 1 0").is_err());
        assert!(split_record("").is_err());
        assert_eq!(split_record("lonely").unwrap(), ("lonely", ""));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_payload("1 x 3").is_err());
    }

    #[test]
    fn test_doc_range() {
        assert_eq!(payload_doc_range("").unwrap(), None);
        assert_eq!(payload_doc_range("5 2 0 3").unwrap(), Some((5, 5)));
        assert_eq!(
            payload_doc_range("5 2 0 3 9 1 7 12 3 1 2 3").unwrap(),
            Some((5, 12))
        );
        assert!(payload_doc_range("5 2 0").is_err());
    }
}
