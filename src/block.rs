//! Index block files.
//!
//! A block opens with a header holding its first term, followed by a
//! sequence of records, each holding one term and its compressed posting
//! list:
//!
//! ```text
//! header:  | term len (u16) | first term bytes |
//! record:  | term len (u16) | term bytes | payload len (u32) | payload bytes |
//! ```
//!
//! Integers are big-endian and terms are UTF-8. Records appear in ascending
//! term order. The first term lives in the header rather than the file name,
//! since terms can be longer than a file system allows for a name. Files are
//! named by their position in the index plus a bounded, escaped prefix of the
//! first term.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{BlockdexError, Result};
use crate::storage::{BLOCK_EXTENSION, IndexDirectory};

/// Longest escaped term prefix used in a block file name.
pub const MAX_NAME_PREFIX: usize = 64;

/// Escape at most `max_len` bytes worth of `term` into a file name fragment.
///
/// `[A-Za-z0-9_-]` pass through; every other byte becomes `%XX`. An escape
/// sequence is never cut in half.
pub fn escape_term(term: &str, max_len: usize) -> String {
    let mut escaped = String::with_capacity(term.len().min(max_len));
    for &byte in term.as_bytes() {
        let plain = byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-';
        let width = if plain { 1 } else { 3 };
        if escaped.len() + width > max_len {
            break;
        }
        if plain {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    escaped
}

/// File name of the `sequence`-th block, whose first term is `term`.
pub fn block_file_name(sequence: usize, term: &str) -> String {
    format!(
        "{sequence:06}_{}.{BLOCK_EXTENSION}",
        escape_term(term, MAX_NAME_PREFIX)
    )
}

fn term_len(term: &str) -> Result<u16> {
    u16::try_from(term.len()).map_err(|_| {
        BlockdexError::index(format!("term of {} bytes is too long for a block", term.len()))
    })
}

fn read_term<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u16::<BigEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|e| BlockdexError::index(format!("block term is not valid UTF-8: {e}")))
}

/// Summary of a finished block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Path of the block file.
    pub path: PathBuf,
    /// First term in the block, also its catalog key.
    pub first_term: String,
    /// Number of records written.
    pub records: usize,
    /// Sum of compressed payload sizes.
    pub compressed_bytes: usize,
}

/// Appends records to one block file.
#[derive(Debug)]
pub struct BlockWriter {
    out: BufWriter<File>,
    path: PathBuf,
    first_term: String,
    records: usize,
    compressed_bytes: usize,
}

impl BlockWriter {
    /// Create the `sequence`-th block, keyed by `first_term`, and write its header.
    pub fn create(directory: &IndexDirectory, sequence: usize, first_term: &str) -> Result<Self> {
        let header_len = term_len(first_term)?;
        let path = directory.blocks_dir().join(block_file_name(sequence, first_term));
        let mut out = directory.create_output(&path)?;
        out.write_u16::<BigEndian>(header_len)?;
        out.write_all(first_term.as_bytes())?;

        Ok(BlockWriter {
            out,
            path,
            first_term: first_term.to_string(),
            records: 0,
            compressed_bytes: 0,
        })
    }

    /// Append one `(term, compressed posting list)` record.
    pub fn write_record(&mut self, term: &str, payload: &[u8]) -> Result<()> {
        if self.records == 0 && term != self.first_term {
            return Err(BlockdexError::index(format!(
                "block keyed by {:?} must open with that term, not {term:?}",
                self.first_term
            )));
        }
        let len = term_len(term)?;
        let payload_len = u32::try_from(payload.len()).map_err(|_| {
            BlockdexError::index(format!("posting list for {term:?} exceeds 4GB"))
        })?;

        self.out.write_u16::<BigEndian>(len)?;
        self.out.write_all(term.as_bytes())?;
        self.out.write_u32::<BigEndian>(payload_len)?;
        self.out.write_all(payload)?;

        self.records += 1;
        self.compressed_bytes += payload.len();
        Ok(())
    }

    /// Compressed bytes written so far.
    pub fn compressed_bytes(&self) -> usize {
        self.compressed_bytes
    }

    /// Flush the block and return its summary.
    pub fn finish(mut self) -> Result<BlockInfo> {
        self.out.flush()?;
        Ok(BlockInfo {
            path: self.path,
            first_term: self.first_term,
            records: self.records,
            compressed_bytes: self.compressed_bytes,
        })
    }
}

/// One record read back from a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    /// The term.
    pub term: String,
    /// Its compressed posting list.
    pub payload: Vec<u8>,
}

/// Sequential reader over one block file.
#[derive(Debug)]
pub struct BlockReader<R> {
    reader: R,
    first_term: String,
}

impl BlockReader<BufReader<File>> {
    /// Open a block file and read its header.
    pub fn open(directory: &IndexDirectory, path: &Path) -> Result<Self> {
        BlockReader::new(directory.open_input(path)?)
    }
}

impl<R: BufRead> BlockReader<R> {
    /// Wrap a buffered reader positioned at the start of a block.
    pub fn new(mut reader: R) -> Result<Self> {
        let first_term = read_term(&mut reader)?;
        Ok(BlockReader { reader, first_term })
    }

    /// First term of the block, as stored in its header.
    pub fn first_term(&self) -> &str {
        &self.first_term
    }

    fn at_end(&mut self) -> Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }

    fn read_term(&mut self) -> Result<String> {
        read_term(&mut self.reader)
    }

    fn skip_payload(&mut self, len: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())?;
        if skipped != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block record truncated: expected {len} payload bytes, found {skipped}"),
            )
            .into());
        }
        Ok(())
    }

    /// Read the next record, or None at the end of the block.
    pub fn next_record(&mut self) -> Result<Option<BlockRecord>> {
        if self.at_end()? {
            return Ok(None);
        }

        let term = self.read_term()?;
        let len = self.reader.read_u32::<BigEndian>()? as usize;
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload)?;

        Ok(Some(BlockRecord { term, payload }))
    }

    /// Scan forward for `term`, stopping early once a larger term is seen.
    pub fn find(&mut self, term: &str) -> Result<Option<Vec<u8>>> {
        while !self.at_end()? {
            let current = self.read_term()?;
            let len = self.reader.read_u32::<BigEndian>()?;

            match current.as_str().cmp(term) {
                std::cmp::Ordering::Less => self.skip_payload(len as u64)?,
                std::cmp::Ordering::Equal => {
                    let mut payload = vec![0u8; len as usize];
                    self.reader.read_exact(&mut payload)?;
                    return Ok(Some(payload));
                }
                std::cmp::Ordering::Greater => return Ok(None),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_escape_is_bounded() {
        assert_eq!(escape_term("a/b", 64), "a%2Fb");
        assert_eq!(escape_term("x-y_z", 64), "x-y_z");
        assert_eq!(escape_term("caf\u{e9}", 64), "caf%C3%A9");
        assert_eq!(escape_term("ab/cd", 4), "ab");
        assert_eq!(escape_term(&"q".repeat(300), MAX_NAME_PREFIX).len(), MAX_NAME_PREFIX);

        let name = block_file_name(12, &"%".repeat(300));
        assert!(name.starts_with("000012_%25"));
        assert!(name.ends_with(".idx"));
        assert!(name.len() <= 7 + MAX_NAME_PREFIX + 4);
    }

    #[test]
    fn test_write_then_scan() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();

        let mut writer = BlockWriter::create(&directory, 0, "apple").unwrap();
        writer.write_record("apple", &[0x81, 0x81, 0x80]).unwrap();
        writer.write_record("banana", &[0x82]).unwrap();
        writer.write_record("cherry", &[]).unwrap();
        assert_eq!(writer.compressed_bytes(), 4);
        let info = writer.finish().unwrap();

        assert_eq!(info.first_term, "apple");
        assert_eq!(info.records, 3);
        assert!(info.path.ends_with("blocks/000000_apple.idx"));

        let mut reader = BlockReader::open(&directory, &info.path).unwrap();
        assert_eq!(reader.first_term(), "apple");
        assert_eq!(reader.find("banana").unwrap(), Some(vec![0x82]));

        let mut reader = BlockReader::open(&directory, &info.path).unwrap();
        assert_eq!(reader.find("avocado").unwrap(), None);

        let mut reader = BlockReader::open(&directory, &info.path).unwrap();
        assert_eq!(reader.find("zucchini").unwrap(), None);

        let mut reader = BlockReader::open(&directory, &info.path).unwrap();
        let mut terms = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            terms.push(record.term);
        }
        assert_eq!(terms, vec!["apple", "banana", "cherry"]);
    }

    #[test]
    fn test_record_layout_is_big_endian() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();

        let mut writer = BlockWriter::create(&directory, 3, "ab").unwrap();
        writer.write_record("ab", &[0x85]).unwrap();
        let info = writer.finish().unwrap();

        let bytes = std::fs::read(&info.path).unwrap();
        assert_eq!(bytes, vec![0, 2, b'a', b'b', 0, 2, b'a', b'b', 0, 0, 0, 1, 0x85]);
    }

    #[test]
    fn test_long_first_term_lives_in_header() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();
        let long_term = "a".repeat(300);

        let mut writer = BlockWriter::create(&directory, 0, &long_term).unwrap();
        writer.write_record(&long_term, &[0x81, 0x81, 0x80]).unwrap();
        writer.write_record("zebra", &[0x82]).unwrap();
        let info = writer.finish().unwrap();

        let name = info.path.file_name().unwrap().to_str().unwrap();
        assert!(name.len() < 255);

        let mut reader = BlockReader::open(&directory, &info.path).unwrap();
        assert_eq!(reader.first_term(), long_term);
        assert_eq!(reader.find(&long_term).unwrap(), Some(vec![0x81, 0x81, 0x80]));
    }

    #[test]
    fn test_first_record_must_match_key() {
        let temp_dir = TempDir::new().unwrap();
        let directory = IndexDirectory::create(temp_dir.path()).unwrap();

        let mut writer = BlockWriter::create(&directory, 0, "apple").unwrap();
        assert!(writer.write_record("banana", &[0x81]).is_err());
    }

    #[test]
    fn test_truncated_block_is_an_error() {
        let bytes = vec![0, 2, b'a', b'b', 0, 2, b'a', b'b', 0, 0, 0, 5, 0x85];
        let mut reader = BlockReader::new(Cursor::new(bytes.clone())).unwrap();
        assert!(reader.find("ab").is_err());

        let mut reader = BlockReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.find("zz").is_err());

        assert!(BlockReader::new(Cursor::new(vec![0, 9, b'a'])).is_err());
    }
}
