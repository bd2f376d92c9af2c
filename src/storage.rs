//! On-disk layout of an index directory.
//!
//! ```text
//! <index_dir>/
//!   partials/document_index_<shard>   per-shard partial indices (transient)
//!   partials/merge_<n>                intermediate merges (transient)
//!   full_corpus.idx                   merged index (transient)
//!   blocks/<first term>.idx           compressed index blocks
//!   lookup/lookup_<c>_.json           completion lists
//!   dictionary                        plain-term dictionary
//!   document_map.bin                  per-document metadata
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::{BlockdexError, Result};

/// Buffer size for file I/O.
pub const IO_BUFFER_SIZE: usize = 65536;

/// Prefix of per-shard partial index files.
pub const PARTIAL_PREFIX: &str = "document_index_";

/// Prefix of intermediate merge files.
pub const MERGE_PREFIX: &str = "merge_";

/// Extension of block files.
pub const BLOCK_EXTENSION: &str = "idx";

const PARTIALS_DIR: &str = "partials";
const BLOCKS_DIR: &str = "blocks";
const LOOKUP_DIR: &str = "lookup";
const MERGED_INDEX: &str = "full_corpus.idx";
const DICTIONARY: &str = "dictionary";
const DOCUMENT_MAP: &str = "document_map.bin";

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// File not found.
    FileNotFound(String),

    /// Path exists but is not a directory.
    NotADirectory(String),

    /// I/O error.
    IoError(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::NotADirectory(name) => write!(f, "Path is not a directory: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for BlockdexError {
    fn from(err: StorageError) -> Self {
        BlockdexError::storage(err.to_string())
    }
}

fn map_io_error(path: &Path, e: io::Error) -> StorageError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::FileNotFound(path.display().to_string())
    } else {
        StorageError::IoError(format!("{}: {e}", path.display()))
    }
}

/// The directory an index is built into and served from.
#[derive(Debug, Clone)]
pub struct IndexDirectory {
    root: PathBuf,
}

impl IndexDirectory {
    /// Open an index directory, creating it and its subdirectories if needed.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let directory = IndexDirectory {
            root: root.as_ref().to_path_buf(),
        };

        for dir in [
            directory.root.clone(),
            directory.partials_dir(),
            directory.blocks_dir(),
            directory.lookup_dir(),
        ] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir).map_err(|e| map_io_error(&dir, e))?;
            }
            if !dir.is_dir() {
                return Err(StorageError::NotADirectory(dir.display().to_string()).into());
            }
        }

        Ok(directory)
    }

    /// Open an existing index directory without creating anything.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StorageError::NotADirectory(root.display().to_string()).into());
        }
        Ok(IndexDirectory { root })
    }

    /// Root of the index.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding partial and intermediate merge files.
    pub fn partials_dir(&self) -> PathBuf {
        self.root.join(PARTIALS_DIR)
    }

    /// Directory holding block files.
    pub fn blocks_dir(&self) -> PathBuf {
        self.root.join(BLOCKS_DIR)
    }

    /// Directory holding completion lists.
    pub fn lookup_dir(&self) -> PathBuf {
        self.root.join(LOOKUP_DIR)
    }

    /// Path of the partial index written by one shard.
    pub fn partial_path(&self, shard: usize) -> PathBuf {
        self.partials_dir().join(format!("{PARTIAL_PREFIX}{shard}"))
    }

    /// Path of an intermediate merge file.
    pub fn merge_path(&self, sequence: u64) -> PathBuf {
        self.partials_dir().join(format!("{MERGE_PREFIX}{sequence}"))
    }

    /// Path of the fully merged index.
    pub fn merged_index_path(&self) -> PathBuf {
        self.root.join(MERGED_INDEX)
    }

    /// Path of the plain-term dictionary.
    pub fn dictionary_path(&self) -> PathBuf {
        self.root.join(DICTIONARY)
    }

    /// Path of the persisted document map.
    pub fn document_map_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_MAP)
    }

    /// Open a file for buffered reading.
    pub fn open_input(&self, path: &Path) -> Result<BufReader<File>> {
        let file = File::open(path).map_err(|e| map_io_error(path, e))?;
        Ok(BufReader::with_capacity(IO_BUFFER_SIZE, file))
    }

    /// Create (or truncate) a file for buffered writing.
    pub fn create_output(&self, path: &Path) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| map_io_error(path, e))?;
        Ok(BufWriter::with_capacity(IO_BUFFER_SIZE, file))
    }

    /// Delete a file if it exists.
    pub fn delete_file(&self, path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .map_err(|e| StorageError::IoError(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    /// Rename a file.
    pub fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to)
            .map_err(|e| StorageError::IoError(format!("Failed to rename file: {e}")))?;
        Ok(())
    }

    /// List the regular files of a directory, sorted by name.
    pub fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(dir).map_err(|e| map_io_error(dir, e))? {
            let entry = entry.map_err(|e| StorageError::IoError(e.to_string()))?;
            let path = entry.path();

            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(name.to_string());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Remove every file in a directory.
    pub fn clear_dir(&self, dir: &Path) -> Result<usize> {
        let files = self.list_files(dir)?;
        for name in &files {
            self.delete_file(&dir.join(name))?;
        }
        Ok(files.len())
    }
}
