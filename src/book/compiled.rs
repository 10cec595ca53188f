//! Immutable compiled opening book.
//!
//! File layout (little-endian): a `u32` entry count, then `count`
//! fixed-size records of `{u64 fingerprint, u16 weight, 6 bytes padding}`.
//! The fixed record size makes the body directly indexable, and entries
//! are written in fingerprint order, so lookup is a plain binary search.
//!
//! Validation happens once, at load: a truncated file fails instead of
//! yielding a partial book. An empty book (zero entries) is well formed.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::position::Position;

/// Bytes in the entry-count header.
pub const BOOK_HEADER_SIZE: usize = 4;

/// Bytes per book record: 8 fingerprint + 2 weight + 6 padding.
pub const BOOK_RECORD_SIZE: usize = 16;

/// One compiled entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookEntry {
    pub fingerprint: u64,
    pub weight: u16,
}

/// Read-only opening book, loaded wholesale and binary-searchable.
#[derive(Debug, Default)]
pub struct CompiledBook {
    entries: Vec<BookEntry>,
}

impl CompiledBook {
    /// Load a compiled book from `path`.
    pub fn load<Q: AsRef<Path>>(path: Q) -> Result<Self, BookLoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(BookLoadError::CannotOpen)?;
        let book = Self::from_reader(&mut BufReader::new(file))?;
        log::info!(
            "loaded opening book: {} entries from {}",
            book.len(),
            path.display()
        );
        Ok(book)
    }

    /// Read a compiled book from any byte source.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self, BookLoadError> {
        let mut header = [0u8; BOOK_HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|_| BookLoadError::ShortHeader)?;
        let count = u32::from_le_bytes(header) as usize;

        let mut entries = Vec::with_capacity(count);
        let mut record = [0u8; BOOK_RECORD_SIZE];
        for read in 0..count {
            reader
                .read_exact(&mut record)
                .map_err(|_| BookLoadError::ShortBody {
                    expected: count,
                    read,
                })?;
            entries.push(BookEntry {
                fingerprint: u64::from_le_bytes(record[..8].try_into().expect("8-byte slice")),
                weight: u16::from_le_bytes(record[8..10].try_into().expect("2-byte slice")),
            });
        }

        Ok(CompiledBook { entries })
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in fingerprint order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[BookEntry] {
        &self.entries
    }

    /// Book weight of a position, `None` when it is not in the book.
    #[must_use]
    pub fn lookup(&self, position: &impl Position) -> Option<u16> {
        self.lookup_fingerprint(position.fingerprint())
    }

    /// Binary search by fingerprint. Entries are unique post-compaction,
    /// so at most one can match.
    #[must_use]
    pub fn lookup_fingerprint(&self, fingerprint: u64) -> Option<u16> {
        self.entries
            .binary_search_by_key(&fingerprint, |e| e.fingerprint)
            .ok()
            .map(|idx| self.entries[idx].weight)
    }
}

/// Why a compiled book failed to load.
#[derive(Debug)]
pub enum BookLoadError {
    /// The file could not be opened.
    CannotOpen(io::Error),
    /// The entry-count header could not be read in full.
    ShortHeader,
    /// The body ended before the promised entry count.
    ShortBody { expected: usize, read: usize },
}

impl fmt::Display for BookLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookLoadError::CannotOpen(err) => write!(f, "cannot open book file: {err}"),
            BookLoadError::ShortHeader => write!(f, "book file shorter than its header"),
            BookLoadError::ShortBody { expected, read } => {
                write!(f, "book body truncated: {read} of {expected} entries")
            }
        }
    }
}

impl std::error::Error for BookLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookLoadError::CannotOpen(err) => Some(err),
            _ => None,
        }
    }
}
