//! Mutable opening-book tree, built offline from a game corpus.
//!
//! The tree is an index arena ordered by position fingerprint: duplicate
//! positions merge into an occurrence count instead of new nodes.
//! Traversal and teardown are iterative, so a degenerate corpus (one long
//! forced line) cannot blow the stack.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::moves::Move;
use crate::position::{IllegalMove, Position};

use super::compiled::{BOOK_HEADER_SIZE, BOOK_RECORD_SIZE};

/// Node in the builder tree. Children are arena indices.
#[derive(Clone, Copy, Debug)]
struct Node {
    fingerprint: u64,
    count: u32,
    left: Option<u32>,
    right: Option<u32>,
}

impl Node {
    fn new(fingerprint: u64) -> Self {
        Node {
            fingerprint,
            count: 1,
            left: None,
            right: None,
        }
    }
}

/// A parsed game as delivered by the notation-parser collaborator.
#[derive(Clone, Debug)]
pub struct ParsedGame<P> {
    /// Position the game record starts from.
    pub start: P,
    /// Moves as recorded, in play order.
    pub moves: Vec<Move>,
}

/// The notation-parser collaborator: streams parsed games until the
/// source is exhausted.
pub trait GameSource<P: Position> {
    fn next_game(&mut self) -> Option<ParsedGame<P>>;
}

/// Counters reported by [`BookBuilder::add_game_collection`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IngestStats {
    /// Games read from the source.
    pub games_seen: u64,
    /// Games that met the length filter and replayed cleanly.
    pub games_kept: u64,
    /// Positions inserted, including duplicates folded into counts.
    pub positions_inserted: u64,
}

/// Mutable sorted tree of position fingerprints with occurrence counts.
#[derive(Debug, Default)]
pub struct BookBuilder {
    nodes: Vec<Node>,
    insertions: u64,
}

impl BookBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        BookBuilder::default()
    }

    /// Number of distinct positions in the tree.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total insertions so far (sum of all occurrence counts).
    #[inline]
    #[must_use]
    pub fn total_insertions(&self) -> u64 {
        self.insertions
    }

    /// Insert a position, merging into an existing node's count on an
    /// exact fingerprint match. Returns the position's occurrence count
    /// after the insert.
    pub fn insert(&mut self, position: &impl Position) -> u32 {
        self.insert_fingerprint(position.fingerprint())
    }

    pub(crate) fn insert_fingerprint(&mut self, fingerprint: u64) -> u32 {
        self.insertions += 1;

        if self.nodes.is_empty() {
            self.nodes.push(Node::new(fingerprint));
            return 1;
        }

        let mut idx = 0usize;
        loop {
            let node = self.nodes[idx];
            let child = match fingerprint.cmp(&node.fingerprint) {
                std::cmp::Ordering::Equal => {
                    self.nodes[idx].count += 1;
                    return self.nodes[idx].count;
                }
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
            };

            match child {
                Some(next) => idx = next as usize,
                None => {
                    let new_idx = self.nodes.len() as u32;
                    self.nodes.push(Node::new(fingerprint));
                    if fingerprint < node.fingerprint {
                        self.nodes[idx].left = Some(new_idx);
                    } else {
                        self.nodes[idx].right = Some(new_idx);
                    }
                    return 1;
                }
            }
        }
    }

    /// Occurrence count of a position, `None` if never inserted.
    #[must_use]
    pub fn find(&self, position: &impl Position) -> Option<u32> {
        self.find_fingerprint(position.fingerprint())
    }

    pub(crate) fn find_fingerprint(&self, fingerprint: u64) -> Option<u32> {
        let mut idx = 0usize;
        if self.nodes.is_empty() {
            return None;
        }
        loop {
            let node = self.nodes[idx];
            let child = match fingerprint.cmp(&node.fingerprint) {
                std::cmp::Ordering::Equal => return Some(node.count),
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
            };
            idx = child? as usize;
        }
    }

    /// Replay a parsed game from its start position, inserting every
    /// resulting position including the start. Replay is capped at
    /// `max_plies` recorded moves.
    ///
    /// Returns positions inserted. A move the position rejects aborts the
    /// rest of the game; positions inserted up to that point stay in the
    /// tree.
    pub fn add_game<P: Position>(
        &mut self,
        game: &ParsedGame<P>,
        max_plies: usize,
    ) -> Result<usize, IllegalMove> {
        let mut position = game.start.clone();
        self.insert(&position);
        let mut inserted = 1;

        for &mv in game.moves.iter().take(max_plies) {
            position.apply_move(mv)?;
            self.insert(&position);
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Fold every game from `source` into the tree.
    ///
    /// Games shorter than `min_moves` are skipped; games whose recorded
    /// moves the position rejects are logged and dropped (positions
    /// replayed before the bad move remain counted).
    pub fn add_game_collection<P: Position>(
        &mut self,
        source: &mut impl GameSource<P>,
        min_moves: usize,
        max_plies: usize,
    ) -> IngestStats {
        let mut stats = IngestStats::default();

        while let Some(game) = source.next_game() {
            stats.games_seen += 1;
            if game.moves.len() < min_moves {
                continue;
            }

            let before = self.insertions;
            match self.add_game(&game, max_plies) {
                Ok(_) => stats.games_kept += 1,
                Err(err) => {
                    log::warn!("skipping game {}: {err}", stats.games_seen);
                }
            }
            stats.positions_inserted += self.insertions - before;
        }

        log::info!(
            "book ingestion: {} games seen, {} kept, {} positions",
            stats.games_seen,
            stats.games_kept,
            stats.positions_inserted
        );
        stats
    }

    /// Positions that occur at least `min_count` times.
    #[must_use]
    pub fn count_positions(&self, min_count: u32) -> usize {
        self.nodes.iter().filter(|n| n.count >= min_count).count()
    }

    /// In-order traversal: `(fingerprint, count)` pairs in strictly
    /// increasing fingerprint order.
    #[must_use]
    pub fn in_order(&self) -> InOrder<'_> {
        let mut iter = InOrder {
            nodes: &self.nodes,
            stack: Vec::new(),
        };
        if !self.nodes.is_empty() {
            iter.push_left_spine(0);
        }
        iter
    }

    /// Serialize the compiled-book format: surviving-entry count, then one
    /// fixed-size record per position with `count >= min_count`.
    ///
    /// Counts are right-shifted just enough for the largest survivor to
    /// fit 16 bits; survivors shifted to zero are clamped to 1. Returns
    /// positions written.
    pub fn write_compiled<W: Write>(&self, writer: &mut W, min_count: u32) -> io::Result<usize> {
        let surviving = self.count_positions(min_count);
        let shift = self.count_shift(min_count);

        writer.write_all(&(surviving as u32).to_le_bytes())?;

        let mut written = 0;
        for (fingerprint, count) in self.in_order() {
            if count < min_count {
                continue;
            }
            let weight = ((count >> shift) as u16).max(1);

            let mut record = [0u8; BOOK_RECORD_SIZE];
            record[..8].copy_from_slice(&fingerprint.to_le_bytes());
            record[8..10].copy_from_slice(&weight.to_le_bytes());
            writer.write_all(&record)?;
            written += 1;
        }

        debug_assert_eq!(written, surviving);
        Ok(written)
    }

    /// Write the compiled book to `path`. Returns positions written.
    pub fn export_to_file<Q: AsRef<Path>>(&self, path: Q, min_count: u32) -> io::Result<usize> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.write_compiled(&mut writer, min_count)?;
        writer.flush()?;
        log::info!(
            "exported opening book: {written} positions ({} bytes) to {}",
            BOOK_HEADER_SIZE + written * BOOK_RECORD_SIZE,
            path.display()
        );
        Ok(written)
    }

    /// Smallest right-shift that fits the largest surviving count in 16
    /// bits.
    fn count_shift(&self, min_count: u32) -> u32 {
        let max = self
            .nodes
            .iter()
            .filter(|n| n.count >= min_count)
            .map(|n| n.count)
            .max()
            .unwrap_or(0);

        let mut shift = 0;
        while (max >> shift) > u32::from(u16::MAX) {
            shift += 1;
        }
        shift
    }
}

/// Iterative in-order traversal over the builder tree.
pub struct InOrder<'a> {
    nodes: &'a [Node],
    stack: Vec<u32>,
}

impl InOrder<'_> {
    fn push_left_spine(&mut self, mut idx: u32) {
        loop {
            self.stack.push(idx);
            match self.nodes[idx as usize].left {
                Some(left) => idx = left,
                None => break,
            }
        }
    }
}

impl Iterator for InOrder<'_> {
    type Item = (u64, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let node = self.nodes[idx as usize];
        if let Some(right) = node.right {
            self.push_left_spine(right);
        }
        Some((node.fingerprint, node.count))
    }
}
