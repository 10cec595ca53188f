//! Position history ledger and repetition detector.
//!
//! The ledger is the authoritative record of the game: one entry per
//! accepted half-move, truncated by undo, fully reset on new game. Each
//! entry carries the repetition count computed at the moment it was
//! played, so draw detection never rescans the whole game.

use crate::moves::Move;
use crate::position::{AppliedMove, IllegalMove, Position};
use crate::search::SearchLine;

/// One committed half-move.
#[derive(Clone, Debug)]
pub struct HistoryEntry<P> {
    /// Position after the move.
    pub position: P,
    /// Fingerprint of that position.
    pub fingerprint: u64,
    /// The move that was played.
    pub mv: Move,
    /// Principal line and score, present when the engine searched.
    pub line: Option<SearchLine>,
    /// How many earlier plies held this exact position (same side to
    /// move). 2 means the third occurrence.
    pub repetition: u32,
    /// The move was a capture or promotion.
    pub irreversible: bool,
}

/// Ply-indexed record of played positions and moves.
pub struct Ledger<P: Position> {
    start: P,
    start_fingerprint: u64,
    current: P,
    entries: Vec<HistoryEntry<P>>,
}

impl<P: Position> Ledger<P> {
    /// Start a ledger at `initial` (ply 0).
    #[must_use]
    pub fn new(initial: P) -> Self {
        let start_fingerprint = initial.fingerprint();
        Ledger {
            current: initial.clone(),
            start: initial,
            start_fingerprint,
            entries: Vec::new(),
        }
    }

    /// Drop all history and restart at `initial`.
    pub fn reset(&mut self, initial: P) {
        self.start_fingerprint = initial.fingerprint();
        self.current = initial.clone();
        self.start = initial;
        self.entries.clear();
    }

    /// The position after the last committed move.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &P {
        &self.current
    }

    /// Number of committed half-moves.
    #[inline]
    #[must_use]
    pub fn ply(&self) -> usize {
        self.entries.len()
    }

    /// All committed entries, oldest first.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry<P>] {
        &self.entries
    }

    /// The most recent entry.
    #[inline]
    #[must_use]
    pub fn last_entry(&self) -> Option<&HistoryEntry<P>> {
        self.entries.last()
    }

    /// Repetition count of the current position (0 when at the start).
    #[inline]
    #[must_use]
    pub fn repetition_count(&self) -> u32 {
        self.entries.last().map_or(0, |e| e.repetition)
    }

    /// Engine score recorded at 1-based ply `ply`, if a search ran there.
    #[must_use]
    pub fn score_at(&self, ply: usize) -> Option<i32> {
        if ply == 0 || ply > self.entries.len() {
            return None;
        }
        self.entries[ply - 1].line.as_ref().map(|l| l.score)
    }

    /// Apply `mv` to the current position and append the entry.
    ///
    /// Legality is the position's call: the move is applied to a clone, so
    /// a rejected move leaves the ledger untouched.
    pub fn play_move(
        &mut self,
        mv: Move,
        line: Option<SearchLine>,
    ) -> Result<AppliedMove, IllegalMove> {
        let mut next = self.current.clone();
        let applied = next.apply_move(mv)?;

        let fingerprint = next.fingerprint();
        let repetition = self.count_repetitions(fingerprint, next.halfmove_clock());

        self.entries.push(HistoryEntry {
            position: next.clone(),
            fingerprint,
            mv,
            line,
            repetition,
            irreversible: applied.irreversible(),
        });
        self.current = next;
        Ok(applied)
    }

    /// Take back up to `count` half-moves; returns how many were popped.
    ///
    /// Any pending prediction that referenced a discarded position must be
    /// invalidated by the caller.
    pub fn undo(&mut self, count: u32) -> usize {
        let mut popped = 0;
        for _ in 0..count {
            if self.entries.pop().is_none() {
                break;
            }
            popped += 1;
        }
        if popped > 0 {
            self.current = self
                .entries
                .last()
                .map_or_else(|| self.start.clone(), |e| e.position.clone());
        }
        popped
    }

    /// Moves played since the last capture or promotion, newest first.
    ///
    /// This is the window the book selector checks for exact reversals.
    pub fn recent_reversible_moves(&self) -> impl Iterator<Item = Move> + '_ {
        self.entries
            .iter()
            .rev()
            .take_while(|e| !e.irreversible)
            .map(|e| e.mv)
    }

    /// Count earlier occurrences of `fingerprint` for the position about
    /// to land at the next ply.
    ///
    /// Only plies with the same side to move can match, and only back to
    /// the last irreversible move, so the scan starts four plies back and
    /// steps by two down to the half-move-clock boundary.
    fn count_repetitions(&self, fingerprint: u64, halfmove_clock: u32) -> u32 {
        let ply = self.entries.len() + 1;
        let boundary = ply.saturating_sub(halfmove_clock as usize);

        let mut count = 0;
        let mut q = match ply.checked_sub(4) {
            Some(q) => q,
            None => return 0,
        };
        loop {
            if q < boundary {
                break;
            }
            if self.fingerprint_at(q) == fingerprint {
                count += 1;
            }
            match q.checked_sub(2) {
                Some(prev) => q = prev,
                None => break,
            }
        }
        count
    }

    fn fingerprint_at(&self, ply: usize) -> u64 {
        if ply == 0 {
            self.start_fingerprint
        } else {
            self.entries[ply - 1].fingerprint
        }
    }
}
