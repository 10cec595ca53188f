//! Book move selection: filtering and weighted-random choice.

use rand::Rng;

use crate::game::Ledger;
use crate::moves::Move;
use crate::position::Position;

use super::compiled::CompiledBook;

/// A legal move whose resulting position is in the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookCandidate {
    pub mv: Move,
    pub weight: u32,
}

/// Collect the book moves available from the ledger's current position.
///
/// Every legal move is applied to a scratch copy and the resulting
/// fingerprint probed. A hit is dropped when the move exactly reverses a
/// move already played since the last capture or promotion; shuffling a
/// piece straight back out of book is never worth a book hit. The result
/// is sorted by descending weight, which affects display only, not the
/// draw below.
#[must_use]
pub fn book_candidates<P: Position>(
    book: &CompiledBook,
    ledger: &Ledger<P>,
) -> Vec<BookCandidate> {
    let position = ledger.current();
    let mut candidates = Vec::new();

    for mv in position.legal_moves() {
        let mut scratch = position.clone();
        if scratch.apply_move(mv).is_err() {
            continue;
        }
        let Some(weight) = book.lookup(&scratch) else {
            continue;
        };
        if ledger.recent_reversible_moves().any(|prev| mv.reverses(&prev)) {
            continue;
        }
        candidates.push(BookCandidate {
            mv,
            weight: u32::from(weight),
        });
    }

    candidates.sort_by(|a, b| b.weight.cmp(&a.weight));
    candidates
}

/// Pick a candidate with probability proportional to its weight.
///
/// The draw is a masked rejection sample: mask is the smallest 2^k - 1
/// covering the total weight, and masked draws at or above the total are
/// redrawn, leaving an exactly uniform integer in [0, total). Walking the
/// list subtracting weights then lands the draw in one move's band.
#[must_use]
pub fn pick_weighted<R: Rng>(rng: &mut R, candidates: &[BookCandidate]) -> Option<Move> {
    let total: u64 = candidates.iter().map(|c| u64::from(c.weight)).sum();
    if total == 0 {
        return None;
    }

    let mask = (total + 1).next_power_of_two() - 1;
    let mut draw = loop {
        let sample = rng.gen::<u64>() & mask;
        if sample < total {
            break sample;
        }
    };

    for candidate in candidates {
        let band = u64::from(candidate.weight);
        if draw < band {
            return Some(candidate.mv);
        }
        draw -= band;
    }
    None
}
