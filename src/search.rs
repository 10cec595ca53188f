//! Search collaborator contract and score conventions.
//!
//! The full search algorithm lives outside this crate. The controller only
//! needs one operation from it: produce a principal line for a position,
//! cooperatively winding down when the interrupt token is raised.

use crate::moves::Move;
use crate::position::Position;
use crate::sync::InterruptFlag;

/// Score assigned to a delivered checkmate, in centipawns.
///
/// Mate-in-n scores count down from here: a score of `MATE_SCORE - k`
/// means mate is forced k plies ahead.
pub const MATE_SCORE: i32 = 32_000;

/// Scores above this announce a forced mate to the adapter.
pub const HIGH_MATE_THRESHOLD: i32 = MATE_SCORE - 200;

/// A principal variation with its score from the mover's perspective.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchLine {
    /// Best line found, first move is the one to play. Empty = no move.
    pub moves: Vec<Move>,
    /// Score in centipawns from the side to move's point of view.
    pub score: i32,
}

impl SearchLine {
    /// The move to play, if the search found one.
    #[inline]
    #[must_use]
    pub fn best_move(&self) -> Option<Move> {
        self.moves.first().copied()
    }

    /// The expected reply, used as the ponder prediction.
    #[inline]
    #[must_use]
    pub fn predicted_reply(&self) -> Option<Move> {
        self.moves.get(1).copied()
    }

    /// Number of full moves until mate, when the score announces one.
    #[must_use]
    pub fn mate_distance(&self) -> Option<u32> {
        if self.score > HIGH_MATE_THRESHOLD {
            Some((1 + (MATE_SCORE - self.score) / 2) as u32)
        } else {
            None
        }
    }
}

/// The search collaborator.
pub trait SearchEngine<P: Position> {
    /// Search `position` for the best line.
    ///
    /// `prior_score` is the score of the previous search from the same
    /// mover, usable as an aspiration center. The search must poll
    /// `interrupt` and return its best line so far when the flag is
    /// raised. An empty line means the search found no move at all.
    fn search_best_line(
        &mut self,
        position: &P,
        prior_score: i32,
        depth_limit: u32,
        interrupt: &InterruptFlag,
    ) -> SearchLine;
}
