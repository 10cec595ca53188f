//! Adapter collaborator contract.
//!
//! The adapter is the session's mouthpiece: a GUI bridge, a protocol
//! handler, a logger. The controller reports everything through it and
//! never talks to the outside world directly.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::moves::{Color, Move};
use crate::position::Position;
use crate::search::SearchLine;

/// Why a game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GameEndReason {
    Checkmate,
    Stalemate,
    FiftyMoveRule,
    ThreefoldRepetition,
    InsufficientMaterial,
    Resignation,
}

impl fmt::Display for GameEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEndReason::Checkmate => write!(f, "checkmate"),
            GameEndReason::Stalemate => write!(f, "stalemate"),
            GameEndReason::FiftyMoveRule => write!(f, "fifty move rule"),
            GameEndReason::ThreefoldRepetition => write!(f, "threefold repetition"),
            GameEndReason::InsufficientMaterial => write!(f, "insufficient material"),
            GameEndReason::Resignation => write!(f, "resignation"),
        }
    }
}

/// The human/GUI adapter collaborator.
pub trait Adapter<P: Position> {
    /// Report the end of the game. `winner` is `None` for a draw.
    fn report_result(&mut self, winner: Option<Color>, reason: GameEndReason);

    /// Announce the move the engine committed in `position`.
    fn propose_move(&mut self, position: &P, mv: Move);

    /// Reject an incoming move or command, echoing the offending text.
    fn reject_move(&mut self, text: &str, reason: &str);

    /// Offer the move the engine expects the opponent to play.
    fn offer_ponder_hint(&mut self, position: &P, mv: Move);

    /// Surface a finished search line (thinking output, analysis).
    fn show_search_info(&mut self, position: &P, line: &SearchLine);

    /// Informational "mate in n" announcement for the winning side.
    fn announce_mate(&mut self, winner: Color, moves: u32);
}
