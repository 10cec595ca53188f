//! End-of-game detection.
//!
//! Runs after every committed move, cheapest check first; legal-move
//! enumeration is only reached when no rule-based draw applies.

use crate::adapter::GameEndReason;
use crate::moves::Color;
use crate::position::{Material, Position};

use super::history::Ledger;

/// Plies without a pawn move or capture that end the game drawn.
const FIFTY_MOVE_PLIES: u32 = 100;

/// Repetition count marking the third occurrence of a position.
const THIRD_OCCURRENCE: u32 = 2;

/// How the current game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEnd {
    /// The side to move is mated; `winner` delivered it.
    Checkmate { winner: Color },
    Stalemate,
    FiftyMoves,
    Repetition,
    DeadPosition,
}

impl GameEnd {
    /// Winner and reason in the adapter's vocabulary.
    #[must_use]
    pub fn verdict(self) -> (Option<Color>, GameEndReason) {
        match self {
            GameEnd::Checkmate { winner } => (Some(winner), GameEndReason::Checkmate),
            GameEnd::Stalemate => (None, GameEndReason::Stalemate),
            GameEnd::FiftyMoves => (None, GameEndReason::FiftyMoveRule),
            GameEnd::Repetition => (None, GameEndReason::ThreefoldRepetition),
            GameEnd::DeadPosition => (None, GameEndReason::InsufficientMaterial),
        }
    }
}

/// Check whether the game at the ledger's current position is over.
///
/// Order matters: clock and repetition are O(1) against the ledger, the
/// material table is a struct compare, and only then are legal moves
/// enumerated.
pub fn evaluate<P: Position>(ledger: &Ledger<P>) -> Option<GameEnd> {
    let position = ledger.current();

    if position.halfmove_clock() >= FIFTY_MOVE_PLIES {
        return Some(GameEnd::FiftyMoves);
    }

    if ledger.repetition_count() >= THIRD_OCCURRENCE {
        return Some(GameEnd::Repetition);
    }

    if is_dead_position(&position.material()) {
        return Some(GameEnd::DeadPosition);
    }

    if position.legal_moves().is_empty() {
        return Some(if position.in_check() {
            GameEnd::Checkmate {
                winner: position.side_to_move().opponent(),
            }
        } else {
            GameEnd::Stalemate
        });
    }

    None
}

/// Neither side can mate: at most one minor piece on the whole board, or
/// bishops only with every bishop on the same square color class.
#[must_use]
pub fn is_dead_position(material: &Material) -> bool {
    let (white, black) = (material.white, material.black);

    if white.majors_and_pawns() > 0 || black.majors_and_pawns() > 0 {
        return false;
    }

    if white.minors() + black.minors() <= 1 {
        return true;
    }

    let knights = white.knights + black.knights;
    let light = white.light_bishops + black.light_bishops;
    let dark = white.dark_bishops + black.dark_bishops;
    knights == 0 && (light == 0 || dark == 0)
}
