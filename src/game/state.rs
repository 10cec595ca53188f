//! Controller states and the transition table.
//!
//! The controller is a single-mode machine: every long-running decision
//! (search, ponder, analyze) belongs to exactly one state, and every edge
//! goes through [`transition`] so each one can be tested on its own.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The controller's single current mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GameState {
    /// Idle; opponent moves are applied without search.
    Observing,
    /// Running search-to-play.
    Thinking,
    /// Background search on the predicted opponent reply.
    Pondering,
    /// The prediction missed; re-enters Thinking immediately.
    PonderMissed,
    /// Ponder search finished before the opponent moved.
    PonderComplete,
    /// Continuous interruptible search, never commits moves.
    Analyzing,
    /// Analysis ran to its depth limit; waiting for input.
    AnalysisComplete,
    /// Terminal.
    Quitting,
}

impl GameState {
    /// States in which the dispatch loop blocks for input instead of
    /// running an operation.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(
            self,
            GameState::Observing | GameState::PonderComplete | GameState::AnalysisComplete
        )
    }

    /// States in which a ponder prediction is outstanding.
    #[must_use]
    pub const fn awaits_prediction(self) -> bool {
        matches!(self, GameState::Pondering | GameState::PonderComplete)
    }

    /// States in which analysis is in progress or paused.
    #[must_use]
    pub const fn in_analysis(self) -> bool {
        matches!(self, GameState::Analyzing | GameState::AnalysisComplete)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::Observing => "observing",
            GameState::Thinking => "thinking",
            GameState::Pondering => "pondering",
            GameState::PonderMissed => "ponder missed",
            GameState::PonderComplete => "ponder complete",
            GameState::Analyzing => "analyzing",
            GameState::AnalysisComplete => "analysis complete",
            GameState::Quitting => "quitting",
        };
        write!(f, "{name}")
    }
}

/// Everything that can move the controller between states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The engine was told to play the side to move.
    GoRequested,
    /// The engine was told to stop playing either side.
    ObserveRequested,
    /// A searched or book move was committed; `ponder` says whether a
    /// background search on the predicted reply follows.
    MoveCommitted { ponder: bool },
    /// An external move was applied without triggering search.
    OpponentMoveApplied,
    /// The opponent played exactly the predicted move.
    PredictionMatched,
    /// The opponent played something other than the prediction.
    PredictionMissed,
    /// A missed prediction was retracted; thinking restarts.
    Rethink,
    /// The ponder search ran to completion before any input.
    PonderSearchFinished,
    /// Continuous analysis was requested.
    AnalyzeRequested,
    /// The analysis search ran to its depth limit.
    AnalyzeFinished,
    /// Analysis mode was left.
    AnalyzeExited,
    /// The game ended (mate, draw, resignation); back to idle.
    GameEnded,
    /// The session was told to terminate.
    QuitRequested,
}

/// A command/event that is not valid in the current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidTransition {
    pub state: GameState,
    pub event: Event,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} not allowed while {}", self.event, self.state)
    }
}

impl std::error::Error for InvalidTransition {}

/// The transition relation. Pure: no side effects, no controller access.
pub fn transition(state: GameState, event: Event) -> Result<GameState, InvalidTransition> {
    use Event::*;
    use GameState::*;

    let next = match (state, event) {
        (_, QuitRequested) => Quitting,

        (Observing, GoRequested) => Thinking,
        (Observing, OpponentMoveApplied) => Observing,
        (Observing, AnalyzeRequested) => Analyzing,
        (Observing, ObserveRequested) => Observing,
        (Observing, GameEnded) => Observing,

        (Thinking, MoveCommitted { ponder: true }) => Pondering,
        (Thinking, MoveCommitted { ponder: false }) => Observing,
        (Thinking, GameEnded) => Observing,

        (Pondering | PonderComplete, PredictionMatched) => Thinking,
        (Pondering | PonderComplete, PredictionMissed) => PonderMissed,
        (Pondering, PonderSearchFinished) => PonderComplete,
        (Pondering | PonderComplete, ObserveRequested) => Observing,
        (Pondering | PonderComplete, GameEnded) => Observing,

        (PonderMissed, Rethink) => Thinking,
        (PonderMissed, GameEnded) => Observing,

        (Analyzing, AnalyzeFinished) => AnalysisComplete,
        (Analyzing | AnalysisComplete, OpponentMoveApplied) => Analyzing,
        (Analyzing | AnalysisComplete, AnalyzeExited) => Observing,
        (Analyzing | AnalysisComplete, ObserveRequested) => Observing,

        _ => return Err(InvalidTransition { state, event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_think_cycle() {
        let s = transition(GameState::Observing, Event::GoRequested).unwrap();
        assert_eq!(s, GameState::Thinking);

        let s = transition(s, Event::MoveCommitted { ponder: true }).unwrap();
        assert_eq!(s, GameState::Pondering);

        let s = transition(s, Event::PredictionMatched).unwrap();
        assert_eq!(s, GameState::Thinking);

        let s = transition(s, Event::MoveCommitted { ponder: false }).unwrap();
        assert_eq!(s, GameState::Observing);
    }

    #[test]
    fn test_ponder_miss_reenters_thinking() {
        let s = transition(GameState::Pondering, Event::PredictionMissed).unwrap();
        assert_eq!(s, GameState::PonderMissed);

        let s = transition(s, Event::Rethink).unwrap();
        assert_eq!(s, GameState::Thinking);
    }

    #[test]
    fn test_ponder_completion_holds() {
        let s = transition(GameState::Pondering, Event::PonderSearchFinished).unwrap();
        assert_eq!(s, GameState::PonderComplete);

        let s = transition(s, Event::PredictionMatched).unwrap();
        assert_eq!(s, GameState::Thinking);
    }

    #[test]
    fn test_analysis_cycle() {
        let s = transition(GameState::Observing, Event::AnalyzeRequested).unwrap();
        assert_eq!(s, GameState::Analyzing);

        let s = transition(s, Event::AnalyzeFinished).unwrap();
        assert_eq!(s, GameState::AnalysisComplete);

        let s = transition(s, Event::OpponentMoveApplied).unwrap();
        assert_eq!(s, GameState::Analyzing);

        let s = transition(s, Event::AnalyzeExited).unwrap();
        assert_eq!(s, GameState::Observing);
    }

    #[test]
    fn test_quit_from_anywhere() {
        for state in [
            GameState::Observing,
            GameState::Thinking,
            GameState::Pondering,
            GameState::PonderMissed,
            GameState::PonderComplete,
            GameState::Analyzing,
            GameState::AnalysisComplete,
            GameState::Quitting,
        ] {
            assert_eq!(
                transition(state, Event::QuitRequested).unwrap(),
                GameState::Quitting
            );
        }
    }

    #[test]
    fn test_invalid_edges_rejected() {
        let err = transition(GameState::Observing, Event::AnalyzeExited).unwrap_err();
        assert_eq!(err.state, GameState::Observing);

        assert!(transition(GameState::Thinking, Event::AnalyzeRequested).is_err());
        assert!(transition(GameState::Observing, Event::PredictionMatched).is_err());
        assert!(transition(GameState::Analyzing, Event::GoRequested).is_err());
        assert!(transition(GameState::Quitting, Event::GoRequested).is_err());
    }

    #[test]
    fn test_invalid_transition_reason_text() {
        let err = transition(GameState::Observing, Event::AnalyzeExited).unwrap_err();
        assert_eq!(err.to_string(), "AnalyzeExited not allowed while observing");
    }
}
