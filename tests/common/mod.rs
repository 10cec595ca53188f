//! Shared fakes for the integration suites: a small deterministic board,
//! a frame-scripted position, a scripted search and a recording adapter.
#![allow(dead_code)]

use std::collections::VecDeque;

use once_cell::sync::Lazy;
use rand::prelude::*;

use chess_session::adapter::{Adapter, GameEndReason};
use chess_session::book::{GameSource, ParsedGame};
use chess_session::input::{Input, InputSource};
use chess_session::moves::{Color, Move, Square};
use chess_session::position::{AppliedMove, IllegalMove, Material, Position, SideMaterial};
use chess_session::search::{SearchEngine, SearchLine};
use chess_session::sync::InterruptFlag;

/// Shorthand for a move between square indices.
pub fn mv(from: u8, to: u8) -> Move {
    Move::new(Square::from_index(from), Square::from_index(to))
}

struct GridKeys {
    piece: [[u64; 64]; 2],
    black_to_move: u64,
}

static GRID_KEYS: Lazy<GridKeys> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(0x5eed_b00c);
    let mut piece = [[0u64; 64]; 2];
    for side in &mut piece {
        for key in side.iter_mut() {
            *key = rng.gen();
        }
    }
    GridKeys {
        piece,
        black_to_move: rng.gen(),
    }
});

/// One wandering token per side on an 8x8 board; a token steps one square
/// north, east, south or west and may not enter the opposing square.
/// Deterministic fingerprints make it a stand-in position for ledger and
/// book tests without chess rules.
#[derive(Clone, Debug)]
pub struct GridGame {
    pub white: u8,
    pub black: u8,
    pub side: Color,
    pub clock: u32,
    /// Report the next applied move as a capture (resets the clock).
    pub capture_next: bool,
}

impl GridGame {
    pub fn new() -> Self {
        GridGame {
            white: 12, // e2
            black: 52, // e7
            side: Color::White,
            clock: 0,
            capture_next: false,
        }
    }

    pub fn at(white: u8, black: u8, side: Color) -> Self {
        GridGame {
            white,
            black,
            side,
            clock: 0,
            capture_next: false,
        }
    }

    fn mover_square(&self) -> u8 {
        match self.side {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    fn other_square(&self) -> u8 {
        match self.side {
            Color::White => self.black,
            Color::Black => self.white,
        }
    }

    fn steps(from: u8) -> Vec<u8> {
        let (rank, file) = (from / 8, from % 8);
        let mut out = Vec::new();
        if rank < 7 {
            out.push(from + 8);
        }
        if file < 7 {
            out.push(from + 1);
        }
        if rank > 0 {
            out.push(from - 8);
        }
        if file > 0 {
            out.push(from - 1);
        }
        out
    }
}

impl Position for GridGame {
    fn fingerprint(&self) -> u64 {
        let keys = &GRID_KEYS;
        let mut hash = keys.piece[0][self.white as usize] ^ keys.piece[1][self.black as usize];
        if self.side == Color::Black {
            hash ^= keys.black_to_move;
        }
        hash
    }

    fn side_to_move(&self) -> Color {
        self.side
    }

    fn apply_move(&mut self, mv: Move) -> Result<AppliedMove, IllegalMove> {
        if !self.legal_moves().contains(&mv) {
            return Err(IllegalMove(mv));
        }
        match self.side {
            Color::White => self.white = mv.to.index() as u8,
            Color::Black => self.black = mv.to.index() as u8,
        }
        self.side = self.side.opponent();

        let capture = std::mem::take(&mut self.capture_next);
        if capture {
            self.clock = 0;
        } else {
            self.clock += 1;
        }
        Ok(AppliedMove {
            capture,
            promotion: false,
        })
    }

    fn legal_moves(&self) -> Vec<Move> {
        let from = self.mover_square();
        let blocked = self.other_square();
        Self::steps(from)
            .into_iter()
            .filter(|&to| to != blocked)
            .map(|to| mv(from, to))
            .collect()
    }

    fn in_check(&self) -> bool {
        false
    }

    fn halfmove_clock(&self) -> u32 {
        self.clock
    }

    fn material(&self) -> Material {
        // A pawn each keeps the dead-position rule out of the way.
        let side = SideMaterial {
            pawns: 1,
            ..SideMaterial::default()
        };
        Material {
            white: side,
            black: side,
        }
    }
}

/// One step of a scripted game.
#[derive(Clone, Debug)]
pub struct Frame {
    pub fingerprint: u64,
    pub side: Color,
    pub clock: u32,
    pub legal: Vec<Move>,
    pub check: bool,
    pub material: Material,
}

impl Frame {
    /// A live frame: some legal moves, sane material, no check.
    pub fn live(fingerprint: u64, side: Color, legal: Vec<Move>) -> Self {
        let pieces = SideMaterial {
            pawns: 2,
            rooks: 1,
            ..SideMaterial::default()
        };
        Frame {
            fingerprint,
            side,
            clock: 0,
            legal,
            check: false,
            material: Material {
                white: pieces,
                black: pieces,
            },
        }
    }

    /// A frame with no legal moves: mate when `check`, else stalemate.
    pub fn terminal(fingerprint: u64, side: Color, check: bool) -> Self {
        let mut frame = Frame::live(fingerprint, side, Vec::new());
        frame.check = check;
        frame
    }
}

/// A position whose whole future is a scripted list of frames; applying
/// any legal move advances one frame. Gives tests exact control over
/// checks, clocks and material without a board.
#[derive(Clone, Debug)]
pub struct ScriptedPosition {
    pub frames: Vec<Frame>,
    pub at: usize,
}

impl ScriptedPosition {
    pub fn new(frames: Vec<Frame>) -> Self {
        assert!(!frames.is_empty());
        ScriptedPosition { frames, at: 0 }
    }

    fn frame(&self) -> &Frame {
        &self.frames[self.at]
    }
}

impl Position for ScriptedPosition {
    fn fingerprint(&self) -> u64 {
        self.frame().fingerprint
    }

    fn side_to_move(&self) -> Color {
        self.frame().side
    }

    fn apply_move(&mut self, mv: Move) -> Result<AppliedMove, IllegalMove> {
        if self.at + 1 >= self.frames.len() || !self.frame().legal.contains(&mv) {
            return Err(IllegalMove(mv));
        }
        self.at += 1;
        Ok(AppliedMove::default())
    }

    fn legal_moves(&self) -> Vec<Move> {
        self.frame().legal.clone()
    }

    fn in_check(&self) -> bool {
        self.frame().check
    }

    fn halfmove_clock(&self) -> u32 {
        self.frame().clock
    }

    fn material(&self) -> Material {
        self.frame().material
    }
}

/// One scripted search result.
#[derive(Clone, Debug)]
pub struct ScriptedOutcome {
    pub line: SearchLine,
    /// Raise the interrupt before returning, as an interrupted search
    /// winding down would observe.
    pub interrupted: bool,
}

impl ScriptedOutcome {
    pub fn line(moves: Vec<Move>, score: i32) -> Self {
        ScriptedOutcome {
            line: SearchLine { moves, score },
            interrupted: false,
        }
    }

    pub fn empty() -> Self {
        ScriptedOutcome {
            line: SearchLine::default(),
            interrupted: false,
        }
    }
}

/// Search fake replaying scripted outcomes in order.
#[derive(Default)]
pub struct ScriptedSearch {
    pub outcomes: VecDeque<ScriptedOutcome>,
    pub calls: usize,
}

impl ScriptedSearch {
    pub fn new(outcomes: Vec<ScriptedOutcome>) -> Self {
        ScriptedSearch {
            outcomes: outcomes.into(),
            calls: 0,
        }
    }
}

impl<P: Position> SearchEngine<P> for ScriptedSearch {
    fn search_best_line(
        &mut self,
        _position: &P,
        _prior_score: i32,
        _depth_limit: u32,
        interrupt: &InterruptFlag,
    ) -> SearchLine {
        self.calls += 1;
        match self.outcomes.pop_front() {
            Some(outcome) => {
                if outcome.interrupted {
                    interrupt.raise();
                }
                outcome.line
            }
            None => SearchLine::default(),
        }
    }
}

/// Adapter fake recording everything the controller reports.
#[derive(Default)]
pub struct RecordingAdapter {
    pub results: Vec<(Option<Color>, GameEndReason)>,
    pub proposed: Vec<Move>,
    pub rejected: Vec<(String, String)>,
    pub hints: Vec<Move>,
    pub info_lines: usize,
    pub mates: Vec<(Color, u32)>,
}

impl<P: Position> Adapter<P> for RecordingAdapter {
    fn report_result(&mut self, winner: Option<Color>, reason: GameEndReason) {
        self.results.push((winner, reason));
    }

    fn propose_move(&mut self, _position: &P, mv: Move) {
        self.proposed.push(mv);
    }

    fn reject_move(&mut self, text: &str, reason: &str) {
        self.rejected.push((text.to_string(), reason.to_string()));
    }

    fn offer_ponder_hint(&mut self, _position: &P, mv: Move) {
        self.hints.push(mv);
    }

    fn show_search_info(&mut self, _position: &P, _line: &SearchLine) {
        self.info_lines += 1;
    }

    fn announce_mate(&mut self, winner: Color, moves: u32) {
        self.mates.push((winner, moves));
    }
}

/// Pre-loaded input source with the production channel's visibility rule:
/// non-blocking polls only see input once the shared interrupt flag says
/// some arrived mid-search. Blocking receives always deliver; an empty
/// queue reads as end of stream.
pub struct GatedInput {
    items: VecDeque<Input>,
    interrupt: InterruptFlag,
}

impl GatedInput {
    pub fn new(items: Vec<Input>, interrupt: InterruptFlag) -> Self {
        GatedInput {
            items: items.into(),
            interrupt,
        }
    }
}

impl InputSource for GatedInput {
    fn recv(&mut self) -> Option<Input> {
        self.items.pop_front()
    }

    fn try_recv(&mut self) -> Option<Input> {
        if self.interrupt.is_raised() {
            self.items.pop_front()
        } else {
            None
        }
    }
}

/// Game source over a pre-parsed vector.
pub struct VecGameSource<P> {
    games: VecDeque<ParsedGame<P>>,
}

impl<P> VecGameSource<P> {
    pub fn new(games: Vec<ParsedGame<P>>) -> Self {
        VecGameSource {
            games: games.into(),
        }
    }
}

impl<P: Position> GameSource<P> for VecGameSource<P> {
    fn next_game(&mut self) -> Option<ParsedGame<P>> {
        self.games.pop_front()
    }
}
