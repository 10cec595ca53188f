//! Game-session controller.
//!
//! A single-threaded, cooperative dispatch loop: each iteration runs at
//! most one long operation (think, ponder, analyze) to completion or to an
//! interruption checkpoint, then drains pending external input. The
//! opening book is consulted before any search; the ledger records every
//! accepted move and the end-of-game rules run after each commit.

pub mod clock;
pub mod ending;
pub mod history;
pub mod state;

pub use clock::{GameClock, TimeControl};
pub use ending::{is_dead_position, GameEnd};
pub use history::{HistoryEntry, Ledger};
pub use state::{transition, Event, GameState, InvalidTransition};

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::adapter::{Adapter, GameEndReason};
use crate::book::{book_candidates, pick_weighted, CompiledBook};
use crate::input::{Command, Input, InputSource};
use crate::moves::{Color, Move};
use crate::position::Position;
use crate::search::{SearchEngine, SearchLine};
use crate::sync::InterruptFlag;

/// History must be at least this deep before resignation is considered.
const MIN_RESIGN_PLIES: usize = 5;

/// Session configuration.
#[derive(Clone, Copy, Debug)]
pub struct GameConfig {
    /// Search the predicted reply on the opponent's time.
    pub ponder: bool,
    /// Depth limit handed to the search collaborator.
    pub max_depth: u32,
    /// Scores below this (centipawns) count toward resignation.
    pub resign_threshold: i32,
    /// Probe the opening book before searching.
    pub use_book: bool,
    /// Time control for the session.
    pub time: TimeControl,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            ponder: false,
            max_depth: 64,
            resign_threshold: -550,
            use_book: true,
            time: TimeControl::Unlimited,
        }
    }
}

/// The session controller: state machine, ledger, book and clock.
pub struct GameController<P, S, A, I>
where
    P: Position,
    S: SearchEngine<P>,
    A: Adapter<P>,
    I: InputSource,
{
    ledger: Ledger<P>,
    initial: P,
    state: GameState,
    engine_color: Option<Color>,
    search: S,
    adapter: A,
    input: I,
    book: Option<CompiledBook>,
    config: GameConfig,
    clock: GameClock,
    interrupt: InterruptFlag,
    /// Opponent reply we are pondering on, if any.
    predicted: Option<Move>,
    /// Line produced by the ponder search.
    ponder_line: Option<SearchLine>,
    /// Line to commit on the next think without searching again.
    pending_line: Option<SearchLine>,
    ponder_started: Option<Instant>,
    game_over: bool,
    rng: StdRng,
}

impl<P, S, A, I> GameController<P, S, A, I>
where
    P: Position,
    S: SearchEngine<P>,
    A: Adapter<P>,
    I: InputSource,
{
    /// Create a controller observing `initial`. The engine plays neither
    /// side until `go` or a new game assigns it one.
    pub fn new(initial: P, search: S, adapter: A, input: I, config: GameConfig) -> Self {
        GameController {
            ledger: Ledger::new(initial.clone()),
            initial,
            state: GameState::Observing,
            engine_color: None,
            search,
            adapter,
            input,
            book: None,
            clock: GameClock::new(config.time),
            config,
            interrupt: InterruptFlag::new(),
            predicted: None,
            ponder_line: None,
            pending_line: None,
            ponder_started: None,
            game_over: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Attach a compiled opening book.
    #[must_use]
    pub fn with_book(mut self, book: CompiledBook) -> Self {
        self.book = Some(book);
        self
    }

    /// Use `flag` as the interrupt token. Pass the same flag to the input
    /// channel so enqueues stop an active search.
    #[must_use]
    pub fn with_interrupt(mut self, flag: InterruptFlag) -> Self {
        self.interrupt = flag;
        self
    }

    /// Current controller state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> GameState {
        self.state
    }

    /// The move ledger.
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &Ledger<P> {
        &self.ledger
    }

    /// The adapter, for inspecting what was reported.
    #[inline]
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The search collaborator.
    #[inline]
    #[must_use]
    pub fn search(&self) -> &S {
        &self.search
    }

    /// Whether the current game has been reported over.
    #[inline]
    #[must_use]
    pub fn game_over(&self) -> bool {
        self.game_over
    }

    /// Side the engine currently plays, if any.
    #[inline]
    #[must_use]
    pub fn engine_color(&self) -> Option<Color> {
        self.engine_color
    }

    /// Run the dispatch loop until the session quits.
    pub fn run(&mut self) {
        while self.state != GameState::Quitting {
            self.step();
        }
    }

    /// One dispatch iteration: at most one long operation, then drain.
    pub fn step(&mut self) {
        match self.state {
            GameState::Thinking => self.think(),
            GameState::Pondering => self.ponder(),
            GameState::Analyzing => self.analyze(),
            GameState::PonderMissed => self.apply_event(Event::Rethink),
            GameState::Observing | GameState::PonderComplete | GameState::AnalysisComplete => {
                match self.input.recv() {
                    Some(input) => self.handle_input(input),
                    None => self.state = GameState::Quitting,
                }
            }
            GameState::Quitting => return,
        }
        self.drain_input();
    }

    fn drain_input(&mut self) {
        while self.state != GameState::Quitting {
            match self.input.try_recv() {
                Some(input) => self.handle_input(input),
                None => break,
            }
        }
    }

    /// Apply an event the controller itself produced. These edges exist in
    /// the table by construction; a miss is a bug worth hearing about.
    fn apply_event(&mut self, event: Event) {
        match transition(self.state, event) {
            Ok(next) => {
                if next != self.state {
                    log::debug!("state {} -> {} ({:?})", self.state, next, event);
                }
                self.state = next;
            }
            Err(err) => log::warn!("internal transition rejected: {err}"),
        }
    }

    /// Apply an event on behalf of an external command.
    fn try_event(&mut self, event: Event) -> Result<(), InvalidTransition> {
        let next = transition(self.state, event)?;
        if next != self.state {
            log::debug!("state {} -> {} ({:?})", self.state, next, event);
        }
        self.state = next;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Long-running operations
    // ------------------------------------------------------------------

    /// Search-to-play for the side to move, book first.
    fn think(&mut self) {
        if let Some(line) = self.pending_line.take() {
            // A completed ponder search predicted correctly; its line is
            // the answer.
            match line.best_move() {
                Some(mv) => self.commit_engine_move(mv, Some(line)),
                None => self.resign_as_mover("ponder search found no move"),
            }
            return;
        }

        if let Some(mv) = self.probe_book() {
            self.commit_engine_move(mv, None);
            return;
        }

        let line = self.run_search();
        match line.best_move() {
            Some(mv) => self.commit_engine_move(mv, Some(line)),
            None => self.resign_as_mover("search found no move"),
        }
    }

    fn run_search(&mut self) -> SearchLine {
        let position = self.ledger.current().clone();
        let prior = self.last_engine_score();

        self.interrupt.clear();
        let started = Instant::now();
        let timer = self.clock.hard_limit_ms().map(|ms| {
            clock::spawn_deadline_timer(
                started + Duration::from_millis(ms),
                self.interrupt.clone(),
            )
        });

        let line =
            self.search
                .search_best_line(&position, prior, self.config.max_depth, &self.interrupt);

        if let Some(handle) = timer {
            // Raising the flag lets the deadline timer exit promptly.
            self.interrupt.raise();
            let _ = handle.join();
        }

        self.clock.charge(started.elapsed());
        self.adapter.show_search_info(&position, &line);
        line
    }

    /// Background search on the predicted opponent reply.
    fn ponder(&mut self) {
        let Some(predicted) = self.predicted else {
            self.apply_event(Event::ObserveRequested);
            return;
        };

        let mut scratch = self.ledger.current().clone();
        if scratch.apply_move(predicted).is_err() {
            log::warn!("retracting unplayable ponder prediction {predicted}");
            self.predicted = None;
            self.apply_event(Event::ObserveRequested);
            return;
        }

        self.interrupt.clear();
        self.ponder_started = Some(Instant::now());
        let prior = self.last_engine_score();
        let line =
            self.search
                .search_best_line(&scratch, prior, self.config.max_depth, &self.interrupt);

        let interrupted = self.interrupt.is_raised();
        self.ponder_line = Some(line);
        if !interrupted {
            self.apply_event(Event::PonderSearchFinished);
        }
        // When interrupted the state stays Pondering; the drain that
        // follows routes the real move to resolve_prediction.
    }

    /// Continuous search that never commits a move.
    fn analyze(&mut self) {
        let position = self.ledger.current().clone();
        self.interrupt.clear();
        let prior = self.last_engine_score();
        let line =
            self.search
                .search_best_line(&position, prior, self.config.max_depth, &self.interrupt);
        self.adapter.show_search_info(&position, &line);

        if !self.interrupt.is_raised() {
            self.apply_event(Event::AnalyzeFinished);
        }
    }

    // ------------------------------------------------------------------
    // Input handling
    // ------------------------------------------------------------------

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::Move(text) => self.handle_move(&text),
            Input::Command(cmd) => self.handle_command(cmd),
        }
    }

    fn handle_move(&mut self, text: &str) {
        let mv: Move = match text.parse() {
            Ok(mv) => mv,
            Err(err) => {
                self.adapter.reject_move(text, &err.to_string());
                return;
            }
        };

        if self.game_over && !self.state.in_analysis() {
            self.adapter.reject_move(text, "the game is over");
            return;
        }

        match self.state {
            GameState::Observing => self.apply_external_move(text, mv),
            GameState::Pondering | GameState::PonderComplete => {
                self.resolve_prediction(text, mv);
            }
            GameState::Analyzing | GameState::AnalysisComplete => {
                self.apply_analysis_move(text, mv);
            }
            _ => self.adapter.reject_move(text, "not expecting a move now"),
        }
    }

    /// Opponent move while observing: apply, check the game, and think if
    /// the engine owns the side now to move.
    fn apply_external_move(&mut self, text: &str, mv: Move) {
        if let Err(err) = self.ledger.play_move(mv, None) {
            self.adapter.reject_move(text, &err.to_string());
            return;
        }
        self.apply_event(Event::OpponentMoveApplied);

        if let Some(end) = ending::evaluate(&self.ledger) {
            self.finish_game(end);
            return;
        }

        if self.engine_color == Some(self.ledger.current().side_to_move()) {
            self.apply_event(Event::GoRequested);
        }
    }

    /// The real opponent move arrived while a prediction was outstanding.
    fn resolve_prediction(&mut self, text: &str, mv: Move) {
        if Some(mv) == self.predicted {
            // Ponder hit: the prediction becomes a real move, the time
            // spent pondering comes back, and a finished ponder search
            // already holds the reply.
            if let Err(err) = self.ledger.play_move(mv, None) {
                self.adapter.reject_move(text, &err.to_string());
                return;
            }
            let completed = self.state == GameState::PonderComplete;
            if let Some(started) = self.ponder_started.take() {
                self.clock.credit(started.elapsed());
            }
            self.predicted = None;
            self.pending_line = if completed { self.ponder_line.take() } else { None };
            self.ponder_line = None;
            self.apply_event(Event::PredictionMatched);

            if let Some(end) = ending::evaluate(&self.ledger) {
                self.finish_game(end);
            }
        } else {
            // Ponder miss: retract the prediction, apply the real move,
            // rethink from scratch.
            if let Err(err) = self.ledger.play_move(mv, None) {
                self.adapter.reject_move(text, &err.to_string());
                return;
            }
            self.predicted = None;
            self.ponder_line = None;
            self.ponder_started = None;
            self.apply_event(Event::PredictionMissed);

            if let Some(end) = ending::evaluate(&self.ledger) {
                self.finish_game(end);
            } else {
                self.apply_event(Event::Rethink);
            }
        }
    }

    /// Analysis applies external moves in place and resumes searching.
    fn apply_analysis_move(&mut self, text: &str, mv: Move) {
        match self.ledger.play_move(mv, None) {
            Ok(_) => self.apply_event(Event::OpponentMoveApplied),
            Err(err) => self.adapter.reject_move(text, &err.to_string()),
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Quit => self.apply_event(Event::QuitRequested),
            Command::NewGame => self.new_game(),
            Command::Go => {
                if self.game_over {
                    self.adapter.reject_move("go", "the game is over");
                } else if let Err(err) = self.try_event(Event::GoRequested) {
                    self.adapter.reject_move("go", &err.to_string());
                } else {
                    self.engine_color = Some(self.ledger.current().side_to_move());
                }
            }
            Command::Observe => {
                if let Err(err) = self.try_event(Event::ObserveRequested) {
                    self.adapter.reject_move("observe", &err.to_string());
                } else {
                    self.engine_color = None;
                    self.predicted = None;
                    self.ponder_line = None;
                    self.pending_line = None;
                }
            }
            Command::Analyze => {
                if let Err(err) = self.try_event(Event::AnalyzeRequested) {
                    self.adapter.reject_move("analyze", &err.to_string());
                } else {
                    self.engine_color = None;
                }
            }
            Command::ExitAnalyze => {
                if let Err(err) = self.try_event(Event::AnalyzeExited) {
                    self.adapter.reject_move("exit", &err.to_string());
                }
            }
            Command::Undo(count) => self.handle_undo(count),
            Command::Ponder(enabled) => {
                self.config.ponder = enabled;
                if !enabled && self.state.awaits_prediction() {
                    self.predicted = None;
                    self.ponder_line = None;
                    self.pending_line = None;
                    self.apply_event(Event::ObserveRequested);
                }
            }
            Command::MoveNow => {
                // The enqueue already raised the interrupt; by drain time
                // the search has wound down.
                log::debug!("move-now acknowledged");
            }
            Command::SetDepth(depth) => self.config.max_depth = depth,
        }
    }

    fn handle_undo(&mut self, count: u32) {
        let allowed = self.state.is_idle() || self.state == GameState::Analyzing;
        if !allowed {
            self.adapter.reject_move("undo", "cannot take back moves now");
            return;
        }

        let popped = self.ledger.undo(count);
        // Any outstanding prediction referenced a position that may just
        // have been discarded.
        self.predicted = None;
        self.ponder_line = None;
        self.pending_line = None;
        if popped > 0 {
            self.game_over = false;
        }

        if self.state.in_analysis() {
            self.apply_event(Event::OpponentMoveApplied);
        } else if self.state == GameState::PonderComplete {
            self.apply_event(Event::ObserveRequested);
        }
    }

    fn new_game(&mut self) {
        self.ledger.reset(self.initial.clone());
        self.predicted = None;
        self.ponder_line = None;
        self.pending_line = None;
        self.ponder_started = None;
        self.game_over = false;
        self.engine_color = Some(Color::Black);
        self.clock = GameClock::new(self.config.time);
        // A reset re-initializes the machine rather than transitioning it.
        self.state = GameState::Observing;
        log::debug!("new game");
    }

    // ------------------------------------------------------------------
    // Commit and game-end plumbing
    // ------------------------------------------------------------------

    /// Commit an engine move (searched or book), then run the post-move
    /// checks in order: game end, resignation, mate announcement.
    fn commit_engine_move(&mut self, mv: Move, line: Option<SearchLine>) {
        let mover = self.ledger.current().side_to_move();
        let predicted = line.as_ref().and_then(SearchLine::predicted_reply);

        if let Err(err) = self.ledger.play_move(mv, line.clone()) {
            log::warn!("position rejected engine move: {err}");
            self.resign(mover, "engine produced an unplayable move");
            return;
        }
        self.adapter.propose_move(self.ledger.current(), mv);

        if let Some(end) = ending::evaluate(&self.ledger) {
            self.finish_game(end);
            return;
        }

        if self.should_resign() {
            self.resign(mover, "losing score trend");
            return;
        }

        if let Some(n) = line.as_ref().and_then(SearchLine::mate_distance) {
            self.adapter.announce_mate(mover, n);
        }

        let ponder = self.config.ponder && predicted.is_some();
        self.predicted = if ponder { predicted } else { None };
        self.apply_event(Event::MoveCommitted { ponder });

        if let Some(hint) = self.predicted {
            self.adapter.offer_ponder_hint(self.ledger.current(), hint);
        }
    }

    fn finish_game(&mut self, end: GameEnd) {
        let (winner, reason) = end.verdict();
        log::info!("game over: {reason}");
        self.adapter.report_result(winner, reason);
        self.game_over = true;
        self.predicted = None;
        self.ponder_line = None;
        self.pending_line = None;
        self.apply_event(Event::GameEnded);
    }

    fn resign(&mut self, loser: Color, why: &str) {
        log::info!("resigning as {loser}: {why}");
        self.adapter
            .report_result(Some(loser.opponent()), GameEndReason::Resignation);
        self.game_over = true;
        self.predicted = None;
        self.ponder_line = None;
        self.pending_line = None;
        self.apply_event(Event::GameEnded);
    }

    fn resign_as_mover(&mut self, why: &str) {
        let loser = self.ledger.current().side_to_move();
        self.resign(loser, why);
    }

    /// The engine's own last three scores sit two plies apart because a
    /// score is recorded only on engine moves. Non-improving and all below
    /// the threshold means the game is lost and going nowhere.
    fn should_resign(&self) -> bool {
        let ply = self.ledger.ply();
        if ply < MIN_RESIGN_PLIES {
            return false;
        }
        let (Some(s0), Some(s2), Some(s4)) = (
            self.ledger.score_at(ply),
            self.ledger.score_at(ply - 2),
            self.ledger.score_at(ply - 4),
        ) else {
            return false;
        };

        let threshold = self.config.resign_threshold;
        s0 <= s2 && s2 <= s4 && s0 < threshold && s2 < threshold && s4 < threshold
    }

    fn probe_book(&mut self) -> Option<Move> {
        if !self.config.use_book {
            return None;
        }
        let book = self.book.as_ref()?;
        let candidates = book_candidates(book, &self.ledger);
        let pick = pick_weighted(&mut self.rng, &candidates);
        if let Some(mv) = pick {
            log::debug!("book move {mv} from {} candidates", candidates.len());
        }
        pick
    }

    fn last_engine_score(&self) -> i32 {
        self.ledger
            .entries()
            .iter()
            .rev()
            .find_map(|e| e.line.as_ref().map(|l| l.score))
            .unwrap_or(0)
    }
}
