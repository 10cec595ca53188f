pub mod adapter;
pub mod book;
pub mod game;
pub mod input;
pub mod moves;
pub mod position;
pub mod search;
pub mod sync;

pub use adapter::{Adapter, GameEndReason};
pub use book::{BookBuilder, BookLoadError, CompiledBook};
pub use game::{GameConfig, GameController, GameState, Ledger, TimeControl};
pub use input::{Command, Input, InputSource};
pub use moves::{Color, Move, Square};
pub use position::{AppliedMove, IllegalMove, Material, Position, SideMaterial};
pub use search::{SearchEngine, SearchLine, MATE_SCORE};
pub use sync::InterruptFlag;
