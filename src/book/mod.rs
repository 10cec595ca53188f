//! Opening book: offline builder, compiled runtime format, and the
//! weighted move selector that feeds the controller's think cycle.

pub mod builder;
pub mod compiled;
pub mod select;

pub use builder::{BookBuilder, GameSource, IngestStats, ParsedGame};
pub use compiled::{BookEntry, BookLoadError, CompiledBook};
pub use select::{book_candidates, pick_weighted, BookCandidate};
