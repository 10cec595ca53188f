//! Time budget for the think cycle.
//!
//! Protocol-agnostic: the controller charges elapsed search time after
//! every committed move and credits time recovered by a ponder hit. The
//! deadline timer raises the shared interrupt token so the search winds
//! down cooperatively instead of being preempted.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::sync::InterruptFlag;

/// Default moves-to-go estimate when the time control has none.
const DEFAULT_MOVES_TO_GO: u64 = 30;

/// Maximum sleep while polling the deadline (avoids busy wake-ups).
const MAX_POLL_SLEEP_MS: u64 = 5;

/// Fraction of the per-move allotment allowed before the hard stop.
const HARD_LIMIT_FACTOR: u64 = 3;

/// Time control settings for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeControl {
    /// No time limit; depth controls the search.
    #[default]
    Unlimited,
    /// Fixed time per move.
    MoveTime { time_ms: u64 },
    /// Remaining time plus per-move increment, with an optional session
    /// move count.
    Incremental {
        base_ms: u64,
        increment_ms: u64,
        moves_per_session: Option<u64>,
    },
}

/// Running time budget derived from a [`TimeControl`].
#[derive(Debug, Clone)]
pub struct GameClock {
    control: TimeControl,
    remaining_ms: u64,
}

impl GameClock {
    /// Create a clock for the given control.
    #[must_use]
    pub fn new(control: TimeControl) -> Self {
        let remaining_ms = match control {
            TimeControl::Incremental { base_ms, .. } => base_ms,
            _ => 0,
        };
        GameClock {
            control,
            remaining_ms,
        }
    }

    /// Time remaining on the clock, when the control tracks one.
    #[inline]
    #[must_use]
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Soft time allotment for the next move, `None` when unlimited.
    #[must_use]
    pub fn allot_ms(&self) -> Option<u64> {
        match self.control {
            TimeControl::Unlimited => None,
            TimeControl::MoveTime { time_ms } => Some(time_ms.max(1)),
            TimeControl::Incremental {
                increment_ms,
                moves_per_session,
                ..
            } => {
                let moves_to_go = moves_per_session.unwrap_or(DEFAULT_MOVES_TO_GO).max(1);
                Some((self.remaining_ms / moves_to_go + increment_ms).max(1))
            }
        }
    }

    /// Hard deadline for the next move, `None` when unlimited.
    ///
    /// An explicit per-move time is its own hard limit; incremental
    /// controls may stretch to a multiple of the allotment but never past
    /// the remaining clock.
    #[must_use]
    pub fn hard_limit_ms(&self) -> Option<u64> {
        match self.control {
            TimeControl::Unlimited => None,
            TimeControl::MoveTime { time_ms } => Some(time_ms.max(1)),
            TimeControl::Incremental { .. } => self.allot_ms().map(|soft| {
                soft.saturating_mul(HARD_LIMIT_FACTOR)
                    .min(self.remaining_ms.max(1))
            }),
        }
    }

    /// Charge elapsed search time and bank the increment.
    pub fn charge(&mut self, elapsed: Duration) {
        if let TimeControl::Incremental { increment_ms, .. } = self.control {
            let spent = elapsed.as_millis() as u64;
            self.remaining_ms = self.remaining_ms.saturating_sub(spent) + increment_ms;
        }
    }

    /// Credit time recovered by a ponder hit.
    pub fn credit(&mut self, recovered: Duration) {
        if matches!(self.control, TimeControl::Incremental { .. }) {
            self.remaining_ms += recovered.as_millis() as u64;
        }
    }

    /// Overwrite the remaining time with a value reported externally.
    pub fn set_remaining_ms(&mut self, remaining_ms: u64) {
        self.remaining_ms = remaining_ms;
    }
}

/// Raise `interrupt` once `deadline` passes, unless it is raised first.
///
/// The returned thread exits as soon as the flag goes up, whether by
/// timeout or because the search ended and the controller raised it.
pub(crate) fn spawn_deadline_timer(
    deadline: Instant,
    interrupt: InterruptFlag,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        if interrupt.is_raised() {
            break;
        }
        let now = Instant::now();
        if now >= deadline {
            interrupt.raise();
            break;
        }
        let sleep_for = (deadline - now).min(Duration::from_millis(MAX_POLL_SLEEP_MS));
        thread::sleep(sleep_for);
    })
}
