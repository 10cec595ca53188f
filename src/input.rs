//! External input: commands, moves, and the queue that carries them.
//!
//! A reader collaborator (stdin thread, socket, GUI bridge) produces
//! [`Input`] items; the controller drains them strictly between search
//! operations. Enqueuing raises the shared interrupt token so an active
//! search winds down at its next checkpoint.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::sync::InterruptFlag;

/// One item of external input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A move in coordinate notation, as received. Parsing and legality
    /// are checked at the point of use so rejections can echo the text.
    Move(String),
    /// A session command.
    Command(Command),
}

/// Session commands understood by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reset to the initial position and play Black.
    NewGame,
    /// Start thinking for the side to move.
    Go,
    /// Stop playing either side; apply moves without searching.
    Observe,
    /// Enter continuous analysis.
    Analyze,
    /// Leave analysis.
    ExitAnalyze,
    /// Take back the given number of half-moves.
    Undo(u32),
    /// Enable or disable pondering.
    Ponder(bool),
    /// Commit the best move found so far.
    MoveNow,
    /// Set the search depth limit.
    SetDepth(u32),
    /// Terminate the session.
    Quit,
}

/// Parse a line of reader input.
///
/// Returns `None` for blank lines. Anything that is not a known command
/// word is treated as a move, so unparsable moves surface as rejections
/// with the original text rather than vanishing here.
#[must_use]
pub fn parse_input(line: &str) -> Option<Input> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();

    let cmd = match parts[0] {
        "new" => Command::NewGame,
        "go" => Command::Go,
        "observe" | "force" => Command::Observe,
        "analyze" => Command::Analyze,
        "exit" => Command::ExitAnalyze,
        "undo" => {
            let count = parts.get(1).and_then(|v| v.parse().ok()).unwrap_or(1);
            Command::Undo(count)
        }
        "hard" => Command::Ponder(true),
        "easy" => Command::Ponder(false),
        "?" => Command::MoveNow,
        "sd" => {
            let depth = parts.get(1).and_then(|v| v.parse().ok()).unwrap_or(64);
            Command::SetDepth(depth)
        }
        "quit" => Command::Quit,
        other => return Some(Input::Move(other.to_string())),
    };

    Some(Input::Command(cmd))
}

/// Source of external input as seen by the controller.
pub trait InputSource {
    /// Block until the next input arrives. `None` means the stream closed
    /// and the session should quit.
    fn recv(&mut self) -> Option<Input>;

    /// Non-blocking poll used when draining between operations.
    fn try_recv(&mut self) -> Option<Input>;
}

struct Queue {
    items: VecDeque<Input>,
    senders: usize,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
    interrupt: InterruptFlag,
}

/// Producer half of the input channel, held by the reader thread.
///
/// Every enqueue raises the interrupt token; dropping the last sender
/// closes the stream.
pub struct InputSender {
    shared: Arc<Shared>,
}

impl InputSender {
    /// Enqueue one input item and wake the controller.
    pub fn send(&self, input: Input) {
        let mut queue = self.shared.queue.lock();
        queue.items.push_back(input);
        self.shared.interrupt.raise();
        self.shared.ready.notify_one();
    }

    /// Parse and enqueue a raw reader line. Blank lines are dropped.
    pub fn send_line(&self, line: &str) {
        if let Some(input) = parse_input(line) {
            self.send(input);
        }
    }
}

impl Clone for InputSender {
    fn clone(&self) -> Self {
        self.shared.queue.lock().senders += 1;
        InputSender {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for InputSender {
    fn drop(&mut self) {
        let mut queue = self.shared.queue.lock();
        queue.senders -= 1;
        if queue.senders == 0 {
            self.shared.ready.notify_all();
        }
    }
}

/// Consumer half of the input channel, owned by the controller.
pub struct ChannelInput {
    shared: Arc<Shared>,
}

/// Create a connected input channel.
///
/// `interrupt` is the controller's cancellation token; the sender raises
/// it on every enqueue.
#[must_use]
pub fn channel(interrupt: InterruptFlag) -> (InputSender, ChannelInput) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(Queue {
            items: VecDeque::new(),
            senders: 1,
        }),
        ready: Condvar::new(),
        interrupt,
    });
    (
        InputSender {
            shared: Arc::clone(&shared),
        },
        ChannelInput { shared },
    )
}

impl InputSource for ChannelInput {
    fn recv(&mut self) -> Option<Input> {
        let mut queue = self.shared.queue.lock();
        loop {
            if let Some(item) = queue.items.pop_front() {
                return Some(item);
            }
            if queue.senders == 0 {
                return None;
            }
            self.shared.ready.wait(&mut queue);
        }
    }

    fn try_recv(&mut self) -> Option<Input> {
        self.shared.queue.lock().items.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_input("new"),
            Some(Input::Command(Command::NewGame))
        );
        assert_eq!(parse_input("go"), Some(Input::Command(Command::Go)));
        assert_eq!(
            parse_input("force"),
            Some(Input::Command(Command::Observe))
        );
        assert_eq!(
            parse_input("undo 2"),
            Some(Input::Command(Command::Undo(2)))
        );
        assert_eq!(
            parse_input("undo"),
            Some(Input::Command(Command::Undo(1)))
        );
        assert_eq!(
            parse_input("hard"),
            Some(Input::Command(Command::Ponder(true)))
        );
        assert_eq!(
            parse_input("sd 12"),
            Some(Input::Command(Command::SetDepth(12)))
        );
        assert_eq!(parse_input("quit"), Some(Input::Command(Command::Quit)));
    }

    #[test]
    fn test_parse_moves_and_blanks() {
        assert_eq!(parse_input("e2e4"), Some(Input::Move("e2e4".to_string())));
        assert_eq!(
            parse_input("  not-a-command  "),
            Some(Input::Move("not-a-command".to_string()))
        );
        assert_eq!(parse_input("   "), None);
    }

    #[test]
    fn test_channel_raises_interrupt() {
        let interrupt = InterruptFlag::new();
        let (sender, mut receiver) = channel(interrupt.clone());

        assert!(!interrupt.is_raised());
        sender.send_line("e2e4");
        assert!(interrupt.is_raised());
        assert_eq!(receiver.try_recv(), Some(Input::Move("e2e4".to_string())));
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn test_channel_close_on_sender_drop() {
        let (sender, mut receiver) = channel(InterruptFlag::new());
        let extra = sender.clone();

        sender.send(Input::Command(Command::Quit));
        drop(sender);
        drop(extra);

        assert_eq!(receiver.recv(), Some(Input::Command(Command::Quit)));
        assert_eq!(receiver.recv(), None);
    }

    #[test]
    fn test_channel_blocking_recv() {
        let (sender, mut receiver) = channel(InterruptFlag::new());

        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            sender.send_line("go");
        });

        assert_eq!(receiver.recv(), Some(Input::Command(Command::Go)));
        handle.join().unwrap();
    }
}
