//! Trigger events and the abort signal.
//!
//! Triggers reach the host loop through a `std::sync::mpsc` channel. The
//! abort signal is a shared flag checked by the sequencer before every step.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// An input event for the host loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Start a capture session (ignored while one is running)
    Capture,
    /// Stop the host loop, aborting any running session
    Quit,
}

/// Creates a new trigger queue.
///
/// The sender side goes to whatever produces input (stdin reader, tests),
/// the receiver side to the host loop. Dropping every sender closes the queue.
pub fn create_trigger_queue() -> (Sender<TriggerEvent>, Receiver<TriggerEvent>) {
    channel()
}

/// Maps one line of interactive input to an event.
///
/// `q` / `quit` stops the loop; any other line (including an empty one) is a
/// capture trigger.
pub fn parse_trigger_line(line: &str) -> TriggerEvent {
    match line.trim() {
        "q" | "quit" | "exit" => TriggerEvent::Quit,
        _ => TriggerEvent::Capture,
    }
}

/// Spawns a thread that turns stdin lines into trigger events.
///
/// The thread exits on EOF, on a quit line, or once the receiver is gone.
pub fn spawn_stdin_triggers(sender: Sender<TriggerEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let event = parse_trigger_line(&line);
            if sender.send(event).is_err() || event == TriggerEvent::Quit {
                break;
            }
        }
    })
}

/// Cancellation flag for a capture session.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    requested: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests abort of the running session.
    pub fn request_abort(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Clears the flag. Called when a new session starts.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trigger_line() {
        assert_eq!(parse_trigger_line(""), TriggerEvent::Capture);
        assert_eq!(parse_trigger_line("c"), TriggerEvent::Capture);
        assert_eq!(parse_trigger_line("  q \n"), TriggerEvent::Quit);
        assert_eq!(parse_trigger_line("quit"), TriggerEvent::Quit);
    }

    #[test]
    fn test_trigger_queue_preserves_order() {
        let (sender, receiver) = create_trigger_queue();
        sender.send(TriggerEvent::Capture).unwrap();
        sender.send(TriggerEvent::Quit).unwrap();
        drop(sender);

        assert_eq!(receiver.recv().unwrap(), TriggerEvent::Capture);
        assert_eq!(receiver.recv().unwrap(), TriggerEvent::Quit);
        assert!(receiver.recv().is_err());
    }

    #[test]
    fn test_abort_handle_is_shared() {
        let handle = AbortHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_requested());

        clone.request_abort();
        assert!(handle.is_requested());

        handle.reset();
        assert!(!clone.is_requested());
    }
}
