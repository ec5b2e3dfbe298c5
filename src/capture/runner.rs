//! Host loop for interactive capture.
//!
//! Drains trigger events, starts sessions and steps them, sleeping the settle
//! delay after each device move. Triggers that arrive while a session runs
//! are passed to the sequencer, which ignores them.

use std::sync::mpsc::{Receiver, TryRecvError};

use crate::capture::export::Exporter;
use crate::capture::renderer::TileRenderer;
use crate::capture::sequencer::{CaptureReport, CaptureSequencer, SessionState, StepOutcome};
use crate::capture::trigger::TriggerEvent;

/// What happened during one host loop run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WatchSummary {
    /// Sessions started
    pub started: u32,
    /// Triggers ignored because a session was running
    pub ignored: u32,
    /// Sessions that ended in an error
    pub failed: u32,
    /// Sessions stopped by the abort flag
    pub aborted: u32,
    /// Reports of exported sessions
    pub completed: Vec<CaptureReport>,
}

/// Runs until a quit event arrives or the queue closes.
///
/// Session errors are logged and counted; the loop keeps accepting triggers.
/// A quit event during a session aborts it first.
pub fn watch<R: TileRenderer, E: Exporter>(
    sequencer: &mut CaptureSequencer<R, E>,
    events: &Receiver<TriggerEvent>,
) -> WatchSummary {
    let mut summary = WatchSummary::default();
    let mut closed = false;

    crate::log("Waiting for capture triggers (Enter to capture, q to quit)");

    loop {
        if sequencer.state() == SessionState::Running {
            loop {
                match events.try_recv() {
                    Ok(event) => handle_event(sequencer, event, &mut summary, &mut closed),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
            drive_step(sequencer, &mut summary);
            continue;
        }

        if closed {
            break;
        }
        match events.recv() {
            Ok(event) => handle_event(sequencer, event, &mut summary, &mut closed),
            Err(_) => closed = true,
        }
    }

    crate::log(&format!(
        "Watch finished: {} started, {} completed, {} failed, {} aborted, {} ignored",
        summary.started,
        summary.completed.len(),
        summary.failed,
        summary.aborted,
        summary.ignored
    ));
    summary
}

fn handle_event<R: TileRenderer, E: Exporter>(
    sequencer: &mut CaptureSequencer<R, E>,
    event: TriggerEvent,
    summary: &mut WatchSummary,
    closed: &mut bool,
) {
    match event {
        TriggerEvent::Capture => match sequencer.trigger() {
            Ok(true) => summary.started += 1,
            Ok(false) => summary.ignored += 1,
            Err(e) => {
                crate::log(&format!("Capture could not start: {}", e));
                summary.failed += 1;
            }
        },
        TriggerEvent::Quit => {
            *closed = true;
            if sequencer.state() == SessionState::Running {
                sequencer.abort_handle().request_abort();
            }
        }
    }
}

fn drive_step<R: TileRenderer, E: Exporter>(
    sequencer: &mut CaptureSequencer<R, E>,
    summary: &mut WatchSummary,
) {
    match sequencer.step() {
        Ok(StepOutcome::Positioned { settle, .. }) => {
            if !settle.is_zero() {
                std::thread::sleep(settle);
            }
        }
        Ok(StepOutcome::Captured { .. }) | Ok(StepOutcome::Idle) => {}
        Ok(StepOutcome::Completed(report)) => summary.completed.push(report),
        Ok(StepOutcome::Aborted) => summary.aborted += 1,
        Err(e) => {
            if let Some((x, y)) = e.failed_tile() {
                crate::log(&format!("Session dropped at tile ({}, {})", x, y));
            }
            summary.failed += 1;
        }
    }
}
