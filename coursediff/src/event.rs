//! Event bus for coursediff.
//!
//! All user input, timer ticks, and background-task results are normalised into
//! a single `AppEvent` enum and sent over a tokio unbounded MPSC channel. The
//! main loop receives from this channel and dispatches accordingly.
//!
//! Two independent intervals drive the render and logic cycles:
//! - **Render interval** (33 ms) triggers a `terminal.draw()` call.
//! - **Tick interval** (250 ms) polls the annotation cache for keys to fetch.

use coursediff_core::coordinator::SubmissionEvent;
use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::loader::DataEvent;

/// All events the application can receive from any source.
#[derive(Debug)]
#[non_exhaustive]
pub enum AppEvent {
    /// A key press from the terminal (`KeyEventKind::Press` only).
    Key(KeyEvent),
    /// A mouse event from the terminal (click, drag, release, scroll).
    Mouse(MouseEvent),
    /// Terminal was resized to (columns, rows).
    Resize(u16, u16),
    /// Logic tick (250 ms).
    Tick,
    /// Render tick (33 ms).
    Render,
    /// Result of a background read (changes, history, annotations).
    Data(Box<DataEvent>),
    /// Completion of a write issued by the submission coordinator.
    Submission(SubmissionEvent),
    /// Quit signal.
    Quit,
}

impl From<SubmissionEvent> for AppEvent {
    fn from(event: SubmissionEvent) -> Self {
        AppEvent::Submission(event)
    }
}

impl From<DataEvent> for AppEvent {
    fn from(event: DataEvent) -> Self {
        AppEvent::Data(Box::new(event))
    }
}

/// Holds the sender and receiver ends of the unified event channel.
///
/// The channel is unbounded: senders are the event task, background loaders
/// and the submission coordinator, none of which may block on a slow frame.
/// Volume is bounded by the two intervals plus user input, so the queue never
/// grows without limit in practice.
pub struct EventHandler {
    /// Send half; clone this for each background task that produces events.
    pub tx: mpsc::UnboundedSender<AppEvent>,
    /// Receive half, owned by the main loop.
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the background tokio task that drives the unified event channel.
///
/// The task runs until the receiver is dropped. Send errors are ignored; the
/// task exits on the next iteration once nobody is listening.
///
/// `reader.next().fuse()` keeps `tokio::select!` from polling a completed
/// stream if crossterm's input ends. Only `KeyEventKind::Press` is forwarded,
/// since some platforms report both press and release.
pub fn spawn_event_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut tick_interval = interval(Duration::from_millis(250));
        let mut render_interval = interval(Duration::from_millis(33));
        let mut reader = EventStream::new();

        loop {
            let tick_tick = tick_interval.tick();
            let render_tick = render_interval.tick();
            let crossterm_event = reader.next().fuse();

            let sent = tokio::select! {
                _ = tick_tick => tx.send(AppEvent::Tick),
                _ = render_tick => tx.send(AppEvent::Render),
                maybe_event = crossterm_event => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        tx.send(AppEvent::Key(key))
                    }
                    Some(Ok(Event::Resize(w, h))) => tx.send(AppEvent::Resize(w, h)),
                    Some(Ok(Event::Mouse(mouse))) => tx.send(AppEvent::Mouse(mouse)),
                    _ => Ok(()),
                },
            };
            if sent.is_err() {
                break;
            }
        }
    });
}
