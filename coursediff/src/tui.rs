//! Terminal lifecycle management for coursediff.
//!
//! **Why stderr, not stdout?**
//! The interface renders entirely to stderr. stdout stays clean for shell
//! pipelines (`coursediff | tee review.txt`), and anything a dependency prints
//! to stdout cannot tear the frame apart. Logs go to a file, never to either
//! stream, while the alternate screen is active.
//!
//! **Why mouse capture?**
//! Highlights are made by dragging over panel text. Without capture the
//! terminal emulator would turn the drag into its own native selection and
//! the application would never see the press, drag, and release events.
//! Capture is released again in [`restore_tui`], otherwise the shell would
//! keep receiving mouse escape sequences after exit.

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use signal_hook::consts::SIGTERM;
use signal_hook::flag::register;
use std::io::{stderr, BufWriter, Stderr};
use std::panic;
use std::sync::{atomic::AtomicBool, Arc};

/// The terminal type used by coursediff: a `CrosstermBackend` over buffered
/// stderr.
///
/// `BufWriter<Stderr>` batches escape sequences into few write(2) calls. The
/// compare panels style text per character, so an unbuffered frame would
/// flicker at the 30 FPS render interval.
pub type Tui = Terminal<CrosstermBackend<BufWriter<Stderr>>>;

/// Initialises the terminal for rendering.
///
/// Enables raw mode, enters the alternate screen, and turns on mouse capture.
/// Call [`restore_tui`] on every exit path.
///
/// # Errors
///
/// Returns `Err` if `enable_raw_mode`, `execute!`, or `Terminal::new` fails.
pub fn init_tui() -> std::io::Result<Tui> {
    let mut out = BufWriter::new(stderr());
    enable_raw_mode()?;
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(out))
}

/// Restores the terminal to its pre-TUI state.
///
/// Idempotent. Must run on every exit path, the panic hook included, because
/// ratatui 0.30 does not restore the terminal on `Drop`.
///
/// # Errors
///
/// Returns `Err` if `disable_raw_mode` or `execute!` fails. The panic hook
/// ignores the error; it is best-effort there.
pub fn restore_tui() -> std::io::Result<()> {
    disable_raw_mode()?;
    execute!(stderr(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

/// Installs a panic hook that restores the terminal before the panic message
/// is printed.
///
/// Must be called before [`init_tui`]. It chains onto the previous hook, so the
/// default printer still runs. Without it a panic leaves raw mode and the
/// alternate screen active: the message is invisible and the shell unusable
/// until `reset`.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_tui();
        original_hook(panic_info);
    }));
}

/// Registers a SIGTERM handler that sets the returned flag.
///
/// The main loop polls the flag on its 50ms heartbeat and after every event.
/// The handler itself only performs an atomic store, which is
/// async-signal-safe.
///
/// # Errors
///
/// Returns `Err` if the OS refuses to register the handler.
pub fn register_sigterm() -> std::io::Result<Arc<AtomicBool>> {
    let term = Arc::new(AtomicBool::new(false));
    register(SIGTERM, Arc::clone(&term))?;
    Ok(term)
}
