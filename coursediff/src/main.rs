//! coursediff: review changes to course material, highlight passages, and
//! discuss them in threaded annotations.
//!
//! Entry point for the `coursediff` binary. Wires together the config, the
//! file log, the terminal lifecycle (`tui`), the event bus (`event`), and the
//! SQLite-backed review store from `coursediff-core`.
//!
//! # Startup sequence
//!
//! 1. Load config and start the file logger. Both happen before the terminal
//!    is touched so errors can still reach stderr.
//! 2. `install_panic_hook()` so a panic restores the terminal first.
//! 3. `register_sigterm()`, polled by the 50ms heartbeat in the loop.
//! 4. Open the database, register the configured user, read UI preferences.
//! 5. `init_tui()`, spawn the event task, request the recent changes.
//!
//! The loop only exits through `break`, so `restore_tui()` always runs.

mod app;
mod config;
mod event;
mod loader;
mod textdiff;
mod theme;
mod tui;
mod ui;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use coursediff_core::api::SqliteStore;
use coursediff_core::db;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::event::AppEvent;
use crate::ui::keybindings::{handle_key, handle_mouse, KeyAction};

/// Logs go to `<data dir>/coursediff.log`; the terminal belongs to the UI.
/// `COURSEDIFF_LOG` overrides the default filter.
fn init_logging(dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(dir, "coursediff.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_env("COURSEDIFF_LOG")
        .unwrap_or_else(|_| EnvFilter::new("coursediff=info,coursediff_core=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    guard
}

fn io_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = config::load();
    let theme = theme::Theme::from_name(&config.theme);

    let data_dir = Path::new(&config.database)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    std::fs::create_dir_all(&data_dir)?;
    let _log_guard = init_logging(&data_dir);
    tracing::info!(database = %config.database, user = %config.user.id, "coursediff starting");

    tui::install_panic_hook();
    let term_flag = tui::register_sigterm()?;

    let conn = db::open_db(&config.database).await.map_err(io_error)?;
    db::upsert_user(&conn, &config.user.author()).await.map_err(io_error)?;
    let view_mode = db::load_preference(&conn, app::PREF_VIEW_MODE)
        .await
        .map_err(io_error)?;
    let annotations_open = db::load_preference(&conn, app::PREF_ANNOTATIONS_OPEN)
        .await
        .map_err(io_error)?;

    let handler = event::EventHandler::new();
    let api = Arc::new(SqliteStore::new(conn, config.recent_limit));
    let mut state = app::AppState::new(api, handler.tx.clone(), &config.user.id);
    state.apply_preferences(view_mode.as_deref(), annotations_open.as_deref());

    let mut terminal = tui::init_tui()?;
    event::spawn_event_task(handler.tx.clone());
    let mut rx = handler.rx;
    state.refresh_recent();

    'event_loop: loop {
        tokio::select! {
            // Heartbeat: guarantees SIGTERM is checked at least every 50ms.
            // The event task normally wakes the loop every 33ms, but if it has
            // exited (input stream closed) rx.recv() would block forever and
            // the flag would never be read.
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                let action = match maybe_event {
                    Some(AppEvent::Render) => {
                        if let Err(e) = terminal.draw(|frame| ui::render(frame, &mut state, &theme)) {
                            tracing::error!(error = %e, "draw failed");
                            break 'event_loop;
                        }
                        KeyAction::Continue
                    }
                    Some(AppEvent::Key(key)) => handle_key(key, &mut state),
                    Some(AppEvent::Mouse(mouse)) => handle_mouse(mouse, &mut state),
                    Some(AppEvent::Tick) => {
                        state.poll_fetches();
                        KeyAction::Continue
                    }
                    Some(AppEvent::Data(data)) => {
                        state.apply_data(*data);
                        KeyAction::Continue
                    }
                    Some(AppEvent::Submission(submission)) => {
                        state.apply_submission(submission);
                        KeyAction::Continue
                    }
                    // The next Render picks up the new size from frame.area().
                    Some(AppEvent::Resize(_, _)) => KeyAction::Continue,
                    Some(AppEvent::Quit) | None => KeyAction::Quit,
                };
                if action == KeyAction::Quit || term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
        }
    }

    tui::restore_tui()?;
    tracing::info!("coursediff stopped");
    Ok(())
}
