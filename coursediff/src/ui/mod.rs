//! UI rendering for coursediff.
//!
//! `render()` is the single entry point, called from the event loop's
//! `terminal.draw()` closure. Layout arithmetic lives in `layout.rs`; each
//! panel has its own renderer module.

mod layout;
pub mod annotations;
pub mod compare_view;
pub mod help;
pub mod keybindings;
pub mod timeline;

use ratatui::Frame;

use crate::app::{AppState, Mode};
use crate::theme::Theme;
use layout::{compute_layout, render_status_bar};

/// Renders one complete frame.
///
/// Panel rects, viewport heights and compare-panel geometry are written back
/// into `state` here, so the next key or mouse event works against what is
/// actually on screen.
pub fn render(frame: &mut Frame, state: &mut AppState, theme: &Theme) {
    let layout = compute_layout(frame, state);
    state.panel_rects = [layout.timeline, layout.compare, layout.drawer];

    if layout.timeline.width > 0 {
        timeline::render_timeline(frame, layout.timeline, state, theme);
    }

    compare_view::render_compare(frame, &layout, state, theme);

    if layout.drawer.width > 0 {
        annotations::render_drawer(frame, layout.drawer, state, theme);
    }

    render_status_bar(frame, layout.status_bar, state, theme);

    match state.mode {
        Mode::HelpOverlay => help::render_help_overlay(frame, theme, state.help_scroll),
        Mode::ConfirmQuit => {
            help::render_confirm(frame, theme, "Discard the unsent annotation draft and quit?");
        }
        Mode::ConfirmDelete { .. } => {
            help::render_confirm(frame, theme, "Delete this annotation and all of its replies?");
        }
        Mode::Normal | Mode::Insert => {}
    }
}
