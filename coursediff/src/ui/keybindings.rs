//! Keybinding dispatcher for coursediff.
//!
//! Translates crossterm key and mouse events into `AppState` mutations and
//! returns a `KeyAction` telling the event loop whether to continue or quit.
//! Keys branch first on `state.mode`, so every mode has its own handler.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::app::{AppState, Mode, PanelFocus};

/// Control-flow signal returned from the dispatchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
}

pub fn handle_key(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match state.mode {
        Mode::HelpOverlay => handle_help(key, state),
        Mode::ConfirmQuit => handle_confirm_quit(key, state),
        Mode::ConfirmDelete {
            annotation_id,
            change_id,
        } => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    state.confirm_delete(annotation_id, change_id);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => state.mode = Mode::Normal,
                _ => {}
            }
            KeyAction::Continue
        }
        Mode::Normal => handle_normal(key, state),
        Mode::Insert => handle_insert(key, state),
    }
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

fn handle_normal(key: KeyEvent, state: &mut AppState) -> KeyAction {
    if let Some(action) = handle_scroll_key(key, state) {
        return action;
    }
    // Any other key acknowledges the last status message.
    state.status = None;

    match key.code {
        KeyCode::Char('H') => state.focus = state.focus.prev(),
        KeyCode::Char('L') => state.focus = state.focus.next(),

        KeyCode::Enter if state.focus == PanelFocus::Timeline => state.open_selected(),
        KeyCode::Tab => state.toggle_timeline_source(),
        KeyCode::Char('R') => state.refresh_recent(),

        KeyCode::Char('v') => state.cycle_view_mode(),
        KeyCode::Char('a') => {
            state.toggle_drawer();
            if !state.session.annotations_open() && state.focus == PanelFocus::Annotations {
                state.focus = PanelFocus::Compare;
            }
        }
        KeyCode::Char('x') => state.discard_highlight(),

        KeyCode::Char('i') if state.current.is_some() => state.start_compose(),
        KeyCode::Char('r') if state.focus == PanelFocus::Annotations => state.toggle_reply(),
        KeyCode::Char('d') if state.focus == PanelFocus::Annotations => state.request_delete(),

        KeyCode::Char('?') => {
            state.help_scroll = 0;
            state.mode = Mode::HelpOverlay;
        }

        KeyCode::Char('q') => {
            if state.has_unsaved_draft() {
                state.mode = Mode::ConfirmQuit;
            } else {
                return KeyAction::Quit;
            }
        }
        KeyCode::Esc => {
            if state.session.reply_target().is_some() {
                state.session.clear_reply_target();
            }
        }

        _ => {}
    }
    KeyAction::Continue
}

/// j / k / g / G and the Ctrl page keys. Returns `None` when the key is not a
/// scroll key.
fn handle_scroll_key(key: KeyEvent, state: &mut AppState) -> Option<KeyAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => state.scroll_up(1),
        KeyCode::Char('g') | KeyCode::Home => state.scroll_top(),
        KeyCode::Char('G') | KeyCode::End => state.scroll_bottom(),
        KeyCode::Char('d') if ctrl => state.half_page_down(),
        KeyCode::Char('u') if ctrl => state.half_page_up(),
        KeyCode::Char('f') if ctrl => state.full_page_down(),
        KeyCode::Char('b') if ctrl => state.full_page_up(),
        KeyCode::PageDown => state.full_page_down(),
        KeyCode::PageUp => state.full_page_up(),
        _ => return None,
    }
    Some(KeyAction::Continue)
}

// ---------------------------------------------------------------------------
// HelpOverlay mode
// ---------------------------------------------------------------------------

fn handle_help(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('j') => state.help_scroll = state.help_scroll.saturating_add(1),
        KeyCode::Char('k') => state.help_scroll = state.help_scroll.saturating_sub(1),
        KeyCode::Char('g') => state.help_scroll = 0,
        KeyCode::Char('G') => state.help_scroll = u16::MAX,
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q') => state.mode = Mode::Normal,
        _ => {}
    }
    KeyAction::Continue
}

// ---------------------------------------------------------------------------
// ConfirmQuit mode
// ---------------------------------------------------------------------------

fn handle_confirm_quit(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Quit,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            state.mode = Mode::Normal;
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

// ---------------------------------------------------------------------------
// Insert mode
// ---------------------------------------------------------------------------

/// Edits the composer draft. Enter submits, Alt-Enter inserts a newline, Esc
/// leaves the draft in place and returns to Normal mode.
fn handle_insert(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Esc => state.mode = Mode::Normal,
        KeyCode::Enter if alt => state.coordinator.composer_mut().text.push('\n'),
        KeyCode::Enter => state.submit(),
        KeyCode::Backspace => {
            state.coordinator.composer_mut().text.pop();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.coordinator.composer_mut().text.push(c);
        }
        _ => {}
    }
    KeyAction::Continue
}

// ---------------------------------------------------------------------------
// Mouse events
// ---------------------------------------------------------------------------

/// Left button press, drag, and release drive text selection in the compare
/// panels (and click-to-focus elsewhere). The wheel scrolls the focused panel
/// by 3 lines, or the help overlay while it is open.
pub fn handle_mouse(mouse: MouseEvent, state: &mut AppState) -> KeyAction {
    let (col, row) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if state.mode == Mode::Normal || state.mode == Mode::Insert => {
            state.mouse_down(col, row);
        }
        MouseEventKind::Drag(MouseButton::Left) => state.mouse_drag(col, row),
        MouseEventKind::Up(MouseButton::Left) => state.mouse_up(col, row),
        MouseEventKind::ScrollUp if state.mode == Mode::HelpOverlay => {
            state.help_scroll = state.help_scroll.saturating_sub(3);
        }
        MouseEventKind::ScrollDown if state.mode == Mode::HelpOverlay => {
            state.help_scroll = state.help_scroll.saturating_add(3);
        }
        MouseEventKind::ScrollUp => state.scroll_up(3),
        MouseEventKind::ScrollDown => state.scroll_down(3),
        _ => {}
    }
    KeyAction::Continue
}
