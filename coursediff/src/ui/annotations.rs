//! Annotation drawer renderer: the threads of the open pair plus the composer.

use coursediff_core::types::Panel;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{List, ListItem, ListState, Paragraph, Wrap},
};

use crate::app::{AppState, DrawerRow, Mode, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::panel_block;
use crate::ui::timeline::format_time;

const COMPOSER_HEIGHT: u16 = 6;

pub fn render_drawer(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let [threads_area, composer_area] = area.layout(&Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(COMPOSER_HEIGHT),
    ]));
    render_threads(frame, threads_area, state, theme);
    render_composer(frame, composer_area, state, theme);
}

fn render_threads(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let is_focused = state.focus == PanelFocus::Annotations && state.mode != Mode::Insert;
    let rows = state.drawer_rows();
    let title = format!("Annotations ({})", rows.len());
    let block = panel_block(title, is_focused, theme);

    let reply_to = state.session.reply_target().map(|t| t.annotation_id);
    let mut items: Vec<ListItem> = rows
        .iter()
        .map(|row| entry_item(row, reply_to == Some(row.entry.annotation.id), theme))
        .collect();

    let broken: usize = state
        .displayed_keys()
        .iter()
        .filter_map(|(_, key)| state.cache.thread(key))
        .map(|t| t.broken_links.len())
        .sum();

    if items.is_empty() {
        let loading = state
            .displayed_keys()
            .iter()
            .any(|(_, key)| state.cache.thread(key).is_none());
        let msg = match (state.current.is_some(), loading) {
            (false, _) => "No change open",
            (true, true) => "Loading...",
            (true, false) => "No annotations yet. Press i to write one.",
        };
        items.push(ListItem::new(Line::styled(msg, Style::default().fg(theme.muted))));
    } else if broken > 0 {
        items.push(ListItem::new(Line::styled(
            format!("{broken} repl(ies) shown at top level: parent missing"),
            Style::default().fg(theme.muted),
        )));
    }

    let mut list_state = ListState::default();
    if !rows.is_empty() {
        list_state.select(Some(state.annotation_cursor));
    }
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn entry_item(row: &DrawerRow<'_>, is_reply_target: bool, theme: &Theme) -> ListItem<'static> {
    let a = &row.entry.annotation;
    let indent = "  ".repeat(row.entry.depth);
    let role = a.author.role.as_str();
    let author_style = if is_reply_target {
        Style::default().fg(theme.reply_target).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.author)
    };

    let mut header = vec![
        Span::raw(indent.clone()),
        Span::styled(a.author.name.clone(), author_style),
        Span::styled(format!(" ({role}) {}", format_time(a.timestamp)), Style::default().fg(theme.muted)),
    ];
    if row.panel == Panel::Previous {
        header.push(Span::styled(" [prev]", Style::default().fg(theme.muted)));
    }
    if a.selection_id.is_some() {
        header.push(Span::styled(" ▌", Style::default().fg(theme.highlight_selected)));
    }

    let mut lines = vec![Line::from(header)];
    lines.extend(a.body.lines().map(|l| Line::raw(format!("{indent}  {l}"))));
    ListItem::new(Text::from(lines))
}

fn render_composer(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let composer = state.coordinator.composer();
    let is_focused = state.mode == Mode::Insert;

    let mut title = match state.session.reply_target() {
        Some(target) => format!("Reply to {}", target.author_name),
        None => "New annotation".to_owned(),
    };
    if state.session.active_selection().is_some() {
        title.push_str(" on highlight");
    }
    if composer.is_submitting() {
        title.push_str(" (saving)");
    }

    let mut lines = Vec::new();
    if composer.text.is_empty() && !is_focused {
        lines.push(Line::styled("press i to write", Style::default().fg(theme.muted)));
    } else {
        let mut text_lines: Vec<Line> = composer.text.split('\n').map(|l| Line::raw(l.to_owned())).collect();
        if is_focused {
            if let Some(last) = text_lines.last_mut() {
                last.push_span(Span::styled("▏", Style::default().fg(theme.border_active)));
            }
        }
        lines.extend(text_lines);
    }
    if let Some(err) = composer.error() {
        lines.push(Line::styled(err.to_owned(), Style::default().fg(theme.error)));
    }
    if let Some(notice) = composer.notice() {
        lines.push(Line::styled(notice.to_owned(), Style::default().fg(theme.muted)));
    }

    frame.render_widget(
        Paragraph::new(lines)
            .block(panel_block(title, is_focused, theme))
            .wrap(Wrap { trim: false }),
        area,
    );
}
