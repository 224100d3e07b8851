//! Timeline panel renderer.
//!
//! Lists either the most recent changes across all materials or the full
//! history of the material currently open. Each row shows a kind badge, the
//! material kind and id, and the change time in local time.

use coursediff_core::types::{Change, ChangeKind};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use crate::app::{AppState, PanelFocus, TimelineSource};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

pub fn render_timeline(frame: &mut Frame, area: Rect, state: &mut AppState, theme: &Theme) {
    state.timeline_viewport_height = inner_rect(area).height;

    let is_focused = state.focus == PanelFocus::Timeline;
    let title = match state.timeline_source {
        TimelineSource::Recent => format!("Recent ({})", state.recent.len()),
        TimelineSource::History => format!(
            "History of #{} ({})",
            state.history_material.unwrap_or_default(),
            state.history.len()
        ),
    };
    let open_id = state.current.as_ref().map(|c| c.id);

    let items: Vec<ListItem> = if state.timeline().is_empty() {
        let msg = if state.loading { "Loading..." } else { "No changes" };
        vec![ListItem::new(Line::raw(msg))]
    } else {
        state
            .timeline()
            .iter()
            .map(|c| change_item(c, open_id == Some(c.id), theme))
            .collect()
    };

    let list = List::new(items)
        .block(panel_block(title, is_focused, theme))
        .highlight_style(Style::default().fg(theme.border_active).add_modifier(Modifier::REVERSED));

    frame.render_stateful_widget(list, area, &mut state.timeline_state);
}

/// Format: `● U lesson #12  2026-03-02 14:05`, the dot marking the open change.
fn change_item(change: &Change, is_open: bool, theme: &Theme) -> ListItem<'static> {
    let open_mark = if is_open { "● " } else { "  " };
    let badge = match change.kind {
        ChangeKind::Create => "C",
        ChangeKind::Update => "U",
        ChangeKind::Delete => "D",
    };
    ListItem::new(Line::from(vec![
        Span::raw(open_mark),
        Span::styled(
            format!("{badge} "),
            Style::default().fg(theme.kind_color(change.kind)),
        ),
        Span::raw(format!("{} #{}", change.material_kind.as_str(), change.material_id)),
        Span::styled(
            format!("  {}", format_time(change.timestamp)),
            Style::default().fg(theme.muted),
        ),
    ]))
}

/// Renders a millisecond Unix timestamp as local `YYYY-MM-DD HH:MM`.
pub fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "?".to_owned())
}
