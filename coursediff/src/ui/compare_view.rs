//! Compare panel renderer.
//!
//! Draws the previous and current versions of the open change. Each visible
//! character is styled from three sources, in increasing priority:
//!
//! 1. word-level diff (foreground colour),
//! 2. highlight markers (background by marker state),
//! 3. the in-progress mouse selection.
//!
//! The wrapped line table of every panel is written back to `AppState` so that
//! mouse events on the next loop iteration can be mapped to text offsets.

use std::ops::Range;

use coursediff_core::document::MarkerState;
use coursediff_core::highlighter::RangeAdapter;
use coursediff_core::types::Panel;
use ratatui::{
    Frame,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::app::{AppState, PanelFocus, PanelGeometry};
use crate::textdiff::ChangedRanges;
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block, FrameLayout};

pub fn render_compare(frame: &mut Frame, layout: &FrameLayout, state: &mut AppState, theme: &Theme) {
    let is_focused = state.focus == PanelFocus::Compare;

    if state.current.is_none() {
        for panel in Panel::BOTH {
            state.set_geometry(panel, None);
        }
        if layout.compare.width > 0 {
            let msg = Paragraph::new(Line::styled(
                "Select a change in the timeline and press Enter.",
                Style::default().fg(theme.muted),
            ))
            .block(panel_block("Compare", is_focused, theme));
            frame.render_widget(msg, layout.compare);
        }
        return;
    }

    let mut max_scroll = 0;
    for (panel, area) in [(Panel::Previous, layout.previous), (Panel::Current, layout.current)] {
        if area.width == 0 || !state.document.is_mounted(panel) {
            state.set_geometry(panel, None);
            continue;
        }
        let inner = inner_rect(area);
        state.compare_viewport_height = inner.height;

        let text = state.document.text(panel).unwrap_or_default();
        let lines = wrap_lines(text, usize::from(inner.width));
        let panel_max = lines.len().saturating_sub(usize::from(inner.height));
        max_scroll = max_scroll.max(panel_max);
        let scroll = state.compare_scroll.min(panel_max);

        frame.render_widget(panel_block(panel_title(state, panel), is_focused, theme), area);
        let visible = render_lines(state, panel, &lines, scroll, usize::from(inner.height), theme);
        frame.render_widget(Paragraph::new(visible), inner);

        state.set_geometry(
            panel,
            Some(PanelGeometry {
                area: inner,
                lines,
                scroll,
            }),
        );
    }
    state.compare_scroll = state.compare_scroll.min(max_scroll);
}

fn panel_title(state: &AppState, panel: Panel) -> String {
    let change = match panel {
        Panel::Previous => state.previous.as_ref(),
        Panel::Current => state.current.as_ref(),
    };
    let label = match panel {
        Panel::Previous => "Previous",
        Panel::Current => "Current",
    };
    let pending = state.session.modified_panel() == Some(panel)
        && state.session.active_selection().is_some();
    match change {
        Some(c) if pending => format!("{label} #{} ({}) *", c.id, c.kind.as_str()),
        Some(c) => format!("{label} #{} ({})", c.id, c.kind.as_str()),
        None => label.to_owned(),
    }
}

fn render_lines(
    state: &AppState,
    panel: Panel,
    lines: &[Range<usize>],
    scroll: usize,
    height: usize,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let doc = &state.document;
    let chars: Vec<char> = doc.text(panel).unwrap_or_default().chars().collect();

    let mut marker_bg: Vec<Option<Color>> = vec![None; chars.len()];
    for seg in doc.segments(panel) {
        let Some(marker) = seg.marker else { continue };
        let color = match marker.state {
            MarkerState::Selected => theme.highlight_selected,
            MarkerState::Unselected => theme.highlight_unselected,
        };
        for slot in marker_bg.iter_mut().take(seg.end).skip(seg.start) {
            *slot = Some(color);
        }
    }

    let live = doc
        .live_selection()
        .filter(|s| s.root() == Some(panel) && !s.is_collapsed())
        .map(|s| {
            let (start, end) = s.range();
            start..end
        });
    let changed = match panel {
        Panel::Previous => (&state.diff.previous, theme.diff_removed),
        Panel::Current => (&state.diff.current, theme.diff_added),
    };

    let style_at = |offset: usize| {
        let mut style = Style::default().fg(theme.text);
        if ChangedRanges::contains(changed.0, offset) {
            style = style.fg(changed.1).add_modifier(Modifier::BOLD);
        }
        if let Some(bg) = marker_bg[offset] {
            style = style.bg(bg);
        }
        if live.as_ref().is_some_and(|r| r.contains(&offset)) {
            style = style.bg(theme.live_selection);
        }
        style
    };

    lines
        .iter()
        .skip(scroll)
        .take(height)
        .map(|range| {
            let mut spans = Vec::new();
            let mut run = String::new();
            let mut run_style = Style::default();
            for offset in range.clone() {
                let style = style_at(offset);
                if style != run_style && !run.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut run), run_style));
                }
                run_style = style;
                run.push(chars[offset]);
            }
            if !run.is_empty() {
                spans.push(Span::styled(run, run_style));
            }
            Line::from(spans)
        })
        .collect()
}

/// Wraps `text` at `width` columns, returning the character range drawn on
/// each visual row. Newlines are not part of any row; an empty logical line
/// yields an empty row.
pub fn wrap_lines(text: &str, width: usize) -> Vec<Range<usize>> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut start = 0;
    for logical in text.split('\n') {
        let len = logical.chars().count();
        let end = start + len;
        if len == 0 {
            rows.push(start..start);
        }
        let mut row_start = start;
        while row_start < end {
            let row_end = (row_start + width).min(end);
            rows.push(row_start..row_end);
            row_start = row_end;
        }
        start = end + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_long_lines_and_keeps_empty_ones() {
        let rows = wrap_lines("abcdefgh\n\nxyz", 3);
        assert_eq!(rows, vec![0..3, 3..6, 6..8, 9..9, 10..13]);
    }

    #[test]
    fn multibyte_text_uses_char_offsets() {
        let rows = wrap_lines("héllo wörld", 6);
        assert_eq!(rows, vec![0..6, 6..11]);
    }

    #[test]
    fn empty_text_has_one_row() {
        assert_eq!(wrap_lines("", 10), vec![0..0]);
    }
}
