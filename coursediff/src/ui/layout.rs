//! Responsive layout engine for coursediff.
//!
//! Pure layout arithmetic, recomputed inside `terminal.draw()` on every frame so
//! the panels always follow the live terminal size.
//!
//! # Panel geometry
//!
//! At `>= 110` columns the timeline, compare area, and (when open) the
//! annotation drawer sit side by side. Below that only the focused panel is
//! shown and fills the width.
//!
//! The compare area is split again according to the view mode: side by side,
//! stacked, or a single version.
//!
//! `Spacing::Overlap(1)` together with `Block::merge_borders(MergeStrategy::Fuzzy)`
//! lets neighbouring borders share one column and merge their junctions.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect, Spacing},
    style::{Modifier, Style},
    symbols::merge::MergeStrategy,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};

use crate::app::{AppState, Mode, PanelFocus, ViewMode};
use crate::theme::Theme;

const WIDE_COLUMNS: u16 = 110;

/// Panel rectangles for one frame. Hidden panels have zero width.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameLayout {
    pub timeline: Rect,
    pub compare: Rect,
    pub previous: Rect,
    pub current: Rect,
    pub drawer: Rect,
    pub status_bar: Rect,
}

pub fn compute_layout(frame: &Frame, state: &AppState) -> FrameLayout {
    let area = frame.area();
    let [main_area, status_bar] =
        area.layout(&Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]));

    let drawer_open = state.session.annotations_open();
    let constraints = if area.width >= WIDE_COLUMNS {
        [
            Constraint::Percentage(22),
            Constraint::Fill(1),
            if drawer_open { Constraint::Percentage(30) } else { Constraint::Length(0) },
        ]
    } else {
        let only = |focus: PanelFocus| {
            if state.focus == focus { Constraint::Fill(1) } else { Constraint::Length(0) }
        };
        let drawer_focused = drawer_open && state.focus == PanelFocus::Annotations;
        [
            only(PanelFocus::Timeline),
            if drawer_focused { Constraint::Length(0) } else { only_compare(state.focus) },
            if drawer_focused { Constraint::Fill(1) } else { Constraint::Length(0) },
        ]
    };
    let [timeline, compare, drawer] =
        main_area.layout(&Layout::horizontal(constraints).spacing(Spacing::Overlap(1)));

    let (previous, current) = split_compare(compare, state.view_mode, state.previous.is_some());

    FrameLayout {
        timeline,
        compare,
        previous,
        current,
        drawer,
        status_bar,
    }
}

fn only_compare(focus: PanelFocus) -> Constraint {
    match focus {
        PanelFocus::Timeline => Constraint::Length(0),
        PanelFocus::Compare | PanelFocus::Annotations => Constraint::Fill(1),
    }
}

/// Splits the compare area into the previous and current panels. A change
/// without a predecessor always gets the whole area.
fn split_compare(area: Rect, mode: ViewMode, has_previous: bool) -> (Rect, Rect) {
    let empty = Rect::new(area.x, area.y, 0, 0);
    if !has_previous {
        return (empty, area);
    }
    match mode {
        ViewMode::Horizontal => {
            let [prev, cur] = area.layout(
                &Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)])
                    .spacing(Spacing::Overlap(1)),
            );
            (prev, cur)
        }
        ViewMode::Vertical => {
            let [prev, cur] = area.layout(
                &Layout::vertical([Constraint::Fill(1), Constraint::Fill(1)])
                    .spacing(Spacing::Overlap(1)),
            );
            (prev, cur)
        }
        ViewMode::Before => (area, empty),
        ViewMode::After => (empty, area),
    }
}

/// The area inside a panel's 1-cell border.
pub fn inner_rect(area: Rect) -> Rect {
    area.inner(Margin { vertical: 1, horizontal: 1 })
}

/// Builds a bordered `Block` for a panel.
///
/// Focused panels get `BorderType::Thick`, all others `Plain`. `Fuzzy` merging
/// is required because `Exact` draws wrong junctions where thick and plain
/// borders meet.
pub fn panel_block<'a>(title: impl Into<Line<'a>>, is_focused: bool, theme: &Theme) -> Block<'a> {
    let border_style = if is_focused {
        Style::default().fg(theme.border_active)
    } else {
        Style::default().fg(theme.border_inactive)
    };
    let border_type = if is_focused { BorderType::Thick } else { BorderType::Plain };

    Block::bordered()
        .title(title)
        .border_type(border_type)
        .border_style(border_style)
        .merge_borders(MergeStrategy::Fuzzy)
}

/// Renders the 1-row status bar: mode, view, pending work, and the last
/// status message.
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let (mode_text, mode_fg) = match state.mode {
        Mode::Insert => (" INSERT ", theme.status_mode_insert),
        Mode::Normal | Mode::HelpOverlay | Mode::ConfirmQuit | Mode::ConfirmDelete { .. } => {
            (" NORMAL ", theme.status_mode_normal)
        }
    };

    let mut spans = vec![
        Span::styled(mode_text, Style::default().fg(mode_fg).add_modifier(Modifier::BOLD)),
        Span::raw(format!(" {} ", state.view_mode.as_str())),
    ];
    if state.loading {
        spans.push(Span::raw(" loading... "));
    }
    if state.coordinator.composer().is_submitting() {
        spans.push(Span::raw(" saving... "));
    }
    if let Some(msg) = &state.status {
        spans.push(Span::raw(format!(" {msg}")));
    } else {
        spans.push(Span::styled(" ? help", Style::default().fg(theme.muted)));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bar_bg).fg(theme.status_bar_fg)),
        area,
    );
}
