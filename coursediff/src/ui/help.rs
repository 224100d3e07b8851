//! Modal overlays: the help screen and the yes/no confirmation dialogs.
//!
//! Each overlay erases its area with `Clear` and then draws a bordered
//! `Paragraph` inside the same `terminal.draw()` closure as the panels.

use ratatui::{
    Frame,
    layout::Constraint,
    style::{Modifier, Style},
    text::{Line, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::theme::Theme;

/// Draws the help overlay centred over the layout, scrolled by `help_scroll`.
/// Skipped below 60 columns where the centred rect would collapse.
pub fn render_help_overlay(frame: &mut Frame, theme: &Theme, help_scroll: u16) {
    if frame.area().width < 60 {
        return;
    }

    let overlay_area = frame
        .area()
        .centered(Constraint::Percentage(80), Constraint::Percentage(80));
    frame.render_widget(Clear, overlay_area);

    let block = Block::bordered()
        .title(" Help: j/k scroll, ? or Esc to dismiss ")
        .border_style(Style::default().fg(theme.border_active));

    frame.render_widget(
        Paragraph::new(build_help_text())
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((help_scroll, 0)),
        overlay_area,
    );
}

/// Draws a small centred yes/no prompt.
pub fn render_confirm(frame: &mut Frame, theme: &Theme, question: &str) {
    let area = frame
        .area()
        .centered(Constraint::Length(56), Constraint::Length(5));
    frame.render_widget(Clear, area);

    let block = Block::bordered()
        .title(" Confirm ")
        .border_style(Style::default().fg(theme.error));
    let text = Text::from(vec![
        Line::raw(question.to_owned()),
        Line::raw(""),
        Line::styled("y: yes    n / Esc: no", Style::default().add_modifier(Modifier::BOLD)),
    ]);
    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), area);
}

fn build_help_text() -> Text<'static> {
    Text::from(vec![
        Line::from("Navigation"),
        Line::from("  j / k         Scroll down / up one line"),
        Line::from("  g / G         Jump to top / bottom"),
        Line::from("  Ctrl-d / u    Scroll half page down / up"),
        Line::from("  Ctrl-f / b    Scroll full page down / up"),
        Line::from("  H / L         Move panel focus left / right"),
        Line::from(""),
        Line::from("Timeline"),
        Line::from("  Enter         Compare the selected change with its predecessor"),
        Line::from("  Tab           Switch between recent changes and the open material's history"),
        Line::from("  R             Reload recent changes"),
        Line::from(""),
        Line::from("Compare"),
        Line::from("  mouse drag    Select text inside one panel to highlight it"),
        Line::from("  x             Drop the pending highlight"),
        Line::from("  v             Cycle layout: side by side, stacked, before, after"),
        Line::from(""),
        Line::from("Annotations"),
        Line::from("  a             Show / hide the annotation drawer"),
        Line::from("  i             Write an annotation (Enter sends, Alt-Enter new line, Esc leaves)"),
        Line::from("  r             Reply to the selected annotation (again to cancel)"),
        Line::from("  d             Delete the selected annotation and its replies"),
        Line::from(""),
        Line::from("General"),
        Line::from("  ?             Open / close this help overlay"),
        Line::from("  q             Quit (confirms if a draft is unsent)"),
    ])
}
