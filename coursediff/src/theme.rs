//! Color theme system for coursediff.
//!
//! Two built-in themes are provided:
//!
//! - `dark` uses ANSI 16 colors so it works on any terminal, including
//!   256-color SSH sessions with no truecolor support.
//! - `catppuccin_mocha` uses the Catppuccin Mocha palette in RGB and requires
//!   truecolor.

use ratatui::style::Color;

use coursediff_core::types::ChangeKind;

/// All color values used across coursediff's UI surfaces.
#[derive(Debug, Clone)]
pub struct Theme {
    // Panel borders
    pub border_active: Color,
    pub border_inactive: Color,

    // Compare panels
    /// Words present only in the previous version.
    pub diff_removed: Color,
    /// Words present only in the current version.
    pub diff_added: Color,
    pub text: Color,
    pub muted: Color,
    /// Background of the highlight the composer currently targets.
    pub highlight_selected: Color,
    /// Background of saved highlights.
    pub highlight_unselected: Color,
    /// Background of the in-progress mouse selection.
    pub live_selection: Color,

    // Timeline badges
    pub kind_create: Color,
    pub kind_update: Color,
    pub kind_delete: Color,

    // Annotation drawer
    pub author: Color,
    pub reply_target: Color,
    pub error: Color,

    // Status bar
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    pub status_mode_normal: Color,
    pub status_mode_insert: Color,
}

impl Theme {
    /// Built-in dark theme using ANSI 16 colors.
    pub fn dark() -> Self {
        Self {
            border_active: Color::Cyan,
            border_inactive: Color::DarkGray,

            diff_removed: Color::Red,
            diff_added: Color::Green,
            text: Color::Reset,
            muted: Color::DarkGray,
            highlight_selected: Color::Yellow,
            highlight_unselected: Color::Blue,
            live_selection: Color::DarkGray,

            kind_create: Color::Green,
            kind_update: Color::Yellow,
            kind_delete: Color::Red,

            author: Color::Cyan,
            reply_target: Color::Magenta,
            error: Color::Red,

            status_bar_bg: Color::DarkGray,
            status_bar_fg: Color::White,
            status_mode_normal: Color::Cyan,
            status_mode_insert: Color::Green,
        }
    }

    /// Catppuccin Mocha theme using RGB truecolor values.
    ///
    /// Palette source: <https://github.com/catppuccin/catppuccin> Mocha variant.
    pub fn catppuccin_mocha() -> Self {
        let green = Color::Rgb(166, 227, 161); // #a6e3a1
        let red = Color::Rgb(243, 139, 168); // #f38ba8
        let yellow = Color::Rgb(249, 226, 175); // #f9e2af
        let peach = Color::Rgb(250, 179, 135); // #fab387
        let mauve = Color::Rgb(203, 166, 247); // #cba6f7
        let sapphire = Color::Rgb(116, 199, 236); // #74c7ec
        let lavender = Color::Rgb(180, 190, 254); // #b4befe
        let overlay1 = Color::Rgb(127, 132, 156); // #7f849c
        let surface1 = Color::Rgb(69, 71, 90); // #45475a
        let surface2 = Color::Rgb(88, 91, 112); // #585b70
        let text = Color::Rgb(205, 214, 244); // #cdd6f4
        let highlight_sel = Color::Rgb(98, 85, 52); // yellow over base
        let highlight_saved = Color::Rgb(49, 66, 94); // blue over base

        Self {
            border_active: lavender,
            border_inactive: overlay1,

            diff_removed: red,
            diff_added: green,
            text,
            muted: overlay1,
            highlight_selected: highlight_sel,
            highlight_unselected: highlight_saved,
            live_selection: surface2,

            kind_create: green,
            kind_update: yellow,
            kind_delete: red,

            author: sapphire,
            reply_target: mauve,
            error: peach,

            status_bar_bg: surface1,
            status_bar_fg: text,
            status_mode_normal: lavender,
            status_mode_insert: green,
        }
    }

    /// Resolves a theme name from config. Unknown names fall back to `dark()`
    /// with a note on stderr.
    pub fn from_name(name: &str) -> Self {
        match name {
            "catppuccin-mocha" | "catppuccin_mocha" => Self::catppuccin_mocha(),
            "dark" => Self::dark(),
            other => {
                eprintln!("coursediff: unknown theme '{}', falling back to 'dark'", other);
                Self::dark()
            }
        }
    }

    pub fn kind_color(&self, kind: ChangeKind) -> Color {
        match kind {
            ChangeKind::Create => self.kind_create,
            ChangeKind::Update => self.kind_update,
            ChangeKind::Delete => self.kind_delete,
        }
    }
}
