//! Off-screen model of the two rendered compare panels.
//!
//! Each panel root holds the rendered text of one change and the highlight
//! markers laid over it. Offsets are character (Unicode scalar) offsets into
//! the root's text. Markers never hold text of their own: rendering splits the
//! text into maximal runs that share the same covering marker, so unwrapping a
//! marker leaves already-merged plain text behind.

use crate::types::{HighlightId, Panel};

/// Class applied to a highlight the composer currently targets.
pub const SELECTED_CLASS: &str = "highlight-selected";
/// Class applied to a highlight that is saved or no longer targeted.
pub const UNSELECTED_CLASS: &str = "highlight-unselected";

/// Visual state of a highlight marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MarkerState {
    #[serde(rename = "highlight-selected")]
    Selected,
    #[serde(rename = "highlight-unselected")]
    Unselected,
}

impl MarkerState {
    pub fn class(self) -> &'static str {
        match self {
            MarkerState::Selected => SELECTED_CLASS,
            MarkerState::Unselected => UNSELECTED_CLASS,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            MarkerState::Selected => MarkerState::Unselected,
            MarkerState::Unselected => MarkerState::Selected,
        }
    }
}

/// One end of a live selection. `root` is `None` when the point lies outside
/// both panels (status bar, timeline, annotation drawer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPoint {
    pub root: Option<Panel>,
    pub offset: usize,
}

impl TextPoint {
    pub fn inside(root: Panel, offset: usize) -> Self {
        Self { root: Some(root), offset }
    }

    pub fn outside() -> Self {
        Self { root: None, offset: 0 }
    }
}

/// A live (native) selection from `anchor` (where the drag started) to
/// `focus` (where it ended). Either end may come before the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSelection {
    pub anchor: TextPoint,
    pub focus: TextPoint,
}

impl TextSelection {
    pub fn new(anchor: TextPoint, focus: TextPoint) -> Self {
        Self { anchor, focus }
    }

    /// The single panel root containing both ends, or `None` if either end is
    /// outside the panels or the ends sit in different roots.
    pub fn root(&self) -> Option<Panel> {
        match (self.anchor.root, self.focus.root) {
            (Some(a), Some(f)) if a == f => Some(a),
            _ => None,
        }
    }

    /// `(start, end)` with `start <= end`.
    pub fn range(&self) -> (usize, usize) {
        let (a, f) = (self.anchor.offset, self.focus.offset);
        (a.min(f), a.max(f))
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// A named highlight over `start..end` of one root's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub id: HighlightId,
    pub start: usize,
    pub end: usize,
    pub state: MarkerState,
}

/// A maximal run of text covered by the same topmost marker (or none).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub start: usize,
    pub end: usize,
    pub marker: Option<&'a Marker>,
}

#[derive(Debug)]
pub(crate) struct RootContent {
    pub(crate) text: String,
    pub(crate) char_len: usize,
    pub(crate) markers: Vec<Marker>,
}

/// The rendered compare document: two independently mounted panel roots plus
/// the live selection.
#[derive(Debug, Default)]
pub struct Document {
    pub(crate) roots: [Option<RootContent>; 2],
    pub(crate) selection: Option<TextSelection>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders `text` into `root`, replacing whatever was there.
    ///
    /// Existing markers of that root are dropped (the old nodes are gone), and
    /// a live selection touching the root is cleared.
    pub fn mount(&mut self, root: Panel, text: impl Into<String>) {
        let text = text.into();
        let char_len = text.chars().count();
        self.roots[root.index()] = Some(RootContent {
            text,
            char_len,
            markers: Vec::new(),
        });
        self.drop_selection_in(root);
    }

    /// Removes `root` from the document entirely (panel hidden).
    pub fn unmount(&mut self, root: Panel) {
        self.roots[root.index()] = None;
        self.drop_selection_in(root);
    }

    pub fn is_mounted(&self, root: Panel) -> bool {
        self.roots[root.index()].is_some()
    }

    pub fn text(&self, root: Panel) -> Option<&str> {
        self.content(root).map(|c| c.text.as_str())
    }

    /// Length of the root's text in characters (0 when unmounted).
    pub fn char_len(&self, root: Panel) -> usize {
        self.content(root).map_or(0, |c| c.char_len)
    }

    pub fn markers(&self, root: Panel) -> &[Marker] {
        self.content(root).map_or(&[], |c| c.markers.as_slice())
    }

    /// Text of `root` between character offsets `start..end` (clamped).
    pub fn excerpt(&self, root: Panel, start: usize, end: usize) -> String {
        self.text(root)
            .map(|t| t.chars().skip(start).take(end.saturating_sub(start)).collect())
            .unwrap_or_default()
    }

    /// Replaces the live selection (what the user has dragged over so far).
    pub fn select(&mut self, selection: TextSelection) {
        self.selection = Some(selection);
    }

    /// Splits `root` into maximal runs sharing the same topmost marker.
    ///
    /// When markers overlap, the most recently applied one is on top, matching
    /// how nested wrappers paint in a browser.
    pub fn segments(&self, root: Panel) -> Vec<Segment<'_>> {
        let Some(content) = self.content(root) else {
            return Vec::new();
        };
        let mut bounds: Vec<usize> = Vec::with_capacity(content.markers.len() * 2 + 2);
        bounds.push(0);
        bounds.push(content.char_len);
        for m in &content.markers {
            bounds.push(m.start.min(content.char_len));
            bounds.push(m.end.min(content.char_len));
        }
        bounds.sort_unstable();
        bounds.dedup();

        let mut segments: Vec<Segment<'_>> = Vec::new();
        for pair in bounds.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let marker = content
                .markers
                .iter()
                .rev()
                .find(|m| m.start <= start && end <= m.end);
            match segments.last_mut() {
                Some(last) if same_marker(last.marker, marker) => last.end = end,
                _ => segments.push(Segment { start, end, marker }),
            }
        }
        segments
    }

    pub(crate) fn content(&self, root: Panel) -> Option<&RootContent> {
        self.roots[root.index()].as_ref()
    }

    pub(crate) fn content_mut(&mut self, root: Panel) -> Option<&mut RootContent> {
        self.roots[root.index()].as_mut()
    }

    pub(crate) fn find_marker(&self, id: &str) -> Option<(Panel, &Marker)> {
        Panel::BOTH.into_iter().find_map(|root| {
            self.markers(root)
                .iter()
                .find(|m| m.id == id)
                .map(|m| (root, m))
        })
    }

    fn drop_selection_in(&mut self, root: Panel) {
        if let Some(sel) = self.selection {
            if sel.anchor.root == Some(root) || sel.focus.root == Some(root) {
                self.selection = None;
            }
        }
    }
}

fn same_marker(a: Option<&Marker>, b: Option<&Marker>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.id == b.id,
        _ => false,
    }
}
