//! Highlight manager: turns panel gestures into highlights and keeps the
//! session's active selection in step with the markers in the document.

use crate::document::MarkerState;
use crate::highlighter::RangeAdapter;
use crate::session::CompareSession;
use crate::types::{HighlightId, Panel};

/// Why a selection gesture produced no highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredSelection {
    /// No live selection at mouse-up.
    Missing,
    /// Anchor and focus coincide, or the range is empty after clamping.
    Collapsed,
    /// One or both ends lie outside the panels, or in different panels.
    NotInSinglePanel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Created { id: HighlightId, panel: Panel },
    Ignored(IgnoredSelection),
}

/// Handles mouse-up inside a compare panel.
///
/// A valid selection (non-empty, fully inside one panel root) becomes a new
/// selected highlight: it is recorded as the session's active selection, its
/// panel becomes the modified panel, the annotation drawer opens, and the
/// native selection is cleared so the marker alone shows the choice. A still
/// pending highlight from an earlier gesture is removed first, so at most one
/// highlight awaits an annotation.
///
/// Invalid selections change nothing.
pub fn on_selection_end<A: RangeAdapter>(
    adapter: &mut A,
    session: &mut CompareSession,
) -> SelectionOutcome {
    let Some(selection) = adapter.live_selection() else {
        return SelectionOutcome::Ignored(IgnoredSelection::Missing);
    };
    let Some(panel) = selection.root() else {
        tracing::debug!("selection spans outside a single panel; ignored");
        return SelectionOutcome::Ignored(IgnoredSelection::NotInSinglePanel);
    };
    if selection.is_collapsed() {
        return SelectionOutcome::Ignored(IgnoredSelection::Collapsed);
    }

    // Probe on the range first so a pending highlight is only dropped when a
    // replacement will actually be created.
    let (start, end) = selection.range();
    if start == end {
        return SelectionOutcome::Ignored(IgnoredSelection::Collapsed);
    }

    let pending = session
        .active_selection()
        .filter(|id| adapter.marker_state(id) == Some(MarkerState::Selected))
        .map(str::to_owned);

    let Some(id) = adapter.create_highlight(&selection) else {
        return SelectionOutcome::Ignored(IgnoredSelection::Collapsed);
    };
    if let Some(old) = pending {
        adapter.remove_highlight(&old);
        tracing::debug!(%old, "replaced pending highlight");
    }

    session.set_active_selection(id.clone());
    session.set_modified_panel(panel);
    session.set_annotations_open(true);
    adapter.clear_live_selection();
    tracing::debug!(%id, panel = panel.as_str(), "highlight captured");

    SelectionOutcome::Created { id, panel }
}

/// Handles mouse-down inside a compare panel.
///
/// Clears the active selection when its marker is gone from the document (the
/// panel was re-rendered or the marker was removed). Returns `true` if the
/// selection was cleared.
pub fn on_panel_mouse_down<A: RangeAdapter>(adapter: &A, session: &mut CompareSession) -> bool {
    match session.active_selection() {
        Some(id) if !adapter.has_marker(id) => {
            tracing::debug!(%id, "stale active selection cleared");
            session.clear_active_selection();
            true
        }
        _ => false,
    }
}

/// Removes the pending highlight when the user unlinks it from the composer.
///
/// Returns `true` if a marker was removed or a dangling id was cleared.
pub fn discard_pending<A: RangeAdapter>(adapter: &mut A, session: &mut CompareSession) -> bool {
    let Some(id) = session.active_selection().map(str::to_owned) else {
        return false;
    };
    if adapter.marker_state(&id) == Some(MarkerState::Selected) {
        adapter.remove_highlight(&id);
    }
    session.clear_active_selection();
    true
}
