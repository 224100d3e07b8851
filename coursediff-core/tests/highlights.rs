//! Highlight adapter and highlight manager behaviour over the panel document.

use coursediff_core::document::{Document, MarkerState, TextPoint, TextSelection};
use coursediff_core::highlight::{self, IgnoredSelection, SelectionOutcome};
use coursediff_core::highlighter::RangeAdapter;
use coursediff_core::session::CompareSession;
use coursediff_core::types::Panel;

const PREV: &str = "Late work loses 10% per day under the late policy.";
const CURRENT: &str = "Late work loses 5% per day under the revised late policy.";

fn document() -> Document {
    let mut doc = Document::new();
    doc.mount(Panel::Previous, PREV);
    doc.mount(Panel::Current, CURRENT);
    doc
}

fn span(text: &str, needle: &str) -> (usize, usize) {
    let byte = text.find(needle).unwrap();
    let start = text[..byte].chars().count();
    (start, start + needle.chars().count())
}

fn select(doc: &mut Document, root: Panel, text: &str, needle: &str) {
    let (start, end) = span(text, needle);
    doc.select(TextSelection::new(
        TextPoint::inside(root, start),
        TextPoint::inside(root, end),
    ));
}

fn session() -> CompareSession {
    let mut session = CompareSession::new();
    session.open(7, Some(10), 11);
    session
}

#[test]
fn selection_inside_one_panel_creates_one_highlight() {
    let mut doc = document();
    let mut session = session();
    select(&mut doc, Panel::Previous, PREV, "late policy");

    let outcome = highlight::on_selection_end(&mut doc, &mut session);
    let SelectionOutcome::Created { id, panel } = outcome else {
        panic!("expected a highlight, got {outcome:?}");
    };

    assert_eq!(panel, Panel::Previous);
    assert_eq!(session.active_selection(), Some(id.as_str()));
    assert_eq!(session.modified_panel(), Some(Panel::Previous));
    assert!(session.annotations_open());
    assert!(doc.live_selection().is_none(), "native selection is cleared");

    let markers = doc.markers(Panel::Previous);
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].state, MarkerState::Selected);
    assert_eq!(doc.excerpt(Panel::Previous, markers[0].start, markers[0].end), "late policy");
    assert!(doc.markers(Panel::Current).is_empty());
}

#[test]
fn invalid_selections_change_nothing() {
    let mut doc = document();
    let mut session = session();

    // Establish an active selection first so we can see it is left alone.
    select(&mut doc, Panel::Current, CURRENT, "revised");
    let SelectionOutcome::Created { id, .. } = highlight::on_selection_end(&mut doc, &mut session)
    else {
        panic!("setup selection failed");
    };

    let cases = [
        (
            TextSelection::new(TextPoint::inside(Panel::Previous, 4), TextPoint::inside(Panel::Previous, 4)),
            IgnoredSelection::Collapsed,
        ),
        (
            TextSelection::new(TextPoint::inside(Panel::Previous, 3), TextPoint::inside(Panel::Current, 9)),
            IgnoredSelection::NotInSinglePanel,
        ),
        (
            TextSelection::new(TextPoint::inside(Panel::Current, 3), TextPoint::outside()),
            IgnoredSelection::NotInSinglePanel,
        ),
    ];

    for (selection, reason) in cases {
        doc.select(selection);
        let outcome = highlight::on_selection_end(&mut doc, &mut session);
        assert_eq!(outcome, SelectionOutcome::Ignored(reason));
        assert_eq!(session.active_selection(), Some(id.as_str()));
        assert_eq!(doc.markers(Panel::Previous).len(), 0);
        assert_eq!(doc.markers(Panel::Current).len(), 1);
    }

    doc.clear_live_selection();
    assert_eq!(
        highlight::on_selection_end(&mut doc, &mut session),
        SelectionOutcome::Ignored(IgnoredSelection::Missing)
    );
}

#[test]
fn backwards_drag_is_normalised() {
    let mut doc = document();
    let mut session = session();
    let (start, end) = span(PREV, "10% per day");
    doc.select(TextSelection::new(
        TextPoint::inside(Panel::Previous, end),
        TextPoint::inside(Panel::Previous, start),
    ));

    assert!(matches!(
        highlight::on_selection_end(&mut doc, &mut session),
        SelectionOutcome::Created { .. }
    ));
    let m = &doc.markers(Panel::Previous)[0];
    assert_eq!((m.start, m.end), (start, end));
}

#[test]
fn new_selection_replaces_pending_highlight() {
    let mut doc = document();
    let mut session = session();

    select(&mut doc, Panel::Previous, PREV, "late policy");
    let SelectionOutcome::Created { id: first, .. } =
        highlight::on_selection_end(&mut doc, &mut session)
    else {
        panic!("first selection failed");
    };
    select(&mut doc, Panel::Current, CURRENT, "5% per day");
    let SelectionOutcome::Created { id: second, panel } =
        highlight::on_selection_end(&mut doc, &mut session)
    else {
        panic!("second selection failed");
    };

    assert_ne!(first, second);
    assert!(!doc.has_marker(&first));
    assert!(doc.has_marker(&second));
    assert_eq!(panel, Panel::Current);
    assert_eq!(session.modified_panel(), Some(Panel::Current));
}

#[test]
fn mouse_down_clears_stale_selection_only() {
    let mut doc = document();
    let mut session = session();
    select(&mut doc, Panel::Previous, PREV, "late policy");
    highlight::on_selection_end(&mut doc, &mut session);

    assert!(!highlight::on_panel_mouse_down(&doc, &mut session));
    assert!(session.active_selection().is_some());

    // Re-rendering the panel drops its markers.
    doc.mount(Panel::Previous, PREV);
    assert!(highlight::on_panel_mouse_down(&doc, &mut session));
    assert!(session.active_selection().is_none());
}

#[test]
fn discard_pending_unwraps_marker() {
    let mut doc = document();
    let mut session = session();
    select(&mut doc, Panel::Previous, PREV, "late policy");
    highlight::on_selection_end(&mut doc, &mut session);

    assert!(highlight::discard_pending(&mut doc, &mut session));
    assert!(doc.markers(Panel::Previous).is_empty());
    assert!(session.active_selection().is_none());
    assert!(!highlight::discard_pending(&mut doc, &mut session));
}

#[test]
fn serialized_highlights_restore_onto_fresh_document() {
    let mut doc = document();
    select(&mut doc, Panel::Previous, PREV, "late policy");
    let a = doc.create_highlight(&doc.live_selection().unwrap()).unwrap();
    select(&mut doc, Panel::Current, CURRENT, "revised");
    let b = doc.create_highlight(&doc.live_selection().unwrap()).unwrap();
    doc.toggle_selected_state(&b);

    let blob = doc.serialize_all().unwrap();

    let mut fresh = document();
    assert_eq!(fresh.deserialize(&blob).unwrap(), 2);
    assert_eq!(fresh.markers(Panel::Previous), doc.markers(Panel::Previous));
    assert_eq!(fresh.markers(Panel::Current), doc.markers(Panel::Current));
    assert_eq!(fresh.marker_state(&a), Some(MarkerState::Selected));
    assert_eq!(fresh.marker_state(&b), Some(MarkerState::Unselected));
    assert_eq!(fresh.serialize_all().unwrap(), blob);
}

#[test]
fn deserialize_is_idempotent() {
    let mut doc = document();
    select(&mut doc, Panel::Previous, PREV, "late policy");
    doc.create_highlight(&doc.live_selection().unwrap()).unwrap();
    let blob = doc.serialize_all().unwrap();

    let mut fresh = document();
    assert_eq!(fresh.deserialize(&blob).unwrap(), 1);
    assert_eq!(fresh.deserialize(&blob).unwrap(), 0);
    assert_eq!(fresh.markers(Panel::Previous).len(), 1);
}

#[test]
fn subtree_serialization_keeps_only_that_panel() {
    let mut doc = document();
    select(&mut doc, Panel::Previous, PREV, "late policy");
    let prev_id = doc.create_highlight(&doc.live_selection().unwrap()).unwrap();
    select(&mut doc, Panel::Current, CURRENT, "revised");
    let current_id = doc.create_highlight(&doc.live_selection().unwrap()).unwrap();

    let all = doc.serialize_all().unwrap();
    let prev = doc.serialize_subtree(Panel::Previous, &all).unwrap();
    assert_eq!(prev, doc.serialize_subtree(Panel::Previous, &doc.serialize_all().unwrap()).unwrap());

    let value: serde_json::Value = serde_json::from_str(&prev).unwrap();
    let entries = value["highlights"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], prev_id.as_str());
    assert_eq!(entries[0]["root"], "prev");
    assert_eq!(entries[0]["text"], "late policy");
    assert!(!prev.contains(&current_id));
}

#[test]
fn drifted_content_is_not_highlighted() {
    let mut doc = document();
    select(&mut doc, Panel::Current, CURRENT, "revised");
    doc.create_highlight(&doc.live_selection().unwrap()).unwrap();
    let blob = doc.serialize_all().unwrap();

    let mut edited = Document::new();
    edited.mount(Panel::Current, "Late work is not accepted.");
    assert_eq!(edited.deserialize(&blob).unwrap(), 0);
    assert!(edited.markers(Panel::Current).is_empty());
}

#[test]
fn blob_can_be_reanchored_to_other_panel() {
    let mut doc = document();
    select(&mut doc, Panel::Current, CURRENT, "revised");
    let id = doc.create_highlight(&doc.live_selection().unwrap()).unwrap();
    let blob = doc.serialize_all().unwrap();

    // The same change later shows up as the previous version.
    let mut next = Document::new();
    next.mount(Panel::Previous, CURRENT);
    assert_eq!(next.deserialize_into(Panel::Previous, &blob).unwrap(), 1);
    assert_eq!(next.marker_root(&id), Some(Panel::Previous));
}

#[test]
fn malformed_blobs_are_rejected() {
    let mut doc = document();
    assert_eq!(doc.deserialize("").unwrap(), 0);
    assert!(doc.deserialize("not json").is_err());
    assert!(doc.deserialize(r#"{"type":"CharacterRange","highlights":[]}"#).is_err());
}

#[test]
fn removal_merges_text_back() {
    let mut doc = document();
    select(&mut doc, Panel::Previous, PREV, "late policy");
    let id = doc.create_highlight(&doc.live_selection().unwrap()).unwrap();
    assert_eq!(doc.segments(Panel::Previous).len(), 3);

    assert!(!doc.remove_highlight("no-such-id"));
    assert!(doc.remove_highlight(&id));
    let segments = doc.segments(Panel::Previous);
    assert_eq!(segments.len(), 1);
    assert!(segments[0].marker.is_none());
    assert_eq!(segments[0].end, PREV.chars().count());
}
