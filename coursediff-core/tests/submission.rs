//! Submission coordinator against a recording mock of the review API.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{Call, MockApi};
use coursediff_core::api::ReviewApi;
use coursediff_core::cache::AnnotationCache;
use coursediff_core::coordinator::{
    EventEffect, SubmissionCoordinator, SubmissionEvent, SubmitOutcome,
};
use coursediff_core::document::{Document, MarkerState, TextPoint, TextSelection};
use coursediff_core::highlight::{self, SelectionOutcome};
use coursediff_core::highlighter::RangeAdapter;
use coursediff_core::session::{CompareSession, ReplyTarget};
use coursediff_core::types::Panel;
use tokio::sync::mpsc;

const CHANGE_A: i64 = 10;
const CHANGE_B: i64 = 11;
const PREV: &str = "Assignments submitted after the deadline follow the late policy.";
const CURRENT: &str = "Assignments submitted after the deadline are not accepted.";

struct Harness {
    api: Arc<MockApi>,
    coordinator: SubmissionCoordinator<MockApi, SubmissionEvent>,
    rx: mpsc::UnboundedReceiver<SubmissionEvent>,
    session: CompareSession,
    doc: Document,
    cache: AnnotationCache,
}

impl Harness {
    fn new() -> Self {
        let api = Arc::new(MockApi::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = SubmissionCoordinator::new(Arc::clone(&api), tx, "u-1");
        let mut session = CompareSession::new();
        session.open(7, Some(CHANGE_A), CHANGE_B);
        let mut doc = Document::new();
        doc.mount(Panel::Previous, PREV);
        doc.mount(Panel::Current, CURRENT);
        Self {
            api,
            coordinator,
            rx,
            session,
            doc,
            cache: AnnotationCache::new(),
        }
    }

    fn highlight(&mut self, root: Panel, needle: &str) -> String {
        let text = if root == Panel::Previous { PREV } else { CURRENT };
        let start = text.find(needle).unwrap();
        self.doc.select(TextSelection::new(
            TextPoint::inside(root, start),
            TextPoint::inside(root, start + needle.len()),
        ));
        match highlight::on_selection_end(&mut self.doc, &mut self.session) {
            SelectionOutcome::Created { id, .. } => id,
            other => panic!("selection ignored: {other:?}"),
        }
    }

    fn submit(&mut self, text: &str) -> SubmitOutcome {
        self.coordinator.composer_mut().text = text.to_owned();
        self.coordinator
            .submit_draft(&mut self.session, &mut self.doc)
            .unwrap()
    }

    async fn next_effect(&mut self) -> EventEffect {
        let event = self.rx.recv().await.unwrap();
        self.coordinator
            .on_event(event, &mut self.session, &mut self.doc, &mut self.cache)
    }

    /// Processes events until the annotation write has completed.
    async fn settle(&mut self) -> Vec<EventEffect> {
        let mut effects = Vec::new();
        while self.coordinator.composer().is_submitting() {
            effects.push(self.next_effect().await);
        }
        while let Ok(event) = self.rx.try_recv() {
            effects.push(self.coordinator.on_event(
                event,
                &mut self.session,
                &mut self.doc,
                &mut self.cache,
            ));
        }
        effects
    }
}

#[tokio::test]
async fn highlighted_annotation_persists_and_creates() {
    let mut h = Harness::new();
    let id = h.highlight(Panel::Previous, "late policy");

    let outcome = h.submit("please clarify");
    assert_eq!(
        outcome,
        SubmitOutcome::Sent {
            ticket: 0,
            change_id: CHANGE_A,
            selection_id: Some(id.clone()),
            persisting: Some(CHANGE_A),
        }
    );
    h.settle().await;

    let calls = h.api.calls();
    assert!(matches!(calls[0], Call::Persist(_)), "persist is issued first: {calls:?}");

    let persists = h.api.persists();
    assert_eq!(persists.len(), 1);
    assert_eq!(persists[0].change_id, CHANGE_A);
    let blob: serde_json::Value = serde_json::from_str(&persists[0].blob).unwrap();
    let entries = blob["highlights"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.as_str());
    assert_eq!(entries[0]["class"], "highlight-unselected");

    let creates = h.api.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].change_id, CHANGE_A);
    assert_eq!(creates[0].body, "please clarify");
    assert_eq!(creates[0].parent_id, None);
    assert_eq!(creates[0].selection_id.as_deref(), Some(id.as_str()));

    assert!(h.coordinator.composer().text.is_empty());
    assert!(h.session.active_selection().is_none());
    assert!(h.doc.markers(Panel::Previous).is_empty());

    // The front end refetches the invalidated key.
    let key = h.session.key_for(CHANGE_A).unwrap();
    assert!(h.cache.needs_fetch(&key));
    let generation = h.cache.mark_fetching(key);
    let rows = h.api.fetch_annotations(CHANGE_A).await.unwrap();
    h.cache.store(key, generation, &rows);
    let thread = h.cache.thread(&key).unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread.entries[0].depth, 0);
    assert_eq!(thread.entries[0].annotation.body, "please clarify");
}

#[tokio::test]
async fn blank_text_issues_no_call() {
    let mut h = Harness::new();
    h.highlight(Panel::Current, "not accepted");

    assert_eq!(h.submit("  \n\t "), SubmitOutcome::Empty);
    assert_eq!(h.coordinator.composer().text, "  \n\t ");
    assert!(!h.coordinator.composer().is_submitting());
    tokio::task::yield_now().await;
    assert!(h.api.calls().is_empty());
    let id = h.session.active_selection().unwrap().to_owned();
    assert_eq!(h.doc.marker_state(&id), Some(MarkerState::Selected));
}

#[tokio::test]
async fn failed_persist_still_creates_with_same_selection() {
    let mut h = Harness::new();
    h.api.fail_persist.store(true, Ordering::SeqCst);
    let id = h.highlight(Panel::Current, "not accepted");

    h.submit("why the change?");
    let effects = h.settle().await;

    assert!(effects.contains(&EventEffect::HighlightsUnsaved));
    let creates = h.api.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].change_id, CHANGE_B);
    assert_eq!(creates[0].selection_id.as_deref(), Some(id.as_str()));

    // Highlight stays visible and targeted for a retry.
    assert_eq!(h.session.active_selection(), Some(id.as_str()));
    assert_eq!(h.doc.marker_state(&id), Some(MarkerState::Selected));
    assert!(h.coordinator.composer().notice().is_some());
    assert!(h.coordinator.composer().text.is_empty());
}

#[tokio::test]
async fn second_submit_while_pending_is_ignored() {
    let mut h = Harness::new();
    h.api.hold_create.store(true, Ordering::SeqCst);

    assert!(matches!(h.submit("first"), SubmitOutcome::Sent { .. }));
    assert_eq!(h.submit("second"), SubmitOutcome::Busy);

    h.api.release_create();
    h.settle().await;

    let creates = h.api.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].body, "first");
    assert!(!h.coordinator.composer().is_submitting());
}

#[tokio::test]
async fn failed_create_keeps_draft_and_reply_target() {
    let mut h = Harness::new();
    h.api.fail_create.store(true, Ordering::SeqCst);
    h.session.toggle_reply_target(ReplyTarget {
        annotation_id: 3,
        change_id: CHANGE_B,
        author_name: "Ada".to_owned(),
    });

    h.submit("  keep me  ");
    let effects = h.settle().await;

    assert_eq!(effects, vec![EventEffect::AnnotationFailed]);
    assert_eq!(h.coordinator.composer().text, "  keep me  ");
    assert!(h.coordinator.composer().error().is_some());
    assert_eq!(h.session.reply_target().map(|t| t.annotation_id), Some(3));
}

#[tokio::test]
async fn reply_goes_to_target_change_and_clears_target() {
    let mut h = Harness::new();
    h.session.toggle_reply_target(ReplyTarget {
        annotation_id: 42,
        change_id: CHANGE_A,
        author_name: "Grace".to_owned(),
    });

    h.submit("agreed");
    h.settle().await;

    let creates = h.api.creates();
    assert_eq!(creates[0].change_id, CHANGE_A);
    assert_eq!(creates[0].parent_id, Some(42));
    assert_eq!(creates[0].selection_id, None);
    assert!(h.api.persists().is_empty());
    assert!(h.session.reply_target().is_none());
}

#[tokio::test]
async fn late_response_does_not_touch_new_session() {
    let mut h = Harness::new();
    h.api.hold_create.store(true, Ordering::SeqCst);
    let old_key = h.session.key_for(CHANGE_B).unwrap();
    let generation = h.cache.mark_fetching(old_key);
    h.cache.store(old_key, generation, &[]);
    assert!(!h.cache.needs_fetch(&old_key));
    h.submit("before navigating");

    h.session.open(8, None, 20);
    h.session.toggle_reply_target(ReplyTarget {
        annotation_id: 99,
        change_id: 20,
        author_name: "Linus".to_owned(),
    });
    h.api.release_create();
    let effects = h.settle().await;

    assert_eq!(effects, vec![EventEffect::Stale]);
    assert_eq!(h.session.reply_target().map(|t| t.annotation_id), Some(99));
    assert!(h.cache.needs_fetch(&old_key));
}

#[tokio::test]
async fn delete_clears_reply_target_inside_subtree() {
    let mut h = Harness::new();
    h.submit("root note");
    h.settle().await;
    let root = h.api.creates().len() as i64;

    h.session.toggle_reply_target(ReplyTarget {
        annotation_id: root,
        change_id: CHANGE_B,
        author_name: "Ada".to_owned(),
    });
    h.submit("a reply");
    h.settle().await;
    let reply_id = root + 1;
    h.session.toggle_reply_target(ReplyTarget {
        annotation_id: reply_id,
        change_id: CHANGE_B,
        author_name: "Ada".to_owned(),
    });

    assert!(h.coordinator.delete(root, CHANGE_B, &h.session));
    let effect = h.next_effect().await;

    let key = h.session.key_for(CHANGE_B).unwrap();
    assert_eq!(
        effect,
        EventEffect::AnnotationsDeleted {
            key,
            ids: vec![root, reply_id],
        }
    );
    assert!(h.session.reply_target().is_none());
    assert!(h.api.fetch_annotations(CHANGE_B).await.unwrap().is_empty());
}

#[tokio::test]
async fn reply_on_other_change_leaves_highlight_pending() {
    let mut h = Harness::new();
    let id = h.highlight(Panel::Current, "not accepted");
    h.session.toggle_reply_target(ReplyTarget {
        annotation_id: 5,
        change_id: CHANGE_A,
        author_name: "Grace".to_owned(),
    });

    let outcome = h.submit("see the older wording");
    assert_eq!(
        outcome,
        SubmitOutcome::Sent {
            ticket: 0,
            change_id: CHANGE_A,
            selection_id: None,
            persisting: None,
        }
    );
    h.settle().await;

    let creates = h.api.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].change_id, CHANGE_A);
    assert_eq!(creates[0].parent_id, Some(5));
    assert_eq!(creates[0].selection_id, None);
    assert!(h.api.persists().is_empty());

    // The highlight still targets the current change's next annotation.
    assert_eq!(h.session.active_selection(), Some(id.as_str()));
    assert_eq!(h.doc.marker_state(&id), Some(MarkerState::Selected));
    assert!(h.coordinator.composer().notice().is_some());
    assert!(h.session.reply_target().is_none());

    h.submit("and here is why");
    h.settle().await;
    let creates = h.api.creates();
    let persists = h.api.persists();
    assert_eq!(creates[1].change_id, CHANGE_B);
    assert_eq!(creates[1].selection_id.as_deref(), Some(id.as_str()));
    assert_eq!(persists.len(), 1);
    assert_eq!(persists[0].change_id, CHANGE_B);
}

#[tokio::test]
async fn marker_root_decides_the_persisted_panel() {
    let mut h = Harness::new();
    let id = h.highlight(Panel::Previous, "late policy");
    // The session's modified panel disagrees with where the marker lives.
    h.session.set_modified_panel(Panel::Current);

    h.submit("older wording");
    h.settle().await;

    let persists = h.api.persists();
    assert_eq!(persists.len(), 1);
    assert_eq!(persists[0].change_id, CHANGE_A);
    assert!(persists[0].blob.contains(&id));
    assert_eq!(h.api.creates()[0].change_id, CHANGE_A);
}
