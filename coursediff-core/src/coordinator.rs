//! Annotation submission coordinator: the single write path for the composer.
//!
//! A submission issues up to two independent writes, "persist highlights" and
//! "create annotation". Both run in one spawned task; the persist future is
//! polled first so it is always initiated first, but each completion is
//! reported separately as a [`SubmissionEvent`] and handled on the caller's
//! loop by [`SubmissionCoordinator::on_event`]. Nothing is atomic across the
//! two writes.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::api::ReviewApi;
use crate::cache::AnnotationCache;
use crate::document::MarkerState;
use crate::error::Result;
use crate::highlighter::RangeAdapter;
use crate::session::{CompareSession, SessionKey};
use crate::types::{
    Annotation, AnnotationId, ChangeId, HighlightId, HighlightUpdate, NewAnnotation, Panel,
};

/// Completion of one write issued by the coordinator.
///
/// `epoch` is the session epoch at the time the write was issued; responses
/// from an earlier epoch never touch the current session or document.
#[derive(Debug)]
pub enum SubmissionEvent {
    HighlightsPersisted {
        epoch: u64,
        change_id: ChangeId,
        selection_id: HighlightId,
        blob: String,
        result: Result<()>,
    },
    AnnotationCreated {
        epoch: u64,
        ticket: u64,
        key: SessionKey,
        result: Result<Annotation>,
    },
    AnnotationDeleted {
        epoch: u64,
        key: SessionKey,
        annotation_id: AnnotationId,
        result: Result<Vec<AnnotationId>>,
    },
}

/// What [`SubmissionCoordinator::submit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Body was empty after trimming; nothing happened.
    Empty,
    /// A submission from this composer is still in flight; ignored.
    Busy,
    /// No change is open in the session.
    NoChange,
    Sent {
        ticket: u64,
        change_id: ChangeId,
        selection_id: Option<HighlightId>,
        /// Change whose highlight blob is being persisted, if any.
        persisting: Option<ChangeId>,
    },
}

/// What the caller should reflect after [`SubmissionCoordinator::on_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEffect {
    /// Highlights were saved. The caller should store `blob` on its copy of
    /// the change and re-apply persisted blobs when `markers_cleared` is set.
    HighlightsSaved {
        change_id: ChangeId,
        blob: String,
        markers_cleared: bool,
    },
    HighlightsUnsaved,
    AnnotationAdded(SessionKey),
    AnnotationFailed,
    AnnotationsDeleted { key: SessionKey, ids: Vec<AnnotationId> },
    DeleteFailed,
    /// The response belonged to an earlier session and only the cache was
    /// updated.
    Stale,
}

/// Text and status shown by the annotation composer.
#[derive(Debug, Default)]
pub struct Composer {
    pub text: String,
    error: Option<String>,
    notice: Option<String>,
    in_flight: Option<u64>,
}

impl Composer {
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_draft(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

pub struct SubmissionCoordinator<A: ReviewApi, E> {
    api: Arc<A>,
    tx: UnboundedSender<E>,
    author_id: String,
    composer: Composer,
    next_ticket: u64,
}

impl<A, E> SubmissionCoordinator<A, E>
where
    A: ReviewApi,
    E: From<SubmissionEvent> + Send + 'static,
{
    pub fn new(api: Arc<A>, tx: UnboundedSender<E>, author_id: impl Into<String>) -> Self {
        Self {
            api,
            tx,
            author_id: author_id.into(),
            composer: Composer::default(),
            next_ticket: 0,
        }
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    /// Submits whatever the composer currently holds.
    pub fn submit_draft<D: RangeAdapter>(
        &mut self,
        session: &mut CompareSession,
        adapter: &mut D,
    ) -> Result<SubmitOutcome> {
        let raw = self.composer.text.clone();
        self.submit(&raw, session, adapter)
    }

    /// Validates `raw` and issues the paired writes.
    ///
    /// With a live highlight attached, its marker is switched to unselected
    /// and the modified panel's subtree is serialized before anything is sent.
    /// If serialization fails the marker is switched back and the error is
    /// returned with no write issued.
    ///
    /// A reply whose target sits on the other change than the highlight is
    /// sent without the link; the highlight stays pending for a later
    /// annotation on its own change.
    pub fn submit<D: RangeAdapter>(
        &mut self,
        raw: &str,
        session: &mut CompareSession,
        adapter: &mut D,
    ) -> Result<SubmitOutcome> {
        let body = raw.trim();
        if body.is_empty() {
            return Ok(SubmitOutcome::Empty);
        }
        if self.composer.in_flight.is_some() {
            tracing::debug!("submission already in flight; ignored");
            return Ok(SubmitOutcome::Busy);
        }

        let selection_id = match session.active_selection() {
            Some(id) if adapter.has_marker(id) => Some(id.to_owned()),
            Some(_) => {
                session.clear_active_selection();
                None
            }
            None => None,
        };
        let panel: Option<Panel> = selection_id.as_deref().and_then(|id| {
            adapter
                .marker_root(id)
                .or_else(|| session.modified_panel())
        });

        // A reply lives on its target's change. A highlight stored on the
        // other change could never be resolved from it, so it stays pending.
        let reply_change = session.reply_target().map(|t| t.change_id);
        let (selection_id, panel, detached) = match (reply_change, panel) {
            (Some(target), Some(p)) if session.change_for_panel(p) != Some(target) => {
                (None, None, true)
            }
            _ => (selection_id, panel, false),
        };

        let owner = session
            .reply_target()
            .map(|t| t.change_id)
            .or_else(|| panel.and_then(|p| session.change_for_panel(p)))
            .or(session.current_change_id());
        let Some(change_id) = owner else {
            return Ok(SubmitOutcome::NoChange);
        };
        let Some(key) = session.key_for(change_id) else {
            return Ok(SubmitOutcome::NoChange);
        };

        let update = match (selection_id.as_deref(), panel) {
            (Some(id), Some(panel)) => match session.change_for_panel(panel) {
                Some(target) => Some(scoped_blob(adapter, id, panel, target)?),
                None => None,
            },
            _ => None,
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.composer.in_flight = Some(ticket);
        self.composer.error = None;
        self.composer.notice = detached.then(|| {
            "highlight kept: it belongs to the other version, not the reply".to_owned()
        });

        let epoch = session.epoch();
        let new = NewAnnotation {
            change_id,
            author_id: self.author_id.clone(),
            body: body.to_owned(),
            parent_id: session.reply_target().map(|t| t.annotation_id),
            selection_id: selection_id.clone(),
        };
        let persisting = update.as_ref().map(|u| u.change_id);
        tracing::info!(
            change_id,
            ?persisting,
            selection_id = ?selection_id,
            parent_id = ?new.parent_id,
            "submitting annotation"
        );

        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let persisted_selection = selection_id.clone();
        tokio::spawn(async move {
            let persist = async {
                let (Some(update), Some(selection_id)) = (update, persisted_selection) else {
                    return;
                };
                let change_id = update.change_id;
                let blob = update.blob.clone();
                let result = api.persist_highlights(update).await;
                let _ = tx.send(E::from(SubmissionEvent::HighlightsPersisted {
                    epoch,
                    change_id,
                    selection_id,
                    blob,
                    result,
                }));
            };
            let create = async {
                let result = api.create_annotation(new).await;
                let _ = tx.send(E::from(SubmissionEvent::AnnotationCreated {
                    epoch,
                    ticket,
                    key,
                    result,
                }));
            };
            tokio::join!(persist, create);
        });

        Ok(SubmitOutcome::Sent {
            ticket,
            change_id,
            selection_id,
            persisting,
        })
    }

    /// Deletes an annotation and its replies.
    pub fn delete(
        &mut self,
        annotation_id: AnnotationId,
        change_id: ChangeId,
        session: &CompareSession,
    ) -> bool {
        let Some(key) = session.key_for(change_id) else {
            return false;
        };
        let epoch = session.epoch();
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.delete_annotation(annotation_id).await;
            let _ = tx.send(E::from(SubmissionEvent::AnnotationDeleted {
                epoch,
                key,
                annotation_id,
                result,
            }));
        });
        true
    }

    /// Applies one completion to the session, document, composer and cache.
    pub fn on_event<D: RangeAdapter>(
        &mut self,
        event: SubmissionEvent,
        session: &mut CompareSession,
        adapter: &mut D,
        cache: &mut AnnotationCache,
    ) -> EventEffect {
        match event {
            SubmissionEvent::HighlightsPersisted {
                epoch,
                change_id,
                selection_id,
                blob,
                result,
            } => {
                let current = epoch == session.epoch();
                match result {
                    Ok(()) => {
                        let mut markers_cleared = false;
                        if current {
                            // A newer pending highlight survives until it is submitted.
                            let newer_pending = session
                                .active_selection()
                                .is_some_and(|id| id != selection_id && adapter.has_marker(id));
                            if !newer_pending {
                                adapter.remove_all();
                                session.clear_active_selection();
                                markers_cleared = true;
                            }
                        }
                        EventEffect::HighlightsSaved {
                            change_id,
                            blob,
                            markers_cleared,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(change_id, %selection_id, error = %e, "highlight persistence failed");
                        if !current {
                            return EventEffect::Stale;
                        }
                        if adapter.marker_state(&selection_id) == Some(MarkerState::Unselected) {
                            adapter.toggle_selected_state(&selection_id);
                        }
                        self.composer.notice =
                            Some("highlight not saved; submit again to retry".to_owned());
                        EventEffect::HighlightsUnsaved
                    }
                }
            }
            SubmissionEvent::AnnotationCreated {
                epoch,
                ticket,
                key,
                result,
            } => {
                let mine = self.composer.in_flight == Some(ticket);
                if mine {
                    self.composer.in_flight = None;
                }
                match result {
                    Ok(annotation) => {
                        cache.invalidate(&key);
                        if mine {
                            self.composer.text.clear();
                            self.composer.error = None;
                        }
                        if epoch != session.epoch() {
                            return EventEffect::Stale;
                        }
                        session.clear_reply_target();
                        tracing::debug!(annotation_id = annotation.id, "composer reset");
                        EventEffect::AnnotationAdded(key)
                    }
                    Err(e) => {
                        tracing::warn!(change_id = key.change_id, error = %e, "annotation create failed");
                        if mine {
                            self.composer.error = Some(format!("annotation not saved: {e}"));
                        }
                        EventEffect::AnnotationFailed
                    }
                }
            }
            SubmissionEvent::AnnotationDeleted {
                epoch,
                key,
                annotation_id,
                result,
            } => match result {
                Ok(ids) => {
                    cache.invalidate(&key);
                    if epoch == session.epoch()
                        && session
                            .reply_target()
                            .is_some_and(|t| ids.contains(&t.annotation_id))
                    {
                        session.clear_reply_target();
                    }
                    EventEffect::AnnotationsDeleted { key, ids }
                }
                Err(e) => {
                    tracing::warn!(annotation_id, error = %e, "annotation delete failed");
                    self.composer.notice = Some(format!("delete failed: {e}"));
                    EventEffect::DeleteFailed
                }
            },
        }
    }

    /// Clears transient composer status when the session switches to another
    /// change. The draft and any in-flight submission are kept; writes are
    /// never cancelled by navigation.
    pub fn on_session_switch(&mut self) {
        self.composer.error = None;
        self.composer.notice = None;
    }
}

/// Switches the marker to unselected and serializes the highlights under
/// `panel`. The marker is switched back if serialization fails.
fn scoped_blob<D: RangeAdapter>(
    adapter: &mut D,
    id: &str,
    panel: Panel,
    change_id: ChangeId,
) -> Result<HighlightUpdate> {
    let flipped = adapter.marker_state(id) == Some(MarkerState::Selected)
        && adapter.toggle_selected_state(id);
    let blob = adapter
        .serialize_all()
        .and_then(|all| adapter.serialize_subtree(panel, &all));
    match blob {
        Ok(blob) => Ok(HighlightUpdate { change_id, blob }),
        Err(e) => {
            if flipped {
                adapter.toggle_selected_state(id);
            }
            Err(e)
        }
    }
}
