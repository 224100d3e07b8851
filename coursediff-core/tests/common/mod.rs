#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use coursediff_core::api::ReviewApi;
use coursediff_core::error::{CoreError, Result};
use coursediff_core::types::{
    Annotation, AnnotationId, Author, Change, ChangeId, HighlightUpdate, MaterialId,
    NewAnnotation, UserRole,
};
use tokio::sync::Notify;

/// One recorded call, in the order the calls were issued.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchAnnotations(ChangeId),
    Create(NewAnnotation),
    Delete(AnnotationId),
    Persist(HighlightUpdate),
    FetchChanges(MaterialId),
    FetchRecent,
}

/// In-memory `ReviewApi` that records calls and can hold or fail writes.
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<Call>>,
    annotations: Mutex<Vec<Annotation>>,
    next_id: AtomicI64,
    pub fail_persist: AtomicBool,
    pub fail_create: AtomicBool,
    pub hold_create: AtomicBool,
    create_gate: Notify,
}

pub fn author() -> Author {
    Author {
        id: "u-1".to_owned(),
        name: "Ada".to_owned(),
        role: UserRole::Ta,
    }
}

pub fn annotation(id: AnnotationId, parent_id: Option<AnnotationId>, timestamp: i64) -> Annotation {
    Annotation {
        id,
        change_id: 1,
        author: author(),
        body: format!("note {id}"),
        parent_id,
        timestamp,
        selection_id: None,
    }
}

impl MockApi {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<NewAnnotation> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(new) => Some(new),
                _ => None,
            })
            .collect()
    }

    pub fn persists(&self) -> Vec<HighlightUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Persist(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    /// Lets one held `create_annotation` complete.
    pub fn release_create(&self) {
        self.create_gate.notify_one();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ReviewApi for MockApi {
    fn fetch_annotations(
        &self,
        change_id: ChangeId,
    ) -> impl Future<Output = Result<Vec<Annotation>>> + Send {
        self.record(Call::FetchAnnotations(change_id));
        let rows: Vec<Annotation> = self
            .annotations
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.change_id == change_id)
            .cloned()
            .collect();
        async move { Ok(rows) }
    }

    fn create_annotation(
        &self,
        new: NewAnnotation,
    ) -> impl Future<Output = Result<Annotation>> + Send {
        self.record(Call::Create(new.clone()));
        async move {
            if self.hold_create.load(Ordering::SeqCst) {
                self.create_gate.notified().await;
            }
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(CoreError::Validation("server unavailable".to_owned()));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let annotation = Annotation {
                id,
                change_id: new.change_id,
                author: author(),
                body: new.body,
                parent_id: new.parent_id,
                timestamp: id * 10,
                selection_id: new.selection_id,
            };
            self.annotations.lock().unwrap().push(annotation.clone());
            Ok(annotation)
        }
    }

    fn delete_annotation(
        &self,
        annotation_id: AnnotationId,
    ) -> impl Future<Output = Result<Vec<AnnotationId>>> + Send {
        self.record(Call::Delete(annotation_id));
        let mut rows = self.annotations.lock().unwrap();
        let mut removed = vec![annotation_id];
        removed.extend(coursediff_core::thread::descendants(&rows, annotation_id));
        rows.retain(|a| !removed.contains(&a.id));
        async move { Ok(removed) }
    }

    fn persist_highlights(&self, update: HighlightUpdate) -> impl Future<Output = Result<()>> + Send {
        self.record(Call::Persist(update));
        let fail = self.fail_persist.load(Ordering::SeqCst);
        async move {
            if fail {
                Err(CoreError::Validation("highlight store unavailable".to_owned()))
            } else {
                Ok(())
            }
        }
    }

    fn fetch_changes_for_material(
        &self,
        material_id: MaterialId,
    ) -> impl Future<Output = Result<Vec<Change>>> + Send {
        self.record(Call::FetchChanges(material_id));
        async move { Ok(Vec::new()) }
    }

    fn fetch_recent_changes(&self) -> impl Future<Output = Result<Vec<Change>>> + Send {
        self.record(Call::FetchRecent);
        async move { Ok(Vec::new()) }
    }
}
