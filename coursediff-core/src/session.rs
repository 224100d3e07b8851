//! Compare view state: the single source of truth for one comparison.
//!
//! A `CompareSession` is owned by the front end and passed by reference into
//! the highlight manager and the submission coordinator. Readers use the
//! selector methods; only the setters below mutate it.

use crate::types::{AnnotationId, ChangeId, HighlightId, MaterialId, Panel};

/// Cache key for everything fetched on behalf of one change in one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub material_id: MaterialId,
    pub change_id: ChangeId,
}

/// The annotation a new annotation will reply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub annotation_id: AnnotationId,
    pub change_id: ChangeId,
    pub author_name: String,
}

#[derive(Debug, Default)]
pub struct CompareSession {
    material_id: Option<MaterialId>,
    previous_change_id: Option<ChangeId>,
    current_change_id: Option<ChangeId>,
    modified_panel: Option<Panel>,
    reply_target: Option<ReplyTarget>,
    active_selection: Option<HighlightId>,
    annotations_open: bool,
    epoch: u64,
}

impl CompareSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the session at a new material/change pair.
    ///
    /// Reply target, active selection and modified panel are reset; the epoch
    /// advances so responses addressed to the previous pair can be told apart.
    /// Persisted highlight blobs are untouched; they belong to the changes.
    pub fn open(
        &mut self,
        material_id: MaterialId,
        previous_change_id: Option<ChangeId>,
        current_change_id: ChangeId,
    ) {
        self.material_id = Some(material_id);
        self.previous_change_id = previous_change_id;
        self.current_change_id = Some(current_change_id);
        self.modified_panel = None;
        self.reply_target = None;
        self.active_selection = None;
        self.epoch += 1;
        tracing::debug!(
            material_id,
            ?previous_change_id,
            current_change_id,
            epoch = self.epoch,
            "compare session opened"
        );
    }

    pub fn material_id(&self) -> Option<MaterialId> {
        self.material_id
    }

    pub fn previous_change_id(&self) -> Option<ChangeId> {
        self.previous_change_id
    }

    pub fn current_change_id(&self) -> Option<ChangeId> {
        self.current_change_id
    }

    pub fn modified_panel(&self) -> Option<Panel> {
        self.modified_panel
    }

    pub fn reply_target(&self) -> Option<&ReplyTarget> {
        self.reply_target.as_ref()
    }

    pub fn active_selection(&self) -> Option<&str> {
        self.active_selection.as_deref()
    }

    pub fn annotations_open(&self) -> bool {
        self.annotations_open
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The change rendered in `panel`.
    pub fn change_for_panel(&self, panel: Panel) -> Option<ChangeId> {
        match panel {
            Panel::Previous => self.previous_change_id,
            Panel::Current => self.current_change_id,
        }
    }

    pub fn key_for(&self, change_id: ChangeId) -> Option<SessionKey> {
        self.material_id.map(|material_id| SessionKey {
            material_id,
            change_id,
        })
    }

    /// Key of the current change, which owns the primary annotation thread.
    pub fn key(&self) -> Option<SessionKey> {
        self.current_change_id.and_then(|id| self.key_for(id))
    }

    pub fn set_modified_panel(&mut self, panel: Panel) {
        self.modified_panel = Some(panel);
    }

    pub fn set_active_selection(&mut self, id: HighlightId) {
        self.active_selection = Some(id);
    }

    pub fn clear_active_selection(&mut self) {
        self.active_selection = None;
    }

    pub fn set_annotations_open(&mut self, open: bool) {
        self.annotations_open = open;
    }

    /// Sets the reply target, or clears it if `target` is already the target.
    pub fn toggle_reply_target(&mut self, target: ReplyTarget) {
        if self.reply_target.as_ref().map(|t| t.annotation_id) == Some(target.annotation_id) {
            self.reply_target = None;
        } else {
            self.reply_target = Some(target);
        }
    }

    pub fn clear_reply_target(&mut self) {
        self.reply_target = None;
    }
}
