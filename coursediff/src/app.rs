//! Central application state for coursediff.
//!
//! `AppState` owns the review core's per-session objects (compare session,
//! panel document, annotation cache, submission coordinator) together with
//! the purely visual state (mode, focus, scroll offsets, panel geometry). No
//! ratatui rendering happens here: `ui` reads this state and the keybinding
//! dispatcher mutates it.

use std::ops::Range;
use std::sync::Arc;

use coursediff_core::api::SqliteStore;
use coursediff_core::cache::AnnotationCache;
use coursediff_core::coordinator::{
    EventEffect, SubmissionCoordinator, SubmissionEvent, SubmitOutcome,
};
use coursediff_core::document::{Document, TextPoint, TextSelection};
use coursediff_core::highlight::{self, SelectionOutcome};
use coursediff_core::highlighter::RangeAdapter;
use coursediff_core::session::{CompareSession, ReplyTarget, SessionKey};
use coursediff_core::thread::ThreadEntry;
use coursediff_core::types::{AnnotationId, Change, ChangeId, MaterialId, Panel};
use ratatui::layout::{Position, Rect};
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use crate::event::AppEvent;
use crate::loader::{self, DataEvent};
use crate::textdiff::{changed_ranges, ChangedRanges};

pub const PREF_VIEW_MODE: &str = "view_mode";
pub const PREF_ANNOTATIONS_OPEN: &str = "annotations_open";

/// Editor mode controlling which keybinding set is active.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    /// Typing into the annotation composer.
    Insert,
    HelpOverlay,
    /// Quit-confirmation dialog shown when the composer holds a draft.
    ConfirmQuit,
    /// Delete-confirmation dialog for an annotation and its replies.
    ConfirmDelete {
        annotation_id: AnnotationId,
        change_id: ChangeId,
    },
}

/// Which panel currently has keyboard focus.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    #[default]
    Timeline,
    Compare,
    Annotations,
}

impl PanelFocus {
    pub fn prev(self) -> Self {
        match self {
            PanelFocus::Timeline => PanelFocus::Annotations,
            PanelFocus::Compare => PanelFocus::Timeline,
            PanelFocus::Annotations => PanelFocus::Compare,
        }
    }

    pub fn next(self) -> Self {
        match self {
            PanelFocus::Timeline => PanelFocus::Compare,
            PanelFocus::Compare => PanelFocus::Annotations,
            PanelFocus::Annotations => PanelFocus::Timeline,
        }
    }
}

/// How the two compare panels are arranged. Persisted as a preference.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Previous and current side by side.
    #[default]
    Horizontal,
    /// Previous above current.
    Vertical,
    /// Previous version only.
    Before,
    /// Current version only.
    After,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Horizontal => "horizontal",
            ViewMode::Vertical => "vertical",
            ViewMode::Before => "before",
            ViewMode::After => "after",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "horizontal" => Some(ViewMode::Horizontal),
            "vertical" => Some(ViewMode::Vertical),
            "before" => Some(ViewMode::Before),
            "after" => Some(ViewMode::After),
            _ => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            ViewMode::Horizontal => ViewMode::Vertical,
            ViewMode::Vertical => ViewMode::Before,
            ViewMode::Before => ViewMode::After,
            ViewMode::After => ViewMode::Horizontal,
        }
    }

    pub fn shows(self, panel: Panel) -> bool {
        match (self, panel) {
            (ViewMode::Before, Panel::Current) | (ViewMode::After, Panel::Previous) => false,
            _ => true,
        }
    }
}

/// What the timeline panel lists.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TimelineSource {
    #[default]
    Recent,
    /// Every version of the material currently open.
    History,
}

/// Where a compare panel's text landed on screen during the last render.
///
/// `lines[i]` is the character range of the document root drawn on visual
/// row `i` (after wrapping); `scroll` is the first visual row shown.
#[derive(Debug, Clone, Default)]
pub struct PanelGeometry {
    pub area: Rect,
    pub lines: Vec<Range<usize>>,
    pub scroll: usize,
}

impl PanelGeometry {
    /// Maps a screen cell to a character offset of the root. Cells right of a
    /// line's end map to the line end; rows below the text map to its end.
    pub fn point_at(&self, col: u16, row: u16) -> Option<usize> {
        if !self.area.contains(Position { x: col, y: row }) {
            return None;
        }
        let visual = self.scroll + usize::from(row - self.area.y);
        let Some(line) = self.lines.get(visual) else {
            return Some(self.lines.last().map_or(0, |l| l.end));
        };
        let dx = usize::from(col - self.area.x);
        Some(line.start + dx.min(line.len()))
    }
}

/// One row of the annotation drawer: which change's thread it belongs to.
pub struct DrawerRow<'a> {
    pub panel: Panel,
    pub entry: &'a ThreadEntry,
}

pub struct AppState {
    pub mode: Mode,
    pub focus: PanelFocus,
    pub view_mode: ViewMode,
    pub timeline_source: TimelineSource,

    pub recent: Vec<Change>,
    pub history: Vec<Change>,
    pub history_material: Option<MaterialId>,
    pub timeline_state: ListState,
    pub timeline_viewport_height: u16,
    pub loading: bool,

    /// Changes rendered in the compare panels.
    pub previous: Option<Change>,
    pub current: Option<Change>,
    pending_open: Option<ChangeId>,

    pub session: CompareSession,
    pub document: Document,
    pub cache: AnnotationCache,
    pub coordinator: SubmissionCoordinator<SqliteStore, AppEvent>,
    pub diff: ChangedRanges,

    pub compare_scroll: usize,
    pub compare_viewport_height: u16,
    pub annotation_cursor: usize,
    pub help_scroll: u16,

    drag_anchor: Option<TextPoint>,
    /// Geometry of the previous and current panels from the last render.
    pub panel_geometry: [Option<PanelGeometry>; 2],
    /// Timeline, compare area, annotation drawer (zero width when hidden).
    pub panel_rects: [Rect; 3],

    /// One-line message shown in the status bar until the next action.
    pub status: Option<String>,

    api: Arc<SqliteStore>,
    tx: UnboundedSender<AppEvent>,
}

fn slot(panel: Panel) -> usize {
    match panel {
        Panel::Previous => 0,
        Panel::Current => 1,
    }
}

impl AppState {
    pub fn new(api: Arc<SqliteStore>, tx: UnboundedSender<AppEvent>, author_id: &str) -> Self {
        Self {
            mode: Mode::default(),
            focus: PanelFocus::default(),
            view_mode: ViewMode::default(),
            timeline_source: TimelineSource::default(),
            recent: Vec::new(),
            history: Vec::new(),
            history_material: None,
            timeline_state: ListState::default(),
            timeline_viewport_height: 0,
            loading: false,
            previous: None,
            current: None,
            pending_open: None,
            session: CompareSession::new(),
            document: Document::new(),
            cache: AnnotationCache::new(),
            coordinator: SubmissionCoordinator::new(Arc::clone(&api), tx.clone(), author_id),
            diff: ChangedRanges::default(),
            compare_scroll: 0,
            compare_viewport_height: 0,
            annotation_cursor: 0,
            help_scroll: 0,
            drag_anchor: None,
            panel_geometry: [None, None],
            panel_rects: [Rect::default(); 3],
            status: None,
            api,
            tx,
        }
    }

    /// Applies stored preferences. Unknown values are ignored.
    pub fn apply_preferences(&mut self, view_mode: Option<&str>, annotations_open: Option<&str>) {
        if let Some(mode) = view_mode.and_then(ViewMode::parse) {
            self.view_mode = mode;
        }
        self.session
            .set_annotations_open(annotations_open.map_or(true, |v| v == "true"));
    }

    pub fn refresh_recent(&mut self) {
        self.loading = true;
        loader::spawn_recent(&self.api, &self.tx);
    }

    // -----------------------------------------------------------------------
    // Timeline
    // -----------------------------------------------------------------------

    pub fn timeline(&self) -> &[Change] {
        match self.timeline_source {
            TimelineSource::Recent => &self.recent,
            TimelineSource::History => &self.history,
        }
    }

    pub fn toggle_timeline_source(&mut self) {
        self.timeline_source = match self.timeline_source {
            TimelineSource::Recent if self.history_material.is_some() => TimelineSource::History,
            _ => TimelineSource::Recent,
        };
        let selected = match self.timeline_source {
            TimelineSource::History => self
                .current
                .as_ref()
                .and_then(|c| self.history.iter().position(|h| h.id == c.id)),
            TimelineSource::Recent => None,
        };
        self.timeline_state.select(selected.or(Some(0)));
    }

    /// Opens the change selected in the timeline. The material's history is
    /// fetched first so the predecessor can be shown next to it.
    pub fn open_selected(&mut self) {
        let Some(change) = self
            .timeline_state
            .selected()
            .and_then(|i| self.timeline().get(i))
        else {
            return;
        };
        let (id, material_id) = (change.id, change.material_id);
        self.pending_open = Some(id);
        self.loading = true;
        loader::spawn_history(&self.api, material_id, &self.tx);
    }

    pub fn apply_data(&mut self, event: DataEvent) {
        match event {
            DataEvent::RecentChanges(Ok(changes)) => {
                self.loading = false;
                self.recent = changes;
                if self.timeline_state.selected().is_none() && !self.recent.is_empty() {
                    self.timeline_state.select(Some(0));
                }
            }
            DataEvent::RecentChanges(Err(e)) => {
                self.loading = false;
                tracing::warn!(error = %e, "recent changes not loaded");
                self.status = Some(format!("could not load changes: {e}"));
            }
            DataEvent::History {
                material_id,
                result: Ok(history),
            } => {
                self.loading = false;
                self.history = history;
                self.history_material = Some(material_id);
                if let Some(id) = self.pending_open.take() {
                    self.open_change(id);
                }
            }
            DataEvent::History {
                material_id,
                result: Err(e),
            } => {
                self.loading = false;
                self.pending_open = None;
                tracing::warn!(material_id, error = %e, "material history not loaded");
                self.status = Some(e.to_string());
            }
            DataEvent::Annotations {
                key,
                generation,
                result: Ok(annotations),
            } => {
                self.cache.store(key, generation, &annotations);
                self.clamp_annotation_cursor();
            }
            DataEvent::Annotations {
                key,
                generation,
                result: Err(e),
            } => {
                self.cache.fetch_failed(&key, generation);
                tracing::warn!(change_id = key.change_id, error = %e, "annotations not loaded");
                self.status = Some(format!("could not load annotations: {e}"));
            }
        }
    }

    /// Points the compare view at `change_id` (which must be in `history`) and
    /// its predecessor.
    fn open_change(&mut self, change_id: ChangeId) {
        let Some(current) = self.history.iter().find(|c| c.id == change_id).cloned() else {
            self.status = Some(format!("change {change_id} is not in its material's history"));
            return;
        };
        let previous = current
            .supersedes
            .and_then(|p| self.history.iter().find(|c| c.id == p))
            .cloned();

        self.session
            .open(current.material_id, previous.as_ref().map(|c| c.id), current.id);
        self.coordinator.on_session_switch();
        self.drag_anchor = None;

        let prev_text = previous.as_ref().map(Change::content_text).unwrap_or_default();
        let cur_text = current.content_text();
        self.diff = changed_ranges(&prev_text, &cur_text);
        if previous.is_some() {
            self.document.mount(Panel::Previous, prev_text);
        } else {
            self.document.unmount(Panel::Previous);
        }
        self.document.mount(Panel::Current, cur_text);

        self.previous = previous;
        self.current = Some(current);
        self.reapply_highlights();

        self.compare_scroll = 0;
        self.annotation_cursor = 0;
        self.focus = PanelFocus::Compare;
        self.status = None;
        tracing::info!(change_id, "change opened");
    }

    /// Restores each rendered change's stored highlights into its panel.
    fn reapply_highlights(&mut self) {
        for (panel, change) in [(Panel::Previous, &self.previous), (Panel::Current, &self.current)] {
            let Some(change) = change else { continue };
            let Some(blob) = change.highlights.as_deref() else {
                continue;
            };
            if let Err(e) = self.document.deserialize_into(panel, blob) {
                tracing::warn!(change_id = change.id, error = %e, "stored highlights unreadable");
            }
        }
    }

    /// Stores a freshly persisted blob on every local copy of the change.
    fn update_blob(&mut self, change_id: ChangeId, blob: &str) {
        let copies = self
            .previous
            .iter_mut()
            .chain(self.current.iter_mut())
            .chain(self.recent.iter_mut())
            .chain(self.history.iter_mut());
        for change in copies.filter(|c| c.id == change_id) {
            change.highlights = Some(blob.to_owned());
        }
    }

    // -----------------------------------------------------------------------
    // Annotations
    // -----------------------------------------------------------------------

    /// Keys whose threads the drawer shows, current change first.
    pub fn displayed_keys(&self) -> Vec<(Panel, SessionKey)> {
        Panel::BOTH
            .into_iter()
            .rev()
            .filter_map(|p| {
                self.session
                    .change_for_panel(p)
                    .and_then(|id| self.session.key_for(id))
                    .map(|k| (p, k))
            })
            .collect()
    }

    /// Issues fetches for displayed keys that are missing or stale.
    pub fn poll_fetches(&mut self) {
        for (_, key) in self.displayed_keys() {
            if self.cache.needs_fetch(&key) {
                let generation = self.cache.mark_fetching(key);
                loader::spawn_annotations(&self.api, key, generation, &self.tx);
            }
        }
    }

    pub fn drawer_rows(&self) -> Vec<DrawerRow<'_>> {
        let mut rows = Vec::new();
        for (panel, key) in self.displayed_keys() {
            if let Some(thread) = self.cache.thread(&key) {
                rows.extend(thread.entries.iter().map(|entry| DrawerRow { panel, entry }));
            }
        }
        rows
    }

    fn selected_entry(&self) -> Option<&ThreadEntry> {
        self.drawer_rows()
            .into_iter()
            .nth(self.annotation_cursor)
            .map(|r| r.entry)
    }

    fn clamp_annotation_cursor(&mut self) {
        let len = self.drawer_rows().len();
        self.annotation_cursor = self.annotation_cursor.min(len.saturating_sub(1));
    }

    pub fn toggle_reply(&mut self) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        let target = ReplyTarget {
            annotation_id: entry.annotation.id,
            change_id: entry.annotation.change_id,
            author_name: entry.annotation.author.name.clone(),
        };
        self.session.toggle_reply_target(target);
    }

    pub fn request_delete(&mut self) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        let mode = Mode::ConfirmDelete {
            annotation_id: entry.annotation.id,
            change_id: entry.annotation.change_id,
        };
        self.mode = mode;
    }

    pub fn confirm_delete(&mut self, annotation_id: AnnotationId, change_id: ChangeId) {
        if !self.coordinator.delete(annotation_id, change_id, &self.session) {
            self.status = Some("nothing to delete".to_owned());
        }
        self.mode = Mode::Normal;
    }

    pub fn start_compose(&mut self) {
        self.session.set_annotations_open(true);
        self.mode = Mode::Insert;
    }

    pub fn has_unsaved_draft(&self) -> bool {
        self.coordinator.composer().has_draft()
    }

    pub fn submit(&mut self) {
        let outcome = self
            .coordinator
            .submit_draft(&mut self.session, &mut self.document);
        match outcome {
            Ok(SubmitOutcome::Sent { .. }) => {
                self.mode = Mode::Normal;
                self.status = Some("saving annotation...".to_owned());
            }
            Ok(SubmitOutcome::Empty) => {}
            Ok(SubmitOutcome::Busy) => {
                self.status = Some("previous annotation is still being saved".to_owned());
            }
            Ok(SubmitOutcome::NoChange) => {
                self.status = Some("open a change before annotating".to_owned());
            }
            Err(e) => {
                tracing::error!(error = %e, "submission aborted");
                self.status = Some(format!("could not prepare highlight: {e}"));
            }
        }
    }

    pub fn apply_submission(&mut self, event: SubmissionEvent) {
        let effect = self.coordinator.on_event(
            event,
            &mut self.session,
            &mut self.document,
            &mut self.cache,
        );
        match effect {
            EventEffect::HighlightsSaved {
                change_id,
                blob,
                markers_cleared,
            } => {
                self.update_blob(change_id, &blob);
                if markers_cleared {
                    self.reapply_highlights();
                }
            }
            EventEffect::HighlightsUnsaved => {
                self.status = self.coordinator.composer().notice().map(str::to_owned);
            }
            EventEffect::AnnotationAdded(_) => {
                self.status = Some("annotation saved".to_owned());
            }
            EventEffect::AnnotationFailed => {
                self.status = self.coordinator.composer().error().map(str::to_owned);
            }
            EventEffect::AnnotationsDeleted { ids, .. } => {
                self.status = Some(format!("deleted {} annotation(s)", ids.len()));
                self.clamp_annotation_cursor();
            }
            EventEffect::DeleteFailed => {
                self.status = self.coordinator.composer().notice().map(str::to_owned);
            }
            EventEffect::Stale => {}
        }
    }

    // -----------------------------------------------------------------------
    // Highlights and mouse selection
    // -----------------------------------------------------------------------

    /// Finds the compare panel under a screen cell.
    fn point_at(&self, col: u16, row: u16) -> Option<TextPoint> {
        Panel::BOTH.into_iter().find_map(|panel| {
            self.panel_geometry[slot(panel)]
                .as_ref()
                .and_then(|g| g.point_at(col, row))
                .map(|offset| TextPoint::inside(panel, offset))
        })
    }

    pub fn set_geometry(&mut self, panel: Panel, geometry: Option<PanelGeometry>) {
        self.panel_geometry[slot(panel)] = geometry;
    }

    pub fn mouse_down(&mut self, col: u16, row: u16) {
        let pos = Position { x: col, y: row };
        let [timeline, compare, drawer] = self.panel_rects;
        if timeline.width > 0 && timeline.contains(pos) {
            self.focus = PanelFocus::Timeline;
        } else if drawer.width > 0 && drawer.contains(pos) {
            self.focus = PanelFocus::Annotations;
        } else if compare.contains(pos) {
            self.focus = PanelFocus::Compare;
        }

        self.drag_anchor = self.point_at(col, row);
        if let Some(anchor) = self.drag_anchor {
            highlight::on_panel_mouse_down(&self.document, &mut self.session);
            self.document.select(TextSelection::new(anchor, anchor));
        }
    }

    pub fn mouse_drag(&mut self, col: u16, row: u16) {
        if let Some(anchor) = self.drag_anchor {
            let focus = self.point_at(col, row).unwrap_or_else(TextPoint::outside);
            self.document.select(TextSelection::new(anchor, focus));
        }
    }

    pub fn mouse_up(&mut self, col: u16, row: u16) {
        if self.drag_anchor.take().is_none() {
            return;
        }
        self.mouse_drag_to_end(col, row);
        match highlight::on_selection_end(&mut self.document, &mut self.session) {
            SelectionOutcome::Created { panel, .. } => {
                self.status = Some(format!(
                    "highlight added in {} panel; press i to annotate",
                    panel.as_str()
                ));
            }
            SelectionOutcome::Ignored(reason) => {
                tracing::debug!(?reason, "selection ignored");
                self.document.clear_live_selection();
            }
        }
    }

    fn mouse_drag_to_end(&mut self, col: u16, row: u16) {
        if let Some(selection) = self.document.live_selection() {
            let focus = self.point_at(col, row).unwrap_or_else(TextPoint::outside);
            self.document.select(TextSelection::new(selection.anchor, focus));
        }
    }

    pub fn discard_highlight(&mut self) {
        if highlight::discard_pending(&mut self.document, &mut self.session) {
            self.status = Some("highlight unlinked".to_owned());
        }
    }

    // -----------------------------------------------------------------------
    // Preferences
    // -----------------------------------------------------------------------

    pub fn cycle_view_mode(&mut self) {
        self.view_mode = self.view_mode.next();
        loader::save_preference(self.api.connection(), PREF_VIEW_MODE, self.view_mode.as_str());
    }

    pub fn toggle_drawer(&mut self) {
        let open = !self.session.annotations_open();
        self.session.set_annotations_open(open);
        let value = if open { "true" } else { "false" };
        loader::save_preference(self.api.connection(), PREF_ANNOTATIONS_OPEN, value);
    }

    // -----------------------------------------------------------------------
    // Scrolling
    // -----------------------------------------------------------------------

    pub fn scroll_down(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Timeline => self.timeline_state.scroll_down_by(lines),
            PanelFocus::Compare => {
                self.compare_scroll = self.compare_scroll.saturating_add(usize::from(lines));
            }
            PanelFocus::Annotations => {
                self.annotation_cursor = self.annotation_cursor.saturating_add(usize::from(lines));
                self.clamp_annotation_cursor();
            }
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Timeline => self.timeline_state.scroll_up_by(lines),
            PanelFocus::Compare => {
                self.compare_scroll = self.compare_scroll.saturating_sub(usize::from(lines));
            }
            PanelFocus::Annotations => {
                self.annotation_cursor = self.annotation_cursor.saturating_sub(usize::from(lines));
            }
        }
    }

    pub fn scroll_top(&mut self) {
        match self.focus {
            PanelFocus::Timeline => self.timeline_state.select_first(),
            PanelFocus::Compare => self.compare_scroll = 0,
            PanelFocus::Annotations => self.annotation_cursor = 0,
        }
    }

    pub fn scroll_bottom(&mut self) {
        match self.focus {
            PanelFocus::Timeline => self.timeline_state.select_last(),
            // Clamped by the renderer.
            PanelFocus::Compare => self.compare_scroll = usize::MAX,
            PanelFocus::Annotations => {
                self.annotation_cursor = usize::MAX;
                self.clamp_annotation_cursor();
            }
        }
    }

    pub fn half_page_down(&mut self) {
        self.scroll_down((self.viewport_height() / 2).max(1));
    }

    pub fn half_page_up(&mut self) {
        self.scroll_up((self.viewport_height() / 2).max(1));
    }

    pub fn full_page_down(&mut self) {
        self.scroll_down(self.viewport_height().max(1));
    }

    pub fn full_page_up(&mut self) {
        self.scroll_up(self.viewport_height().max(1));
    }

    fn viewport_height(&self) -> u16 {
        match self.focus {
            PanelFocus::Timeline => self.timeline_viewport_height,
            PanelFocus::Compare => self.compare_viewport_height,
            PanelFocus::Annotations => 2,
        }
    }
}
