//! Range serialization adapter.
//!
//! [`RangeAdapter`] is the only interface the rest of the core uses to create,
//! save, restore, and remove highlight markers. [`Document`] implements it over
//! the off-screen panel model; a DOM-backed front end would implement the same
//! trait over real ranges.
//!
//! # Blob format
//!
//! ```json
//! {"type":"TextRange","highlights":[
//!   {"id":"…","root":"prev","start":12,"end":23,"class":"highlight-unselected","text":"late policy"}
//! ]}
//! ```
//!
//! Entries are ordered by root (`prev` first) and then by the order markers
//! were applied, so serializing an unchanged document twice yields identical
//! strings. `text` is the covered content at save time and is checked again on
//! restore so that a highlight never lands on drifted content.

use serde::{Deserialize, Serialize};

use crate::document::{Document, Marker, MarkerState, TextSelection};
use crate::error::{CoreError, Result};
use crate::types::{HighlightId, Panel};

const BLOB_TYPE: &str = "TextRange";

/// Highlight operations the core needs from a range/selection library.
pub trait RangeAdapter {
    /// Wraps a non-empty selection inside a single panel root with a freshly
    /// named marker. Returns `None` (and changes nothing) for empty, collapsed,
    /// cross-root, or out-of-panel selections.
    fn create_highlight(&mut self, selection: &TextSelection) -> Option<HighlightId>;

    /// Encodes every marker currently applied anywhere in the document.
    fn serialize_all(&self) -> Result<String>;

    /// Filters `all_serialized` down to the entries whose markers currently
    /// live under `root`, preserving their order.
    fn serialize_subtree(&self, root: Panel, all_serialized: &str) -> Result<String>;

    /// Re-applies serialized highlights to the roots recorded in the blob.
    /// Markers whose id is already present are skipped. Returns the number of
    /// markers applied.
    fn deserialize(&mut self, blob: &str) -> Result<usize>;

    /// Re-applies serialized highlights to `root`, ignoring the root each
    /// entry was saved from.
    fn deserialize_into(&mut self, root: Panel, blob: &str) -> Result<usize>;

    /// Unwraps one marker. Returns `false` if no marker has that id.
    fn remove_highlight(&mut self, id: &str) -> bool;

    /// Unwraps every marker in the document.
    fn remove_all(&mut self);

    /// Flips a marker between selected and unselected. Returns `false` if no
    /// marker has that id.
    fn toggle_selected_state(&mut self, id: &str) -> bool;

    fn has_marker(&self, id: &str) -> bool;

    /// The panel root whose subtree contains the marker.
    fn marker_root(&self, id: &str) -> Option<Panel>;

    fn marker_state(&self, id: &str) -> Option<MarkerState>;

    /// The user's current native selection, if any.
    fn live_selection(&self) -> Option<TextSelection>;

    fn clear_live_selection(&mut self);
}

#[derive(Debug, Serialize, Deserialize)]
struct Blob {
    #[serde(rename = "type")]
    kind: String,
    highlights: Vec<BlobEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlobEntry {
    id: HighlightId,
    root: Panel,
    start: usize,
    end: usize,
    class: MarkerState,
    text: String,
}

fn parse_blob(raw: &str) -> Result<Blob> {
    if raw.trim().is_empty() {
        return Ok(Blob {
            kind: BLOB_TYPE.to_owned(),
            highlights: Vec::new(),
        });
    }
    let blob: Blob =
        serde_json::from_str(raw).map_err(|e| CoreError::InvalidBlob(e.to_string()))?;
    if blob.kind != BLOB_TYPE {
        return Err(CoreError::InvalidBlob(format!(
            "unsupported highlight type {:?}",
            blob.kind
        )));
    }
    Ok(blob)
}

fn encode_blob(highlights: Vec<BlobEntry>) -> Result<String> {
    Ok(serde_json::to_string(&Blob {
        kind: BLOB_TYPE.to_owned(),
        highlights,
    })?)
}

impl Document {
    fn apply_entries(&mut self, entries: Vec<BlobEntry>, root_override: Option<Panel>) -> usize {
        let mut applied = 0;
        for entry in entries {
            if self.has_marker(&entry.id) {
                continue;
            }
            let root = root_override.unwrap_or(entry.root);
            let Some(content) = self.content(root) else {
                tracing::debug!(id = %entry.id, root = root.as_str(), "highlight root not mounted");
                continue;
            };
            if entry.start >= entry.end || entry.end > content.char_len {
                tracing::warn!(id = %entry.id, start = entry.start, end = entry.end,
                    "highlight range outside rendered content; skipped");
                continue;
            }
            if self.excerpt(root, entry.start, entry.end) != entry.text {
                tracing::warn!(id = %entry.id, root = root.as_str(),
                    "highlighted text no longer matches content; skipped");
                continue;
            }
            if let Some(content) = self.content_mut(root) {
                content.markers.push(Marker {
                    id: entry.id,
                    start: entry.start,
                    end: entry.end,
                    state: entry.class,
                });
                applied += 1;
            }
        }
        applied
    }
}

impl RangeAdapter for Document {
    fn create_highlight(&mut self, selection: &TextSelection) -> Option<HighlightId> {
        let root = selection.root()?;
        let content = self.content_mut(root)?;
        let (start, end) = selection.range();
        let (start, end) = (start.min(content.char_len), end.min(content.char_len));
        if start == end {
            return None;
        }
        let id = uuid::Uuid::new_v4().to_string();
        content.markers.push(Marker {
            id: id.clone(),
            start,
            end,
            state: MarkerState::Selected,
        });
        tracing::debug!(%id, root = root.as_str(), start, end, "highlight created");
        Some(id)
    }

    fn serialize_all(&self) -> Result<String> {
        let mut entries = Vec::new();
        for root in Panel::BOTH {
            for m in self.markers(root) {
                entries.push(BlobEntry {
                    id: m.id.clone(),
                    root,
                    start: m.start,
                    end: m.end,
                    class: m.state,
                    text: self.excerpt(root, m.start, m.end),
                });
            }
        }
        encode_blob(entries)
    }

    fn serialize_subtree(&self, root: Panel, all_serialized: &str) -> Result<String> {
        let blob = parse_blob(all_serialized)?;
        let kept = blob
            .highlights
            .into_iter()
            .filter(|e| self.marker_root(&e.id) == Some(root))
            .collect();
        encode_blob(kept)
    }

    fn deserialize(&mut self, blob: &str) -> Result<usize> {
        let blob = parse_blob(blob)?;
        Ok(self.apply_entries(blob.highlights, None))
    }

    fn deserialize_into(&mut self, root: Panel, blob: &str) -> Result<usize> {
        let blob = parse_blob(blob)?;
        Ok(self.apply_entries(blob.highlights, Some(root)))
    }

    fn remove_highlight(&mut self, id: &str) -> bool {
        let Some((root, _)) = self.find_marker(id) else {
            return false;
        };
        if let Some(content) = self.content_mut(root) {
            content.markers.retain(|m| m.id != id);
        }
        true
    }

    fn remove_all(&mut self) {
        for root in Panel::BOTH {
            if let Some(content) = self.content_mut(root) {
                content.markers.clear();
            }
        }
    }

    fn toggle_selected_state(&mut self, id: &str) -> bool {
        let Some((root, _)) = self.find_marker(id) else {
            return false;
        };
        let Some(content) = self.content_mut(root) else {
            return false;
        };
        for m in content.markers.iter_mut().filter(|m| m.id == id) {
            m.state = m.state.flipped();
        }
        true
    }

    fn has_marker(&self, id: &str) -> bool {
        self.find_marker(id).is_some()
    }

    fn marker_root(&self, id: &str) -> Option<Panel> {
        self.find_marker(id).map(|(root, _)| root)
    }

    fn marker_state(&self, id: &str) -> Option<MarkerState> {
        self.find_marker(id).map(|(_, m)| m.state)
    }

    fn live_selection(&self) -> Option<TextSelection> {
        self.selection
    }

    fn clear_live_selection(&mut self) {
        self.selection = None;
    }
}
