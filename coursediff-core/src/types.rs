use serde::{Deserialize, Serialize};

/// Row id of a recorded change.
pub type ChangeId = i64;
/// Row id of an annotation.
pub type AnnotationId = i64;
/// Id of the course-material item a change belongs to.
pub type MaterialId = i64;
/// Stable identifier of a highlight (UUID v4 text).
pub type HighlightId = String;

/// What happened to the material in a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Create => "CREATE",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(ChangeKind::Create),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// The fixed set of course-material kinds tracked by the change detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    Sections,
    Modules,
    Pages,
    Files,
    Assignments,
    Quizzes,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 6] = [
        MaterialKind::Sections,
        MaterialKind::Modules,
        MaterialKind::Pages,
        MaterialKind::Files,
        MaterialKind::Assignments,
        MaterialKind::Quizzes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MaterialKind::Sections => "Sections",
            MaterialKind::Modules => "Modules",
            MaterialKind::Pages => "Pages",
            MaterialKind::Files => "Files",
            MaterialKind::Assignments => "Assignments",
            MaterialKind::Quizzes => "Quizzes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// One recorded version of a course-material item.
///
/// `supersedes` points at the previous version of the same material and is
/// `None` only for the first recorded version. `highlights` is the adapter's
/// opaque blob and the only field this crate ever writes back.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub id: ChangeId,
    pub material_id: MaterialId,
    pub supersedes: Option<ChangeId>,
    pub kind: ChangeKind,
    pub material_kind: MaterialKind,
    pub timestamp: i64, // Unix timestamp millis
    pub payload: serde_json::Value,
    pub highlights: Option<String>,
}

/// Payload keys rendered as the heading line of a panel, in priority order.
const TITLE_KEYS: [&str; 3] = ["title", "name", "display_name"];
/// Payload keys rendered as the body of a panel, in priority order.
const BODY_KEYS: [&str; 5] = ["body", "description", "message", "content", "text"];

impl Change {
    /// Renders the material payload to the plain text shown in a compare panel.
    ///
    /// Objects with recognised title/body keys render as a heading line, a blank
    /// line, and the body; every remaining field follows as a `key: value`
    /// line, nested arrays and objects pretty-printed so edits inside them
    /// stay visible. Anything else falls back to pretty-printed JSON.
    pub fn content_text(&self) -> String {
        let Some(obj) = self.payload.as_object() else {
            return match &self.payload {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => serde_json::to_string_pretty(other).unwrap_or_default(),
            };
        };

        let title = TITLE_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_str()));
        let body_key = BODY_KEYS.iter().find(|k| obj.get(**k).is_some_and(|v| v.is_string()));

        if title.is_none() && body_key.is_none() {
            return serde_json::to_string_pretty(&self.payload).unwrap_or_default();
        }

        let mut out = String::new();
        if let Some(title) = title {
            out.push_str(title);
            out.push_str("\n\n");
        }
        if let Some(body) = body_key.and_then(|k| obj.get(*k)).and_then(|v| v.as_str()) {
            out.push_str(body);
            out.push('\n');
        }
        for (key, value) in obj {
            if TITLE_KEYS.contains(&key.as_str()) || Some(&key.as_str()) == body_key {
                continue;
            }
            let rendered = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                nested => serde_json::to_string_pretty(nested).unwrap_or_default(),
            };
            out.push_str(&format!("\n{key}: {rendered}"));
        }
        out
    }
}

/// Role of a staff member inside a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "TA")]
    Ta,
    Teacher,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Ta => "TA",
            UserRole::Teacher => "Teacher",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TA" => Some(UserRole::Ta),
            "Teacher" => Some(UserRole::Teacher),
            _ => None,
        }
    }
}

/// The staff member who wrote an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub role: UserRole,
}

/// A threaded comment on a change, optionally anchored to a highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub change_id: ChangeId,
    pub author: Author,
    pub body: String,
    pub parent_id: Option<AnnotationId>,
    pub timestamp: i64, // Unix timestamp millis
    pub selection_id: Option<HighlightId>,
}

/// Input for the "create annotation" write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnnotation {
    pub change_id: ChangeId,
    pub author_id: String,
    pub body: String,
    pub parent_id: Option<AnnotationId>,
    pub selection_id: Option<HighlightId>,
}

/// Input for the "persist highlights for this change" write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightUpdate {
    pub change_id: ChangeId,
    pub blob: String,
}

/// One of the two compare panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Panel {
    #[serde(rename = "prev")]
    Previous,
    #[serde(rename = "current")]
    Current,
}

impl Panel {
    pub const BOTH: [Panel; 2] = [Panel::Previous, Panel::Current];

    pub fn as_str(self) -> &'static str {
        match self {
            Panel::Previous => "prev",
            Panel::Current => "current",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Panel::Previous => 0,
            Panel::Current => 1,
        }
    }
}

/// Input for recording a detected change (written by the change detector).
#[derive(Debug, Clone, PartialEq)]
pub struct NewChange {
    pub material_id: MaterialId,
    pub supersedes: Option<ChangeId>,
    pub kind: ChangeKind,
    pub material_kind: MaterialKind,
    pub timestamp: i64,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiz(payload: serde_json::Value) -> Change {
        Change {
            id: 1,
            material_id: 900,
            supersedes: None,
            kind: ChangeKind::Update,
            material_kind: MaterialKind::Quizzes,
            timestamp: 0,
            payload,
            highlights: None,
        }
    }

    #[test]
    fn nested_fields_are_rendered() {
        let before = quiz(json!({
            "name": "Quiz 1",
            "questions": [{"prompt": "2 + 2?", "answer": "4"}],
            "settings": {"attempts": 1},
        }));
        let after = quiz(json!({
            "name": "Quiz 1",
            "questions": [{"prompt": "2 + 2?", "answer": "four"}],
            "settings": {"attempts": 3},
        }));

        let text = after.content_text();
        assert!(text.starts_with("Quiz 1\n\n"));
        assert!(text.contains("\"answer\": \"four\""));
        assert!(text.contains("\"attempts\": 3"));
        assert_ne!(before.content_text(), text);
    }

    #[test]
    fn null_fields_are_skipped() {
        let change = quiz(json!({"name": "Quiz 2", "due": null, "points": 5}));
        assert_eq!(change.content_text(), "Quiz 2\n\n\npoints: 5");
    }
}
