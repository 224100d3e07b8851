use crate::types::{AnnotationId, ChangeId, MaterialId};

/// Errors surfaced by the store, the history ordering, and the highlight adapter.
///
/// The UI never sees these as panics: every caller either logs them or turns
/// them into a status notice.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("change {0} not found")]
    ChangeNotFound(ChangeId),

    #[error("annotation {0} not found")]
    AnnotationNotFound(AnnotationId),

    #[error("history of material {material_id} is broken: {reason}")]
    BrokenHistory {
        material_id: MaterialId,
        reason: String,
    },

    #[error("highlight blob is invalid: {0}")]
    InvalidBlob(String),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
