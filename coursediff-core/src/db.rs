use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::types::Type;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::error::{CoreError, Result};
use crate::types::{
    Annotation, AnnotationId, Author, Change, ChangeId, ChangeKind, MaterialId, MaterialKind,
    NewAnnotation, NewChange, UserRole,
};

/// Opens (or creates) the SQLite database at `path`, configures WAL mode,
/// and applies schema migrations via the `schema_version` table.
///
/// This function is the single entry point for all database connections.
/// `busy_timeout` is set via the `Connection` method rather than a PRAGMA
/// string so it takes effect regardless of pragma caching. `foreign_keys=ON`
/// is required for annotation reply subtrees to cascade on delete.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the file cannot be opened, WAL configuration
/// fails, or schema DDL fails.
pub async fn open_db(path: &str) -> Result<Connection, tokio_rusqlite::Error> {
    let conn = Connection::open(path).await?;

    conn.call(|db| {
        db.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        db.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    })
    .await?;

    // Fold any WAL left behind by a previous run back into the main file.
    conn.call(|db| {
        db.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .await?;

    conn.call(|db| {
        crate::schema::migrate(db)?;
        Ok(())
    })
    .await?;

    tracing::info!(path, "database opened");
    Ok(conn)
}

/// Returns the current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn bad_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

const CHANGE_COLUMNS: &str =
    "id, material_id, supersedes, change_kind, material_kind, timestamp, payload, highlights";

fn change_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Change> {
    let kind: String = r.get(3)?;
    let material_kind: String = r.get(4)?;
    let payload: String = r.get(6)?;
    Ok(Change {
        id: r.get(0)?,
        material_id: r.get(1)?,
        supersedes: r.get(2)?,
        kind: ChangeKind::parse(&kind)
            .ok_or_else(|| bad_column(3, format!("unknown change kind {kind:?}")))?,
        material_kind: MaterialKind::parse(&material_kind)
            .ok_or_else(|| bad_column(4, format!("unknown material kind {material_kind:?}")))?,
        timestamp: r.get(5)?,
        payload: serde_json::from_str(&payload).map_err(|e| bad_column(6, e.to_string()))?,
        highlights: r.get(7)?,
    })
}

const ANNOTATION_SELECT: &str = "
    SELECT a.id, a.change_id, a.author_id, u.name, u.role,
           a.body, a.parent_id, a.timestamp, a.selection_id
    FROM annotations a JOIN users u ON u.id = a.author_id";

fn annotation_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Annotation> {
    let role: String = r.get(4)?;
    Ok(Annotation {
        id: r.get(0)?,
        change_id: r.get(1)?,
        author: Author {
            id: r.get(2)?,
            name: r.get(3)?,
            role: UserRole::parse(&role)
                .ok_or_else(|| bad_column(4, format!("unknown role {role:?}")))?,
        },
        body: r.get(5)?,
        parent_id: r.get(6)?,
        timestamp: r.get(7)?,
        selection_id: r.get(8)?,
    })
}

/// Inserts `author` or refreshes its name and role.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the upsert transaction fails.
pub async fn upsert_user(conn: &Connection, author: &Author) -> Result<(), tokio_rusqlite::Error> {
    let author = author.clone();
    conn.call(move |db| {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO users (id, name, role) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, role = excluded.role",
            rusqlite::params![&author.id, &author.name, author.role.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    })
    .await
}

/// Records a detected change and returns its id.
///
/// This is the change detector's write path; the review core never calls it.
///
/// # Errors
///
/// Returns `CoreError::Db` if the insert fails (for example a `supersedes`
/// reference to a missing change).
pub async fn insert_change(conn: &Connection, change: NewChange) -> Result<ChangeId> {
    let payload = serde_json::to_string(&change.payload)?;
    let id = conn
        .call(move |db| -> rusqlite::Result<ChangeId> {
            let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO changes
                     (material_id, supersedes, change_kind, material_kind, timestamp, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    change.material_id,
                    change.supersedes,
                    change.kind.as_str(),
                    change.material_kind.as_str(),
                    change.timestamp,
                    &payload,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })
        .await?;
    Ok(id)
}

/// Loads one change by id.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query fails.
pub async fn load_change(
    conn: &Connection,
    change_id: ChangeId,
) -> Result<Option<Change>, tokio_rusqlite::Error> {
    conn.call(move |db| {
        let change = db
            .query_row(
                &format!("SELECT {CHANGE_COLUMNS} FROM changes WHERE id = ?1"),
                rusqlite::params![change_id],
                change_from_row,
            )
            .optional()?;
        Ok(change)
    })
    .await
}

/// Loads every change of `material_id`, oldest timestamp first.
///
/// Callers that need the `supersedes` order pass the result through
/// [`crate::history::order_by_supersedes`].
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query fails.
pub async fn load_changes_for_material(
    conn: &Connection,
    material_id: MaterialId,
) -> Result<Vec<Change>, tokio_rusqlite::Error> {
    conn.call(move |db| {
        let mut stmt = db.prepare(&format!(
            "SELECT {CHANGE_COLUMNS} FROM changes WHERE material_id = ?1
             ORDER BY timestamp ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![material_id], change_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}

/// Loads the `limit` most recent changes across all materials, newest first.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query fails.
pub async fn load_recent_changes(
    conn: &Connection,
    limit: usize,
) -> Result<Vec<Change>, tokio_rusqlite::Error> {
    conn.call(move |db| {
        let mut stmt = db.prepare(&format!(
            "SELECT {CHANGE_COLUMNS} FROM changes ORDER BY timestamp DESC, id DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![limit as i64], change_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}

/// Loads all annotations attached to `change_id`, in insertion order.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query fails.
pub async fn load_annotations(
    conn: &Connection,
    change_id: ChangeId,
) -> Result<Vec<Annotation>, tokio_rusqlite::Error> {
    conn.call(move |db| {
        let mut stmt = db.prepare(&format!(
            "{ANNOTATION_SELECT} WHERE a.change_id = ?1 ORDER BY a.id"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![change_id], annotation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}

/// Inserts an annotation and returns it as stored.
///
/// The body is trimmed. The change and author must exist, and a parent, when
/// given, must be an annotation on the same change.
///
/// # Errors
///
/// Returns `CoreError::Validation` for an empty body, unknown author, or bad
/// parent; `CoreError::ChangeNotFound` for an unknown change; `CoreError::Db`
/// if the insert fails.
pub async fn insert_annotation(conn: &Connection, new: NewAnnotation) -> Result<Annotation> {
    let body = new.body.trim().to_owned();
    if body.is_empty() {
        return Err(CoreError::Validation("annotation body is empty".to_owned()));
    }

    conn.call(move |db| -> rusqlite::Result<Result<Annotation>> {
        let change_exists: bool = db
            .query_row(
                "SELECT 1 FROM changes WHERE id = ?1",
                rusqlite::params![new.change_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !change_exists {
            return Ok(Err(CoreError::ChangeNotFound(new.change_id)));
        }

        let author_exists: bool = db
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                rusqlite::params![&new.author_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !author_exists {
            return Ok(Err(CoreError::Validation(format!(
                "unknown author {:?}",
                new.author_id
            ))));
        }

        if let Some(parent_id) = new.parent_id {
            let parent_change: Option<ChangeId> = db
                .query_row(
                    "SELECT change_id FROM annotations WHERE id = ?1",
                    rusqlite::params![parent_id],
                    |r| r.get(0),
                )
                .optional()?;
            match parent_change {
                None => {
                    return Ok(Err(CoreError::Validation(format!(
                        "parent annotation {parent_id} does not exist"
                    ))))
                }
                Some(c) if c != new.change_id => {
                    return Ok(Err(CoreError::Validation(format!(
                        "parent annotation {parent_id} belongs to change {c}"
                    ))))
                }
                Some(_) => {}
            }
        }

        let now = now_millis();
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO annotations (change_id, author_id, body, parent_id, timestamp, selection_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                new.change_id,
                &new.author_id,
                &body,
                new.parent_id,
                now,
                &new.selection_id,
            ],
        )?;
        let id = tx.last_insert_rowid();
        let annotation = tx.query_row(
            &format!("{ANNOTATION_SELECT} WHERE a.id = ?1"),
            rusqlite::params![id],
            annotation_from_row,
        )?;
        tx.commit()?;
        Ok(Ok(annotation))
    })
    .await?
}

/// Deletes an annotation together with its whole reply subtree.
///
/// Returns the deleted ids, the requested annotation first.
///
/// # Errors
///
/// Returns `CoreError::AnnotationNotFound` if `annotation_id` does not exist,
/// `CoreError::Db` if the transaction fails.
pub async fn delete_annotation_cascade(
    conn: &Connection,
    annotation_id: AnnotationId,
) -> Result<Vec<AnnotationId>> {
    let deleted = conn
        .call(move |db| -> rusqlite::Result<Vec<AnnotationId>> {
            let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            let ids = {
                let mut stmt = tx.prepare(
                    "WITH RECURSIVE subtree(id, depth) AS (
                         SELECT id, 0 FROM annotations WHERE id = ?1
                         UNION
                         SELECT a.id, s.depth + 1 FROM annotations a
                         JOIN subtree s ON a.parent_id = s.id
                     )
                     SELECT id FROM subtree ORDER BY depth, id",
                )?;
                let ids = stmt
                    .query_map(rusqlite::params![annotation_id], |r| r.get::<_, i64>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };
            // ON DELETE CASCADE on parent_id removes the rest of the subtree.
            tx.execute(
                "DELETE FROM annotations WHERE id = ?1",
                rusqlite::params![annotation_id],
            )?;
            tx.commit()?;
            Ok(ids)
        })
        .await?;

    if deleted.is_empty() {
        return Err(CoreError::AnnotationNotFound(annotation_id));
    }
    tracing::info!(annotation_id, removed = deleted.len(), "annotation subtree deleted");
    Ok(deleted)
}

/// Replaces the stored highlight blob of `change_id`.
///
/// # Errors
///
/// Returns `CoreError::ChangeNotFound` if no such change exists,
/// `CoreError::Db` if the update fails.
pub async fn save_highlights(conn: &Connection, change_id: ChangeId, blob: &str) -> Result<()> {
    let blob = blob.to_owned();
    let updated = conn
        .call(move |db| -> rusqlite::Result<usize> {
            let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            let n = tx.execute(
                "UPDATE changes SET highlights = ?1 WHERE id = ?2",
                rusqlite::params![&blob, change_id],
            )?;
            tx.commit()?;
            Ok(n)
        })
        .await?;
    if updated == 0 {
        return Err(CoreError::ChangeNotFound(change_id));
    }
    Ok(())
}

/// Reads one UI preference.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query fails.
pub async fn load_preference(
    conn: &Connection,
    key: &str,
) -> Result<Option<String>, tokio_rusqlite::Error> {
    let key = key.to_owned();
    conn.call(move |db| {
        let value = db
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                rusqlite::params![&key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    })
    .await
}

/// Writes one UI preference (upsert).
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the upsert transaction fails.
pub async fn save_preference(
    conn: &Connection,
    key: &str,
    value: &str,
) -> Result<(), tokio_rusqlite::Error> {
    let key = key.to_owned();
    let value = value.to_owned();
    conn.call(move |db| {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![&key, &value],
        )?;
        tx.commit()?;
        Ok(())
    })
    .await
}
