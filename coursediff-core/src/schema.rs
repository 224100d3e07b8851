/// DDL to create the schema_version tracking table.
///
/// Applied unconditionally on every DB open (before checking the version),
/// using `IF NOT EXISTS` so it is safe to run multiple times.
pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// DDL for the full v1 schema.
///
/// - `users`: course staff who write annotations.
/// - `changes`: one row per detected change; `supersedes` links each row to
///   the previous version of the same material.
/// - `annotations`: threaded comments. `parent_id` cascades so deleting an
///   annotation removes its whole reply subtree.
/// - `preferences`: key/value UI preferences (view mode, drawer state).
///
/// All tables use `STRICT` mode for type enforcement.
pub const SCHEMA_V1_SQL: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id    TEXT PRIMARY KEY,
        name  TEXT NOT NULL,
        role  TEXT NOT NULL CHECK(role IN ('TA', 'Teacher'))
    ) STRICT;

    CREATE TABLE IF NOT EXISTS changes (
        id            INTEGER PRIMARY KEY,
        material_id   INTEGER NOT NULL,
        supersedes    INTEGER REFERENCES changes(id),
        change_kind   TEXT    NOT NULL CHECK(change_kind IN ('CREATE', 'UPDATE', 'DELETE')),
        material_kind TEXT    NOT NULL
                              CHECK(material_kind IN
                                    ('Sections','Modules','Pages','Files','Assignments','Quizzes')),
        timestamp     INTEGER NOT NULL,
        payload       TEXT    NOT NULL,
        highlights    TEXT
    ) STRICT;

    CREATE INDEX IF NOT EXISTS changes_by_material ON changes(material_id, timestamp);

    CREATE TABLE IF NOT EXISTS annotations (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        change_id    INTEGER NOT NULL REFERENCES changes(id) ON DELETE CASCADE,
        author_id    TEXT    NOT NULL REFERENCES users(id),
        body         TEXT    NOT NULL,
        parent_id    INTEGER REFERENCES annotations(id) ON DELETE CASCADE,
        timestamp    INTEGER NOT NULL,
        selection_id TEXT
    ) STRICT;

    CREATE INDEX IF NOT EXISTS annotations_by_change ON annotations(change_id);

    CREATE TABLE IF NOT EXISTS preferences (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    ) STRICT;
";

/// Runs forward-only schema migration to migrate the DB to the latest version.
///
/// Idempotent: safe to call on every startup.
///
/// # Errors
///
/// Returns `rusqlite::Error` if the DDL fails or the version row cannot be read.
pub fn migrate(db: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    db.execute_batch(SCHEMA_VERSION_DDL)?;

    let version: i64 = db
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if version < 1 {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA_V1_SQL)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
        tx.commit()?;
    }

    Ok(())
}
