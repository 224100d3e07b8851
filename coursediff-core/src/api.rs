//! Data access operations the review core consumes.
//!
//! The coordinator and the front end depend only on [`ReviewApi`]; the local
//! SQLite store is one implementation, test doubles are another. Every method
//! returns a `Send` future so calls can be driven from spawned tasks.

use std::future::Future;

use tokio_rusqlite::Connection;

use crate::db;
use crate::error::Result;
use crate::history::order_by_supersedes;
use crate::types::{
    Annotation, AnnotationId, Change, ChangeId, HighlightUpdate, MaterialId, NewAnnotation,
};

pub trait ReviewApi: Send + Sync + 'static {
    fn fetch_annotations(
        &self,
        change_id: ChangeId,
    ) -> impl Future<Output = Result<Vec<Annotation>>> + Send;

    fn create_annotation(
        &self,
        new: NewAnnotation,
    ) -> impl Future<Output = Result<Annotation>> + Send;

    /// Deletes an annotation and its replies; returns every deleted id.
    fn delete_annotation(
        &self,
        annotation_id: AnnotationId,
    ) -> impl Future<Output = Result<Vec<AnnotationId>>> + Send;

    fn persist_highlights(&self, update: HighlightUpdate) -> impl Future<Output = Result<()>> + Send;

    /// Changes of one material, oldest first along the `supersedes` chain.
    fn fetch_changes_for_material(
        &self,
        material_id: MaterialId,
    ) -> impl Future<Output = Result<Vec<Change>>> + Send;

    /// Most recent changes across all materials, newest first.
    fn fetch_recent_changes(&self) -> impl Future<Output = Result<Vec<Change>>> + Send;
}

/// [`ReviewApi`] backed by the local SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
    recent_limit: usize,
}

impl SqliteStore {
    pub fn new(conn: Connection, recent_limit: usize) -> Self {
        Self { conn, recent_limit }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ReviewApi for SqliteStore {
    fn fetch_annotations(
        &self,
        change_id: ChangeId,
    ) -> impl Future<Output = Result<Vec<Annotation>>> + Send {
        let conn = self.conn.clone();
        async move { Ok(db::load_annotations(&conn, change_id).await?) }
    }

    fn create_annotation(
        &self,
        new: NewAnnotation,
    ) -> impl Future<Output = Result<Annotation>> + Send {
        let conn = self.conn.clone();
        async move {
            let annotation = db::insert_annotation(&conn, new).await?;
            tracing::info!(
                annotation_id = annotation.id,
                change_id = annotation.change_id,
                parent_id = ?annotation.parent_id,
                "annotation created"
            );
            Ok(annotation)
        }
    }

    fn delete_annotation(
        &self,
        annotation_id: AnnotationId,
    ) -> impl Future<Output = Result<Vec<AnnotationId>>> + Send {
        let conn = self.conn.clone();
        async move { db::delete_annotation_cascade(&conn, annotation_id).await }
    }

    fn persist_highlights(&self, update: HighlightUpdate) -> impl Future<Output = Result<()>> + Send {
        let conn = self.conn.clone();
        async move {
            db::save_highlights(&conn, update.change_id, &update.blob).await?;
            tracing::info!(change_id = update.change_id, "highlights persisted");
            Ok(())
        }
    }

    fn fetch_changes_for_material(
        &self,
        material_id: MaterialId,
    ) -> impl Future<Output = Result<Vec<Change>>> + Send {
        let conn = self.conn.clone();
        async move {
            let changes = db::load_changes_for_material(&conn, material_id).await?;
            order_by_supersedes(material_id, changes)
        }
    }

    fn fetch_recent_changes(&self) -> impl Future<Output = Result<Vec<Change>>> + Send {
        let conn = self.conn.clone();
        let limit = self.recent_limit;
        async move { Ok(db::load_recent_changes(&conn, limit).await?) }
    }
}
