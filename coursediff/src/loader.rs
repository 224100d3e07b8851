//! Background reads for the front end.
//!
//! Each request runs as its own tokio task against the shared [`ReviewApi`]
//! and reports back through the event channel as a [`DataEvent`]. The main
//! loop is the only place results are applied to `AppState`.

use std::sync::Arc;

use coursediff_core::api::ReviewApi;
use coursediff_core::error::CoreError;
use coursediff_core::session::SessionKey;
use coursediff_core::types::{Annotation, Change, MaterialId};
use tokio::sync::mpsc::UnboundedSender;
use tokio_rusqlite::Connection;

use crate::event::AppEvent;

#[derive(Debug)]
pub enum DataEvent {
    RecentChanges(Result<Vec<Change>, CoreError>),
    History {
        material_id: MaterialId,
        result: Result<Vec<Change>, CoreError>,
    },
    Annotations {
        key: SessionKey,
        generation: u64,
        result: Result<Vec<Annotation>, CoreError>,
    },
}

pub fn spawn_recent<A: ReviewApi>(api: &Arc<A>, tx: &UnboundedSender<AppEvent>) {
    let api = Arc::clone(api);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = api.fetch_recent_changes().await;
        let _ = tx.send(DataEvent::RecentChanges(result).into());
    });
}

pub fn spawn_history<A: ReviewApi>(
    api: &Arc<A>,
    material_id: MaterialId,
    tx: &UnboundedSender<AppEvent>,
) {
    let api = Arc::clone(api);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = api.fetch_changes_for_material(material_id).await;
        let _ = tx.send(DataEvent::History { material_id, result }.into());
    });
}

pub fn spawn_annotations<A: ReviewApi>(
    api: &Arc<A>,
    key: SessionKey,
    generation: u64,
    tx: &UnboundedSender<AppEvent>,
) {
    let api = Arc::clone(api);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = api.fetch_annotations(key.change_id).await;
        let _ = tx.send(
            DataEvent::Annotations {
                key,
                generation,
                result,
            }
            .into(),
        );
    });
}

/// Writes one UI preference without blocking the loop. Failures are logged
/// and otherwise ignored.
pub fn save_preference(conn: &Connection, key: &'static str, value: &'static str) {
    let conn = conn.clone();
    tokio::spawn(async move {
        if let Err(e) = coursediff_core::db::save_preference(&conn, key, value).await {
            tracing::warn!(key, error = %e, "preference not saved");
        }
    });
}
