//! Ordering of a material's changes along the `supersedes` chain.
//!
//! The change detector records every version of a material as a row whose
//! `supersedes` column points at the version it replaced. A healthy history is
//! a singly linked list with exactly one root, strictly increasing timestamps,
//! and no branches or cycles.

use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::types::{Change, ChangeId, MaterialId};

/// Orders `changes` oldest-first by following `supersedes` links from the root.
///
/// All changes must belong to `material_id`. An empty input yields an empty
/// history.
///
/// # Errors
///
/// Returns [`CoreError::BrokenHistory`] when the input has no root, more than
/// one root, a branch (two changes superseding the same one), a link to a
/// change outside the set, a cycle, or a successor that is not strictly newer
/// than its predecessor.
pub fn order_by_supersedes(material_id: MaterialId, changes: Vec<Change>) -> Result<Vec<Change>> {
    if changes.is_empty() {
        return Ok(changes);
    }
    let broken = |reason: String| CoreError::BrokenHistory { material_id, reason };

    if let Some(stray) = changes.iter().find(|c| c.material_id != material_id) {
        return Err(broken(format!(
            "change {} belongs to material {}",
            stray.id, stray.material_id
        )));
    }

    let mut roots = changes.iter().filter(|c| c.supersedes.is_none());
    let root = roots
        .next()
        .ok_or_else(|| broken("no change without predecessor".to_owned()))?
        .id;
    if let Some(extra) = roots.next() {
        return Err(broken(format!("changes {root} and {} both lack a predecessor", extra.id)));
    }

    let known: HashMap<ChangeId, usize> =
        changes.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
    let mut successor: HashMap<ChangeId, ChangeId> = HashMap::with_capacity(changes.len());
    for change in &changes {
        let Some(prev) = change.supersedes else { continue };
        if !known.contains_key(&prev) {
            return Err(broken(format!(
                "change {} supersedes unknown change {prev}",
                change.id
            )));
        }
        if let Some(other) = successor.insert(prev, change.id) {
            return Err(broken(format!(
                "changes {other} and {} both supersede {prev}",
                change.id
            )));
        }
    }

    let mut order = Vec::with_capacity(changes.len());
    let mut cursor = Some(root);
    while let Some(id) = cursor {
        if order.len() == changes.len() {
            return Err(broken(format!("cycle through change {id}")));
        }
        order.push(known[&id]);
        cursor = successor.get(&id).copied();
    }
    if order.len() != changes.len() {
        return Err(broken(format!(
            "{} changes are unreachable from root {root}",
            changes.len() - order.len()
        )));
    }

    for pair in order.windows(2) {
        let (older, newer) = (&changes[pair[0]], &changes[pair[1]]);
        if newer.timestamp <= older.timestamp {
            return Err(broken(format!(
                "change {} is not newer than the change {} it supersedes",
                newer.id, older.id
            )));
        }
    }

    let mut slots: Vec<Option<Change>> = changes.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
