//! Builds the ordered, depth-annotated reply tree for one change.

use std::collections::{HashMap, HashSet};

use crate::types::{Annotation, AnnotationId};

/// An annotation placed in the rendered thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadEntry {
    pub annotation: Annotation,
    /// 0 for top-level annotations, parent depth + 1 otherwise.
    pub depth: usize,
}

/// An annotation whose parent link could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenLink {
    pub annotation_id: AnnotationId,
    pub parent_id: AnnotationId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thread {
    pub entries: Vec<ThreadEntry>,
    pub broken_links: Vec<BrokenLink>,
}

impl Thread {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, id: AnnotationId) -> Option<&ThreadEntry> {
        self.entries.iter().find(|e| e.annotation.id == id)
    }
}

/// Orders a flat set of annotations into a depth-first reply tree.
///
/// Parents precede their children, siblings are sorted by `(timestamp, id)`,
/// and every input annotation appears exactly once. Annotations whose parent
/// is missing from the set, points at itself, or sits on a parent cycle are
/// rendered top-level and reported in [`Thread::broken_links`].
pub fn build_thread(annotations: &[Annotation]) -> Thread {
    let known: HashSet<AnnotationId> = annotations.iter().map(|a| a.id).collect();

    let mut roots: Vec<usize> = Vec::new();
    let mut children: HashMap<AnnotationId, Vec<usize>> = HashMap::new();
    let mut broken_links = Vec::new();

    for (idx, a) in annotations.iter().enumerate() {
        match a.parent_id {
            None => roots.push(idx),
            Some(parent) if parent != a.id && known.contains(&parent) => {
                children.entry(parent).or_default().push(idx);
            }
            Some(parent) => {
                roots.push(idx);
                broken_links.push(BrokenLink {
                    annotation_id: a.id,
                    parent_id: parent,
                });
            }
        }
    }

    let order = |v: &mut Vec<usize>| {
        v.sort_by_key(|&i| (annotations[i].timestamp, annotations[i].id));
    };
    order(&mut roots);
    for group in children.values_mut() {
        order(group);
    }

    let mut visited = vec![false; annotations.len()];
    let mut entries = Vec::with_capacity(annotations.len());
    for &root in &roots {
        flatten(root, annotations, &children, &mut visited, &mut entries);
    }

    // Whatever is left hangs off a parent cycle and was never reached.
    if entries.len() < annotations.len() {
        let mut stranded: Vec<usize> = (0..annotations.len()).filter(|&i| !visited[i]).collect();
        order(&mut stranded);
        for idx in stranded {
            if visited[idx] {
                continue;
            }
            let a = &annotations[idx];
            if let Some(parent) = a.parent_id {
                broken_links.push(BrokenLink {
                    annotation_id: a.id,
                    parent_id: parent,
                });
            }
            flatten(idx, annotations, &children, &mut visited, &mut entries);
        }
    }

    for link in &broken_links {
        tracing::warn!(
            annotation_id = link.annotation_id,
            parent_id = link.parent_id,
            "annotation parent not resolvable; shown top-level"
        );
    }

    Thread {
        entries,
        broken_links,
    }
}

/// Depth-first, pre-order walk from `start`, iterative so deep reply chains
/// cannot exhaust the stack.
fn flatten(
    start: usize,
    annotations: &[Annotation],
    children: &HashMap<AnnotationId, Vec<usize>>,
    visited: &mut [bool],
    out: &mut Vec<ThreadEntry>,
) {
    let mut stack = vec![(start, 0usize)];
    while let Some((idx, depth)) = stack.pop() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        let a = &annotations[idx];
        out.push(ThreadEntry {
            annotation: a.clone(),
            depth,
        });
        if let Some(kids) = children.get(&a.id) {
            // Reverse so the earliest sibling is popped first.
            for &kid in kids.iter().rev() {
                if !visited[kid] {
                    stack.push((kid, depth + 1));
                }
            }
        }
    }
}

/// Ids of every annotation below `id` in the reply forest (not including `id`).
pub fn descendants(annotations: &[Annotation], id: AnnotationId) -> Vec<AnnotationId> {
    let mut found = Vec::new();
    let mut seen: HashSet<AnnotationId> = HashSet::from([id]);
    let mut frontier = vec![id];
    while let Some(parent) = frontier.pop() {
        for a in annotations.iter().filter(|a| a.parent_id == Some(parent)) {
            if seen.insert(a.id) {
                found.push(a.id);
                frontier.push(a.id);
            }
        }
    }
    found
}
