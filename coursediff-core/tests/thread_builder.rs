mod common;

use common::annotation;
use coursediff_core::cache::AnnotationCache;
use coursediff_core::session::SessionKey;
use coursediff_core::thread::{build_thread, descendants, BrokenLink};

fn order(entries: &[coursediff_core::thread::ThreadEntry]) -> Vec<(i64, usize)> {
    entries.iter().map(|e| (e.annotation.id, e.depth)).collect()
}

#[test]
fn parents_precede_children_and_siblings_sort_by_time() {
    let input = vec![annotation(1, None, 10), annotation(2, Some(1), 20), annotation(3, None, 5)];
    let thread = build_thread(&input);
    assert_eq!(order(&thread.entries), vec![(3, 0), (1, 0), (2, 1)]);
    assert!(thread.broken_links.is_empty());
}

#[test]
fn nested_replies_flatten_depth_first() {
    let input = vec![
        annotation(1, None, 10),
        annotation(2, Some(1), 30),
        annotation(3, Some(1), 20),
        annotation(4, Some(3), 40),
        annotation(5, None, 15),
        annotation(6, Some(4), 50),
    ];
    let thread = build_thread(&input);
    assert_eq!(
        order(&thread.entries),
        vec![(1, 0), (3, 1), (4, 2), (6, 3), (2, 1), (5, 0)]
    );
}

#[test]
fn output_does_not_depend_on_input_order() {
    let mut input = vec![
        annotation(1, None, 10),
        annotation(2, Some(1), 20),
        annotation(3, Some(1), 20),
        annotation(4, None, 10),
        annotation(5, Some(2), 30),
    ];
    let expected = build_thread(&input);
    input.reverse();
    assert_eq!(build_thread(&input), expected);
    input.swap(0, 3);
    assert_eq!(build_thread(&input), expected);
    // Equal timestamps fall back to id order.
    assert_eq!(order(&expected.entries)[..2], [(1, 0), (2, 1)]);
}

#[test]
fn orphans_render_top_level_and_are_reported() {
    let input = vec![annotation(1, None, 10), annotation(2, Some(77), 5), annotation(3, Some(2), 6)];
    let thread = build_thread(&input);
    assert_eq!(order(&thread.entries), vec![(2, 0), (3, 1), (1, 0)]);
    assert_eq!(
        thread.broken_links,
        vec![BrokenLink {
            annotation_id: 2,
            parent_id: 77
        }]
    );
}

#[test]
fn cycles_and_self_parents_terminate() {
    let input = vec![
        annotation(1, Some(1), 10),
        annotation(2, Some(3), 20),
        annotation(3, Some(2), 30),
        annotation(4, None, 40),
    ];
    let thread = build_thread(&input);
    assert_eq!(thread.len(), 4);

    let mut ids: Vec<i64> = thread.entries.iter().map(|e| e.annotation.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let linked: Vec<i64> = thread.broken_links.iter().map(|l| l.annotation_id).collect();
    assert!(linked.contains(&1));
    assert!(linked.contains(&2) || linked.contains(&3));

    for (i, entry) in thread.entries.iter().enumerate() {
        if entry.depth > 0 {
            let parent = entry.annotation.parent_id.unwrap();
            let parent_pos = thread.entries.iter().position(|e| e.annotation.id == parent).unwrap();
            assert!(parent_pos < i);
            assert_eq!(thread.entries[parent_pos].depth + 1, entry.depth);
        }
    }
}

#[test]
fn descendants_cover_the_whole_subtree() {
    let input = vec![
        annotation(1, None, 10),
        annotation(2, Some(1), 20),
        annotation(3, Some(2), 30),
        annotation(4, None, 40),
    ];
    let mut found = descendants(&input, 1);
    found.sort_unstable();
    assert_eq!(found, vec![2, 3]);
    assert!(descendants(&input, 4).is_empty());
}

#[test]
fn cache_keeps_stale_thread_until_refetched() {
    let key = SessionKey {
        material_id: 7,
        change_id: 1,
    };
    let other = SessionKey {
        material_id: 7,
        change_id: 2,
    };
    let mut cache = AnnotationCache::new();
    assert!(cache.needs_fetch(&key));

    let generation = cache.mark_fetching(key);
    assert!(!cache.needs_fetch(&key));
    cache.store(key, generation, &[annotation(1, None, 10)]);
    let generation_other = cache.mark_fetching(other);
    cache.store(other, generation_other, &[]);

    cache.invalidate(&key);
    assert!(cache.is_stale(&key));
    assert!(!cache.is_stale(&other));
    assert_eq!(cache.thread(&key).unwrap().len(), 1);

    // A fetch issued before the invalidation lands late: shown, still stale.
    cache.store(key, generation, &[annotation(1, None, 10), annotation(2, None, 20)]);
    assert!(cache.is_stale(&key));
    assert_eq!(cache.thread(&key).unwrap().len(), 2);

    let refetch = cache.mark_fetching(key);
    cache.store(key, refetch, &[annotation(1, None, 10), annotation(2, None, 20)]);
    assert!(!cache.needs_fetch(&key));
    assert!(!cache.is_stale(&key));
}
