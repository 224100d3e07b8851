//! Word-level comparison of the previous and current panel text.
//!
//! Produces character ranges (same offsets as the panel document) of the
//! words removed from the previous text and inserted into the current text,
//! so the compare view can colour them under any highlight markers.

use std::ops::Range;

use similar::{ChangeTag, TextDiff};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangedRanges {
    pub previous: Vec<Range<usize>>,
    pub current: Vec<Range<usize>>,
}

impl ChangedRanges {
    pub fn contains(ranges: &[Range<usize>], offset: usize) -> bool {
        // Ranges are sorted and disjoint.
        let idx = ranges.partition_point(|r| r.end <= offset);
        ranges.get(idx).is_some_and(|r| r.start <= offset)
    }
}

pub fn changed_ranges(old: &str, new: &str) -> ChangedRanges {
    let diff = TextDiff::from_words(old, new);
    let mut out = ChangedRanges::default();
    let (mut old_pos, mut new_pos) = (0usize, 0usize);

    for change in diff.iter_all_changes() {
        let len = change.value().chars().count();
        match change.tag() {
            ChangeTag::Equal => {
                old_pos += len;
                new_pos += len;
            }
            ChangeTag::Delete => {
                push_merged(&mut out.previous, old_pos..old_pos + len);
                old_pos += len;
            }
            ChangeTag::Insert => {
                push_merged(&mut out.current, new_pos..new_pos + len);
                new_pos += len;
            }
        }
    }
    out
}

fn push_merged(ranges: &mut Vec<Range<usize>>, next: Range<usize>) {
    if next.is_empty() {
        return;
    }
    match ranges.last_mut() {
        Some(last) if last.end == next.start => last.end = next.end,
        _ => ranges.push(next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_replaced_words_on_both_sides() {
        let old = "late work loses 10% per day";
        let new = "late work loses 5% per day";
        let ranges = changed_ranges(old, new);

        let prev: String = ranges
            .previous
            .iter()
            .map(|r| old[r.clone()].to_owned())
            .collect();
        let cur: String = ranges
            .current
            .iter()
            .map(|r| new[r.clone()].to_owned())
            .collect();
        assert_eq!(prev.trim(), "10%");
        assert_eq!(cur.trim(), "5%");
    }

    #[test]
    fn identical_texts_have_no_ranges() {
        assert_eq!(changed_ranges("same text", "same text"), ChangedRanges::default());
    }

    #[test]
    fn lookup_by_offset() {
        let ranges = vec![2..4, 8..9];
        assert!(!ChangedRanges::contains(&ranges, 1));
        assert!(ChangedRanges::contains(&ranges, 2));
        assert!(ChangedRanges::contains(&ranges, 3));
        assert!(!ChangedRanges::contains(&ranges, 4));
        assert!(ChangedRanges::contains(&ranges, 8));
        assert!(!ChangedRanges::contains(&ranges, 9));
    }
}
