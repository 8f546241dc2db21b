//! Merging of half-open intervals.

/// Merge overlapping or adjacent `[start, end)` intervals.
///
/// Returns a sorted, non-overlapping list. Empty intervals are dropped.
pub fn merge_intervals<T: Ord + Copy>(mut intervals: Vec<(T, T)>) -> Vec<(T, T)> {
    intervals.retain(|(start, end)| start < end);
    intervals.sort();

    let mut merged: Vec<(T, T)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                // Overlapping or adjacent: extend the current interval.
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_and_overlapping_collapse() {
        let merged = merge_intervals(vec![(9, 12), (12, 13), (15, 17), (16, 18), (1, 2)]);
        assert_eq!(merged, vec![(1, 2), (9, 13), (15, 18)]);
    }

    #[test]
    fn contained_interval_absorbed() {
        assert_eq!(merge_intervals(vec![(9, 17), (10, 11)]), vec![(9, 17)]);
    }

    #[test]
    fn empty_intervals_dropped() {
        assert_eq!(merge_intervals(vec![(5, 5), (7, 6)]), Vec::<(i32, i32)>::new());
    }
}
