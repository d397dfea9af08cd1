//! Position bookkeeping for drag-and-drop boards. Columns are stored with
//! dense positions starting at 0.

use std::collections::HashSet;

/// `proposed` must name every id in `current` exactly once.
pub fn is_permutation(current: &[i64], proposed: &[i64]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let wanted: HashSet<i64> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(proposed.len());
    proposed.iter().all(|id| wanted.contains(id) && seen.insert(*id))
}

/// Removes `id` from `column` (if present) and reinserts it at `index`,
/// clamped to the end of the column.
pub fn insert_at(column: &[i64], id: i64, index: usize) -> Vec<i64> {
    let mut ids: Vec<i64> = column.iter().copied().filter(|other| *other != id).collect();
    let index = index.min(ids.len());
    ids.insert(index, id);
    ids
}

/// Columns after dragging `id` out of `source`, returned as
/// `(source_after, target_after)`. With no `target` the task is reordered
/// inside `source` and `target_after` is `None`.
pub fn plan_move(
    source: &[i64],
    target: Option<&[i64]>,
    id: i64,
    index: usize,
) -> (Vec<i64>, Option<Vec<i64>>) {
    match target {
        None => (insert_at(source, id, index), None),
        Some(target) => {
            let remaining = source.iter().copied().filter(|other| *other != id).collect();
            (remaining, Some(insert_at(target, id, index)))
        }
    }
}

/// Appends `moved` below the tasks already in `column`, keeping both orders.
pub fn append_column(column: &[i64], moved: &[i64]) -> Vec<i64> {
    column
        .iter()
        .chain(moved.iter().filter(|id| !column.contains(id)))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutations() {
        assert!(is_permutation(&[1, 2, 3], &[3, 1, 2]));
        assert!(!is_permutation(&[1, 2, 3], &[1, 2]));
        assert!(!is_permutation(&[1, 2, 3], &[1, 2, 2]));
        assert!(!is_permutation(&[1, 2, 3], &[1, 2, 4]));
        assert!(is_permutation(&[], &[]));
    }

    #[test]
    fn moves_within_a_column() {
        assert_eq!(insert_at(&[1, 2, 3, 4], 4, 0), vec![4, 1, 2, 3]);
        assert_eq!(insert_at(&[1, 2, 3, 4], 1, 2), vec![2, 3, 1, 4]);
    }

    #[test]
    fn moves_into_another_column() {
        assert_eq!(insert_at(&[10, 11], 5, 1), vec![10, 5, 11]);
    }

    #[test]
    fn index_is_clamped() {
        assert_eq!(insert_at(&[1, 2], 9, 100), vec![1, 2, 9]);
        assert_eq!(insert_at(&[], 9, 3), vec![9]);
    }

    #[test]
    fn reorder_inside_one_column_touches_only_that_column() {
        let (source, target) = plan_move(&[1, 2, 3], None, 3, 0);
        assert_eq!(source, vec![3, 1, 2]);
        assert_eq!(target, None);
    }

    #[test]
    fn moving_across_columns_closes_the_gap_behind() {
        let (source, target) = plan_move(&[1, 2, 3], Some(&[7, 8][..]), 2, 1);
        assert_eq!(source, vec![1, 3]);
        assert_eq!(target, Some(vec![7, 2, 8]));
    }

    #[test]
    fn moving_to_the_end_of_another_column() {
        let (source, target) = plan_move(&[4], Some(&[7, 8][..]), 4, usize::MAX);
        assert!(source.is_empty());
        assert_eq!(target, Some(vec![7, 8, 4]));
    }

    #[test]
    fn orphaned_tasks_go_below_the_existing_column() {
        assert_eq!(append_column(&[5, 3], &[9, 1]), vec![5, 3, 9, 1]);
        assert_eq!(append_column(&[], &[9, 1]), vec![9, 1]);
        assert_eq!(append_column(&[5], &[5, 6]), vec![5, 6]);
    }
}
