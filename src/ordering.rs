//! Which pages to extract first.
//!
//! Opening page 50 of a 200 page archive should not have to wait for pages
//! 1 to 49. The policy puts the pages about to be shown at the front of the
//! extraction queue, followed by the few pages just behind them.

/// Zero-based start index for a 1-based `start_page`; non-positive means
/// "the last page" (or the last spread when `depth` is 2).
pub fn start_index(start_page: i64, pages: usize, depth: usize) -> usize {
    if start_page <= 0 {
        pages.saturating_sub(depth)
    } else {
        (start_page - 1).max(0) as usize
    }
}

/// `[start, start + 2 * depth)` then `start - 1` down to `start - depth`,
/// restricted to valid page indices.
pub fn priority_order(start: usize, depth: usize, pages: usize) -> Vec<usize> {
    let forward = start..start.saturating_add(2 * depth);
    let backward = (start.saturating_sub(depth)..start).rev();
    forward.chain(backward).filter(|&p| p < pages).collect()
}

/// Stable move-to-front of `list[order[i]]` into position `i`.
///
/// `order` indexes the list as it was before reordering.
pub fn apply_priority<T: Clone + PartialEq>(list: &mut Vec<T>, order: &[usize]) {
    let front: Vec<T> = order
        .iter()
        .filter_map(|&i| list.get(i).cloned())
        .collect();
    for (i, item) in front.into_iter().enumerate() {
        if let Some(pos) = list.iter().position(|x| *x == item) {
            let moved = list.remove(pos);
            list.insert(i, moved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_index_counts_from_one() {
        assert_eq!(start_index(5, 10, 1), 4);
        assert_eq!(start_index(1, 10, 2), 0);
    }

    #[test]
    fn non_positive_start_means_last_page() {
        assert_eq!(start_index(0, 10, 1), 9);
        assert_eq!(start_index(-3, 10, 2), 8);
        assert_eq!(start_index(0, 1, 2), 0);
        assert_eq!(start_index(0, 0, 1), 0);
    }

    #[test]
    fn forward_pages_first_then_nearest_backward() {
        assert_eq!(priority_order(4, 1, 10), vec![4, 5, 3]);
        assert_eq!(priority_order(4, 2, 10), vec![4, 5, 6, 7, 3, 2]);
    }

    #[test]
    fn priority_is_clipped_to_the_page_range() {
        assert_eq!(priority_order(0, 2, 10), vec![0, 1, 2, 3]);
        assert_eq!(priority_order(9, 2, 10), vec![9, 8, 7]);
        assert!(priority_order(0, 1, 0).is_empty());
    }

    #[test]
    fn reordering_moves_wanted_pages_to_the_front() {
        let mut pages: Vec<usize> = (0..10).collect();
        apply_priority(&mut pages, &priority_order(4, 1, 10));
        assert_eq!(pages, vec![4, 5, 3, 0, 1, 2, 6, 7, 8, 9]);
    }

    #[test]
    fn reordering_names() {
        let mut names = vec!["a.jpg", "b.jpg", "c.jpg"];
        apply_priority(&mut names, &priority_order(2, 1, 3));
        assert_eq!(names, vec!["c.jpg", "b.jpg", "a.jpg"]);
    }
}
