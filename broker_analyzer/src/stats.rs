//! Order statistics and ranking helpers.

use std::cmp::Ordering;

/// Median of `values`; the mean of the two middle values for an even count.
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Largest value, `None` for an empty slice.
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn sorted_indices(values: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    idx
}

/// Ascending 1-based ranks; tied values share the average of their positions.
///
/// `[10.0, 20.0, 10.0]` ranks as `[1.5, 3.0, 1.5]`.
pub fn average_rank(values: &[f64]) -> Vec<f64> {
    let idx = sorted_indices(values);
    let mut ranks = vec![0.0; values.len()];

    let mut start = 0;
    while start < idx.len() {
        let mut end = start + 1;
        while end < idx.len() && values[idx[end]] == values[idx[start]] {
            end += 1;
        }
        // positions start+1 ..= end share their mean
        let shared = (start + 1 + end) as f64 / 2.0;
        for &i in &idx[start..end] {
            ranks[i] = shared;
        }
        start = end;
    }
    ranks
}

/// Ascending dense ranks: equal values share a rank, distinct values take
/// consecutive integers starting at 1.
///
/// `[3.0, 3.0, 7.0]` ranks as `[1, 1, 2]`.
pub fn dense_rank(values: &[f64]) -> Vec<usize> {
    let idx = sorted_indices(values);
    let mut ranks = vec![0; values.len()];

    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for &i in &idx {
        if previous != Some(values[i]) {
            rank += 1;
            previous = Some(values[i]);
        }
        ranks[i] = rank;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn median_odd_even_empty() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn average_rank_ties() {
        assert_eq!(average_rank(&[10.0, 20.0, 10.0]), vec![1.5, 3.0, 1.5]);
        assert_eq!(average_rank(&[5.0, 5.0, 5.0]), vec![2.0, 2.0, 2.0]);
        assert_eq!(average_rank(&[0.3, 0.1, 0.2]), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn dense_rank_no_gaps() {
        assert_eq!(dense_rank(&[3.0, 3.0, 7.0]), vec![1, 1, 2]);
        assert_eq!(dense_rank(&[9.0, 1.0, 4.0, 1.0]), vec![3, 1, 2, 1]);
    }

    proptest! {
        #[test]
        fn dense_ranks_are_consecutive(values in proptest::collection::vec(0u8..6, 1..12)) {
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let ranks = dense_rank(&values);

            let mut distinct = values.clone();
            distinct.sort_by(f64::total_cmp);
            distinct.dedup();
            let top = *ranks.iter().max().unwrap();
            prop_assert_eq!(top, distinct.len());

            for (a, ra) in values.iter().zip(&ranks) {
                for (b, rb) in values.iter().zip(&ranks) {
                    prop_assert_eq!(a < b, ra < rb);
                }
            }
        }

        #[test]
        fn average_ranks_sum_like_positions(values in proptest::collection::vec(0u8..4, 1..10)) {
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let n = values.len() as f64;
            let total: f64 = average_rank(&values).iter().sum();
            prop_assert!((total - n * (n + 1.0) / 2.0).abs() < 1e-9);
        }
    }
}
