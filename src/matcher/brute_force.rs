use rayon::prelude::*;

use super::{Candidates, DescriptorSpace, push_candidate};

/// Exhaustive k-nearest-neighbour search, parallel over source rows.
///
/// Output order follows the source rows; among equal distances the lowest target index wins.
pub fn knn_match<S: DescriptorSpace>(source: &S, target: &S, k: usize) -> Candidates {
    (0..source.len())
        .into_par_iter()
        .map(|i| {
            let query = source.row(i);
            let mut best = Vec::with_capacity(k + 1);
            for j in 0..target.len() {
                push_candidate(&mut best, k, j, S::distance(query, target.row(j)));
            }
            best
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DescriptorMatrix;

    #[test]
    fn finds_exact_hamming_neighbours() {
        let source = DescriptorMatrix::from_rows(1, vec![0b0000_1111u8, 0b1111_0000]);
        let target = DescriptorMatrix::from_rows(1, vec![0b1111_0000u8, 0b0000_1110, 0b0000_1111]);
        let candidates = knn_match(&source, &target, 2);
        assert_eq!(candidates[0], vec![(2, 0.0), (1, 1.0)]);
        assert_eq!(candidates[1][0], (0, 0.0));
    }

    #[test]
    fn ties_go_to_lowest_target_index() {
        let source = DescriptorMatrix::from_rows(2, vec![0.0f32, 0.0]);
        let target = DescriptorMatrix::from_rows(2, vec![1.0f32, 0.0, 0.0, 1.0, 0.0, -1.0]);
        let candidates = knn_match(&source, &target, 1);
        assert_eq!(candidates, vec![vec![(0, 1.0)]]);
    }
}
