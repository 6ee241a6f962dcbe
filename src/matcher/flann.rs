//! Approximate nearest neighbours with a forest of randomized kd-trees.
//!
//! Each tree splits on one of the highest-variance coordinates of a sample, chosen at
//! random, at the sample mean. Queries descend every tree and then continue best-bin-first
//! from a shared queue of unexplored branches until the check budget is spent.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{Candidates, DescriptorSpace, push_candidate};

const TREES: usize = 4;
const CHECKS: usize = 32;
const TOP_DIMS: usize = 5;
const SAMPLE_SIZE: usize = 100;

enum Node {
    Leaf(Vec<usize>),
    Split {
        dim: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

struct KdTree {
    nodes: Vec<Node>,
    root: usize,
}

impl KdTree {
    fn build<S: DescriptorSpace>(data: &S, rng: &mut ChaCha8Rng) -> KdTree {
        let mut indices: Vec<usize> = (0..data.len()).collect();
        indices.shuffle(rng);
        let mut nodes = Vec::new();
        let root = Self::build_node(data, indices, rng, &mut nodes);
        KdTree { nodes, root }
    }

    fn build_node<S: DescriptorSpace>(
        data: &S,
        indices: Vec<usize>,
        rng: &mut ChaCha8Rng,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let split = if indices.len() > 1 {
            choose_split(data, &indices, rng)
        } else {
            None
        };
        let Some((dim, threshold)) = split else {
            nodes.push(Node::Leaf(indices));
            return nodes.len() - 1;
        };
        let (lower, upper): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| S::coord(data.row(i), dim) < threshold);
        if lower.is_empty() || upper.is_empty() {
            nodes.push(Node::Leaf(indices));
            return nodes.len() - 1;
        }
        let left = Self::build_node(data, lower, rng, nodes);
        let right = Self::build_node(data, upper, rng, nodes);
        nodes.push(Node::Split {
            dim,
            threshold,
            left,
            right,
        });
        nodes.len() - 1
    }
}

/// Random pick among the `TOP_DIMS` highest-variance coordinates of a sample, split at its mean.
fn choose_split<S: DescriptorSpace>(
    data: &S,
    indices: &[usize],
    rng: &mut ChaCha8Rng,
) -> Option<(usize, f32)> {
    let sample = &indices[..indices.len().min(SAMPLE_SIZE)];
    let n = sample.len() as f32;
    let dims = data.dims();
    let mut mean = vec![0.0f32; dims];
    for &i in sample {
        let row = data.row(i);
        for (d, m) in mean.iter_mut().enumerate() {
            *m += S::coord(row, d);
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);
    let mut variance = vec![0.0f32; dims];
    for &i in sample {
        let row = data.row(i);
        for (d, v) in variance.iter_mut().enumerate() {
            let diff = S::coord(row, d) - mean[d];
            *v += diff * diff;
        }
    }
    let mut ranked: Vec<(usize, f32)> = variance
        .into_iter()
        .enumerate()
        .filter(|&(_, v)| v > 0.0)
        .collect();
    if ranked.is_empty() {
        return None;
    }
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(TOP_DIMS);
    let (dim, _) = ranked[rng.random_range(0..ranked.len())];
    Some((dim, mean[dim]))
}

/// Unexplored subtree, ordered so that the heap pops the smallest priority first.
struct Branch {
    priority: f32,
    tree: usize,
    node: usize,
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Branch {}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Branch {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.total_cmp(&self.priority)
    }
}

struct SearchState {
    best: Vec<(usize, f32)>,
    checked: Vec<bool>,
    checks: usize,
    queue: BinaryHeap<Branch>,
}

pub struct FlannIndex<'a, S: DescriptorSpace> {
    data: &'a S,
    trees: Vec<KdTree>,
    checks: usize,
}

impl<'a, S: DescriptorSpace> FlannIndex<'a, S> {
    /// Indexes the rows of `data` with 4 trees and a budget of 32 checks per query.
    pub fn build(data: &'a S) -> Self {
        let trees = (0..TREES)
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(t as u64);
                KdTree::build(data, &mut rng)
            })
            .collect();
        Self {
            data,
            trees,
            checks: CHECKS,
        }
    }

    pub fn with_checks(mut self, checks: usize) -> Self {
        self.checks = checks.max(1);
        self
    }

    pub fn knn_match(&self, source: &S, k: usize) -> Candidates {
        (0..source.len())
            .into_par_iter()
            .map(|i| self.search(source.row(i), k))
            .collect()
    }

    /// Approximate `k` nearest rows to `query`, closest first.
    pub fn search(&self, query: &[S::Elem], k: usize) -> Vec<(usize, f32)> {
        let mut state = SearchState {
            best: Vec::with_capacity(k + 1),
            checked: vec![false; self.data.len()],
            checks: 0,
            queue: BinaryHeap::new(),
        };
        if self.data.is_empty() || k == 0 {
            return state.best;
        }
        for (t, tree) in self.trees.iter().enumerate() {
            self.descend(t, tree.root, 0.0, query, k, &mut state);
        }
        while let Some(branch) = state.queue.pop() {
            let full = state.best.len() >= k;
            if full && state.checks >= self.checks {
                break;
            }
            if full && S::bound(branch.priority) > state.best[k - 1].1 {
                continue;
            }
            self.descend(branch.tree, branch.node, branch.priority, query, k, &mut state);
        }
        state.best
    }

    fn descend(
        &self,
        tree: usize,
        mut node: usize,
        margins: f32,
        query: &[S::Elem],
        k: usize,
        state: &mut SearchState,
    ) {
        loop {
            match &self.trees[tree].nodes[node] {
                Node::Leaf(indices) => {
                    for &idx in indices {
                        if state.checked[idx] {
                            continue;
                        }
                        state.checked[idx] = true;
                        state.checks += 1;
                        let d = S::distance(query, self.data.row(idx));
                        push_candidate(&mut state.best, k, idx, d);
                    }
                    return;
                }
                Node::Split {
                    dim,
                    threshold,
                    left,
                    right,
                } => {
                    let diff = S::coord(query, *dim) - threshold;
                    let (near, far) = if diff < 0.0 {
                        (*left, *right)
                    } else {
                        (*right, *left)
                    };
                    state.queue.push(Branch {
                        priority: margins + S::margin(diff),
                        tree,
                        node: far,
                    });
                    node = near;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DescriptorMatrix;

    fn float_rows(n: usize) -> DescriptorMatrix<f32> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let data = (0..n * 8).map(|_| rng.random_range(0.0f32..100.0)).collect();
        DescriptorMatrix::from_rows(8, data)
    }

    #[test]
    fn identical_rows_are_found() {
        let data = float_rows(200);
        let index = FlannIndex::build(&data);
        for i in (0..200).step_by(17) {
            let found = index.search(data.row(i), 1);
            assert_eq!(found[0].1, 0.0);
        }
    }

    #[test]
    fn binary_rows_are_found() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let data: Vec<u8> = (0..64 * 32).map(|_| rng.random()).collect();
        let data = DescriptorMatrix::from_rows(32, data);
        let index = FlannIndex::build(&data);
        let found = index.search(data.row(10), 2);
        assert_eq!(found[0], (10, 0.0));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn single_row_index() {
        let data = DescriptorMatrix::from_rows(2, vec![1.0f32, 2.0]);
        let index = FlannIndex::build(&data);
        assert_eq!(index.search(&[1.0, 2.0], 2), vec![(0, 0.0)]);
    }

    #[test]
    fn full_budget_binary_search_matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut rows = |n: usize| -> DescriptorMatrix<u8> {
            DescriptorMatrix::from_rows(32, (0..n * 32).map(|_| rng.random()).collect())
        };
        let source = rows(40);
        let target = rows(150);
        let exact = crate::matcher::brute_force::knn_match(&source, &target, 2);
        let approx = FlannIndex::build(&target).with_checks(8).knn_match(&source, 2);
        let full = FlannIndex::build(&target).with_checks(150).knn_match(&source, 2);
        assert_eq!(approx.len(), 40);
        for ((e, a), f) in exact.iter().zip(&approx).zip(&full) {
            let distances = |c: &Vec<(usize, f32)>| c.iter().map(|p| p.1).collect::<Vec<_>>();
            assert_eq!(distances(f), distances(e));
            assert_eq!(a.len(), 2);
            assert!(a[0].1 >= e[0].1);
        }
    }
}
