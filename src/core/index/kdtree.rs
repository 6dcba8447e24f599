//! Randomized kd-forest for approximate nearest-neighbor search.
//!
//! Each tree splits on a dimension drawn at random from the highest-variance
//! dimensions of its subset, so the trees explore different partitions of
//! the same data. A query descends every tree to a leaf first, then spends
//! the remaining check budget on the unexplored branches closest to the
//! query. Randomness comes from a fixed seed, so the same inputs always
//! produce the same scores.

use super::{NeighborIndex, TwoNearest};
use crate::core::features::{Descriptor, DESCRIPTOR_DIM};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Subsets at or below this size become leaves
const LEAF_SIZE: usize = 8;

/// Split dimension is drawn from this many top-variance dimensions
const SPLIT_CANDIDATES: usize = 5;

/// Fixed seed; each tree derives its own stream from this
const FOREST_SEED: u64 = 0x7261_6e64_6f6d_4b44;

enum Node {
    Split {
        dim: usize,
        value: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        points: Vec<usize>,
    },
}

struct KdTree {
    nodes: Vec<Node>,
    root: usize,
}

impl KdTree {
    fn build(descriptors: &[Descriptor], rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..descriptors.len()).collect();
        let root = build_node(descriptors, indices, &mut nodes, rng);
        Self { nodes, root }
    }
}

fn build_node(
    descriptors: &[Descriptor],
    indices: Vec<usize>,
    nodes: &mut Vec<Node>,
    rng: &mut StdRng,
) -> usize {
    if indices.len() <= LEAF_SIZE {
        nodes.push(Node::Leaf { points: indices });
        return nodes.len() - 1;
    }

    let dim = pick_split_dimension(descriptors, &indices, rng);
    let value = median_value(descriptors, &indices, dim);

    // Points strictly below the split value go left; this matches the query
    // routing rule, so every stored point is reachable in its own tree.
    let (left_points, right_points): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| descriptors[i].as_slice()[dim] < value);

    // Degenerate split (the subset is constant along the chosen dimension)
    if left_points.is_empty() || right_points.is_empty() {
        let mut points = left_points;
        points.extend(right_points);
        nodes.push(Node::Leaf { points });
        return nodes.len() - 1;
    }

    let left = build_node(descriptors, left_points, nodes, rng);
    let right = build_node(descriptors, right_points, nodes, rng);
    nodes.push(Node::Split {
        dim,
        value,
        left,
        right,
    });
    nodes.len() - 1
}

/// Choose a split dimension at random from the top-variance dimensions of
/// the subset.
fn pick_split_dimension(descriptors: &[Descriptor], indices: &[usize], rng: &mut StdRng) -> usize {
    let mut mean = [0.0f32; DESCRIPTOR_DIM];
    for &i in indices {
        for (m, v) in mean.iter_mut().zip(descriptors[i].as_slice()) {
            *m += v;
        }
    }
    let count = indices.len() as f32;
    for m in mean.iter_mut() {
        *m /= count;
    }

    let mut variance = [0.0f32; DESCRIPTOR_DIM];
    for &i in indices {
        for (d, (var, m)) in descriptors[i]
            .as_slice()
            .iter()
            .zip(variance.iter_mut().zip(mean.iter()))
        {
            let diff = d - m;
            *var += diff * diff;
        }
    }

    let mut ranked: Vec<usize> = (0..DESCRIPTOR_DIM).collect();
    ranked.sort_by(|&a, &b| variance[b].total_cmp(&variance[a]).then_with(|| a.cmp(&b)));
    ranked.truncate(SPLIT_CANDIDATES);

    ranked[rng.gen_range(0..ranked.len())]
}

fn median_value(descriptors: &[Descriptor], indices: &[usize], dim: usize) -> f32 {
    let mut values: Vec<f32> = indices
        .iter()
        .map(|&i| descriptors[i].as_slice()[dim])
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values[values.len() / 2]
}

/// An unexplored branch, ordered by its distance lower bound so the search
/// expands the most promising branch first.
struct Branch {
    margin_sq: f32,
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
    // Reversed so the max-heap pops the smallest margin first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .margin_sq
            .total_cmp(&self.margin_sq)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

struct SearchState {
    best_index: usize,
    best_sq: f32,
    second_sq: f32,
    budget: usize,
}

impl SearchState {
    fn update(&mut self, index: usize, distance_sq: f32) {
        if distance_sq < self.best_sq {
            self.second_sq = self.best_sq;
            self.best_sq = distance_sq;
            self.best_index = index;
        } else if distance_sq < self.second_sq {
            self.second_sq = distance_sq;
        }
    }
}

/// A forest of randomized kd-trees sharing one check budget per query.
pub(crate) struct KdForestIndex<'a> {
    descriptors: &'a [Descriptor],
    trees: Vec<KdTree>,
    checks: usize,
}

impl<'a> KdForestIndex<'a> {
    pub(crate) fn build(descriptors: &'a [Descriptor], trees: usize, checks: usize) -> Self {
        let trees = (0..trees)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(FOREST_SEED.wrapping_add(t as u64));
                KdTree::build(descriptors, &mut rng)
            })
            .collect();

        Self {
            descriptors,
            trees,
            checks,
        }
    }

    /// Walk from `node` down to a leaf, pushing the far side of every split
    /// onto the branch heap and scoring the leaf's points.
    fn descend(
        &self,
        tree: usize,
        mut node: usize,
        query: &Descriptor,
        heap: &mut BinaryHeap<Branch>,
        visited: &mut [bool],
        state: &mut SearchState,
    ) {
        loop {
            match &self.trees[tree].nodes[node] {
                Node::Split {
                    dim,
                    value,
                    left,
                    right,
                } => {
                    let diff = query.as_slice()[*dim] - value;
                    let (near, far) = if diff < 0.0 {
                        (*left, *right)
                    } else {
                        (*right, *left)
                    };
                    heap.push(Branch {
                        margin_sq: diff * diff,
                        tree,
                        node: far,
                    });
                    node = near;
                }
                Node::Leaf { points } => {
                    for &p in points {
                        if state.budget == 0 {
                            return;
                        }
                        if visited[p] {
                            continue;
                        }
                        visited[p] = true;
                        state.update(p, query.distance_squared(&self.descriptors[p]));
                        state.budget -= 1;
                    }
                    return;
                }
            }
        }
    }
}

impl NeighborIndex for KdForestIndex<'_> {
    fn nearest_two(&self, query: &Descriptor) -> Option<TwoNearest> {
        if self.descriptors.is_empty() {
            return None;
        }

        let mut visited = vec![false; self.descriptors.len()];
        let mut heap = BinaryHeap::new();
        let mut state = SearchState {
            best_index: 0,
            best_sq: f32::INFINITY,
            second_sq: f32::INFINITY,
            budget: self.checks.max(1),
        };

        // One full descent per tree, then spend whatever budget remains on
        // the closest unexplored branches across the whole forest.
        for tree in 0..self.trees.len() {
            if state.budget == 0 {
                break;
            }
            let root = self.trees[tree].root;
            self.descend(tree, root, query, &mut heap, &mut visited, &mut state);
        }

        while state.budget > 0 {
            let Some(branch) = heap.pop() else {
                break;
            };
            // A branch whose lower bound exceeds the current second-best
            // cannot improve either neighbor
            if branch.margin_sq >= state.second_sq {
                continue;
            }
            self.descend(
                branch.tree,
                branch.node,
                query,
                &mut heap,
                &mut visited,
                &mut state,
            );
        }

        Some(TwoNearest {
            index: state.best_index,
            distance: state.best_sq.sqrt(),
            second_distance: state.second_sq.is_finite().then(|| state.second_sq.sqrt()),
        })
    }

    fn len(&self) -> usize {
        self.descriptors.len()
    }
}
