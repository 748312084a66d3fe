//! Bagged ensemble of regression trees.
//!
//! Each tree is grown on a bootstrap resample drawn from a seeded RNG, so a
//! fit over identical input produces an identical ensemble. Trees are stored
//! as flat node arrays with index links; prediction is a loop, not a
//! recursive walk.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Hyperparameters for a forest fit.
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub tree_count: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART regression tree grown by variance-reduction split search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(
        xs: &[Vec<f64>],
        ys: &[f64],
        indices: Vec<usize>,
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self {
        let mut nodes = Vec::new();
        if indices.is_empty() {
            nodes.push(Node::Leaf { value: 0.0 });
        } else {
            grow(&mut nodes, xs, ys, indices, 0, max_depth, min_samples_leaf);
        }
        Self { nodes }
    }

    /// Evaluate the tree for one feature vector.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Grow a subtree over `indices`, returning its root position in `nodes`.
fn grow(
    nodes: &mut Vec<Node>,
    xs: &[Vec<f64>],
    ys: &[f64],
    indices: Vec<usize>,
    depth: usize,
    max_depth: usize,
    min_samples_leaf: usize,
) -> usize {
    let node_value =
        indices.iter().map(|&i| ys[i]).sum::<f64>() / indices.len() as f64;

    if depth >= max_depth || indices.len() < 2 * min_samples_leaf {
        nodes.push(Node::Leaf { value: node_value });
        return nodes.len() - 1;
    }

    let split = match best_split(xs, ys, &indices, min_samples_leaf) {
        Some(split) => split,
        None => {
            nodes.push(Node::Leaf { value: node_value });
            return nodes.len() - 1;
        }
    };

    let (feature, threshold) = split;
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| xs[i][feature] <= threshold);

    // Reserve this node's slot before growing children
    nodes.push(Node::Leaf { value: node_value });
    let position = nodes.len() - 1;

    let left = grow(
        nodes,
        xs,
        ys,
        left_indices,
        depth + 1,
        max_depth,
        min_samples_leaf,
    );
    let right = grow(
        nodes,
        xs,
        ys,
        right_indices,
        depth + 1,
        max_depth,
        min_samples_leaf,
    );

    nodes[position] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };
    position
}

/// Find the (feature, threshold) pair minimising the summed squared error of
/// the two resulting partitions. Returns `None` when no feature admits a
/// split that respects the leaf-size floor.
fn best_split(
    xs: &[Vec<f64>],
    ys: &[f64],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<(usize, f64)> {
    let n = indices.len();
    if n < 2 * min_samples_leaf {
        return None;
    }
    let n_features = xs[indices[0]].len();

    let mut best: Option<(usize, f64, f64)> = None;

    for feature in 0..n_features {
        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (xs[i][feature], ys[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let prefix: Vec<(f64, f64)> = pairs
            .iter()
            .map(|&(_, y)| {
                sum += y;
                sum_sq += y * y;
                (sum, sum_sq)
            })
            .collect();
        let (total_sum, total_sum_sq) = (sum, sum_sq);

        for left_len in min_samples_leaf..=(n - min_samples_leaf) {
            // Splits only between distinct feature values
            if left_len == n || pairs[left_len].0 <= pairs[left_len - 1].0 {
                continue;
            }

            let (left_sum, left_sum_sq) = prefix[left_len - 1];
            let right_sum = total_sum - left_sum;
            let right_sum_sq = total_sum_sq - left_sum_sq;
            let right_len = n - left_len;

            let sse = (left_sum_sq - left_sum * left_sum / left_len as f64)
                + (right_sum_sq - right_sum * right_sum / right_len as f64);

            if best.map_or(true, |(_, _, current)| sse < current) {
                let threshold = (pairs[left_len - 1].0 + pairs[left_len].0) / 2.0;
                best = Some((feature, threshold, sse));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

/// A bagging ensemble: bootstrap-resampled regression trees averaged at
/// prediction time. The spread across tree outputs doubles as an
/// uncertainty signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggedForest {
    trees: Vec<RegressionTree>,
}

impl BaggedForest {
    /// Fit `params.tree_count` trees, one bootstrap resample each.
    pub fn fit(xs: &[Vec<f64>], ys: &[f64], params: &ForestParams) -> Self {
        let n = xs.len();
        if n == 0 {
            return Self { trees: Vec::new() };
        }
        let min_samples_leaf = params.min_samples_leaf.max(1);
        let mut trees = Vec::with_capacity(params.tree_count);

        for tree_index in 0..params.tree_count {
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(tree_index as u64));
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(RegressionTree::fit(
                xs,
                ys,
                sample,
                params.max_depth,
                min_samples_leaf,
            ));
        }

        Self { trees }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Mean prediction across all trees.
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.predict_with_spread(x).0
    }

    /// Mean prediction plus the standard deviation of the per-tree outputs.
    pub fn predict_with_spread(&self, x: &[f64]) -> (f64, f64) {
        if self.trees.is_empty() {
            return (0.0, 0.0);
        }

        let outputs: Vec<f64> = self.trees.iter().map(|tree| tree.predict(x)).collect();
        let mean = outputs.iter().mean();
        let spread = if outputs.len() < 2 {
            0.0
        } else {
            outputs.iter().std_dev()
        };

        (mean, spread)
    }
}
