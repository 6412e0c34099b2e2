//! Regression tree builder
//!
//! Grows one tree depth-first over histogram bins from per-row gradients and
//! hessians. Both model families use it:
//! - boosting passes `grad = pred - y`, `hess = 1` with L1/L2 regularization
//! - forests pass `grad = -y`, `hess = 1` with no regularization, which makes
//!   the gain a variance reduction and each leaf the mean target
//!
//! Gain of a split is `S(G_L, H_L) + S(G_R, H_R) - S(G, H)` with
//! `S(G, H) = T(G)^2 / (H + lambda)`, `T` soft-thresholding `G` by `alpha`.

use crate::binning::BinnedMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use salescast_core::model::{Node, SplitStrategy, Tree};

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Minimum hessian sum in each child
    pub min_child_weight: f64,
    pub reg_alpha: f64,
    pub reg_lambda: f64,
    /// Features examined per split; `None` examines every allowed feature
    pub max_features: Option<usize>,
    pub split_strategy: SplitStrategy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            reg_alpha: 0.0,
            reg_lambda: 0.0,
            max_features: None,
            split_strategy: SplitStrategy::Best,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BinStats {
    grad: f64,
    hess: f64,
    count: usize,
}

impl BinStats {
    fn add(&mut self, other: &BinStats) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }

    fn minus(&self, other: &BinStats) -> BinStats {
        BinStats {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Grows regression trees over one binned matrix
pub struct TreeGrower<'a> {
    data: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    config: &'a TreeConfig,
}

impl<'a> TreeGrower<'a> {
    pub fn new(
        data: &'a BinnedMatrix,
        grad: &'a [f64],
        hess: &'a [f64],
        config: &'a TreeConfig,
    ) -> Self {
        debug_assert_eq!(grad.len(), data.n_rows());
        debug_assert_eq!(hess.len(), data.n_rows());
        Self {
            data,
            grad,
            hess,
            config,
        }
    }

    /// Grow a tree over `rows` (repeats allowed, as in a bootstrap sample),
    /// splitting only on `features`
    pub fn grow(&self, rows: Vec<usize>, features: &[usize], rng: &mut StdRng) -> Tree {
        let mut nodes = Vec::new();
        let mut candidates = features.to_vec();
        self.build_node(rows, 0, &mut candidates, &mut nodes, rng);
        Tree::new(nodes)
    }

    fn build_node(
        &self,
        rows: Vec<usize>,
        depth: usize,
        candidates: &mut [usize],
        nodes: &mut Vec<Node>,
        rng: &mut StdRng,
    ) -> i32 {
        let current_idx = nodes.len();
        let total = self.sum_rows(&rows);
        nodes.push(Node::leaf(self.leaf_value(total.grad, total.hess)));

        if depth >= self.config.max_depth
            || rows.len() < self.config.min_samples_split
            || rows.len() < 2 * self.config.min_samples_leaf
        {
            return current_idx as i32;
        }

        let Some(split) = self.find_split(&rows, &total, candidates, rng) else {
            return current_idx as i32;
        };

        let codes = self.data.column(split.feature);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| codes[r] as usize <= split.bin);

        let threshold = self.data.threshold(split.feature, split.bin);
        nodes[current_idx] = Node::internal(split.feature as i32, threshold, -1, -1);

        let left = self.build_node(left_rows, depth + 1, candidates, nodes, rng);
        let right = self.build_node(right_rows, depth + 1, candidates, nodes, rng);
        nodes[current_idx].left = left;
        nodes[current_idx].right = right;

        current_idx as i32
    }

    /// Best split over the candidate features, or `None` when no split has
    /// positive gain under the child constraints
    fn find_split(
        &self,
        rows: &[usize],
        total: &BinStats,
        candidates: &mut [usize],
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let limit = match self.config.max_features {
            Some(k) => {
                candidates.shuffle(rng);
                k
            }
            None => candidates.len(),
        };

        let parent_score = self.score(total.grad, total.hess);
        let mut best: Option<SplitCandidate> = None;
        let mut examined = 0;

        for &feature in candidates.iter() {
            if examined >= limit {
                break;
            }
            let histogram = self.histogram(rows, feature);
            let occupied = histogram.iter().filter(|b| b.count > 0).count();
            // Constant within this node; does not count towards the limit.
            if occupied < 2 {
                continue;
            }
            examined += 1;

            let found = match self.config.split_strategy {
                SplitStrategy::Best => self.best_bin(&histogram, total, parent_score),
                SplitStrategy::Random => self.random_bin(&histogram, total, parent_score, rng),
            };
            if let Some((bin, gain)) = found {
                if best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }

        best
    }

    fn best_bin(&self, histogram: &[BinStats], total: &BinStats, parent: f64) -> Option<(usize, f64)> {
        let mut left = BinStats::default();
        let mut best: Option<(usize, f64)> = None;
        for (bin, stats) in histogram.iter().enumerate().take(histogram.len() - 1) {
            left.add(stats);
            if let Some(gain) = self.split_gain(&left, total, parent) {
                if best.map_or(true, |(_, g)| gain > g) {
                    best = Some((bin, gain));
                }
            }
        }
        best
    }

    /// One uniformly drawn boundary between the node's lowest and highest
    /// occupied bins
    fn random_bin(
        &self,
        histogram: &[BinStats],
        total: &BinStats,
        parent: f64,
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let lo = histogram.iter().position(|b| b.count > 0)?;
        let hi = histogram.iter().rposition(|b| b.count > 0)?;
        let bin = rng.gen_range(lo..hi);

        let mut left = BinStats::default();
        for stats in &histogram[..=bin] {
            left.add(stats);
        }
        self.split_gain(&left, total, parent).map(|gain| (bin, gain))
    }

    fn split_gain(&self, left: &BinStats, total: &BinStats, parent: f64) -> Option<f64> {
        let right = total.minus(left);
        if left.count < self.config.min_samples_leaf
            || right.count < self.config.min_samples_leaf
            || left.hess < self.config.min_child_weight
            || right.hess < self.config.min_child_weight
        {
            return None;
        }
        let gain = self.score(left.grad, left.hess) + self.score(right.grad, right.hess) - parent;
        (gain > 0.0).then_some(gain)
    }

    fn histogram(&self, rows: &[usize], feature: usize) -> Vec<BinStats> {
        let codes = self.data.column(feature);
        let mut bins = vec![BinStats::default(); self.data.n_bins(feature)];
        for &r in rows {
            let b = &mut bins[codes[r] as usize];
            b.grad += self.grad[r];
            b.hess += self.hess[r];
            b.count += 1;
        }
        bins
    }

    fn sum_rows(&self, rows: &[usize]) -> BinStats {
        let mut total = BinStats::default();
        for &r in rows {
            total.grad += self.grad[r];
            total.hess += self.hess[r];
        }
        total.count = rows.len();
        total
    }

    fn soft_threshold(&self, g: f64) -> f64 {
        let alpha = self.config.reg_alpha;
        if g > alpha {
            g - alpha
        } else if g < -alpha {
            g + alpha
        } else {
            0.0
        }
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        let t = self.soft_threshold(g);
        t * t / denom
    }

    /// Optimal leaf weight: -T(G) / (H + lambda)
    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -self.soft_threshold(g) / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deterministic::seeded_rng;
    use crate::binning::MAX_BINS;

    fn step_data() -> (BinnedMatrix, Vec<f64>) {
        // y = 1 for x < 5, y = 3 otherwise; second feature is noise-free constant
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 7.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 3.0 }).collect();
        (BinnedMatrix::from_rows(&rows, 2, MAX_BINS), y)
    }

    #[test]
    fn test_mean_leaves_recover_step() {
        let (data, y) = step_data();
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let config = TreeConfig {
            max_depth: 3,
            ..TreeConfig::default()
        };
        let tree = TreeGrower::new(&data, &grad, &hess, &config).grow(
            (0..10).collect(),
            &[0, 1],
            &mut seeded_rng(1),
        );

        assert!(tree.validate(2).is_ok());
        assert_eq!(tree.nodes[0].feature_idx, 0);
        assert_eq!(tree.nodes[0].threshold, 4.5);
        assert_eq!(tree.evaluate(&[2.0, 7.0]), 1.0);
        assert_eq!(tree.evaluate(&[8.0, 7.0]), 3.0);
        // Pure children are not split further.
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn test_depth_limit_and_min_leaf() {
        let (data, y) = step_data();
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];

        let stump_only = TreeConfig {
            max_depth: 0,
            ..TreeConfig::default()
        };
        let tree = TreeGrower::new(&data, &grad, &hess, &stump_only).grow(
            (0..10).collect(),
            &[0, 1],
            &mut seeded_rng(1),
        );
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(2.0));

        let big_leaves = TreeConfig {
            min_samples_leaf: 6,
            ..TreeConfig::default()
        };
        let tree = TreeGrower::new(&data, &grad, &hess, &big_leaves).grow(
            (0..10).collect(),
            &[0, 1],
            &mut seeded_rng(1),
        );
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn test_regularization_shrinks_leaves() {
        let (data, y) = step_data();
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let config = TreeConfig {
            max_depth: 0,
            reg_lambda: 10.0,
            ..TreeConfig::default()
        };
        let tree = TreeGrower::new(&data, &grad, &hess, &config).grow(
            (0..10).collect(),
            &[0],
            &mut seeded_rng(1),
        );
        // -(-20) / (10 + 10)
        assert_eq!(tree.nodes[0].leaf, Some(1.0));
    }

    #[test]
    fn test_random_split_is_seeded() {
        let (data, y) = step_data();
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let config = TreeConfig {
            max_depth: 4,
            max_features: Some(1),
            split_strategy: SplitStrategy::Random,
            ..TreeConfig::default()
        };
        let grow = |seed| {
            TreeGrower::new(&data, &grad, &hess, &config).grow(
                (0..10).collect(),
                &[0, 1],
                &mut seeded_rng(seed),
            )
        };
        assert_eq!(grow(9), grow(9));
        // Feature 1 is constant, so every split lands on feature 0.
        let tree = grow(9);
        assert!(tree
            .nodes
            .iter()
            .filter(|n| !n.is_leaf())
            .all(|n| n.feature_idx == 0));
    }
}
