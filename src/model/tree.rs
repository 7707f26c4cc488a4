//! CART regression tree with a mean-squared-error split criterion.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{Co2Error, Result};
use crate::model::Regressor;

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.leaves() + right.leaves(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { max_depth: None, min_samples_split: 2, min_samples_leaf: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    root: TreeNode,
    n_features: usize,
    config: TreeConfig,
}

struct Candidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

fn mean(y: &Array1<f64>, indices: &[usize]) -> f64 {
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

fn sse(y: &Array1<f64>, indices: &[usize]) -> f64 {
    let m = mean(y, indices);
    indices.iter().map(|&i| (y[i] - m).powi(2)).sum()
}

impl DecisionTreeRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, config: &TreeConfig) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Co2Error::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(Co2Error::EmptyDataset);
        }

        let builder = Builder { x, y, config };
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let root = builder.build(&indices, 0);

        tracing::info!(
            rows = x.nrows(),
            depth = root.depth(),
            leaves = root.leaves(),
            "decision tree fitted"
        );

        Ok(Self { root, n_features: x.ncols(), config: config.clone() })
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn n_leaves(&self) -> usize {
        self.root.leaves()
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    config: &'a TreeConfig,
}

impl Builder<'_> {
    fn build(&self, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let leaf = || TreeNode::Leaf { value: mean(self.y, indices), n_samples };

        let should_stop = n_samples < self.config.min_samples_split
            || n_samples < 2 * self.config.min_samples_leaf.max(1)
            || self.config.max_depth.is_some_and(|d| depth >= d)
            || sse(self.y, indices) <= f64::EPSILON;
        if should_stop {
            return leaf();
        }

        let Some(best) = self.best_split(indices) else {
            return leaf();
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, best.feature_idx]] <= best.threshold);

        tracing::trace!(depth, feature = best.feature_idx, threshold = best.threshold, gain = best.gain, "split");

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left: Box::new(self.build(&left_idx, depth + 1)),
            right: Box::new(self.build(&right_idx, depth + 1)),
            n_samples,
        }
    }

    /// Sort once per feature and sweep running sums; the gain is the drop in squared error.
    fn best_split(&self, indices: &[usize]) -> Option<Candidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent = total_sq - total_sum * total_sum / n as f64;

        let mut best: Option<Candidate> = None;
        let mut sorted = indices.to_vec();

        for feature_idx in 0..self.x.ncols() {
            sorted.sort_by(|&a, &b| {
                self.x[[a, feature_idx]]
                    .partial_cmp(&self.x[[b, feature_idx]])
                    .unwrap_or(Ordering::Equal)
            });

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..n - 1 {
                let yi = self.y[sorted[k]];
                left_sum += yi;
                left_sq += yi * yi;

                let left_n = k + 1;
                let right_n = n - left_n;
                let here = self.x[[sorted[k], feature_idx]];
                let next = self.x[[sorted[k + 1], feature_idx]];
                if here == next || left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let children = (left_sq - left_sum * left_sum / left_n as f64)
                    + (right_sq - right_sum * right_sum / right_n as f64);
                let gain = parent - children;

                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate { feature_idx, threshold: (here + next) / 2.0, gain });
                }
            }
        }
        best
    }
}
