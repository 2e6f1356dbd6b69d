//! CART regression tree
//!
//! Variance-reduction splits over every feature, stored as a flat node
//! vector so the fitted tree serializes without recursion.

use serde::{Deserialize, Serialize};

use super::ForestParams;

/// Splits with a smaller SSE decrease than this are treated as no split.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Training view shared by every recursive call.
struct Fit<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestParams,
    importances: Vec<f64>,
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit on the rows listed in `sample` (duplicates allowed, as with a bootstrap draw).
    ///
    /// Returns the tree and its unnormalized impurity-decrease importances,
    /// one per feature column.
    pub fn fit(x: &[Vec<f64>], y: &[f64], sample: &[usize], params: &ForestParams) -> (Self, Vec<f64>) {
        let n_features = x.first().map_or(0, Vec::len);
        let mut fit = Fit {
            x,
            y,
            params,
            importances: vec![0.0; n_features],
            nodes: Vec::new(),
        };
        let mut idx = sample.to_vec();
        if idx.is_empty() {
            fit.nodes.push(Node::Leaf { value: 0.0 });
        } else {
            fit.grow(&mut idx, 0);
        }
        (Self { nodes: fit.nodes }, fit.importances)
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes.get(i) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    i = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match nodes.get(i) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

impl Fit<'_> {
    fn grow(&mut self, idx: &mut [usize], depth: usize) -> usize {
        let n = idx.len() as f64;
        let (sum, sum_sq) = idx.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let v = self.y[i];
            (s + v, sq + v * v)
        });
        let mean = sum / n;
        let sse = sum_sq - sum * sum / n;

        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= self.params.max_depth || idx.len() < self.params.min_samples_split || sse <= MIN_GAIN {
            return node_id;
        }
        let Some(best) = self.best_split(idx, sse) else {
            return node_id;
        };

        let (feature, threshold) = (best.feature, best.threshold);
        idx.sort_by_key(|&i| self.x[i][feature] > threshold);
        let mid = idx.partition_point(|&i| self.x[i][feature] <= threshold);
        if mid == 0 || mid == idx.len() {
            return node_id;
        }

        self.importances[feature] += best.gain;
        let (left_idx, right_idx) = idx.split_at_mut(mid);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[node_id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    /// Largest SSE decrease over all features; ties keep the lower feature index.
    fn best_split(&self, idx: &[usize], node_sse: f64) -> Option<BestSplit> {
        let n = idx.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n_features = self.importances.len();
        let mut best: Option<BestSplit> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in 0..n_features {
            pairs.clear();
            pairs.extend(idx.iter().map(|&i| (self.x[i][feature], self.y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let total: f64 = pairs.iter().map(|p| p.1).sum();
            let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();
            let (mut left_sum, mut left_sq) = (0.0, 0.0);

            for i in 1..n {
                let y_prev = pairs[i - 1].1;
                left_sum += y_prev;
                left_sq += y_prev * y_prev;

                if i < min_leaf || n - i < min_leaf || pairs[i - 1].0 == pairs[i].0 {
                    continue;
                }
                let (nl, nr) = (i as f64, (n - i) as f64);
                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse_left = left_sq - left_sum * left_sum / nl;
                let sse_right = right_sq - right_sum * right_sum / nr;
                let gain = node_sse - sse_left - sse_right;

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (pairs[i - 1].0 + pairs[i].0) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_depth: usize) -> ForestParams {
        ForestParams {
            n_trees: 1,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_step_function_is_learned_exactly() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i), 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let sample: Vec<usize> = (0..20).collect();
        let (tree, imp) = RegressionTree::fit(&x, &y, &sample, &params(5));

        assert_eq!(tree.predict(&[3.0, 0.0]), 1.0);
        assert_eq!(tree.predict(&[15.0, 0.0]), 5.0);
        assert_eq!(tree.node_count(), 3);
        assert!(imp[0] > 0.0);
        assert_eq!(imp[1], 0.0);
    }

    #[test]
    fn test_depth_limit_respected() {
        let x: Vec<Vec<f64>> = (0..64).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..64).map(f64::from).collect();
        let sample: Vec<usize> = (0..64).collect();
        let (tree, _) = RegressionTree::fit(&x, &y, &sample, &params(3));
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![4.0, 4.0, 4.0];
        let (tree, imp) = RegressionTree::fit(&x, &y, &[0, 1, 2], &params(10));
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[100.0]), 4.0);
        assert_eq!(imp, vec![0.0]);
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![f64::from(i % 7), f64::from(i)]).collect();
        let y: Vec<f64> = (0..30).map(|i| f64::from(i % 7) * 2.0 + 1.0).collect();
        let sample: Vec<usize> = (0..30).collect();
        let (tree, _) = RegressionTree::fit(&x, &y, &sample, &params(6));
        let json = serde_json::to_string(&tree).unwrap();
        let back: RegressionTree = serde_json::from_str(&json).unwrap();
        for row in &x {
            assert_eq!(tree.predict(row), back.predict(row));
        }
    }
}
