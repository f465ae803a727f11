//! Random forest of CART trees.
//!
//! Defaults follow `sklearn.ensemble.RandomForestClassifier(n_estimators=100,
//! random_state=42)`: bootstrap resampling, Gini impurity, `sqrt(p)`
//! candidate features per split (constant features do not count towards
//! that budget), unlimited depth, `min_samples_split = 2`,
//! `min_samples_leaf = 1`.  Predictions average leaf class probabilities
//! over trees; importances are the mean decrease in impurity.
use anyhow::Result;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::Classifier;
use crate::error::DecodeError;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        p1: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Default)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict_proba(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { p1 } => return p1,
                Node::Split { feature, threshold, left, right } => {
                    id = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    pub n_trees: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
    trees: Vec<Tree>,
    importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_trees: 100,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
            trees: Vec::new(),
            importances: None,
        }
    }
}

/// Gini impurity of a node with `c0` and `c1` samples.
fn gini(c0: usize, c1: usize) -> f64 {
    let n = (c0 + c1) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = c0 as f64 / n;
    let p1 = c1 as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity `(n_l·G_l + n_r·G_r) / n`.
    child_impurity: f64,
}

/// Per-tree growing state.
struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, u8>,
    max_features: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    n_total: f64,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl Grower<'_> {
    fn grow<R: Rng>(&mut self, idx: &mut [usize], rng: &mut R) -> usize {
        let n = idx.len();
        let c1 = idx.iter().filter(|&&i| self.y[i] == 1).count();
        let c0 = n - c1;
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { p1: c1 as f64 / n as f64 });

        if n < self.min_samples_split || n < 2 * self.min_samples_leaf || c0 == 0 || c1 == 0 {
            return id;
        }
        let Some(best) = self.best_split(idx, c0, c1, rng) else {
            return id;
        };

        let parent = gini(c0, c1);
        self.importances[best.feature] += n as f64 / self.n_total * (parent - best.child_impurity);

        let f = best.feature;
        idx.sort_by(|&a, &b| self.x[[a, f]].total_cmp(&self.x[[b, f]]));
        let n_left = idx.partition_point(|&i| self.x[[i, f]] <= best.threshold);
        let (left_idx, right_idx) = idx.split_at_mut(n_left);
        let left = self.grow(left_idx, rng);
        let right = self.grow(right_idx, rng);
        self.nodes[id] = Node::Split { feature: f, threshold: best.threshold, left, right };
        id
    }

    fn best_split<R: Rng>(&self, idx: &[usize], c0: usize, c1: usize, rng: &mut R) -> Option<BestSplit> {
        let n = idx.len();
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let mut best: Option<BestSplit> = None;
        let mut visited = 0;
        let mut order = idx.to_vec();
        for f in features {
            if visited >= self.max_features {
                break;
            }
            order.sort_by(|&a, &b| self.x[[a, f]].total_cmp(&self.x[[b, f]]));
            let first = self.x[[order[0], f]];
            let last = self.x[[order[n - 1], f]];
            if first == last {
                continue;
            }
            visited += 1;

            let (mut l0, mut l1) = (0usize, 0usize);
            for k in 1..n {
                if self.y[order[k - 1]] == 1 {
                    l1 += 1;
                } else {
                    l0 += 1;
                }
                let lo = self.x[[order[k - 1], f]];
                let hi = self.x[[order[k], f]];
                if lo == hi || k < self.min_samples_leaf || n - k < self.min_samples_leaf {
                    continue;
                }
                let (r0, r1) = (c0 - l0, c1 - l1);
                let child = (k as f64 * gini(l0, l1) + (n - k) as f64 * gini(r0, r1)) / n as f64;
                if best.as_ref().map_or(true, |b| child < b.child_impurity) {
                    let mid = 0.5 * (lo + hi);
                    let threshold = if mid >= hi { lo } else { mid };
                    best = Some(BestSplit { feature: f, threshold, child_impurity: child });
                }
            }
        }
        best
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<()> {
        let (n, p) = x.dim();
        if y.len() != n {
            return Err(DecodeError::ShapeMismatch { what: "forest samples", left: n, right: y.len() }.into());
        }
        self.trees.clear();
        self.importances = None;
        if n == 0 || p == 0 {
            return Ok(());
        }

        let max_features = ((p as f64).sqrt() as usize).max(1);
        let mut master = StdRng::seed_from_u64(self.seed);
        let mut total = vec![0.0; p];
        let mut n_informative = 0usize;

        for _ in 0..self.n_trees {
            let mut rng = StdRng::seed_from_u64(master.gen());
            let mut idx: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut grower = Grower {
                x: x.view(),
                y: y.view(),
                max_features,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                n_total: n as f64,
                nodes: Vec::new(),
                importances: vec![0.0; p],
            };
            grower.grow(&mut idx, &mut rng);

            let sum: f64 = grower.importances.iter().sum();
            if sum > 0.0 {
                n_informative += 1;
                for (t, v) in total.iter_mut().zip(&grower.importances) {
                    *t += v / sum;
                }
            }
            self.trees.push(Tree { nodes: grower.nodes });
        }

        let mut imp = Array1::from(total);
        if n_informative > 0 {
            imp /= n_informative as f64;
            let s = imp.sum();
            if s > 0.0 {
                imp /= s;
            }
        }
        self.importances = Some(imp);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<u8> {
        if self.trees.is_empty() {
            return vec![0; x.nrows()];
        }
        x.rows()
            .into_iter()
            .map(|row| {
                let p1: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum::<f64>()
                    / self.trees.len() as f64;
                u8::from(p1 > 0.5)
            })
            .collect()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn gini_of_pure_and_mixed_nodes() {
        assert_eq!(gini(5, 0), 0.0);
        assert_eq!(gini(3, 3), 0.5);
    }

    #[test]
    fn single_tree_fits_training_data() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [10.0], [11.0]];
        let y = array![0u8, 0, 1, 0, 1, 1];
        let mut grower = Grower {
            x: x.view(),
            y: y.view(),
            max_features: 1,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_total: 6.0,
            nodes: Vec::new(),
            importances: vec![0.0],
        };
        let mut idx: Vec<usize> = (0..6).collect();
        grower.grow(&mut idx, &mut StdRng::seed_from_u64(0));
        let tree = Tree { nodes: grower.nodes };
        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            assert_eq!(tree.predict_proba(row), label as f64);
        }
        approx::assert_abs_diff_eq!(grower.importances[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn same_seed_same_forest() {
        let x = Array2::from_shape_fn((40, 6), |(r, c)| ((r * 31 + c * 17) as f64).sin());
        let y: Array1<u8> = (0..40).map(|r| u8::from(x[[r, 2]] > 0.0)).collect();
        let mut a = RandomForest::default();
        let mut b = RandomForest::default();
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a.feature_importances(), b.feature_importances());
        let imp = a.feature_importances().unwrap();
        let top = imp.iter().enumerate().max_by(|l, r| l.1.total_cmp(r.1)).map(|(i, _)| i);
        assert_eq!(top, Some(2));
    }

    #[test]
    fn constant_labels_give_zero_importances() {
        let x = Array2::from_shape_fn((10, 3), |(r, c)| (r + c) as f64);
        let y = Array1::<u8>::zeros(10);
        let mut rf = RandomForest { n_trees: 5, ..RandomForest::default() };
        rf.fit(x.view(), y.view()).unwrap();
        assert_eq!(rf.feature_importances().unwrap().sum(), 0.0);
        assert_eq!(rf.predict(x.view()), vec![0; 10]);
    }
}
