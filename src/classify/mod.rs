//! Binary classifiers used inside the decoding loop.
//!
//! - [`forest`]: random forest of CART trees with impurity importances,
//!   matching `sklearn.ensemble.RandomForestClassifier` defaults.
//! - [`svm`]: linear support vector machine (`SVC(kernel="linear")`).
//! - [`logistic`]: L2-regularised logistic regression
//!   (`LogisticRegression()`).
//!
//! Labels are always `0`/`1` (`u8`); see [`crate::resample::class_labels`].
pub mod forest;
pub mod logistic;
pub mod svm;

use anyhow::Result;
use ndarray::{Array1, ArrayView1, ArrayView2};

pub use forest::RandomForest;
pub use logistic::LogisticRegression;
pub use svm::LinearSvm;

/// A binary classifier fitted from scratch on every fold.
pub trait Classifier: Send {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<()>;

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<u8>;

    /// Non-negative per-feature importances summing to 1, if the model
    /// exposes them.
    fn feature_importances(&self) -> Option<Array1<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ClassifierKind {
    /// Random forest, 100 trees.
    Forest,
    /// Linear SVM, C = 1.
    Svm,
    /// L2 logistic regression, C = 1.
    Logistic,
}

impl ClassifierKind {
    pub fn build(self) -> Box<dyn Classifier> {
        match self {
            Self::Forest => Box::new(RandomForest::default()),
            Self::Svm => Box::new(LinearSvm::default()),
            Self::Logistic => Box::new(LogisticRegression::default()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forest => "forest",
            Self::Svm => "svm",
            Self::Logistic => "logistic",
        }
    }
}

/// Fraction of matching labels; `NaN` for empty input.
pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    hits as f64 / y_true.len() as f64
}

/// `|w| / Σ|w|`, or all zeros when `w` vanishes.
pub(crate) fn normalised_abs(w: ArrayView1<'_, f64>) -> Array1<f64> {
    let abs = w.mapv(f64::abs);
    let total = abs.sum();
    if total > 0.0 {
        abs / total
    } else {
        abs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert!(accuracy(&[], &[]).is_nan());
    }

    #[test]
    fn normalised_abs_sums_to_one() {
        let w = normalised_abs(array![-1.0, 3.0].view());
        assert_eq!(w.to_vec(), vec![0.25, 0.75]);
        assert_eq!(normalised_abs(array![0.0, 0.0].view()).sum(), 0.0);
    }

    /// Two well separated blobs along feature 0; feature 1 is noise.
    pub(crate) fn blobs(n_per_class: usize) -> (Array2<f64>, Array1<u8>) {
        let n = 2 * n_per_class;
        let x = Array2::from_shape_fn((n, 2), |(r, c)| {
            let class = (r >= n_per_class) as u8 as f64;
            let jitter = ((r * 13 + c * 7) as f64).sin() * 0.5;
            if c == 0 { class * 4.0 - 2.0 + jitter } else { jitter * 2.0 }
        });
        let y = (0..n).map(|r| u8::from(r >= n_per_class)).collect();
        (x, y)
    }

    #[test]
    fn every_kind_separates_blobs() {
        let (x, y) = blobs(20);
        for kind in [ClassifierKind::Forest, ClassifierKind::Svm, ClassifierKind::Logistic] {
            let mut clf = kind.build();
            clf.fit(x.view(), y.view()).unwrap();
            let pred = clf.predict(x.view());
            let acc = accuracy(y.as_slice().unwrap(), &pred);
            assert!(acc >= 0.95, "{}: accuracy {acc}", kind.as_str());
            let imp = clf.feature_importances().unwrap();
            approx::assert_abs_diff_eq!(imp.sum(), 1.0, epsilon = 1e-9);
            assert!(imp[0] > imp[1], "{}: importances {imp}", kind.as_str());
        }
    }
}
