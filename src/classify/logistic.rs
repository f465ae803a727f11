//! L2-regularised logistic regression.
//!
//! Minimises `½‖w‖² + C Σ log(1 + exp(-ỹᵢ (w·xᵢ + b)))` with Newton steps
//! (IRLS).  The intercept is not penalised.  Each Newton system is solved
//! with [`crate::linalg::cholesky_solve`]; a halving line search keeps the
//! objective monotone.
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::{normalised_abs, Classifier};
use crate::error::DecodeError;
use crate::linalg::cholesky_solve;

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub c: f64,
    pub tol: f64,
    pub max_iter: usize,
    w: Array1<f64>,
    b: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self { c: 1.0, tol: 1e-8, max_iter: 100, w: Array1::zeros(0), b: 0.0 }
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `log(1 + exp(z))` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

impl LogisticRegression {
    pub fn weights(&self) -> (&Array1<f64>, f64) {
        (&self.w, self.b)
    }

    /// Probability of class 1 for every row.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        (x.dot(&self.w) + self.b).mapv(sigmoid)
    }
}

/// Objective for parameters `theta = [w; b]`.
fn objective(xa: &Array2<f64>, y: &Array1<f64>, theta: &Array1<f64>, c: f64) -> f64 {
    let p = theta.len() - 1;
    let z = xa.dot(theta);
    let loss: f64 = z.iter().zip(y).map(|(&zi, &yi)| softplus(zi) - yi * zi).sum();
    let reg: f64 = theta.iter().take(p).map(|v| v * v).sum::<f64>() * 0.5;
    reg + c * loss
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<()> {
        let (n, p) = x.dim();
        if y.len() != n {
            return Err(DecodeError::ShapeMismatch { what: "logistic samples", left: n, right: y.len() }.into());
        }
        // design matrix with a trailing column of ones for the intercept
        let mut xa = Array2::<f64>::ones((n, p + 1));
        xa.slice_mut(ndarray::s![.., ..p]).assign(&x);
        let yf = y.mapv(f64::from);

        let mut theta = Array1::<f64>::zeros(p + 1);
        let mut obj = objective(&xa, &yf, &theta, self.c);
        for _ in 0..self.max_iter {
            let prob = xa.dot(&theta).mapv(sigmoid);
            let mut grad = xa.t().dot(&(&prob - &yf)) * self.c;
            for j in 0..p {
                grad[j] += theta[j];
            }

            let s = prob.mapv(|q| (q * (1.0 - q)).max(1e-12) * self.c);
            let weighted = &xa * &s.view().insert_axis(ndarray::Axis(1));
            let mut hess = xa.t().dot(&weighted);
            for j in 0..p {
                hess[[j, j]] += 1.0;
            }
            let step = cholesky_solve(&hess, &grad)?;

            let mut t = 1.0;
            let mut accepted = false;
            for _ in 0..30 {
                let cand = &theta - &(&step * t);
                let cand_obj = objective(&xa, &yf, &cand, self.c);
                if cand_obj <= obj {
                    theta = cand;
                    obj = cand_obj;
                    accepted = true;
                    break;
                }
                t *= 0.5;
            }
            let size = step.iter().fold(0.0_f64, |m, v| m.max(v.abs())) * t;
            if !accepted || size < self.tol {
                break;
            }
        }

        self.w = theta.slice(ndarray::s![..p]).to_owned();
        self.b = theta[p];
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<u8> {
        self.predict_proba(x).iter().map(|&q| u8::from(q > 0.5)).collect()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        Some(normalised_abs(self.w.view()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(800.0), 1.0);
        assert_eq!(sigmoid(-800.0), 0.0);
        approx::assert_abs_diff_eq!(softplus(800.0), 800.0);
        approx::assert_abs_diff_eq!(softplus(0.0), 2.0_f64.ln(), epsilon = 1e-15);
    }

    #[test]
    fn gradient_vanishes_at_optimum() {
        let x = array![[0.5, 1.0], [1.5, -0.5], [-1.0, 0.3], [-0.2, -1.2], [2.0, 0.1], [0.1, 0.9]];
        let y = array![1u8, 1, 0, 0, 1, 0];
        let mut lr = LogisticRegression::default();
        lr.fit(x.view(), y.view()).unwrap();
        let (w, b) = lr.weights();
        let prob = lr.predict_proba(x.view());
        let resid = &prob - &y.mapv(f64::from);
        let grad_w = x.t().dot(&resid) + w;
        for g in grad_w.iter() {
            approx::assert_abs_diff_eq!(*g, 0.0, epsilon = 1e-6);
        }
        approx::assert_abs_diff_eq!(resid.sum(), 0.0, epsilon = 1e-6);
        assert!(b.is_finite());
    }
}
