//! Linear support vector machine, hinge loss, `C = 1`.
//!
//! Solved in the dual by coordinate descent (Hsieh et al., 2008) with the
//! bias folded in as a constant feature.  The sweep order is fixed, so a
//! fit is fully deterministic.
use anyhow::Result;
use ndarray::{Array1, ArrayView1, ArrayView2};

use super::{normalised_abs, Classifier};
use crate::error::DecodeError;

#[derive(Debug, Clone)]
pub struct LinearSvm {
    pub c: f64,
    pub tol: f64,
    pub max_iter: usize,
    w: Array1<f64>,
    b: f64,
}

impl Default for LinearSvm {
    fn default() -> Self {
        Self { c: 1.0, tol: 1e-4, max_iter: 1000, w: Array1::zeros(0), b: 0.0 }
    }
}

impl LinearSvm {
    pub fn weights(&self) -> (&Array1<f64>, f64) {
        (&self.w, self.b)
    }

    fn decision(&self, row: ArrayView1<'_, f64>) -> f64 {
        row.dot(&self.w) + self.b
    }
}

impl Classifier for LinearSvm {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<()> {
        let (n, p) = x.dim();
        if y.len() != n {
            return Err(DecodeError::ShapeMismatch { what: "svm samples", left: n, right: y.len() }.into());
        }
        let sign: Vec<f64> = y.iter().map(|&v| if v == 1 { 1.0 } else { -1.0 }).collect();
        let q_diag: Vec<f64> = x.rows().into_iter().map(|r| r.dot(&r) + 1.0).collect();

        let mut alpha = vec![0.0; n];
        let mut w = Array1::<f64>::zeros(p);
        let mut b = 0.0;

        for _ in 0..self.max_iter {
            let mut pg_max = f64::NEG_INFINITY;
            let mut pg_min = f64::INFINITY;
            for i in 0..n {
                let xi = x.row(i);
                let g = sign[i] * (xi.dot(&w) + b) - 1.0;
                let pg = if alpha[i] <= 0.0 {
                    g.min(0.0)
                } else if alpha[i] >= self.c {
                    g.max(0.0)
                } else {
                    g
                };
                pg_max = pg_max.max(pg);
                pg_min = pg_min.min(pg);
                if pg.abs() > 1e-12 {
                    let old = alpha[i];
                    alpha[i] = (old - g / q_diag[i]).clamp(0.0, self.c);
                    let step = (alpha[i] - old) * sign[i];
                    w.scaled_add(step, &xi);
                    b += step;
                }
            }
            if n == 0 || pg_max - pg_min < self.tol {
                break;
            }
        }
        self.w = w;
        self.b = b;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<u8> {
        x.rows().into_iter().map(|r| u8::from(self.decision(r) > 0.0)).collect()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        Some(normalised_abs(self.w.view()))
    }
}
