//! Principal component analysis with a variance target.
//!
//! Matches `sklearn.decomposition.PCA(n_components=<fraction>,
//! svd_solver="full")`: the number of components is the smallest `k`
//! whose cumulative explained-variance ratio exceeds the fraction
//! (`searchsorted(cumsum, fraction, side="right") + 1`).
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::linalg::jacobi_eigen;

#[derive(Debug, Clone)]
pub struct Pca {
    pub mean: Array1<f64>,
    /// [features, k]; column `j` is component `j`.
    pub components: Array2<f64>,
    pub explained_variance_ratio: Array1<f64>,
}

impl Pca {
    pub fn fit(x: ArrayView2<'_, f64>, variance: f64) -> Result<Self> {
        let (n, p) = x.dim();
        if n < 2 {
            bail!("PCA needs at least 2 samples, got {n}");
        }
        if !(0.0..=1.0).contains(&variance) {
            bail!("variance fraction must lie in [0, 1], got {variance}");
        }
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
        let centred = &x - &mean;
        let cov = centred.t().dot(&centred) / (n - 1) as f64;
        let eig = jacobi_eigen(&cov)?;

        let values = eig.values.mapv(|v| v.max(0.0));
        let total: f64 = values.sum();
        let ratio = if total > 0.0 {
            values / total
        } else {
            Array1::from_elem(p, 1.0 / p as f64)
        };

        let mut cum = 0.0;
        let below = ratio
            .iter()
            .take_while(|&&r| {
                cum += r;
                cum <= variance
            })
            .count();
        let k = (below + 1).min(p).min(n);

        Ok(Self {
            mean,
            components: eig.vectors.slice(ndarray::s![.., ..k]).to_owned(),
            explained_variance_ratio: ratio.slice(ndarray::s![..k]).to_owned(),
        })
    }

    /// Project `x` onto the retained components: `[n, k]`.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean).dot(&self.components)
    }

    /// Map weights over components back to weights over input features.
    pub fn back_project(&self, w: &Array1<f64>) -> Array1<f64> {
        self.components.dot(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_direction_is_first_component() {
        // variance mostly along (1, 1) / sqrt(2)
        let x = Array2::from_shape_fn((200, 2), |(r, c)| {
            let t = (r as f64 * 0.1).sin() * 10.0;
            let noise = ((r * 7 + c * 3) as f64).cos() * 0.1;
            t + noise
        });
        let pca = Pca::fit(x.view(), 0.9).unwrap();
        assert_eq!(pca.components.ncols(), 1);
        let c = pca.components.column(0);
        approx::assert_abs_diff_eq!(c[0].abs(), 0.5_f64.sqrt(), epsilon = 1e-2);
        approx::assert_abs_diff_eq!(c[1].abs(), 0.5_f64.sqrt(), epsilon = 1e-2);
        assert!(pca.explained_variance_ratio[0] > 0.99);
    }

    #[test]
    fn full_variance_keeps_all_components() {
        let x = Array2::from_shape_fn((20, 3), |(r, c)| ((r * (c + 2)) as f64).sin());
        let pca = Pca::fit(x.view(), 1.0).unwrap();
        assert_eq!(pca.components.ncols(), 3);
        assert_eq!(pca.transform(x.view()).dim(), (20, 3));
    }

    #[test]
    fn back_projection_has_feature_length() {
        let x = Array2::from_shape_fn((10, 4), |(r, c)| (r as f64 + 1.0) * (c as f64 - 1.5));
        let pca = Pca::fit(x.view(), 0.5).unwrap();
        let w = Array1::from_elem(pca.components.ncols(), 1.0);
        assert_eq!(pca.back_project(&w).len(), 4);
    }
}
