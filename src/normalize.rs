//! Per-feature standardisation.
//!
//! [`StandardScaler`] matches `sklearn.preprocessing.StandardScaler`:
//!   μ_j = mean(x[:, j]),  σ_j = std(x[:, j]) (ddof = 0)
//!   x[:, j] = (x[:, j] - μ_j) / σ_j
//! Columns with σ_j = 0 are centred but not scaled.
use ndarray::{Array1, Array2, ArrayView2, Axis};

#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n_features = x.ncols();
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }

    pub fn fit_transform(x: ArrayView2<'_, f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(x);
        let out = scaler.transform(x);
        (scaler, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_have_zero_mean_unit_std() {
        let x = Array2::from_shape_fn((64, 5), |(r, c)| {
            (r as f64 * 0.37 + c as f64 * 1.3).sin() * (c + 1) as f64 * 20.0 + c as f64
        });
        let (_, z) = StandardScaler::fit_transform(x.view());
        for col in z.columns() {
            approx::assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-10);
            approx::assert_abs_diff_eq!(col.std(0.0), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn constant_column_is_only_centred() {
        let x = Array2::from_shape_fn((10, 2), |(r, c)| if c == 0 { 7.0 } else { r as f64 });
        let (scaler, z) = StandardScaler::fit_transform(x.view());
        assert_eq!(scaler.scale[0], 1.0);
        for &v in z.column(0) {
            approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
        }
    }
}
