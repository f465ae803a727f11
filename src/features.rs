//! Per-timepoint feature matrices.
//!
//! Both feature kinds are reshaped into one `[trials, features]` matrix per
//! output timepoint, after averaging a short moving window over time:
//!
//! ```text
//! ERP   [E, C, T]      → T - w + 1 matrices of [E, C]
//! ERSP  [E, C, B, T]   → T - w + 1 matrices of [E, C·B]   (channel-major)
//! ```
use anyhow::{bail, Result};
use ndarray::{s, Array2, Array3, Array4, ArrayView2, Axis};

/// Feature matrices for every output timepoint of one subject.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Time (s) of the first sample in each smoothing window.
    pub times: Vec<f64>,
    /// One `[trials, features]` matrix per entry of `times`.
    pub matrices: Vec<Array2<f64>>,
    pub ch_names: Vec<String>,
    /// Bands per channel; `1` for voltage features.
    pub n_bands: usize,
    /// Band centre frequencies, empty for voltage features.
    pub freqs: Vec<f64>,
}

impl FeatureSet {
    pub fn n_times(&self) -> usize {
        self.matrices.len()
    }

    pub fn n_trials(&self) -> usize {
        self.matrices.first().map_or(0, |m| m.nrows())
    }

    pub fn n_features(&self) -> usize {
        self.ch_names.len() * self.n_bands
    }
}

/// Voltage features from `[E, C, T]` data.
pub fn erp_features(data: &Array3<f64>, times: &[f64], ch_names: &[String], smoothing: usize) -> Result<FeatureSet> {
    let n_t = data.shape()[2];
    let n_out = output_len(n_t, times.len(), smoothing)?;

    let matrices = (0..n_out)
        .map(|t| {
            data.slice(s![.., .., t..t + smoothing])
                .mean_axis(Axis(2))
                .ok_or_else(|| anyhow::anyhow!("empty smoothing window"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureSet {
        times: times[..n_out].to_vec(),
        matrices,
        ch_names: ch_names.to_vec(),
        n_bands: 1,
        freqs: vec![],
    })
}

/// Band-power features from `[E, C, B, T]` data.
pub fn band_features(
    power: &Array4<f64>,
    times: &[f64],
    ch_names: &[String],
    freqs: &[f64],
    smoothing: usize,
) -> Result<FeatureSet> {
    let (n_e, n_c, n_b, n_t) = power.dim();
    let n_out = output_len(n_t, times.len(), smoothing)?;

    let matrices = (0..n_out)
        .map(|t| {
            let window = power
                .slice(s![.., .., .., t..t + smoothing])
                .mean_axis(Axis(3))
                .ok_or_else(|| anyhow::anyhow!("empty smoothing window"))?;
            Ok(window.as_standard_layout().into_owned().into_shape_with_order((n_e, n_c * n_b))?)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureSet {
        times: times[..n_out].to_vec(),
        matrices,
        ch_names: ch_names.to_vec(),
        n_bands: n_b,
        freqs: freqs.to_vec(),
    })
}

fn output_len(n_t: usize, n_times: usize, smoothing: usize) -> Result<usize> {
    if n_t != n_times {
        bail!("time axis has {n_t} samples but {n_times} time values");
    }
    if smoothing == 0 || smoothing > n_t {
        bail!("smoothing window {smoothing} does not fit {n_t} samples");
    }
    Ok(n_t - smoothing + 1)
}

/// Rows of `x` whose mask entry is `true`.
pub fn subset_rows(x: ArrayView2<'_, f64>, mask: &[bool]) -> Array2<f64> {
    let idx: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect();
    x.select(Axis(0), &idx)
}
