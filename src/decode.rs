//! Time-resolved decoding.
//!
//! For every timepoint of a [`FeatureSet`] and every iteration:
//!
//! ```text
//! trials [n, p], labels {0,1}
//!   │
//!   ├─ undersample      majority class reduced to minority count
//!   ├─ shuffle
//!   ├─ scale + PCA      only with DecodeConfig::reduce
//!   ├─ bin              bin_size trials → one pseudo-trial, per class
//!   └─ leave-one-bin-out
//!        fit on all other bins, predict the held-out pair
//! ```
//!
//! Accuracy and feature importances are averaged over every fold of every
//! iteration.  Timepoints run in parallel; each draws from its own RNG
//! seeded with `seed + t`, so results are independent of scheduling.
use anyhow::Result;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::binning::BinnedPair;
use crate::classify::{accuracy, normalised_abs};
use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::features::{subset_rows, FeatureSet};
use crate::normalize::StandardScaler;
use crate::pca::Pca;
use crate::resample::{class_labels, shuffle_rows, undersample_not_minority};
use crate::tasks::DecodingTask;
use crate::trialinfo::TrialInfo;

/// Outcome at a single timepoint.
#[derive(Debug, Clone)]
pub struct TimesliceResult {
    pub accuracy: f64,
    /// Mean importances over folds, `None` if the classifier has none.
    pub importances: Option<Array1<f64>>,
}

/// Outcome of one task for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingResult {
    pub id: String,
    pub decode_label: String,
    /// Accuracy per timepoint, `[T]`.
    pub acc: Array1<f64>,
    /// Feature importances, `[T, C, B]`.
    pub fmp: Option<Array3<f64>>,
    pub times: Vec<f64>,
    pub ch_names: Vec<String>,
    /// Band centre frequencies; empty for voltage features.
    pub freqs: Vec<f64>,
}

/// Decode one `[trials, features]` matrix.
pub fn decode_timeslice<R: Rng>(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, u8>,
    cfg: &DecodeConfig,
    rng: &mut R,
) -> Result<TimesliceResult> {
    cfg.validate()?;
    let n_features = x.ncols();
    let mut acc_sum = 0.0;
    let mut imp_sum = Array1::<f64>::zeros(n_features);
    let mut has_importances = true;
    let mut n_folds = 0usize;

    for _ in 0..cfg.n_iterations {
        let (xb, yb) = undersample_not_minority(x, y, rng);
        let (xs, ys) = shuffle_rows(&xb, &yb, rng);

        let (xs, pca) = if cfg.reduce {
            let (_, scaled) = StandardScaler::fit_transform(xs.view());
            let pca = Pca::fit(scaled.view(), cfg.pca_variance)?;
            (pca.transform(scaled.view()), Some(pca))
        } else {
            (xs, None)
        };

        let x0 = split_class(&xs, &ys, 0);
        let x1 = split_class(&xs, &ys, 1);
        let pair = BinnedPair::new(x0.view(), x1.view(), cfg.bin_size)?;

        for fold in pair.folds() {
            let mut clf = cfg.classifier.build();
            clf.fit(fold.x_train.view(), fold.y_train.view())?;
            let pred = clf.predict(fold.x_test.view());
            acc_sum += accuracy(fold.y_test.as_slice().unwrap_or(&[]), &pred);
            n_folds += 1;

            match clf.feature_importances() {
                Some(imp) => {
                    let imp = match &pca {
                        Some(pca) => normalised_abs(pca.back_project(&imp).view()),
                        None => imp,
                    };
                    imp_sum += &imp;
                }
                None => has_importances = false,
            }
        }
    }

    let n = n_folds as f64;
    Ok(TimesliceResult {
        accuracy: acc_sum / n,
        importances: has_importances.then(|| imp_sum / n),
    })
}

fn split_class(x: &Array2<f64>, y: &Array1<u8>, class: u8) -> Array2<f64> {
    let mask: Vec<bool> = y.iter().map(|&v| v == class).collect();
    subset_rows(x.view(), &mask)
}

/// Decode `task` at every timepoint of `features`.
///
/// Errors with [`DecodeError::ClassCount`] or [`DecodeError::TooFewTrials`]
/// before any work is done when the selected trials cannot be decoded.
pub fn decode_task(
    id: &str,
    features: &FeatureSet,
    info: &TrialInfo,
    task: &DecodingTask,
    cfg: &DecodeConfig,
) -> Result<DecodingResult> {
    cfg.validate()?;
    if info.n_trials() != features.n_trials() {
        return Err(DecodeError::ShapeMismatch {
            what: "trialinfo vs feature trials",
            left: info.n_trials(),
            right: features.n_trials(),
        }
        .into());
    }
    let mask = task.trial_mask(info);
    let y = class_labels(info.labels(task.y_col, &mask).view())?;
    let n1 = y.iter().filter(|&&v| v == 1).count();
    let n_per_class = n1.min(y.len() - n1);
    let n_bins = n_per_class / cfg.bin_size;
    if n_bins < 2 {
        return Err(DecodeError::TooFewTrials { n_per_class, bin_size: cfg.bin_size, n_bins }.into());
    }
    debug!(task = %task.label, trials = y.len(), n_per_class, "decoding");

    let run = || {
        (0..features.n_times())
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(t as u64));
                let x = subset_rows(features.matrices[t].view(), &mask);
                decode_timeslice(x.view(), y.view(), cfg, &mut rng)
            })
            .collect::<Result<Vec<_>>>()
    };
    let slices = if cfg.n_jobs > 0 {
        rayon::ThreadPoolBuilder::new().num_threads(cfg.n_jobs).build()?.install(run)?
    } else {
        run()?
    };

    let acc: Array1<f64> = slices.iter().map(|s| s.accuracy).collect();
    let fmp = stack_importances(&slices, features)?;

    Ok(DecodingResult {
        id: id.to_string(),
        decode_label: task.label.clone(),
        acc,
        fmp,
        times: features.times.clone(),
        ch_names: features.ch_names.clone(),
        freqs: features.freqs.clone(),
    })
}

/// `[T, C·B]` importances reshaped to `[T, C, B]`.
fn stack_importances(slices: &[TimesliceResult], features: &FeatureSet) -> Result<Option<Array3<f64>>> {
    let n_t = slices.len();
    let n_f = features.n_features();
    let mut flat = Array2::<f64>::zeros((n_t, n_f));
    for (mut row, s) in flat.axis_iter_mut(Axis(0)).zip(slices) {
        match &s.importances {
            Some(imp) if imp.len() == n_f => row.assign(imp),
            Some(imp) => {
                return Err(DecodeError::ShapeMismatch {
                    what: "importances vs features",
                    left: imp.len(),
                    right: n_f,
                }
                .into())
            }
            None => return Ok(None),
        }
    }
    Ok(Some(flat.into_shape_with_order((n_t, features.ch_names.len(), features.n_bands))?))
}
