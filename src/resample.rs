//! Class balancing by random undersampling.
//!
//! [`undersample_not_minority`] matches `imblearn.under_sampling.
//! RandomUnderSampler(sampling_strategy="not minority")`: every class except
//! the smallest is reduced, without replacement, to the size of the
//! smallest.  Rows come back grouped by class, so callers follow up with
//! [`shuffle_rows`] (`sklearn.utils.shuffle`).
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::error::DecodeError;

/// Map the two distinct values of `y` (ascending) to 0 and 1.
///
/// Errors unless `y` holds exactly two distinct values.
pub fn class_labels(y: ArrayView1<'_, f64>) -> Result<Array1<u8>> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    if classes.len() != 2 {
        return Err(DecodeError::ClassCount { found: classes.len() }.into());
    }
    Ok(y.mapv(|v| u8::from(v == classes[1])))
}

/// Undersample every non-minority class to the minority count.
///
/// Output rows are class 0 first, then class 1, each in original order.
pub fn undersample_not_minority<R: Rng + ?Sized>(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, u8>,
    rng: &mut R,
) -> (Array2<f64>, Array1<u8>) {
    let idx0: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 0).collect();
    let idx1: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 1).collect();
    let n_min = idx0.len().min(idx1.len());

    let mut keep = Vec::with_capacity(2 * n_min);
    for idx in [&idx0, &idx1] {
        if idx.len() == n_min {
            keep.extend_from_slice(idx);
        } else {
            let mut chosen: Vec<usize> = index::sample(rng, idx.len(), n_min)
                .into_iter()
                .map(|i| idx[i])
                .collect();
            chosen.sort_unstable();
            keep.extend(chosen);
        }
    }

    (x.select(Axis(0), &keep), keep.iter().map(|&i| y[i]).collect())
}

/// Shuffle rows of `x` and `y` with the same permutation.
pub fn shuffle_rows<R: Rng + ?Sized>(x: &Array2<f64>, y: &Array1<u8>, rng: &mut R) -> (Array2<f64>, Array1<u8>) {
    let mut perm: Vec<usize> = (0..x.nrows()).collect();
    perm.shuffle(rng);
    (x.select(Axis(0), &perm), perm.iter().map(|&i| y[i]).collect())
}
