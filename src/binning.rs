//! Pseudo-trials: averages of consecutive single trials of one class.
use anyhow::Result;
use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};

use crate::error::DecodeError;

/// Average every `bin_size` consecutive rows; a trailing partial bin is
/// dropped.
pub fn bin_class(x: ArrayView2<'_, f64>, bin_size: usize) -> Array2<f64> {
    let n_bins = if bin_size == 0 { 0 } else { x.nrows() / bin_size };
    let mut out = Array2::<f64>::zeros((n_bins, x.ncols()));
    for (b, mut row) in out.rows_mut().into_iter().enumerate() {
        let chunk = x.slice(s![b * bin_size..(b + 1) * bin_size, ..]);
        if let Some(mean) = chunk.mean_axis(Axis(0)) {
            row.assign(&mean);
        }
    }
    out
}

/// Binned pseudo-trials of both classes, one row per bin.
#[derive(Debug, Clone)]
pub struct BinnedPair {
    pub class0: Array2<f64>,
    pub class1: Array2<f64>,
}

/// One leave-one-bin-out split.
#[derive(Debug, Clone)]
pub struct Fold {
    pub x_train: Array2<f64>,
    pub y_train: Array1<u8>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<u8>,
}

impl BinnedPair {
    /// Bin each class. Both classes are expected to hold the same number
    /// of trials (after undersampling); at least two bins are required so
    /// that every fold has training data.
    pub fn new(
        x0: ArrayView2<'_, f64>,
        x1: ArrayView2<'_, f64>,
        bin_size: usize,
    ) -> Result<Self> {
        let n_per_class = x0.nrows().min(x1.nrows());
        let class0 = bin_class(x0, bin_size);
        let class1 = bin_class(x1, bin_size);
        let n_bins = class0.nrows().min(class1.nrows());
        if n_bins < 2 {
            return Err(DecodeError::TooFewTrials { n_per_class, bin_size, n_bins }.into());
        }
        Ok(Self {
            class0: class0.slice(s![..n_bins, ..]).to_owned(),
            class1: class1.slice(s![..n_bins, ..]).to_owned(),
        })
    }

    pub fn n_bins(&self) -> usize {
        self.class0.nrows()
    }

    /// Hold out bin `i` of both classes; train on the rest.
    pub fn fold(&self, i: usize) -> Fold {
        let n = self.n_bins();
        let others: Vec<usize> = (0..n).filter(|&b| b != i).collect();
        let x_train = concatenate![
            Axis(0),
            self.class0.select(Axis(0), &others),
            self.class1.select(Axis(0), &others)
        ];
        let y_train = std::iter::repeat(0u8)
            .take(others.len())
            .chain(std::iter::repeat(1u8).take(others.len()))
            .collect();
        let x_test = concatenate![
            Axis(0),
            self.class0.slice(s![i..i + 1, ..]),
            self.class1.slice(s![i..i + 1, ..])
        ];
        Fold { x_train, y_train, x_test, y_test: ndarray::array![0, 1] }
    }

    pub fn folds(&self) -> impl Iterator<Item = Fold> + '_ {
        (0..self.n_bins()).map(move |i| self.fold(i))
    }
}
