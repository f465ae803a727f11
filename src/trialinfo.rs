//! Per-trial behavioural table.
//!
//! One row per trial, 23 numeric columns as exported by the experiment
//! script.  Column indices are available as constants in [`col`].
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::DecodeError;

/// Column indices of the trial table.
pub mod col {
    pub const ID: usize = 0;
    pub const BLOCK_NR: usize = 1;
    pub const TRIAL_NR: usize = 2;
    pub const BONUSTRIAL: usize = 3;
    pub const TILT_TASK: usize = 4;
    pub const CUE_AX: usize = 5;
    pub const TARGET_RED_LEFT: usize = 6;
    pub const DISTRACTOR_RED_LEFT: usize = 7;
    pub const RESPONSE_INTERFERENCE: usize = 8;
    pub const TASK_SWITCH: usize = 9;
    pub const PREV_SWITCH: usize = 10;
    pub const PREV_ACCURACY: usize = 11;
    pub const CORRECT_RESPONSE: usize = 12;
    pub const RESPONSE_SIDE: usize = 13;
    pub const RT: usize = 14;
    pub const RT_THRESH_COLOR: usize = 15;
    pub const RT_THRESH_TILT: usize = 16;
    pub const ACCURACY: usize = 17;
    pub const POSITION_COLOR: usize = 18;
    pub const POSITION_TILT: usize = 19;
    pub const POSITION_TARGET: usize = 20;
    pub const POSITION_DISTRACTOR: usize = 21;
    pub const SEQUENCE_POSITION: usize = 22;

    /// Number of columns in a complete table.
    pub const N_COLS: usize = 23;
}

#[derive(Debug, Clone)]
pub struct TrialInfo {
    /// [trials, 23]
    pub table: Array2<f64>,
}

impl TrialInfo {
    pub fn new(table: Array2<f64>) -> Result<Self> {
        if table.ncols() < col::N_COLS {
            return Err(DecodeError::ShapeMismatch {
                what: "trialinfo columns",
                left: table.ncols(),
                right: col::N_COLS,
            }
            .into());
        }
        Ok(Self { table })
    }

    pub fn n_trials(&self) -> usize {
        self.table.nrows()
    }

    pub fn column(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.table.column(idx)
    }

    /// Recode target and distractor positions into two hemifield bins.
    ///
    /// Positions are numbered 1–8 counter-clockwise from the top right, so
    /// `floor((p - 1) / 4)` yields 0 for the right and 1 for the left half.
    pub fn recode_positions_hemifield(&mut self) {
        for c in [col::POSITION_TARGET, col::POSITION_DISTRACTOR] {
            self.table
                .column_mut(c)
                .mapv_inplace(|p| ((p - 1.0) / 4.0).floor());
        }
    }

    /// Trials entering the analysis: no practice blocks (`block_nr >= 5`),
    /// not the first trial of a sequence, and a left or right response.
    pub fn exclusion_mask(&self) -> Vec<bool> {
        self.table
            .rows()
            .into_iter()
            .map(|r| {
                r[col::BLOCK_NR] >= 5.0
                    && r[col::SEQUENCE_POSITION] > 1.0
                    && r[col::RESPONSE_SIDE] > -1.0
                    && r[col::RESPONSE_SIDE] < 2.0
            })
            .collect()
    }

    pub fn select(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.n_trials() {
            return Err(DecodeError::ShapeMismatch {
                what: "trial mask vs trialinfo",
                left: mask.len(),
                right: self.n_trials(),
            }
            .into());
        }
        let idx: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        Ok(Self { table: self.table.select(Axis(0), &idx) })
    }

    /// Values of column `idx` for the masked trials.
    pub fn labels(&self, idx: usize, mask: &[bool]) -> Array1<f64> {
        self.column(idx)
            .iter()
            .zip(mask)
            .filter_map(|(&v, &k)| k.then_some(v))
            .collect()
    }
}
