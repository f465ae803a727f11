//! Analysis configuration.
//!
//! Every tunable constant of the decoding analysis lives in one of the
//! structs below.  All fields are `pub` and every struct implements
//! [`Default`] with the values used for the bocotilt analysis, so a
//! one-off change reads:
//!
//! ```
//! use eeg_decoding::DecodeConfig;
//!
//! let cfg = DecodeConfig {
//!     n_iterations: 20,
//!     bin_size:     5,
//!     ..DecodeConfig::default()
//! };
//! assert_eq!(cfg.temporal_smoothing, 3);
//! ```
use anyhow::{ensure, Result};

use crate::classify::ClassifierKind;

/// How the per-subject epoch files are found and interpreted.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Sampling rate of the stored epochs in Hz.
    ///
    /// The MAT files carry no sampling-rate variable, so it is fixed here.
    ///
    /// Default: `200.0` Hz.
    pub sfreq: f64,

    /// Time of the first sample of every epoch, in seconds relative to the
    /// cue onset.
    ///
    /// Default: `-1.0` s.
    pub tmin: f64,

    /// File-name suffix that marks a cleaned dataset.
    ///
    /// Default: `"cleaned.set"`.
    pub suffix: String,

    /// Name of the channel label file inside the input directory.
    ///
    /// Default: `"channel_labels.txt"`.
    pub channel_label_file: String,

    /// Channel renames applied after reading the labels.
    ///
    /// The recording uses `O9`/`O10` for the positions the 10-05 system
    /// calls `OI1`/`OI2`.
    pub channel_renames: Vec<(String, String)>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            sfreq: 200.0,
            tmin: -1.0,
            suffix: "cleaned.set".into(),
            channel_label_file: "channel_labels.txt".into(),
            channel_renames: vec![
                ("O9".into(), "OI1".into()),
                ("O10".into(), "OI2".into()),
            ],
        }
    }
}

/// Parameters of the time-resolved decoding loop.
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Number of undersample → bin → cross-validate repetitions per
    /// timepoint.  Accuracy and importances are averaged over all folds of
    /// all iterations.
    ///
    /// Default: `10`.
    pub n_iterations: usize,

    /// Number of single trials averaged into one pseudo-trial.
    ///
    /// Default: `10`.
    pub bin_size: usize,

    /// Width (in samples) of the moving window averaged into each feature
    /// timepoint.  The output has `T - temporal_smoothing + 1` timepoints.
    ///
    /// Default: `3`.
    pub temporal_smoothing: usize,

    /// Classifier fitted on every fold.
    ///
    /// Default: [`ClassifierKind::Forest`].
    pub classifier: ClassifierKind,

    /// Standardise and PCA-compress the balanced trials before binning.
    ///
    /// Default: `false`.
    pub reduce: bool,

    /// Fraction of variance retained by the PCA step when
    /// [`reduce`](Self::reduce) is set.
    ///
    /// Default: `0.9`.
    pub pca_variance: f64,

    /// Base seed.  Timepoint `t` draws from an RNG seeded with
    /// `seed + t`, so results do not depend on the thread count.
    ///
    /// Default: `42`.
    pub seed: u64,

    /// Worker threads for the timepoint loop.  `0` uses the global rayon
    /// pool.
    ///
    /// Default: `0`.
    pub n_jobs: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            n_iterations: 10,
            bin_size: 10,
            temporal_smoothing: 3,
            classifier: ClassifierKind::Forest,
            reduce: false,
            pca_variance: 0.9,
            seed: 42,
            n_jobs: 0,
        }
    }
}

impl DecodeConfig {
    /// Reject settings under which accuracies would be undefined.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.n_iterations >= 1, "n_iterations must be at least 1, got {}", self.n_iterations);
        ensure!(self.bin_size >= 1, "bin_size must be at least 1, got {}", self.bin_size);
        ensure!(
            self.temporal_smoothing >= 1,
            "temporal_smoothing must be at least 1, got {}",
            self.temporal_smoothing
        );
        ensure!(
            self.pca_variance > 0.0 && self.pca_variance <= 1.0,
            "pca_variance must lie in (0, 1], got {}",
            self.pca_variance
        );
        Ok(())
    }
}

/// A named frequency band with inclusive edges in Hz.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub lo: f64,
    pub hi: f64,
}

impl Band {
    pub fn new(name: &str, lo: f64, hi: f64) -> Self {
        Self { name: name.into(), lo, hi }
    }

    pub fn center(&self) -> f64 {
        (self.lo + self.hi) / 2.0
    }
}

/// Time-frequency (ERSP) feature extraction.
#[derive(Debug, Clone)]
pub struct TfConfig {
    /// Number of wavelet frequencies, linearly spaced between
    /// [`fmin`](Self::fmin) and [`fmax`](Self::fmax).
    ///
    /// Default: `50`.
    pub n_freqs: usize,
    /// Default: `2.0` Hz.
    pub fmin: f64,
    /// Default: `30.0` Hz.
    pub fmax: f64,
    /// Cycles at the lowest frequency; linearly increasing to
    /// [`cycles_max`](Self::cycles_max).
    ///
    /// Default: `3.0`.
    pub cycles_min: f64,
    /// Default: `12.0`.
    pub cycles_max: f64,
    /// Keep every `decim`-th sample of the power estimate.
    ///
    /// Default: `4` (200 Hz → 50 Hz).
    pub decim: usize,
    /// Analysis window after the transform, in seconds (inclusive).
    ///
    /// Default: `(-0.6, 1.6)`.
    pub crop: (f64, f64),
    /// Bands averaged into features, in order.
    ///
    /// Default: delta 2–3, theta 4–7, alpha 8–12, beta 13–31 Hz.
    pub bands: Vec<Band>,
    /// Channels entering the transform, in feature order.
    pub picks: Vec<String>,
}

impl Default for TfConfig {
    fn default() -> Self {
        Self {
            n_freqs: 50,
            fmin: 2.0,
            fmax: 30.0,
            cycles_min: 3.0,
            cycles_max: 12.0,
            decim: 4,
            crop: (-0.6, 1.6),
            bands: vec![
                Band::new("delta", 2.0, 3.0),
                Band::new("theta", 4.0, 7.0),
                Band::new("alpha", 8.0, 12.0),
                Band::new("beta", 13.0, 31.0),
            ],
            picks: [
                "Fz", "F3", "F4", "Cz", "C3", "C4", "C5", "C6", "Pz", "P3", "P4", "P5", "P6",
                "OI1", "OI2", "POz", "PO3", "PO4", "PO7", "PO8",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl TfConfig {
    /// Wavelet centre frequencies.
    pub fn freqs(&self) -> Vec<f64> {
        crate::tfr::linspace(self.fmin, self.fmax, self.n_freqs)
    }

    /// Cycles per frequency, paired with [`freqs`](Self::freqs).
    pub fn cycles(&self) -> Vec<f64> {
        crate::tfr::linspace(self.cycles_min, self.cycles_max, self.n_freqs)
    }
}

/// Voltage time-course (ERP) feature extraction.
#[derive(Debug, Clone)]
pub struct ErpConfig {
    /// Decimation factor applied to the epochs (no anti-alias filter).
    ///
    /// Default: `2` (200 Hz → 100 Hz).
    pub decim: usize,
    /// Analysis window in seconds (inclusive).
    ///
    /// Default: `(-0.2, 1.6)`.
    pub crop: (f64, f64),
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self { decim: 2, crop: (-0.2, 1.6) }
    }
}

/// Across-subject statistics.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Moving-average window applied to each subject's accuracy curve.
    ///
    /// Default: `5`.
    pub smoothing: usize,
    /// Cluster-forming threshold on the F statistic.
    ///
    /// Default: `6.0`.
    pub threshold: f64,
    /// Default: `1000`.
    pub n_permutations: usize,
    /// `1` upper tail, `-1` lower tail, `0` both.
    ///
    /// Default: `1`.
    pub tail: i8,
    /// Cluster p-value at or below which a cluster counts as significant.
    ///
    /// Default: `0.05`.
    pub alpha: f64,
    /// Default: `42`.
    pub seed: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            smoothing: 5,
            threshold: 6.0,
            n_permutations: 1000,
            tail: 1,
            alpha: 0.05,
            seed: 42,
        }
    }
}
