//! # eeg_decoding — time-resolved EEG decoding in pure Rust
//!
//! `eeg_decoding` runs the decoding analysis of the bocotilt task-switching
//! experiment: per subject and per timepoint, a classifier is trained to
//! tell two experimental conditions apart from the EEG, and the resulting
//! accuracy curves are compared across conditions with cluster-based
//! permutation statistics.
//!
//! ## Pipeline overview
//!
//! ```text
//! VPxx_cleaned.set   (MATLAB v5: data [C, T, E], trialinfo [E, 23])
//!   │
//!   ├─ dataset::load_subject()     MAT reader → Epochs + TrialInfo
//!   ├─ trial cleaning              position recode, exclusion mask
//!   ├─ ERP   decimate 2, crop -0.2 … 1.6 s
//!   │  ERSP  Morlet power 2–30 Hz, decim 4, crop -0.6 … 1.6 s, 4 bands
//!   ├─ features                    3-sample moving window → [E, F] per t
//!   ├─ decode (per t, parallel)    undersample → bin → leave-one-bin-out
//!   └─ {label}_{id}.safetensors    acc [T], fmp [T, C, B]
//!        │
//!        └─→ aggregate             smoothing, 2 × 2 cluster tests, JSON + SVG
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eeg_decoding::{run_all, PipelineConfig};
//! use std::path::Path;
//!
//! let cfg = PipelineConfig::default();
//! let summary = run_all(Path::new("data/cleaned"), Path::new("data/decoded"), &cfg).unwrap();
//! println!("{} results written", summary.written);
//! ```
//!
//! ## Decoding one matrix
//!
//! ```no_run
//! use eeg_decoding::{decode_timeslice, DecodeConfig};
//! use ndarray::{Array1, Array2};
//! use rand::SeedableRng;
//!
//! let x: Array2<f64> = Array2::zeros((80, 16)); // [trials, features]
//! let y: Array1<u8> = (0..80).map(|i| (i % 2) as u8).collect();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let res = decode_timeslice(x.view(), y.view(), &DecodeConfig::default(), &mut rng).unwrap();
//! println!("accuracy {:.3}", res.accuracy);
//! ```

pub mod aggregate;
pub mod binning;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod decode;
pub mod epochs;
pub mod error;
pub mod features;
pub mod io;
pub mod linalg;
pub mod normalize;
pub mod pca;
pub mod pipeline;
pub mod resample;
pub mod stats;
pub mod tasks;
pub mod tfr;
pub mod trialinfo;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `eeg_decoding::Foo` without having to know the internal module layout.

// config
pub use config::{Band, DatasetConfig, DecodeConfig, ErpConfig, StatsConfig, TfConfig};

// errors
pub use error::DecodeError;

// data
pub use dataset::{find_datasets, load_subject, read_channel_labels, subject_id, SubjectData};
pub use epochs::Epochs;
pub use trialinfo::TrialInfo;
pub use tasks::{erp_tasks, ersp_tasks, factorial_tasks, DecodingTask};

// features — time-frequency + windows
pub use features::{band_features, erp_features, FeatureSet};
pub use tfr::{band_average, morlet, tfr_power};

// decoding
pub use binning::{bin_class, BinnedPair};
pub use classify::{accuracy, Classifier, ClassifierKind, LinearSvm, LogisticRegression, RandomForest};
pub use decode::{decode_task, decode_timeslice, DecodingResult, TimesliceResult};
pub use normalize::StandardScaler;
pub use pca::Pca;
pub use resample::{class_labels, undersample_not_minority};

// driver
pub use pipeline::{prepare_subject, run_all, run_subject, FeatureKind, PipelineConfig, RunSummary, TaskSet};

// io — safetensors helpers
pub use io::{SafeTensors, StWriter};

// statistics + aggregation
pub use aggregate::{analyse, collect, plot_report, Report};
pub use stats::{f_oneway, moving_average, permutation_cluster_test, ClusterTest};
