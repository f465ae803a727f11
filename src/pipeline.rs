//! Per-subject decoding driver.
//!
//! ```text
//! VPxx_cleaned.set
//!   │
//!   ├─ dataset::load_subject      MAT → Epochs [E, C, T] + TrialInfo
//!   ├─ recode positions           target/distractor → hemifield
//!   ├─ exclusion mask             practice blocks, first-in-sequence, misses
//!   ├─ ERP:  decimate → crop
//!   │  ERSP: pick → Morlet power → crop → band average
//!   ├─ features                   moving window → [trials, features] per t
//!   └─ for each task              decode → {label}_{id}.safetensors
//! ```
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{DatasetConfig, DecodeConfig, ErpConfig, TfConfig};
use crate::dataset::{find_datasets, load_subject, read_channel_labels, subject_id, SubjectData};
use crate::decode::{decode_task, DecodingResult};
use crate::epochs::time_mask;
use crate::error::DecodeError;
use crate::features::{band_features, erp_features, FeatureSet};
use crate::tasks::{erp_tasks, ersp_tasks, factorial_tasks, DecodingTask};
use crate::tfr::{band_average, band_centers, decimated_times, select_times, tfr_power};
use crate::trialinfo::TrialInfo;

/// Which signal the classifiers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FeatureKind {
    /// Voltage time-courses.
    Erp,
    /// Band-averaged Morlet power.
    Ersp,
}

/// Which list of contrasts is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TaskSet {
    /// Bonus vs standard and task within repeat/switch.
    Ersp,
    /// The above plus cue, response, target, distractor per bonus × task.
    Erp,
    /// Every family within bonus × switch (input of `aggregate`).
    Factorial,
}

impl TaskSet {
    pub fn tasks(self) -> Vec<DecodingTask> {
        match self {
            Self::Ersp => ersp_tasks(),
            Self::Erp => erp_tasks(),
            Self::Factorial => factorial_tasks(),
        }
    }
}

/// All settings of one decoding run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    pub decode: DecodeConfig,
    pub tf: TfConfig,
    pub erp: ErpConfig,
    /// Default: [`FeatureKind::Ersp`].
    pub features: FeatureKind,
    /// Default: [`TaskSet::Factorial`].
    pub tasks: TaskSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            decode: DecodeConfig::default(),
            tf: TfConfig::default(),
            erp: ErpConfig::default(),
            features: FeatureKind::Ersp,
            tasks: TaskSet::Factorial,
        }
    }
}

/// Counts of what [`run_subject`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub existing: usize,
    pub undecodable: usize,
}

impl std::ops::AddAssign for RunSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.written += rhs.written;
        self.existing += rhs.existing;
        self.undecodable += rhs.undecodable;
    }
}

/// Clean the trial table and turn one subject's epochs into features.
///
/// Returns the features together with the trial table of the retained
/// trials, row-aligned with every feature matrix.
pub fn prepare_subject(subject: SubjectData, cfg: &PipelineConfig) -> Result<(FeatureSet, TrialInfo)> {
    let SubjectData { epochs, mut trialinfo, .. } = subject;
    trialinfo.recode_positions_hemifield();
    let keep = trialinfo.exclusion_mask();
    let trialinfo = trialinfo.select(&keep)?;
    let epochs = epochs.select_trials(&keep)?;
    let smoothing = cfg.decode.temporal_smoothing;

    let features = match cfg.features {
        FeatureKind::Erp => {
            let epochs = epochs.decimate(cfg.erp.decim).crop(cfg.erp.crop.0, cfg.erp.crop.1);
            erp_features(&epochs.data, &epochs.times(), &epochs.ch_names, smoothing)?
        }
        FeatureKind::Ersp => {
            let tf = &cfg.tf;
            let epochs = epochs.pick(&tf.picks)?;
            let power = tfr_power(&epochs, &tf.freqs(), &tf.cycles(), tf.decim)?;
            let times = decimated_times(&epochs.times(), tf.decim);
            let mask = time_mask(&times, tf.crop.0, tf.crop.1);
            let power = select_times(&power, &mask);
            let times: Vec<f64> = times.iter().zip(&mask).filter_map(|(&t, &k)| k.then_some(t)).collect();
            let bands = band_average(&power, &tf.freqs(), &tf.bands)?;
            let centers = band_centers(&tf.bands).to_vec();
            band_features(&bands, &times, &epochs.ch_names, &centers, smoothing)?
        }
    };
    Ok((features, trialinfo))
}

/// Decode every task of `cfg.tasks` for one subject file.
///
/// Existing outputs are left untouched; a subject whose outputs all exist
/// is not even loaded.  Tasks whose trials cannot be decoded (one class
/// only, or too few trials for two bins) are logged and skipped.
pub fn run_subject(path: &Path, ch_names: &[String], output_dir: &Path, cfg: &PipelineConfig) -> Result<RunSummary> {
    let id = subject_id(path).with_context(|| format!("no subject id (VPxx) in {}", path.display()))?;
    let mut summary = RunSummary::default();

    let pending: Vec<(DecodingTask, PathBuf)> = cfg
        .tasks
        .tasks()
        .into_iter()
        .filter_map(|task| {
            let out = output_dir.join(DecodingResult::file_name(&task.label, &id));
            if out.exists() {
                summary.existing += 1;
                None
            } else {
                Some((task, out))
            }
        })
        .collect();
    if pending.is_empty() {
        info!(id = %id, "all outputs exist, skipping subject");
        return Ok(summary);
    }

    let subject = load_subject(path, ch_names, &cfg.dataset)?;
    let (features, trialinfo) = prepare_subject(subject, cfg)?;
    info!(
        id = %id,
        trials = features.n_trials(),
        timepoints = features.n_times(),
        features = features.n_features(),
        "features ready"
    );

    for (task, out) in pending {
        match decode_task(&id, &features, &trialinfo, &task, &cfg.decode) {
            Ok(result) => {
                result.save(&out)?;
                info!(task = %task.label, path = %out.display(), "saved");
                summary.written += 1;
            }
            Err(e) if is_undecodable(&e) => {
                warn!(id = %id, task = %task.label, "skipping: {e}");
                summary.undecodable += 1;
            }
            Err(e) => return Err(e.context(format!("decoding {} for subject {id}", task.label))),
        }
    }
    Ok(summary)
}

fn is_undecodable(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<DecodeError>(),
        Some(DecodeError::TooFewTrials { .. } | DecodeError::ClassCount { .. })
    )
}

/// Decode every dataset in `input_dir`, writing into `output_dir`.
pub fn run_all(input_dir: &Path, output_dir: &Path, cfg: &PipelineConfig) -> Result<RunSummary> {
    cfg.decode.validate()?;
    let datasets = find_datasets(input_dir, &cfg.dataset.suffix)?;
    if datasets.is_empty() {
        warn!(dir = %input_dir.display(), suffix = %cfg.dataset.suffix, "no datasets found");
    }
    let ch_names = read_channel_labels(
        &input_dir.join(&cfg.dataset.channel_label_file),
        &cfg.dataset.channel_renames,
    )?;
    std::fs::create_dir_all(output_dir).with_context(|| format!("creating {}", output_dir.display()))?;

    let mut total = RunSummary::default();
    for (i, path) in datasets.iter().enumerate() {
        info!("Decoding dataset {} / {}", i + 1, datasets.len());
        total += run_subject(path, &ch_names, output_dir, cfg)?;
    }
    info!(
        written = total.written,
        existing = total.existing,
        undecodable = total.undecodable,
        "done"
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_sets_have_expected_sizes() {
        assert_eq!(TaskSet::Ersp.tasks().len(), 6);
        assert_eq!(TaskSet::Erp.tasks().len(), 22);
        assert_eq!(TaskSet::Factorial.tasks().len(), 20);
    }

    #[test]
    fn undecodable_errors_are_recognised() {
        let e: anyhow::Error = DecodeError::ClassCount { found: 1 }.into();
        assert!(is_undecodable(&e));
        let e: anyhow::Error = DecodeError::UnknownChannel("Fz".into()).into();
        assert!(!is_undecodable(&e));
        assert!(!is_undecodable(&anyhow::anyhow!("io")));
    }

    #[test]
    fn summaries_add_up() {
        let mut a = RunSummary { written: 1, existing: 2, undecodable: 0 };
        a += RunSummary { written: 3, existing: 0, undecodable: 1 };
        assert_eq!(a, RunSummary { written: 4, existing: 2, undecodable: 1 });
    }
}
