//! Subject discovery and loading of cleaned epoch files.
//!
//! Each subject is one MATLAB v5 file (`VPxx_..._cleaned.set`) holding
//!
//! ```text
//! data       [channels, times, trials]  f64   column-major
//! trialinfo  [trials, 23]               f64   column-major
//! ```
//!
//! Channel labels are shared by all subjects and live in a separate
//! whitespace-separated text file.
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use matfile::{MatFile, NumericData};
use ndarray::{Array2, Array3, ShapeBuilder};
use tracing::debug;

use crate::config::DatasetConfig;
use crate::epochs::Epochs;
use crate::error::DecodeError;
use crate::trialinfo::TrialInfo;

/// One subject's epochs with the matching trial table.
#[derive(Debug, Clone)]
pub struct SubjectData {
    pub id: String,
    pub epochs: Epochs,
    pub trialinfo: TrialInfo,
}

/// Files in `dir` whose name ends with `suffix`, sorted by path.
pub fn find_datasets(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if matches && path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// The two characters following `VP` in the file name.
pub fn subject_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let rest = &name[name.find("VP")? + 2..];
    let id: String = rest.chars().take(2).collect();
    (id.chars().count() == 2).then_some(id)
}

/// Read whitespace-separated channel labels and apply `renames`.
pub fn read_channel_labels(path: &Path, renames: &[(String, String)]) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading channel labels {}", path.display()))?;
    Ok(text
        .split_whitespace()
        .map(|label| {
            renames
                .iter()
                .find(|(from, _)| from == label)
                .map_or_else(|| label.to_string(), |(_, to)| to.clone())
        })
        .collect())
}

/// Load one subject file.
pub fn load_subject(path: &Path, ch_names: &[String], cfg: &DatasetConfig) -> Result<SubjectData> {
    let id = subject_id(path)
        .with_context(|| format!("no subject id (VPxx) in {}", path.display()))?;

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mat = MatFile::parse(file)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e:?}", path.display()))?;

    let (data_shape, data_vec) = numeric_variable(&mat, "data")?;
    if data_shape.len() != 3 {
        bail!("'data' must be 3-D [channels, times, trials], got shape {data_shape:?}");
    }
    let (n_ch, n_t, n_tr) = (data_shape[0], data_shape[1], data_shape[2]);
    let data = Array3::from_shape_vec((n_ch, n_t, n_tr).f(), data_vec)?
        .permuted_axes([2, 0, 1])
        .as_standard_layout()
        .to_owned();

    let (ti_shape, ti_vec) = numeric_variable(&mat, "trialinfo")?;
    if ti_shape.len() != 2 {
        bail!("'trialinfo' must be 2-D [trials, columns], got shape {ti_shape:?}");
    }
    let table = Array2::from_shape_vec((ti_shape[0], ti_shape[1]).f(), ti_vec)?
        .as_standard_layout()
        .to_owned();
    if table.nrows() != n_tr {
        return Err(DecodeError::ShapeMismatch {
            what: "trialinfo rows vs epochs",
            left: table.nrows(),
            right: n_tr,
        }
        .into());
    }

    debug!(id = %id, n_ch, n_t, n_tr, "loaded subject");
    Ok(SubjectData {
        id,
        epochs: Epochs::new(data, ch_names.to_vec(), cfg.sfreq, cfg.tmin)?,
        trialinfo: TrialInfo::new(table)?,
    })
}

/// Shape and real part (as f64, column-major) of a numeric MAT variable.
fn numeric_variable(mat: &MatFile, name: &str) -> Result<(Vec<usize>, Vec<f64>)> {
    let arr = mat
        .find_by_name(name)
        .ok_or_else(|| DecodeError::MissingVariable(name.to_string()))?;
    Ok((arr.size().clone(), to_f64(arr.data())))
}

fn to_f64(data: &NumericData) -> Vec<f64> {
    match data {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
    }
}
