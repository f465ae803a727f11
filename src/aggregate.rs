//! Across-subject analysis of one decoding family in a 2 × 2 design.
//!
//! The four cells of a family are `{family}_in_{a}_in_{b}` for the two
//! levels of factor A (e.g. `standard`/`bonus`) and of factor B (e.g.
//! `repeat`/`switch`).  Per subject, accuracy curves are smoothed with a
//! moving average; the group is then tested for
//!
//! ```text
//! main A        (a1b1 + a1b2)/2   vs  (a2b1 + a2b2)/2
//! main B        (a1b1 + a2b1)/2   vs  (a1b2 + a2b2)/2
//! interaction   a1b2 - a1b1       vs  a2b2 - a2b1
//! ```
//!
//! each with a cluster permutation F test.
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{Array2, Array3, Axis};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::StatsConfig;
use crate::decode::DecodingResult;
use crate::stats::{moving_average, nans_from_nulls, permutation_cluster_test, ClusterTest};
use crate::tasks::cell_label;

/// Smoothed accuracies of the four cells for the subjects present in all
/// of them.
#[derive(Debug, Clone)]
pub struct Collected {
    pub family: String,
    pub levels_a: [String; 2],
    pub levels_b: [String; 2],
    pub subjects: Vec<String>,
    /// Times after smoothing: `times[w - 1..]`.
    pub times: Vec<f64>,
    pub ch_names: Vec<String>,
    /// `[subjects, times]` per cell, in order a1b1, a1b2, a2b1, a2b2.
    pub acc: Vec<Array2<f64>>,
    /// Subject-mean importances `[T, C, B]` per cell, unsmoothed.
    pub fmp: Vec<Option<Array3<f64>>>,
}

impl Collected {
    pub fn cell_labels(&self) -> Vec<String> {
        cell_labels(&self.family, &self.levels_a, &self.levels_b)
    }
}

fn cell_labels(family: &str, levels_a: &[String; 2], levels_b: &[String; 2]) -> Vec<String> {
    levels_a
        .iter()
        .flat_map(|a| levels_b.iter().map(move |b| cell_label(family, a, b)))
        .collect()
}

/// Load every result of one cell, keyed by subject id.
fn load_cell(dir: &Path, label: &str) -> Result<BTreeMap<String, DecodingResult>> {
    let prefix = format!("{label}_");
    let mut out = BTreeMap::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !(name.starts_with(&prefix) && name.ends_with(".safetensors")) {
            continue;
        }
        let result = DecodingResult::load(&path)?;
        if result.decode_label != label {
            continue;
        }
        out.insert(result.id.clone(), result);
    }
    Ok(out)
}

/// Gather the four cells of `family` from `dir`.
pub fn collect(
    dir: &Path,
    family: &str,
    levels_a: &[String; 2],
    levels_b: &[String; 2],
    smoothing: usize,
) -> Result<Collected> {
    let labels = cell_labels(family, levels_a, levels_b);
    let cells = labels
        .iter()
        .map(|l| load_cell(dir, l))
        .collect::<Result<Vec<_>>>()?;
    for (label, cell) in labels.iter().zip(&cells) {
        debug!(cell = %label, subjects = cell.len(), "loaded");
    }

    let mut common: BTreeSet<&String> = cells[0].keys().collect();
    for cell in &cells[1..] {
        common.retain(|id| cell.contains_key(*id));
    }
    let all: BTreeSet<&String> = cells.iter().flat_map(|c| c.keys()).collect();
    for id in all.difference(&common) {
        warn!(id = %id, family, "subject lacks some cells, excluded");
    }
    if common.is_empty() {
        bail!("no subject has all four cells of '{family}' in {}", dir.display());
    }
    let subjects: Vec<String> = common.into_iter().cloned().collect();

    let first = &cells[0][&subjects[0]];
    let n_t = first.acc.len();
    let n_smooth = moving_average(&first.acc.to_vec(), smoothing).len();
    if n_smooth == 0 {
        bail!("{n_t} timepoints are too few for a smoothing window of {smoothing}");
    }
    let times = first.times[n_t - n_smooth..].to_vec();

    let mut acc = Vec::with_capacity(4);
    let mut fmp = Vec::with_capacity(4);
    for (label, cell) in labels.iter().zip(&cells) {
        let mut m = Array2::<f64>::zeros((subjects.len(), n_smooth));
        let mut fmp_sum: Option<Array3<f64>> = None;
        let mut fmp_complete = true;
        for (row, id) in subjects.iter().enumerate() {
            let r = &cell[id];
            if r.acc.len() != n_t {
                bail!("{label} of subject {id} has {} timepoints, expected {n_t}", r.acc.len());
            }
            let same_times = r.times.len() == first.times.len()
                && r.times.iter().zip(&first.times).all(|(a, b)| (a - b).abs() <= 1e-9);
            if !same_times {
                bail!(
                    "{label} of subject {id} has a different time axis than {} of subject {}",
                    labels[0],
                    subjects[0]
                );
            }
            let smoothed = moving_average(&r.acc.to_vec(), smoothing);
            m.row_mut(row).assign(&ndarray::Array1::from(smoothed));

            match (&r.fmp, &mut fmp_sum) {
                (Some(f), Some(sum)) if f.dim() == sum.dim() => *sum += f,
                (Some(f), None) if row == 0 => fmp_sum = Some(f.clone()),
                _ => fmp_complete = false,
            }
        }
        acc.push(m);
        fmp.push(if fmp_complete { fmp_sum.map(|s| s / subjects.len() as f64) } else { None });
    }

    info!(family, subjects = subjects.len(), timepoints = n_smooth, "collected");
    Ok(Collected {
        family: family.to_string(),
        levels_a: levels_a.clone(),
        levels_b: levels_b.clone(),
        subjects,
        times,
        ch_names: first.ch_names.clone(),
        acc,
        fmp,
    })
}

/// Group-mean accuracy of one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellCurve {
    pub label: String,
    #[serde(deserialize_with = "nans_from_nulls")]
    pub mean_accuracy: Vec<f64>,
    /// Importance per channel, averaged over time, bands and subjects.
    pub channel_importance: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    pub name: String,
    pub test: ClusterTest,
}

/// Everything `aggregate` writes for one family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub family: String,
    pub levels_a: [String; 2],
    pub levels_b: [String; 2],
    pub subjects: Vec<String>,
    pub times: Vec<f64>,
    pub ch_names: Vec<String>,
    pub cells: Vec<CellCurve>,
    /// Main effect A, main effect B, interaction.
    pub effects: Vec<Effect>,
    pub threshold: f64,
    pub alpha: f64,
}

impl Report {
    pub fn effect(&self, name: &str) -> Option<&Effect> {
        self.effects.iter().find(|e| e.name == name)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(f), self)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let f = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(serde_json::from_reader(std::io::BufReader::new(f))?)
    }
}

/// Run the three cluster tests on collected cells.
pub fn analyse(c: &Collected, cfg: &StatsConfig) -> Result<Report> {
    let [a1b1, a1b2, a2b1, a2b2] = [&c.acc[0], &c.acc[1], &c.acc[2], &c.acc[3]];
    let contrasts = [
        (format!("main_{}", c.levels_a.join("_vs_")), [(a1b1 + a1b2) / 2.0, (a2b1 + a2b2) / 2.0]),
        (format!("main_{}", c.levels_b.join("_vs_")), [(a1b1 + a2b1) / 2.0, (a1b2 + a2b2) / 2.0]),
        ("interaction".to_string(), [a1b2 - a1b1, a2b2 - a2b1]),
    ];

    let mut effects = Vec::with_capacity(3);
    for (name, groups) in contrasts {
        let test = permutation_cluster_test(&groups, cfg)?;
        let n_sig = test.significant(cfg.alpha).count();
        info!(effect = %name, clusters = test.clusters.len(), significant = n_sig, "cluster test");
        effects.push(Effect { name, test });
    }

    let cells = c
        .cell_labels()
        .into_iter()
        .zip(c.acc.iter().zip(&c.fmp))
        .map(|(label, (acc, fmp))| CellCurve {
            label,
            mean_accuracy: acc.mean_axis(Axis(0)).map(|m| m.to_vec()).unwrap_or_default(),
            channel_importance: fmp.as_ref().and_then(|f| {
                f.mean_axis(Axis(2))
                    .and_then(|tc| tc.mean_axis(Axis(0)))
                    .map(|ch| ch.to_vec())
            }),
        })
        .collect();

    Ok(Report {
        family: c.family.clone(),
        levels_a: c.levels_a.clone(),
        levels_b: c.levels_b.clone(),
        subjects: c.subjects.clone(),
        times: c.times.clone(),
        ch_names: c.ch_names.clone(),
        cells,
        effects,
        threshold: cfg.threshold,
        alpha: cfg.alpha,
    })
}

fn value_range<'a>(curves: impl Iterator<Item = &'a [f64]>) -> (f64, f64) {
    let (lo, hi) = curves
        .flat_map(|c| c.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return (0.0, 1.0);
    }
    let margin = ((hi - lo) * 0.1).max(1e-3);
    (lo - margin, hi + margin)
}

/// Two-panel SVG: cell accuracies with interaction clusters shaded, and
/// the F curves of all effects.
pub fn plot_report(report: &Report, path: &Path) -> Result<()> {
    let times = &report.times;
    let (Some(&t0), Some(&t1)) = (times.first(), times.last()) else {
        bail!("report has no timepoints");
    };
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(&report.family, ("sans-serif", 20))?;
    let panels = root.split_evenly((2, 1));
    let colors = [BLUE, RED, GREEN, MAGENTA];

    // accuracy
    let (y0, y1) = value_range(report.cells.iter().map(|c| c.mean_accuracy.as_slice()));
    let mut chart = ChartBuilder::on(&panels[0])
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(t0..t1, y0..y1)?;
    chart.configure_mesh().x_desc("time (s)").y_desc("accuracy").draw()?;

    if let Some(inter) = report.effect("interaction") {
        for c in &inter.test.clusters {
            let color = if c.p_value <= report.alpha { GREEN } else { RGBColor(77, 77, 77) };
            let (a, b) = (times[c.start], times[c.stop.saturating_sub(1).max(c.start)]);
            chart.draw_series(std::iter::once(Rectangle::new([(a, y0), (b, y1)], color.mix(0.3).filled())))?;
        }
    }
    for (cell, color) in report.cells.iter().zip(colors.into_iter().cycle()) {
        chart
            .draw_series(LineSeries::new(
                times.iter().copied().zip(cell.mean_accuracy.iter().copied()),
                color.stroke_width(2),
            ))?
            .label(cell.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    // F values
    let (_, f1) = value_range(report.effects.iter().map(|e| e.test.f_obs.as_slice()));
    let f1 = f1.max(report.threshold * 1.1);
    let mut chart = ChartBuilder::on(&panels[1])
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(t0..t1, 0.0..f1)?;
    chart.configure_mesh().x_desc("time (s)").y_desc("f-values").draw()?;
    for (effect, color) in report.effects.iter().zip([MAGENTA, CYAN, BLACK]) {
        chart
            .draw_series(LineSeries::new(
                times.iter().copied().zip(effect.test.f_obs.iter().copied()),
                color.stroke_width(2),
            ))?
            .label(effect.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }
    chart.draw_series(LineSeries::new(
        [(t0, report.threshold), (t1, report.threshold)],
        RGBColor(150, 150, 150).stroke_width(1),
    ))?;
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_cell_order() {
        let a = ["standard".to_string(), "bonus".to_string()];
        let b = ["repeat".to_string(), "switch".to_string()];
        assert_eq!(
            cell_labels("cue", &a, &b),
            vec![
                "cue_in_standard_in_repeat",
                "cue_in_standard_in_switch",
                "cue_in_bonus_in_repeat",
                "cue_in_bonus_in_switch",
            ]
        );
    }

    #[test]
    fn constant_timepoints_survive_json() {
        let acc = |shift: f64| {
            Array2::from_shape_fn((6, 5), |(s, t)| {
                if t == 0 {
                    0.5
                } else {
                    0.5 + shift * (1.0 + 0.1 * s as f64) + 0.01 * (s * t) as f64
                }
            })
        };
        let levels = |a: &str, b: &str| [a.to_string(), b.to_string()];
        let cells = Collected {
            family: "task".into(),
            levels_a: levels("standard", "bonus"),
            levels_b: levels("repeat", "switch"),
            subjects: (1..=6).map(|s| format!("{s:02}")).collect(),
            times: vec![0.0, 0.1, 0.2, 0.3, 0.4],
            ch_names: vec!["Fz".into()],
            acc: vec![acc(0.0), acc(0.1), acc(0.0), acc(0.3)],
            fmp: vec![None; 4],
        };
        let cfg = StatsConfig { n_permutations: 10, ..StatsConfig::default() };
        let report = analyse(&cells, &cfg).unwrap();
        assert!(report.effects[2].test.f_obs[0].is_nan());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();
        let back = Report::read_json(&path).unwrap();
        assert!(back.effects[2].test.f_obs[0].is_nan());
        approx::assert_abs_diff_eq!(back.effects[2].test.f_obs[1], report.effects[2].test.f_obs[1], epsilon = 1e-9);
    }

    #[test]
    fn value_range_pads_and_ignores_nan() {
        let a = [0.5, f64::NAN, 0.7];
        let (lo, hi) = value_range(std::iter::once(&a[..]));
        assert!(lo < 0.5 && hi > 0.7);
        assert_eq!(value_range(std::iter::empty()), (0.0, 1.0));
    }
}
