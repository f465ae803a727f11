//! Across-subject statistics on accuracy time courses.
//!
//! - [`moving_average`]: boxcar smoothing, `valid` mode.
//! - [`f_oneway`]: one-way ANOVA F per timepoint.
//! - [`permutation_cluster_test`]: temporal cluster-mass permutation test
//!   on the F statistic, after `mne.stats.permutation_cluster_test`.
//!
//! Cluster mass is the sum of the statistic over a run of suprathreshold
//! timepoints.  The null distribution holds, for every permutation of the
//! pooled observations across groups, the largest cluster score; its first
//! entry is the unpermuted data.  A cluster's p-value is the fraction of
//! null entries at least as large as its own score.
use std::ops::Range;

use anyhow::{bail, Result};
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::StatsConfig;

/// `valid`-mode convolution of `x` with a boxcar of width `w`, divided by
/// `w`.  The output has `len - w + 1` samples, or none if `x` is shorter
/// than `w`.
pub fn moving_average(x: &[f64], w: usize) -> Vec<f64> {
    if w <= 1 {
        return x.to_vec();
    }
    x.windows(w).map(|win| win.iter().sum::<f64>() / w as f64).collect()
}

/// One-way ANOVA F statistic per column.
///
/// Each group is `[observations, timepoints]`.
pub fn f_oneway(groups: &[ArrayView2<'_, f64>]) -> Result<Array1<f64>> {
    let k = groups.len();
    if k < 2 {
        bail!("F test needs at least 2 groups, got {k}");
    }
    let n_t = groups[0].ncols();
    if groups.iter().any(|g| g.ncols() != n_t) {
        bail!("all groups must have the same number of timepoints");
    }
    if groups.iter().any(|g| g.nrows() == 0) {
        bail!("empty group");
    }
    let n_total: usize = groups.iter().map(|g| g.nrows()).sum();
    if n_total <= k {
        bail!("F test needs more observations ({n_total}) than groups ({k})");
    }

    let sum_all = groups
        .iter()
        .fold(Array1::<f64>::zeros(n_t), |acc, g| acc + g.sum_axis(Axis(0)));
    let grand = sum_all / n_total as f64;

    let mut ss_between = Array1::<f64>::zeros(n_t);
    let mut ss_within = Array1::<f64>::zeros(n_t);
    for g in groups {
        let n = g.nrows() as f64;
        let mean = g.sum_axis(Axis(0)) / n;
        ss_between += &((&mean - &grand).mapv(|d| d * d) * n);
        ss_within += &(g - &mean).mapv(|d| d * d).sum_axis(Axis(0));
    }
    let df_between = (k - 1) as f64;
    let df_within = (n_total - k) as f64;
    Ok((ss_between / df_between) / (ss_within / df_within))
}

/// Contiguous runs of suprathreshold samples with their mass.
///
/// `tail = 1`: `stat > threshold`; `tail = -1`: `stat < -threshold`;
/// `tail = 0`: either, with positive and negative runs kept apart.
pub fn find_clusters(stat: &[f64], threshold: f64, tail: i8) -> Vec<(Range<usize>, f64)> {
    let side = |v: f64| -> i8 {
        match tail {
            1 if v > threshold => 1,
            -1 if v < -threshold => -1,
            0 if v > threshold => 1,
            0 if v < -threshold => -1,
            _ => 0,
        }
    };

    let mut out = Vec::new();
    let mut start: Option<(usize, i8)> = None;
    for (i, &v) in stat.iter().enumerate() {
        let s = side(v);
        match start {
            Some((a, prev)) if s != prev => {
                out.push((a..i, stat[a..i].iter().sum()));
                start = (s != 0).then_some((i, s));
            }
            None if s != 0 => start = Some((i, s)),
            _ => {}
        }
    }
    if let Some((a, _)) = start {
        out.push((a..stat.len(), stat[a..].iter().sum()));
    }
    out
}

/// Score compared against the null distribution.
fn score(mass: f64, tail: i8) -> f64 {
    match tail {
        -1 => -mass,
        0 => mass.abs(),
        _ => mass,
    }
}

fn max_score(stat: &[f64], threshold: f64, tail: i8) -> f64 {
    find_clusters(stat, threshold, tail)
        .iter()
        .map(|(_, m)| score(*m, tail))
        .fold(0.0, f64::max)
}

// JSON has no NaN or infinity: serde_json writes them as `null`, which is
// read back as NaN.

pub(crate) fn nan_from_null<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
}

pub(crate) fn nans_from_nulls<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<f64>, D::Error> {
    let v = Vec::<Option<f64>>::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// First timepoint index.
    pub start: usize,
    /// One past the last timepoint index.
    pub stop: usize,
    #[serde(deserialize_with = "nan_from_null")]
    pub mass: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTest {
    /// NaN where every group is constant.
    #[serde(deserialize_with = "nans_from_nulls")]
    pub f_obs: Vec<f64>,
    pub clusters: Vec<Cluster>,
    /// Maximum cluster score per permutation; `h0[0]` is the observed one.
    #[serde(deserialize_with = "nans_from_nulls")]
    pub h0: Vec<f64>,
}

impl ClusterTest {
    pub fn significant(&self, alpha: f64) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(move |c| c.p_value <= alpha)
    }
}

/// Cluster permutation test of `groups` (each `[subjects, timepoints]`).
///
/// Permutation `i` shuffles with an RNG seeded `cfg.seed + i`, so the
/// outcome does not depend on the thread count.
pub fn permutation_cluster_test(groups: &[Array2<f64>], cfg: &StatsConfig) -> Result<ClusterTest> {
    let views: Vec<ArrayView2<'_, f64>> = groups.iter().map(|g| g.view()).collect();
    let f_obs = f_oneway(&views)?;
    let f_obs = f_obs.to_vec();
    let found = find_clusters(&f_obs, cfg.threshold, cfg.tail);

    let pooled = concatenate(Axis(0), &views)?;
    let sizes: Vec<usize> = groups.iter().map(|g| g.nrows()).collect();
    let n_perm = cfg.n_permutations.max(1);

    let permuted: Vec<f64> = (1..n_perm)
        .into_par_iter()
        .map(|i| -> Result<f64> {
            let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(i as u64));
            let mut order: Vec<usize> = (0..pooled.nrows()).collect();
            order.shuffle(&mut rng);
            let shuffled = pooled.select(Axis(0), &order);
            let mut parts = Vec::with_capacity(sizes.len());
            let mut at = 0;
            for &n in &sizes {
                parts.push(shuffled.slice(ndarray::s![at..at + n, ..]));
                at += n;
            }
            let f = f_oneway(&parts)?;
            Ok(max_score(f.as_slice().unwrap_or(&[]), cfg.threshold, cfg.tail))
        })
        .collect::<Result<_>>()?;

    let mut h0 = Vec::with_capacity(n_perm);
    h0.push(max_score(&f_obs, cfg.threshold, cfg.tail));
    h0.extend(permuted);

    let clusters = found
        .into_iter()
        .map(|(range, mass)| {
            let s = score(mass, cfg.tail);
            let hits = h0.iter().filter(|&&h| h >= s).count();
            Cluster {
                start: range.start,
                stop: range.end,
                mass,
                p_value: hits as f64 / h0.len() as f64,
            }
        })
        .collect();

    Ok(ClusterTest { f_obs, clusters, h0 })
}
