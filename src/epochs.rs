//! Epoched EEG container.
//!
//! [`Epochs`] holds `[E, C, T]` data plus the channel names and time axis,
//! and offers the handful of MNE `Epochs` operations the analysis needs:
//! `decimate`, `crop`, `pick` and trial selection.
use anyhow::Result;
use ndarray::{s, Array3, Axis};

use crate::error::DecodeError;

#[derive(Debug, Clone)]
pub struct Epochs {
    /// [E, C, T]
    pub data: Array3<f64>,
    pub ch_names: Vec<String>,
    pub sfreq: f64,
    /// Time of sample 0 in seconds.
    pub tmin: f64,
}

impl Epochs {
    pub fn new(data: Array3<f64>, ch_names: Vec<String>, sfreq: f64, tmin: f64) -> Result<Self> {
        if data.shape()[1] != ch_names.len() {
            return Err(DecodeError::ShapeMismatch {
                what: "epoch channels vs channel names",
                left: data.shape()[1],
                right: ch_names.len(),
            }
            .into());
        }
        Ok(Self { data, ch_names, sfreq, tmin })
    }

    pub fn n_trials(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn n_channels(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn n_times(&self) -> usize {
        self.data.shape()[2]
    }

    /// Sample times in seconds: `tmin + i / sfreq`.
    pub fn times(&self) -> Vec<f64> {
        (0..self.n_times())
            .map(|i| self.tmin + i as f64 / self.sfreq)
            .collect()
    }

    /// Keep every `factor`-th sample.
    ///
    /// Like `mne.Epochs.decimate` this does not low-pass first; the data
    /// are assumed to be band-limited already.
    pub fn decimate(mut self, factor: usize) -> Self {
        if factor > 1 {
            self.data = self.data.slice(s![.., .., ..;factor as isize]).to_owned();
            self.sfreq /= factor as f64;
        }
        self
    }

    /// Keep the samples with `tmin <= t <= tmax`.
    pub fn crop(mut self, tmin: f64, tmax: f64) -> Self {
        let keep = time_mask(&self.times(), tmin, tmax);
        let first = keep.iter().position(|&k| k);
        let last = keep.iter().rposition(|&k| k);
        match (first, last) {
            (Some(a), Some(b)) => {
                let times = self.times();
                self.data = self.data.slice(s![.., .., a..=b]).to_owned();
                self.tmin = times[a];
            }
            _ => {
                let (e, c, _) = self.data.dim();
                self.data = Array3::zeros((e, c, 0));
            }
        }
        self
    }

    /// Select channels by name, in the order given.
    pub fn pick(mut self, names: &[String]) -> Result<Self> {
        let idx = self.channel_indices(names)?;
        self.data = self.data.select(Axis(1), &idx);
        self.ch_names = names.to_vec();
        Ok(self)
    }

    pub fn channel_indices(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                self.ch_names
                    .iter()
                    .position(|c| c == n)
                    .ok_or_else(|| DecodeError::UnknownChannel(n.clone()).into())
            })
            .collect()
    }

    /// Keep the trials whose mask entry is `true`.
    pub fn select_trials(mut self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.n_trials() {
            return Err(DecodeError::ShapeMismatch {
                what: "trial mask vs epochs",
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
        self.data = self.data.select(Axis(0), &idx);
        Ok(self)
    }
}

/// Inclusive time-window mask.  A small tolerance absorbs the rounding of
/// `tmin + i / sfreq`.
pub fn time_mask(times: &[f64], tmin: f64, tmax: f64) -> Vec<bool> {
    const EPS: f64 = 1e-9;
    times
        .iter()
        .map(|&t| t >= tmin - EPS && t <= tmax + EPS)
        .collect()
}
