//! Single-trial Morlet wavelet power, matching MNE's
//! `tfr_morlet(..., average=False, return_itc=False, output='power')`.
//!
//! Algorithm (from `mne/time_frequency/tfr.py`):
//!   1. One complex Morlet wavelet per frequency,
//!      `sigma_t = n_cycles / (2π f)`, support `[-5σ, 5σ]`.
//!   2. Optionally subtract the real offset so the wavelet has zero mean.
//!   3. Normalise by `sqrt(0.5) · ‖W‖₂`.
//!   4. Convolve every trial × channel with every wavelet via FFT,
//!      keep the centred `n_times` samples ("same" mode).
//!   5. Power `|·|²`, then keep every `decim`-th sample.
use std::f64::consts::PI;

use anyhow::{bail, Context, Result};
use ndarray::{s, Array1, Array3, Array4, Axis};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::Band;
use crate::epochs::Epochs;

/// `n` evenly spaced values from `a` to `b` inclusive (`numpy.linspace`).
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![a],
        _ => {
            let step = (b - a) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { b } else { a + step * i as f64 }).collect()
        }
    }
}

/// Complex Morlet wavelets, one per frequency.
pub fn morlet(sfreq: f64, freqs: &[f64], n_cycles: &[f64], zero_mean: bool) -> Vec<Vec<Complex<f64>>> {
    freqs
        .iter()
        .zip(n_cycles)
        .map(|(&f, &nc)| {
            let sigma_t = nc / (2.0 * PI * f);
            let half: Vec<f64> = (0..)
                .map(|i| i as f64 / sfreq)
                .take_while(|&t| t < 5.0 * sigma_t)
                .collect();
            let t: Vec<f64> = half
                .iter()
                .rev()
                .map(|&v| -v)
                .chain(half.iter().skip(1).copied())
                .collect();

            let real_offset = if zero_mean {
                (-2.0 * (PI * f * sigma_t).powi(2)).exp()
            } else {
                0.0
            };
            let mut w: Vec<Complex<f64>> = t
                .iter()
                .map(|&ti| {
                    let osc = Complex::from_polar(1.0, 2.0 * PI * f * ti) - real_offset;
                    osc * (-(ti * ti) / (2.0 * sigma_t * sigma_t)).exp()
                })
                .collect();
            let norm = w.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
            let scale = 1.0 / (0.5_f64.sqrt() * norm);
            w.iter_mut().for_each(|c| *c *= scale);
            w
        })
        .collect()
}

/// Single-trial power `[E, C, F, ceil(T / decim)]`.
///
/// Errors when a wavelet is longer than the epochs.
pub fn tfr_power(epochs: &Epochs, freqs: &[f64], n_cycles: &[f64], decim: usize) -> Result<Array4<f64>> {
    if freqs.len() != n_cycles.len() {
        bail!("{} frequencies but {} cycle counts", freqs.len(), n_cycles.len());
    }
    let decim = decim.max(1);
    let (n_e, n_c, n_t) = epochs.data.dim();
    let wavelets = morlet(epochs.sfreq, freqs, n_cycles, true);
    let max_len = wavelets.iter().map(Vec::len).max().unwrap_or(0);
    if max_len > n_t {
        bail!("wavelet length {max_len} exceeds epoch length {n_t}; use fewer cycles or longer epochs");
    }

    let n_fft = (n_t + max_len - 1).next_power_of_two();
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fwd = planner.plan_fft_forward(n_fft);
    let inv = planner.plan_fft_inverse(n_fft);

    let w_fft: Vec<Vec<Complex<f64>>> = wavelets
        .iter()
        .map(|w| {
            let mut buf = pad_to(w.iter().copied(), n_fft);
            fwd.process(&mut buf);
            buf
        })
        .collect();

    let n_out = n_t.div_ceil(decim);
    let inv_scale = 1.0 / n_fft as f64;
    let n_f = freqs.len();

    let trials: Vec<Array3<f64>> = (0..n_e)
        .into_par_iter()
        .map(|e| {
            let mut trial = Array3::<f64>::zeros((n_c, n_f, n_out));
            for c in 0..n_c {
                let mut x_fft = pad_to(
                    epochs.data.slice(s![e, c, ..]).iter().map(|&v| Complex::new(v, 0.0)),
                    n_fft,
                );
                fwd.process(&mut x_fft);

                for (fi, (wf, w)) in w_fft.iter().zip(&wavelets).enumerate() {
                    let mut buf: Vec<Complex<f64>> =
                        x_fft.iter().zip(wf).map(|(a, b)| a * b).collect();
                    inv.process(&mut buf);
                    // "same" mode: centre n_t samples of the full n_t + len - 1 convolution.
                    let start = (w.len() - 1) / 2;
                    for (k, t) in (0..n_t).step_by(decim).enumerate() {
                        trial[[c, fi, k]] = (buf[start + t] * inv_scale).norm_sqr();
                    }
                }
            }
            trial
        })
        .collect();

    let mut out = Array4::<f64>::zeros((n_e, n_c, n_f, n_out));
    for (e, trial) in trials.iter().enumerate() {
        out.slice_mut(s![e, .., .., ..]).assign(trial);
    }
    Ok(out)
}

/// Times matching [`tfr_power`]'s decimated output.
pub fn decimated_times(times: &[f64], decim: usize) -> Vec<f64> {
    times.iter().step_by(decim.max(1)).copied().collect()
}

/// Average `power` `[E, C, F, T]` over the frequencies inside each band.
pub fn band_average(power: &Array4<f64>, freqs: &[f64], bands: &[Band]) -> Result<Array4<f64>> {
    let (n_e, n_c, _, n_t) = power.dim();
    let mut out = Array4::<f64>::zeros((n_e, n_c, bands.len(), n_t));
    for (b, band) in bands.iter().enumerate() {
        let idx: Vec<usize> = freqs
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| (f >= band.lo && f <= band.hi).then_some(i))
            .collect();
        if idx.is_empty() {
            bail!("band '{}' ({}–{} Hz) contains no frequencies", band.name, band.lo, band.hi);
        }
        let mean = power
            .select(Axis(2), &idx)
            .mean_axis(Axis(2))
            .context("empty band average")?;
        out.slice_mut(s![.., .., b, ..]).assign(&mean);
    }
    Ok(out)
}

/// Keep the time samples selected by `mask` along the last axis.
pub fn select_times(power: &Array4<f64>, mask: &[bool]) -> Array4<f64> {
    let idx: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect();
    power.select(Axis(3), &idx)
}

fn pad_to(it: impl Iterator<Item = Complex<f64>>, n: usize) -> Vec<Complex<f64>> {
    it.chain(std::iter::repeat(Complex::default())).take(n).collect()
}

/// Band centre frequencies, stored alongside band-power results.
pub fn band_centers(bands: &[Band]) -> Array1<f64> {
    bands.iter().map(Band::center).collect()
}
