/// Shared helpers: synthetic trial tables, epochs and decoding results.
use eeg_decoding::trialinfo::col;
use eeg_decoding::{DecodingResult, Epochs, TrialInfo};
use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// A trial table that passes the exclusion mask, with `n_per_cell` trials
/// in every bonus × switch × task cell.  Cue, response side and positions
/// alternate within each cell so every family has two classes.
#[allow(unused)]
pub fn factorial_trialinfo(n_per_cell: usize) -> TrialInfo {
    let mut rows = Vec::new();
    for bonus in 0..2 {
        for switch in 0..2 {
            for tilt in 0..2 {
                for k in 0..n_per_cell {
                    let mut r = vec![0.0; col::N_COLS];
                    r[col::ID] = 1.0;
                    r[col::BLOCK_NR] = 5.0 + (k % 3) as f64;
                    r[col::TRIAL_NR] = rows.len() as f64;
                    r[col::BONUSTRIAL] = bonus as f64;
                    r[col::TILT_TASK] = tilt as f64;
                    r[col::TASK_SWITCH] = switch as f64;
                    r[col::CUE_AX] = (k % 2) as f64;
                    r[col::RESPONSE_SIDE] = ((k / 2) % 2) as f64;
                    r[col::POSITION_TARGET] = 1.0 + (k % 8) as f64;
                    r[col::POSITION_DISTRACTOR] = 1.0 + ((k + 4) % 8) as f64;
                    r[col::SEQUENCE_POSITION] = 2.0 + (k % 4) as f64;
                    rows.push(r);
                }
            }
        }
    }
    let n = rows.len();
    let table = Array2::from_shape_vec((n, col::N_COLS), rows.concat()).unwrap();
    TrialInfo::new(table).unwrap()
}

/// Uniform noise in [-1, 1] plus, on channel 0 inside `window` (sample
/// indices), `±amp` according to the 0/1 value of `label_col`.
#[allow(unused)]
pub fn epochs_with_effect(
    info: &TrialInfo,
    label_col: usize,
    ch_names: &[String],
    n_times: usize,
    sfreq: f64,
    tmin: f64,
    window: std::ops::Range<usize>,
    amp: f64,
) -> Epochs {
    let mut rng = StdRng::seed_from_u64(11);
    let labels = info.column(label_col).to_owned();
    let n_e = info.n_trials();
    let mut data = Array3::<f64>::zeros((n_e, ch_names.len(), n_times));
    for ((e, c, t), v) in data.indexed_iter_mut() {
        *v = rng.gen_range(-1.0..1.0);
        if c == 0 && window.contains(&t) {
            *v += if labels[e] > 0.5 { amp } else { -amp };
        }
    }
    Epochs::new(data, ch_names.to_vec(), sfreq, tmin).unwrap()
}

#[allow(unused)]
pub fn channel_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("E{i}")).collect()
}

/// Write a result with accuracy `acc` for `label` and subject `id`.
#[allow(unused)]
pub fn write_result(dir: &Path, label: &str, id: &str, times: &[f64], acc: Vec<f64>, n_ch: usize) {
    let n_t = acc.len();
    let fmp = Array3::from_shape_fn((n_t, n_ch, 1), |(_, c, _)| if c == 0 { 0.7 } else { 0.3 / (n_ch - 1) as f64 });
    let res = DecodingResult {
        id: id.to_string(),
        decode_label: label.to_string(),
        acc: Array1::from(acc),
        fmp: Some(fmp),
        times: times.to_vec(),
        ch_names: channel_names(n_ch),
        freqs: vec![],
    };
    res.save(&dir.join(DecodingResult::file_name(label, id))).unwrap();
}

#[allow(unused)]
pub fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

#[allow(unused)]
fn mat_element(out: &mut Vec<u8>, data_type: u32, data: &[u8]) {
    out.extend_from_slice(&data_type.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out.resize(out.len().div_ceil(8) * 8, 0);
}

/// Write an uncompressed little-endian MAT v5 file of double matrices.
/// `values` are column-major, as MATLAB stores them.
#[allow(unused)]
pub fn write_mat(path: &Path, vars: &[(&str, Vec<usize>, Vec<f64>)]) {
    const MI_INT8: u32 = 1;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MI_MATRIX: u32 = 14;
    const MX_DOUBLE_CLASS: u32 = 6;

    let mut text = b"MATLAB 5.0 MAT-file, written by the eeg-decoding tests".to_vec();
    text.resize(116, b' ');
    let mut out = text;
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&0x0100u16.to_le_bytes());
    out.extend_from_slice(b"IM");

    for (name, dims, values) in vars {
        assert_eq!(dims.iter().product::<usize>(), values.len(), "{name}");
        let mut body = Vec::new();
        let flags: Vec<u8> = [MX_DOUBLE_CLASS, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
        mat_element(&mut body, MI_UINT32, &flags);
        let dims: Vec<u8> = dims.iter().flat_map(|&d| (d as i32).to_le_bytes()).collect();
        mat_element(&mut body, MI_INT32, &dims);
        mat_element(&mut body, MI_INT8, name.as_bytes());
        let real: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        mat_element(&mut body, MI_DOUBLE, &real);
        mat_element(&mut out, MI_MATRIX, &body);
    }
    std::fs::write(path, out).unwrap();
}

/// Store epochs and their trial table the way the cleaned `.set` files
/// do: `data` as `[channels, times, trials]`, `trialinfo` as
/// `[trials, columns]`, both column-major.
#[allow(unused)]
pub fn write_subject_mat(path: &Path, epochs: &Epochs, info: &TrialInfo) {
    let (n_e, n_c, n_t) = epochs.data.dim();
    let mut data = Vec::with_capacity(n_e * n_c * n_t);
    for e in 0..n_e {
        for t in 0..n_t {
            for c in 0..n_c {
                data.push(epochs.data[[e, c, t]]);
            }
        }
    }
    let (n_r, n_k) = info.table.dim();
    let table: Vec<f64> = (0..n_k).flat_map(|k| (0..n_r).map(move |r| (r, k))).map(|(r, k)| info.table[[r, k]]).collect();
    write_mat(
        path,
        &[
            ("data", vec![n_c, n_t, n_e], data),
            ("trialinfo", vec![n_r, n_k], table),
        ],
    );
}
