//! Safetensors I/O for decoding results.
//!
//! One file per subject and task, `{decode_label}_{id}.safetensors`:
//!
//! | key     | dtype | shape       |                                   |
//! |---------|-------|-------------|-----------------------------------|
//! | `acc`   | F64   | `[T]`       | accuracy per timepoint            |
//! | `fmp`   | F64   | `[T, C, B]` | feature importances (optional)    |
//! | `times` | F64   | `[T]`       | seconds                           |
//! | `freqs` | F64   | `[B]`       | band centres (time-frequency only)|
//!
//! `__metadata__` carries `id`, `decode_label`, `features` (`erp` or
//! `ersp`) and `ch_names` (a JSON array encoded as a string, since
//! safetensors metadata values are strings).
use anyhow::{bail, Context, Result};
use ndarray::{Array, Array1, Array3, ArrayD, IxDyn};
use std::collections::HashMap;
use std::path::Path;

use crate::decode::DecodingResult;

// ── Low-level safetensors parser ─────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(serde_json::Map<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len);
    let end = usize::try_from(n)
        .ok()
        .and_then(|n| n.checked_add(8))
        .filter(|&end| end <= bytes.len())
        .with_context(|| format!("safetensors header length {n} exceeds file size {}", bytes.len()))?;
    let header: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

fn usize_list(v: &serde_json::Value, what: &str) -> Result<Vec<usize>> {
    v.as_array()
        .with_context(|| format!("'{what}' is not an array"))?
        .iter()
        .map(|x| {
            x.as_u64()
                .map(|u| u as usize)
                .with_context(|| format!("'{what}' holds a non-integer"))
        })
        .collect()
}

fn read_tensor(bytes: &[u8], data_start: usize, name: &str, entry: &serde_json::Value) -> Result<ArrayD<f64>> {
    let dtype = entry["dtype"]
        .as_str()
        .with_context(|| format!("tensor '{name}' has no dtype"))?;
    let shape = usize_list(&entry["shape"], "shape")?;
    let offsets = usize_list(&entry["data_offsets"], "data_offsets")?;
    let range = match offsets[..] {
        [s, e] if s <= e => data_start
            .checked_add(s)
            .zip(data_start.checked_add(e))
            .filter(|&(_, end)| end <= bytes.len()),
        _ => None,
    };
    let Some((start, end)) = range else {
        bail!("tensor '{name}' has invalid offsets {offsets:?}");
    };
    if dtype != "F64" {
        bail!("tensor '{name}': unsupported dtype {dtype}");
    }

    let vals: Vec<f64> = bytes[start..end]
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect();
    Array::from_shape_vec(IxDyn(&shape), vals).with_context(|| format!("tensor '{name}': shape {shape:?}"))
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Every `F64` tensor of a safetensors file, plus metadata.
#[derive(Debug, Clone, Default)]
pub struct SafeTensors {
    pub tensors: HashMap<String, ArrayD<f64>>,
    pub metadata: HashMap<String, String>,
}

impl SafeTensors {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;

        let mut out = Self::default();
        for (key, val) in &header {
            if key == "__metadata__" {
                if let Some(map) = val.as_object() {
                    for (k, v) in map {
                        if let Some(s) = v.as_str() {
                            out.metadata.insert(k.clone(), s.to_string());
                        }
                    }
                }
                continue;
            }
            out.tensors.insert(key.clone(), read_tensor(&bytes, data_start, key, val)?);
        }
        Ok(out)
    }

    pub fn tensor(&self, name: &str) -> Result<&ArrayD<f64>> {
        self.tensors.get(name).with_context(|| format!("missing '{name}' tensor"))
    }

    pub fn meta(&self, name: &str) -> Result<&str> {
        self.metadata
            .get(name)
            .map(String::as_str)
            .with_context(|| format!("missing '{name}' metadata"))
    }
}

// ── Generic safetensors builder ──────────────────────────────────────────────

/// Safetensors writer for F64 tensors with string metadata.
///
/// ```rust,no_run
/// use eeg_decoding::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("acc", &[0.5, 0.75], &[2]);
/// w.add_metadata("id", "07");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    /// Add an array of any dimensionality in logical (row-major) order.
    pub fn add_f64_array<D: ndarray::Dimension>(&mut self, name: &str, arr: &Array<f64, D>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, arr.shape());
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::Value::Object(self.metadata.clone()));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Decoding results ─────────────────────────────────────────────────────────

impl DecodingResult {
    /// File name of this result inside an output directory.
    pub fn file_name(decode_label: &str, id: &str) -> String {
        format!("{decode_label}_{id}.safetensors")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = StWriter::new();
        w.add_f64_array("acc", &self.acc);
        if let Some(fmp) = &self.fmp {
            w.add_f64_array("fmp", fmp);
        }
        w.add_f64("times", &self.times, &[self.times.len()]);
        if !self.freqs.is_empty() {
            w.add_f64("freqs", &self.freqs, &[self.freqs.len()]);
        }
        w.add_metadata("id", &self.id);
        w.add_metadata("decode_label", &self.decode_label);
        w.add_metadata("features", if self.freqs.is_empty() { "erp" } else { "ersp" });
        w.add_metadata("ch_names", &serde_json::to_string(&self.ch_names)?);
        w.write(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let st = SafeTensors::load(path)?;
        let acc: Array1<f64> = st.tensor("acc")?.clone().into_dimensionality()?;
        let fmp: Option<Array3<f64>> = match st.tensors.get("fmp") {
            Some(a) => Some(a.clone().into_dimensionality()?),
            None => None,
        };
        let times = st.tensor("times")?.iter().copied().collect::<Vec<_>>();
        let freqs = st
            .tensors
            .get("freqs")
            .map(|a| a.iter().copied().collect())
            .unwrap_or_default();
        let ch_names: Vec<String> =
            serde_json::from_str(st.meta("ch_names")?).context("parsing ch_names metadata")?;

        if times.len() != acc.len() {
            bail!("{}: {} times for {} accuracies", path.display(), times.len(), acc.len());
        }
        Ok(Self {
            id: st.meta("id")?.to_string(),
            decode_label: st.meta("decode_label")?.to_string(),
            acc,
            fmp,
            times,
            ch_names,
            freqs,
        })
    }
}
