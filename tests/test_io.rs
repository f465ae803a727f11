mod common;
use eeg_decoding::{DecodingResult, SafeTensors};
use ndarray::{Array1, Array3};

fn ersp_result() -> DecodingResult {
    DecodingResult {
        id: "12".into(),
        decode_label: "cue_in_bonus_in_switch".into(),
        acc: Array1::from(vec![0.5, 0.625, 0.875]),
        fmp: Some(Array3::from_shape_fn((3, 2, 4), |(t, c, b)| (t * 8 + c * 4 + b) as f64 / 100.0)),
        times: vec![-0.6, -0.58, -0.56],
        ch_names: vec!["Fz".into(), "OI1".into()],
        freqs: vec![2.5, 5.5, 10.0, 22.0],
    }
}

#[test]
fn result_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let res = ersp_result();
    let path = dir.path().join(DecodingResult::file_name(&res.decode_label, &res.id));
    assert!(path.ends_with("cue_in_bonus_in_switch_12.safetensors"));
    res.save(&path).unwrap();
    assert_eq!(DecodingResult::load(&path).unwrap(), res);
}

#[test]
fn file_layout_uses_documented_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.safetensors");
    ersp_result().save(&path).unwrap();

    let st = SafeTensors::load(&path).unwrap();
    assert_eq!(st.tensor("acc").unwrap().shape(), &[3]);
    assert_eq!(st.tensor("fmp").unwrap().shape(), &[3, 2, 4]);
    assert_eq!(st.tensor("freqs").unwrap().shape(), &[4]);
    assert_eq!(st.meta("id").unwrap(), "12");
    assert_eq!(st.meta("features").unwrap(), "ersp");
    assert_eq!(st.meta("ch_names").unwrap(), r#"["Fz","OI1"]"#);
}

#[test]
fn voltage_results_have_no_freqs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v.safetensors");
    let res = DecodingResult { fmp: None, freqs: vec![], ..ersp_result() };
    res.save(&path).unwrap();

    let st = SafeTensors::load(&path).unwrap();
    assert!(st.tensor("freqs").is_err());
    assert_eq!(st.meta("features").unwrap(), "erp");
    let back = DecodingResult::load(&path).unwrap();
    assert!(back.fmp.is_none());
    assert!(back.freqs.is_empty());
}
