mod common;
use common::{channel_names, epochs_with_effect, factorial_trialinfo, mean, write_subject_mat};
use eeg_decoding::trialinfo::col;
use eeg_decoding::{
    load_subject, prepare_subject, run_all, run_subject, ClassifierKind, DatasetConfig, DecodingResult, Epochs,
    FeatureKind, PipelineConfig, RunSummary, SubjectData, TaskSet, TfConfig, TrialInfo,
};
use ndarray::{Array2, Array3};

fn subject(n_per_cell: usize, ch_names: &[String], n_times: usize) -> SubjectData {
    let trialinfo = factorial_trialinfo(n_per_cell);
    let epochs = epochs_with_effect(&trialinfo, col::TILT_TASK, ch_names, n_times, 200.0, -1.0, 300..400, 2.0);
    SubjectData { id: "07".into(), epochs, trialinfo }
}

#[test]
fn erp_features_follow_decimation_and_crop() {
    let ch: Vec<String> = (0..5).map(|i| format!("E{i}")).collect();
    let mut sub = subject(3, &ch, 600);
    // one practice-block trial is dropped by the exclusion mask
    sub.trialinfo.table[[0, col::BLOCK_NR]] = 2.0;
    let cfg = PipelineConfig { features: FeatureKind::Erp, ..PipelineConfig::default() };

    let (features, info) = prepare_subject(sub, &cfg).unwrap();
    // 200 Hz → 100 Hz, -0.2 … 1.6 s is 181 samples, window 3 leaves 179
    assert_eq!(features.n_times(), 179);
    assert_eq!(features.n_trials(), 8 * 3 - 1);
    assert_eq!(info.n_trials(), 8 * 3 - 1);
    assert_eq!(features.n_features(), 5);
    approx::assert_abs_diff_eq!(features.times[0], -0.2, epsilon = 1e-9);
    // positions are recoded to hemifields
    assert!(info.column(col::POSITION_TARGET).iter().all(|&p| p == 0.0 || p == 1.0));
}

#[test]
fn ersp_features_are_band_power_per_picked_channel() {
    let tf = TfConfig::default();
    let mut ch = tf.picks.clone();
    ch.push("Oz".into());
    let sub = subject(2, &ch, 600);
    let cfg = PipelineConfig { features: FeatureKind::Ersp, ..PipelineConfig::default() };

    let (features, _) = prepare_subject(sub, &cfg).unwrap();
    // 200 Hz / 4 = 50 Hz, -0.6 … 1.6 s is 111 samples, window 3 leaves 109
    assert_eq!(features.n_times(), 109);
    assert_eq!(features.ch_names, tf.picks);
    assert_eq!(features.n_bands, 4);
    assert_eq!(features.n_features(), 80);
    assert_eq!(features.freqs, vec![2.5, 5.5, 10.0, 22.0]);
    assert!(features.matrices[0].iter().all(|&v| v >= 0.0));
}

#[test]
fn missing_picked_channel_is_an_error() {
    let ch: Vec<String> = (0..3).map(|i| format!("E{i}")).collect();
    let sub = subject(2, &ch, 600);
    let err = prepare_subject(sub, &PipelineConfig::default()).unwrap_err();
    assert!(err.to_string().contains("unknown channel"), "{err}");
}

#[test]
fn complete_subjects_are_not_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("VP09_cleaned.set");
    // not a MAT file: loading it would fail
    std::fs::write(&input, b"garbage").unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();

    let cfg = PipelineConfig { tasks: TaskSet::Ersp, ..PipelineConfig::default() };
    for task in TaskSet::Ersp.tasks() {
        std::fs::write(out.join(DecodingResult::file_name(&task.label, "09")), b"done").unwrap();
    }
    let summary = run_subject(&input, &[], &out, &cfg).unwrap();
    assert_eq!(summary, RunSummary { written: 0, existing: 6, undecodable: 0 });

    // one output missing: the subject is loaded and the bad file surfaces
    std::fs::remove_file(out.join(DecodingResult::file_name("task_in_switch_in_bonus", "09"))).unwrap();
    assert!(run_subject(&input, &[], &out, &cfg).is_err());
}

#[test]
fn empty_input_directory_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("channel_labels.txt"), "Fz Cz\nO9 O10\n").unwrap();
    let out = dir.path().join("decoded");
    let summary = run_all(dir.path(), &out, &PipelineConfig::default()).unwrap();
    assert_eq!(summary, RunSummary::default());
    assert!(out.is_dir());
}

#[test]
fn mat_file_is_read_as_trials_channels_times() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("VP04_cleaned.set");
    let ch = channel_names(2);
    let data = Array3::from_shape_fn((3, 2, 4), |(e, c, t)| (1000 * e + 10 * c + t) as f64);
    let table = Array2::from_shape_fn((3, col::N_COLS), |(r, k)| (100 * r + k) as f64);
    let epochs = Epochs::new(data.clone(), ch.clone(), 200.0, -1.0).unwrap();
    write_subject_mat(&path, &epochs, &TrialInfo::new(table.clone()).unwrap());

    let sub = load_subject(&path, &ch, &DatasetConfig::default()).unwrap();
    assert_eq!(sub.id, "04");
    assert_eq!(sub.epochs.data, data);
    assert_eq!(sub.epochs.data[[2, 1, 3]], 2013.0);
    assert_eq!(sub.epochs.ch_names, ch);
    assert_eq!(sub.epochs.sfreq, 200.0);
    approx::assert_abs_diff_eq!(sub.epochs.times()[0], -1.0);
    assert_eq!(sub.trialinfo.table, table);

    // labels file lists one channel too many
    assert!(load_subject(&path, &channel_names(3), &DatasetConfig::default()).is_err());
}

#[test]
fn subjects_are_decoded_from_mat_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cleaned");
    let out = dir.path().join("decoded");
    std::fs::create_dir(&input).unwrap();

    let ch = channel_names(4);
    std::fs::write(input.join("channel_labels.txt"), ch.join(" ")).unwrap();
    let mut info = factorial_trialinfo(20);
    // five color trials of the bonus-switch cell fall into a practice block,
    // leaving 15 against 20 trials: a single bin of 10
    for r in 6 * 20..6 * 20 + 5 {
        info.table[[r, col::BLOCK_NR]] = 1.0;
    }
    // 1.5 s at 200 Hz from -1 s, task set coded on channel 0 throughout
    let epochs = epochs_with_effect(&info, col::TILT_TASK, &ch, 300, 200.0, -1.0, 0..300, 4.0);
    write_subject_mat(&input.join("VP05_cleaned.set"), &epochs, &info);

    let mut cfg = PipelineConfig { features: FeatureKind::Erp, tasks: TaskSet::Ersp, ..PipelineConfig::default() };
    cfg.erp.crop = (0.0, 0.1);
    cfg.decode.classifier = ClassifierKind::Logistic;
    cfg.decode.n_iterations = 1;

    let summary = run_all(&input, &out, &cfg).unwrap();
    assert_eq!(summary, RunSummary { written: 5, existing: 0, undecodable: 1 });
    assert!(!out.join(DecodingResult::file_name("task_in_switch_in_bonus", "05")).exists());

    let res = DecodingResult::load(&out.join(DecodingResult::file_name("task_in_repeat_in_bonus", "05"))).unwrap();
    // 100 Hz after decimation, 0 … 0.1 s is 11 samples, window 3 leaves 9
    assert_eq!(res.acc.len(), 9);
    assert_eq!(res.ch_names, ch);
    assert!(mean(res.acc.as_slice().unwrap()) > 0.9, "{:?}", res.acc);

    let again = run_all(&input, &out, &cfg).unwrap();
    assert_eq!(again, RunSummary { written: 0, existing: 5, undecodable: 1 });
}
