use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use eeg_decoding::{decode_timeslice, morlet, tfr_power, ClassifierKind, DecodeConfig, Epochs};
use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 80 trials × 40 features, class 1 shifted on the first four features.
fn timeslice() -> (Array2<f64>, Array1<u8>) {
    let mut rng = StdRng::seed_from_u64(3);
    let y: Array1<u8> = (0..80).map(|i| (i % 2) as u8).collect();
    let x = Array2::from_shape_fn((80, 40), |(i, j)| {
        let shift = if j < 4 && y[i] == 1 { 0.8 } else { 0.0 };
        rng.gen_range(-1.0..1.0) + shift
    });
    (x, y)
}

fn bench_classifier(c: &mut Criterion, kind: ClassifierKind, name: &str) {
    let (x, y) = timeslice();
    let cfg = DecodeConfig { classifier: kind, n_iterations: 1, ..DecodeConfig::default() };
    c.bench_function(name, |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(42);
            let res = decode_timeslice(black_box(x.view()), y.view(), &cfg, &mut rng).unwrap();
            black_box(res.accuracy)
        })
    });
}

fn bench_forest(c: &mut Criterion) {
    bench_classifier(c, ClassifierKind::Forest, "decode_timeslice forest [80×40]");
}

fn bench_svm(c: &mut Criterion) {
    bench_classifier(c, ClassifierKind::Svm, "decode_timeslice svm [80×40]");
}

fn bench_logistic(c: &mut Criterion) {
    bench_classifier(c, ClassifierKind::Logistic, "decode_timeslice logistic [80×40]");
}

fn bench_tfr(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(5);
    let data = Array3::from_shape_fn((10, 4, 600), |_| rng.gen_range(-1.0..1.0));
    let names: Vec<String> = (0..4).map(|i| format!("E{i}")).collect();
    let epochs = Epochs::new(data, names, 200.0, -1.0).unwrap();
    let freqs: Vec<f64> = (0..50).map(|i| 2.0 + 28.0 * i as f64 / 49.0).collect();
    let cycles: Vec<f64> = (0..50).map(|i| 3.0 + 9.0 * i as f64 / 49.0).collect();
    c.bench_function("tfr_power [10×4×600, 50 freqs]", |b| {
        b.iter(|| {
            let p = tfr_power(black_box(&epochs), &freqs, &cycles, 4).unwrap();
            black_box(p.len())
        })
    });
    c.bench_function("morlet family [50 freqs]", |b| {
        b.iter(|| black_box(morlet(200.0, black_box(&freqs), &cycles, true).len()))
    });
}

criterion_group!(benches, bench_forest, bench_svm, bench_logistic, bench_tfr);
criterion_main!(benches);
