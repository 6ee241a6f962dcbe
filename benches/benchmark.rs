use criterion::{Criterion, black_box, criterion_group, criterion_main};
use feature_tracking::config::{DescriptorType, DetectorType};
use feature_tracking::descriptor::create_extractor;
use feature_tracking::detector::create_detector;
use feature_tracking::matcher::brute_force;
use feature_tracking::matcher::flann::FlannIndex;
use feature_tracking::synthetic::SyntheticSequence;
use feature_tracking::types::DescriptorMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_binary(rows: usize, seed: u64) -> DescriptorMatrix<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    DescriptorMatrix::from_rows(64, (0..rows * 64).map(|_| rng.random()).collect())
}

fn random_float(rows: usize, seed: u64) -> DescriptorMatrix<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    DescriptorMatrix::from_rows(
        128,
        (0..rows * 128).map(|_| rng.random_range(0.0..255.0)).collect(),
    )
}

fn bench_matchers(c: &mut Criterion) {
    let (src, dst) = (random_binary(1000, 0), random_binary(1000, 1));
    c.bench_function("brute_force_binary_knn2", |b| {
        b.iter(|| brute_force::knn_match(black_box(&src), black_box(&dst), 2))
    });
    c.bench_function("flann_binary_knn2", |b| {
        b.iter(|| FlannIndex::build(black_box(&dst)).knn_match(black_box(&src), 2))
    });
    c.bench_function("flann_binary_knn2_128_checks", |b| {
        b.iter(|| {
            FlannIndex::build(black_box(&dst))
                .with_checks(128)
                .knn_match(black_box(&src), 2)
        })
    });

    let (src, dst) = (random_float(1000, 2), random_float(1000, 3));
    c.bench_function("brute_force_float_knn2", |b| {
        b.iter(|| brute_force::knn_match(black_box(&src), black_box(&dst), 2))
    });
    c.bench_function("flann_float_knn2", |b| {
        b.iter(|| FlannIndex::build(black_box(&dst)).knn_match(black_box(&src), 2))
    });
}

fn bench_detect_describe(c: &mut Criterion) {
    let img = SyntheticSequence {
        width: 620,
        height: 188,
        ..Default::default()
    }
    .frame(0);
    let fast = create_detector(DetectorType::Fast);
    c.bench_function("fast_detect", |b| b.iter(|| fast.detect(black_box(&img))));

    let keypoints = fast.detect(&img);
    for kind in [DescriptorType::Brisk, DescriptorType::Sift] {
        let extractor = create_extractor(kind);
        c.bench_function(&format!("{}_compute", kind), |b| {
            b.iter(|| extractor.compute(black_box(&img), black_box(&keypoints)))
        });
    }
}

criterion_group!(benches, bench_matchers, bench_detect_describe);
criterion_main!(benches);
