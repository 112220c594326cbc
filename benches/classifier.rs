use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netshield_service::core::classifier::{
    Classifier, ClassifierConfig, FeatureVector, NoPerturbation,
};

fn classifier_benchmark(c: &mut Criterion) {
    let classifier =
        Classifier::with_perturbation(ClassifierConfig::default(), Box::new(NoPerturbation));
    let features = FeatureVector {
        protocol_type: "tcp".to_string(),
        service: "http".to_string(),
        flag: "SF".to_string(),
        count: 600,
        src_bytes: 20_000,
        dst_host_count: 150,
        same_srv_rate: 0.05,
        ..Default::default()
    };

    c.bench_function("classify_flood_vector", |b| {
        b.iter(|| classifier.classify(black_box(&features)))
    });
}

criterion_group!(benches, classifier_benchmark);
criterion_main!(benches);
