use criterion::{criterion_group, criterion_main, Criterion};
use mamdani::engine::MamdaniEngine;
use mamdani::fz::parse_str;
use std::collections::HashMap;
use std::hint::black_box;

const TIPPING: &str = "\
var input service 0 10
mf service poor tri 0 0 5
mf service good tri 0 5 10
mf service excellent tri 5 10 10
var input food 0 10
mf food rancid trap 0 0 1 3
mf food delicious trap 7 9 10 10
var output tip 0 30
mf tip low tri 0 0 13
mf tip medium tri 0 13 26
mf tip high tri 13 26 30
rule IF service is poor AND food is rancid THEN tip is low
rule IF service is good THEN tip is medium
rule IF service is excellent AND food is delicious THEN tip is high
defuzz centroid grid 0 30 201
";

fn bench_predict(c: &mut Criterion) {
    let kb = parse_str(TIPPING).unwrap();
    let engine = MamdaniEngine::new(&kb);
    let sample: HashMap<String, f64> =
        HashMap::from([("service".to_string(), 6.5), ("food".to_string(), 8.0)]);

    c.bench_function("predict tipping", |b| {
        b.iter(|| black_box(engine.predict(black_box(&sample))))
    });

    c.bench_function("parse tipping", |b| b.iter(|| black_box(parse_str(TIPPING).unwrap())));
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
