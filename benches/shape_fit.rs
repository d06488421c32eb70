use criterion::Criterion;

use mzfit::prelude::*;
use mzfit::synthetic::simulate_run;
use mzfit::{LogLinearSolver, RoiSelector};

fn run() -> (Vec<PeakCandidate>, RawData) {
    let model = PeakWidthModel::default();
    let shapes: Vec<ShapeEstimate> = (0..20)
        .map(|i| {
            let mz = 500.0 + 0.05 * i as f64;
            let width = model.theoretical_width(mz);
            ShapeEstimate::new(1e5, mz, width.sigma_mz, 40.0 + 2.0 * i as f64, width.sigma_rt)
        })
        .collect();
    let data = simulate_run(&shapes, (499.95, 501.0), 0.001, (20.0, 100.0), 0.5);
    let candidates = shapes
        .iter()
        .enumerate()
        .map(|(i, s)| PeakCandidate::new(i, s.mz, s.rt, s.height))
        .collect();
    (candidates, data)
}

fn solvers(c: &mut Criterion) {
    let (candidates, data) = run();
    let candidate = candidates[0];
    let width = PeakWidthModel::default().theoretical_width(candidate.mz);
    let selected = RoiSelector::default().select(&data, candidate, &width);

    c.bench_function("select_roi", |b| {
        b.iter(|| RoiSelector::default().select(&data, candidate, &width))
    });
    c.bench_function("guos", |b| {
        b.iter(|| LogLinearSolver::guos().fit(&selected.points, &selected.roi))
    });
    c.bench_function("weighted", |b| {
        b.iter(|| LogLinearSolver::weighted().fit(&selected.points, &selected.roi))
    });
    c.bench_function("constrained", |b| {
        b.iter(|| LogLinearSolver::constrained().fit(&selected.points, &selected.roi))
    });
}

fn pipeline(c: &mut Criterion) {
    let (candidates, data) = run();
    let estimator = PeakShapeEstimator::builder().build().unwrap();
    c.bench_function("estimate_all", |b| {
        b.iter(|| estimator.estimate(&data, &candidates))
    });
}

fn fitting(c: &mut Criterion) {
    solvers(c);
    pipeline(c);
}

criterion::criterion_group!(benches, fitting);
criterion::criterion_main!(benches);
