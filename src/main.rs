use std::io;
use std::time::Instant;

use mzfit::prelude::*;
use mzfit::synthetic::simulate_run;

fn main() -> io::Result<()> {
    let model = PeakWidthModel::default();
    let shapes: Vec<ShapeEstimate> = [
        (499.95, 42.0, 2e5),
        (500.0, 60.0, 1e5),
        (500.02, 66.0, 3e4),
        (500.3, 90.0, 5e4),
    ]
    .into_iter()
    .map(|(mz, rt, height)| {
        let width = model.theoretical_width(mz);
        ShapeEstimate::new(height, mz, width.sigma_mz * 1.2, rt, width.sigma_rt * 0.8)
    })
    .collect();

    let start = Instant::now();
    let data = simulate_run(&shapes, (499.9, 500.4), 0.001, (30.0, 100.0), 0.5);
    println!(
        "Simulated {} points in {} milliseconds",
        data.len(),
        (Instant::now() - start).as_millis()
    );

    let candidates: Vec<PeakCandidate> = shapes
        .iter()
        .enumerate()
        .map(|(i, s)| PeakCandidate::new(i, s.mz, s.rt, s.height))
        .collect();

    let estimator = match PeakShapeEstimator::builder().width_model(model).build() {
        Ok(estimator) => estimator,
        Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidInput, err)),
    };

    let start = Instant::now();
    let fits = estimator.estimate(&data, &candidates);
    println!(
        "Estimated {} peaks in {} milliseconds",
        fits.len(),
        (Instant::now() - start).as_millis()
    );

    for (fit, truth) in fits.iter().zip(shapes.iter()) {
        println!("{} over {} points", fit.candidate, fit.n_points);
        println!("\ttruth {truth}");
        for report in fit.reports.iter() {
            match report.failure {
                Some(err) => println!("\t{}: {err}", report.kind),
                None => println!("\t{}: {} {}", report.kind, report.estimate, report.quality),
            }
        }
        if let Some(best) = fit.best() {
            println!("\tbest: {}", best.kind);
        }
    }
    Ok(())
}
