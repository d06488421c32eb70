//! Noise-free synthetic LC-MS data for exercising the estimators.
use crate::point::{RawData, RawPoint};
use crate::shape::ShapeEstimate;

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Sample the sum of `shapes` at every pair of coordinates in `mz_axis` by `rt_axis`
pub fn sample_grid(shapes: &[ShapeEstimate], mz_axis: &[f64], rt_axis: &[f64]) -> Vec<RawPoint> {
    let mut points = Vec::with_capacity(mz_axis.len() * rt_axis.len());
    for rt in rt_axis.iter().copied() {
        for mz in mz_axis.iter().copied() {
            let intensity: f64 = shapes.iter().map(|s| s.density(mz, rt)).sum();
            points.push(RawPoint::new(mz, rt, intensity));
        }
    }
    points
}

/// Sample a single peak on an `n` by `n` grid spanning `extent` standard
/// deviations on either side of its center along each axis
pub fn gaussian_grid(shape: &ShapeEstimate, extent: f64, n: usize) -> Vec<RawPoint> {
    let mz_axis = linspace(
        shape.mz - extent * shape.sigma_mz,
        shape.mz + extent * shape.sigma_mz,
        n,
    );
    let rt_axis = linspace(
        shape.rt - extent * shape.sigma_rt,
        shape.rt + extent * shape.sigma_rt,
        n,
    );
    sample_grid(&[*shape], &mz_axis, &rt_axis)
}

/// Build a [`RawData`] holding several peaks sampled on a common grid, with
/// `mz_step` and `rt_step` spacing covering the given ranges
pub fn simulate_run(
    shapes: &[ShapeEstimate],
    mz_range: (f64, f64),
    mz_step: f64,
    rt_range: (f64, f64),
    rt_step: f64,
) -> RawData {
    let n_mz = ((mz_range.1 - mz_range.0) / mz_step).round() as usize + 1;
    let n_rt = ((rt_range.1 - rt_range.0) / rt_step).round() as usize + 1;
    let mz_axis = linspace(mz_range.0, mz_range.0 + mz_step * (n_mz - 1) as f64, n_mz);
    let rt_axis = linspace(rt_range.0, rt_range.0 + rt_step * (n_rt - 1) as f64, n_rt);
    sample_grid(shapes, &mz_axis, &rt_axis).into_iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peak_statistics::isclose;

    #[test]
    fn test_linspace() {
        let xs = linspace(1.0, 2.0, 5);
        assert_eq!(xs.len(), 5);
        assert_eq!(xs[0], 1.0);
        assert_eq!(xs[4], 2.0);
        assert!(isclose(xs[1], 1.25));
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 1.0, 1), vec![3.0]);
    }

    #[test]
    fn test_gaussian_grid() {
        let shape = ShapeEstimate::new(1000.0, 500.0, 0.005, 60.0, 4.0);
        let points = gaussian_grid(&shape, 2.0, 9);
        assert_eq!(points.len(), 81);
        let apex = points
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
            .unwrap();
        assert!(isclose(apex.intensity, 1000.0));
        assert!(isclose(apex.mz, 500.0));
        assert!(isclose(apex.rt, 60.0));
    }

    #[test]
    fn test_simulate_run() {
        let shapes = [
            ShapeEstimate::new(1000.0, 500.0, 0.005, 60.0, 4.0),
            ShapeEstimate::new(500.0, 501.0, 0.005, 80.0, 4.0),
        ];
        let data = simulate_run(&shapes, (499.9, 501.1), 0.002, (40.0, 100.0), 0.5);
        assert_eq!(data.len(), 601 * 121);
        let (lo, hi) = data.rt_range().unwrap();
        assert_eq!(lo, 40.0);
        assert!(isclose(hi, 100.0));
    }
}
