//! `mzfit` estimates the shape of LC-MS peaks, two dimensional Gaussians in m/z by
//! retention time, from the raw points surrounding a candidate apex.
//!
//! Several estimators are provided, from the cheap to the careful:
//!
//! - the apex paired with theoretical widths from the instrument's resolving power,
//!   see [`crate::width`]
//! - intensity-weighted moments, see [`crate::moments`]
//! - closed-form weighted least squares over the log-intensity, see [`crate::solver`]
//!
//! Each is scored by its $`R^2`$ over a narrow region around the apex so their
//! estimates can be compared, see [`crate::quality`].
//!
//! The [`PeakShapeEstimator`] runs the lot over many candidate peaks at once.
//!
//! # Usage
//! ```
//! use mzfit::prelude::*;
//! use mzfit::synthetic::simulate_run;
//!
//! let model = PeakWidthModel::default();
//! let width = model.theoretical_width(500.0);
//! let truth = ShapeEstimate::new(5e4, 500.0, width.sigma_mz, 60.0, width.sigma_rt);
//! let data = simulate_run(&[truth], (499.95, 500.05), 0.002, (40.0, 80.0), 1.0);
//!
//! let estimator = PeakShapeEstimator::builder().width_model(model).build().unwrap();
//! let fit = estimator.fit_peak(&data, &PeakCandidate::new(0, 500.0, 60.0, 5e4));
//! let weighted = fit.get(EstimatorKind::Weighted).unwrap().result().unwrap();
//! assert!((weighted.sigma_rt - width.sigma_rt).abs() < 1e-6);
//! for report in fit.reports.iter() {
//!     println!("{}: {} {}", report.kind, report.estimate, report.quality);
//! }
//! ```
//!
//! ## Building
//! By default the least squares solves use `nalgebra`. To use a LAPACK implementation
//! through `ndarray-linalg` instead, enable one of the `openblas`, `netlib`, or
//! `intel-mkl` features.
pub mod linear;
pub mod moments;
pub mod peak_statistics;
pub mod pipeline;
pub mod point;
pub mod quality;
pub mod roi;
pub mod search;
pub mod shape;
pub mod solver;
pub mod synthetic;
pub mod width;

pub mod prelude;

pub use crate::moments::moment_estimate;
pub use crate::pipeline::{
    EstimatorKind, EstimatorReport, PeakFit, PeakShapeEstimator, PeakShapeEstimatorBuilder,
};
pub use crate::point::{RawData, RawPoint, RawPointSource};
pub use crate::quality::{r_squared, FitQuality};
pub use crate::roi::{PeakCandidate, RegionOfInterest, RoiSelector};
pub use crate::shape::{FitError, GaussianProfile, ShapeEstimate};
pub use crate::solver::{Axis, LogLinearSolver, ProfileSolver, ShapeEstimator};
pub use crate::width::{
    ConfigError, InstrumentType, PeakWidthModel, ResolutionModel, TheoreticalWidth, WidthModel,
};
