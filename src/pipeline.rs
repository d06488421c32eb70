//! Estimate the peak shapes of many candidate apexes at once.
//!
//! A [`PeakShapeEstimator`] selects the region of interest around each candidate,
//! runs every configured estimator over it, and scores each estimate over a narrower
//! region around the apex so they can be compared directly.
//!
//! ```
//! use mzfit::prelude::*;
//! use mzfit::synthetic::simulate_run;
//!
//! let truth = ShapeEstimate::new(1e4, 500.0, 0.0048, 60.0, 4.25);
//! let data = simulate_run(&[truth], (499.95, 500.05), 0.002, (45.0, 75.0), 1.0);
//!
//! let estimator = PeakShapeEstimator::builder().build().unwrap();
//! let fits = estimator.estimate(&data, &[PeakCandidate::new(0, 500.0, 60.0, 1e4)]);
//! let best = fits[0].best().unwrap();
//! assert!(best.estimate.is_valid());
//! ```
use std::fmt;

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::moments::moment_estimate;
use crate::point::{RawPoint, RawPointSource};
use crate::quality::FitQuality;
use crate::roi::{
    PeakCandidate, RegionOfInterest, RoiSelector, DEFAULT_QUALITY_TOLERANCE, DEFAULT_ROI_TOLERANCE,
};
use crate::shape::{FitError, ShapeEstimate};
use crate::solver::{LogLinearSolver, ShapeEstimator};
use crate::width::{ConfigError, InstrumentType, PeakWidthModel, ResolutionModel, WidthModel};

/// The peak shape estimators a [`PeakShapeEstimator`] can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EstimatorKind {
    /// The apex with the theoretical widths
    Theoretical,
    /// Intensity-weighted moments, see [`moment_estimate`]
    Moments,
    /// See [`LogLinearSolver::guos`]
    Guos,
    /// See [`LogLinearSolver::weighted`]
    Weighted,
    /// See [`LogLinearSolver::constrained`]
    Constrained,
}

impl EstimatorKind {
    pub const DEFAULT: [EstimatorKind; 5] = [
        Self::Theoretical,
        Self::Moments,
        Self::Guos,
        Self::Weighted,
        Self::Constrained,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Theoretical => "theoretical",
            Self::Moments => "moments",
            Self::Guos => "guos",
            Self::Weighted => "weighted",
            Self::Constrained => "constrained",
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ShapeEstimator for EstimatorKind {
    fn estimate(
        &self,
        points: &[RawPoint],
        roi: &RegionOfInterest,
    ) -> Result<ShapeEstimate, FitError> {
        match self {
            Self::Theoretical => {
                let estimate = ShapeEstimate::theoretical(&roi.apex, &roi.width);
                if estimate.is_valid() {
                    Ok(estimate)
                } else {
                    Err(FitError::InsufficientData(0))
                }
            }
            // A single scan has no retention time spread, fall back to the theoretical width
            Self::Moments => moment_estimate(points, Some(&roi.width)),
            Self::Guos => LogLinearSolver::guos().fit(points, roi),
            Self::Weighted => LogLinearSolver::weighted().fit(points, roi),
            Self::Constrained => LogLinearSolver::constrained().fit(points, roi),
        }
    }
}

/// The outcome of one estimator for one peak
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EstimatorReport {
    pub kind: EstimatorKind,
    /// The estimate, or the invalid sentinel when the estimator failed
    pub estimate: ShapeEstimate,
    /// Why the estimator failed, if it did
    pub failure: Option<FitError>,
    /// The goodness of fit over the scoring region, undefined if the estimator failed
    pub quality: FitQuality,
}

impl EstimatorReport {
    /// Record `result`, scoring it over `quality_points` if it succeeded
    pub fn new(
        kind: EstimatorKind,
        result: Result<ShapeEstimate, FitError>,
        quality_points: &[RawPoint],
    ) -> Self {
        match result {
            Ok(estimate) => Self {
                kind,
                estimate,
                failure: None,
                quality: FitQuality::evaluate(&estimate, quality_points),
            },
            Err(err) => Self {
                kind,
                estimate: ShapeEstimate::invalid(),
                failure: Some(err),
                quality: FitQuality::undefined(),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.failure.is_none() && self.estimate.is_valid()
    }

    /// Recover the estimator's result
    pub fn result(&self) -> Result<ShapeEstimate, FitError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.estimate),
        }
    }
}

/// Every estimator's outcome for one candidate peak
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakFit {
    pub candidate: PeakCandidate,
    /// The region the estimators were fit over
    pub roi: RegionOfInterest,
    /// The narrower region the estimates were scored over
    pub quality_roi: RegionOfInterest,
    pub n_points: usize,
    pub n_quality_points: usize,
    pub reports: Vec<EstimatorReport>,
}

impl PeakFit {
    /// The report for `kind`, if that estimator was run
    pub fn get(&self, kind: EstimatorKind) -> Option<&EstimatorReport> {
        self.reports.iter().find(|r| r.kind == kind)
    }

    /// The valid estimate with the highest defined goodness of fit. Ties go to
    /// the estimator configured first.
    pub fn best(&self) -> Option<&EstimatorReport> {
        self.reports
            .iter()
            .filter(|r| r.is_valid() && r.quality.is_defined())
            .fold(None, |best: Option<&EstimatorReport>, r| match best {
                Some(b) if !r.quality.compare(&b.quality).is_gt() => Some(b),
                _ => Some(r),
            })
    }

    /// Whether any estimator produced a valid estimate
    pub fn has_valid(&self) -> bool {
        self.reports.iter().any(|r| r.is_valid())
    }
}

/// Fits peak shapes around candidate apexes, see the [module documentation](self)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakShapeEstimator {
    pub width_model: PeakWidthModel,
    pub selector: RoiSelector,
    pub estimators: Vec<EstimatorKind>,
}

impl PeakShapeEstimator {
    /// Create a new estimator, checking that the configuration is usable
    pub fn new(
        width_model: PeakWidthModel,
        selector: RoiSelector,
        estimators: Vec<EstimatorKind>,
    ) -> Result<Self, ConfigError> {
        width_model.validate()?;
        if !(selector.tolerance > 0.0 && selector.tolerance.is_finite()) {
            return Err(ConfigError::InvalidTolerance("fitting", selector.tolerance));
        }
        if !(selector.quality_tolerance > 0.0 && selector.quality_tolerance.is_finite()) {
            return Err(ConfigError::InvalidTolerance(
                "quality",
                selector.quality_tolerance,
            ));
        }
        if estimators.is_empty() {
            return Err(ConfigError::NoEstimators);
        }
        Ok(Self {
            width_model,
            selector,
            estimators,
        })
    }

    pub fn builder() -> PeakShapeEstimatorBuilder {
        PeakShapeEstimatorBuilder::new()
    }

    /// Run every configured estimator on the peak at `candidate`.
    ///
    /// Failures are recorded in the returned [`PeakFit`] and never abort the peak.
    pub fn fit_peak<S: RawPointSource + ?Sized>(
        &self,
        source: &S,
        candidate: &PeakCandidate,
    ) -> PeakFit {
        let width = self.width_model.theoretical_width(candidate.mz);
        let fitting = self.selector.select(source, *candidate, &width);
        let scoring = self.selector.select_quality(source, *candidate, &width);

        let reports: Vec<EstimatorReport> = self
            .estimators
            .iter()
            .map(|kind| {
                let result = kind.estimate(&fitting.points, &fitting.roi);
                if let Err(err) = &result {
                    log::trace!("{kind} failed for {candidate}: {err}");
                }
                EstimatorReport::new(*kind, result, &scoring.points)
            })
            .collect();

        let fit = PeakFit {
            candidate: *candidate,
            n_points: fitting.len(),
            n_quality_points: scoring.len(),
            roi: fitting.roi,
            quality_roi: scoring.roi,
            reports,
        };
        match fit.best() {
            Some(best) => log::debug!(
                "{candidate} best fit by {} over {} points with {}",
                best.kind,
                fit.n_points,
                best.quality
            ),
            None => log::debug!(
                "{candidate} has no scorable fit over {} points",
                fit.n_points
            ),
        }
        fit
    }

    /// Fit every candidate in `candidates`, returning one [`PeakFit`] per candidate
    /// in the same order.
    ///
    /// With the `parallelism` feature the candidates are processed in parallel.
    pub fn estimate<S: RawPointSource + Sync + ?Sized>(
        &self,
        source: &S,
        candidates: &[PeakCandidate],
    ) -> Vec<PeakFit> {
        log::debug!("Estimating peak shapes for {} candidates", candidates.len());
        fit_all(self, source, candidates)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallelism")] {
        fn fit_all<S: RawPointSource + Sync + ?Sized>(
            estimator: &PeakShapeEstimator,
            source: &S,
            candidates: &[PeakCandidate],
        ) -> Vec<PeakFit> {
            candidates
                .par_iter()
                .map(|candidate| estimator.fit_peak(source, candidate))
                .collect()
        }
    } else {
        fn fit_all<S: RawPointSource + Sync + ?Sized>(
            estimator: &PeakShapeEstimator,
            source: &S,
            candidates: &[PeakCandidate],
        ) -> Vec<PeakFit> {
            candidates
                .iter()
                .map(|candidate| estimator.fit_peak(source, candidate))
                .collect()
        }
    }
}

/// A builder for configuring [`PeakShapeEstimator`]
#[derive(Debug, Clone, PartialEq)]
pub struct PeakShapeEstimatorBuilder {
    width_model: PeakWidthModel,
    tolerance: f64,
    quality_tolerance: f64,
    estimators: Vec<EstimatorKind>,
}

impl Default for PeakShapeEstimatorBuilder {
    fn default() -> Self {
        Self {
            width_model: PeakWidthModel::default(),
            tolerance: DEFAULT_ROI_TOLERANCE,
            quality_tolerance: DEFAULT_QUALITY_TOLERANCE,
            estimators: EstimatorKind::DEFAULT.to_vec(),
        }
    }
}

impl PeakShapeEstimatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width_model(&mut self, width_model: PeakWidthModel) -> &mut Self {
        self.width_model = width_model;
        self
    }

    pub fn instrument(&mut self, instrument: InstrumentType) -> &mut Self {
        self.width_model.resolution.instrument = instrument;
        self
    }

    pub fn resolution(&mut self, resolution: f64) -> &mut Self {
        self.width_model.resolution.resolution = resolution;
        self
    }

    pub fn reference_mz(&mut self, reference_mz: f64) -> &mut Self {
        self.width_model.resolution.reference_mz = reference_mz;
        self
    }

    pub fn resolution_model(&mut self, resolution: ResolutionModel) -> &mut Self {
        self.width_model.resolution = resolution;
        self
    }

    pub fn avg_fwhm_rt(&mut self, avg_fwhm_rt: f64) -> &mut Self {
        self.width_model.avg_fwhm_rt = avg_fwhm_rt;
        self
    }

    pub fn tolerance(&mut self, tolerance: f64) -> &mut Self {
        self.tolerance = tolerance;
        self
    }

    pub fn quality_tolerance(&mut self, quality_tolerance: f64) -> &mut Self {
        self.quality_tolerance = quality_tolerance;
        self
    }

    /// Replace the set of estimators to run
    pub fn estimators<I: IntoIterator<Item = EstimatorKind>>(&mut self, estimators: I) -> &mut Self {
        self.estimators = estimators.into_iter().collect();
        self
    }

    pub fn add_estimator(&mut self, kind: EstimatorKind) -> &mut Self {
        self.estimators.push(kind);
        self
    }

    pub fn build(&self) -> Result<PeakShapeEstimator, ConfigError> {
        PeakShapeEstimator::new(
            self.width_model,
            RoiSelector::new(self.tolerance, self.quality_tolerance),
            self.estimators.clone(),
        )
    }
}

impl TryFrom<PeakShapeEstimatorBuilder> for PeakShapeEstimator {
    type Error = ConfigError;

    fn try_from(value: PeakShapeEstimatorBuilder) -> Result<Self, Self::Error> {
        value.build()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::point::RawData;
    use crate::synthetic::simulate_run;
    use rstest::{fixture, rstest};

    fn truths(model: &PeakWidthModel) -> Vec<ShapeEstimate> {
        [(500.0, 60.0, 1e5), (500.3, 75.0, 4e4)]
            .into_iter()
            .map(|(mz, rt, height)| {
                let width = model.theoretical_width(mz);
                ShapeEstimate::new(height, mz, width.sigma_mz, rt, width.sigma_rt)
            })
            .collect()
    }

    #[fixture]
    #[once]
    fn run() -> (Vec<ShapeEstimate>, RawData) {
        let shapes = truths(&PeakWidthModel::default());
        let data = simulate_run(&shapes, (499.95, 500.35), 0.002, (40.0, 95.0), 1.0);
        (shapes, data)
    }

    fn candidates(shapes: &[ShapeEstimate]) -> Vec<PeakCandidate> {
        shapes
            .iter()
            .enumerate()
            .map(|(i, s)| PeakCandidate::new(i, s.mz, s.rt, s.height))
            .collect()
    }

    #[rstest]
    #[test_log::test]
    fn test_estimate_recovers(run: &(Vec<ShapeEstimate>, RawData)) {
        let (shapes, data) = run;
        let estimator = PeakShapeEstimator::builder().build().unwrap();
        let fits = estimator.estimate(data, &candidates(shapes));
        assert_eq!(fits.len(), 2);

        for (fit, truth) in fits.iter().zip(shapes.iter()) {
            assert_eq!(fit.reports.len(), EstimatorKind::DEFAULT.len());
            assert!(fit.n_quality_points < fit.n_points);
            for kind in [EstimatorKind::Guos, EstimatorKind::Weighted, EstimatorKind::Constrained] {
                let report = fit.get(kind).unwrap();
                let est = report.result().unwrap();
                assert!(((est.sigma_mz - truth.sigma_mz) / truth.sigma_mz).abs() < 1e-6, "{kind} {est}");
                assert!(((est.sigma_rt - truth.sigma_rt) / truth.sigma_rt).abs() < 1e-6, "{kind} {est}");
                assert!(((est.height - truth.height) / truth.height).abs() < 1e-6, "{kind} {est}");
                let r2 = report.quality.r_squared.unwrap();
                assert!((r2 - 1.0).abs() < 1e-9, "{kind} {r2}");
            }
            let moments = fit.get(EstimatorKind::Moments).unwrap();
            assert!(moments.is_valid());
            assert!((moments.estimate.mz - truth.mz).abs() < truth.sigma_mz / 10.0);

            let best = fit.best().unwrap();
            assert!(best.quality.r_squared.unwrap() > 0.999);
        }
    }

    #[rstest]
    fn test_estimate_preserves_order(run: &(Vec<ShapeEstimate>, RawData)) {
        let (shapes, data) = run;
        let mut cands = candidates(shapes);
        cands.reverse();
        cands.push(PeakCandidate::new(7, 900.0, 10.0, 100.0));
        let estimator = PeakShapeEstimator::builder().build().unwrap();
        let fits = estimator.estimate(data, &cands);
        let ids: Vec<usize> = fits.iter().map(|f| f.candidate.id).collect();
        assert_eq!(ids, vec![1, 0, 7]);

        // The stray candidate fails without disturbing the others
        let empty = &fits[2];
        assert_eq!(empty.n_points, 0);
        assert!(empty.best().is_none());
        assert_eq!(
            empty.get(EstimatorKind::Moments).unwrap().failure,
            Some(FitError::InsufficientData(0))
        );
        let theoretical = empty.get(EstimatorKind::Theoretical).unwrap();
        assert!(theoretical.is_valid());
        assert!(!theoretical.quality.is_defined());
        for report in empty.reports.iter().filter(|r| !r.is_valid()) {
            assert!(report.estimate.height.is_nan());
        }
        assert!(fits[0].best().is_some());
    }

    #[rstest]
    fn test_repeatable(run: &(Vec<ShapeEstimate>, RawData)) {
        let (shapes, data) = run;
        let estimator = PeakShapeEstimator::builder().build().unwrap();
        let cands = candidates(shapes);
        assert_eq!(estimator.estimate(data, &cands), estimator.estimate(data, &cands));
        assert_eq!(
            estimator.estimate(data.points(), &cands),
            estimator.estimate(data, &cands)
        );
    }

    #[test]
    fn test_single_scan() {
        let data: RawData = [10.0, 80.0, 100.0, 75.0, 12.0]
            .into_iter()
            .enumerate()
            .map(|(i, inten)| RawPoint::new(100.0 + 0.1 * i as f64, 50.0, inten))
            .collect();
        let estimator = PeakShapeEstimator::builder()
            .instrument(InstrumentType::TOF)
            .resolution(500.0)
            .build()
            .unwrap();
        let fit = estimator.fit_peak(&data, &PeakCandidate::new(0, 100.2, 50.0, 100.0));
        assert_eq!(fit.n_points, 5);

        let moments = fit.get(EstimatorKind::Moments).unwrap();
        assert!((moments.estimate.mz - 100.2).abs() < 0.05);
        assert_eq!(moments.estimate.sigma_rt, fit.roi.width.sigma_rt);

        let guos = fit.get(EstimatorKind::Guos).unwrap();
        assert!(matches!(guos.failure, Some(FitError::DegenerateFit { .. })));
        assert!(!guos.estimate.is_valid());
    }

    #[rstest]
    #[case::on_scan(50.0)]
    #[case::between_scans(50.3)]
    #[test_log::test]
    fn test_single_scan_intensity_scale(#[case] apex_rt: f64) {
        let estimator = PeakShapeEstimator::builder()
            .instrument(InstrumentType::TOF)
            .resolution(500.0)
            .build()
            .unwrap();
        let fits: Vec<PeakFit> = [1.0, 1e-3]
            .into_iter()
            .map(|scale| {
                let data: RawData = [10.0, 80.0, 100.0, 75.0, 12.0]
                    .into_iter()
                    .enumerate()
                    .map(|(i, inten)| RawPoint::new(100.0 + 0.1 * i as f64, 50.0, inten * scale))
                    .collect();
                estimator.fit_peak(&data, &PeakCandidate::new(0, 100.2, apex_rt, 100.0 * scale))
            })
            .collect();

        for kind in [EstimatorKind::Guos, EstimatorKind::Weighted, EstimatorKind::Constrained] {
            let unscaled = fits[0].get(kind).unwrap();
            let scaled = fits[1].get(kind).unwrap();
            for report in [unscaled, scaled] {
                assert!(!report.is_valid(), "{kind} {:?}", report.estimate);
                assert!(
                    matches!(report.failure, Some(FitError::DegenerateFit { e, .. }) if e == 0.0),
                    "{kind} {:?}",
                    report.failure
                );
                assert!(!report.quality.is_defined());
            }
        }
    }

    #[test]
    fn test_configuration_errors() {
        assert_eq!(
            PeakShapeEstimator::builder().tolerance(-1.0).build(),
            Err(ConfigError::InvalidTolerance("fitting", -1.0))
        );
        assert_eq!(
            PeakShapeEstimator::builder().quality_tolerance(0.0).build(),
            Err(ConfigError::InvalidTolerance("quality", 0.0))
        );
        assert_eq!(
            PeakShapeEstimator::builder().resolution(0.0).build(),
            Err(ConfigError::InvalidResolution(0.0))
        );
        assert_eq!(
            PeakShapeEstimator::builder().avg_fwhm_rt(f64::INFINITY).build(),
            Err(ConfigError::InvalidRetentionTimeWidth(f64::INFINITY))
        );
        assert_eq!(
            PeakShapeEstimator::builder().estimators(Vec::new()).build(),
            Err(ConfigError::NoEstimators)
        );

        let mut builder = PeakShapeEstimator::builder();
        builder.estimators([EstimatorKind::Moments]).add_estimator(EstimatorKind::Weighted);
        let estimator = PeakShapeEstimator::try_from(builder).unwrap();
        assert_eq!(
            estimator.estimators,
            vec![EstimatorKind::Moments, EstimatorKind::Weighted]
        );
    }

    #[test]
    fn test_best_prefers_defined() {
        let shape = ShapeEstimate::new(10.0, 100.0, 0.1, 10.0, 1.0);
        let fit = PeakFit {
            candidate: PeakCandidate::new(0, 100.0, 10.0, 10.0),
            roi: RegionOfInterest::around(
                PeakCandidate::new(0, 100.0, 10.0, 10.0),
                &crate::width::TheoreticalWidth::new(0.1, 1.0),
                2.5,
            ),
            quality_roi: RegionOfInterest::around(
                PeakCandidate::new(0, 100.0, 10.0, 10.0),
                &crate::width::TheoreticalWidth::new(0.1, 1.0),
                1.0,
            ),
            n_points: 0,
            n_quality_points: 0,
            reports: vec![
                EstimatorReport {
                    kind: EstimatorKind::Theoretical,
                    estimate: shape,
                    failure: None,
                    quality: FitQuality::undefined(),
                },
                EstimatorReport {
                    kind: EstimatorKind::Moments,
                    estimate: shape,
                    failure: None,
                    quality: FitQuality::new(-0.5),
                },
                EstimatorReport {
                    kind: EstimatorKind::Guos,
                    estimate: shape,
                    failure: None,
                    quality: FitQuality::new(0.5),
                },
                EstimatorReport {
                    kind: EstimatorKind::Weighted,
                    estimate: shape,
                    failure: None,
                    quality: FitQuality::new(0.5),
                },
                EstimatorReport::new(
                    EstimatorKind::Constrained,
                    Err(FitError::SingularSystem),
                    &[],
                ),
            ],
        };
        assert_eq!(fit.best().unwrap().kind, EstimatorKind::Guos);
        assert!(fit.has_valid());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_config() {
        let estimator = PeakShapeEstimator::builder()
            .instrument(InstrumentType::FTICR)
            .estimators([EstimatorKind::Guos, EstimatorKind::Constrained])
            .build()
            .unwrap();
        let text = serde_json::to_string(&estimator).unwrap();
        let dup: PeakShapeEstimator = serde_json::from_str(&text).unwrap();
        assert_eq!(estimator, dup);
    }
}
