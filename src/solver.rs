//! Closed-form peak shape estimation by weighted log-linear least squares.
//!
//! Every solver here follows the same recipe:
//!
//! 1. Discard points without a positive intensity.
//! 2. Choose an anchor and express coordinates as offsets from it.
//! 3. Accumulate a [`WeightedLinearSystem`] regressing $`\log I`$ against the basis.
//! 4. Solve it, reject non-concave curvature, and read the peak parameters
//!    back out of the coefficients.
//!
//! The variants differ only in the weight each point carries, the basis, and the
//! anchor, and are expressed as configurations of [`LogLinearSolver`] for the two
//! dimensional fits and [`ProfileSolver`] for fits along a single axis.
//!
//! | Variant | Weight | Basis | Anchor |
//! |---|---|---|---|
//! | [`LogLinearSolver::guos`] | intensity | $`\{1, x, x^2, y, y^2\}`$ | intensity-weighted mean |
//! | [`LogLinearSolver::weighted`] | theoretical peak | $`\{1, x, x^2, y, y^2\}`$ | apex |
//! | [`LogLinearSolver::constrained`] | theoretical peak | $`\{1, x^2, y^2\}`$ | apex |
//! | [`ProfileSolver::caruana`] | uniform | $`\{1, x, x^2\}`$ | mean |
//! | [`ProfileSolver::guos`] | intensity | $`\{1, x, x^2\}`$ | intensity-weighted mean |
use mzpeaks::{CoordinateLike, Time, MZ};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::linear::{Basis, WeightedLinearSystem};
use crate::peak_statistics::{mean, weighted_mean_variance};
use crate::point::RawPoint;
use crate::roi::{PeakCandidate, RegionOfInterest};
use crate::shape::{FitError, GaussianProfile, ShapeEstimate};

/// Anything that can produce a [`ShapeEstimate`] from the points of a region of interest
pub trait ShapeEstimator {
    /// Estimate the peak shape of `points`, which were selected from `roi`.
    ///
    /// Implementations must be pure: the same inputs always produce the same output.
    fn estimate(
        &self,
        points: &[RawPoint],
        roi: &RegionOfInterest,
    ) -> Result<ShapeEstimate, FitError>;
}

/// The weight a point carries in the least squares fit. The point's contribution
/// to the normal equations is scaled by the square of this weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WeightFunction {
    /// The observed intensity, favoring the tallest points
    Intensity,
    /// The unit-height theoretical peak centered on the apex, favoring points near it
    Theoretical,
    /// Every point counts equally
    Uniform,
}

impl WeightFunction {
    #[inline]
    pub fn weight(&self, point: &RawPoint, roi: &RegionOfInterest) -> f64 {
        match self {
            Self::Intensity => point.intensity,
            Self::Theoretical => roi
                .width
                .unit_density(point.mz - roi.apex.mz, point.rt - roi.apex.rt),
            Self::Uniform => 1.0,
        }
    }
}

/// Where the coordinate origin is placed before fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnchorPolicy {
    /// The candidate apex, or for a profile the most intense sample
    Apex,
    /// The intensity-weighted mean coordinate
    WeightedMean,
    /// The arithmetic mean coordinate
    Mean,
}

impl AnchorPolicy {
    /// The anchor of a set of usable points in two dimensions
    pub fn anchor(&self, points: &[RawPoint], apex: &PeakCandidate) -> Option<(f64, f64)> {
        match self {
            Self::Apex => Some((apex.mz, apex.rt)),
            Self::WeightedMean => {
                let (mz, _) = weighted_mean_variance(points.iter().map(|p| (p.mz, p.intensity)))?;
                let (rt, _) = weighted_mean_variance(points.iter().map(|p| (p.rt, p.intensity)))?;
                Some((mz, rt))
            }
            Self::Mean => Some((
                mean(points.iter().map(|p| p.mz))?,
                mean(points.iter().map(|p| p.rt))?,
            )),
        }
    }

    /// The anchor of a set of usable `(coordinate, intensity)` samples
    pub fn anchor_profile(&self, samples: &[(f64, f64)]) -> Option<f64> {
        match self {
            Self::Apex => samples
                .iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(x, _)| *x),
            Self::WeightedMean => weighted_mean_variance(samples.iter().copied()).map(|(m, _)| m),
            Self::Mean => mean(samples.iter().map(|(x, _)| *x)),
        }
    }
}

/// Convert a negative quadratic coefficient into a Gaussian standard deviation
#[inline]
fn sigma_from_curvature(c: f64) -> f64 {
    (-0.5 / c).sqrt()
}

/// A two dimensional log-linear Gaussian peak shape solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogLinearSolver {
    pub weight: WeightFunction,
    pub anchor: AnchorPolicy,
    /// When set, the linear terms are dropped and the center is fixed at the anchor
    pub fixed_center: bool,
}

impl LogLinearSolver {
    pub const fn new(weight: WeightFunction, anchor: AnchorPolicy, fixed_center: bool) -> Self {
        Self {
            weight,
            anchor,
            fixed_center,
        }
    }

    /// Weight by intensity about the intensity-weighted mean, after Guo's
    /// weighted Caruana fit
    pub const fn guos() -> Self {
        Self::new(WeightFunction::Intensity, AnchorPolicy::WeightedMean, false)
    }

    /// Weight by the theoretical peak about the apex
    pub const fn weighted() -> Self {
        Self::new(WeightFunction::Theoretical, AnchorPolicy::Apex, false)
    }

    /// Weight by the theoretical peak and hold the center at the apex
    pub const fn constrained() -> Self {
        Self::new(WeightFunction::Theoretical, AnchorPolicy::Apex, true)
    }

    pub fn basis(&self) -> Basis {
        if self.fixed_center {
            Basis::Centered2D
        } else {
            Basis::Full2D
        }
    }

    /// Accumulate the normal equations for `points`, returning them along with the
    /// anchor the coordinates were offset by.
    pub fn build_system(
        &self,
        points: &[RawPoint],
        roi: &RegionOfInterest,
    ) -> Result<(WeightedLinearSystem, (f64, f64)), FitError> {
        let usable: Vec<RawPoint> = points.iter().filter(|p| p.is_usable()).copied().collect();
        let basis = self.basis();
        if usable.len() < basis.len() {
            return Err(FitError::InsufficientData(usable.len()));
        }
        let (anchor_mz, anchor_rt) = self
            .anchor
            .anchor(&usable, &roi.apex)
            .ok_or(FitError::InsufficientData(usable.len()))?;

        // Offsets along an axis with no spread are zeroed so its terms drop out of the system
        let mz_varies = has_spread(usable.iter().map(|p| p.mz));
        let rt_varies = has_spread(usable.iter().map(|p| p.rt));
        if !(mz_varies && rt_varies) {
            log::trace!("Points around {} have no spread along mz={mz_varies} rt={rt_varies}", roi.apex);
        }

        let mut system = WeightedLinearSystem::new(basis);
        for p in usable.iter() {
            system.push(
                if mz_varies { p.mz - anchor_mz } else { 0.0 },
                if rt_varies { p.rt - anchor_rt } else { 0.0 },
                self.weight.weight(p, roi),
                p.intensity.ln(),
            );
        }
        Ok((system, (anchor_mz, anchor_rt)))
    }

    /// Fit a two dimensional Gaussian to `points` from `roi`
    pub fn fit(&self, points: &[RawPoint], roi: &RegionOfInterest) -> Result<ShapeEstimate, FitError> {
        let (system, (anchor_mz, anchor_rt)) = self.build_system(points, roi)?;
        let beta = system.solve_full_rank().ok_or(FitError::SingularSystem)?;

        let estimate = if self.fixed_center {
            let (a, c, e) = (beta[0], beta[1], beta[2]);
            check_concave(c, e)?;
            ShapeEstimate::new(
                a.exp(),
                anchor_mz,
                sigma_from_curvature(c),
                anchor_rt,
                sigma_from_curvature(e),
            )
        } else {
            let (a, b, c, d, e) = (beta[0], beta[1], beta[2], beta[3], beta[4]);
            check_concave(c, e)?;
            let mz = -b / (2.0 * c) + anchor_mz;
            let rt = -d / (2.0 * e) + anchor_rt;
            let height = (a - b.powi(2) / (4.0 * c) - d.powi(2) / (4.0 * e)).exp();
            let estimate = ShapeEstimate::new(
                height,
                mz,
                sigma_from_curvature(c),
                rt,
                sigma_from_curvature(e),
            );
            if !estimate.is_centered_in(roi) {
                log::trace!(
                    "Fitted center ({mz}, {rt}) falls outside the region around {}",
                    roi.apex
                );
                return Err(FitError::CenterOutOfBounds { mz, rt });
            }
            estimate
        };

        if estimate.is_valid() {
            Ok(estimate)
        } else {
            log::trace!("Fit produced unusable parameters {estimate}");
            Err(FitError::SingularSystem)
        }
    }
}

impl ShapeEstimator for LogLinearSolver {
    fn estimate(
        &self,
        points: &[RawPoint],
        roi: &RegionOfInterest,
    ) -> Result<ShapeEstimate, FitError> {
        self.fit(points, roi)
    }
}

/// Whether `values` take more than one distinct value
fn has_spread<I: IntoIterator<Item = f64>>(values: I) -> bool {
    let mut values = values.into_iter();
    match values.next() {
        Some(first) => values.any(|v| v != first),
        None => false,
    }
}

fn check_concave(c: f64, e: f64) -> Result<(), FitError> {
    if c < 0.0 && e < 0.0 {
        Ok(())
    } else {
        log::trace!("Fit is not concave, c = {c}, e = {e}");
        Err(FitError::DegenerateFit { c, e })
    }
}

/// One of the two dimensions of a raw point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    MZ,
    Time,
}

impl Axis {
    #[inline]
    pub fn coordinate(&self, point: &RawPoint) -> f64 {
        match self {
            Self::MZ => CoordinateLike::<MZ>::coordinate(point),
            Self::Time => CoordinateLike::<Time>::coordinate(point),
        }
    }

    fn degenerate(&self, c: f64) -> FitError {
        match self {
            Self::MZ => FitError::DegenerateFit { c, e: f64::NAN },
            Self::Time => FitError::DegenerateFit { c: f64::NAN, e: c },
        }
    }

    fn out_of_bounds(&self, center: f64) -> FitError {
        match self {
            Self::MZ => FitError::CenterOutOfBounds {
                mz: center,
                rt: f64::NAN,
            },
            Self::Time => FitError::CenterOutOfBounds {
                mz: f64::NAN,
                rt: center,
            },
        }
    }
}

/// The weight a sample carries in a [`ProfileSolver`] fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProfileWeight {
    Uniform,
    Intensity,
}

/// A one dimensional log-linear Gaussian solver for a profile along one [`Axis`].
///
/// Failures are reported in the slot of [`FitError`] matching the axis, with `NaN`
/// in the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProfileSolver {
    pub weight: ProfileWeight,
    pub anchor: AnchorPolicy,
    pub axis: Axis,
}

impl ProfileSolver {
    pub const fn new(weight: ProfileWeight, anchor: AnchorPolicy, axis: Axis) -> Self {
        Self {
            weight,
            anchor,
            axis,
        }
    }

    /// Caruana's unweighted fit about the mean coordinate
    pub const fn caruana(axis: Axis) -> Self {
        Self::new(ProfileWeight::Uniform, AnchorPolicy::Mean, axis)
    }

    /// Guo's intensity weighted fit about the intensity-weighted mean coordinate
    pub const fn guos(axis: Axis) -> Self {
        Self::new(ProfileWeight::Intensity, AnchorPolicy::WeightedMean, axis)
    }

    /// Fit a profile to paired coordinates and intensities.
    ///
    /// The fitted center must lie within the range of the sampled coordinates.
    pub fn fit(&self, xs: &[f64], intensities: &[f64]) -> Result<GaussianProfile, FitError> {
        let samples: Vec<(f64, f64)> = xs
            .iter()
            .copied()
            .zip(intensities.iter().copied())
            .filter(|(x, y)| x.is_finite() && y.is_finite() && *y > 0.0)
            .collect();
        if samples.len() < Basis::Profile1D.len() {
            return Err(FitError::InsufficientData(samples.len()));
        }
        let anchor = self
            .anchor
            .anchor_profile(&samples)
            .ok_or(FitError::InsufficientData(samples.len()))?;

        let mut system = WeightedLinearSystem::new(Basis::Profile1D);
        for (x, y) in samples.iter().copied() {
            let w = match self.weight {
                ProfileWeight::Uniform => 1.0,
                ProfileWeight::Intensity => y,
            };
            system.push(x - anchor, 0.0, w, y.ln());
        }
        let [a, b, c] = system.solve_closed_form().ok_or(FitError::SingularSystem)?;
        if !(c < 0.0) {
            log::trace!("Profile fit along {:?} is not concave, c = {c}", self.axis);
            return Err(self.axis.degenerate(c));
        }

        let mu = -b / (2.0 * c) + anchor;
        let (lo, hi) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (x, _)| {
                (lo.min(*x), hi.max(*x))
            });
        if mu < lo || mu > hi {
            return Err(self.axis.out_of_bounds(mu));
        }

        let profile = GaussianProfile::new(
            mu,
            sigma_from_curvature(c),
            (a - b.powi(2) / (4.0 * c)).exp(),
        );
        if profile.is_valid() {
            Ok(profile)
        } else {
            Err(FitError::SingularSystem)
        }
    }

    /// Fit a profile to the projection of `points` onto this solver's axis
    pub fn fit_points(&self, points: &[RawPoint]) -> Result<GaussianProfile, FitError> {
        let xs: Vec<f64> = points.iter().map(|p| self.axis.coordinate(p)).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.intensity).collect();
        self.fit(&xs, &ys)
    }
}
