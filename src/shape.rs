//! Peak shape parameter types produced by the estimators.
use std::fmt;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::roi::{PeakCandidate, RegionOfInterest};
use crate::width::TheoreticalWidth;

/// All the ways a peak shape estimate can be unavailable.
///
/// None of these are exceptional: degenerate regions are common in real
/// data, and callers are expected to skip the affected peak and carry on.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitError {
    #[error("Only {0} usable points were available, too few to estimate a peak shape")]
    InsufficientData(usize),
    #[error("The fitted curvature is not concave (mz term {c}, rt term {e})")]
    DegenerateFit { c: f64, e: f64 },
    #[error("The weighted normal equations could not be solved")]
    SingularSystem,
    #[error("The fitted center ({mz}, {rt}) lies outside the region of interest")]
    CenterOutOfBounds { mz: f64, rt: f64 },
    #[error("The goodness of fit is undefined for this region")]
    UndefinedQuality,
}

/// A two dimensional, axis-aligned Gaussian peak shape
///
/// ```math
/// I(mz, rt) = h\exp\left(-\frac{(mz - \mu_{mz})^2}{2\sigma_{mz}^2}\right)\exp\left(-\frac{(rt - \mu_{rt})^2}{2\sigma_{rt}^2}\right)
/// ```
///
/// An estimate whose fields are all `NaN` is the invalid sentinel, see
/// [`ShapeEstimate::invalid`]. Always check [`ShapeEstimate::is_valid`] before use.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeEstimate {
    pub height: f64,
    pub mz: f64,
    pub sigma_mz: f64,
    pub rt: f64,
    pub sigma_rt: f64,
}

impl ShapeEstimate {
    pub fn new(height: f64, mz: f64, sigma_mz: f64, rt: f64, sigma_rt: f64) -> Self {
        Self {
            height,
            mz,
            sigma_mz,
            rt,
            sigma_rt,
        }
    }

    pub fn invalid() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    /// The shape implied by the apex alone, using the theoretical widths
    pub fn theoretical(candidate: &PeakCandidate, width: &TheoreticalWidth) -> Self {
        Self::new(
            candidate.intensity,
            candidate.mz,
            width.sigma_mz,
            candidate.rt,
            width.sigma_rt,
        )
    }

    /// All parameters are finite, and the height and both widths are strictly positive
    pub fn is_valid(&self) -> bool {
        self.height.is_finite()
            && self.mz.is_finite()
            && self.rt.is_finite()
            && self.sigma_mz.is_finite()
            && self.sigma_rt.is_finite()
            && self.height > 0.0
            && self.sigma_mz > 0.0
            && self.sigma_rt > 0.0
    }

    /// Collapse a fitting result into the sentinel representation
    pub fn from_result(result: &Result<Self, FitError>) -> Self {
        match result {
            Ok(estimate) => *estimate,
            Err(_) => Self::invalid(),
        }
    }

    /// Evaluate the model intensity at `(mz, rt)`
    pub fn density(&self, mz: f64, rt: f64) -> f64 {
        self.height
            * (-0.5 * ((mz - self.mz) / self.sigma_mz).powi(2)).exp()
            * (-0.5 * ((rt - self.rt) / self.sigma_rt).powi(2)).exp()
    }

    /// Whether the center of this estimate lies within `roi`'s bounds
    pub fn is_centered_in(&self, roi: &RegionOfInterest) -> bool {
        roi.contains(self.mz, self.rt)
    }

    /// The profile along the m/z dimension at the peak's retention time
    pub fn mz_profile(&self) -> GaussianProfile {
        GaussianProfile::new(self.mz, self.sigma_mz, self.height)
    }

    /// The profile along the retention time dimension at the peak's m/z
    pub fn rt_profile(&self) -> GaussianProfile {
        GaussianProfile::new(self.rt, self.sigma_rt, self.height)
    }
}

impl Default for ShapeEstimate {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Display for ShapeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShapeEstimate(height={}, mz={}, sigma_mz={}, rt={}, sigma_rt={})",
            self.height, self.mz, self.sigma_mz, self.rt, self.sigma_rt
        )
    }
}

/// One dimensional Gaussian peak shape model
///
/// ```math
/// y = a\exp\left({\frac{-(\mu - x)^2}{2\sigma^2}}\right)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GaussianProfile {
    pub mu: f64,
    pub sigma: f64,
    pub amplitude: f64,
}

impl GaussianProfile {
    pub fn new(mu: f64, sigma: f64, amplitude: f64) -> Self {
        Self {
            mu,
            sigma,
            amplitude,
        }
    }

    pub fn density(&self, x: f64) -> f64 {
        self.amplitude * (-0.5 * (x - self.mu).powi(2) / self.sigma.powi(2)).exp()
    }

    /// Given a coordinate sequence, produce the complementary sequence of theoretical intensities
    pub fn predict(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.density(*x)).collect()
    }

    pub fn is_valid(&self) -> bool {
        self.mu.is_finite()
            && self.sigma.is_finite()
            && self.amplitude.is_finite()
            && self.sigma > 0.0
            && self.amplitude > 0.0
    }
}
