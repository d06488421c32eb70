//! Goodness-of-fit scoring for competing peak shape estimates.
//!
//! Estimates are scored by the coefficient of determination over the points of a
//! narrow region of interest around the apex:
//!
//! ```math
//! R^2 = 1 - \frac{\sum_i (z_i - \hat{z}_i)^2}{\sum_i (z_i - \bar{z})^2}
//! ```
//!
//! Scoring every estimate over the same points makes their scores directly comparable.
use std::cmp::Ordering;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak_statistics::mean;
use crate::point::RawPoint;
use crate::shape::{FitError, ShapeEstimate};

/// Compute the $`R^2`$ of `estimate` over `points`.
///
/// The score is undefined, and [`FitError::UndefinedQuality`] is returned, when there
/// are no points with a finite intensity, when `estimate` is not valid, or when every
/// point has the same intensity. It is never silently reported as zero.
pub fn r_squared(estimate: &ShapeEstimate, points: &[RawPoint]) -> Result<f64, FitError> {
    if !estimate.is_valid() {
        return Err(FitError::UndefinedQuality);
    }
    let observed: Vec<&RawPoint> = points.iter().filter(|p| p.intensity.is_finite()).collect();
    let mean_intensity = mean(observed.iter().map(|p| p.intensity)).ok_or(FitError::UndefinedQuality)?;

    let (ss_tot, ss_res) = observed.iter().fold((0.0, 0.0), |(ss_tot, ss_res), p| {
        let predicted = estimate.density(p.mz, p.rt);
        (
            ss_tot + (p.intensity - mean_intensity).powi(2),
            ss_res + (p.intensity - predicted).powi(2),
        )
    });
    if !(ss_tot > 0.0) {
        return Err(FitError::UndefinedQuality);
    }
    let r2 = 1.0 - ss_res / ss_tot;
    if r2.is_finite() {
        Ok(r2)
    } else {
        Err(FitError::UndefinedQuality)
    }
}

/// The goodness of fit of one estimate. A missing `r_squared` means the score is undefined.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitQuality {
    pub r_squared: Option<f64>,
}

impl FitQuality {
    pub fn new(r_squared: f64) -> Self {
        Self {
            r_squared: Some(r_squared),
        }
    }

    pub fn undefined() -> Self {
        Self { r_squared: None }
    }

    /// Score `estimate` over `points`
    pub fn evaluate(estimate: &ShapeEstimate, points: &[RawPoint]) -> Self {
        r_squared(estimate, points).ok().into()
    }

    pub fn is_defined(&self) -> bool {
        self.r_squared.is_some()
    }

    /// Order two qualities so that any defined score beats an undefined one
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.r_squared, other.r_squared) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

impl From<Option<f64>> for FitQuality {
    fn from(value: Option<f64>) -> Self {
        Self { r_squared: value }
    }
}

impl fmt::Display for FitQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.r_squared {
            Some(r2) => write!(f, "R²={r2:.4}"),
            None => write!(f, "R²=undefined"),
        }
    }
}
