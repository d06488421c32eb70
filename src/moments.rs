//! Intensity-weighted moment estimation.
//!
//! The cheapest peak shape estimate: the height is the largest observed intensity,
//! and the center and width along each axis are the intensity-weighted mean and
//! population standard deviation. It is the fallback when no least squares fit
//! succeeds, and a reasonable starting point for iterative optimizers.
use crate::peak_statistics::weighted_mean_variance;
use crate::point::RawPoint;
use crate::shape::{FitError, ShapeEstimate};
use crate::width::TheoreticalWidth;

/// Estimate a peak shape from the intensity-weighted moments of `points`.
///
/// Points with non-positive intensity carry no weight, and if none have positive
/// intensity this fails with [`FitError::InsufficientData`].
///
/// An axis with no spread, such as the retention time axis when every point comes
/// from one scan, has a standard deviation of zero. When `fallback` is given its
/// width is used for such an axis, otherwise the estimate fails with
/// [`FitError::InsufficientData`].
pub fn moment_estimate(
    points: &[RawPoint],
    fallback: Option<&TheoreticalWidth>,
) -> Result<ShapeEstimate, FitError> {
    let usable: Vec<&RawPoint> = points.iter().filter(|p| p.is_usable()).collect();
    if usable.is_empty() {
        return Err(FitError::InsufficientData(0));
    }

    let height = usable
        .iter()
        .map(|p| p.intensity)
        .fold(f64::NEG_INFINITY, f64::max);

    let (mz, var_mz) = weighted_mean_variance(usable.iter().map(|p| (p.mz, p.intensity)))
        .ok_or(FitError::InsufficientData(usable.len()))?;
    let (rt, var_rt) = weighted_mean_variance(usable.iter().map(|p| (p.rt, p.intensity)))
        .ok_or(FitError::InsufficientData(usable.len()))?;

    let mut sigma_mz = var_mz.sqrt();
    let mut sigma_rt = var_rt.sqrt();
    if let Some(width) = fallback {
        if !(sigma_mz > 0.0) {
            sigma_mz = width.sigma_mz;
        }
        if !(sigma_rt > 0.0) {
            sigma_rt = width.sigma_rt;
        }
    }

    let estimate = ShapeEstimate::new(height, mz, sigma_mz, rt, sigma_rt);
    if !estimate.is_valid() {
        log::trace!(
            "Moment estimate over {} points has no spread: {estimate}",
            usable.len()
        );
        return Err(FitError::InsufficientData(usable.len()));
    }
    Ok(estimate)
}
