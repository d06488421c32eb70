//! Theoretical peak widths derived from instrument resolution.
//!
//! The m/z peak width of a mass analyzer grows with m/z at a rate which depends
//! upon the kind of analyzer. Given a resolving power measured at a reference m/z,
//! [`ResolutionModel`] converts an m/z into an expected full width at half max.
//! Chromatographic peak width does not depend on m/z, so it is a single configured
//! average.
use std::f64::consts::LN_2;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The ratio between a Gaussian's full width at half max and its standard deviation,
/// $`2\sqrt{2\ln 2}`$
pub fn fwhm_to_sigma_factor() -> f64 {
    2.0 * (2.0 * LN_2).sqrt()
}

/// Convert a full width at half max into a Gaussian standard deviation
#[inline]
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / fwhm_to_sigma_factor()
}

/// Convert a Gaussian standard deviation into a full width at half max
#[inline]
pub fn sigma_to_fwhm(sigma: f64) -> f64 {
    sigma * fwhm_to_sigma_factor()
}

/// All the ways a width model or estimator configuration can be invalid
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("The resolution must be a positive number, got {0}")]
    InvalidResolution(f64),
    #[error("The reference m/z must be a positive number, got {0}")]
    InvalidReferenceMZ(f64),
    #[error("The average retention time FWHM must be a positive number, got {0}")]
    InvalidRetentionTimeWidth(f64),
    #[error("The {0} tolerance multiplier must be a positive number, got {1}")]
    InvalidTolerance(&'static str, f64),
    #[error("At least one estimator must be configured")]
    NoEstimators,
}

/// The kind of mass analyzer, which determines how peak width scales with m/z
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InstrumentType {
    /// Width grows with $`mz^{1.5}`$
    #[default]
    Orbitrap,
    /// Width grows with $`mz^2`$
    FTICR,
    /// Width grows linearly with m/z
    TOF,
    /// Width is constant
    Quad,
}

/// A mass analyzer's resolving power measured at a reference m/z
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolutionModel {
    pub instrument: InstrumentType,
    /// The resolving power, $`mz / \Delta mz`$, at `reference_mz`
    pub resolution: f64,
    pub reference_mz: f64,
}

impl Default for ResolutionModel {
    fn default() -> Self {
        Self {
            instrument: InstrumentType::Orbitrap,
            resolution: 70_000.0,
            reference_mz: 200.0,
        }
    }
}

impl ResolutionModel {
    pub fn new(instrument: InstrumentType, resolution: f64, reference_mz: f64) -> Self {
        Self {
            instrument,
            resolution,
            reference_mz,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.resolution > 0.0 && self.resolution.is_finite()) {
            Err(ConfigError::InvalidResolution(self.resolution))
        } else if !(self.reference_mz > 0.0 && self.reference_mz.is_finite()) {
            Err(ConfigError::InvalidReferenceMZ(self.reference_mz))
        } else {
            Ok(())
        }
    }

    /// The expected full width at half max of a peak at `mz`
    pub fn theoretical_fwhm(&self, mz: f64) -> f64 {
        match self.instrument {
            InstrumentType::Orbitrap => {
                mz.powf(1.5) / (self.resolution * self.reference_mz.sqrt())
            }
            InstrumentType::FTICR => mz.powi(2) / (self.resolution * self.reference_mz),
            InstrumentType::TOF => mz / self.resolution,
            InstrumentType::Quad => self.reference_mz / self.resolution,
        }
    }
}

/// The expected Gaussian standard deviations of a peak along both axes
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TheoreticalWidth {
    pub sigma_mz: f64,
    pub sigma_rt: f64,
}

impl TheoreticalWidth {
    pub fn new(sigma_mz: f64, sigma_rt: f64) -> Self {
        Self { sigma_mz, sigma_rt }
    }

    /// Build from full widths at half max rather than standard deviations
    pub fn from_fwhm(fwhm_mz: f64, fwhm_rt: f64) -> Self {
        Self::new(fwhm_to_sigma(fwhm_mz), fwhm_to_sigma(fwhm_rt))
    }

    /// The unit-height, origin-centered Gaussian with these widths evaluated
    /// at the offset `(dx, dy)`
    #[inline]
    pub fn unit_density(&self, dx: f64, dy: f64) -> f64 {
        (-0.5 * (dx / self.sigma_mz).powi(2)).exp() * (-0.5 * (dy / self.sigma_rt).powi(2)).exp()
    }
}

/// Something that knows how wide a peak at some m/z should be
pub trait WidthModel {
    fn theoretical_width(&self, mz: f64) -> TheoreticalWidth;
}

impl WidthModel for TheoreticalWidth {
    fn theoretical_width(&self, _mz: f64) -> TheoreticalWidth {
        *self
    }
}

/// Combine a [`ResolutionModel`] for the m/z dimension with an average
/// chromatographic FWHM.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakWidthModel {
    pub resolution: ResolutionModel,
    pub avg_fwhm_rt: f64,
}

impl Default for PeakWidthModel {
    fn default() -> Self {
        Self {
            resolution: ResolutionModel::default(),
            avg_fwhm_rt: 10.0,
        }
    }
}

impl PeakWidthModel {
    pub fn new(resolution: ResolutionModel, avg_fwhm_rt: f64) -> Self {
        Self {
            resolution,
            avg_fwhm_rt,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolution.validate()?;
        if !(self.avg_fwhm_rt > 0.0 && self.avg_fwhm_rt.is_finite()) {
            return Err(ConfigError::InvalidRetentionTimeWidth(self.avg_fwhm_rt));
        }
        Ok(())
    }

    pub fn sigma_mz(&self, mz: f64) -> f64 {
        fwhm_to_sigma(self.resolution.theoretical_fwhm(mz))
    }

    pub fn sigma_rt(&self) -> f64 {
        fwhm_to_sigma(self.avg_fwhm_rt)
    }
}

impl WidthModel for PeakWidthModel {
    fn theoretical_width(&self, mz: f64) -> TheoreticalWidth {
        TheoreticalWidth::new(self.sigma_mz(mz), self.sigma_rt())
    }
}
