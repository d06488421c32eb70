//! Region of interest selection around a candidate peak apex.
//!
//! A region of interest is a rectangle centered on the apex whose half-widths are
//! a multiple of the theoretical standard deviation along each axis. The wide
//! region (see [`DEFAULT_ROI_TOLERANCE`]) supplies the points used for fitting,
//! while a narrow region (see [`DEFAULT_QUALITY_TOLERANCE`]) supplies the points
//! used to score fits, limiting contamination from neighboring peaks.
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::point::{RawPoint, RawPointSource};
use crate::width::TheoreticalWidth;

/// The number of theoretical standard deviations spanned on each side of the apex
/// by the fitting region
pub const DEFAULT_ROI_TOLERANCE: f64 = 2.5;

/// The number of theoretical standard deviations spanned on each side of the apex
/// by the goodness-of-fit region. Like the fitting region, its bounds are inclusive,
/// so points lying exactly on an edge are scored.
pub const DEFAULT_QUALITY_TOLERANCE: f64 = 1.0;

/// A putative peak apex, as reported by a local maximum detector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakCandidate {
    pub id: usize,
    pub mz: f64,
    pub rt: f64,
    pub intensity: f64,
}

impl PeakCandidate {
    pub fn new(id: usize, mz: f64, rt: f64, intensity: f64) -> Self {
        Self {
            id,
            mz,
            rt,
            intensity,
        }
    }
}

impl fmt::Display for PeakCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PeakCandidate({}, {}, {}, {})",
            self.id, self.mz, self.rt, self.intensity
        )
    }
}

/// A bounding box in m/z and retention time around a [`PeakCandidate`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionOfInterest {
    pub min_mz: f64,
    pub max_mz: f64,
    pub min_rt: f64,
    pub max_rt: f64,
    pub apex: PeakCandidate,
    /// The theoretical widths the region was sized from
    pub width: TheoreticalWidth,
}

impl RegionOfInterest {
    /// Center a region on `apex` extending `tolerance` standard deviations in each direction
    pub fn around(apex: PeakCandidate, width: &TheoreticalWidth, tolerance: f64) -> Self {
        let tolerance_mz = tolerance * width.sigma_mz;
        let tolerance_rt = tolerance * width.sigma_rt;
        Self {
            min_mz: apex.mz - tolerance_mz,
            max_mz: apex.mz + tolerance_mz,
            min_rt: apex.rt - tolerance_rt,
            max_rt: apex.rt + tolerance_rt,
            apex,
            width: *width,
        }
    }

    /// Inclusive containment test
    #[inline]
    pub fn contains(&self, mz: f64, rt: f64) -> bool {
        mz >= self.min_mz && mz <= self.max_mz && rt >= self.min_rt && rt <= self.max_rt
    }

    pub fn contains_point(&self, point: &RawPoint) -> bool {
        self.contains(point.mz, point.rt)
    }

    pub fn width_mz(&self) -> f64 {
        self.max_mz - self.min_mz
    }

    pub fn width_rt(&self) -> f64 {
        self.max_rt - self.min_rt
    }

    /// Ask `source` for every point inside this region
    pub fn select<S: RawPointSource + ?Sized>(&self, source: &S) -> Vec<RawPoint> {
        source.query(self.min_mz, self.max_mz, self.min_rt, self.max_rt)
    }

    /// Keep only the points of `points` which lie inside this region
    pub fn filter(&self, points: &[RawPoint]) -> Vec<RawPoint> {
        points
            .iter()
            .filter(|p| self.contains_point(p))
            .copied()
            .collect()
    }
}

/// The points of one region of interest
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiPoints {
    pub roi: RegionOfInterest,
    pub points: Vec<RawPoint>,
}

impl RoiPoints {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The number of points with a strictly positive intensity
    pub fn usable(&self) -> usize {
        self.points.iter().filter(|p| p.is_usable()).count()
    }
}

/// Builds the fitting and scoring regions for candidate peaks
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiSelector {
    /// Half-width of the fitting region in theoretical standard deviations
    pub tolerance: f64,
    /// Half-width of the scoring region in theoretical standard deviations
    pub quality_tolerance: f64,
}

impl Default for RoiSelector {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_ROI_TOLERANCE,
            quality_tolerance: DEFAULT_QUALITY_TOLERANCE,
        }
    }
}

impl RoiSelector {
    pub fn new(tolerance: f64, quality_tolerance: f64) -> Self {
        Self {
            tolerance,
            quality_tolerance,
        }
    }

    /// The wide region of interest used for estimation
    pub fn fitting_region(&self, apex: PeakCandidate, width: &TheoreticalWidth) -> RegionOfInterest {
        RegionOfInterest::around(apex, width, self.tolerance)
    }

    /// The narrow region of interest used for goodness-of-fit, computed from
    /// the apex independently of the fitting region
    pub fn quality_region(&self, apex: PeakCandidate, width: &TheoreticalWidth) -> RegionOfInterest {
        RegionOfInterest::around(apex, width, self.quality_tolerance)
    }

    /// Select the points for fitting the peak at `apex`. An empty region is not an error.
    pub fn select<S: RawPointSource + ?Sized>(
        &self,
        source: &S,
        apex: PeakCandidate,
        width: &TheoreticalWidth,
    ) -> RoiPoints {
        let roi = self.fitting_region(apex, width);
        let points = roi.select(source);
        RoiPoints { roi, points }
    }

    /// Select the points for scoring the peak at `apex`
    pub fn select_quality<S: RawPointSource + ?Sized>(
        &self,
        source: &S,
        apex: PeakCandidate,
        width: &TheoreticalWidth,
    ) -> RoiPoints {
        let roi = self.quality_region(apex, width);
        let points = roi.select(source);
        RoiPoints { roi, points }
    }
}
