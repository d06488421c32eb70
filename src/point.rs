//! Raw (m/z, retention time, intensity) measurements and the sources that serve them.
use std::cmp::Ordering;
use std::fmt;

use mzpeaks::{CoordinateLike, IntensityMeasurement, Time, MZ};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::search::find_between;

/// A single centroided measurement from one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawPoint {
    pub mz: f64,
    pub rt: f64,
    pub intensity: f64,
}

impl RawPoint {
    pub fn new(mz: f64, rt: f64, intensity: f64) -> Self {
        Self { mz, rt, intensity }
    }

    /// Whether this point can participate in a log-space fit
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.intensity > 0.0 && self.intensity.is_finite()
    }
}

impl CoordinateLike<MZ> for RawPoint {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl CoordinateLike<Time> for RawPoint {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.rt
    }
}

impl IntensityMeasurement for RawPoint {
    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity as f32
    }
}

impl From<(f64, f64, f64)> for RawPoint {
    fn from((mz, rt, intensity): (f64, f64, f64)) -> Self {
        Self::new(mz, rt, intensity)
    }
}

impl fmt::Display for RawPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPoint({}, {}, {})", self.mz, self.rt, self.intensity)
    }
}

/// Anything which can be asked for the raw points inside a rectangular
/// m/z by retention time window.
///
/// Bounds are inclusive on both axes. No ordering of the returned points is
/// promised.
pub trait RawPointSource {
    fn query(&self, min_mz: f64, max_mz: f64, min_rt: f64, max_rt: f64) -> Vec<RawPoint>;
}

impl RawPointSource for [RawPoint] {
    fn query(&self, min_mz: f64, max_mz: f64, min_rt: f64, max_rt: f64) -> Vec<RawPoint> {
        self.iter()
            .filter(|p| p.mz >= min_mz && p.mz <= max_mz && p.rt >= min_rt && p.rt <= max_rt)
            .copied()
            .collect()
    }
}

impl RawPointSource for Vec<RawPoint> {
    fn query(&self, min_mz: f64, max_mz: f64, min_rt: f64, max_rt: f64) -> Vec<RawPoint> {
        self.as_slice().query(min_mz, max_mz, min_rt, max_rt)
    }
}

/// The summed intensity of all points at each retention time
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Chromatogram {
    pub retention_time: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl Chromatogram {
    pub fn len(&self) -> usize {
        self.retention_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retention_time.is_empty()
    }
}

fn by_rt_then_mz(a: &RawPoint, b: &RawPoint) -> Ordering {
    a.rt.total_cmp(&b.rt).then(a.mz.total_cmp(&b.mz))
}

/// An in-memory collection of raw points from a single LC-MS run, kept
/// sorted by retention time and then m/z so that window queries only
/// have to scan the scans that overlap the requested time range.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawData {
    points: Vec<RawPoint>,
    rt_index: Vec<f64>,
}

impl RawData {
    pub fn new(mut points: Vec<RawPoint>) -> Self {
        points.sort_by(by_rt_then_mz);
        let rt_index = points.iter().map(|p| p.rt).collect();
        Self { points, rt_index }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[RawPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RawPoint> {
        self.points.iter()
    }

    /// The smallest and largest m/z in the run, if any points exist
    pub fn mz_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| match acc {
            None => Some((p.mz, p.mz)),
            Some((lo, hi)) => Some((lo.min(p.mz), hi.max(p.mz))),
        })
    }

    /// The first and last retention time in the run, if any points exist
    pub fn rt_range(&self) -> Option<(f64, f64)> {
        match (self.rt_index.first(), self.rt_index.last()) {
            (Some(lo), Some(hi)) => Some((*lo, *hi)),
            _ => None,
        }
    }

    /// Sum intensities by retention time.
    pub fn tic(&self) -> Chromatogram {
        let mut tic = Chromatogram::default();
        for point in self.points.iter() {
            match tic.retention_time.last() {
                Some(rt) if *rt == point.rt => {
                    if let Some(last) = tic.intensity.last_mut() {
                        *last += point.intensity;
                    }
                }
                _ => {
                    tic.retention_time.push(point.rt);
                    tic.intensity.push(point.intensity);
                }
            }
        }
        tic
    }
}

impl FromIterator<RawPoint> for RawData {
    fn from_iter<T: IntoIterator<Item = RawPoint>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl RawPointSource for RawData {
    fn query(&self, min_mz: f64, max_mz: f64, min_rt: f64, max_rt: f64) -> Vec<RawPoint> {
        if self.points.is_empty() || min_rt > max_rt || min_mz > max_mz {
            return Vec::new();
        }
        let (start, end) = find_between(&self.rt_index, min_rt, max_rt);
        self.points[start..end]
            .iter()
            .filter(|p| p.mz >= min_mz && p.mz <= max_mz)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn toy() -> RawData {
        RawData::new(vec![
            RawPoint::new(200.0, 2.0, 5.0),
            RawPoint::new(100.0, 1.0, 1.0),
            RawPoint::new(150.0, 1.0, 2.0),
            RawPoint::new(100.0, 3.0, 4.0),
            RawPoint::new(250.0, 2.0, 3.0),
        ])
    }

    #[test]
    fn test_sorted_on_construction() {
        let data = toy();
        let rts: Vec<f64> = data.iter().map(|p| p.rt).collect();
        assert_eq!(rts, vec![1.0, 1.0, 2.0, 2.0, 3.0]);
        assert_eq!(data.points()[0].mz, 100.0);
        assert_eq!(data.mz_range(), Some((100.0, 250.0)));
        assert_eq!(data.rt_range(), Some((1.0, 3.0)));
    }

    #[test]
    fn test_query_inclusive_bounds() {
        let data = toy();
        let hits = data.query(100.0, 200.0, 1.0, 2.0);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|p| p.rt <= 2.0 && p.mz <= 200.0));

        let slice_hits = data.points().query(100.0, 200.0, 1.0, 2.0);
        assert_eq!(hits, slice_hits);

        assert!(data.query(300.0, 400.0, 0.0, 10.0).is_empty());
        assert!(data.query(100.0, 200.0, 5.0, 1.0).is_empty());
        assert!(RawData::default().query(0.0, 1e6, 0.0, 1e6).is_empty());
    }

    #[test]
    fn test_tic() {
        let tic = toy().tic();
        assert_eq!(tic.retention_time, vec![1.0, 2.0, 3.0]);
        assert_eq!(tic.intensity, vec![3.0, 8.0, 4.0]);
    }

    #[test]
    fn test_coordinates() {
        let p = RawPoint::new(500.25, 33.0, 1e4);
        assert_eq!(CoordinateLike::<MZ>::coordinate(&p), 500.25);
        assert_eq!(CoordinateLike::<Time>::coordinate(&p), 33.0);
        assert_eq!(IntensityMeasurement::intensity(&p), 1e4f32);
        assert!(p.is_usable());
        assert!(!RawPoint::new(1.0, 1.0, 0.0).is_usable());
    }
}
