pub use crate::pipeline::{EstimatorKind, PeakFit, PeakShapeEstimator};
pub use crate::point::{RawData, RawPoint, RawPointSource};
pub use crate::quality::FitQuality;
pub use crate::roi::PeakCandidate;
pub use crate::shape::{FitError, ShapeEstimate};
pub use crate::solver::ShapeEstimator;
pub use crate::width::{InstrumentType, PeakWidthModel, TheoreticalWidth, WidthModel};
