//! Calibration board detection pipeline.
//!
//! Detected points are seeded into small lattices, grown breadth-first,
//! placed on the board through the polarity signature and finally verified
//! by a camera pose with reprojection-gated additional correspondences.

mod error;
mod fov;
mod lattice;
mod params;
mod pipeline;
mod placement;
mod result;

pub use error::BoardDetectError;
pub use fov::{FovEstimate, FovSweep};
pub use params::BoardDetectorParams;
pub use pipeline::CalibrationBoardDetector;
pub use result::{CalibrationBoardObservation, Correspondence};
