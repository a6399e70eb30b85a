//! Dot-grid calibration board model and detector.
//!
//! A [`MetricCalibrationBoard`] is a rectangular grid of dark and bright dots
//! whose polarity layout identifies every board position. The
//! [`CalibrationBoardDetector`] finds such a board in a gray image seen by a
//! [`calib_dots_core::Camera`] and returns the camera pose together with
//! per-point correspondences.
//!
//! ```
//! use calib_dots_board::{
//!     create_metric_calibration_board, synthetic, CalibrationBoardDetector, MetricSize,
//! };
//! use calib_dots_core::PinholeCamera;
//! use nalgebra::UnitQuaternion;
//!
//! let board = create_metric_calibration_board(
//!     7,
//!     8,
//!     11,
//!     MetricSize::millimeters(200.0),
//!     MetricSize::millimeters(140.0),
//! )?;
//! let camera = PinholeCamera::from_horizontal_fov(640, 480, 60f64.to_radians())?;
//! let pose = synthetic::centered_pose(&board, 0.35, UnitQuaternion::identity());
//!
//! // Exact projections stand in for detected points.
//! let points = synthetic::project_board_points(&board, &camera, &pose);
//! let detector = CalibrationBoardDetector::default();
//! let observation = detector.detect_calibration_board_from_points(&camera, &points, &board, 1.0)?;
//! assert_eq!(observation.len(), 88);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod board;
mod detector;
mod io;
mod signature;
pub mod synthetic;

pub use board::{
    create_metric_calibration_board, BoardError, BoardSpec, LengthUnit, MetricCalibrationBoard,
    MetricSize,
};
pub use detector::{
    BoardDetectError, BoardDetectorParams, CalibrationBoardDetector, CalibrationBoardObservation,
    Correspondence, FovEstimate, FovSweep,
};
pub use io::{BoardDetectConfig, BoardDetectReport, ConfigError, IoError};

pub use calib_dots_core::{GridAlignment, GridTransform, GRID_TRANSFORMS_D4};
