//! High-level facade crate for the `calib-dots-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the point detector, the board model and the board detector
//! - (feature `image`) adapters from `image::GrayImage`, end-to-end detection helpers
//!   and overlay painting onto `image::RgbImage`
//!
//! ## Quickstart
//!
//! ```no_run
//! use calib_dots::{core::PinholeCamera, create_metric_calibration_board, detect, MetricSize};
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = ImageReader::open("board.png")?.decode()?.to_luma8();
//! let camera = PinholeCamera::from_horizontal_fov(img.width() as usize, img.height() as usize, 1.05)?;
//! let board = create_metric_calibration_board(
//!     7,
//!     8,
//!     11,
//!     MetricSize::millimeters(200.0),
//!     MetricSize::millimeters(140.0),
//! )?;
//!
//! let observation = detect::detect_calibration_board(&img, &camera, &board, 2.0, None)?;
//! println!("{} correspondences", observation.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `calib_dots::core`: images, homographies, camera model, pose and worker pool.
//! - `calib_dots::points`: ring-pattern dot detection.
//! - `calib_dots::board`: board model, polarity signature, board detector, JSON I/O.
//! - `calib_dots::detect` (feature `image`): end-to-end helpers from `image::GrayImage`.
//! - `calib_dots::paint` (feature `image`): overlays for points and observations.

pub use calib_dots_board as board;
pub use calib_dots_core as core;
pub use calib_dots_points as points;

pub use calib_dots_board::{
    create_metric_calibration_board, BoardDetectError, BoardDetectorParams, BoardSpec,
    CalibrationBoardDetector, CalibrationBoardObservation, Correspondence, FovEstimate, FovSweep,
    LengthUnit, MetricCalibrationBoard, MetricSize,
};
pub use calib_dots_core::{Camera, PinholeCamera, WorkerPool};
pub use calib_dots_points::{Point, PointDetector, PointDetectorParams, Polarity};

#[cfg(feature = "image")]
pub mod detect;
#[cfg(feature = "image")]
pub mod paint;

#[cfg(feature = "image")]
pub use paint::{paint_calibration_board_observation, paint_points};

/// Route `log` records into `tracing` and install the span-timing subscriber.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let _ = tracing_log::LogTracer::init();
    calib_dots_core::init_tracing(json);
}
