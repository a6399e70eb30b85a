use calib_dots_core::CameraError;
use calib_dots_points::PointDetectError;

/// Errors returned by the calibration board detector.
///
/// Every variant leaves the caller without an observation; nothing is
/// partially reported.
#[derive(thiserror::Error, Debug)]
pub enum BoardDetectError {
    #[error("invalid board detector parameters: {0}")]
    InvalidParams(&'static str),
    #[error(
        "image is {image_width}x{image_height} but the camera expects {camera_width}x{camera_height}"
    )]
    ImageSizeMismatch {
        image_width: usize,
        image_height: usize,
        camera_width: usize,
        camera_height: usize,
    },
    #[error("maximal projection error must be finite and > 0 (got {0})")]
    InvalidProjectionError(f64),
    #[error(transparent)]
    PointDetection(#[from] PointDetectError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("field of view sweep needs 0 < min < max < pi and at least 2 steps (got {min_fov_x}..{max_fov_x}, {steps} steps)")]
    InvalidFovSweep {
        min_fov_x: f64,
        max_fov_x: f64,
        steps: usize,
    },
    #[error("the board was not detected under any of the {steps} swept fields of view")]
    NoFieldOfView { steps: usize },
    #[error("not enough points ({found}, need {needed})")]
    NotEnoughPoints { found: usize, needed: usize },
    #[error("no point neighborhood forms a board lattice")]
    NoSeed,
    #[error("no board placement explains enough of the {lattice} lattice points")]
    NoConsistentPlacement { lattice: usize },
    #[error("{candidates} board placements explain the {lattice} lattice points equally well")]
    AmbiguousPlacement { lattice: usize, candidates: usize },
    #[error("pose estimation failed")]
    PoseEstimationFailed,
    #[error("not enough correspondences ({found}, need {needed})")]
    NotEnoughCorrespondences { found: usize, needed: usize },
    #[error("projection error {max_error:.3} px exceeds {limit:.3} px")]
    ProjectionErrorTooLarge { max_error: f64, limit: f64 },
}
