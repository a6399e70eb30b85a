//! Detection entry points over `image` buffers and raw strided pixels.

use crate::{board, core, points};
use calib_dots_core::Camera;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("gray buffer holds {got} bytes, a {expected}-byte frame was expected")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("cannot build a {width}x{height} gray frame")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] core::ImageError),

    #[error(transparent)]
    Points(#[from] points::PointDetectError),

    #[error(transparent)]
    BoardDetect(#[from] board::BoardDetectError),
}

/// Borrow an `image::GrayImage` as a packed view.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        stride: img.width() as usize,
        data: img.as_raw(),
    }
}

/// Copy a `calib-dots-core` image into an `image::GrayImage`, e.g. for saving.
pub fn to_image_gray(img: &core::GrayImage) -> Result<::image::GrayImage, DetectError> {
    gray_image_from_slice(img.width as u32, img.height as u32, &img.data)
}

/// Copy a packed 8-bit buffer into an `image::GrayImage`.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    if width == 0 || height == 0 {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    }
    let Some(expected) = (width as usize).checked_mul(height as usize) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidGrayDimensions { width, height })
}

/// Detect dark and bright points with the given detector.
pub fn detect_points(
    img: &::image::GrayImage,
    detector: &points::PointDetector,
    pool: Option<&core::WorkerPool>,
) -> Result<Vec<points::Point>, DetectError> {
    Ok(detector.detect_points(&gray_view(img), pool)?)
}

/// Run the board detector end-to-end with default parameters.
pub fn detect_calibration_board<C: Camera + ?Sized>(
    img: &::image::GrayImage,
    camera: &C,
    board: &board::MetricCalibrationBoard,
    maximal_projection_error: f64,
    pool: Option<&core::WorkerPool>,
) -> Result<board::CalibrationBoardObservation, DetectError> {
    let detector = board::CalibrationBoardDetector::default();
    detect_calibration_board_with(&detector, img, camera, board, maximal_projection_error, pool)
}

/// Run a configured board detector end-to-end: points -> lattice -> pose.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(detector, img, camera, board, pool),
        fields(width = img.width(), height = img.height(), board_id = board.board_id())
    )
)]
pub fn detect_calibration_board_with<C: Camera + ?Sized>(
    detector: &board::CalibrationBoardDetector,
    img: &::image::GrayImage,
    camera: &C,
    board: &board::MetricCalibrationBoard,
    maximal_projection_error: f64,
    pool: Option<&core::WorkerPool>,
) -> Result<board::CalibrationBoardObservation, DetectError> {
    let observation = detector.detect_calibration_board(
        camera,
        &gray_view(img),
        board,
        maximal_projection_error,
        pool,
    )?;
    log::info!(
        "board {} detected with {} correspondences (rms {:.3} px)",
        observation.board_id,
        observation.len(),
        observation.rms_error
    );
    Ok(observation)
}

/// Detect on raw 8-bit pixels whose rows start every `stride` bytes.
///
/// The buffer is borrowed, not copied; padding bytes are never read.
#[allow(clippy::too_many_arguments)]
pub fn detect_calibration_board_from_gray_u8<C: Camera + ?Sized>(
    width: usize,
    height: usize,
    stride: usize,
    pixels: &[u8],
    camera: &C,
    board: &board::MetricCalibrationBoard,
    maximal_projection_error: f64,
    pool: Option<&core::WorkerPool>,
) -> Result<board::CalibrationBoardObservation, DetectError> {
    let view = core::GrayImageView::new(width, height, stride, pixels)?;
    let detector = board::CalibrationBoardDetector::default();
    Ok(detector.detect_calibration_board(camera, &view, board, maximal_projection_error, pool)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_buffers_are_validated() {
        assert!(matches!(
            gray_image_from_slice(0, 4, &[]),
            Err(DetectError::InvalidGrayDimensions { width: 0, height: 4 })
        ));
        assert!(matches!(
            gray_image_from_slice(4, 4, &[0; 15]),
            Err(DetectError::InvalidGrayBuffer {
                expected: 16,
                got: 15
            })
        ));
        let img = gray_image_from_slice(4, 2, &[1, 2, 3, 4, 5, 6, 7, 8]).expect("image");
        let view = gray_view(&img);
        assert_eq!((view.width, view.height, view.stride), (4, 2, 4));
        assert_eq!(view.get(2, 1), 7);
    }
}
