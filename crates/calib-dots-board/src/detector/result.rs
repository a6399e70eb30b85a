use calib_dots_points::Polarity;
use nalgebra::{Isometry3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// One detected point matched to a board grid point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub row: u32,
    pub column: u32,
    /// Board-space position, in meters.
    pub object_point: Point3<f64>,
    /// Detected sub-pixel image position.
    pub image_point: Point2<f64>,
    pub polarity: Polarity,
    /// Reprojection error under the final pose, in pixels.
    pub residual: f64,
}

/// Output of a successful board detection.
///
/// Correspondences are sorted by `(row, column)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBoardObservation {
    pub board_id: u32,
    pub camera_from_board: Isometry3<f64>,
    pub correspondences: Vec<Correspondence>,
    pub rms_error: f64,
    pub max_error: f64,
}

impl CalibrationBoardObservation {
    #[inline]
    pub fn len(&self) -> usize {
        self.correspondences.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.correspondences.is_empty()
    }

    pub fn object_points(&self) -> Vec<Point3<f64>> {
        self.correspondences.iter().map(|c| c.object_point).collect()
    }

    pub fn image_points(&self) -> Vec<Point2<f64>> {
        self.correspondences.iter().map(|c| c.image_point).collect()
    }

    #[inline]
    pub fn board_from_camera(&self) -> Isometry3<f64> {
        self.camera_from_board.inverse()
    }

    /// Correspondence of grid point `(row, column)`, if it was matched.
    pub fn get(&self, row: u32, column: u32) -> Option<&Correspondence> {
        self.correspondences
            .binary_search_by(|c| (c.row, c.column).cmp(&(row, column)))
            .ok()
            .map(|i| &self.correspondences[i])
    }
}
