//! Synthetic board views for tests, benchmarks and demos.
//!
//! Every grid point owns a `spacing_x x spacing_y` cell centered on it. Dark
//! points are black dots on white cells; bright points are white dots on
//! black cells. Everything outside the cells shows the background value.

use crate::MetricCalibrationBoard;
use calib_dots_core::{Camera, GrayImage};
use calib_dots_points::{Point, Polarity};
use nalgebra::{Isometry3, Point2, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Intensities and geometry of a rendered board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub white: u8,
    pub black: u8,
    /// Value outside the board; values above 192 never produce detections.
    pub background: u8,
    /// Dot radius relative to the smaller point spacing.
    pub dot_radius_rel: f64,
    /// Samples per pixel along each axis.
    pub supersampling: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            white: 235,
            black: 25,
            background: 210,
            dot_radius_rel: 0.15,
            supersampling: 4,
        }
    }
}

/// Pose placing the board center on the optical axis at `distance` meters,
/// rotated by `rotation` about its center.
pub fn centered_pose(
    board: &MetricCalibrationBoard,
    distance: f64,
    rotation: UnitQuaternion<f64>,
) -> Isometry3<f64> {
    let half_width = board.spacing_x() * (board.columns() - 1) as f64 * 0.5;
    let half_height = board.spacing_y() * (board.rows() - 1) as f64 * 0.5;
    Isometry3::from_parts(Translation3::new(0.0, 0.0, distance), rotation)
        * Translation3::new(-half_width, -half_height, 0.0)
}

/// Exact projections of all board points that land inside the image.
pub fn project_board_points<C: Camera + ?Sized>(
    board: &MetricCalibrationBoard,
    camera: &C,
    camera_from_board: &Isometry3<f64>,
) -> Vec<Point> {
    let mut points = Vec::new();
    for row in 0..board.rows() {
        for column in 0..board.columns() {
            let (Some(object), Some(polarity)) =
                (board.object_point(row, column), board.polarity(row, column))
            else {
                continue;
            };
            if let Some(pixel) = camera.project_to_image(camera_from_board, &object) {
                if camera.is_inside(&pixel, 0.0) {
                    points.push(Point::new(pixel, polarity, 0, 1.0));
                }
            }
        }
    }
    points
}

struct BoardShader<'a> {
    board: &'a MetricCalibrationBoard,
    options: &'a RenderOptions,
    dot_radius_sq: f64,
    rotation_inv: UnitQuaternion<f64>,
    translation: Vector3<f64>,
    normal: Vector3<f64>,
}

impl<'a> BoardShader<'a> {
    fn new(
        board: &'a MetricCalibrationBoard,
        options: &'a RenderOptions,
        camera_from_board: &Isometry3<f64>,
    ) -> Self {
        let dot_radius = options.dot_radius_rel * board.spacing_x().min(board.spacing_y());
        Self {
            board,
            options,
            dot_radius_sq: dot_radius * dot_radius,
            rotation_inv: camera_from_board.rotation.inverse(),
            translation: camera_from_board.translation.vector,
            normal: camera_from_board.rotation * Vector3::z(),
        }
    }

    /// Intensity seen along the camera ray `ray`.
    fn sample(&self, ray: &Vector3<f64>) -> f64 {
        let background = self.options.background as f64;
        let denom = self.normal.dot(ray);
        if denom.abs() < 1e-12 {
            return background;
        }
        let s = self.normal.dot(&self.translation) / denom;
        if s <= 0.0 {
            return background;
        }
        let local = self.rotation_inv * (ray * s - self.translation);
        self.board_value(local.x, local.y).unwrap_or(background)
    }

    fn board_value(&self, x: f64, y: f64) -> Option<f64> {
        let (sx, sy) = (self.board.spacing_x(), self.board.spacing_y());
        let column = (x / sx).round();
        let row = (y / sy).round();
        if column < 0.0 || row < 0.0 {
            return None;
        }
        let polarity = self.board.polarity(row as u32, column as u32)?;
        let dx = x - column * sx;
        let dy = y - row * sy;
        let in_dot = dx * dx + dy * dy <= self.dot_radius_sq;
        let dark = match polarity {
            Polarity::Dark => in_dot,
            Polarity::Bright => !in_dot,
        };
        Some(if dark {
            self.options.black as f64
        } else {
            self.options.white as f64
        })
    }
}

/// Render `board` as seen by `camera` from `camera_from_board`.
///
/// Camera rays are computed at pixel corners and interpolated for the
/// supersamples inside each pixel.
pub fn render_board_view<C: Camera + ?Sized>(
    board: &MetricCalibrationBoard,
    camera: &C,
    camera_from_board: &Isometry3<f64>,
    options: &RenderOptions,
) -> GrayImage {
    let (width, height) = (camera.width(), camera.height());
    let mut image = GrayImage::new(width, height, options.background);
    let shader = BoardShader::new(board, options, camera_from_board);
    let n = options.supersampling.max(1);

    let corner_stride = width + 1;
    let corners: Vec<Option<Vector3<f64>>> = (0..=height)
        .flat_map(|y| (0..=width).map(move |x| (x, y)))
        .map(|(x, y)| camera.unproject(&Point2::new(x as f64 - 0.5, y as f64 - 0.5)))
        .collect();

    for y in 0..height {
        for x in 0..width {
            let (Some(c00), Some(c10), Some(c01), Some(c11)) = (
                corners[y * corner_stride + x],
                corners[y * corner_stride + x + 1],
                corners[(y + 1) * corner_stride + x],
                corners[(y + 1) * corner_stride + x + 1],
            ) else {
                continue;
            };
            let mut sum = 0.0;
            for sy in 0..n {
                let fy = (sy as f64 + 0.5) / n as f64;
                let left = c00 + (c01 - c00) * fy;
                let right = c10 + (c11 - c10) * fy;
                for sx in 0..n {
                    let fx = (sx as f64 + 0.5) / n as f64;
                    sum += shader.sample(&(left + (right - left) * fx));
                }
            }
            let value = sum / (n * n) as f64;
            image.set(x, y, value.round().clamp(0.0, 255.0) as u8);
        }
    }
    image
}
