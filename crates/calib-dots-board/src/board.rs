//! Metric description of a dot-grid calibration board.

use crate::signature::{block_code, build_signature};
use calib_dots_points::Polarity;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Unit of a physical board dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    #[default]
    Millimeter,
    Centimeter,
    Meter,
    Inch,
}

impl LengthUnit {
    #[inline]
    pub fn meters_per_unit(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 1e-3,
            LengthUnit::Centimeter => 1e-2,
            LengthUnit::Meter => 1.0,
            LengthUnit::Inch => 0.0254,
        }
    }
}

/// A length with an explicit unit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSize {
    pub value: f64,
    #[serde(default)]
    pub unit: LengthUnit,
}

impl MetricSize {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    pub fn millimeters(value: f64) -> Self {
        Self::new(value, LengthUnit::Millimeter)
    }

    pub fn meters(value: f64) -> Self {
        Self::new(value, LengthUnit::Meter)
    }

    #[inline]
    pub fn to_meters(self) -> f64 {
        self.value * self.unit.meters_per_unit()
    }

    #[inline]
    fn is_valid(self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

/// Static board specification.
///
/// `physical_width` spans the first to the last column, `physical_height`
/// the first to the last row, measured between point centers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    pub board_id: u32,
    pub rows: u32,
    pub columns: u32,
    pub physical_width: MetricSize,
    pub physical_height: MetricSize,
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("rows and columns must be >= 2 (got {rows}x{columns})")]
    InvalidSize { rows: u32, columns: u32 },
    #[error("board with {rows}x{columns} points is too large")]
    TooLarge { rows: u32, columns: u32 },
    #[error("physical width and height must be finite and > 0")]
    InvalidPhysicalSize,
}

const MAX_POINTS: u64 = 1 << 20;

/// Validated board with per-point positions and polarities.
///
/// Board space is metric (meters) with the first point at the origin,
/// columns along `+x`, rows along `+y` and the board plane at `z = 0`.
#[derive(Clone, Debug)]
pub struct MetricCalibrationBoard {
    spec: BoardSpec,
    spacing_x: f64,
    spacing_y: f64,
    polarities: Vec<Polarity>,
    signature_window: Option<usize>,
    block_codes: HashSet<u64>,
}

impl PartialEq for MetricCalibrationBoard {
    fn eq(&self, other: &Self) -> bool {
        self.spec.board_id == other.spec.board_id
    }
}

/// Build a board from its id, grid size and physical dimensions.
pub fn create_metric_calibration_board(
    board_id: u32,
    rows: u32,
    columns: u32,
    physical_width: MetricSize,
    physical_height: MetricSize,
) -> Result<MetricCalibrationBoard, BoardError> {
    MetricCalibrationBoard::new(BoardSpec {
        board_id,
        rows,
        columns,
        physical_width,
        physical_height,
    })
}

impl MetricCalibrationBoard {
    pub fn new(spec: BoardSpec) -> Result<Self, BoardError> {
        let (rows, columns) = (spec.rows, spec.columns);
        if rows < 2 || columns < 2 {
            return Err(BoardError::InvalidSize { rows, columns });
        }
        if rows as u64 * columns as u64 > MAX_POINTS {
            return Err(BoardError::TooLarge { rows, columns });
        }
        if !spec.physical_width.is_valid() || !spec.physical_height.is_valid() {
            return Err(BoardError::InvalidPhysicalSize);
        }

        let signature = build_signature(spec.board_id, rows as usize, columns as usize);
        log::debug!(
            "board {}: {}x{} points, identifying window {:?}",
            spec.board_id,
            rows,
            columns,
            signature.window
        );

        Ok(Self {
            spec,
            spacing_x: spec.physical_width.to_meters() / (columns - 1) as f64,
            spacing_y: spec.physical_height.to_meters() / (rows - 1) as f64,
            polarities: signature.polarities,
            signature_window: signature.window,
            block_codes: signature.block_codes,
        })
    }

    #[inline]
    pub fn spec(&self) -> BoardSpec {
        self.spec
    }

    #[inline]
    pub fn board_id(&self) -> u32 {
        self.spec.board_id
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.spec.rows
    }

    #[inline]
    pub fn columns(&self) -> u32 {
        self.spec.columns
    }

    /// Distance between neighboring columns, in meters.
    #[inline]
    pub fn spacing_x(&self) -> f64 {
        self.spacing_x
    }

    /// Distance between neighboring rows, in meters.
    #[inline]
    pub fn spacing_y(&self) -> f64 {
        self.spacing_y
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.polarities.len()
    }

    #[inline]
    pub fn contains(&self, row: i32, column: i32) -> bool {
        row >= 0 && column >= 0 && (row as u32) < self.spec.rows && (column as u32) < self.spec.columns
    }

    /// Board-space position of grid point `(row, column)`.
    pub fn object_point(&self, row: u32, column: u32) -> Option<Point3<f64>> {
        (row < self.spec.rows && column < self.spec.columns).then(|| {
            Point3::new(
                column as f64 * self.spacing_x,
                row as f64 * self.spacing_y,
                0.0,
            )
        })
    }

    pub fn polarity(&self, row: u32, column: u32) -> Option<Polarity> {
        (row < self.spec.rows && column < self.spec.columns)
            .then(|| self.polarities[(row * self.spec.columns + column) as usize])
    }

    /// Row-major polarities of all points.
    #[inline]
    pub fn polarities(&self) -> &[Polarity] {
        &self.polarities
    }

    /// Side of the square window that identifies a board position, if one exists.
    #[inline]
    pub fn signature_window(&self) -> Option<usize> {
        self.signature_window
    }

    /// `true` if `block` appears on the board under some rotation or mirroring.
    pub fn window_occurs(&self, block: &[[Polarity; 3]; 3]) -> bool {
        self.block_codes.contains(&block_code(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn board_8x11() -> MetricCalibrationBoard {
        create_metric_calibration_board(
            3,
            8,
            11,
            MetricSize::millimeters(200.0),
            MetricSize::millimeters(140.0),
        )
        .expect("board")
    }

    #[test]
    fn rejects_invalid_specs() {
        let size = MetricSize::millimeters(100.0);
        assert_eq!(
            create_metric_calibration_board(0, 1, 5, size, size).unwrap_err(),
            BoardError::InvalidSize {
                rows: 1,
                columns: 5
            }
        );
        assert_eq!(
            create_metric_calibration_board(0, 5, 5, MetricSize::millimeters(0.0), size)
                .unwrap_err(),
            BoardError::InvalidPhysicalSize
        );
        assert_eq!(
            create_metric_calibration_board(0, 5, 5, size, MetricSize::meters(f64::NAN))
                .unwrap_err(),
            BoardError::InvalidPhysicalSize
        );
    }

    #[test]
    fn object_points_follow_the_metric_layout() {
        let board = board_8x11();
        assert_relative_eq!(board.spacing_x(), 0.02, epsilon = 1e-12);
        assert_relative_eq!(board.spacing_y(), 0.02, epsilon = 1e-12);
        assert_eq!(board.point_count(), 88);

        let p = board.object_point(7, 10).expect("corner");
        assert_relative_eq!(p.x, 0.2, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.14, epsilon = 1e-12);
        assert_eq!(p.z, 0.0);
        assert!(board.object_point(8, 0).is_none());
        assert!(!board.contains(0, 11));
        assert!(board.contains(7, 10));
    }

    #[test]
    fn boards_compare_by_id() {
        let a = board_8x11();
        let b = create_metric_calibration_board(
            3,
            4,
            4,
            MetricSize::new(3.0, LengthUnit::Inch),
            MetricSize::new(3.0, LengthUnit::Inch),
        )
        .expect("board");
        assert_eq!(a, b);
        assert_relative_eq!(b.spacing_x(), 0.0254, epsilon = 1e-12);
    }

    #[test]
    fn layout_carries_both_polarities() {
        let board = board_8x11();
        let dark = board.polarities().iter().filter(|p| p.sign()).count();
        assert!(dark > 10 && dark < 78, "{dark}");
        assert!(board.signature_window().is_some());
    }

    #[test]
    fn spec_round_trips_through_json() {
        let spec = board_8x11().spec();
        let json = serde_json::to_string(&spec).expect("json");
        assert!(json.contains("\"millimeter\""));
        let back: BoardSpec = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, spec);
    }
}
