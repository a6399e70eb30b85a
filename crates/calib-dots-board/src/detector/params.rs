use calib_dots_points::PointDetectorParams;
use serde::{Deserialize, Serialize};

/// Configuration for [`crate::CalibrationBoardDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardDetectorParams {
    /// Point detector used when the detector runs on an image.
    pub points: PointDetectorParams,
    /// Minimal number of correspondences of an accepted observation.
    pub min_correspondences: usize,
    /// Neighbors inspected when choosing the two lattice axes of a seed.
    pub neighbor_count: usize,
    /// Seed matching radius, relative to the local point spacing.
    pub seed_tolerance: f64,
    /// Growth matching radius, relative to the predicted local spacing.
    pub growth_tolerance: f64,
    /// The second-closest point must be this many times farther than the closest one.
    pub uniqueness_ratio: f64,
    /// Share of lattice points a board placement may contradict, either by
    /// falling off the board or by polarity. Contradicting points are dropped.
    pub max_outlier_ratio: f64,
    /// Levenberg-Marquardt iterations per pose refinement.
    pub refinement_iterations: usize,
    /// Rounds of additional correspondences found by projecting the board.
    pub additional_passes: usize,
}

impl Default for BoardDetectorParams {
    fn default() -> Self {
        Self {
            points: PointDetectorParams::default(),
            min_correspondences: 16,
            neighbor_count: 8,
            seed_tolerance: 0.25,
            growth_tolerance: 0.25,
            uniqueness_ratio: 2.0,
            max_outlier_ratio: 0.2,
            refinement_iterations: 20,
            additional_passes: 3,
        }
    }
}

impl BoardDetectorParams {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.min_correspondences < 4 {
            return Err("min_correspondences must be >= 4");
        }
        if self.neighbor_count < 2 {
            return Err("neighbor_count must be >= 2");
        }
        let in_range = |v: f64| v.is_finite() && v > 0.0 && v < 0.5;
        if !in_range(self.seed_tolerance) || !in_range(self.growth_tolerance) {
            return Err("seed_tolerance and growth_tolerance must lie in (0, 0.5)");
        }
        if !self.uniqueness_ratio.is_finite() || self.uniqueness_ratio < 1.0 {
            return Err("uniqueness_ratio must be finite and >= 1");
        }
        if !(0.0..0.5).contains(&self.max_outlier_ratio) {
            return Err("max_outlier_ratio must lie in [0, 0.5)");
        }
        Ok(())
    }
}
