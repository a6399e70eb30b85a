use serde::{Deserialize, Serialize};

/// Configuration for [`crate::PointDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointDetectorParams {
    /// Smallest outer ring radius, in pixels.
    pub min_radius: u32,
    /// Largest outer ring radius, in pixels. Must stay below half the point spacing.
    pub max_radius: u32,
    /// Ring thickness; the ring covers `(radius - ring_width, radius]`.
    pub ring_width: u32,
    /// Minimal intensity difference between the center and every ring pixel.
    pub min_difference: u8,
    /// Maximal standard deviation of the ring intensities.
    pub max_deviation: f32,
    /// Dark points need a center at or below this value.
    pub dark_max_center: u8,
    /// Dark points need every ring pixel at or above this value.
    pub dark_min_ring: u8,
    /// Bright points need a center at or above this value.
    pub bright_min_center: u8,
    /// Bright points need every ring pixel at or below this value.
    pub bright_max_ring: u8,
    /// Half size of the non-maximum suppression window.
    pub nms_radius: u32,
    /// Refined points closer than this are merged.
    pub duplicate_distance: f64,
    /// Bright points this close to a dark point are dropped.
    pub bright_suppression_distance: f64,
}

impl Default for PointDetectorParams {
    fn default() -> Self {
        Self {
            min_radius: 2,
            max_radius: 10,
            ring_width: 2,
            min_difference: 5,
            max_deviation: 30.0,
            dark_max_center: 191,
            dark_min_ring: 63,
            bright_min_center: 64,
            bright_max_ring: 192,
            nms_radius: 2,
            duplicate_distance: 2.0,
            bright_suppression_distance: 4.0,
        }
    }
}

impl PointDetectorParams {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.ring_width == 0 {
            return Err("ring_width must be >= 1");
        }
        if self.min_radius < self.ring_width {
            return Err("min_radius must be >= ring_width");
        }
        if self.max_radius < self.min_radius {
            return Err("max_radius must be >= min_radius");
        }
        if self.max_radius > 64 {
            return Err("max_radius must be <= 64");
        }
        if !self.max_deviation.is_finite() || self.max_deviation < 0.0 {
            return Err("max_deviation must be finite and >= 0");
        }
        if !self.duplicate_distance.is_finite() || self.duplicate_distance < 0.0 {
            return Err("duplicate_distance must be finite and >= 0");
        }
        if !self.bright_suppression_distance.is_finite() || self.bright_suppression_distance < 0.0
        {
            return Err("bright_suppression_distance must be finite and >= 0");
        }
        Ok(())
    }
}
