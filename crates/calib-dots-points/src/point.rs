use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Contrast class of a detected point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Dark dot on a bright background.
    Dark,
    /// Bright dot on a dark background.
    Bright,
}

impl Polarity {
    /// `true` for dark points.
    #[inline]
    pub fn sign(self) -> bool {
        matches!(self, Polarity::Dark)
    }

    #[inline]
    pub fn from_sign(sign: bool) -> Self {
        if sign {
            Polarity::Dark
        } else {
            Polarity::Bright
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Polarity::Dark => Polarity::Bright,
            Polarity::Bright => Polarity::Dark,
        }
    }
}

/// A single detected point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Sub-pixel image position.
    pub observation: Point2<f64>,
    pub polarity: Polarity,
    /// Outer radius of the smallest ring pattern that responded, in pixels.
    pub radius: u32,
    /// Mean squared contrast between the ring and the center pixel.
    pub strength: f32,
}

impl Point {
    pub fn new(observation: Point2<f64>, polarity: Polarity, radius: u32, strength: f32) -> Self {
        Self {
            observation,
            polarity,
            radius,
            strength,
        }
    }

    #[inline]
    pub fn sign(&self) -> bool {
        self.polarity.sign()
    }
}
