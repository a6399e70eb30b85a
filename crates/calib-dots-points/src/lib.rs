//! Dark and bright dot detection in 8-bit gray images.
//!
//! Every pixel is tested against a family of ring patterns: a point is a
//! center pixel that is consistently darker (or brighter) than all pixels of
//! a surrounding ring. Local maxima of the ring contrast are refined to
//! sub-pixel accuracy with a contrast-weighted centroid.
//!
//! ```
//! use calib_dots_core::GrayImage;
//! use calib_dots_points::synthetic::paint_dot;
//! use calib_dots_points::{PointDetector, Polarity};
//! use nalgebra::Point2;
//!
//! let mut img = GrayImage::new(48, 48, 220);
//! paint_dot(&mut img, Point2::new(24.0, 24.0), 3.0, 30);
//!
//! let points = PointDetector::default().detect_points(&img.view(), None).unwrap();
//! assert_eq!(points.len(), 1);
//! assert_eq!(points[0].polarity, Polarity::Dark);
//! ```

mod detector;
mod params;
mod pattern;
mod point;
mod point_set;
pub mod synthetic;

pub use detector::{PointDetectError, PointDetector};
pub use params::PointDetectorParams;
pub use pattern::{build_patterns, RingPattern};
pub use point::{Point, Polarity};
pub use point_set::{ClosestPoints, PointSet};
