//! Core types for dot-grid calibration board detection.
//!
//! Purely geometric building blocks shared by the point detector and the
//! board detector: strided gray images, homographies, D4 lattice transforms,
//! the camera abstraction, planar pose estimation and an optional worker
//! pool. Nothing here knows about a concrete board layout.

mod camera;
mod grid_alignment;
mod homography;
mod image;
mod logger;
mod parallel;
mod pose;

pub use camera::{
    Camera, CameraError, CameraIntrinsics, PinholeCamera, RadialTangentialDistortion,
};
pub use grid_alignment::{GridAlignment, GridTransform, GRID_TRANSFORMS_D4};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{GrayImage, GrayImageView, ImageError};
pub use parallel::{execute_bands, WorkerPool, WorkerPoolError};
pub use pose::{pose_from_homography, refine_pose, reprojection_errors, rms};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_ENV};
