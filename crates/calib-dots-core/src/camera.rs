//! Camera models consumed by the detectors.
//!
//! Camera frame convention: `x` right, `y` down, `z` forward (into the scene).
//! Pixel coordinates have integer values at pixel centers.

use nalgebra::{Isometry3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A calibrated projection model with a fixed image resolution.
pub trait Camera {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Project a point given in camera coordinates into (distorted) pixels.
    ///
    /// Returns `None` for points behind the camera or where the model is undefined.
    fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>>;

    /// Back-project a pixel into a viewing ray on the `z = 1` plane.
    fn unproject(&self, pixel: &Point2<f64>) -> Option<Vector3<f64>>;

    /// Project a board-space point through the pose `camera_from_board`.
    fn project_to_image(
        &self,
        camera_from_board: &Isometry3<f64>,
        object_point: &Point3<f64>,
    ) -> Option<Point2<f64>> {
        self.project(&(camera_from_board * object_point))
    }

    /// `true` if `pixel` lies inside the image with at least `margin` pixels to spare.
    fn is_inside(&self, pixel: &Point2<f64>, margin: f64) -> bool {
        pixel.x >= margin
            && pixel.y >= margin
            && pixel.x <= self.width() as f64 - 1.0 - margin
            && pixel.y <= self.height() as f64 - 1.0 - margin
    }
}

impl<C: Camera + ?Sized> Camera for &C {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        (**self).project(point)
    }

    fn unproject(&self, pixel: &Point2<f64>) -> Option<Vector3<f64>> {
        (**self).unproject(pixel)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("camera resolution must be non-zero (width={width}, height={height})")]
    InvalidResolution { width: usize, height: usize },
    #[error("focal lengths must be finite and non-zero")]
    InvalidFocalLength,
    #[error("field of view must lie in (0, pi) radians, got {0}")]
    InvalidFieldOfView(f64),
}

/// Pinhole intrinsics in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn is_valid(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite())
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }
}

/// Brown-Conrady radial-tangential distortion coefficients.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RadialTangentialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub p1: f64,
    pub p2: f64,
}

impl RadialTangentialDistortion {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn distort(&self, x: f64, y: f64) -> [f64; 2] {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r4 * r2;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        [x * radial + x_tan, y * radial + y_tan]
    }

    /// Fixed-point inversion of [`Self::distort`].
    pub fn undistort(&self, xd: f64, yd: f64) -> Option<[f64; 2]> {
        const MAX_ITERS: usize = 20;
        const EPS: f64 = 1e-14;

        if self.is_zero() {
            return Some([xd, yd]);
        }

        let mut x = xd;
        let mut y = yd;
        for _ in 0..MAX_ITERS {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r4 * r2;
            if !radial.is_finite() || radial.abs() < 1e-12 {
                return None;
            }
            let dx_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let x_next = (xd - dx_tan) / radial;
            let y_next = (yd - dy_tan) / radial;
            if !x_next.is_finite() || !y_next.is_finite() {
                return None;
            }
            let step = (x_next - x).powi(2) + (y_next - y).powi(2);
            x = x_next;
            y = y_next;
            if step <= EPS * EPS {
                break;
            }
        }
        Some([x, y])
    }
}

/// Pinhole camera with radial-tangential distortion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PinholeCamera {
    pub width: usize,
    pub height: usize,
    pub intrinsics: CameraIntrinsics,
    #[serde(default)]
    pub distortion: RadialTangentialDistortion,
}

impl PinholeCamera {
    pub fn new(
        width: usize,
        height: usize,
        intrinsics: CameraIntrinsics,
        distortion: RadialTangentialDistortion,
    ) -> Result<Self, CameraError> {
        let camera = Self {
            width,
            height,
            intrinsics,
            distortion,
        };
        camera.validate()?;
        Ok(camera)
    }

    /// Distortion-free camera with the principal point at the image center.
    pub fn from_horizontal_fov(
        width: usize,
        height: usize,
        fov_x: f64,
    ) -> Result<Self, CameraError> {
        if !fov_x.is_finite() || fov_x <= 0.0 || fov_x >= std::f64::consts::PI {
            return Err(CameraError::InvalidFieldOfView(fov_x));
        }
        let f = width as f64 * 0.5 / (fov_x * 0.5).tan();
        Self::new(
            width,
            height,
            CameraIntrinsics {
                fx: f,
                fy: f,
                cx: (width as f64 - 1.0) * 0.5,
                cy: (height as f64 - 1.0) * 0.5,
            },
            RadialTangentialDistortion::default(),
        )
    }

    pub fn with_distortion(mut self, distortion: RadialTangentialDistortion) -> Self {
        self.distortion = distortion;
        self
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        if !self.intrinsics.is_valid() {
            return Err(CameraError::InvalidFocalLength);
        }
        Ok(())
    }
}

impl Camera for PinholeCamera {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= 1e-9 {
            return None;
        }
        let [xd, yd] = self.distortion.distort(point.x / point.z, point.y / point.z);
        let k = &self.intrinsics;
        let p = Point2::new(k.fx * xd + k.cx, k.fy * yd + k.cy);
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }

    fn unproject(&self, pixel: &Point2<f64>) -> Option<Vector3<f64>> {
        let k = &self.intrinsics;
        let xd = (pixel.x - k.cx) / k.fx;
        let yd = (pixel.y - k.cy) / k.fy;
        let [x, y] = self.distortion.undistort(xd, yd)?;
        Some(Vector3::new(x, y, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn distorted_camera() -> PinholeCamera {
        PinholeCamera::new(
            1280,
            960,
            CameraIntrinsics {
                fx: 900.0,
                fy: 920.0,
                cx: 640.0,
                cy: 480.0,
            },
            RadialTangentialDistortion {
                k1: -0.12,
                k2: 0.03,
                k3: 0.0,
                p1: 0.001,
                p2: -0.0008,
            },
        )
        .expect("camera")
    }

    #[test]
    fn rejects_invalid_models() {
        let k = CameraIntrinsics {
            fx: 0.0,
            fy: 500.0,
            cx: 0.0,
            cy: 0.0,
        };
        assert_eq!(
            PinholeCamera::new(640, 480, k, RadialTangentialDistortion::default()),
            Err(CameraError::InvalidFocalLength)
        );
        assert!(matches!(
            PinholeCamera::from_horizontal_fov(0, 480, 1.0),
            Err(CameraError::InvalidResolution { .. })
        ));
        assert!(PinholeCamera::from_horizontal_fov(640, 480, 3.5).is_err());
    }

    #[test]
    fn unproject_inverts_project_with_distortion() {
        let cam = distorted_camera();
        for p in [
            Point3::new(0.1, -0.05, 1.0),
            Point3::new(-0.3, 0.2, 0.9),
            Point3::new(0.0, 0.0, 2.0),
        ] {
            let pix = cam.project(&p).expect("in front");
            let ray = cam.unproject(&pix).expect("ray");
            assert_abs_diff_eq!(ray.x, p.x / p.z, epsilon = 1e-9);
            assert_abs_diff_eq!(ray.y, p.y / p.z, epsilon = 1e-9);
            assert_abs_diff_eq!(ray.z, 1.0);
        }
    }

    #[test]
    fn points_behind_the_camera_do_not_project() {
        let cam = PinholeCamera::from_horizontal_fov(640, 480, 1.0).expect("camera");
        assert!(cam.project(&Point3::new(0.0, 0.0, -1.0)).is_none());

        let center = cam.project(&Point3::new(0.0, 0.0, 1.0)).expect("center");
        assert_abs_diff_eq!(center.x, 319.5);
        assert_abs_diff_eq!(center.y, 239.5);
        assert!(cam.is_inside(&center, 10.0));
        assert!(!cam.is_inside(&Point2::new(-1.0, 10.0), 0.0));
    }

    #[test]
    fn project_to_image_applies_the_pose() {
        let cam = PinholeCamera::from_horizontal_fov(640, 480, 1.0).expect("camera");
        let pose = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 2.0),
            UnitQuaternion::identity(),
        );
        let via_pose = cam
            .project_to_image(&pose, &Point3::new(0.1, 0.0, 0.0))
            .expect("projects");
        let direct = cam.project(&Point3::new(0.1, 0.0, 2.0)).expect("projects");
        assert_abs_diff_eq!(via_pose.x, direct.x);
        assert_abs_diff_eq!(via_pose.y, direct.y);
    }
}
