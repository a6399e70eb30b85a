//! Planar pose estimation: homography decomposition and reprojection refinement.

use crate::{Camera, Homography};
use nalgebra::{
    DMatrix, DVector, Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion,
    Vector3, Vector6,
};

/// Recover `camera_from_board` from a homography mapping board-plane
/// coordinates `(x, y)` (with `z = 0`) to normalized image coordinates.
///
/// The solution is chosen so that the board lies in front of the camera.
pub fn pose_from_homography(h: &Homography) -> Option<Isometry3<f64>> {
    let m = h.h;
    let h1 = m.column(0).into_owned();
    let h2 = m.column(1).into_owned();
    let h3 = m.column(2).into_owned();

    let n1 = h1.norm();
    let n2 = h2.norm();
    if n1 < 1e-12 || n2 < 1e-12 {
        return None;
    }
    let mut lambda = 2.0 / (n1 + n2);
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let t = h3 * lambda;

    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = approx.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }

    if !t.iter().all(|v| v.is_finite()) || t.z <= 0.0 {
        return None;
    }

    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    Some(Isometry3::from_parts(Translation3::from(t), rotation))
}

/// Per-point pixel residuals of `object_points` projected through `camera_from_board`.
///
/// `None` if any point fails to project.
pub fn reprojection_errors<C: Camera + ?Sized>(
    camera: &C,
    camera_from_board: &Isometry3<f64>,
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
) -> Option<Vec<f64>> {
    object_points
        .iter()
        .zip(image_points)
        .map(|(o, i)| {
            camera
                .project_to_image(camera_from_board, o)
                .map(|p| (p - i).norm())
        })
        .collect()
}

/// Root mean square of a residual list.
pub fn rms(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
}

fn residual_vector<C: Camera + ?Sized>(
    camera: &C,
    pose: &Isometry3<f64>,
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
) -> Option<DVector<f64>> {
    let mut r = DVector::zeros(2 * object_points.len());
    for (k, (o, i)) in object_points.iter().zip(image_points).enumerate() {
        let p = camera.project_to_image(pose, o)?;
        r[2 * k] = p.x - i.x;
        r[2 * k + 1] = p.y - i.y;
    }
    Some(r)
}

#[inline]
fn perturb(pose: &Isometry3<f64>, delta: &Vector6<f64>) -> Isometry3<f64> {
    let rotation = Vector3::new(delta[0], delta[1], delta[2]);
    let translation = Vector3::new(delta[3], delta[4], delta[5]);
    Isometry3::new(translation, rotation) * pose
}

/// Levenberg-Marquardt refinement of `camera_from_board` minimizing pixel
/// reprojection error through `camera`.
///
/// Returns `None` if the inputs are inconsistent or the initial pose does not
/// project every point.
pub fn refine_pose<C: Camera + ?Sized>(
    camera: &C,
    initial: &Isometry3<f64>,
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    max_iterations: usize,
) -> Option<Isometry3<f64>> {
    const STEP: f64 = 1e-7;

    if object_points.len() != image_points.len() || object_points.len() < 3 {
        return None;
    }

    let mut pose = *initial;
    let mut residuals = residual_vector(camera, &pose, object_points, image_points)?;
    let mut cost = residuals.norm_squared();
    let mut lambda = 1e-3;

    for _ in 0..max_iterations {
        let mut jacobian = DMatrix::zeros(residuals.len(), 6);
        for p in 0..6 {
            let mut delta = Vector6::zeros();
            delta[p] = STEP;
            let shifted = residual_vector(camera, &perturb(&pose, &delta), object_points, image_points)?;
            jacobian.set_column(p, &((shifted - &residuals) / STEP));
        }

        let jt = jacobian.transpose();
        let jtj = &jt * &jacobian;
        let gradient = &jt * &residuals;

        let mut improved = false;
        while lambda < 1e10 {
            let mut damped = jtj.clone();
            for d in 0..6 {
                damped[(d, d)] += lambda * jtj[(d, d)].max(1e-9);
            }
            let Some(step) = damped.lu().solve(&(-&gradient)) else {
                lambda *= 10.0;
                continue;
            };
            let delta = Vector6::from_iterator(step.iter().copied());
            let candidate = perturb(&pose, &delta);
            match residual_vector(camera, &candidate, object_points, image_points) {
                Some(r) if r.norm_squared() < cost => {
                    let new_cost = r.norm_squared();
                    let converged = cost - new_cost <= 1e-14 * cost.max(1e-30)
                        || delta.norm() < 1e-12;
                    pose = candidate;
                    residuals = r;
                    cost = new_cost;
                    lambda = (lambda * 0.1).max(1e-12);
                    improved = true;
                    if converged {
                        return Some(pose);
                    }
                    break;
                }
                _ => lambda *= 10.0,
            }
        }
        if !improved {
            break;
        }
    }

    Some(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{estimate_homography, PinholeCamera};
    use approx::assert_abs_diff_eq;

    fn board_points() -> Vec<Point3<f64>> {
        (0..5)
            .flat_map(|r| (0..6).map(move |c| Point3::new(c as f64 * 0.03, r as f64 * 0.03, 0.0)))
            .collect()
    }

    fn ground_truth() -> Isometry3<f64> {
        Isometry3::new(Vector3::new(-0.06, -0.05, 0.6), Vector3::new(0.25, -0.3, 0.1))
    }

    #[test]
    fn homography_decomposition_recovers_pose() {
        let pose = ground_truth();
        let objects = board_points();
        let plane: Vec<Point2<f64>> = objects.iter().map(|o| Point2::new(o.x, o.y)).collect();
        let normalized: Vec<Point2<f64>> = objects
            .iter()
            .map(|o| {
                let c = pose * o;
                Point2::new(c.x / c.z, c.y / c.z)
            })
            .collect();

        let h = estimate_homography(&plane, &normalized).expect("homography");
        let recovered = pose_from_homography(&h).expect("pose");

        assert_abs_diff_eq!(
            recovered.translation.vector,
            pose.translation.vector,
            epsilon = 1e-6
        );
        assert!(recovered.rotation.angle_to(&pose.rotation) < 1e-6);
    }

    #[test]
    fn refinement_converges_from_a_perturbed_pose() {
        let camera = PinholeCamera::from_horizontal_fov(800, 600, 1.1)
            .expect("camera")
            .with_distortion(crate::RadialTangentialDistortion {
                k1: -0.1,
                ..Default::default()
            });
        let pose = ground_truth();
        let objects = board_points();
        let images: Vec<Point2<f64>> = objects
            .iter()
            .map(|o| camera.project_to_image(&pose, o).expect("visible"))
            .collect();

        let start = Isometry3::new(Vector3::new(0.01, 0.01, -0.03), Vector3::new(0.02, 0.0, -0.03))
            * pose;
        let refined = refine_pose(&camera, &start, &objects, &images, 50).expect("refined");
        let errors = reprojection_errors(&camera, &refined, &objects, &images).expect("errors");

        assert!(rms(&errors) < 1e-6, "rms {}", rms(&errors));
        assert!(refined.rotation.angle_to(&pose.rotation) < 1e-6);
    }

    #[test]
    fn refinement_rejects_mismatched_inputs() {
        let camera = PinholeCamera::from_horizontal_fov(800, 600, 1.1).expect("camera");
        let objects = board_points();
        assert!(refine_pose(&camera, &ground_truth(), &objects, &[], 10).is_none());
        assert_eq!(rms(&[]), 0.0);
    }
}
