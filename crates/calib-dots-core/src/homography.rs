use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Planar projective transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Map a point; `None` when it lands on the line at infinity.
    #[inline]
    pub fn try_apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v: Vector3<f64> = self.h * p.to_homogeneous();
        (v.z.abs() >= 1e-12).then(|| Point2::new(v.x / v.z, v.y / v.z))
    }

    /// Map a point without checking `w`; callers know it stays finite.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * p.to_homogeneous();
        Point2::new(v.x / v.z, v.y / v.z)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity that moves a point set to its centroid and scales the mean
/// distance from it to `sqrt(2)`.
struct Conditioning {
    scale: f64,
    cx: f64,
    cy: f64,
}

impl Conditioning {
    fn of(points: &[Point2<f64>]) -> Self {
        let n = points.len().max(1) as f64;
        let centroid = points.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
        let spread = points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
        Self {
            scale: if spread > 1e-12 {
                std::f64::consts::SQRT_2 / spread
            } else {
                1.0
            },
            cx: centroid.x,
            cy: centroid.y,
        }
    }

    #[inline]
    fn apply(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::new(self.scale * (p.x - self.cx), self.scale * (p.y - self.cy))
    }

    fn matrix(&self) -> Matrix3<f64> {
        let s = self.scale;
        Matrix3::new(s, 0.0, -s * self.cx, 0.0, s, -s * self.cy, 0.0, 0.0, 1.0)
    }

    fn inverse_matrix(&self) -> Matrix3<f64> {
        let s = 1.0 / self.scale;
        Matrix3::new(s, 0.0, self.cx, 0.0, s, self.cy, 0.0, 0.0, 1.0)
    }
}

/// Undo the conditioning of both point sets and fix the scale to `h33 = 1`.
fn uncondition(hn: Matrix3<f64>, src: &Conditioning, dst: &Conditioning) -> Option<Homography> {
    let h = dst.inverse_matrix() * hn * src.matrix();
    let w = h[(2, 2)];
    if !w.is_finite() || w.abs() < 1e-12 {
        return None;
    }
    let h = h / w;
    h.iter().all(|v| v.is_finite()).then_some(Homography::new(h))
}

/// Estimate H such that `dst ~ H * src` from at least 4 correspondences.
///
/// Conditioned DLT: `h` is the eigenvector of the smallest eigenvalue of the
/// 9x9 normal matrix `A^T A`. Exactly 4 points go through the direct solver.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if let (Ok(s), Ok(d)) = (<&[Point2<f64>; 4]>::try_from(src), <&[Point2<f64>; 4]>::try_from(dst)) {
        return homography_from_4pt(s, d);
    }

    let cs = Conditioning::of(src);
    let cd = Conditioning::of(dst);
    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (p, q) in src.iter().zip(dst) {
        let p = cs.apply(p);
        let q = cd.apply(q);
        let rows = [
            SVector::<f64, 9>::from_column_slice(&[
                -p.x, -p.y, -1.0, 0.0, 0.0, 0.0, q.x * p.x, q.x * p.y, q.x,
            ]),
            SVector::<f64, 9>::from_column_slice(&[
                0.0, 0.0, 0.0, -p.x, -p.y, -1.0, q.y * p.x, q.y * p.y, q.y,
            ]),
        ];
        for r in &rows {
            ata += r * r.transpose();
        }
    }

    let eigen = ata.symmetric_eigen();
    let smallest = eigen.eigenvalues.imin();
    let h: Vec<f64> = eigen.eigenvectors.column(smallest).iter().copied().collect();
    let hn = Matrix3::from_row_slice(&h);
    uncondition(hn, &cs, &cd)
}

/// Compute H such that `dst ~ H * src` from exactly 4 correspondences.
///
/// Point order must be consistent between `src` and `dst`.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    let cs = Conditioning::of(src);
    let cd = Conditioning::of(dst);

    // Unknowns h11..h32 with h33 fixed to 1.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (p, q)) in src.iter().zip(dst).enumerate() {
        let p = cs.apply(p);
        let q = cd.apply(q);
        a.set_row(
            2 * k,
            &SMatrix::<f64, 1, 8>::from_row_slice(&[p.x, p.y, 1.0, 0.0, 0.0, 0.0, -q.x * p.x, -q.x * p.y]),
        );
        a.set_row(
            2 * k + 1,
            &SMatrix::<f64, 1, 8>::from_row_slice(&[0.0, 0.0, 0.0, p.x, p.y, 1.0, -q.y * p.x, -q.y * p.y]),
        );
        b[2 * k] = q.x;
        b[2 * k + 1] = q.y;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    uncondition(hn, &cs, &cd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = tol);
        assert_abs_diff_eq!(a.y, b.y, epsilon = tol);
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(320.0, 200.0),
        ] {
            assert_close(inv.apply(h.apply(p)), p, 1e-9);
        }
    }

    #[test]
    fn four_point_specialization_recovers_h() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(180.0, 0.0),
            Point2::new(180.0, 130.0),
            Point2::new(0.0, 130.0),
        ];
        let dst = src.map(|p| ground_truth.apply(p));

        let recovered = homography_from_4pt(&src, &dst).expect("recoverable");
        for p in [Point2::new(60.0, 40.0), Point2::new(150.0, 120.0)] {
            assert_close(recovered.apply(p), ground_truth.apply(p), 1e-6);
        }
    }

    #[test]
    fn dlt_handles_lattice_to_normalized_plane() {
        // Lattice indices to normalized camera coordinates: tiny output scale.
        let ground_truth = Homography::new(Matrix3::new(
            0.05, 0.004, -0.2, //
            -0.003, 0.048, -0.15, //
            0.01, 0.02, 1.0,
        ));

        let src: Vec<Point2<f64>> = (-1..=1)
            .flat_map(|j| (-1..=1).map(move |i| Point2::new(i as f64, j as f64)))
            .collect();
        let dst: Vec<Point2<f64>> = src.iter().map(|&p| ground_truth.apply(p)).collect();

        let estimated = estimate_homography(&src, &dst).expect("estimate");
        for p in [Point2::new(3.0, -2.0), Point2::new(5.0, 4.0)] {
            assert_close(estimated.apply(p), ground_truth.apply(p), 1e-9);
        }
    }

    #[test]
    fn degenerate_inputs_fail() {
        let src = [Point2::new(0.0, 0.0); 4];
        let dst = [Point2::new(1.0, 1.0); 3];
        assert!(estimate_homography(&src, &dst).is_none());
        assert!(estimate_homography(&src[..3], &dst).is_none());
    }
}
