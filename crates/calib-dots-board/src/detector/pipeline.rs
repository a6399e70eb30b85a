use super::lattice::{grow_lattice, seed_lattice, Lattice, MatchContext};
use super::placement::rank_placements;
use super::{BoardDetectError, BoardDetectorParams, CalibrationBoardObservation, Correspondence};
use crate::MetricCalibrationBoard;
use calib_dots_core::{
    estimate_homography, pose_from_homography, refine_pose, reprojection_errors, rms, Camera,
    GrayImageView, WorkerPool,
};
use calib_dots_points::{Point, PointDetector, PointSet};
use nalgebra::{Isometry3, Point2, Point3};
use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Board grid position to point index, ordered by `(row, column)`.
type Matches = BTreeMap<(u32, u32), usize>;

/// Rounds of outlier removal before the final acceptance check.
const SETTLE_ROUNDS: usize = 3;

/// An imperfect placement wins only if every other one contradicts at least
/// `2 * best + PLACEMENT_MARGIN` lattice cells.
const PLACEMENT_MARGIN: usize = 2;

/// Detector for dot-grid calibration boards.
///
/// The detector holds configuration only; every call is independent.
#[derive(Clone, Debug)]
pub struct CalibrationBoardDetector {
    params: BoardDetectorParams,
    point_detector: PointDetector,
}

impl Default for CalibrationBoardDetector {
    fn default() -> Self {
        Self {
            params: BoardDetectorParams::default(),
            point_detector: PointDetector::default(),
        }
    }
}

fn check_projection_error(limit: f64) -> Result<(), BoardDetectError> {
    if limit.is_finite() && limit > 0.0 {
        Ok(())
    } else {
        Err(BoardDetectError::InvalidProjectionError(limit))
    }
}

impl CalibrationBoardDetector {
    pub fn new(params: BoardDetectorParams) -> Result<Self, BoardDetectError> {
        params.validate().map_err(BoardDetectError::InvalidParams)?;
        let point_detector = PointDetector::new(params.points.clone())?;
        Ok(Self {
            params,
            point_detector,
        })
    }

    #[inline]
    pub fn params(&self) -> &BoardDetectorParams {
        &self.params
    }

    #[inline]
    pub fn point_detector(&self) -> &PointDetector {
        &self.point_detector
    }

    /// Detect `board` in `image` as seen by `camera`.
    ///
    /// `image` must have the camera resolution. Every returned correspondence
    /// reprojects within `maximal_projection_error` pixels.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, camera, image, board, pool),
            fields(board_id = board.board_id(), width = image.width, height = image.height)
        )
    )]
    pub fn detect_calibration_board<C: Camera + ?Sized>(
        &self,
        camera: &C,
        image: &GrayImageView<'_>,
        board: &MetricCalibrationBoard,
        maximal_projection_error: f64,
        pool: Option<&WorkerPool>,
    ) -> Result<CalibrationBoardObservation, BoardDetectError> {
        if image.width != camera.width() || image.height != camera.height() {
            return Err(BoardDetectError::ImageSizeMismatch {
                image_width: image.width,
                image_height: image.height,
                camera_width: camera.width(),
                camera_height: camera.height(),
            });
        }
        check_projection_error(maximal_projection_error)?;

        let points = self.point_detector.detect_points(image, pool)?;
        self.detect_calibration_board_from_points(camera, &points, board, maximal_projection_error)
    }

    /// Match already detected `points` against `board`.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, camera, points, board),
            fields(board_id = board.board_id(), points = points.len())
        )
    )]
    pub fn detect_calibration_board_from_points<C: Camera + ?Sized>(
        &self,
        camera: &C,
        points: &[Point],
        board: &MetricCalibrationBoard,
        maximal_projection_error: f64,
    ) -> Result<CalibrationBoardObservation, BoardDetectError> {
        check_projection_error(maximal_projection_error)?;
        let needed = self.params.min_correspondences;
        if points.len() < needed {
            return Err(BoardDetectError::NotEnoughPoints {
                found: points.len(),
                needed,
            });
        }

        let set = PointSet::new(points.to_vec());
        let normalized: Vec<Option<Point2<f64>>> = points
            .iter()
            .map(|p| camera.unproject(&p.observation).map(|r| Point2::new(r.x, r.y)))
            .collect();
        let ctx = MatchContext {
            camera,
            points: &set,
            normalized: &normalized,
            board,
            params: &self.params,
        };

        let lattice = self.best_lattice(&ctx).ok_or(BoardDetectError::NoSeed)?;
        log::debug!("lattice with {} points", lattice.len());

        let mut matches = self.place(&lattice, &set, board)?;

        let pose = self.initial_pose(camera, &set, &normalized, board, &matches)?;
        let pose = self.extend_matches(camera, &set, board, &mut matches, pose, maximal_projection_error)?;
        let pose = self.settle(camera, &set, board, &mut matches, pose, maximal_projection_error)?;

        let observation = build_observation(camera, &set, board, &matches, pose)
            .ok_or(BoardDetectError::PoseEstimationFailed)?;
        if observation.len() < needed {
            return Err(BoardDetectError::NotEnoughCorrespondences {
                found: observation.len(),
                needed,
            });
        }
        if observation.max_error > maximal_projection_error {
            return Err(BoardDetectError::ProjectionErrorTooLarge {
                max_error: observation.max_error,
                limit: maximal_projection_error,
            });
        }

        log::debug!(
            "board {}: {} correspondences, rms {:.4} px, max {:.4} px",
            observation.board_id,
            observation.len(),
            observation.rms_error,
            observation.max_error
        );
        Ok(observation)
    }

    /// Seed from the strongest unused points and keep the largest grown lattice.
    fn best_lattice<C: Camera + ?Sized>(&self, ctx: &MatchContext<'_, C>) -> Option<Lattice> {
        let points = ctx.points.points();
        let mut order: Vec<usize> = (0..points.len())
            .filter(|&i| ctx.normalized[i].is_some())
            .collect();
        order.sort_by(|&a, &b| {
            points[b]
                .strength
                .total_cmp(&points[a].strength)
                .then(a.cmp(&b))
        });

        let mut consumed = vec![false; points.len()];
        let mut best: Option<Lattice> = None;
        for start in order {
            if consumed[start] {
                continue;
            }
            let Some(mut lattice) = seed_lattice(ctx, start) else {
                continue;
            };
            grow_lattice(ctx, &mut lattice);
            for (_, index) in lattice.cells() {
                consumed[index] = true;
            }
            if best.as_ref().map_or(true, |b| lattice.len() > b.len()) {
                best = Some(lattice);
            }
            if best
                .as_ref()
                .is_some_and(|b| b.len() >= ctx.board.point_count())
            {
                break;
            }
        }
        best
    }

    /// Map the lattice onto the board and keep the cells the placement agrees with.
    ///
    /// A placement that explains every cell must be the only one. Otherwise
    /// the placement with the fewest contradicting cells is taken if it stays
    /// within `max_outlier_ratio` and clearly beats the runner-up; stray
    /// points beyond the board edge and misread polarities end up here.
    fn place(
        &self,
        lattice: &Lattice,
        points: &PointSet,
        board: &MetricCalibrationBoard,
    ) -> Result<Matches, BoardDetectError> {
        let limit = (self.params.max_outlier_ratio * lattice.len() as f64).floor() as usize;
        let ranked = rank_placements(lattice, points, board, 2 * limit + PLACEMENT_MARGIN);
        let Some(best) = ranked.first().filter(|p| p.mismatches <= limit) else {
            return Err(BoardDetectError::NoConsistentPlacement {
                lattice: lattice.len(),
            });
        };
        let threshold = match best.mismatches {
            0 => 1,
            m => 2 * m + PLACEMENT_MARGIN,
        };
        let contenders = ranked.iter().take_while(|p| p.mismatches < threshold).count();
        if contenders > 1 {
            return Err(BoardDetectError::AmbiguousPlacement {
                lattice: lattice.len(),
                candidates: contenders,
            });
        }

        if best.alignment.transform.is_mirroring() {
            log::debug!("lattice is mirrored; the board is seen from behind");
        }
        let matches = best.consistent_cells(lattice, points, board);
        if matches.len() < lattice.len() {
            log::debug!(
                "placement {:?} drops {} of {} lattice points",
                best.alignment,
                lattice.len() - matches.len(),
                lattice.len()
            );
        }
        Ok(matches)
    }

    /// Planar homography decomposition refined through the camera model.
    fn initial_pose<C: Camera + ?Sized>(
        &self,
        camera: &C,
        points: &PointSet,
        normalized: &[Option<Point2<f64>>],
        board: &MetricCalibrationBoard,
        matches: &Matches,
    ) -> Result<Isometry3<f64>, BoardDetectError> {
        let mut plane = Vec::with_capacity(matches.len());
        let mut image = Vec::with_capacity(matches.len());
        for (&(row, column), &index) in matches {
            let (Some(object), Some(n)) = (board.object_point(row, column), normalized[index]) else {
                continue;
            };
            plane.push(Point2::new(object.x, object.y));
            image.push(n);
        }
        let h = estimate_homography(&plane, &image).ok_or(BoardDetectError::PoseEstimationFailed)?;
        let pose = pose_from_homography(&h).ok_or(BoardDetectError::PoseEstimationFailed)?;
        self.refine(camera, points, board, matches, &pose)
    }

    fn refine<C: Camera + ?Sized>(
        &self,
        camera: &C,
        points: &PointSet,
        board: &MetricCalibrationBoard,
        matches: &Matches,
        pose: &Isometry3<f64>,
    ) -> Result<Isometry3<f64>, BoardDetectError> {
        let (objects, images) = correspondence_points(points, board, matches);
        refine_pose(camera, pose, &objects, &images, self.params.refinement_iterations)
            .ok_or(BoardDetectError::PoseEstimationFailed)
    }

    /// Project unmatched board points and pick up unique detections next to them.
    fn extend_matches<C: Camera + ?Sized>(
        &self,
        camera: &C,
        points: &PointSet,
        board: &MetricCalibrationBoard,
        matches: &mut Matches,
        mut pose: Isometry3<f64>,
        limit: f64,
    ) -> Result<Isometry3<f64>, BoardDetectError> {
        let limit_sq = limit * limit;
        for pass in 0..self.params.additional_passes {
            let mut used: HashSet<usize> = matches.values().copied().collect();
            let mut added = 0usize;
            for row in 0..board.rows() {
                for column in 0..board.columns() {
                    if matches.contains_key(&(row, column)) {
                        continue;
                    }
                    let (Some(object), Some(expected)) =
                        (board.object_point(row, column), board.polarity(row, column))
                    else {
                        continue;
                    };
                    let Some(pixel) = camera.project_to_image(&pose, &object) else {
                        continue;
                    };
                    if !camera.is_inside(&pixel, 0.0) {
                        continue;
                    }
                    let Some(closest) = points.closest_points(pixel) else {
                        continue;
                    };
                    if closest.sqr_distance > limit_sq
                        || !closest.is_unique(self.params.uniqueness_ratio)
                        || points.points()[closest.index].polarity != expected
                        || !used.insert(closest.index)
                    {
                        continue;
                    }
                    matches.insert((row, column), closest.index);
                    added += 1;
                }
            }

            let removed = drop_outliers(camera, points, board, matches, &pose, limit);
            self.ensure_enough(matches)?;
            if added > 0 || removed > 0 {
                pose = self.refine(camera, points, board, matches, &pose)?;
            }
            log::debug!("pass {pass}: +{added} -{removed} -> {}", matches.len());
            if added == 0 && removed == 0 {
                break;
            }
        }
        Ok(pose)
    }

    /// Drop correspondences above `limit` and re-refine until none are left.
    fn settle<C: Camera + ?Sized>(
        &self,
        camera: &C,
        points: &PointSet,
        board: &MetricCalibrationBoard,
        matches: &mut Matches,
        mut pose: Isometry3<f64>,
        limit: f64,
    ) -> Result<Isometry3<f64>, BoardDetectError> {
        for _ in 0..SETTLE_ROUNDS {
            let removed = drop_outliers(camera, points, board, matches, &pose, limit);
            self.ensure_enough(matches)?;
            if removed == 0 {
                break;
            }
            pose = self.refine(camera, points, board, matches, &pose)?;
        }
        Ok(pose)
    }

    fn ensure_enough(&self, matches: &Matches) -> Result<(), BoardDetectError> {
        let needed = self.params.min_correspondences;
        if matches.len() < needed {
            return Err(BoardDetectError::NotEnoughCorrespondences {
                found: matches.len(),
                needed,
            });
        }
        Ok(())
    }
}

fn correspondence_points(
    points: &PointSet,
    board: &MetricCalibrationBoard,
    matches: &Matches,
) -> (Vec<Point3<f64>>, Vec<Point2<f64>>) {
    matches
        .iter()
        .filter_map(|(&(row, column), &index)| {
            board
                .object_point(row, column)
                .map(|o| (o, points.points()[index].observation))
        })
        .unzip()
}

/// Remove correspondences whose residual exceeds `limit`; returns how many were removed.
fn drop_outliers<C: Camera + ?Sized>(
    camera: &C,
    points: &PointSet,
    board: &MetricCalibrationBoard,
    matches: &mut Matches,
    pose: &Isometry3<f64>,
    limit: f64,
) -> usize {
    let before = matches.len();
    matches.retain(|&(row, column), index| {
        let Some(object) = board.object_point(row, column) else {
            return false;
        };
        camera
            .project_to_image(pose, &object)
            .is_some_and(|p| (p - points.points()[*index].observation).norm() <= limit)
    });
    before - matches.len()
}

fn build_observation<C: Camera + ?Sized>(
    camera: &C,
    points: &PointSet,
    board: &MetricCalibrationBoard,
    matches: &Matches,
    pose: Isometry3<f64>,
) -> Option<CalibrationBoardObservation> {
    let (objects, images) = correspondence_points(points, board, matches);
    let residuals = reprojection_errors(camera, &pose, &objects, &images)?;
    let correspondences: Vec<Correspondence> = matches
        .iter()
        .zip(objects.iter().zip(&images).zip(&residuals))
        .map(|((&(row, column), &index), ((object, image), &residual))| Correspondence {
            row,
            column,
            object_point: *object,
            image_point: *image,
            polarity: points.points()[index].polarity,
            residual,
        })
        .collect();

    Some(CalibrationBoardObservation {
        board_id: board.board_id(),
        camera_from_board: pose,
        rms_error: rms(&residuals),
        max_error: residuals.iter().copied().fold(0.0, f64::max),
        correspondences,
    })
}
