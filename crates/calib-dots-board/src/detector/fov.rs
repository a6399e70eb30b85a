//! Horizontal field-of-view search for cameras with unknown intrinsics.

use super::{BoardDetectError, CalibrationBoardDetector, CalibrationBoardObservation};
use crate::MetricCalibrationBoard;
use calib_dots_core::{execute_bands, PinholeCamera, WorkerPool};
use calib_dots_points::Point;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Evenly spaced horizontal fields of view to try, in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FovSweep {
    pub min_fov_x: f64,
    pub max_fov_x: f64,
    /// Candidates per sweep, both bounds included.
    pub steps: usize,
    /// Follow-up sweeps between the neighbors of the best candidate.
    pub refinements: usize,
}

impl Default for FovSweep {
    fn default() -> Self {
        Self {
            min_fov_x: 20f64.to_radians(),
            max_fov_x: 140f64.to_radians(),
            steps: 25,
            refinements: 2,
        }
    }
}

impl FovSweep {
    fn validate(&self) -> Result<(), BoardDetectError> {
        let valid = self.min_fov_x > f64::EPSILON
            && self.min_fov_x < self.max_fov_x
            && self.max_fov_x < std::f64::consts::PI
            && self.steps >= 2;
        if valid {
            Ok(())
        } else {
            Err(BoardDetectError::InvalidFovSweep {
                min_fov_x: self.min_fov_x,
                max_fov_x: self.max_fov_x,
                steps: self.steps,
            })
        }
    }

    fn candidate(&self, lo: f64, hi: f64, n: usize) -> f64 {
        lo + (hi - lo) * n as f64 / (self.steps - 1) as f64
    }
}

/// Field of view that explains a board view best, with the detection it produced.
#[derive(Clone, Debug, PartialEq)]
pub struct FovEstimate {
    /// Horizontal field of view in radians.
    pub fov_x: f64,
    pub camera: PinholeCamera,
    pub observation: CalibrationBoardObservation,
}

/// More correspondences win, then the smaller RMS error.
fn better(a: &CalibrationBoardObservation, b: &CalibrationBoardObservation) -> bool {
    a.len() > b.len() || (a.len() == b.len() && a.rms_error < b.rms_error)
}

impl CalibrationBoardDetector {
    /// Find the pinhole field of view under which `points` show `board` best.
    ///
    /// Every candidate of `sweep` gets an undistorted camera with the given
    /// image size and a full detection gated by `maximal_projection_error`.
    /// A wrong focal length leaves residuals of several pixels, so the gate
    /// should be loose here (10-15 px) and tightened once the camera is known.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, points, board, pool),
            fields(board_id = board.board_id(), points = points.len())
        )
    )]
    pub fn estimate_horizontal_fov(
        &self,
        (width, height): (usize, usize),
        points: &[Point],
        board: &MetricCalibrationBoard,
        sweep: &FovSweep,
        maximal_projection_error: f64,
        pool: Option<&WorkerPool>,
    ) -> Result<FovEstimate, BoardDetectError> {
        sweep.validate()?;
        // Surface bad image sizes before the sweep swallows per-candidate errors.
        PinholeCamera::from_horizontal_fov(width, height, sweep.min_fov_x)?;

        let (mut lo, mut hi) = (sweep.min_fov_x, sweep.max_fov_x);
        let mut best: Option<FovEstimate> = None;
        for round in 0..=sweep.refinements {
            let round_best = execute_bands(pool, sweep.steps, |range| {
                range
                    .filter_map(|n| {
                        let fov_x = sweep.candidate(lo, hi, n);
                        let camera = PinholeCamera::from_horizontal_fov(width, height, fov_x).ok()?;
                        match self.detect_calibration_board_from_points(
                            &camera,
                            points,
                            board,
                            maximal_projection_error,
                        ) {
                            Ok(observation) => Some(FovEstimate {
                                fov_x,
                                camera,
                                observation,
                            }),
                            Err(err) => {
                                log::trace!("fov {:.2} deg: {err}", fov_x.to_degrees());
                                None
                            }
                        }
                    })
                    .collect()
            })
            .into_iter()
            .reduce(|a, b| if better(&b.observation, &a.observation) { b } else { a });

            let Some(round_best) = round_best else {
                break;
            };
            log::debug!(
                "fov round {round}: {:.3} deg, {} correspondences, rms {:.4} px",
                round_best.fov_x.to_degrees(),
                round_best.observation.len(),
                round_best.observation.rms_error
            );
            let step = (hi - lo) / (sweep.steps - 1) as f64;
            lo = (round_best.fov_x - step).max(sweep.min_fov_x);
            hi = (round_best.fov_x + step).min(sweep.max_fov_x);
            if best
                .as_ref()
                .map_or(true, |b| better(&round_best.observation, &b.observation))
            {
                best = Some(round_best);
            }
        }

        best.ok_or(BoardDetectError::NoFieldOfView { steps: sweep.steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweeps_are_validated() {
        let bad = [
            FovSweep {
                min_fov_x: 0.0,
                ..FovSweep::default()
            },
            FovSweep {
                min_fov_x: 1.0,
                max_fov_x: 1.0,
                ..FovSweep::default()
            },
            FovSweep {
                max_fov_x: std::f64::consts::PI,
                ..FovSweep::default()
            },
            FovSweep {
                steps: 1,
                ..FovSweep::default()
            },
        ];
        for sweep in bad {
            assert!(matches!(
                sweep.validate(),
                Err(BoardDetectError::InvalidFovSweep { .. })
            ));
        }
        assert!(FovSweep::default().validate().is_ok());
    }

    #[test]
    fn candidates_include_both_bounds() {
        let sweep = FovSweep {
            steps: 5,
            ..FovSweep::default()
        };
        assert_eq!(sweep.candidate(1.0, 2.0, 0), 1.0);
        assert_eq!(sweep.candidate(1.0, 2.0, 2), 1.5);
        assert_eq!(sweep.candidate(1.0, 2.0, 4), 2.0);
    }
}
