use crate::pattern::{build_patterns, refine_centroid, ring_response, RingPattern, Thresholds};
use crate::{Point, PointDetectorParams, Polarity};
use calib_dots_core::{execute_bands, GrayImageView, ImageError, WorkerPool};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors returned by [`PointDetector`].
#[derive(thiserror::Error, Debug)]
pub enum PointDetectError {
    #[error("invalid point detector parameters: {0}")]
    InvalidParams(&'static str),
    #[error(transparent)]
    InvalidImage(#[from] ImageError),
    #[error("image {width}x{height} is smaller than the largest point pattern ({diameter} px)")]
    ImageTooSmall {
        width: usize,
        height: usize,
        diameter: usize,
    },
}

const POLARITIES: [Polarity; 2] = [Polarity::Dark, Polarity::Bright];

#[inline]
fn slot(polarity: Polarity) -> usize {
    match polarity {
        Polarity::Dark => 0,
        Polarity::Bright => 1,
    }
}

/// Per-pixel response for both polarities; `strength == 0` means no response.
#[derive(Clone, Copy, Debug, Default)]
struct Cell {
    strength: [f32; 2],
    ring_mean: [f32; 2],
    pattern: [u8; 2],
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    x: usize,
    y: usize,
    polarity: Polarity,
    strength: f32,
    ring_mean: f32,
    pattern: u8,
}

/// Detector for dark and bright dot-like points.
#[derive(Clone, Debug)]
pub struct PointDetector {
    params: PointDetectorParams,
    patterns: Vec<RingPattern>,
}

impl Default for PointDetector {
    fn default() -> Self {
        let params = PointDetectorParams::default();
        Self {
            patterns: build_patterns(&params),
            params,
        }
    }
}

impl PointDetector {
    pub fn new(params: PointDetectorParams) -> Result<Self, PointDetectError> {
        params.validate().map_err(PointDetectError::InvalidParams)?;
        let patterns = build_patterns(&params);
        if patterns.is_empty() {
            return Err(PointDetectError::InvalidParams(
                "no ring pattern has at least 8 samples",
            ));
        }
        Ok(Self { params, patterns })
    }

    #[inline]
    pub fn params(&self) -> &PointDetectorParams {
        &self.params
    }

    /// Ring patterns sorted by increasing radius.
    #[inline]
    pub fn patterns(&self) -> &[RingPattern] {
        &self.patterns
    }

    /// Detect all points in `image`.
    ///
    /// An image without points yields `Ok` with an empty vector. Points are
    /// returned in scan order of their integer detection pixel, and the
    /// result does not depend on `pool` or its thread count.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image, pool),
            fields(width = image.width, height = image.height)
        )
    )]
    pub fn detect_points(
        &self,
        image: &GrayImageView<'_>,
        pool: Option<&WorkerPool>,
    ) -> Result<Vec<Point>, PointDetectError> {
        image.validate()?;
        let diameter = self
            .patterns
            .last()
            .map(|p| 2 * p.radius() as usize + 1)
            .unwrap_or(1);
        if image.width < diameter || image.height < diameter {
            return Err(PointDetectError::ImageTooSmall {
                width: image.width,
                height: image.height,
                diameter,
            });
        }

        let cells = self.response_map(image, pool);
        let candidates = self.suppress_non_maximum(image, &cells, pool);
        let refined = execute_bands(pool, candidates.len(), |range| {
            candidates[range]
                .iter()
                .map(|c| self.refine(image, c))
                .collect()
        });
        let points = self.filter_points(refined);

        log::debug!(
            "point detector: {} candidates, {} dark, {} bright",
            candidates.len(),
            points.iter().filter(|p| p.polarity == Polarity::Dark).count(),
            points
                .iter()
                .filter(|p| p.polarity == Polarity::Bright)
                .count()
        );
        Ok(points)
    }

    fn response_map(&self, image: &GrayImageView<'_>, pool: Option<&WorkerPool>) -> Vec<Cell> {
        let thresholds = Thresholds::new(&self.params);
        let offsets: Vec<Vec<isize>> = self
            .patterns
            .iter()
            .map(|p| p.linear_offsets(image.stride))
            .collect();

        execute_bands(pool, image.height, |rows| {
            let mut out = Vec::with_capacity(rows.len() * image.width);
            for y in rows {
                for x in 0..image.width {
                    let mut cell = Cell::default();
                    let center = y * image.stride + x;
                    for polarity in POLARITIES {
                        let s = slot(polarity);
                        for (idx, pattern) in self.patterns.iter().enumerate() {
                            if !pattern.fits(x, y, image.width, image.height) {
                                continue;
                            }
                            let response = ring_response(
                                image.data,
                                center,
                                &offsets[idx],
                                polarity,
                                &thresholds,
                            );
                            if let Some(r) = response.filter(|r| r.strength > 0.0) {
                                cell.strength[s] = r.strength;
                                cell.ring_mean[s] = r.ring_mean;
                                cell.pattern[s] = idx as u8;
                                break;
                            }
                        }
                    }
                    out.push(cell);
                }
            }
            out
        })
    }

    /// Keep local maxima; equal neighbors earlier in scan order win.
    fn suppress_non_maximum(
        &self,
        image: &GrayImageView<'_>,
        cells: &[Cell],
        pool: Option<&WorkerPool>,
    ) -> Vec<Candidate> {
        let (w, h) = (image.width, image.height);
        let n = self.params.nms_radius as usize;

        execute_bands(pool, h, |rows| {
            let mut out = Vec::new();
            for y in rows {
                for x in 0..w {
                    let index = y * w + x;
                    let cell = &cells[index];
                    'polarity: for polarity in POLARITIES {
                        let s = slot(polarity);
                        let strength = cell.strength[s];
                        if strength <= 0.0 {
                            continue;
                        }
                        for qy in y.saturating_sub(n)..(y + n + 1).min(h) {
                            for qx in x.saturating_sub(n)..(x + n + 1).min(w) {
                                let q = qy * w + qx;
                                if q == index {
                                    continue;
                                }
                                let other = cells[q].strength[s];
                                if other > strength || (other == strength && q < index) {
                                    continue 'polarity;
                                }
                            }
                        }
                        out.push(Candidate {
                            x,
                            y,
                            polarity,
                            strength,
                            ring_mean: cell.ring_mean[s],
                            pattern: cell.pattern[s],
                        });
                    }
                }
            }
            out
        })
    }

    fn refine(&self, image: &GrayImageView<'_>, c: &Candidate) -> Point {
        let pattern = &self.patterns[c.pattern as usize];
        let observation =
            refine_centroid(image, c.x, c.y, pattern, c.polarity, c.ring_mean)
                .unwrap_or_else(|| Point2::new(c.x as f64, c.y as f64));
        Point::new(observation, c.polarity, pattern.radius(), c.strength)
    }

    /// Drop bright points next to dark ones, then merge duplicates.
    fn filter_points(&self, refined: Vec<Point>) -> Vec<Point> {
        let suppression = self.params.bright_suppression_distance;
        let mut dark = Neighborhood::new();
        for (i, p) in refined.iter().enumerate() {
            if p.polarity == Polarity::Dark {
                dark.insert(p.observation, i);
            }
        }
        let mut keep: Vec<bool> = refined
            .iter()
            .map(|p| {
                p.polarity == Polarity::Dark
                    || suppression <= 0.0
                    || !dark.any_within(p.observation, suppression, &refined)
            })
            .collect();

        let duplicate = self.params.duplicate_distance;
        if duplicate > 0.0 {
            let mut order: Vec<usize> = (0..refined.len()).filter(|&i| keep[i]).collect();
            order.sort_by(|&a, &b| {
                refined[b]
                    .strength
                    .total_cmp(&refined[a].strength)
                    .then(a.cmp(&b))
            });
            let mut accepted = Neighborhood::new();
            for i in order {
                if accepted.any_within(refined[i].observation, duplicate, &refined) {
                    keep[i] = false;
                } else {
                    accepted.insert(refined[i].observation, i);
                }
            }
        }

        refined
            .into_iter()
            .zip(keep)
            .filter_map(|(p, k)| k.then_some(p))
            .collect()
    }
}

/// Accepted point positions for fixed-radius checks.
struct Neighborhood {
    tree: KdTree<f64, 2>,
}

impl Neighborhood {
    fn new() -> Self {
        Self {
            tree: KdTree::new(),
        }
    }

    fn insert(&mut self, p: Point2<f64>, index: usize) {
        self.tree.add(&[p.x, p.y], index as u64);
    }

    /// `true` if an inserted point lies within `distance` of `p`, boundary included.
    fn any_within(&self, p: Point2<f64>, distance: f64, points: &[Point]) -> bool {
        let d2 = distance * distance;
        self.tree
            .within::<SquaredEuclidean>(&[p.x, p.y], d2 + d2.max(1.0) * 1e-9)
            .iter()
            .any(|nn| (points[nn.item as usize].observation - p).norm_squared() <= d2)
    }
}
