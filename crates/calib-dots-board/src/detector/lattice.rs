//! Local lattice seeding and breadth-first growth.
//!
//! Lattice coordinates `(a, b)` are local to one detection attempt: the seed
//! point sits at `(0, 0)`, its nearest neighbor at `(1, 0)` and the nearest
//! non-collinear neighbor at `(0, 1)`. Mapping them onto board rows and
//! columns happens later, in the placement step.

use super::BoardDetectorParams;
use crate::MetricCalibrationBoard;
use calib_dots_core::{estimate_homography, Camera, Homography};
use calib_dots_points::{PointSet, Polarity};
use nalgebra::{Point2, Point3};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Inputs shared by seeding, growth and placement.
pub(super) struct MatchContext<'a, C: Camera + ?Sized> {
    pub camera: &'a C,
    pub points: &'a PointSet,
    /// Undistorted `z = 1` coordinates of every point, `None` where unprojection failed.
    pub normalized: &'a [Option<Point2<f64>>],
    pub board: &'a MetricCalibrationBoard,
    pub params: &'a BoardDetectorParams,
}

/// Lattice cell to point index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct Lattice {
    cells: BTreeMap<(i32, i32), usize>,
}

impl Lattice {
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = ((i32, i32), usize)> + '_ {
        self.cells.iter().map(|(&cell, &index)| (cell, index))
    }

    /// `true` if adding `cell` keeps the lattice extent within a `rows x columns` board.
    fn fits_with(&self, cell: (i32, i32), rows: i32, columns: i32) -> bool {
        let (mut min_a, mut max_a, mut min_b, mut max_b) = (cell.0, cell.0, cell.1, cell.1);
        for &(a, b) in self.cells.keys() {
            min_a = min_a.min(a);
            max_a = max_a.max(a);
            min_b = min_b.min(b);
            max_b = max_b.max(b);
        }
        let extent_a = max_a - min_a + 1;
        let extent_b = max_b - min_b + 1;
        (extent_a <= rows && extent_b <= columns) || (extent_a <= columns && extent_b <= rows)
    }
}

impl FromIterator<((i32, i32), usize)> for Lattice {
    fn from_iter<I: IntoIterator<Item = ((i32, i32), usize)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Try to build a 3x3 lattice around point `start`.
pub(super) fn seed_lattice<C: Camera + ?Sized>(
    ctx: &MatchContext<'_, C>,
    start: usize,
) -> Option<Lattice> {
    let params = ctx.params;
    let points = ctx.points.points();
    ctx.normalized[start]?;
    let origin = points[start].observation;

    let neighbors: Vec<usize> = ctx
        .points
        .nearest_n(origin, params.neighbor_count + 1)
        .into_iter()
        .map(|(index, _)| index)
        .filter(|&index| index != start && ctx.normalized[index].is_some())
        .collect();
    let &first = neighbors.first()?;
    let u = points[first].observation - origin;
    let v = neighbors[1..]
        .iter()
        .map(|&index| points[index].observation - origin)
        .find(|d| (u.x * d.y - u.y * d.x).abs() > 0.5 * u.norm() * d.norm())?;

    let spacing = u.norm().min(v.norm());
    if spacing <= f64::EPSILON {
        return None;
    }
    let tolerance = params.seed_tolerance * spacing;

    let mut cells = BTreeMap::new();
    let mut taken = HashSet::new();
    let mut block = [[Polarity::Dark; 3]; 3];
    for a in -1i32..=1 {
        for b in -1i32..=1 {
            let predicted = origin + u * a as f64 + v * b as f64;
            let index = ctx
                .points
                .unique_match(predicted, tolerance, params.uniqueness_ratio)?;
            if ctx.normalized[index].is_none() || !taken.insert(index) {
                return None;
            }
            block[(a + 1) as usize][(b + 1) as usize] = points[index].polarity;
            cells.insert((a, b), index);
        }
    }

    ctx.board.window_occurs(&block).then_some(Lattice { cells })
}

fn predict<C: Camera + ?Sized>(
    ctx: &MatchContext<'_, C>,
    h: &Homography,
    (a, b): (i32, i32),
) -> Option<Point2<f64>> {
    let n = h.try_apply(Point2::new(a as f64, b as f64))?;
    ctx.camera.project(&Point3::new(n.x, n.y, 1.0))
}

/// Smallest predicted pixel distance from `cell` to its 4-neighbors.
fn local_spacing<C: Camera + ?Sized>(
    ctx: &MatchContext<'_, C>,
    h: &Homography,
    (a, b): (i32, i32),
    pixel: Point2<f64>,
) -> Option<f64> {
    [(a + 1, b), (a - 1, b), (a, b + 1), (a, b - 1)]
        .into_iter()
        .filter_map(|n| predict(ctx, h, n))
        .map(|p| (p - pixel).norm())
        .min_by(f64::total_cmp)
}

/// Grow `lattice` breadth-first until no 4-neighbor finds a point.
///
/// Each round fits one homography from lattice to normalized coordinates and
/// evaluates the whole frontier against it, so the result does not depend
/// on the order in which cells are visited.
pub(super) fn grow_lattice<C: Camera + ?Sized>(ctx: &MatchContext<'_, C>, lattice: &mut Lattice) {
    let params = ctx.params;
    let rows = ctx.board.rows() as i32;
    let columns = ctx.board.columns() as i32;

    loop {
        let (src, dst): (Vec<Point2<f64>>, Vec<Point2<f64>>) = lattice
            .cells()
            .filter_map(|((a, b), index)| {
                ctx.normalized[index].map(|n| (Point2::new(a as f64, b as f64), n))
            })
            .unzip();
        let Some(h) = estimate_homography(&src, &dst) else {
            break;
        };

        let claimed: HashSet<usize> = lattice.cells.values().copied().collect();
        let frontier: BTreeSet<(i32, i32)> = lattice
            .cells
            .keys()
            .flat_map(|&(a, b)| [(a + 1, b), (a - 1, b), (a, b + 1), (a, b - 1)])
            .filter(|cell| !lattice.cells.contains_key(cell))
            .filter(|&cell| lattice.fits_with(cell, rows, columns))
            .collect();

        let mut taken = HashSet::new();
        let mut accepted = Vec::new();
        for cell in frontier {
            let Some(pixel) = predict(ctx, &h, cell) else {
                continue;
            };
            let Some(spacing) = local_spacing(ctx, &h, cell, pixel) else {
                continue;
            };
            let Some(index) =
                ctx.points
                    .unique_match(pixel, params.growth_tolerance * spacing, params.uniqueness_ratio)
            else {
                continue;
            };
            if ctx.normalized[index].is_none() || claimed.contains(&index) || !taken.insert(index) {
                continue;
            }
            accepted.push((cell, index));
        }

        let mut inserted = 0usize;
        for (cell, index) in accepted {
            // Cells of one round may jointly exceed the board extent.
            if lattice.fits_with(cell, rows, columns) {
                lattice.cells.insert(cell, index);
                inserted += 1;
            }
        }
        if inserted == 0 {
            break;
        }
    }
}
