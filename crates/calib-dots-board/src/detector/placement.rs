//! Mapping a grown lattice onto board rows and columns.

use super::lattice::Lattice;
use crate::MetricCalibrationBoard;
use calib_dots_core::{GridAlignment, GRID_TRANSFORMS_D4};
use calib_dots_points::{PointSet, Polarity};
use std::collections::BTreeMap;

/// A lattice-to-board alignment with the number of lattice cells it contradicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Placement {
    /// Maps lattice `(a, b)` to board `[row, column]`.
    pub alignment: GridAlignment,
    /// Cells mapped off the board or onto a dot of the other polarity.
    pub mismatches: usize,
}

impl Placement {
    /// Lattice cells that land on the board with the expected polarity, keyed
    /// by board `(row, column)`.
    pub fn consistent_cells(
        &self,
        lattice: &Lattice,
        points: &PointSet,
        board: &MetricCalibrationBoard,
    ) -> BTreeMap<(u32, u32), usize> {
        lattice
            .cells()
            .filter_map(|((a, b), index)| {
                let [row, column] = self.alignment.map(a, b);
                let (row, column) = (u32::try_from(row).ok()?, u32::try_from(column).ok()?);
                (board.polarity(row, column) == Some(points.points()[index].polarity))
                    .then_some(((row, column), index))
            })
            .collect()
    }
}

/// Every D4 transform and translation that overlaps the board and
/// contradicts at most `max_mismatches` lattice cells, fewest first.
///
/// Ties are ordered by transform and translation so that the ranking does
/// not depend on iteration details.
pub(super) fn rank_placements(
    lattice: &Lattice,
    points: &PointSet,
    board: &MetricCalibrationBoard,
    max_mismatches: usize,
) -> Vec<Placement> {
    let rows = board.rows() as i32;
    let columns = board.columns() as i32;
    let mut placements = Vec::new();

    for transform in GRID_TRANSFORMS_D4 {
        let mapped: Vec<([i32; 2], Polarity)> = lattice
            .cells()
            .map(|((a, b), index)| (transform.apply(a, b), points.points()[index].polarity))
            .collect();
        let Some(min_row) = mapped.iter().map(|(rc, _)| rc[0]).min() else {
            return placements;
        };
        let min_column = mapped.iter().map(|(rc, _)| rc[1]).min().unwrap_or(0);
        let max_row = mapped.iter().map(|(rc, _)| rc[0]).max().unwrap_or(0);
        let max_column = mapped.iter().map(|(rc, _)| rc[1]).max().unwrap_or(0);

        for row_shift in -max_row..=(rows - 1 - min_row) {
            for column_shift in -max_column..=(columns - 1 - min_column) {
                let mut mismatches = 0usize;
                for &([row, column], polarity) in &mapped {
                    let (row, column) = (row + row_shift, column + column_shift);
                    let expected = (row >= 0 && column >= 0)
                        .then(|| board.polarity(row as u32, column as u32))
                        .flatten();
                    if expected != Some(polarity) {
                        mismatches += 1;
                        if mismatches > max_mismatches {
                            break;
                        }
                    }
                }
                if mismatches <= max_mismatches {
                    placements.push(Placement {
                        alignment: GridAlignment {
                            transform,
                            translation: [row_shift, column_shift],
                        },
                        mismatches,
                    });
                }
            }
        }
    }
    // Stable: equal counts keep transform-then-translation order.
    placements.sort_by_key(|p| p.mismatches);
    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_metric_calibration_board, MetricSize};
    use calib_dots_points::Point;
    use nalgebra::Point2;

    fn board() -> MetricCalibrationBoard {
        create_metric_calibration_board(
            11,
            8,
            11,
            MetricSize::millimeters(200.0),
            MetricSize::millimeters(140.0),
        )
        .expect("board")
    }

    /// Lattice seeing board cells `cells` through transform `transform_index`.
    ///
    /// Cells off the board read as dark; cells in `flipped` read inverted.
    fn observed(
        board: &MetricCalibrationBoard,
        transform_index: usize,
        cells: impl IntoIterator<Item = (i32, i32)>,
        flipped: &[(i32, i32)],
    ) -> (Lattice, PointSet) {
        let inverse = GRID_TRANSFORMS_D4[transform_index]
            .inverse()
            .expect("unimodular");
        let mut points = Vec::new();
        let mut lattice = Vec::new();
        for (row, column) in cells {
            let [a, b] = inverse.apply(row, column);
            let mut polarity = (row >= 0 && column >= 0)
                .then(|| board.polarity(row as u32, column as u32))
                .flatten()
                .unwrap_or(Polarity::Dark);
            if flipped.contains(&(row, column)) {
                polarity = polarity.opposite();
            }
            lattice.push(((a, b), points.len()));
            points.push(Point::new(Point2::new(0.0, 0.0), polarity, 0, 1.0));
        }
        (lattice.into_iter().collect(), PointSet::new(points))
    }

    fn block(rows: std::ops::Range<i32>, columns: std::ops::Range<i32>) -> Vec<(i32, i32)> {
        rows.flat_map(|r| columns.clone().map(move |c| (r, c))).collect()
    }

    #[test]
    fn the_true_placement_is_the_only_exact_one() {
        let board = board();
        assert!(board.signature_window().is_some_and(|k| k <= 4));

        for t in 0..8 {
            let (lattice, points) = observed(&board, t, block(1..5, 2..7), &[]);
            let ranked = rank_placements(&lattice, &points, &board, 0);
            assert_eq!(ranked.len(), 1, "transform {t}");
            let alignment = ranked[0].alignment;
            assert_eq!(alignment.transform, GRID_TRANSFORMS_D4[t]);
            for ((a, b), _) in lattice.cells() {
                let [row, column] = alignment.map(a, b);
                assert!((1..5).contains(&row) && (2..7).contains(&column));
            }
        }
    }

    #[test]
    fn a_cell_beyond_the_edge_costs_one_mismatch() {
        let board = board();
        let mut cells = block(0..8, 0..10);
        cells.push((3, -1));
        for t in [0, 2, 5] {
            let (lattice, points) = observed(&board, t, cells.iter().copied(), &[]);
            let ranked = rank_placements(&lattice, &points, &board, 20);
            let best = ranked[0];
            assert_eq!(best.mismatches, 1, "transform {t}");
            assert_eq!(best.alignment.transform, GRID_TRANSFORMS_D4[t]);
            assert!(ranked.get(1).map_or(true, |p| p.mismatches >= 4));

            let kept = best.consistent_cells(&lattice, &points, &board);
            assert_eq!(kept.len(), 80);
            assert!(kept.keys().all(|&(row, column)| row < 8 && column < 10));
        }
    }

    #[test]
    fn misread_polarities_are_left_out() {
        let board = board();
        let flipped = [(0, 0), (4, 7)];
        let (lattice, points) = observed(&board, 3, block(0..8, 0..11), &flipped);
        let ranked = rank_placements(&lattice, &points, &board, 10);
        let best = ranked[0];
        assert_eq!(best.mismatches, 2);
        assert_eq!(best.alignment.transform, GRID_TRANSFORMS_D4[3]);

        let kept = best.consistent_cells(&lattice, &points, &board);
        assert_eq!(kept.len(), 86);
        assert!(!kept.contains_key(&(0, 0)) && !kept.contains_key(&(4, 7)));
        assert!(kept.contains_key(&(7, 10)));
    }
}
