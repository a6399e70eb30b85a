//! Symmetries of the square lattice and lattice-to-board alignments.

use serde::{Deserialize, Serialize};

/// Linear map on integer lattice coordinates, `(i, j) -> (a*i + b*j, c*i + d*j)`.
///
/// Dot boards are only ever placed through the eight square symmetries in
/// [`GRID_TRANSFORMS_D4`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridTransform {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
}

impl GridTransform {
    pub const IDENTITY: GridTransform = GridTransform::new(1, 0, 0, 1);

    pub const fn new(a: i32, b: i32, c: i32, d: i32) -> Self {
        Self { a, b, c, d }
    }

    #[inline]
    pub fn apply(&self, i: i32, j: i32) -> [i32; 2] {
        [self.a * i + self.b * j, self.c * i + self.d * j]
    }

    #[inline]
    pub fn determinant(&self) -> i32 {
        self.a * self.d - self.b * self.c
    }

    /// `true` for reflections, i.e. a lattice observed from the back of the board.
    #[inline]
    pub fn is_mirroring(&self) -> bool {
        self.determinant() < 0
    }

    /// Inverse map; only unimodular transforms (`det = ±1`) stay on the lattice.
    pub fn inverse(&self) -> Option<GridTransform> {
        match self.determinant() {
            det @ (1 | -1) => Some(GridTransform::new(
                self.d * det,
                -self.b * det,
                -self.c * det,
                self.a * det,
            )),
            _ => None,
        }
    }
}

/// Placement of local lattice coordinates on the board grid:
/// `[row, column] = transform(i, j) + translation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridAlignment {
    pub transform: GridTransform,
    pub translation: [i32; 2],
}

impl GridAlignment {
    #[inline]
    pub fn map(&self, i: i32, j: i32) -> [i32; 2] {
        let [x, y] = self.transform.apply(i, j);
        [x + self.translation[0], y + self.translation[1]]
    }

    pub fn inverse(&self) -> Option<GridAlignment> {
        let transform = self.transform.inverse()?;
        let [tx, ty] = self.translation;
        Some(GridAlignment {
            transform,
            translation: transform.apply(-tx, -ty),
        })
    }
}

/// The dihedral group of the square: four rotations by quarter turns, then
/// the four reflections.
pub const GRID_TRANSFORMS_D4: [GridTransform; 8] = [
    GridTransform::new(1, 0, 0, 1),
    GridTransform::new(0, 1, -1, 0),
    GridTransform::new(-1, 0, 0, -1),
    GridTransform::new(0, -1, 1, 0),
    GridTransform::new(-1, 0, 0, 1),
    GridTransform::new(1, 0, 0, -1),
    GridTransform::new(0, 1, 1, 0),
    GridTransform::new(0, -1, -1, 0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d4_inverses_stay_in_d4() {
        for t in GRID_TRANSFORMS_D4 {
            let inv = t.inverse().expect("unimodular");
            assert!(GRID_TRANSFORMS_D4.contains(&inv));
            for (i, j) in [(1, 0), (0, 1), (3, -2)] {
                let [x, y] = t.apply(i, j);
                assert_eq!(inv.apply(x, y), [i, j]);
            }
        }
    }

    #[test]
    fn alignment_inverse_round_trips() {
        for transform in GRID_TRANSFORMS_D4 {
            let alignment = GridAlignment {
                transform,
                translation: [7, -3],
            };
            let inv = alignment.inverse().expect("unimodular");
            for (i, j) in [(0, 0), (4, 9), (-2, 5)] {
                let [x, y] = alignment.map(i, j);
                assert_eq!(inv.map(x, y), [i, j]);
            }
        }
    }

    #[test]
    fn half_of_d4_mirrors() {
        let mirrored = GRID_TRANSFORMS_D4
            .iter()
            .filter(|t| t.is_mirroring())
            .count();
        assert_eq!(mirrored, 4);
        assert!(!GridTransform::IDENTITY.is_mirroring());
        assert!(GridTransform::new(2, 0, 0, 1).inverse().is_none());
    }
}
