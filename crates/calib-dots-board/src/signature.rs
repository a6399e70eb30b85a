//! Polarity layout that makes every board position identifiable.
//!
//! Each grid point is dark or bright. The layout is drawn from a SplitMix64
//! sequence seeded by the board id, and the first attempt whose `k x k`
//! windows produce pairwise distinct codes under all eight D4 transforms is
//! kept. With such a layout, any visible `k x k` block pins down the board
//! position, the rotation and the mirroring of the observed lattice.

use calib_dots_core::GRID_TRANSFORMS_D4;
use calib_dots_points::Polarity;
use std::collections::HashSet;

const MIN_WINDOW: usize = 3;
const MAX_WINDOW: usize = 6;
const ATTEMPTS_PER_WINDOW: u32 = 256;

struct SplitMix64(u64);

impl SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

/// Row-major polarity layout for one `(board_id, attempt)` pair.
pub(crate) fn polarity_layout(board_id: u32, rows: usize, columns: usize, attempt: u32) -> Vec<Polarity> {
    let mut rng = SplitMix64(((board_id as u64) << 32) | attempt as u64);
    (0..rows * columns)
        .map(|_| Polarity::from_sign(rng.next_u64() >> 63 == 1))
        .collect()
}

/// Codes of the `size x size` block at `(row, column)` under all D4 transforms.
///
/// Bit `i * size + j` of a code is set when cell `(i, j)` of the transformed
/// block is dark.
pub(crate) fn window_codes(
    layout: &[Polarity],
    columns: usize,
    row: usize,
    column: usize,
    size: usize,
) -> [u64; 8] {
    let mut codes = [0u64; 8];
    let extent = size as i32 - 1;
    for (code, t) in codes.iter_mut().zip(GRID_TRANSFORMS_D4.iter()) {
        for i in 0..size {
            for j in 0..size {
                // D4 acts on doubled coordinates centered on the block.
                let [u, v] = t.apply(2 * i as i32 - extent, 2 * j as i32 - extent);
                let si = ((u + extent) / 2) as usize;
                let sj = ((v + extent) / 2) as usize;
                if layout[(row + si) * columns + column + sj].sign() {
                    *code |= 1u64 << (i * size + j);
                }
            }
        }
    }
    codes
}

/// Code of an observed 3x3 block, indexed `[a][b]`.
pub(crate) fn block_code(block: &[[Polarity; 3]; 3]) -> u64 {
    let mut code = 0u64;
    for (i, row) in block.iter().enumerate() {
        for (j, p) in row.iter().enumerate() {
            if p.sign() {
                code |= 1u64 << (i * 3 + j);
            }
        }
    }
    code
}

/// `true` if all `size x size` windows stay distinct under D4.
fn windows_are_unique(layout: &[Polarity], rows: usize, columns: usize, size: usize) -> bool {
    let mut seen = HashSet::with_capacity((rows - size + 1) * (columns - size + 1) * 8);
    for row in 0..=rows - size {
        for column in 0..=columns - size {
            for code in window_codes(layout, columns, row, column, size) {
                if !seen.insert(code) {
                    return false;
                }
            }
        }
    }
    true
}

/// Board polarity layout with its identifying window size.
#[derive(Clone, Debug)]
pub(crate) struct Signature {
    pub polarities: Vec<Polarity>,
    pub window: Option<usize>,
    /// Every 3x3 code occurring on the board, under all D4 transforms.
    pub block_codes: HashSet<u64>,
}

pub(crate) fn build_signature(board_id: u32, rows: usize, columns: usize) -> Signature {
    let max_window = rows.min(columns).min(MAX_WINDOW);
    let mut found = None;
    'search: for size in MIN_WINDOW..=max_window {
        for attempt in 0..ATTEMPTS_PER_WINDOW {
            let layout = polarity_layout(board_id, rows, columns, attempt);
            if windows_are_unique(&layout, rows, columns, size) {
                found = Some((layout, size));
                break 'search;
            }
        }
    }

    let (polarities, window) = match found {
        Some((layout, size)) => (layout, Some(size)),
        None => {
            log::warn!(
                "no identifying polarity window for a {rows}x{columns} board, placements may be ambiguous"
            );
            (polarity_layout(board_id, rows, columns, 0), None)
        }
    };

    let mut block_codes = HashSet::new();
    if rows >= 3 && columns >= 3 {
        for row in 0..=rows - 3 {
            for column in 0..=columns - 3 {
                block_codes.extend(window_codes(&polarities, columns, row, column, 3));
            }
        }
    }

    Signature {
        polarities,
        window,
        block_codes,
    }
}
