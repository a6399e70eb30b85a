//! Ring-shaped sampling patterns.
//!
//! A point is a center pixel that differs consistently from a ring of
//! surrounding pixels. The ring leaves out a disk around the center so that
//! the dot itself, whatever its size up to the inner radius, is never sampled.

use crate::{PointDetectorParams, Polarity};
use calib_dots_core::GrayImageView;
use nalgebra::Point2;

/// One ring pattern with offsets relative to the center pixel.
#[derive(Clone, Debug)]
pub struct RingPattern {
    radius: u32,
    inner_radius: u32,
    offsets: Vec<[i32; 2]>,
}

impl RingPattern {
    /// Offsets `(dx, dy)` with `inner^2 < dx^2 + dy^2 <= radius^2`.
    pub fn new(radius: u32, inner_radius: u32) -> Self {
        let r = radius as i32;
        let r2 = r * r;
        let ir2 = (inner_radius * inner_radius) as i32;
        let mut offsets = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let d2 = dx * dx + dy * dy;
                if d2 <= r2 && d2 > ir2 {
                    offsets.push([dx, dy]);
                }
            }
        }
        Self {
            radius,
            inner_radius,
            offsets,
        }
    }

    #[inline]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    #[inline]
    pub fn inner_radius(&self) -> u32 {
        self.inner_radius
    }

    #[inline]
    pub fn offsets(&self) -> &[[i32; 2]] {
        &self.offsets
    }

    /// `true` if the whole pattern fits around `(x, y)`.
    #[inline]
    pub fn fits(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        let r = self.radius as usize;
        x >= r && y >= r && x + r < width && y + r < height
    }

    /// Linear buffer offsets for an image with the given row stride.
    pub(crate) fn linear_offsets(&self, stride: usize) -> Vec<isize> {
        self.offsets
            .iter()
            .map(|&[dx, dy]| dy as isize * stride as isize + dx as isize)
            .collect()
    }
}

/// Build one pattern per outer radius in `min_radius..=max_radius`.
pub fn build_patterns(params: &PointDetectorParams) -> Vec<RingPattern> {
    (params.min_radius..=params.max_radius)
        .map(|r| RingPattern::new(r, r.saturating_sub(params.ring_width)))
        .filter(|p| p.offsets.len() >= 8)
        .collect()
}

/// Response of one ring pattern at one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RingResponse {
    pub strength: f32,
    pub ring_mean: f32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Thresholds {
    min_difference: i32,
    max_variance: f32,
    dark_max_center: i32,
    dark_min_ring: i32,
    bright_min_center: i32,
    bright_max_ring: i32,
}

impl Thresholds {
    pub fn new(params: &PointDetectorParams) -> Self {
        Self {
            min_difference: params.min_difference as i32,
            max_variance: params.max_deviation * params.max_deviation,
            dark_max_center: params.dark_max_center as i32,
            dark_min_ring: params.dark_min_ring as i32,
            bright_min_center: params.bright_min_center as i32,
            bright_max_ring: params.bright_max_ring as i32,
        }
    }
}

/// Evaluate a ring around the pixel at linear index `center`.
///
/// The caller guarantees that the pattern fits inside the image.
pub(crate) fn ring_response(
    data: &[u8],
    center: usize,
    offsets: &[isize],
    polarity: Polarity,
    t: &Thresholds,
) -> Option<RingResponse> {
    let c = data[center] as i32;
    // Ring pixels must all lie inside [lo, hi].
    let (lo, hi) = match polarity {
        Polarity::Dark => {
            if c > t.dark_max_center {
                return None;
            }
            (t.dark_min_ring.max(c + t.min_difference), 255)
        }
        Polarity::Bright => {
            if c < t.bright_min_center {
                return None;
            }
            (0, t.bright_max_ring.min(c - t.min_difference))
        }
    };
    if lo > hi {
        return None;
    }

    let mut sum = 0i64;
    let mut sum_sq = 0i64;
    for &off in offsets {
        let v = data[(center as isize + off) as usize] as i32;
        if v < lo || v > hi {
            return None;
        }
        sum += v as i64;
        sum_sq += (v * v) as i64;
    }

    let n = offsets.len() as f64;
    let mean = sum as f64 / n;
    let variance = (sum_sq as f64 / n - mean * mean).max(0.0);
    if variance > t.max_variance as f64 {
        return None;
    }
    // sum over ring of (v - c)^2, divided by n
    let cf = c as f64;
    let mean_sq_diff = sum_sq as f64 / n - 2.0 * cf * mean + cf * cf;
    Some(RingResponse {
        strength: mean_sq_diff as f32,
        ring_mean: mean as f32,
    })
}

/// Contrast-weighted centroid of the inner disk of `pattern` around `(x, y)`.
///
/// Returns `None` when the disk carries no contrast or the centroid leaves it.
pub(crate) fn refine_centroid(
    image: &GrayImageView<'_>,
    x: usize,
    y: usize,
    pattern: &RingPattern,
    polarity: Polarity,
    ring_mean: f32,
) -> Option<Point2<f64>> {
    let r = pattern.inner_radius() as i64;
    if r == 0 {
        return None;
    }
    let r2 = r * r;
    let mut cx = x as i64;
    let mut cy = y as i64;
    let mut estimate = None;

    for _ in 0..2 {
        if cx < r || cy < r || cx + r >= image.width as i64 || cy + r >= image.height as i64 {
            break;
        }
        let mut sw = 0.0f64;
        let mut sx = 0.0f64;
        let mut sy = 0.0f64;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let v = image.get((cx + dx) as usize, (cy + dy) as usize) as f32;
                let w = match polarity {
                    Polarity::Dark => ring_mean - v,
                    Polarity::Bright => v - ring_mean,
                };
                if w > 0.0 {
                    let w = w as f64;
                    sw += w;
                    sx += w * dx as f64;
                    sy += w * dy as f64;
                }
            }
        }
        if sw <= f64::EPSILON {
            break;
        }
        let ox = sx / sw;
        let oy = sy / sw;
        if ox * ox + oy * oy > r2 as f64 {
            break;
        }
        let p = Point2::new(cx as f64 + ox, cy as f64 + oy);
        estimate = Some(p);
        let (nx, ny) = (p.x.round() as i64, p.y.round() as i64);
        if nx == cx && ny == cy {
            break;
        }
        cx = nx;
        cy = ny;
    }
    estimate
}
