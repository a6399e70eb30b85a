//! Drawing helpers for synthetic test images.

use calib_dots_core::GrayImage;
use nalgebra::Point2;

/// Supersamples per pixel axis when blending a dot edge.
const SUBSAMPLES: u32 = 4;

/// Blend an anti-aliased disk of `dot_radius` pixels centered at `center` into `image`.
///
/// Pixels are covered proportionally to the share of their subsamples inside
/// the disk; anything outside the image is skipped.
pub fn paint_dot(image: &mut GrayImage, center: Point2<f64>, dot_radius: f64, dot_value: u8) {
    let reach = dot_radius.ceil() + 1.0;
    let span = |c: f64| {
        let lo = (c - reach).floor().max(0.0) as usize;
        let hi = (c + reach).ceil().max(0.0) as usize;
        lo..=hi
    };
    let (x_range, y_range) = (span(center.x), span(center.y));
    let r2 = dot_radius * dot_radius;
    let step = 1.0 / SUBSAMPLES as f64;
    let first = -0.5 + 0.5 * step;

    let (width, height) = (image.width, image.height);
    for y in y_range.filter(|&y| y < height) {
        for x in x_range.clone().filter(|&x| x < width) {
            let covered = (0..SUBSAMPLES * SUBSAMPLES)
                .filter(|s| {
                    let qx = x as f64 + first + (s % SUBSAMPLES) as f64 * step - center.x;
                    let qy = y as f64 + first + (s / SUBSAMPLES) as f64 * step - center.y;
                    qx * qx + qy * qy <= r2
                })
                .count();
            if covered == 0 {
                continue;
            }
            let alpha = covered as f64 / (SUBSAMPLES * SUBSAMPLES) as f64;
            let bg = image.get(x, y) as f64;
            let value = bg + alpha * (dot_value as f64 - bg);
            image.set(x, y, value.round().clamp(0.0, 255.0) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_is_blended_and_clipped() {
        let mut img = GrayImage::new(10, 10, 200);
        paint_dot(&mut img, Point2::new(0.0, 0.0), 2.0, 0);
        assert_eq!(img.get(0, 0), 0);
        assert_eq!(img.get(9, 9), 200);
        // Edge pixels are partially covered.
        let edge = img.get(2, 0);
        assert!(edge > 0 && edge < 200, "{edge}");
    }
}
