//! Debug overlays on RGB images.
//!
//! Everything is clipped to the image; shapes partially outside the frame
//! are drawn where they overlap it.

use crate::board::CalibrationBoardObservation;
use crate::points::{Point, Polarity};
use image::{Rgb, RgbImage};
use nalgebra::Point2;

const DARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BRIGHT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 200, 0]);
const CROSS_ARM: i32 = 4;

fn polarity_color(polarity: Polarity) -> Rgb<u8> {
    match polarity {
        Polarity::Dark => DARK_COLOR,
        Polarity::Bright => BRIGHT_COLOR,
    }
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn to_pixel(p: Point2<f64>) -> Option<(i32, i32)> {
    let (x, y) = (p.x.round(), p.y.round());
    let range = i32::MIN as f64..=i32::MAX as f64;
    (range.contains(&x) && range.contains(&y)).then_some((x as i32, y as i32))
}

fn draw_cross(img: &mut RgbImage, (x, y): (i32, i32), color: Rgb<u8>) {
    for d in -CROSS_ARM..=CROSS_ARM {
        put(img, x + d, y, color);
        put(img, x, y + d, color);
    }
}

/// Bresenham line between two pixels.
fn draw_line(img: &mut RgbImage, (mut x0, mut y0): (i32, i32), (x1, y1): (i32, i32), color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Clip segment `a..b` to the pixel area of `img` (Liang-Barsky).
fn clip_segment(img: &RgbImage, a: Point2<f64>, b: Point2<f64>) -> Option<(Point2<f64>, Point2<f64>)> {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return None;
    }
    let (x_max, y_max) = (img.width() as f64 - 0.5, img.height() as f64 - 0.5);
    let d = b - a;
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (p, q) in [
        (-d.x, a.x + 0.5),
        (d.x, x_max - a.x),
        (-d.y, a.y + 0.5),
        (d.y, y_max - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((a + d * t0, a + d * t1))
}

fn draw_segment(img: &mut RgbImage, a: Point2<f64>, b: Point2<f64>, color: Rgb<u8>) {
    if let Some((a, b)) = clip_segment(img, a, b) {
        if let (Some(from), Some(to)) = (to_pixel(a), to_pixel(b)) {
            draw_line(img, from, to, color);
        }
    }
}

/// Midpoint circle outline.
fn draw_circle(img: &mut RgbImage, (cx, cy): (i32, i32), radius: i32, color: Rgb<u8>) {
    let (mut x, mut y) = (radius, 0);
    let mut err = 1 - radius;
    while x >= y {
        for (px, py) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
            put(img, cx + px, cy + py, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Paint detected points as circles of their pattern radius.
pub fn paint_points(img: &mut RgbImage, points: &[Point]) {
    for p in points {
        if let Some(center) = to_pixel(p.observation) {
            let radius = p.radius.clamp(2, 64) as i32;
            draw_circle(img, center, radius, polarity_color(p.polarity));
        }
    }
}

/// Paint the correspondences of `observation` and the outline of the matched region.
///
/// Each correspondence gets a cross, green for dark and blue for bright
/// points. The outline connects neighboring matched points on the first and
/// last matched row and column.
pub fn paint_calibration_board_observation(
    img: &mut RgbImage,
    observation: &CalibrationBoardObservation,
) {
    let corrs = &observation.correspondences;
    let Some(min_row) = corrs.iter().map(|c| c.row).min() else {
        return;
    };
    let max_row = corrs.iter().map(|c| c.row).max().unwrap_or(min_row);
    let min_col = corrs.iter().map(|c| c.column).min().unwrap_or(0);
    let max_col = corrs.iter().map(|c| c.column).max().unwrap_or(min_col);

    for c in corrs {
        if c.row == min_row || c.row == max_row {
            if let Some(next) = observation.get(c.row, c.column + 1) {
                draw_segment(img, c.image_point, next.image_point, OUTLINE_COLOR);
            }
        }
        if c.column == min_col || c.column == max_col {
            if let Some(next) = observation.get(c.row + 1, c.column) {
                draw_segment(img, c.image_point, next.image_point, OUTLINE_COLOR);
            }
        }
    }

    for c in corrs {
        if let Some(center) = to_pixel(c.image_point) {
            draw_cross(img, center, polarity_color(c.polarity));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Correspondence;
    use nalgebra::{Isometry3, Point3};

    fn correspondence(row: u32, column: u32, x: f64, y: f64, polarity: Polarity) -> Correspondence {
        Correspondence {
            row,
            column,
            object_point: Point3::new(column as f64 * 0.01, row as f64 * 0.01, 0.0),
            image_point: Point2::new(x, y),
            polarity,
            residual: 0.0,
        }
    }

    fn observation(correspondences: Vec<Correspondence>) -> CalibrationBoardObservation {
        CalibrationBoardObservation {
            board_id: 1,
            camera_from_board: Isometry3::identity(),
            correspondences,
            rms_error: 0.0,
            max_error: 0.0,
        }
    }

    #[test]
    fn crosses_and_outline_use_their_colors() {
        let obs = observation(vec![
            correspondence(0, 0, 10.0, 10.0, Polarity::Dark),
            correspondence(0, 1, 30.0, 10.0, Polarity::Bright),
            correspondence(1, 0, 10.0, 30.0, Polarity::Bright),
            correspondence(1, 1, 30.0, 30.0, Polarity::Dark),
        ]);
        let mut img = RgbImage::new(40, 40);
        paint_calibration_board_observation(&mut img, &obs);

        assert_eq!(*img.get_pixel(10, 10), DARK_COLOR);
        assert_eq!(*img.get_pixel(30, 10), BRIGHT_COLOR);
        assert_eq!(*img.get_pixel(30, 34), DARK_COLOR);
        // Outline between the crosses.
        assert_eq!(*img.get_pixel(20, 10), OUTLINE_COLOR);
        assert_eq!(*img.get_pixel(10, 20), OUTLINE_COLOR);
        assert_eq!(*img.get_pixel(30, 20), OUTLINE_COLOR);
        assert_eq!(*img.get_pixel(20, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn drawing_is_clipped_to_the_frame() {
        let obs = observation(vec![
            correspondence(0, 0, -3.0, 2.0, Polarity::Dark),
            correspondence(0, 1, 1e9, 2.0, Polarity::Dark),
            correspondence(0, 2, f64::NAN, 2.0, Polarity::Dark),
        ]);
        let mut img = RgbImage::new(8, 8);
        paint_calibration_board_observation(&mut img, &obs);
        // The left cross arm reaches into the frame.
        assert_eq!(*img.get_pixel(0, 2), DARK_COLOR);

        paint_points(
            &mut img,
            &[Point::new(Point2::new(7.0, 7.0), Polarity::Bright, 3, 1.0)],
        );
        assert_eq!(*img.get_pixel(4, 7), BRIGHT_COLOR);
    }
}
