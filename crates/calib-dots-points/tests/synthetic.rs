use calib_dots_core::{GrayImage, GrayImageView, WorkerPool};
use calib_dots_points::synthetic::paint_dot;
use calib_dots_points::{Point, PointDetector, PointDetectorParams, PointSet, Polarity};
use nalgebra::Point2;

const SPACING: f64 = 31.7;

/// A 9x13 grid of dots; every fourth point is a white dot on a black cell.
fn render_grid() -> (GrayImage, Vec<(Point2<f64>, Polarity)>) {
    let mut img = GrayImage::new(480, 360, 215);
    let mut truth = Vec::new();
    for row in 0..9 {
        for col in 0..13 {
            let center = Point2::new(40.3 + col as f64 * SPACING, 38.6 + row as f64 * SPACING);
            let polarity = if (row * 13 + col) % 4 == 1 {
                Polarity::Bright
            } else {
                Polarity::Dark
            };
            if polarity == Polarity::Bright {
                let half = SPACING / 2.0;
                for y in (center.y - half).round() as usize..(center.y + half).round() as usize {
                    for x in (center.x - half).round() as usize..(center.x + half).round() as usize
                    {
                        img.set(x, y, 30);
                    }
                }
                paint_dot(&mut img, center, 4.8, 225);
            } else {
                paint_dot(&mut img, center, 4.8, 30);
            }
            truth.push((center, polarity));
        }
    }
    (img, truth)
}

fn assert_same_points(a: &[Point], b: &[Point]) {
    assert_eq!(a.len(), b.len());
    for (p, q) in a.iter().zip(b) {
        assert_eq!(p.polarity, q.polarity);
        assert_eq!(p.radius, q.radius);
        assert!((p.observation - q.observation).norm() < 1e-12);
    }
}

#[test]
fn every_dot_is_found_with_subpixel_accuracy() {
    let (img, truth) = render_grid();
    let points = PointDetector::default()
        .detect_points(&img.view(), None)
        .expect("detect");

    assert_eq!(points.len(), truth.len());
    let set = PointSet::new(points);
    for (center, polarity) in &truth {
        let index = set
            .closest_point(*center, Some(*polarity), 1.0)
            .unwrap_or_else(|| panic!("missing {polarity:?} dot at {center:?}"));
        let p = set.points()[index];
        assert!(
            (p.observation - center).norm() < 0.1,
            "{:?} vs {center:?}",
            p.observation
        );
    }
}

#[test]
fn points_come_out_in_scan_order() {
    let (img, _) = render_grid();
    let points = PointDetector::default()
        .detect_points(&img.view(), None)
        .expect("detect");
    // Dots of one grid row share their y within a pixel.
    assert!(points
        .windows(2)
        .all(|w| w[0].observation.y < w[1].observation.y + 2.0));
}

#[test]
fn results_do_not_depend_on_thread_count() {
    let (img, _) = render_grid();
    let detector = PointDetector::default();
    let serial = detector.detect_points(&img.view(), None).expect("detect");

    for threads in [1, 2, 4] {
        let pool = WorkerPool::new(threads).expect("pool");
        let parallel = detector
            .detect_points(&img.view(), Some(&pool))
            .expect("detect");
        assert_same_points(&serial, &parallel);
    }
}

#[test]
fn row_padding_is_ignored() {
    let (img, _) = render_grid();
    let detector = PointDetector::default();
    let packed = detector.detect_points(&img.view(), None).expect("detect");

    // Padding bytes that would look like dots if they were read.
    let padded = img.to_padded(13, 0);
    let view = GrayImageView::new(img.width, img.height, img.width + 13, &padded).expect("view");
    let strided = detector.detect_points(&view, None).expect("detect");
    assert_same_points(&packed, &strided);
}

#[test]
fn stricter_contrast_never_adds_points() {
    let mut img = GrayImage::new(200, 100, 200);
    paint_dot(&mut img, Point2::new(50.2, 50.4), 4.0, 20);
    paint_dot(&mut img, Point2::new(140.7, 49.1), 4.0, 170);

    let loose = PointDetector::default()
        .detect_points(&img.view(), None)
        .expect("detect");
    let strict = PointDetector::new(PointDetectorParams {
        min_difference: 60,
        ..PointDetectorParams::default()
    })
    .expect("params")
    .detect_points(&img.view(), None)
    .expect("detect");

    assert_eq!(loose.len(), 2);
    assert_eq!(strict.len(), 1);
    assert!((strict[0].observation.x - 50.2).abs() < 0.1);
}

#[test]
fn malformed_views_are_rejected() {
    let data = vec![0u8; 10];
    let view = GrayImageView {
        width: 8,
        height: 8,
        stride: 8,
        data: &data,
    };
    assert!(PointDetector::default().detect_points(&view, None).is_err());
}
