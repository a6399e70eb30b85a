use calib_dots::board::synthetic::{centered_pose, render_board_view, RenderOptions};
use calib_dots::detect::{self, DetectError};
use calib_dots::{
    create_metric_calibration_board, paint_calibration_board_observation, BoardDetectError,
    MetricCalibrationBoard, MetricSize, PinholeCamera, Polarity, WorkerPool,
};
use image::{DynamicImage, Rgb};
use nalgebra::UnitQuaternion;

fn board() -> MetricCalibrationBoard {
    create_metric_calibration_board(
        12,
        8,
        11,
        MetricSize::millimeters(200.0),
        MetricSize::millimeters(140.0),
    )
    .expect("board")
}

fn camera() -> PinholeCamera {
    PinholeCamera::from_horizontal_fov(640, 480, 60f64.to_radians()).expect("camera")
}

fn rendered(board: &MetricCalibrationBoard, camera: &PinholeCamera) -> image::GrayImage {
    let pose = centered_pose(
        board,
        0.38,
        UnitQuaternion::from_euler_angles(-0.2, 0.25, -0.3),
    );
    let img = render_board_view(board, camera, &pose, &RenderOptions::default());
    detect::to_image_gray(&img).expect("gray image")
}

#[test]
fn detects_and_paints_a_rendered_board() {
    let board = board();
    let camera = camera();
    let img = rendered(&board, &camera);

    let pool = WorkerPool::new(2).expect("pool");
    let obs = detect::detect_calibration_board(&img, &camera, &board, 1.0, Some(&pool))
        .expect("detection");
    assert_eq!(obs.len(), board.point_count());

    let mut overlay = DynamicImage::ImageLuma8(img.clone()).to_rgb8();
    paint_calibration_board_observation(&mut overlay, &obs);
    for c in &obs.correspondences {
        let (x, y) = (c.image_point.x.round() as u32, c.image_point.y.round() as u32);
        let expected = match c.polarity {
            Polarity::Dark => Rgb([0, 255, 0]),
            Polarity::Bright => Rgb([0, 0, 255]),
        };
        assert_eq!(*overlay.get_pixel(x, y), expected);
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("overlay.png");
    overlay.save(&path).expect("save overlay");
    let reloaded = image::open(&path).expect("open overlay").to_rgb8();
    assert_eq!(reloaded, overlay);
}

#[test]
fn raw_buffers_go_through_the_same_path() {
    let board = board();
    let camera = camera();
    let img = rendered(&board, &camera);

    let from_image = detect::detect_calibration_board(&img, &camera, &board, 1.0, None)
        .expect("from image");
    let (w, h) = (img.width() as usize, img.height() as usize);
    let from_raw = detect::detect_calibration_board_from_gray_u8(
        w,
        h,
        w,
        img.as_raw(),
        &camera,
        &board,
        1.0,
        None,
    )
    .expect("from raw");
    assert_eq!(from_image, from_raw);

    // Rows padded to a 16-byte multiple with garbage.
    let stride = w.div_ceil(16) * 16 + 16;
    let mut padded = vec![0xA5u8; stride * h];
    for (dst, src) in padded.chunks_mut(stride).zip(img.as_raw().chunks(w)) {
        dst[..w].copy_from_slice(src);
    }
    let from_padded = detect::detect_calibration_board_from_gray_u8(
        w, h, stride, &padded, &camera, &board, 1.0, None,
    )
    .expect("from padded");
    assert_eq!(from_image, from_padded);

    let err = detect::detect_calibration_board_from_gray_u8(
        w,
        h,
        w,
        &img.as_raw()[1..],
        &camera,
        &board,
        1.0,
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        DetectError::Image(calib_dots::core::ImageError::BufferTooShort { .. })
    ));
}

#[test]
fn camera_mismatch_is_reported_as_a_board_error() {
    let board = board();
    let img = rendered(&board, &camera());
    let other = PinholeCamera::from_horizontal_fov(1280, 960, 1.0).expect("camera");

    let err = detect::detect_calibration_board(&img, &other, &board, 1.0, None).unwrap_err();
    assert!(matches!(
        err,
        DetectError::BoardDetect(BoardDetectError::ImageSizeMismatch { .. })
    ));
}
