//! Render a synthetic board view and the config to detect it.
//!
//! Usage: `cargo run --example render_board -- <output_dir>`
//!
//! Log verbosity follows `CALIB_DOTS_LOG`.

use std::{env, fs, path::PathBuf};

use calib_dots::board::synthetic::{centered_pose, render_board_view, RenderOptions};
use calib_dots::board::BoardDetectConfig;
use calib_dots::{create_metric_calibration_board, detect, MetricSize, PinholeCamera};
use nalgebra::UnitQuaternion;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    calib_dots::core::init_from_env()?;

    let out_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: render_board <output_dir>")?;
    fs::create_dir_all(&out_dir)?;

    let board = create_metric_calibration_board(
        7,
        12,
        16,
        MetricSize::millimeters(300.0),
        MetricSize::millimeters(220.0),
    )?;
    let camera = PinholeCamera::from_horizontal_fov(1280, 960, 55f64.to_radians())?;
    let pose = centered_pose(
        &board,
        0.6,
        UnitQuaternion::from_euler_angles(0.3, -0.25, 0.15),
    );

    let rendered = render_board_view(&board, &camera, &pose, &RenderOptions::default());
    let image_path = out_dir.join("board.png");
    detect::to_image_gray(&rendered)?.save(&image_path)?;

    let cfg = BoardDetectConfig {
        image_path: image_path.to_string_lossy().into_owned(),
        board: board.spec(),
        camera,
        output_path: Some(out_dir.join("report.json").to_string_lossy().into_owned()),
        max_projection_error: 2.0,
        params: None,
    };
    cfg.write_json(out_dir.join("config.json"))?;
    log::info!("wrote board.png and config.json to {}", out_dir.display());
    Ok(())
}
