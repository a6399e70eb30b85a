//! Run board detection from a JSON config and write a report plus an overlay.
//!
//! Usage: `cargo run --example detect_board -- <config.json> [threads]`
//!
//! `render_board` writes a matching synthetic image and config.

use std::{env, path::PathBuf, time::Instant};

use calib_dots::board::{BoardDetectConfig, BoardDetectReport};
use calib_dots::detect::{self, DetectError};
use calib_dots::{paint_calibration_board_observation, paint_points, WorkerPool};
use image::{DynamicImage, ImageReader};
use log::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .ok_or("usage: detect_board <config.json> [threads]")?;
    let threads = args.next().map(|s| s.parse::<usize>()).transpose()?;

    let cfg = BoardDetectConfig::load_json(&config_path)?;
    let board = cfg.build_board()?;
    let detector = cfg.build_detector()?;
    let pool = threads.map(WorkerPool::new).transpose()?;

    let img = ImageReader::open(cfg.image_path())?.decode()?.to_luma8();
    info!("loaded {} ({}x{})", cfg.image_path, img.width(), img.height());

    let t_points = Instant::now();
    let points = detect::detect_points(&img, detector.point_detector(), pool.as_ref())?;
    info!("{} points in {:?}", points.len(), t_points.elapsed());

    let mut overlay = DynamicImage::ImageLuma8(img.clone()).to_rgb8();
    paint_points(&mut overlay, &points);
    let mut report = BoardDetectReport::new(&cfg, &config_path, points);

    let t_board = Instant::now();
    match detect::detect_calibration_board_with(
        &detector,
        &img,
        &cfg.camera,
        &board,
        cfg.max_projection_error,
        pool.as_ref(),
    ) {
        Ok(observation) => {
            info!(
                "board {}: {} correspondences, rms {:.3} px in {:?}",
                observation.board_id,
                observation.len(),
                observation.rms_error,
                t_board.elapsed()
            );
            let eye = observation.board_from_camera().translation.vector;
            info!(
                "camera at ({:.3}, {:.3}, {:.3}) in board coordinates",
                eye.x, eye.y, eye.z
            );
            paint_calibration_board_observation(&mut overlay, &observation);
            report.set_detection(observation);
        }
        Err(DetectError::BoardDetect(err)) => {
            info!("no board: {err}");
            report.set_error(err);
        }
        Err(err) => return Err(err.into()),
    }

    let output_path = cfg.output_path();
    report.write_json(&output_path)?;
    let overlay_path = output_path.with_extension("png");
    overlay.save(&overlay_path)?;
    info!(
        "wrote {} and {}",
        output_path.display(),
        overlay_path.display()
    );
    Ok(())
}
