//! JSON configuration and report helpers for board detection.

use crate::{
    BoardDetectError, BoardDetectorParams, BoardError, BoardSpec, CalibrationBoardDetector,
    CalibrationBoardObservation, MetricCalibrationBoard,
};
use calib_dots_core::PinholeCamera;
use calib_dots_points::Point;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Detect(#[from] BoardDetectError),
}

const DEFAULT_REPORT_PATH: &str = "board_detect_report.json";

fn default_max_projection_error() -> f64 {
    3.5
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json_pretty<T: Serialize>(value: &T, path: &Path) -> Result<(), IoError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Configuration of one board detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDetectConfig {
    pub image_path: String,
    pub board: BoardSpec,
    pub camera: PinholeCamera,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Maximal reprojection error of an accepted correspondence, in pixels.
    #[serde(default = "default_max_projection_error")]
    pub max_projection_error: f64,
    #[serde(default)]
    pub params: Option<BoardDetectorParams>,
}

impl BoardDetectConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        read_json(path.as_ref())
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json_pretty(self, path.as_ref())
    }

    /// Where the report goes; `board_detect_report.json` unless configured.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.output_path.as_deref().unwrap_or(DEFAULT_REPORT_PATH))
    }

    /// Image to detect in, as given in the config.
    pub fn image_path(&self) -> &Path {
        Path::new(&self.image_path)
    }

    pub fn build_board(&self) -> Result<MetricCalibrationBoard, ConfigError> {
        Ok(MetricCalibrationBoard::new(self.board)?)
    }

    /// Detector parameters, falling back to defaults when the config has none.
    pub fn build_params(&self) -> BoardDetectorParams {
        self.params.clone().unwrap_or_default()
    }

    pub fn build_detector(&self) -> Result<CalibrationBoardDetector, ConfigError> {
        Ok(CalibrationBoardDetector::new(self.build_params())?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDetectReport {
    pub image_path: String,
    pub config_path: String,
    pub board: BoardSpec,
    pub num_points: usize,
    pub points: Vec<Point>,
    #[serde(default)]
    pub observation: Option<CalibrationBoardObservation>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BoardDetectReport {
    /// Report for `config` with the points found in its image and no result yet.
    pub fn new(config: &BoardDetectConfig, config_path: &Path, points: Vec<Point>) -> Self {
        Self {
            image_path: config.image_path.clone(),
            config_path: config_path.display().to_string(),
            board: config.board,
            num_points: points.len(),
            points,
            observation: None,
            error: None,
        }
    }

    pub fn set_detection(&mut self, observation: CalibrationBoardObservation) {
        self.error.take();
        self.observation.replace(observation);
    }

    /// Record a detection error; any earlier observation is discarded.
    pub fn set_error(&mut self, err: BoardDetectError) {
        self.observation.take();
        self.error.replace(err.to_string());
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        read_json(path.as_ref())
    }

    /// Pretty JSON; parent directories are created when missing.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        write_json_pretty(self, path)
    }
}
