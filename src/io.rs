use image::{GrayImage, ImageReader};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::DatasetConfig;
use crate::error::{Result, TrackingError};
use crate::pipeline::{RunSummary, SweepEntry};

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &Path, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    std::fs::write(output_path, j)?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Reads any supported image format and converts it to 8-bit grayscale.
pub fn load_gray_image(path: &Path) -> Result<GrayImage> {
    let image_load = |source| TrackingError::ImageLoad {
        path: path.to_path_buf(),
        source,
    };
    let reader = ImageReader::open(path).map_err(|e| image_load(image::ImageError::IoError(e)))?;
    let img = reader.decode().map_err(image_load)?;
    log::trace!("loaded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(img.to_luma8())
}

pub fn save_gray_image(path: &Path, img: &GrayImage) -> Result<()> {
    img.save(path).map_err(|source| TrackingError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// RFC 3339 time of the local clock, UTC when the local offset is unknown.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[derive(serde::Serialize)]
struct RunReport<'a> {
    timestamp: String,
    dataset: &'a DatasetConfig,
    total_matches: usize,
    mean_extraction_ms: f64,
    run: &'a RunSummary,
}

pub fn write_run_report(
    output_path: &Path,
    dataset: &DatasetConfig,
    summary: &RunSummary,
) -> Result<()> {
    let report = RunReport {
        timestamp: timestamp(),
        dataset,
        total_matches: summary.total_matches(),
        mean_extraction_ms: summary.mean_extraction_ms(),
        run: summary,
    };
    object_to_json(output_path, &report)
}

#[derive(serde::Serialize)]
struct SweepReport<'a> {
    timestamp: String,
    dataset: &'a DatasetConfig,
    combinations: usize,
    failed: usize,
    entries: &'a [SweepEntry],
}

pub fn write_sweep_report(
    output_path: &Path,
    dataset: &DatasetConfig,
    entries: &[SweepEntry],
) -> Result<()> {
    let report = SweepReport {
        timestamp: timestamp(),
        dataset,
        combinations: entries.len(),
        failed: entries.iter().filter(|e| e.error.is_some()).count(),
        entries,
    };
    object_to_json(output_path, &report)
}
