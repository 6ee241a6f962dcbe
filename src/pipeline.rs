//! Per-frame driver: buffer, detect, filter, describe, match.

use image::GrayImage;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use rerun::RecordingStream;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::{
    DatasetConfig, DescriptorType, DetectorType, MatcherType, SelectorType, TrackingConfig,
};
use crate::descriptor::{DescriptorExtractor, create_extractor};
use crate::detector::{FeatureDetector, create_detector};
use crate::error::{Result, TrackingError};
use crate::filter::{Roi, limit_keypoints, restrict_to_region};
use crate::frame::{FrameBuffer, FrameRecord};
use crate::io::load_gray_image;
use crate::matcher::{MatchSettings, match_descriptors};
use crate::types::Descriptors;
use crate::visualization::log_frame_pair;

/// What one call to [`Pipeline::process_frame`] produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub index: usize,
    /// Keypoints straight out of the detector.
    pub keypoint_count: usize,
    /// Keypoints inside the vehicle region, when region restriction is on.
    pub roi_keypoint_count: Option<usize>,
    pub limited: bool,
    /// Keypoints left after filtering; one descriptor row each.
    pub described_count: usize,
    /// Matches against the previous frame, absent for the first frame.
    pub matched_count: Option<usize>,
    pub detection_ms: f64,
    pub description_ms: f64,
    pub matching_ms: Option<f64>,
}

impl FrameReport {
    /// The stable console lines other tools parse, in pipeline order.
    pub fn console_lines(&self, config: &TrackingConfig) -> Vec<String> {
        let mut lines = vec![format!(
            "{} detection with n={} keypoints in {:.3} ms",
            config.detector, self.keypoint_count, self.detection_ms
        )];
        if let Some(n) = self.roi_keypoint_count {
            lines.push(format!("Number of Keypoints on Preceding Vehicle: {}", n));
        }
        lines.push(format!(
            "{} descriptor extraction in {:.3} ms",
            config.descriptor, self.description_ms
        ));
        if let Some(n) = self.matched_count {
            lines.push(format!("Number of Matched Keypoints: {}", n));
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub detector: DetectorType,
    pub descriptor: DescriptorType,
    pub matcher: MatcherType,
    pub selector: SelectorType,
    pub frames: Vec<FrameReport>,
}

impl RunSummary {
    pub fn total_matches(&self) -> usize {
        self.frames.iter().filter_map(|f| f.matched_count).sum()
    }

    /// Mean detection plus description time per frame.
    pub fn mean_extraction_ms(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .frames
            .iter()
            .map(|f| f.detection_ms + f.description_ms)
            .sum();
        total / self.frames.len() as f64
    }
}

/// Holds the selected algorithms and the frame history for one run.
pub struct Pipeline {
    config: TrackingConfig,
    roi: Roi,
    max_keypoints: usize,
    detector: Box<dyn FeatureDetector>,
    extractor: Box<dyn DescriptorExtractor>,
    buffer: FrameBuffer,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn descriptors_of(frame: &FrameRecord) -> Result<&Descriptors> {
    frame
        .descriptors
        .as_ref()
        .ok_or(TrackingError::DescriptorCountMismatch {
            keypoints: frame.keypoints.len(),
            descriptors: 0,
        })
}

impl Pipeline {
    pub fn new(config: TrackingConfig, dataset: &DatasetConfig) -> Pipeline {
        Pipeline {
            config,
            roi: dataset.vehicle_roi,
            max_keypoints: dataset.max_keypoints,
            detector: create_detector(config.detector),
            extractor: create_extractor(config.descriptor),
            buffer: FrameBuffer::new(dataset.buffer_size),
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Pushes `image` into the history and runs every stage on it.
    ///
    /// Keypoints, descriptors and matches end up on the newest buffer record.
    pub fn process_frame(&mut self, index: usize, image: GrayImage) -> Result<FrameReport> {
        let quiet = self.config.quiet;
        self.config.metric.check_family(self.extractor.family())?;
        self.buffer.push(FrameRecord::new(index, image));
        if !quiet {
            log::info!("frame {}: loaded into buffer ({} held)", index, self.buffer.len());
        }

        let frame = self.buffer.latest_mut()?;
        let start = Instant::now();
        let mut keypoints = self.detector.detect(&frame.image);
        let detection_ms = elapsed_ms(start);
        let keypoint_count = keypoints.len();

        let mut roi_keypoint_count = None;
        if self.config.focus_on_vehicle {
            keypoints = restrict_to_region(keypoints, &self.roi);
            roi_keypoint_count = Some(keypoints.len());
        }
        let limited = self.config.limit_keypoints;
        if limited {
            keypoints = limit_keypoints(
                keypoints,
                self.max_keypoints,
                self.config.detector.keypoints_pre_ranked(),
            );
            if !quiet {
                log::info!("frame {}: keypoints limited to {}", index, keypoints.len());
            }
        }

        let start = Instant::now();
        let descriptors = self.extractor.compute(&frame.image, &keypoints);
        let description_ms = elapsed_ms(start);
        if descriptors.len() != keypoints.len() {
            return Err(TrackingError::DescriptorCountMismatch {
                keypoints: keypoints.len(),
                descriptors: descriptors.len(),
            });
        }
        let described_count = keypoints.len();
        frame.keypoints = keypoints;
        frame.descriptors = Some(descriptors);
        if !quiet {
            log::info!(
                "frame {}: {} keypoints detected, {} described",
                index,
                keypoint_count,
                described_count
            );
        }

        let mut matched_count = None;
        let mut matching_ms = None;
        if self.buffer.len() >= 2 {
            let previous = self.buffer.previous()?;
            let current = self.buffer.latest()?;
            let start = Instant::now();
            let matches = match_descriptors(
                &previous.keypoints,
                &current.keypoints,
                descriptors_of(previous)?,
                descriptors_of(current)?,
                &MatchSettings::from(&self.config),
            )?;
            matching_ms = Some(elapsed_ms(start));
            matched_count = Some(matches.len());
            if !quiet {
                log::info!(
                    "frame {}: {} matches against frame {}",
                    index,
                    matches.len(),
                    previous.index
                );
            }
            self.buffer.latest_mut()?.matches = matches;
        }

        Ok(FrameReport {
            index,
            keypoint_count,
            roi_keypoint_count,
            limited,
            described_count,
            matched_count,
            detection_ms,
            description_ms,
            matching_ms,
        })
    }
}

fn run_frames(
    config: &TrackingConfig,
    dataset: &DatasetConfig,
    frames: impl Iterator<Item = Result<(usize, GrayImage)>>,
    recording: Option<&RecordingStream>,
    mut on_frame: impl FnMut(&FrameReport),
) -> Result<RunSummary> {
    let mut pipeline = Pipeline::new(*config, dataset);
    let mut reports = Vec::new();
    for frame in frames {
        let (index, image) = frame?;
        let report = pipeline.process_frame(index, image)?;
        on_frame(&report);
        if let Some(recording) = recording {
            if report.matched_count.is_some() {
                log_frame_pair(recording, pipeline.buffer())?;
            }
        }
        reports.push(report);
    }
    Ok(RunSummary {
        detector: config.detector,
        descriptor: config.descriptor,
        matcher: config.matcher,
        selector: config.selector,
        frames: reports,
    })
}

/// Loads the configured frame range from disk and processes it in order.
///
/// Any failure aborts the whole run; frames are loaded lazily, so a missing file is
/// only reported once the run reaches it.
pub fn run_sequence(
    config: &TrackingConfig,
    dataset: &DatasetConfig,
    recording: Option<&RecordingStream>,
) -> Result<RunSummary> {
    run_sequence_with(config, dataset, recording, |_| {})
}

/// Like [`run_sequence`], calling `on_frame` with each report as soon as its frame is done.
///
/// Reports of frames processed before a failure have already been handed out when the
/// error is returned.
pub fn run_sequence_with(
    config: &TrackingConfig,
    dataset: &DatasetConfig,
    recording: Option<&RecordingStream>,
    on_frame: impl FnMut(&FrameReport),
) -> Result<RunSummary> {
    let frames = dataset
        .frame_indices()
        .map(|index| load_gray_image(&dataset.image_path(index)).map(|img| (index, img)));
    run_frames(config, dataset, frames, recording, on_frame)
}

/// Outcome of one detector / descriptor combination in a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub detector: DetectorType,
    pub descriptor: DescriptorType,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

/// Runs every detector x descriptor combination with ratio-test selection.
///
/// Frames are loaded once up front. Combinations run in parallel, each with its own
/// pipeline; a failing combination is recorded instead of stopping the sweep.
pub fn run_sweep(base: &TrackingConfig, dataset: &DatasetConfig) -> Result<Vec<SweepEntry>> {
    let images = dataset
        .frame_indices()
        .map(|index| load_gray_image(&dataset.image_path(index)).map(|img| (index, img)))
        .collect::<Result<Vec<_>>>()?;

    let combinations: Vec<(DetectorType, DescriptorType)> = DetectorType::ALL
        .iter()
        .flat_map(|&d| DescriptorType::ALL.iter().map(move |&e| (d, e)))
        .collect();
    log::info!(
        "sweeping {} combinations over {} frames",
        combinations.len(),
        images.len()
    );

    let entries = combinations
        .par_iter()
        .progress_count(combinations.len() as u64)
        .map(|&(detector, descriptor)| {
            let mut config = base.with_detector(detector).with_descriptor(descriptor);
            config.selector = SelectorType::KNearestRatio;
            config.quiet = true;
            let frames = images.iter().map(|(i, img)| Ok((*i, img.clone())));
            match run_frames(&config, dataset, frames, None, |_| {}) {
                Ok(summary) => SweepEntry {
                    detector,
                    descriptor,
                    summary: Some(summary),
                    error: None,
                },
                Err(e) => {
                    log::warn!("{} + {} failed: {}", detector, descriptor, e);
                    SweepEntry {
                        detector,
                        descriptor,
                        summary: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();
    Ok(entries)
}

/// One row per combination: names, ROI keypoints per frame, matches per frame, mean time.
pub fn sweep_table(entries: &[SweepEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match &entry.summary {
            Some(summary) => {
                let roi: Vec<String> = summary
                    .frames
                    .iter()
                    .map(|f| f.roi_keypoint_count.unwrap_or(f.keypoint_count).to_string())
                    .collect();
                let matched: Vec<String> = summary
                    .frames
                    .iter()
                    .filter_map(|f| f.matched_count.map(|n| n.to_string()))
                    .collect();
                format!(
                    "{}+{} | keypoints {} | matches {} | {:.3} ms",
                    entry.detector,
                    entry.descriptor,
                    roi.join(" "),
                    matched.join(" "),
                    summary.mean_extraction_ms()
                )
            }
            None => format!(
                "{}+{} | failed: {}",
                entry.detector,
                entry.descriptor,
                entry.error.as_deref().unwrap_or("unknown error")
            ),
        })
        .collect()
}
