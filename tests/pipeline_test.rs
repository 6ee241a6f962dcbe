use feature_tracking::config::{DescriptorType, DetectorType, MatcherType, SelectorType};
use feature_tracking::filter::Roi;
use feature_tracking::io::{object_from_json, write_run_report, write_sweep_report};
use feature_tracking::config::DistanceMetric;
use feature_tracking::pipeline::{
    Pipeline, run_sequence, run_sequence_with, run_sweep, sweep_table,
};
use feature_tracking::synthetic::SyntheticSequence;
use feature_tracking::{DatasetConfig, TrackingConfig, TrackingError};
use tempfile::TempDir;

fn small_sequence(frames: usize) -> SyntheticSequence {
    SyntheticSequence {
        width: 160,
        height: 120,
        frames,
        vehicle: Roi::new(40, 30, 60, 50),
        ..Default::default()
    }
}

fn write_dataset(dir: &TempDir, frames: usize) -> DatasetConfig {
    let mut dataset = small_sequence(frames).write(dir.path()).unwrap();
    dataset.vehicle_roi = Roi::new(30, 20, 90, 70);
    dataset
}

fn quiet(config: TrackingConfig) -> TrackingConfig {
    TrackingConfig {
        quiet: true,
        ..config
    }
}

#[test]
fn identical_frames_match_every_keypoint() {
    let img = small_sequence(1).frame(0);
    let dataset = DatasetConfig::default();
    let configs = [
        TrackingConfig::default(),
        TrackingConfig {
            matcher: MatcherType::Flann,
            ..TrackingConfig::default()
                .with_detector(DetectorType::Fast)
                .with_descriptor(DescriptorType::Sift)
        },
        TrackingConfig::default()
            .with_detector(DetectorType::Orb)
            .with_descriptor(DescriptorType::Orb),
    ];
    for config in configs {
        let mut pipeline = Pipeline::new(quiet(config), &dataset);
        let first = pipeline.process_frame(0, img.clone()).unwrap();
        assert_eq!(first.matched_count, None);
        let second = pipeline.process_frame(1, img.clone()).unwrap();
        assert_eq!(second.described_count, first.described_count);
        assert_eq!(second.matched_count, Some(second.described_count));
        let current = pipeline.buffer().latest().unwrap();
        assert!(current.matches.iter().all(|m| m.distance == 0.0));
    }
}

#[test]
fn buffer_never_exceeds_its_capacity() {
    let seq = small_sequence(4);
    let mut pipeline = Pipeline::new(quiet(TrackingConfig::default()), &DatasetConfig::default());
    for (i, img) in seq.render_all().into_iter().enumerate() {
        pipeline.process_frame(i, img).unwrap();
        assert!(pipeline.buffer().len() <= 2);
    }
    let indices: Vec<usize> = pipeline.buffer().iter().map(|f| f.index).collect();
    assert_eq!(indices, vec![2, 3]);
}

#[test]
fn focus_and_limit_bound_the_keypoints() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir, 3);
    let mut config = quiet(TrackingConfig::default().with_detector(DetectorType::Fast));
    config.focus_on_vehicle = true;
    config.limit_keypoints = true;

    let mut pipeline = Pipeline::new(config, &dataset);
    let img = small_sequence(3).frame(0);
    let report = pipeline.process_frame(0, img).unwrap();
    assert!(report.roi_keypoint_count.is_some());
    assert!(report.described_count <= dataset.max_keypoints);
    for kp in &pipeline.buffer().latest().unwrap().keypoints {
        assert!(dataset.vehicle_roi.contains(kp.pt));
    }

    let summary = run_sequence(&config, &dataset, None).unwrap();
    assert_eq!(summary.frames.len(), 3);
    for frame in &summary.frames {
        assert!(frame.limited);
        assert!(frame.described_count <= 50);
        assert!(frame.described_count <= frame.roi_keypoint_count.unwrap());
    }
    assert!(summary.frames[0].matched_count.is_none());
    assert!(summary.frames[1..].iter().all(|f| f.matched_count.is_some()));
}

#[test]
fn console_lines_follow_the_stage_order() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir, 2);
    let mut config = quiet(TrackingConfig::default());
    config.focus_on_vehicle = true;
    let summary = run_sequence(&config, &dataset, None).unwrap();

    let first = summary.frames[0].console_lines(&config);
    assert_eq!(first.len(), 3);
    assert!(first[0].starts_with("SHITOMASI detection with n="));
    assert!(first[2].starts_with("BRISK descriptor extraction in"));

    let second = summary.frames[1].console_lines(&config);
    assert_eq!(second.len(), 4);
    assert!(second[3].starts_with("Number of Matched Keypoints: "));
}

#[test]
fn missing_frame_aborts_with_image_load() {
    let dir = TempDir::new().unwrap();
    let mut dataset = write_dataset(&dir, 2);
    dataset.end_index = 2;
    let err = run_sequence(&quiet(TrackingConfig::default()), &dataset, None).unwrap_err();
    assert!(matches!(err, TrackingError::ImageLoad { .. }));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn earlier_frames_are_reported_before_a_load_failure() {
    let dir = TempDir::new().unwrap();
    let mut dataset = write_dataset(&dir, 2);
    dataset.end_index = 2;
    let config = quiet(TrackingConfig::default());
    let mut lines = Vec::new();
    let err = run_sequence_with(&config, &dataset, None, |frame| {
        lines.extend(frame.console_lines(&config));
    })
    .unwrap_err();
    assert!(matches!(err, TrackingError::ImageLoad { .. }));
    assert_eq!(lines.len(), 5);
    assert!(lines[4].starts_with("Number of Matched Keypoints: "));
}

#[test]
fn extractor_family_is_checked_on_the_first_frame() {
    let config = TrackingConfig {
        metric: DistanceMetric::L2,
        ..quiet(TrackingConfig::default())
    };
    let mut pipeline = Pipeline::new(config, &DatasetConfig::default());
    let err = pipeline.process_frame(0, small_sequence(1).frame(0)).unwrap_err();
    assert!(matches!(err, TrackingError::IncompatibleMetric { .. }));
    assert!(pipeline.buffer().is_empty());
}

#[test]
fn unknown_detector_is_rejected_before_loading() {
    let err = TrackingConfig::resolve("SURF", "BRISK", "MAT_BF", "SEL_NN", None).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn run_report_is_written() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir, 2);
    let summary = run_sequence(&quiet(TrackingConfig::default()), &dataset, None).unwrap();
    let path = dir.path().join("report.json");
    write_run_report(&path, &dataset, &summary).unwrap();

    let report: serde_json::Value = object_from_json(&path).unwrap();
    assert_eq!(report["total_matches"], summary.total_matches());
    assert_eq!(report["run"]["frames"].as_array().unwrap().len(), 2);
    assert!(report["timestamp"].as_str().is_some());
    let dataset_back: DatasetConfig = serde_json::from_value(report["dataset"].clone()).unwrap();
    assert_eq!(dataset_back, dataset);
}

#[test]
fn sweep_covers_every_combination() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir, 2);
    let entries = run_sweep(&TrackingConfig::default(), &dataset).unwrap();
    assert_eq!(entries.len(), DetectorType::ALL.len() * DescriptorType::ALL.len());
    for entry in &entries {
        assert!(entry.summary.is_some() != entry.error.is_some());
        if let Some(summary) = &entry.summary {
            assert_eq!(summary.selector, SelectorType::KNearestRatio);
            assert_eq!(summary.frames.len(), 2);
        }
    }
    assert_eq!(sweep_table(&entries).len(), entries.len());

    let path = dir.path().join("sweep.json");
    write_sweep_report(&path, &dataset, &entries).unwrap();
    let report: serde_json::Value = object_from_json(&path).unwrap();
    assert_eq!(report["combinations"], entries.len());
}
