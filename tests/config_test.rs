use feature_tracking::config::{
    DescriptorType, DetectorType, DistanceMetric, MatcherType, SelectorType,
};
use feature_tracking::error::AlgorithmKind;
use feature_tracking::types::DescriptorFamily;
use feature_tracking::{DatasetConfig, TrackingConfig, TrackingError};

#[test]
fn resolves_reference_configuration() {
    let config = TrackingConfig::resolve("SHITOMASI", "BRISK", "MAT_BF", "SEL_NN", None).unwrap();
    assert_eq!(config, TrackingConfig::default());
}

#[test]
fn metric_follows_descriptor_family() {
    let config = TrackingConfig::resolve("SIFT", "SIFT", "MAT_FLANN", "SEL_KNN", None).unwrap();
    assert_eq!(config.metric, DistanceMetric::L2);
    assert_eq!(config.matcher, MatcherType::Flann);
    assert_eq!(config.selector, SelectorType::KNearestRatio);
    assert_eq!(DescriptorType::Sift.family(), DescriptorFamily::Float);
    assert!(
        DescriptorType::ALL
            .iter()
            .filter(|d| **d != DescriptorType::Sift)
            .all(|d| d.family() == DescriptorFamily::Binary)
    );
}

#[test]
fn unknown_names_are_rejected() {
    let err = TrackingConfig::resolve("FOO", "BRISK", "MAT_BF", "SEL_NN", None).unwrap_err();
    match &err {
        TrackingError::UnsupportedAlgorithm { kind, name } => {
            assert_eq!(*kind, AlgorithmKind::Detector);
            assert_eq!(name, "FOO");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.exit_code(), 2);
    assert!(TrackingConfig::resolve("ORB", "ORB", "MAT_KD", "SEL_NN", None).is_err());
    assert!(TrackingConfig::resolve("ORB", "ORB", "MAT_BF", "SEL_ALL", None).is_err());
    assert!(TrackingConfig::resolve("ORB", "SURF", "MAT_BF", "SEL_NN", None).is_err());
}

#[test]
fn mismatched_metric_is_rejected() {
    let err = TrackingConfig::resolve("ORB", "ORB", "MAT_BF", "SEL_NN", Some("L2")).unwrap_err();
    assert!(matches!(
        err,
        TrackingError::IncompatibleMetric {
            metric: DistanceMetric::L2,
            family: DescriptorFamily::Binary
        }
    ));
    assert_eq!(err.exit_code(), 2);
    assert!(TrackingConfig::resolve("SIFT", "SIFT", "MAT_BF", "SEL_NN", Some("HAMMING")).is_err());
    assert!(TrackingConfig::resolve("SIFT", "SIFT", "MAT_BF", "SEL_NN", Some("L2")).is_ok());
}

#[test]
fn only_shi_tomasi_is_pre_ranked() {
    let pre_ranked: Vec<DetectorType> = DetectorType::ALL
        .into_iter()
        .filter(|d| d.keypoints_pre_ranked())
        .collect();
    assert_eq!(pre_ranked, vec![DetectorType::ShiTomasi]);
}

#[test]
fn dataset_config_fills_missing_fields() {
    let config: DatasetConfig =
        serde_json::from_str(r#"{ "image_dir": "/tmp/frames", "end_index": 3 }"#).unwrap();
    assert_eq!(config.end_index, 3);
    assert_eq!(config.buffer_size, 2);
    assert_eq!(config.max_keypoints, 50);
    assert_eq!(config.frame_indices().count(), 4);
    assert!(config.image_path(0).starts_with("/tmp/frames"));
}
