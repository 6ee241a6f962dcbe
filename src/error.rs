use std::fmt;
use std::path::PathBuf;

use crate::config::DistanceMetric;
use crate::types::DescriptorFamily;

pub type Result<T> = std::result::Result<T, TrackingError>;

/// Which configuration slot an algorithm name was given for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    Detector,
    Descriptor,
    Matcher,
    Selector,
    Metric,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlgorithmKind::Detector => "detector",
            AlgorithmKind::Descriptor => "descriptor",
            AlgorithmKind::Matcher => "matcher",
            AlgorithmKind::Selector => "selector",
            AlgorithmKind::Metric => "distance metric",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("unsupported {kind} type: {name}")]
    UnsupportedAlgorithm { kind: AlgorithmKind, name: String },

    #[error("distance metric {metric} cannot be used with {family} descriptors")]
    IncompatibleMetric {
        metric: DistanceMetric,
        family: DescriptorFamily,
    },

    #[error("frame buffer holds {available} frame(s) but {required} are required")]
    Underflow { required: usize, available: usize },

    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write image {}: {source}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{descriptors} descriptors for {keypoints} keypoints")]
    DescriptorCountMismatch { keypoints: usize, descriptors: usize },

    #[error("descriptor layouts differ: {source_layout} vs {target_layout}")]
    DescriptorLayoutMismatch {
        source_layout: String,
        target_layout: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Recording(#[from] rerun::RecordingStreamError),
}

impl TrackingError {
    /// Process exit code used by the command line driver.
    pub fn exit_code(&self) -> u8 {
        match self {
            TrackingError::UnsupportedAlgorithm { .. } | TrackingError::IncompatibleMetric { .. } => 2,
            TrackingError::ImageLoad { .. } => 3,
            _ => 1,
        }
    }
}
