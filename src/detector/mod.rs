pub mod blob;
pub mod corner;
pub mod fast;

pub use blob::{AkazeDetector, SiftDetector};
pub use corner::{HarrisDetector, ShiTomasiDetector};
pub use fast::{BriskDetector, FastDetector, OrbDetector};

use image::GrayImage;

use crate::config::DetectorType;
use crate::types::KeyPoint;

/// Finds keypoints in a grayscale image.
///
/// Called once per frame; a valid image never makes a detector fail.
pub trait FeatureDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint>;
}

pub fn create_detector(kind: DetectorType) -> Box<dyn FeatureDetector> {
    match kind {
        DetectorType::ShiTomasi => Box::new(ShiTomasiDetector::default()),
        DetectorType::Harris => Box::new(HarrisDetector::default()),
        DetectorType::Fast => Box::new(FastDetector::default()),
        DetectorType::Brisk => Box::new(BriskDetector::default()),
        DetectorType::Orb => Box::new(OrbDetector::default()),
        DetectorType::Akaze => Box::new(AkazeDetector::default()),
        DetectorType::Sift => Box::new(SiftDetector::default()),
    }
}
