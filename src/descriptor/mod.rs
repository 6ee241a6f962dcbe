pub mod binary;
pub mod sift;

pub use binary::{AkazeExtractor, PairTestExtractor};
pub use sift::SiftExtractor;

use image::GrayImage;

use crate::config::DescriptorType;
use crate::types::{DescriptorFamily, Descriptors, KeyPoint};

/// Computes one descriptor row per keypoint, index-aligned with the input.
///
/// Patches that reach past the image border are sampled with clamped coordinates,
/// so no keypoint is ever dropped.
pub trait DescriptorExtractor: Send + Sync {
    fn family(&self) -> DescriptorFamily;

    fn compute(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors;
}

pub fn create_extractor(kind: DescriptorType) -> Box<dyn DescriptorExtractor> {
    match kind {
        DescriptorType::Brief => Box::new(PairTestExtractor::brief()),
        DescriptorType::Orb => Box::new(PairTestExtractor::orb()),
        DescriptorType::Brisk => Box::new(PairTestExtractor::brisk()),
        DescriptorType::Freak => Box::new(PairTestExtractor::freak()),
        DescriptorType::Akaze => Box::new(AkazeExtractor::default()),
        DescriptorType::Sift => Box::new(SiftExtractor::default()),
    }
}
