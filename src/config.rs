use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AlgorithmKind, Result, TrackingError};
use crate::filter::Roi;
use crate::types::DescriptorFamily;

/// How a detector family ranks its keypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorClass {
    /// Minimum-eigenvalue corners, emitted strongest first without a usable score.
    CornerResponse,
    /// Harris response, every keypoint carries its score.
    GradientResponse,
    /// Scale-space or pyramid detectors with per-keypoint scores.
    Modern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorType {
    ShiTomasi,
    Harris,
    Fast,
    Brisk,
    Orb,
    Akaze,
    Sift,
}

impl DetectorType {
    pub const ALL: [DetectorType; 7] = [
        DetectorType::ShiTomasi,
        DetectorType::Harris,
        DetectorType::Fast,
        DetectorType::Brisk,
        DetectorType::Orb,
        DetectorType::Akaze,
        DetectorType::Sift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DetectorType::ShiTomasi => "SHITOMASI",
            DetectorType::Harris => "HARRIS",
            DetectorType::Fast => "FAST",
            DetectorType::Brisk => "BRISK",
            DetectorType::Orb => "ORB",
            DetectorType::Akaze => "AKAZE",
            DetectorType::Sift => "SIFT",
        }
    }

    pub fn class(&self) -> DetectorClass {
        match self {
            DetectorType::ShiTomasi => DetectorClass::CornerResponse,
            DetectorType::Harris => DetectorClass::GradientResponse,
            _ => DetectorClass::Modern,
        }
    }

    /// Whether detection order already is quality order and the response field is meaningless.
    pub fn keypoints_pre_ranked(&self) -> bool {
        self.class() == DetectorClass::CornerResponse
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorType {
    Brisk,
    Brief,
    Orb,
    Freak,
    Akaze,
    Sift,
}

impl DescriptorType {
    pub const ALL: [DescriptorType; 6] = [
        DescriptorType::Brisk,
        DescriptorType::Brief,
        DescriptorType::Orb,
        DescriptorType::Freak,
        DescriptorType::Akaze,
        DescriptorType::Sift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DescriptorType::Brisk => "BRISK",
            DescriptorType::Brief => "BRIEF",
            DescriptorType::Orb => "ORB",
            DescriptorType::Freak => "FREAK",
            DescriptorType::Akaze => "AKAZE",
            DescriptorType::Sift => "SIFT",
        }
    }

    pub fn family(&self) -> DescriptorFamily {
        match self {
            DescriptorType::Sift => DescriptorFamily::Float,
            _ => DescriptorFamily::Binary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatcherType {
    BruteForce,
    Flann,
}

impl MatcherType {
    pub fn name(&self) -> &'static str {
        match self {
            MatcherType::BruteForce => "MAT_BF",
            MatcherType::Flann => "MAT_FLANN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorType {
    NearestNeighbor,
    KNearestRatio,
}

impl SelectorType {
    pub fn name(&self) -> &'static str {
        match self {
            SelectorType::NearestNeighbor => "SEL_NN",
            SelectorType::KNearestRatio => "SEL_KNN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    Hamming,
    L2,
}

impl DistanceMetric {
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Hamming => "HAMMING",
            DistanceMetric::L2 => "L2",
        }
    }

    pub fn for_family(family: DescriptorFamily) -> DistanceMetric {
        match family {
            DescriptorFamily::Binary => DistanceMetric::Hamming,
            DescriptorFamily::Float => DistanceMetric::L2,
        }
    }

    pub fn check_family(&self, family: DescriptorFamily) -> Result<()> {
        if DistanceMetric::for_family(family) == *self {
            Ok(())
        } else {
            Err(TrackingError::IncompatibleMetric {
                metric: *self,
                family,
            })
        }
    }
}

macro_rules! named_algorithm {
    ($ty:ty, $kind:expr, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = TrackingError;

            fn from_str(s: &str) -> Result<Self> {
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.name() == s)
                    .ok_or_else(|| TrackingError::UnsupportedAlgorithm {
                        kind: $kind,
                        name: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_algorithm!(DetectorType, AlgorithmKind::Detector, [
    DetectorType::ShiTomasi,
    DetectorType::Harris,
    DetectorType::Fast,
    DetectorType::Brisk,
    DetectorType::Orb,
    DetectorType::Akaze,
    DetectorType::Sift,
]);
named_algorithm!(DescriptorType, AlgorithmKind::Descriptor, [
    DescriptorType::Brisk,
    DescriptorType::Brief,
    DescriptorType::Orb,
    DescriptorType::Freak,
    DescriptorType::Akaze,
    DescriptorType::Sift,
]);
named_algorithm!(MatcherType, AlgorithmKind::Matcher, [
    MatcherType::BruteForce,
    MatcherType::Flann,
]);
named_algorithm!(SelectorType, AlgorithmKind::Selector, [
    SelectorType::NearestNeighbor,
    SelectorType::KNearestRatio,
]);
named_algorithm!(DistanceMetric, AlgorithmKind::Metric, [
    DistanceMetric::Hamming,
    DistanceMetric::L2,
]);

/// Algorithm choices and stage switches, resolved once before any frame is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
    pub detector: DetectorType,
    pub descriptor: DescriptorType,
    pub matcher: MatcherType,
    pub selector: SelectorType,
    pub metric: DistanceMetric,
    pub focus_on_vehicle: bool,
    pub limit_keypoints: bool,
    pub quiet: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            detector: DetectorType::ShiTomasi,
            descriptor: DescriptorType::Brisk,
            matcher: MatcherType::BruteForce,
            selector: SelectorType::NearestNeighbor,
            metric: DistanceMetric::Hamming,
            focus_on_vehicle: false,
            limit_keypoints: false,
            quiet: false,
        }
    }
}

impl TrackingConfig {
    /// Parses the string-coded algorithm names.
    ///
    /// Fails with `UnsupportedAlgorithm` for unknown names and with
    /// `IncompatibleMetric` when an explicit metric does not suit the descriptor family.
    pub fn resolve(
        detector: &str,
        descriptor: &str,
        matcher: &str,
        selector: &str,
        metric: Option<&str>,
    ) -> Result<TrackingConfig> {
        let detector: DetectorType = detector.parse()?;
        let descriptor: DescriptorType = descriptor.parse()?;
        let matcher: MatcherType = matcher.parse()?;
        let selector: SelectorType = selector.parse()?;
        let metric = match metric {
            Some(m) => m.parse()?,
            None => DistanceMetric::for_family(descriptor.family()),
        };
        metric.check_family(descriptor.family())?;
        Ok(TrackingConfig {
            detector,
            descriptor,
            matcher,
            selector,
            metric,
            ..Default::default()
        })
    }

    pub fn with_descriptor(mut self, descriptor: DescriptorType) -> TrackingConfig {
        self.descriptor = descriptor;
        self.metric = DistanceMetric::for_family(descriptor.family());
        self
    }

    pub fn with_detector(mut self, detector: DetectorType) -> TrackingConfig {
        self.detector = detector;
        self
    }
}

/// Where the frames live and the fixed parameters of the filter stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub image_dir: PathBuf,
    pub image_prefix: String,
    pub image_extension: String,
    pub start_index: usize,
    pub end_index: usize,
    pub fill_width: usize,
    pub buffer_size: usize,
    pub vehicle_roi: Roi,
    pub max_keypoints: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("../images/"),
            image_prefix: "KITTI/2011_09_26/image_00/data/000000".to_string(),
            image_extension: ".png".to_string(),
            start_index: 0,
            end_index: 9,
            fill_width: 4,
            buffer_size: 2,
            vehicle_roi: Roi::new(535, 180, 180, 150),
            max_keypoints: 50,
        }
    }
}

impl DatasetConfig {
    /// Path of the frame with the given absolute index.
    pub fn image_path(&self, index: usize) -> PathBuf {
        let file_name = format!(
            "{}{:0width$}{}",
            self.image_prefix,
            index,
            self.image_extension,
            width = self.fill_width
        );
        self.image_dir.join(file_name)
    }

    pub fn frame_indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start_index..=self.end_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_path_is_zero_padded() {
        let config = DatasetConfig::default();
        let p = config.image_path(7);
        assert!(
            p.to_string_lossy()
                .ends_with("KITTI/2011_09_26/image_00/data/0000000007.png")
        );
    }

    #[test]
    fn names_round_trip() {
        for d in DetectorType::ALL {
            assert_eq!(d.name().parse::<DetectorType>().unwrap(), d);
        }
        for d in DescriptorType::ALL {
            assert_eq!(d.to_string().parse::<DescriptorType>().unwrap(), d);
        }
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert!("shitomasi".parse::<DetectorType>().is_err());
        assert!("sel_knn".parse::<SelectorType>().is_err());
    }
}
