use feature_tracking::config::{DescriptorType, DetectorType};
use feature_tracking::descriptor::create_extractor;
use feature_tracking::detector::create_detector;
use feature_tracking::filter::Roi;
use feature_tracking::synthetic::SyntheticSequence;
use feature_tracking::types::{DescriptorFamily, KeyPoint};
use image::GrayImage;

fn textured_frame() -> GrayImage {
    SyntheticSequence {
        width: 200,
        height: 160,
        frames: 2,
        vehicle: Roi::new(60, 50, 60, 50),
        ..Default::default()
    }
    .frame(0)
}

#[test]
fn every_detector_stays_inside_the_image() {
    let img = textured_frame();
    for kind in DetectorType::ALL {
        let keypoints = create_detector(kind).detect(&img);
        for kp in &keypoints {
            assert!(
                kp.pt.x >= 0.0 && kp.pt.x < img.width() as f32,
                "{} x out of range",
                kind.name()
            );
            assert!(kp.pt.y >= 0.0 && kp.pt.y < img.height() as f32);
            assert!(kp.size > 0.0);
        }
    }
}

#[test]
fn corner_detectors_find_block_corners() {
    let img = textured_frame();
    for kind in [DetectorType::ShiTomasi, DetectorType::Fast] {
        assert!(!create_detector(kind).detect(&img).is_empty(), "{}", kind.name());
    }
}

#[test]
fn flat_image_has_no_corners() {
    let img = GrayImage::from_pixel(80, 60, image::Luma([128]));
    for kind in [DetectorType::ShiTomasi, DetectorType::Harris, DetectorType::Fast] {
        assert!(create_detector(kind).detect(&img).is_empty(), "{}", kind.name());
    }
}

#[test]
fn every_extractor_describes_every_keypoint() {
    let img = textured_frame();
    let mut keypoints = create_detector(DetectorType::Fast).detect(&img);
    // border points are described too
    keypoints.push(KeyPoint::new(0.0, 0.0, 7.0));
    keypoints.push(KeyPoint::new(199.0, 159.0, 31.0).with_angle(45.0));
    let expected = [
        (DescriptorType::Brisk, 64),
        (DescriptorType::Brief, 32),
        (DescriptorType::Orb, 32),
        (DescriptorType::Freak, 64),
        (DescriptorType::Akaze, 61),
        (DescriptorType::Sift, 128),
    ];
    for (kind, width) in expected {
        let extractor = create_extractor(kind);
        assert_eq!(extractor.family(), kind.family());
        let descriptors = extractor.compute(&img, &keypoints);
        assert_eq!(descriptors.len(), keypoints.len(), "{}", kind.name());
        assert_eq!(descriptors.width(), width, "{}", kind.name());
        assert_eq!(descriptors.family(), kind.family());
    }
}

#[test]
fn only_sift_is_float() {
    for kind in DescriptorType::ALL {
        let expected = if kind == DescriptorType::Sift {
            DescriptorFamily::Float
        } else {
            DescriptorFamily::Binary
        };
        assert_eq!(kind.family(), expected);
    }
}

#[test]
fn extraction_is_deterministic() {
    let img = textured_frame();
    let keypoints = create_detector(DetectorType::ShiTomasi).detect(&img);
    for kind in DescriptorType::ALL {
        let extractor = create_extractor(kind);
        assert_eq!(
            extractor.compute(&img, &keypoints),
            extractor.compute(&img, &keypoints),
            "{}",
            kind.name()
        );
    }
}

#[test]
fn no_keypoints_give_no_rows() {
    let img = textured_frame();
    for kind in DescriptorType::ALL {
        assert!(create_extractor(kind).compute(&img, &[]).is_empty());
    }
}
