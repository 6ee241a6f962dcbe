use feature_tracking::filter::{Roi, limit_keypoints, restrict_to_region, retain_best};
use feature_tracking::types::KeyPoint;
use glam::Vec2;

#[test]
fn region_is_half_open() {
    let roi = Roi::new(535, 180, 180, 150);
    assert!(roi.contains(Vec2::new(535.0, 180.0)));
    assert!(roi.contains(Vec2::new(714.9, 329.9)));
    assert!(!roi.contains(Vec2::new(715.0, 200.0)));
    assert!(!roi.contains(Vec2::new(600.0, 330.0)));
    assert!(!roi.contains(Vec2::new(534.9, 200.0)));
}

#[test]
fn restriction_is_idempotent_and_keeps_order() {
    let roi = Roi::new(10, 10, 20, 20);
    let kps = vec![
        KeyPoint::new(15.0, 15.0, 1.0),
        KeyPoint::new(5.0, 15.0, 1.0),
        KeyPoint::new(29.0, 10.0, 1.0),
        KeyPoint::new(30.0, 10.0, 1.0),
    ];
    let once = restrict_to_region(kps, &roi);
    assert_eq!(once.len(), 2);
    assert_eq!(once[0].pt, Vec2::new(15.0, 15.0));
    let twice = restrict_to_region(once.clone(), &roi);
    assert_eq!(once, twice);
}

fn scored(responses: &[f32]) -> Vec<KeyPoint> {
    responses
        .iter()
        .enumerate()
        .map(|(i, &r)| KeyPoint::new(i as f32, 0.0, 1.0).with_response(r))
        .collect()
}

#[test]
fn retain_best_keeps_top_scores_with_stable_ties() {
    let kps = scored(&[1.0, 5.0, 3.0, 5.0, 2.0]);
    let best = retain_best(kps, 3);
    let xs: Vec<f32> = best.iter().map(|k| k.pt.x).collect();
    assert_eq!(xs, vec![1.0, 3.0, 2.0]);
}

#[test]
fn limiting_never_grows() {
    let kps = scored(&[1.0, 2.0]);
    assert_eq!(limit_keypoints(kps.clone(), 50, false).len(), 2);
    assert_eq!(limit_keypoints(kps, 50, true).len(), 2);
    let many = scored(&(0..120).map(|i| i as f32).collect::<Vec<_>>());
    assert_eq!(limit_keypoints(many, 50, false).len(), 50);
}

#[test]
fn pre_ranked_input_is_truncated_in_detection_order() {
    // responses are meaningless for pre-ranked detectors
    let kps: Vec<KeyPoint> = (0..10).map(|i| KeyPoint::new(i as f32, 0.0, 4.0)).collect();
    let limited = limit_keypoints(kps, 4, true);
    let xs: Vec<f32> = limited.iter().map(|k| k.pt.x).collect();
    assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
}
