use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::types::KeyPoint;

/// Axis-aligned pixel rectangle.
///
/// Containment is half-open: the left and top edges are inside, the right and bottom edges are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Roi {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Roi {
        Roi {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, pt: Vec2) -> bool {
        let (x0, y0) = (self.x as f32, self.y as f32);
        x0 <= pt.x
            && pt.x < x0 + self.width as f32
            && y0 <= pt.y
            && pt.y < y0 + self.height as f32
    }
}

/// Keeps only the keypoints located inside `roi`, in their original order.
pub fn restrict_to_region(keypoints: Vec<KeyPoint>, roi: &Roi) -> Vec<KeyPoint> {
    keypoints.into_iter().filter(|kp| roi.contains(kp.pt)).collect()
}

/// Keeps the `max_keypoints` strongest keypoints by response, strongest first.
///
/// The sort is stable so equal responses keep their detection order.
pub fn retain_best(mut keypoints: Vec<KeyPoint>, max_keypoints: usize) -> Vec<KeyPoint> {
    if keypoints.len() <= max_keypoints {
        return keypoints;
    }
    keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
    keypoints.truncate(max_keypoints);
    keypoints
}

/// Reduces the keypoint set to at most `max_keypoints`.
///
/// Pre-ranked input (detection order is quality order, no usable response) is truncated
/// in detection order. Everything else goes through [`retain_best`].
pub fn limit_keypoints(
    mut keypoints: Vec<KeyPoint>,
    max_keypoints: usize,
    pre_ranked: bool,
) -> Vec<KeyPoint> {
    if pre_ranked {
        keypoints.truncate(max_keypoints);
        keypoints
    } else {
        retain_best(keypoints, max_keypoints)
    }
}
