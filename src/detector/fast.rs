//! FAST-9 based detectors: plain FAST, multi-octave BRISK and oriented pyramid ORB.

use image::GrayImage;
use image::imageops::{self, FilterType};
use imageproc::corners::corners_fast9;

use super::FeatureDetector;
use crate::scale_space::{FloatImage, intensity_centroid_angle};
use crate::types::KeyPoint;

/// FAST-9 corners that survive 3x3 non-maximum suppression on the corner score.
fn fast_corners_nms(image: &GrayImage, threshold: u8) -> Vec<(u32, u32, f32)> {
    let (w, h) = image.dimensions();
    let corners = corners_fast9(image, threshold);
    let mut scores = vec![0.0f32; (w * h) as usize];
    for c in &corners {
        scores[(c.y * w + c.x) as usize] = c.score;
    }
    corners
        .iter()
        .filter(|c| {
            let s = c.score;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = c.x as i64 + dx;
                    let ny = c.y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let n = scores[(ny as u32 * w + nx as u32) as usize];
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if n > s || (earlier && n == s) {
                        return false;
                    }
                }
            }
            true
        })
        .map(|c| (c.x, c.y, c.score))
        .collect()
}

fn downscale(image: &GrayImage, factor: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    let nw = ((w as f32 / factor).round() as u32).max(1);
    let nh = ((h as f32 / factor).round() as u32).max(1);
    imageops::resize(image, nw, nh, FilterType::Triangle)
}

pub struct FastDetector {
    threshold: u8,
}

impl Default for FastDetector {
    fn default() -> Self {
        Self { threshold: 30 }
    }
}

impl FastDetector {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl FeatureDetector for FastDetector {
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        fast_corners_nms(image, self.threshold)
            .into_iter()
            .map(|(x, y, score)| KeyPoint::new(x as f32, y as f32, 7.0).with_response(score))
            .collect()
    }
}

/// FAST-9 over half-sampled octaves, keypoints reported in full-resolution coordinates.
pub struct BriskDetector {
    threshold: u8,
    octaves: usize,
}

impl Default for BriskDetector {
    fn default() -> Self {
        Self {
            threshold: 30,
            octaves: 4,
        }
    }
}

impl FeatureDetector for BriskDetector {
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let mut keypoints = Vec::new();
        let mut level = image.clone();
        let mut scale = 1.0f32;
        for octave in 0..self.octaves {
            let (w, h) = level.dimensions();
            if w < 16 || h < 16 {
                break;
            }
            for (x, y, score) in fast_corners_nms(&level, self.threshold) {
                let kp = KeyPoint::new(
                    (x as f32 + 0.5) * scale - 0.5,
                    (y as f32 + 0.5) * scale - 0.5,
                    12.0 * scale,
                )
                .with_response(score)
                .with_octave(octave as i32);
                keypoints.push(kp);
            }
            level = downscale(&level, 2.0);
            scale *= 2.0;
        }
        keypoints
    }
}

/// Oriented FAST on a scale pyramid, ranked by Harris response.
pub struct OrbDetector {
    max_features: usize,
    levels: usize,
    scale_factor: f32,
    fast_threshold: u8,
    edge_threshold: u32,
    patch_size: f32,
}

impl Default for OrbDetector {
    fn default() -> Self {
        Self {
            max_features: 500,
            levels: 8,
            scale_factor: 1.2,
            fast_threshold: 20,
            edge_threshold: 31,
            patch_size: 31.0,
        }
    }
}

impl OrbDetector {
    fn features_per_level(&self) -> Vec<usize> {
        let inv = 1.0 / self.scale_factor;
        let mut remaining = self.max_features;
        let first = self.max_features as f32 * (1.0 - inv) / (1.0 - inv.powi(self.levels as i32));
        let mut desired = first;
        let mut per_level = Vec::with_capacity(self.levels);
        for _ in 0..self.levels.saturating_sub(1) {
            let n = (desired.round() as usize).min(remaining);
            per_level.push(n);
            remaining -= n;
            desired *= inv;
        }
        per_level.push(remaining);
        per_level
    }
}

/// Harris score over a 7x7 window using central differences.
fn harris_score(image: &FloatImage, x: i32, y: i32) -> f32 {
    let mut a = 0.0;
    let mut b = 0.0;
    let mut c = 0.0;
    for dy in -3..=3 {
        for dx in -3..=3 {
            let (ix, iy) = image.gradient(x + dx, y + dy);
            a += ix * ix;
            b += ix * iy;
            c += iy * iy;
        }
    }
    a * c - b * b - 0.04 * (a + c) * (a + c)
}

impl FeatureDetector for OrbDetector {
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let per_level = self.features_per_level();
        let mut keypoints = Vec::new();
        for (level, &quota) in per_level.iter().enumerate() {
            let scale = self.scale_factor.powi(level as i32);
            let level_img = if level == 0 {
                image.clone()
            } else {
                downscale(image, scale)
            };
            let (w, h) = level_img.dimensions();
            let edge = self.edge_threshold;
            if w <= 2 * edge || h <= 2 * edge {
                break;
            }
            let float_img = FloatImage::from_gray(&level_img);
            let mut level_kps: Vec<KeyPoint> = fast_corners_nms(&level_img, self.fast_threshold)
                .into_iter()
                .filter(|&(x, y, _)| x >= edge && y >= edge && x < w - edge && y < h - edge)
                .map(|(x, y, _)| {
                    let response = harris_score(&float_img, x as i32, y as i32);
                    let angle = intensity_centroid_angle(&float_img, x as f32, y as f32, 15);
                    KeyPoint::new(x as f32 * scale, y as f32 * scale, self.patch_size * scale)
                        .with_response(response)
                        .with_angle(angle)
                        .with_octave(level as i32)
                })
                .collect();
            level_kps.sort_by(|a, b| b.response.total_cmp(&a.response));
            level_kps.truncate(quota);
            keypoints.extend(level_kps);
        }
        keypoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orb_level_quotas_sum_to_max_features() {
        let orb = OrbDetector::default();
        let quotas = orb.features_per_level();
        assert_eq!(quotas.len(), 8);
        assert_eq!(quotas.iter().sum::<usize>(), 500);
        assert!(quotas[0] > quotas[7]);
    }

    #[test]
    fn fast_on_uniform_image_is_empty() {
        let img = GrayImage::from_pixel(40, 40, image::Luma([90]));
        assert!(FastDetector::default().detect(&img).is_empty());
    }
}
