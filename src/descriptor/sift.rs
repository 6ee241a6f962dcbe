use glam::Vec2;
use image::GrayImage;
use rayon::prelude::*;
use std::f32::consts::PI;

use super::DescriptorExtractor;
use crate::scale_space::{FloatImage, dominant_orientation};
use crate::types::{DescriptorFamily, DescriptorMatrix, Descriptors, KeyPoint};

const CELLS: usize = 4;
const BINS: usize = 8;
const SAMPLES_PER_CELL: usize = 4;
const CLIP: f32 = 0.2;

/// 4x4 grid of 8-bin gradient orientation histograms, 128 floats per keypoint.
///
/// Rows are L2-normalised, clipped at 0.2, renormalised and scaled to `[0, 255]`.
pub struct SiftExtractor {
    smoothing_sigma: f32,
    /// Cell width in multiples of half the keypoint size.
    cell_scale: f32,
}

impl Default for SiftExtractor {
    fn default() -> Self {
        Self {
            smoothing_sigma: 1.0,
            cell_scale: 3.0,
        }
    }
}

impl SiftExtractor {
    pub const WIDTH: usize = CELLS * CELLS * BINS;

    fn describe(&self, image: &FloatImage, kp: &KeyPoint) -> Vec<f32> {
        let sigma = (kp.size * 0.5).max(1.0);
        let angle = if kp.has_angle() {
            kp.angle
        } else {
            let x = kp.pt.x.round().clamp(0.0, (image.width() - 1) as f32) as usize;
            let y = kp.pt.y.round().clamp(0.0, (image.height() - 1) as f32) as usize;
            dominant_orientation(image, x, y, sigma)
        }
        .to_radians();
        let rotation = Vec2::from_angle(angle);
        let n = CELLS * SAMPLES_PER_CELL;
        let spacing = self.cell_scale * sigma / SAMPLES_PER_CELL as f32;
        let half = (n as f32 - 1.0) * 0.5;
        let weight_denom = 2.0 * (n as f32 * 0.5).powi(2);

        let mut hist = vec![0.0f32; Self::WIDTH];
        for j in 0..n {
            for i in 0..n {
                let local = Vec2::new(i as f32 - half, j as f32 - half);
                let p = kp.pt + rotation.rotate(local * spacing);
                let gx = image.sample(p.x + 1.0, p.y) - image.sample(p.x - 1.0, p.y);
                let gy = image.sample(p.x, p.y + 1.0) - image.sample(p.x, p.y - 1.0);
                let magnitude = (gx * gx + gy * gy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                let weight = (-(local.length_squared()) / weight_denom).exp();
                let theta = (gy.atan2(gx) - angle).rem_euclid(2.0 * PI);
                let position = theta / (2.0 * PI) * BINS as f32;
                let lower = position.floor() as usize % BINS;
                let upper = (lower + 1) % BINS;
                let frac = position - position.floor();
                let cell = (j / SAMPLES_PER_CELL) * CELLS + i / SAMPLES_PER_CELL;
                hist[cell * BINS + lower] += weight * magnitude * (1.0 - frac);
                hist[cell * BINS + upper] += weight * magnitude * frac;
            }
        }
        normalize_histogram(&mut hist);
        hist
    }
}

fn normalize_histogram(hist: &mut [f32]) {
    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    hist.iter_mut().for_each(|v| *v = (*v / norm).min(CLIP));
    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    hist.iter_mut()
        .for_each(|v| *v = (*v / norm * 512.0).min(255.0));
}

impl DescriptorExtractor for SiftExtractor {
    fn family(&self) -> DescriptorFamily {
        DescriptorFamily::Float
    }

    fn compute(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let smoothed = FloatImage::from_gray(image).gaussian_blur(self.smoothing_sigma);
        let rows: Vec<Vec<f32>> = keypoints
            .par_iter()
            .map(|kp| self.describe(&smoothed, kp))
            .collect();
        let mut matrix = DescriptorMatrix::with_capacity(Self::WIDTH, rows.len());
        for row in &rows {
            matrix.push_row(row);
        }
        Descriptors::Float(matrix)
    }
}
