//! Structure-tensor corner detectors.

use glam::Vec2;
use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::FeatureDetector;
use crate::types::KeyPoint;

/// Box-summed products of Sobel gradients.
struct StructureTensor {
    width: usize,
    height: usize,
    xx: Vec<f32>,
    yy: Vec<f32>,
    xy: Vec<f32>,
}

impl StructureTensor {
    fn compute(image: &GrayImage, block_size: usize) -> StructureTensor {
        let (w, h) = image.dimensions();
        let (width, height) = (w as usize, h as usize);
        let gx = horizontal_sobel(image);
        let gy = vertical_sobel(image);
        let n = width * height;
        let mut xx = Vec::with_capacity(n);
        let mut yy = Vec::with_capacity(n);
        let mut xy = Vec::with_capacity(n);
        for (&dx, &dy) in gx.as_raw().iter().zip(gy.as_raw()) {
            // keep products in a comfortable float range
            let dx = dx as f32 / 255.0;
            let dy = dy as f32 / 255.0;
            xx.push(dx * dx);
            yy.push(dy * dy);
            xy.push(dx * dy);
        }
        StructureTensor {
            width,
            height,
            xx: box_sum(&xx, width, height, block_size),
            yy: box_sum(&yy, width, height, block_size),
            xy: box_sum(&xy, width, height, block_size),
        }
    }

    fn min_eigenvalue(&self, idx: usize) -> f32 {
        let (a, b, c) = (self.xx[idx], self.xy[idx], self.yy[idx]);
        let half_trace = (a + c) * 0.5;
        let root = (((a - c) * 0.5).powi(2) + b * b).sqrt();
        half_trace - root
    }

    fn harris(&self, idx: usize, k: f32) -> f32 {
        let (a, b, c) = (self.xx[idx], self.xy[idx], self.yy[idx]);
        let det = a * c - b * b;
        let trace = a + c;
        det - k * trace * trace
    }
}

/// Sums `values` over a `block x block` window anchored like OpenCV's box filter.
fn box_sum(values: &[f32], width: usize, height: usize, block: usize) -> Vec<f32> {
    let stride = width + 1;
    let mut integral = vec![0.0f64; stride * (height + 1)];
    for y in 0..height {
        let mut row = 0.0f64;
        for x in 0..width {
            row += values[y * width + x] as f64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }
    let before = (block.saturating_sub(1) / 2) as i64;
    let after = (block / 2) as i64;
    let mut out = vec![0.0f32; width * height];
    for y in 0..height as i64 {
        let y0 = (y - before).max(0) as usize;
        let y1 = ((y + after).min(height as i64 - 1) + 1) as usize;
        for x in 0..width as i64 {
            let x0 = (x - before).max(0) as usize;
            let x1 = ((x + after).min(width as i64 - 1) + 1) as usize;
            let s = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                - integral[y1 * stride + x0]
                + integral[y0 * stride + x0];
            out[y as usize * width + x as usize] = s as f32;
        }
    }
    out
}

/// True when `scores[idx]` wins against its 8 neighbours; ties go to the earlier pixel in raster order.
fn is_local_max(scores: &[f32], width: usize, height: usize, x: usize, y: usize) -> bool {
    let v = scores[y * width + x];
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                continue;
            }
            let n = scores[ny as usize * width + nx as usize];
            let earlier = dy < 0 || (dy == 0 && dx < 0);
            if n > v || (earlier && n == v) {
                return false;
            }
        }
    }
    true
}

/// Good-features-to-track corners (minimum eigenvalue of the structure tensor).
///
/// Keypoints come out strongest first and carry no response value.
pub struct ShiTomasiDetector {
    block_size: usize,
    min_distance: f32,
    quality_level: f32,
}

impl Default for ShiTomasiDetector {
    fn default() -> Self {
        Self {
            block_size: 4,
            min_distance: 4.0,
            quality_level: 0.01,
        }
    }
}

impl ShiTomasiDetector {
    pub fn new(block_size: usize, min_distance: f32, quality_level: f32) -> Self {
        Self {
            block_size,
            min_distance,
            quality_level,
        }
    }
}

impl FeatureDetector for ShiTomasiDetector {
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let (w, h) = image.dimensions();
        if w < 3 || h < 3 {
            return Vec::new();
        }
        let (width, height) = (w as usize, h as usize);
        let max_corners = width * height / (self.min_distance as usize).max(1);
        let tensor = StructureTensor::compute(image, self.block_size);
        let scores: Vec<f32> = (0..tensor.width * tensor.height)
            .map(|i| tensor.min_eigenvalue(i))
            .collect();
        let max_score = scores.iter().cloned().fold(0.0f32, f32::max);
        if max_score <= 0.0 {
            return Vec::new();
        }
        let threshold = max_score * self.quality_level;

        let mut candidates = Vec::new();
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let s = scores[y * width + x];
                if s >= threshold && is_local_max(&scores, width, height, x, y) {
                    candidates.push((x, y, s));
                }
            }
        }
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut grid = DistanceGrid::new(width, height, self.min_distance);
        let mut keypoints = Vec::new();
        for (x, y, _) in candidates {
            if keypoints.len() >= max_corners {
                break;
            }
            let pt = Vec2::new(x as f32, y as f32);
            if grid.try_insert(pt) {
                keypoints.push(KeyPoint::new(pt.x, pt.y, self.block_size as f32));
            }
        }
        log::debug!("shi-tomasi kept {} corners", keypoints.len());
        keypoints
    }
}

/// Spatial hash enforcing a minimum distance between accepted points.
struct DistanceGrid {
    cell: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Vec2>>,
}

impl DistanceGrid {
    fn new(width: usize, height: usize, min_distance: f32) -> Self {
        let cell = min_distance.max(1.0);
        let cols = (width as f32 / cell).ceil() as usize + 1;
        let rows = (height as f32 / cell).ceil() as usize + 1;
        Self {
            cell,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    fn try_insert(&mut self, pt: Vec2) -> bool {
        let cx = (pt.x / self.cell) as usize;
        let cy = (pt.y / self.cell) as usize;
        let min_sq = self.cell * self.cell;
        for gy in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for gx in cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1) {
                if self.cells[gy * self.cols + gx]
                    .iter()
                    .any(|p| p.distance_squared(pt) < min_sq)
                {
                    return false;
                }
            }
        }
        self.cells[cy * self.cols + cx].push(pt);
        true
    }
}

/// Harris corners with min-max normalised response and 3x3 non-maximum suppression.
pub struct HarrisDetector {
    block_size: usize,
    k: f32,
    min_response: f32,
    aperture_size: usize,
}

impl Default for HarrisDetector {
    fn default() -> Self {
        Self {
            block_size: 2,
            k: 0.04,
            min_response: 100.0,
            aperture_size: 3,
        }
    }
}

impl FeatureDetector for HarrisDetector {
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let (w, h) = image.dimensions();
        if w < 3 || h < 3 {
            return Vec::new();
        }
        let (width, height) = (w as usize, h as usize);
        let tensor = StructureTensor::compute(image, self.block_size);
        let raw: Vec<f32> = (0..width * height).map(|i| tensor.harris(i, self.k)).collect();
        let (lo, hi) = raw
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if hi - lo <= f32::EPSILON {
            return Vec::new();
        }
        let scale = 255.0 / (hi - lo);
        let normalized: Vec<f32> = raw.iter().map(|v| (v - lo) * scale).collect();

        let mut keypoints = Vec::new();
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let idx = y * width + x;
                let r = normalized[idx];
                // flat regions can normalise above the threshold, only positive responses are corners
                if raw[idx] > 0.0
                    && r > self.min_response
                    && is_local_max(&normalized, width, height, x, y)
                {
                    keypoints.push(
                        KeyPoint::new(x as f32, y as f32, (2 * self.aperture_size) as f32)
                            .with_response(r),
                    );
                }
            }
        }
        keypoints
    }
}
