//! Scale-space blob detectors built on a Gaussian pyramid.

use image::GrayImage;

use super::FeatureDetector;
use crate::scale_space::{FloatImage, dominant_orientation};
use crate::types::KeyPoint;

const BASE_SIGMA: f32 = 1.6;
const ASSUMED_BLUR: f32 = 0.5;
const MIN_OCTAVE_SIZE: usize = 32;

struct Octave {
    images: Vec<FloatImage>,
    /// Blur of each image in octave-local pixels.
    sigmas: Vec<f32>,
}

/// Gaussian pyramid with `intervals` steps per doubling of sigma and `extra` images beyond them.
fn gaussian_pyramid(image: &GrayImage, max_octaves: usize, intervals: usize, extra: usize) -> Vec<Octave> {
    let k = 2.0f32.powf(1.0 / intervals as f32);
    let per_octave = intervals + extra;
    let first_blur = (BASE_SIGMA * BASE_SIGMA - ASSUMED_BLUR * ASSUMED_BLUR).sqrt();
    let mut base = FloatImage::from_gray(image).gaussian_blur(first_blur);
    let mut octaves = Vec::new();
    for _ in 0..max_octaves {
        if base.width() < MIN_OCTAVE_SIZE || base.height() < MIN_OCTAVE_SIZE {
            break;
        }
        let mut images = vec![base.clone()];
        let mut sigmas = vec![BASE_SIGMA];
        for i in 1..per_octave {
            let prev = BASE_SIGMA * k.powi(i as i32 - 1);
            let total = prev * k;
            let step = (total * total - prev * prev).sqrt();
            let next = images[i - 1].gaussian_blur(step);
            images.push(next);
            sigmas.push(total);
        }
        base = images[intervals].half_sample();
        octaves.push(Octave { images, sigmas });
    }
    octaves
}

/// Whether `v` at (x, y) of `layers[1]` is a strict extremum of its 3x3x3 neighbourhood.
fn is_extremum(layers: [&FloatImage; 3], x: usize, y: usize, v: f32, maxima_only: bool) -> bool {
    let is_max = v > 0.0;
    if maxima_only && !is_max {
        return false;
    }
    for (li, layer) in layers.iter().enumerate() {
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if li == 1 && nx == x && ny == y {
                    continue;
                }
                let n = layer.get(nx, ny);
                if (is_max && n >= v) || (!is_max && n <= v) {
                    return false;
                }
            }
        }
    }
    true
}

/// Scale-normalised determinant-of-Hessian detector.
///
/// Uses a Gaussian scale stack in place of the nonlinear diffusion scale space.
pub struct AkazeDetector {
    threshold: f32,
    octaves: usize,
    sublevels: usize,
}

impl Default for AkazeDetector {
    fn default() -> Self {
        Self {
            threshold: 0.001,
            octaves: 4,
            sublevels: 4,
        }
    }
}

fn hessian_response(image: &FloatImage, sigma: f32) -> FloatImage {
    let (w, h) = (image.width(), image.height());
    let norm = sigma.powi(4);
    let mut out = FloatImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let c = image.get_clamped(x, y);
            let dxx = image.get_clamped(x + 1, y) + image.get_clamped(x - 1, y) - 2.0 * c;
            let dyy = image.get_clamped(x, y + 1) + image.get_clamped(x, y - 1) - 2.0 * c;
            let dxy = (image.get_clamped(x + 1, y + 1) - image.get_clamped(x + 1, y - 1)
                - image.get_clamped(x - 1, y + 1)
                + image.get_clamped(x - 1, y - 1))
                * 0.25;
            out.set(x as usize, y as usize, (dxx * dyy - dxy * dxy) * norm);
        }
    }
    out
}

impl FeatureDetector for AkazeDetector {
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let mut keypoints = Vec::new();
        let pyramid = gaussian_pyramid(image, self.octaves, self.sublevels, 1);
        for (o, octave) in pyramid.iter().enumerate() {
            let scale = 2.0f32.powi(o as i32);
            let responses: Vec<FloatImage> = octave
                .images
                .iter()
                .zip(&octave.sigmas)
                .map(|(img, &s)| hessian_response(img, s))
                .collect();
            let (w, h) = (responses[0].width(), responses[0].height());
            for l in 1..responses.len() - 1 {
                let layers = [&responses[l - 1], &responses[l], &responses[l + 1]];
                for y in 1..h - 1 {
                    for x in 1..w - 1 {
                        let v = responses[l].get(x, y);
                        if v <= self.threshold || !is_extremum(layers, x, y, v, true) {
                            continue;
                        }
                        let sigma = octave.sigmas[l];
                        let angle = dominant_orientation(&octave.images[l], x, y, sigma);
                        keypoints.push(
                            KeyPoint::new(x as f32 * scale, y as f32 * scale, 3.0 * sigma * scale)
                                .with_response(v)
                                .with_angle(angle)
                                .with_octave(o as i32),
                        );
                    }
                }
            }
        }
        keypoints
    }
}

/// Difference-of-Gaussian extrema with contrast and edge rejection.
pub struct SiftDetector {
    intervals: usize,
    contrast_threshold: f32,
    edge_threshold: f32,
    border: usize,
    octaves: usize,
}

impl Default for SiftDetector {
    fn default() -> Self {
        Self {
            intervals: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            border: 5,
            octaves: 4,
        }
    }
}

impl SiftDetector {
    fn passes_edge_test(&self, dog: &FloatImage, x: usize, y: usize) -> bool {
        let v = dog.get(x, y);
        let dxx = dog.get(x + 1, y) + dog.get(x - 1, y) - 2.0 * v;
        let dyy = dog.get(x, y + 1) + dog.get(x, y - 1) - 2.0 * v;
        let dxy = (dog.get(x + 1, y + 1) - dog.get(x + 1, y - 1) - dog.get(x - 1, y + 1)
            + dog.get(x - 1, y - 1))
            * 0.25;
        let tr = dxx + dyy;
        let det = dxx * dyy - dxy * dxy;
        let r = self.edge_threshold;
        det > 0.0 && tr * tr * r < (r + 1.0) * (r + 1.0) * det
    }
}

impl FeatureDetector for SiftDetector {
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let threshold = self.contrast_threshold / self.intervals as f32;
        let mut keypoints = Vec::new();
        let pyramid = gaussian_pyramid(image, self.octaves, self.intervals, 3);
        for (o, octave) in pyramid.iter().enumerate() {
            let scale = 2.0f32.powi(o as i32);
            let dogs: Vec<FloatImage> = octave
                .images
                .windows(2)
                .map(|pair| pair[1].subtract(&pair[0]))
                .collect();
            let (w, h) = (dogs[0].width(), dogs[0].height());
            if w <= 2 * self.border || h <= 2 * self.border {
                continue;
            }
            for l in 1..=self.intervals {
                let layers = [&dogs[l - 1], &dogs[l], &dogs[l + 1]];
                for y in self.border..h - self.border {
                    for x in self.border..w - self.border {
                        let v = dogs[l].get(x, y);
                        if v.abs() <= threshold
                            || !is_extremum(layers, x, y, v, false)
                            || !self.passes_edge_test(&dogs[l], x, y)
                        {
                            continue;
                        }
                        let sigma = octave.sigmas[l];
                        let angle = dominant_orientation(&octave.images[l], x, y, sigma);
                        keypoints.push(
                            KeyPoint::new(x as f32 * scale, y as f32 * scale, 2.0 * sigma * scale)
                                .with_response(v.abs())
                                .with_angle(angle)
                                .with_octave(o as i32),
                        );
                    }
                }
            }
        }
        keypoints
    }
}
