//! Binary descriptors built from intensity comparisons on a smoothed image.
//!
//! BRIEF, ORB, BRISK and FREAK differ only in where the compared points sit and whether
//! the pattern follows the keypoint size and orientation, so they share
//! [`PairTestExtractor`]. AKAZE uses grid-cell comparisons (M-LDB) instead.

use glam::Vec2;
use image::GrayImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::f32::consts::PI;

use super::DescriptorExtractor;
use crate::scale_space::{FloatImage, intensity_centroid_angle};
use crate::types::{DescriptorFamily, DescriptorMatrix, Descriptors, KeyPoint};

const ORIENTATION_RADIUS: i32 = 15;

/// Orientation in radians: the detector's angle when present, else the intensity centroid.
fn keypoint_orientation(image: &FloatImage, kp: &KeyPoint) -> f32 {
    let degrees = if kp.has_angle() {
        kp.angle
    } else {
        intensity_centroid_angle(image, kp.pt.x, kp.pt.y, ORIENTATION_RADIUS)
    };
    degrees.to_radians()
}

fn pack_bits(bits: impl Iterator<Item = bool>, bytes: usize) -> Vec<u8> {
    let mut row = vec![0u8; bytes];
    for (i, bit) in bits.enumerate() {
        if bit {
            row[i / 8] |= 1 << (i % 8);
        }
    }
    row
}

fn collect_rows(rows: Vec<Vec<u8>>, width: usize) -> Descriptors {
    let mut matrix = DescriptorMatrix::with_capacity(width, rows.len());
    for row in &rows {
        matrix.push_row(row);
    }
    Descriptors::Binary(matrix)
}

/// Standard normal sample via Box-Muller.
fn standard_normal(rng: &mut ChaCha8Rng) -> f32 {
    let u1: f32 = rng.random_range(f32::EPSILON..1.0);
    let u2: f32 = rng.random_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Points on concentric rings, `(radius, count, phase)` per ring.
fn ring_points(rings: &[(f32, usize, f32)]) -> Vec<Vec2> {
    let mut points = Vec::new();
    for &(radius, count, phase) in rings {
        for i in 0..count {
            let theta = phase + 2.0 * PI * i as f32 / count as f32;
            points.push(Vec2::new(radius * theta.cos(), radius * theta.sin()));
        }
    }
    points
}

/// Every pair of `points` ordered by length, ascending or descending, first `count` kept.
fn pairs_by_length(points: &[Vec2], count: usize, shortest_first: bool) -> Vec<[Vec2; 2]> {
    let mut pairs = Vec::new();
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            pairs.push(([points[i], points[j]], points[i].distance(points[j])));
        }
    }
    if shortest_first {
        pairs.sort_by(|a, b| a.1.total_cmp(&b.1));
    } else {
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    }
    pairs.into_iter().take(count).map(|(p, _)| p).collect()
}

/// Bit `i` is set when the smoothed intensity at the first point of pair `i` is lower
/// than at the second.
pub struct PairTestExtractor {
    pairs: Vec<[Vec2; 2]>,
    smoothing_sigma: f32,
    /// Keypoint size at which the pattern is used unscaled; `None` keeps it fixed.
    reference_size: Option<f32>,
    steered: bool,
}

impl PairTestExtractor {
    pub fn new(
        pairs: Vec<[Vec2; 2]>,
        smoothing_sigma: f32,
        reference_size: Option<f32>,
        steered: bool,
    ) -> Self {
        assert!(
            !pairs.is_empty() && pairs.len() % 8 == 0,
            "pair count must be a positive multiple of 8"
        );
        Self {
            pairs,
            smoothing_sigma,
            reference_size,
            steered,
        }
    }

    /// 256 uniformly drawn pairs in a 48 pixel patch, unrotated and unscaled.
    pub fn brief() -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(0x6272_6965_66);
        let half = 24.0f32;
        let pairs = (0..256)
            .map(|_| {
                [
                    Vec2::new(rng.random_range(-half..=half), rng.random_range(-half..=half)),
                    Vec2::new(rng.random_range(-half..=half), rng.random_range(-half..=half)),
                ]
            })
            .collect();
        Self::new(pairs, 2.0, None, false)
    }

    /// 256 Gaussian-distributed pairs in a 31 pixel patch, steered by orientation.
    pub fn orb() -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(0x6f72_62);
        let radius = 15.0f32;
        let sigma = 31.0 / 5.0;
        let draw = |rng: &mut ChaCha8Rng| {
            Vec2::new(
                (standard_normal(rng) * sigma).clamp(-radius, radius),
                (standard_normal(rng) * sigma).clamp(-radius, radius),
            )
        };
        let pairs = (0..256).map(|_| [draw(&mut rng), draw(&mut rng)]).collect();
        Self::new(pairs, 2.0, Some(31.0), true)
    }

    /// 60 points on five rings, the 512 shortest pairs.
    pub fn brisk() -> Self {
        let points = ring_points(&[
            (0.0, 1, 0.0),
            (2.9, 10, 0.0),
            (4.9, 14, 0.0),
            (7.4, 15, 0.0),
            (10.8, 20, 0.0),
        ]);
        Self::new(pairs_by_length(&points, 512, true), 1.2, Some(12.0), true)
    }

    /// 43 retina-like points, 512 pairs ordered coarse to fine.
    pub fn freak() -> Self {
        let radii = [22.0f32, 16.5, 12.4, 9.3, 7.0, 5.2, 3.9];
        let mut rings: Vec<(f32, usize, f32)> = radii
            .iter()
            .enumerate()
            .map(|(i, &r)| (r, 6, if i % 2 == 1 { PI / 6.0 } else { 0.0 }))
            .collect();
        rings.push((0.0, 1, 0.0));
        let points = ring_points(&rings);
        Self::new(pairs_by_length(&points, 512, false), 1.5, Some(22.0), true)
    }

    pub fn bytes(&self) -> usize {
        self.pairs.len() / 8
    }

    fn describe(&self, image: &FloatImage, kp: &KeyPoint) -> Vec<u8> {
        let scale = self
            .reference_size
            .map(|r| (kp.size / r).max(1.0))
            .unwrap_or(1.0);
        let rotation = if self.steered {
            Vec2::from_angle(keypoint_orientation(image, kp))
        } else {
            Vec2::X
        };
        let at = |offset: Vec2| {
            let p = kp.pt + rotation.rotate(offset * scale);
            image.sample(p.x, p.y)
        };
        pack_bits(
            self.pairs.iter().map(|[a, b]| at(*a) < at(*b)),
            self.bytes(),
        )
    }
}

impl DescriptorExtractor for PairTestExtractor {
    fn family(&self) -> DescriptorFamily {
        DescriptorFamily::Binary
    }

    fn compute(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let smoothed = FloatImage::from_gray(image).gaussian_blur(self.smoothing_sigma);
        let rows: Vec<Vec<u8>> = keypoints
            .par_iter()
            .map(|kp| self.describe(&smoothed, kp))
            .collect();
        collect_rows(rows, self.bytes())
    }
}

/// Modified local difference binary descriptor.
///
/// A rotated square patch is sampled on a regular grid; cells of 2x2, 3x3 and 4x4
/// subdivisions are compared pairwise on mean intensity and mean x/y derivative.
pub struct AkazeExtractor {
    samples: usize,
    smoothing_sigma: f32,
    reference_size: f32,
}

pub const AKAZE_BITS: usize = 486;

impl Default for AkazeExtractor {
    fn default() -> Self {
        Self {
            samples: 12,
            smoothing_sigma: 1.2,
            reference_size: 12.0,
        }
    }
}

impl AkazeExtractor {
    pub fn bytes(&self) -> usize {
        AKAZE_BITS.div_ceil(8)
    }

    fn describe(&self, image: &FloatImage, kp: &KeyPoint) -> Vec<u8> {
        let n = self.samples;
        let step = (kp.size / self.reference_size).max(1.0);
        let rotation = Vec2::from_angle(keypoint_orientation(image, kp));
        let ex = rotation.rotate(Vec2::X) * step;
        let ey = rotation.rotate(Vec2::Y) * step;
        let half = (n as f32 - 1.0) * 0.5;

        // intensity, derivative along the patch x axis, derivative along the patch y axis
        let mut grid = vec![[0.0f32; 3]; n * n];
        for j in 0..n {
            for i in 0..n {
                let p = kp.pt + ex * (i as f32 - half) + ey * (j as f32 - half);
                let sample = |q: Vec2| image.sample(q.x, q.y);
                grid[j * n + i] = [
                    sample(p),
                    sample(p + ex) - sample(p - ex),
                    sample(p + ey) - sample(p - ey),
                ];
            }
        }

        let mut bits = Vec::with_capacity(AKAZE_BITS);
        for divisions in [2usize, 3, 4] {
            let means = cell_means(&grid, n, divisions);
            for a in 0..means.len() {
                for b in a + 1..means.len() {
                    for channel in 0..3 {
                        bits.push(means[a][channel] > means[b][channel]);
                    }
                }
            }
        }
        pack_bits(bits.into_iter(), self.bytes())
    }
}

fn cell_means(grid: &[[f32; 3]], n: usize, divisions: usize) -> Vec<[f32; 3]> {
    let mut sums = vec![[0.0f32; 3]; divisions * divisions];
    let mut counts = vec![0usize; divisions * divisions];
    for j in 0..n {
        for i in 0..n {
            let cell = (j * divisions / n) * divisions + i * divisions / n;
            for c in 0..3 {
                sums[cell][c] += grid[j * n + i][c];
            }
            counts[cell] += 1;
        }
    }
    sums.iter()
        .zip(&counts)
        .map(|(s, &count)| {
            let k = count.max(1) as f32;
            [s[0] / k, s[1] / k, s[2] / k]
        })
        .collect()
}

impl DescriptorExtractor for AkazeExtractor {
    fn family(&self) -> DescriptorFamily {
        DescriptorFamily::Binary
    }

    fn compute(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let smoothed = FloatImage::from_gray(image).gaussian_blur(self.smoothing_sigma);
        let rows: Vec<Vec<u8>> = keypoints
            .par_iter()
            .map(|kp| self.describe(&smoothed, kp))
            .collect();
        collect_rows(rows, self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_widths() {
        assert_eq!(PairTestExtractor::brief().bytes(), 32);
        assert_eq!(PairTestExtractor::orb().bytes(), 32);
        assert_eq!(PairTestExtractor::brisk().bytes(), 64);
        assert_eq!(PairTestExtractor::freak().bytes(), 64);
        assert_eq!(AkazeExtractor::default().bytes(), 61);
    }

    #[test]
    fn patterns_are_deterministic() {
        assert_eq!(PairTestExtractor::orb().pairs, PairTestExtractor::orb().pairs);
    }

    #[test]
    fn akaze_cell_comparisons_fill_486_bits() {
        let pairs = |d: usize| d * d * (d * d - 1) / 2;
        assert_eq!(3 * (pairs(2) + pairs(3) + pairs(4)), AKAZE_BITS);
    }

    #[test]
    fn pack_bits_is_lsb_first() {
        let row = pack_bits([true, false, false, true, false, false, false, false, true].into_iter(), 2);
        assert_eq!(row, vec![0b0000_1001, 0b0000_0001]);
    }
}
