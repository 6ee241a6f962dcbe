//! Single-channel float images and the few filters the scale-space detectors and
//! gradient descriptors share.

use image::GrayImage;

#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize) -> FloatImage {
        FloatImage {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Converts to intensities in `[0, 1]`.
    pub fn from_gray(image: &GrayImage) -> FloatImage {
        let (w, h) = image.dimensions();
        let data = image.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        FloatImage {
            width: w as usize,
            height: h as usize,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Reads with coordinates clamped to the image border.
    #[inline]
    pub fn get_clamped(&self, x: i32, y: i32) -> f32 {
        let xc = x.clamp(0, self.width as i32 - 1) as usize;
        let yc = y.clamp(0, self.height as i32 - 1) as usize;
        self.get(xc, yc)
    }

    /// Bilinear sample with border clamping.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (xi, yi) = (x0 as i32, y0 as i32);
        let top = self.get_clamped(xi, yi) * (1.0 - fx) + self.get_clamped(xi + 1, yi) * fx;
        let bottom =
            self.get_clamped(xi, yi + 1) * (1.0 - fx) + self.get_clamped(xi + 1, yi + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Central-difference gradient `(dx, dy)` with border clamping.
    #[inline]
    pub fn gradient(&self, x: i32, y: i32) -> (f32, f32) {
        let dx = (self.get_clamped(x + 1, y) - self.get_clamped(x - 1, y)) * 0.5;
        let dy = (self.get_clamped(x, y + 1) - self.get_clamped(x, y - 1)) * 0.5;
        (dx, dy)
    }

    pub fn subtract(&self, other: &FloatImage) -> FloatImage {
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a - b)
            .collect();
        FloatImage {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Every second pixel in both directions.
    pub fn half_sample(&self) -> FloatImage {
        let w = (self.width / 2).max(1);
        let h = (self.height / 2).max(1);
        let mut out = FloatImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                out.set(x, y, self.get((2 * x).min(self.width - 1), (2 * y).min(self.height - 1)));
            }
        }
        out
    }

    /// Separable Gaussian blur with a kernel radius of `ceil(3 * sigma)`.
    pub fn gaussian_blur(&self, sigma: f32) -> FloatImage {
        if sigma <= 0.0 {
            return self.clone();
        }
        let kernel = gaussian_kernel(sigma);
        let radius = (kernel.len() / 2) as i32;
        let mut tmp = FloatImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    acc += w * self.get_clamped(x as i32 + k as i32 - radius, y as i32);
                }
                tmp.set(x, y, acc);
            }
        }
        let mut out = FloatImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    acc += w * tmp.get_clamped(x as i32, y as i32 + k as i32 - radius);
                }
                out.set(x, y, acc);
            }
        }
        out
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Intensity-centroid orientation in degrees `[0, 360)` of a circular patch.
pub fn intensity_centroid_angle(image: &FloatImage, cx: f32, cy: f32, radius: i32) -> f32 {
    let (xi, yi) = (cx.round() as i32, cy.round() as i32);
    let mut m10 = 0.0f32;
    let mut m01 = 0.0f32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let v = image.get_clamped(xi + dx, yi + dy);
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    normalize_degrees(m01.atan2(m10).to_degrees())
}

/// Peak of a 36-bin, Gaussian-weighted gradient orientation histogram, in degrees.
pub fn dominant_orientation(image: &FloatImage, x: usize, y: usize, sigma: f32) -> f32 {
    const BINS: usize = 36;
    let weight_sigma = 1.5 * sigma;
    let radius = (3.0 * weight_sigma).round().max(1.0) as i32;
    let denom = 2.0 * weight_sigma * weight_sigma;
    let mut hist = [0.0f32; BINS];
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let (gx, gy) = image.gradient(x as i32 + dx, y as i32 + dy);
            let mag = (gx * gx + gy * gy).sqrt();
            if mag == 0.0 {
                continue;
            }
            let angle = normalize_degrees(gy.atan2(gx).to_degrees());
            let w = (-((dx * dx + dy * dy) as f32) / denom).exp();
            let bin = ((angle / 360.0 * BINS as f32) as usize) % BINS;
            hist[bin] += w * mag;
        }
    }
    let (best, _) = hist
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
    (best as f32 + 0.5) * 360.0 / BINS as f32
}

pub fn normalize_degrees(angle: f32) -> f32 {
    let a = angle % 360.0;
    if a < 0.0 { a + 360.0 } else { a }
}
