use glam::Vec2;
use std::fmt;

/// A detected salient image location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub pt: Vec2,
    /// Diameter of the meaningful neighbourhood in pixels.
    pub size: f32,
    /// Orientation in degrees, `-1.0` when the detector does not assign one.
    pub angle: f32,
    /// Detector quality score, higher is stronger. Zero for score-less detectors.
    pub response: f32,
    pub octave: i32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32, size: f32) -> KeyPoint {
        KeyPoint {
            pt: Vec2::new(x, y),
            size,
            angle: -1.0,
            response: 0.0,
            octave: 0,
        }
    }

    pub fn with_response(mut self, response: f32) -> KeyPoint {
        self.response = response;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> KeyPoint {
        self.angle = angle;
        self
    }

    pub fn with_octave(mut self, octave: i32) -> KeyPoint {
        self.octave = octave;
        self
    }

    pub fn has_angle(&self) -> bool {
        self.angle >= 0.0
    }
}

/// Row-major descriptor storage, one row per keypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorMatrix<T> {
    width: usize,
    data: Vec<T>,
}

impl<T: Copy> DescriptorMatrix<T> {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            data: Vec::new(),
        }
    }

    pub fn with_capacity(width: usize, rows: usize) -> Self {
        Self {
            width,
            data: Vec::with_capacity(width * rows),
        }
    }

    pub fn from_rows(width: usize, data: Vec<T>) -> Self {
        assert!(
            width > 0 && data.len() % width == 0,
            "descriptor data does not divide into rows of {}",
            width
        );
        Self { width, data }
    }

    pub fn push_row(&mut self, row: &[T]) {
        assert_eq!(row.len(), self.width, "descriptor row width mismatch");
        self.data.extend_from_slice(row);
    }

    pub fn row(&self, idx: usize) -> &[T] {
        &self.data[idx * self.width..(idx + 1) * self.width]
    }

    pub fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.data.len() / self.width
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks_exact(self.width.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorFamily {
    /// Bit-packed descriptors compared with Hamming distance.
    Binary,
    /// Floating-point histograms compared with Euclidean distance.
    Float,
}

impl fmt::Display for DescriptorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorFamily::Binary => f.write_str("binary"),
            DescriptorFamily::Float => f.write_str("floating-point"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Descriptors {
    Binary(DescriptorMatrix<u8>),
    Float(DescriptorMatrix<f32>),
}

impl Descriptors {
    pub fn family(&self) -> DescriptorFamily {
        match self {
            Descriptors::Binary(_) => DescriptorFamily::Binary,
            Descriptors::Float(_) => DescriptorFamily::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Descriptors::Binary(m) => m.rows(),
            Descriptors::Float(m) => m.rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row width in elements (bytes for binary, floats for float descriptors).
    pub fn width(&self) -> usize {
        match self {
            Descriptors::Binary(m) => m.width(),
            Descriptors::Float(m) => m.width(),
        }
    }

    pub fn layout(&self) -> String {
        format!("{} x {}", self.family(), self.width())
    }
}

/// A correspondence between the previous frame (query) and the current frame (train).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

impl Match {
    pub fn new(query_idx: usize, train_idx: usize, distance: f32) -> Match {
        Match {
            query_idx,
            train_idx,
            distance,
        }
    }
}
